//! State carried through the password recovery flow.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Attempts granted per one-time code until the server says otherwise.
const DEFAULT_OTP_ATTEMPTS: u32 = 5;

/// Cap on a code lifetime. `expiresInSeconds` is server-controlled, and the
/// deadline arithmetic on [`Instant`] must stay in range for any wire value.
const MAX_CODE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// One requested one-time code and its local bookkeeping.
///
/// The server owns the real expiry and attempt counters; this mirror exists
/// so the UI can show countdowns and the flow can short-circuit requests
/// that are guaranteed to fail.
#[derive(Clone, Debug)]
pub struct RecoveryAttempt {
    otp_request_id: String,
    email: String,
    service_scope: String,
    created_at: Instant,
    expires_at: Instant,
    attempts_remaining: u32,
}

impl RecoveryAttempt {
    pub(crate) fn new(
        otp_request_id: String,
        email: String,
        service_scope: String,
        ttl: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            otp_request_id,
            email,
            service_scope,
            created_at: now,
            expires_at: now + ttl.min(MAX_CODE_TTL),
            attempts_remaining: DEFAULT_OTP_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn otp_request_id(&self) -> &str {
        &self.otp_request_id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn service_scope(&self) -> &str {
        &self.service_scope
    }

    #[must_use]
    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time left on the code's countdown, zero once expired.
    #[must_use]
    pub fn expires_in(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Syncs the local counter with the server's count when it sends one,
    /// otherwise decrements.
    pub(crate) fn record_failed_attempt(&mut self, server_remaining: Option<u32>) {
        self.attempts_remaining = match server_remaining {
            Some(remaining) => remaining,
            None => self.attempts_remaining.saturating_sub(1),
        };
    }

    pub(crate) fn mark_exhausted(&mut self) {
        self.attempts_remaining = 0;
    }

    pub(crate) fn mark_expired(&mut self) {
        self.expires_at = Instant::now();
    }
}

/// Single-use password reset token bound to the attempt that produced it.
///
/// The binding lets the flow reject tokens from an earlier or unrelated
/// attempt locally instead of burning a server round trip.
#[derive(Clone)]
pub struct ResetToken {
    value: String,
    otp_request_id: String,
}

impl ResetToken {
    pub(crate) fn bind(value: String, otp_request_id: String) -> Self {
        Self {
            value,
            otp_request_id,
        }
    }

    pub(crate) fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn request_id(&self) -> &str {
        &self.otp_request_id
    }
}

impl fmt::Debug for ResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetToken").finish_non_exhaustive()
    }
}

/// Where the recovery flow currently stands.
#[derive(Clone, Debug)]
pub enum RecoveryState {
    AwaitingEmail,
    AwaitingCode {
        attempt: RecoveryAttempt,
    },
    AwaitingNewPassword {
        attempt: RecoveryAttempt,
        token: ResetToken,
    },
    Done,
}

impl RecoveryState {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AwaitingEmail => "awaiting_email",
            Self::AwaitingCode { .. } => "awaiting_code",
            Self::AwaitingNewPassword { .. } => "awaiting_new_password",
            Self::Done => "done",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
    pub service_scope: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ForgotPasswordResponse {
    pub otp_request_id: String,
    #[serde(default)]
    pub expires_in_seconds: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerifyOtpRequest<'a> {
    pub otp_request_id: &'a str,
    pub code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerifyOtpResponse {
    pub reset_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResetPasswordRequest<'a> {
    pub reset_token: &'a str,
    pub new_password: &'a str,
}
