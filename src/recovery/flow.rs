//! Three-step password recovery: request a code, verify it, then set the new
//! password.
//!
//! The flow is a tagged state machine driven by `&mut self` calls. Pending
//! identifiers are captured before any await, so a future dropped mid-call
//! leaves the machine in the state it started from.

use std::mem;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use crate::client::ApiClient;
use crate::config::CoreConfig;
use crate::error::RecoveryError;
use crate::recovery::models::{
    ForgotPasswordRequest, ForgotPasswordResponse, RecoveryAttempt, RecoveryState,
    ResetPasswordRequest, ResetToken, VerifyOtpRequest, VerifyOtpResponse,
};

/// One-time codes are always this many digits.
pub const OTP_CODE_LEN: usize = 6;
/// Minimum accepted length for a new password.
pub const MIN_PASSWORD_LEN: usize = 8;

pub struct RecoveryFlow {
    client: ApiClient,
    state: RecoveryState,
    otp_ttl: Duration,
    resend_cooldown: Option<Duration>,
}

impl RecoveryFlow {
    /// # Errors
    /// Returns an error if the configured API base URL is invalid.
    pub fn new(config: &CoreConfig) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(config)?,
            state: RecoveryState::AwaitingEmail,
            otp_ttl: config.otp_ttl(),
            resend_cooldown: config.resend_cooldown(),
        })
    }

    #[must_use]
    pub fn state(&self) -> &RecoveryState {
        &self.state
    }

    /// The pending attempt, while a code is out or freshly verified.
    #[must_use]
    pub fn attempt(&self) -> Option<&RecoveryAttempt> {
        match &self.state {
            RecoveryState::AwaitingCode { attempt }
            | RecoveryState::AwaitingNewPassword { attempt, .. } => Some(attempt),
            RecoveryState::AwaitingEmail | RecoveryState::Done => None,
        }
    }

    /// Countdown on the pending code, while one is out.
    #[must_use]
    pub fn expires_in(&self) -> Option<Duration> {
        self.attempt().map(RecoveryAttempt::expires_in)
    }

    /// Time until a new code may be requested, while one is pending.
    ///
    /// `Some(Duration::ZERO)` means resend is allowed right now; `None`
    /// means no code is pending at all.
    #[must_use]
    pub fn resend_available_in(&self) -> Option<Duration> {
        match &self.state {
            RecoveryState::AwaitingCode { attempt } => Some(self.resend_gate_remaining(attempt)),
            _ => None,
        }
    }

    /// Abandons the current attempt and returns to the initial state.
    pub fn restart(&mut self) {
        self.state = RecoveryState::AwaitingEmail;
        debug!("Recovery flow restarted");
    }

    /// Requests a one-time code for `email` and moves to awaiting-code.
    ///
    /// Returns a snapshot of the freshly created attempt; the live attempt
    /// stays in the machine. While a code is already pending this acts as a
    /// resend and is subject to the resend gate; the new code replaces the
    /// old attempt entirely.
    ///
    /// # Errors
    /// Returns [`RecoveryError::Validation`] for a malformed email without
    /// touching the network, [`RecoveryError::ResendCooldown`] while the
    /// gate is closed, and state errors after verification or completion.
    #[instrument(skip(self, email))]
    pub async fn request_code(
        &mut self,
        email: &str,
        service_scope: &str,
    ) -> Result<RecoveryAttempt, RecoveryError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(RecoveryError::Validation(
                "email address is not valid".to_string(),
            ));
        }

        match &self.state {
            RecoveryState::AwaitingEmail => {}
            RecoveryState::AwaitingCode { attempt } => {
                let remaining = self.resend_gate_remaining(attempt);
                if !remaining.is_zero() {
                    return Err(RecoveryError::ResendCooldown {
                        retry_in_secs: remaining.as_secs().max(1),
                    });
                }
            }
            RecoveryState::AwaitingNewPassword { .. } => {
                return Err(RecoveryError::CodeAlreadyVerified);
            }
            RecoveryState::Done => return Err(RecoveryError::NoActiveAttempt),
        }

        self.send_code_request(email, service_scope.to_string())
            .await
    }

    /// Requests a fresh code for the attempt already in flight.
    ///
    /// # Errors
    /// Same surface as [`RecoveryFlow::request_code`], plus
    /// [`RecoveryError::NoActiveAttempt`] when nothing is pending.
    #[instrument(skip(self))]
    pub async fn resend(&mut self) -> Result<RecoveryAttempt, RecoveryError> {
        let (email, service_scope, remaining) = match &self.state {
            RecoveryState::AwaitingCode { attempt } => (
                attempt.email().to_string(),
                attempt.service_scope().to_string(),
                self.resend_gate_remaining(attempt),
            ),
            RecoveryState::AwaitingNewPassword { .. } => {
                return Err(RecoveryError::CodeAlreadyVerified);
            }
            RecoveryState::AwaitingEmail | RecoveryState::Done => {
                return Err(RecoveryError::NoActiveAttempt);
            }
        };

        if !remaining.is_zero() {
            return Err(RecoveryError::ResendCooldown {
                retry_in_secs: remaining.as_secs().max(1),
            });
        }

        self.send_code_request(email, service_scope).await
    }

    /// Verifies the entered code and moves to awaiting-new-password.
    ///
    /// Returns the reset token bound to this attempt. The same token is kept
    /// in the machine state, so holding on to the return value is optional.
    ///
    /// # Errors
    /// Returns [`RecoveryError::Validation`] for a malformed code and
    /// [`RecoveryError::CodeExpired`] for a locally expired attempt, both
    /// without touching the network. Server rejections update the local
    /// attempt counters before the classified error is returned.
    #[instrument(skip(self, code))]
    pub async fn verify_code(&mut self, code: &str) -> Result<ResetToken, RecoveryError> {
        let code = code.trim();
        if !valid_otp_code(code) {
            return Err(RecoveryError::Validation(format!(
                "the code must be {OTP_CODE_LEN} digits"
            )));
        }

        let (otp_request_id, expired) = match &self.state {
            RecoveryState::AwaitingCode { attempt } => {
                (attempt.otp_request_id().to_string(), attempt.is_expired())
            }
            RecoveryState::AwaitingNewPassword { .. } => {
                return Err(RecoveryError::CodeAlreadyVerified);
            }
            RecoveryState::AwaitingEmail | RecoveryState::Done => {
                return Err(RecoveryError::NoActiveAttempt);
            }
        };
        if expired {
            return Err(RecoveryError::CodeExpired);
        }

        let request = VerifyOtpRequest {
            otp_request_id: &otp_request_id,
            code,
        };

        match self
            .client
            .post_json::<_, VerifyOtpResponse>("/auth/verify-otp", &request, None)
            .await
        {
            Ok(response) => {
                let token = ResetToken::bind(response.reset_token, otp_request_id);
                self.advance_to_new_password(token.clone());
                debug!("Code verified, state now {}", self.state.name());
                Ok(token)
            }
            Err(err) => {
                let err = RecoveryError::from_api(err);
                self.note_verify_failure(&err);
                debug!("Code verification failed: {err}");
                Err(err)
            }
        }
    }

    /// Submits the new password using the reset token from
    /// [`RecoveryFlow::verify_code`] and completes the flow.
    ///
    /// # Errors
    /// Returns [`RecoveryError::Validation`] when the password is too short
    /// or the confirmation differs, and
    /// [`RecoveryError::TokenExpiredOrUsed`] when the token does not belong
    /// to the pending attempt or the flow already completed; none of these
    /// touch the network. A server rejection leaves the state unchanged so
    /// the caller can restart.
    #[instrument(skip(self, token, new_password, confirmation))]
    pub async fn reset_password(
        &mut self,
        token: &ResetToken,
        new_password: &SecretString,
        confirmation: &SecretString,
    ) -> Result<(), RecoveryError> {
        validate_new_password(new_password, confirmation)?;

        match &self.state {
            RecoveryState::AwaitingNewPassword { token: bound, .. } => {
                if bound.request_id() != token.request_id() || bound.value() != token.value() {
                    return Err(RecoveryError::TokenExpiredOrUsed);
                }
            }
            RecoveryState::Done => return Err(RecoveryError::TokenExpiredOrUsed),
            RecoveryState::AwaitingEmail | RecoveryState::AwaitingCode { .. } => {
                return Err(RecoveryError::NoActiveAttempt);
            }
        }

        let request = ResetPasswordRequest {
            reset_token: token.value(),
            new_password: new_password.expose_secret(),
        };

        self.client
            .post_json_empty("/auth/reset-password", &request, None)
            .await
            .map_err(RecoveryError::from_api)?;

        self.state = RecoveryState::Done;
        debug!("Password reset completed");

        Ok(())
    }

    async fn send_code_request(
        &mut self,
        email: String,
        service_scope: String,
    ) -> Result<RecoveryAttempt, RecoveryError> {
        let request = ForgotPasswordRequest {
            email: &email,
            service_scope: &service_scope,
        };

        let response: ForgotPasswordResponse = self
            .client
            .post_json("/auth/forgot-password", &request, None)
            .await
            .map_err(RecoveryError::from_api)?;

        let ttl = response
            .expires_in_seconds
            .map_or(self.otp_ttl, Duration::from_secs);

        let attempt = RecoveryAttempt::new(response.otp_request_id, email, service_scope, ttl);
        // A new code replaces whatever attempt was pending before it.
        self.state = RecoveryState::AwaitingCode {
            attempt: attempt.clone(),
        };
        debug!("One-time code requested, state now {}", self.state.name());

        Ok(attempt)
    }

    fn advance_to_new_password(&mut self, token: ResetToken) {
        match mem::replace(&mut self.state, RecoveryState::AwaitingEmail) {
            RecoveryState::AwaitingCode { attempt } => {
                self.state = RecoveryState::AwaitingNewPassword { attempt, token };
            }
            other => self.state = other,
        }
    }

    fn note_verify_failure(&mut self, err: &RecoveryError) {
        if let RecoveryState::AwaitingCode { attempt } = &mut self.state {
            match err {
                RecoveryError::CodeInvalid { attempts_remaining } => {
                    attempt.record_failed_attempt(*attempts_remaining);
                }
                RecoveryError::TooManyAttempts => attempt.mark_exhausted(),
                RecoveryError::CodeExpired => attempt.mark_expired(),
                _ => {}
            }
        }
    }

    fn resend_gate_remaining(&self, attempt: &RecoveryAttempt) -> Duration {
        // A dead code never gates its own replacement.
        if attempt.is_expired() || attempt.attempts_remaining() == 0 {
            return Duration::ZERO;
        }
        match self.resend_cooldown {
            Some(cooldown) => cooldown.saturating_sub(attempt.age()),
            None => attempt.expires_in(),
        }
    }
}

/// Normalize an email before validation and submission.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

fn valid_otp_code(code: &str) -> bool {
    code.len() == OTP_CODE_LEN && code.chars().all(|c| c.is_ascii_digit())
}

fn validate_new_password(
    new_password: &SecretString,
    confirmation: &SecretString,
) -> Result<(), RecoveryError> {
    let password = new_password.expose_secret();
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(RecoveryError::Validation(format!(
            "the password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != confirmation.expose_secret() {
        return Err(RecoveryError::Validation(
            "the passwords do not match".to_string(),
        ));
    }
    Ok(())
}
