//! Error taxonomy for the session core.
//!
//! The transport layer reports [`ApiError`]; the public surfaces translate it
//! into [`AuthError`] or [`RecoveryError`] by reading the structured `kind`
//! code from the server's error body. HTTP status codes are only a fallback
//! for responses without a recognized kind.

use serde::Deserialize;
use thiserror::Error;

/// Error payload returned by the API on non-success responses.
///
/// Every field is optional so a partial or legacy body still decodes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ErrorBody {
    pub kind: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "messageDE")]
    pub message_de: Option<String>,
    pub account_locked: Option<bool>,
    pub remaining_minutes: Option<u64>,
    pub attempts_remaining: Option<u32>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message.or(self.message_de)
    }
}

/// Transport-level outcome of a single API call.
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("server returned status {status}")]
    Status { status: u16, body: ErrorBody },
}

/// Failures surfaced by session operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("access denied")]
    AccessDenied,
    #[error("account locked, retry in {remaining_minutes} minutes")]
    AccountLocked { remaining_minutes: u64 },
    #[error("{0}")]
    Validation(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected server response: {0}")]
    Protocol(String),
}

impl AuthError {
    pub(crate) fn from_api(err: ApiError) -> Self {
        match err {
            ApiError::Network(msg) => Self::Network(msg),
            ApiError::Protocol(msg) => Self::Protocol(msg),
            ApiError::Status { status, body } => Self::classify(status, body),
        }
    }

    fn classify(status: u16, body: ErrorBody) -> Self {
        match body.kind.as_deref() {
            Some("invalid_credentials") => Self::InvalidCredentials,
            Some("access_denied") => Self::AccessDenied,
            Some("account_locked") => Self::AccountLocked {
                remaining_minutes: body.remaining_minutes.unwrap_or(0),
            },
            Some("validation_error") => Self::Validation(
                body.into_message()
                    .unwrap_or_else(|| "invalid request".to_string()),
            ),
            _ => {
                if body.account_locked == Some(true) {
                    return Self::AccountLocked {
                        remaining_minutes: body.remaining_minutes.unwrap_or(0),
                    };
                }
                match status {
                    401 => Self::InvalidCredentials,
                    403 => Self::AccessDenied,
                    400 | 422 => Self::Validation(
                        body.into_message()
                            .unwrap_or_else(|| "invalid request".to_string()),
                    ),
                    _ => Self::Protocol(unexpected_status(status, body)),
                }
            }
        }
    }
}

/// Failures surfaced by the password recovery flow.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("incorrect one-time code")]
    CodeInvalid { attempts_remaining: Option<u32> },
    #[error("one-time code expired")]
    CodeExpired,
    #[error("too many failed attempts")]
    TooManyAttempts,
    #[error("reset token expired or already used")]
    TokenExpiredOrUsed,
    #[error("no recovery attempt in progress")]
    NoActiveAttempt,
    #[error("code already verified for this attempt")]
    CodeAlreadyVerified,
    #[error("code resend available in {retry_in_secs}s")]
    ResendCooldown { retry_in_secs: u64 },
    #[error("{0}")]
    Validation(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected server response: {0}")]
    Protocol(String),
}

impl RecoveryError {
    pub(crate) fn from_api(err: ApiError) -> Self {
        match err {
            ApiError::Network(msg) => Self::Network(msg),
            ApiError::Protocol(msg) => Self::Protocol(msg),
            ApiError::Status { status, body } => Self::classify(status, body),
        }
    }

    fn classify(status: u16, body: ErrorBody) -> Self {
        match body.kind.as_deref() {
            Some("code_invalid") => Self::CodeInvalid {
                attempts_remaining: body.attempts_remaining,
            },
            Some("code_expired") => Self::CodeExpired,
            Some("too_many_attempts") => Self::TooManyAttempts,
            Some("token_expired_or_used") => Self::TokenExpiredOrUsed,
            Some("validation_error") => Self::Validation(
                body.into_message()
                    .unwrap_or_else(|| "invalid request".to_string()),
            ),
            _ => match status {
                429 => Self::TooManyAttempts,
                410 => Self::CodeExpired,
                401 | 403 => Self::TokenExpiredOrUsed,
                400 | 422 => Self::Validation(
                    body.into_message()
                        .unwrap_or_else(|| "invalid request".to_string()),
                ),
                _ => Self::Protocol(unexpected_status(status, body)),
            },
        }
    }
}

fn unexpected_status(status: u16, body: ErrorBody) -> String {
    match body.into_message() {
        Some(msg) => format!("status {status}: {msg}"),
        None => format!("status {status}"),
    }
}
