//! Session state and the wire shapes exchanged with the auth endpoints.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Access level attached to an authenticated user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Partner,
    Superadmin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Partner => "partner",
            Self::Superadmin => "superadmin",
        }
    }
}

/// Profile returned by the API at login and persisted with the credentials.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session held in memory by the manager.
///
/// Sessions are immutable snapshots; a refresh replaces the whole value
/// instead of mutating tokens in place.
#[derive(Clone, Debug)]
pub struct Session {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
    pub issued_at_unix: i64,
}

impl Session {
    pub(crate) fn issue(user: UserProfile, tokens: TokenPair) -> Self {
        Self {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            issued_at_unix: now_unix_seconds(),
        }
    }

    pub(crate) fn restore(
        user: UserProfile,
        access_token: String,
        refresh_token: String,
        issued_at_unix: i64,
    ) -> Self {
        Self {
            user,
            access_token,
            refresh_token,
            issued_at_unix,
        }
    }

    /// A session is usable when it carries both a subject and an access token.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty() && !self.user.id.is_empty()
    }
}

/// Unix seconds for session bookkeeping.
fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginRequest<'a> {
    pub identifier: &'a str,
    pub secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_scope: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin_login: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub tokens: TokenPair,
    pub user: UserProfile,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub tokens: TokenPair,
}
