//! # Aliro (CRM Session & Credential Core)
//!
//! `aliro` is the session and credential core for the lead-generation CRM
//! front ends. It talks to the platform's JSON API and owns three concerns:
//! the authenticated session lifecycle, one-time-code password recovery, and
//! the unread-notification counter.
//!
//! ## Sessions
//!
//! One [`session::SessionManager`] is shared per embedder, usually behind an
//! `Arc`. It remembers the current [`session::Session`], persists credentials
//! through a pluggable [`session::CredentialStore`], and serializes login and
//! token refresh so concurrent callers cannot rotate the same refresh token
//! twice. There is no global session and no ambient authorization header;
//! callers attach the bearer token per request via
//! [`session::SessionManager::authorize`].
//!
//! ## Password Recovery
//!
//! [`recovery::RecoveryFlow`] walks a tagged state machine from email entry
//! through code verification to the new password, mirroring the server's
//! expiry and attempt budget locally so doomed requests are rejected before
//! they reach the wire.
//!
//! ## Notifications
//!
//! [`notifications::NotificationPoller`] refreshes the unread counter on a
//! fixed interval while a session is active and publishes it through a
//! `tokio::sync::watch` channel.
//!
//! ## Logging
//!
//! Everything logs through the `tracing` facade. The crate never installs a
//! subscriber; embedders decide where the events go.

pub mod config;
pub mod error;
pub mod notifications;
pub mod recovery;
pub mod session;

pub(crate) mod client;

pub use config::CoreConfig;
pub use error::{AuthError, RecoveryError};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
