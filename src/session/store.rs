//! Credential persistence behind a narrow trait.
//!
//! Stores are best effort. A broken store means the user signs in again on
//! the next start, never that a live auth operation fails.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::session::models::{Session, UserProfile};

/// Serialized form of a session at rest.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredCredentials {
    access_token: String,
    refresh_token: String,
    profile: UserProfile,
    issued_at_unix: i64,
}

impl StoredCredentials {
    fn into_session(self) -> Session {
        Session::restore(
            self.profile,
            self.access_token,
            self.refresh_token,
            self.issued_at_unix,
        )
    }
}

impl From<&Session> for StoredCredentials {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            profile: session.user.clone(),
            issued_at_unix: session.issued_at_unix,
        }
    }
}

/// Where credentials live between page loads or process restarts.
pub trait CredentialStore: Send + Sync {
    fn save(&self, session: &Session);
    fn load(&self) -> Option<Session>;
    fn clear(&self);
}

/// In-memory store for tests and ephemeral embedders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<StoredCredentials>>,
}

impl MemoryStore {
    fn slot(&self) -> MutexGuard<'_, Option<StoredCredentials>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryStore {
    fn save(&self, session: &Session) {
        *self.slot() = Some(StoredCredentials::from(session));
    }

    fn load(&self) -> Option<Session> {
        self.slot().clone().map(StoredCredentials::into_session)
    }

    fn clear(&self) {
        *self.slot() = None;
    }
}

/// JSON-file-backed store for desktop and test embedders.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileStore {
    fn save(&self, session: &Session) {
        let stored = StoredCredentials::from(session);
        match serde_json::to_vec_pretty(&stored) {
            Ok(bytes) => {
                if let Err(err) = fs::write(&self.path, bytes) {
                    error!(
                        "Failed to persist credentials to {}: {err}",
                        self.path.display()
                    );
                }
            }
            Err(err) => error!("Failed to encode credentials: {err}"),
        }
    }

    fn load(&self) -> Option<Session> {
        let bytes = fs::read(&self.path).ok()?;
        match serde_json::from_slice::<StoredCredentials>(&bytes) {
            Ok(stored) => Some(stored.into_session()),
            Err(err) => {
                debug!(
                    "Ignoring malformed credential file {}: {err}",
                    self.path.display()
                );
                None
            }
        }
    }

    fn clear(&self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                error!(
                    "Failed to remove credential file {}: {err}",
                    self.path.display()
                );
            }
        }
    }
}
