//! Session lifecycle: login, restore, refresh, logout, and role checks.
//!
//! One [`SessionManager`] is shared by the whole embedder, usually behind an
//! `Arc`. There is no process-global state; callers that need the bearer
//! token attach it per request through [`SessionManager::authorize`].

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use anyhow::Result;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::client::ApiClient;
use crate::config::CoreConfig;
use crate::error::AuthError;
use crate::session::models::{
    LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, Role, Session, UserProfile,
};
use crate::session::store::CredentialStore;

pub struct SessionManager {
    client: ApiClient,
    store: Arc<dyn CredentialStore>,
    session: RwLock<Option<Session>>,
    // Serializes login and refresh so concurrent callers cannot race the
    // server into rotating the same refresh token twice.
    auth_gate: Mutex<()>,
    default_scope: Option<String>,
}

impl SessionManager {
    /// # Errors
    /// Returns an error if the configured API base URL is invalid.
    pub fn new(config: &CoreConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(config)?,
            store,
            session: RwLock::new(None),
            auth_gate: Mutex::new(()),
            default_scope: config.default_service_scope().map(ToString::to_string),
        })
    }

    /// Loads persisted credentials into memory, if any are usable.
    ///
    /// Returns `true` when a session was restored. Unusable leftovers are
    /// cleared from the store so they are not retried on every start.
    pub fn restore(&self) -> bool {
        match self.store.load() {
            Some(session) if session.is_usable() => {
                self.write_slot(Some(session));
                debug!("Restored persisted session");
                true
            }
            Some(_) => {
                self.store.clear();
                false
            }
            None => false,
        }
    }

    /// Authenticates against `/auth/login` and installs the session.
    ///
    /// The identifier is trimmed and lowercased before it is sent. When
    /// `service_scope` is `None` the configured default scope, if any, is
    /// used instead.
    ///
    /// # Errors
    /// Returns [`AuthError::Validation`] for empty inputs without touching
    /// the network, otherwise the classified server error.
    pub async fn login(
        &self,
        identifier: &str,
        secret: &SecretString,
        service_scope: Option<&str>,
    ) -> Result<Session, AuthError> {
        self.login_inner(identifier, secret, service_scope, false)
            .await
    }

    /// Like [`SessionManager::login`] but rejects accounts below
    /// [`Role::Superadmin`] even when the credentials are valid.
    ///
    /// # Errors
    /// Returns [`AuthError::AccessDenied`] for non-superadmin accounts; the
    /// rejected session is not installed and stored credentials are cleared.
    pub async fn login_admin(
        &self,
        identifier: &str,
        secret: &SecretString,
        service_scope: Option<&str>,
    ) -> Result<Session, AuthError> {
        self.login_inner(identifier, secret, service_scope, true)
            .await
    }

    #[instrument(skip(self, identifier, secret))]
    async fn login_inner(
        &self,
        identifier: &str,
        secret: &SecretString,
        service_scope: Option<&str>,
        admin_only: bool,
    ) -> Result<Session, AuthError> {
        let identifier = normalize_identifier(identifier);
        if identifier.is_empty() {
            return Err(AuthError::Validation(
                "identifier must not be empty".to_string(),
            ));
        }
        if secret.expose_secret().is_empty() {
            return Err(AuthError::Validation(
                "password must not be empty".to_string(),
            ));
        }

        let _guard = self.auth_gate.lock().await;

        let request = LoginRequest {
            identifier: &identifier,
            secret: secret.expose_secret(),
            service_scope: service_scope.or(self.default_scope.as_deref()),
            is_admin_login: admin_only.then_some(true),
        };

        let response: LoginResponse = self
            .client
            .post_json("/auth/login", &request, None)
            .await
            .map_err(AuthError::from_api)?;

        if admin_only && response.user.role != Role::Superadmin {
            self.clear_session();
            warn!("Rejected admin login for non-superadmin account");
            return Err(AuthError::AccessDenied);
        }

        let session = Session::issue(response.user, response.tokens);
        self.install(session.clone());
        debug!("Login succeeded for user {}", session.user.id);

        Ok(session)
    }

    /// Exchanges the current refresh token for a new token pair.
    ///
    /// Concurrent calls are collapsed: whoever enters first performs the
    /// exchange, later callers observe the rotated session and return it
    /// without a second request. A logout issued while the exchange is in
    /// flight wins; the late response is discarded instead of reinstalling
    /// the session.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidCredentials`] when no session is active,
    /// including when it was cleared mid-exchange. Any server-side failure
    /// clears the session before the classified error is returned; there is
    /// no half-refreshed state to keep.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Session, AuthError> {
        let Some(before) = self.session() else {
            return Err(AuthError::InvalidCredentials);
        };

        let _guard = self.auth_gate.lock().await;

        // Another task may have finished the exchange while we waited.
        let Some(current) = self.session() else {
            return Err(AuthError::InvalidCredentials);
        };
        if current.refresh_token != before.refresh_token {
            return Ok(current);
        }

        let request = RefreshRequest {
            refresh_token: &current.refresh_token,
        };

        match self
            .client
            .post_json::<_, RefreshResponse>("/auth/refresh", &request, Some(&current.access_token))
            .await
        {
            Ok(response) => {
                let session = Session::issue(current.user, response.tokens);
                if self.install_if_current(&current.refresh_token, session.clone()) {
                    debug!("Session refreshed for user {}", session.user.id);
                    Ok(session)
                } else {
                    debug!("Discarding refresh response, session changed mid-exchange");
                    self.session().ok_or(AuthError::InvalidCredentials)
                }
            }
            Err(err) => {
                warn!("Session refresh failed: {err}");
                self.clear_session();
                Err(AuthError::from_api(err))
            }
        }
    }

    /// Drops the in-memory session and clears persisted credentials.
    ///
    /// Purely local and idempotent; it never fails and never talks to the
    /// server.
    pub fn logout(&self) {
        self.clear_session();
        debug!("Session cleared");
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.read_slot().clone()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.read_slot().as_ref().map(|s| s.user.clone())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read_slot().as_ref().is_some_and(Session::is_usable)
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.read_slot()
            .as_ref()
            .is_some_and(|s| s.is_usable() && s.user.role == role)
    }

    #[must_use]
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.read_slot()
            .as_ref()
            .is_some_and(|s| s.is_usable() && roles.contains(&s.user.role))
    }

    /// Access token of the current session, if one is active.
    #[must_use]
    pub fn bearer_token(&self) -> Option<String> {
        self.read_slot()
            .as_ref()
            .map(|s| s.access_token.clone())
            .filter(|token| !token.is_empty())
    }

    /// Attaches the current bearer token to an outgoing request, if any.
    ///
    /// This is the injection point for embedders making their own API calls;
    /// nothing in this crate mutates global client state.
    #[must_use]
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub(crate) fn api(&self) -> &ApiClient {
        &self.client
    }

    fn install(&self, session: Session) {
        self.store.save(&session);
        self.write_slot(Some(session));
    }

    /// Swaps in a rotated session only while `exchanged` is still the live
    /// refresh token. Returns whether the rotation landed.
    fn install_if_current(&self, exchanged: &str, session: Session) -> bool {
        let mut slot = self.session.write().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(live) if live.refresh_token == exchanged => {
                // Persisting under the slot lock keeps the store and the
                // slot in step with a concurrent clear.
                self.store.save(&session);
                *slot = Some(session);
                true
            }
            _ => false,
        }
    }

    fn clear_session(&self) {
        // Slot before store; a rotation checks the slot before it persists.
        self.write_slot(None);
        self.store.clear();
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self, value: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}
