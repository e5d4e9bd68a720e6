//! # Auth Session
//!
//! Owns the signed-in state of the client: the persisted session token, the
//! `authenticated` flag and the `needs_setup` flag reported by the backend.
//!
//! ## Lifecycle
//!
//! 1. [`AuthSession::hydrate`] loads a token left by a previous run. The
//!    session is not considered authenticated yet.
//! 2. [`AuthSession::check_auth`] revalidates the token against the backend.
//! 3. [`AuthSession::login`] or [`AuthSession::setup_password`] establish a
//!    fresh session; [`AuthSession::logout`] ends it locally.
//!
//! The gateway may clear the token behind the session's back when the
//! backend answers 401; [`AuthSession::is_authenticated`] reports false from
//! then on.

use crate::credential::derive_token;
use crate::error::{AuthError, Result};
use crate::types::{LoginOutcome, SessionState};
use core_api::{ApiClient, ApiError, LoginResponse, TokenStore};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Shared handle to the client's session. Clones observe the same state.
#[derive(Clone)]
pub struct AuthSession {
    api: ApiClient,
    tokens: TokenStore,
    state: Arc<RwLock<SessionState>>,
    event_bus: EventBus,
}

impl AuthSession {
    pub fn new(api: ApiClient, tokens: TokenStore, event_bus: EventBus) -> Self {
        Self {
            api,
            tokens,
            state: Arc::new(RwLock::new(SessionState::default())),
            event_bus,
        }
    }

    /// Load a persisted token. Returns whether one was found.
    pub async fn hydrate(&self) -> Result<bool> {
        let found = self.tokens.hydrate().await.map_err(storage_error)?;
        debug!(found, "Auth session hydrated");
        Ok(found)
    }

    /// True while the session flag is set and a token is still held.
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.authenticated && self.tokens.is_present().await
    }

    pub async fn needs_setup(&self) -> bool {
        self.state.read().await.needs_setup
    }

    pub async fn has_token(&self) -> bool {
        self.tokens.is_present().await
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Sign in with the admin password.
    ///
    /// Only a secure-storage failure is returned as an error; every backend
    /// or transport problem becomes [`LoginOutcome::Rejected`].
    #[instrument(skip_all)]
    pub async fn login(&self, password: &str) -> Result<LoginOutcome> {
        let response = self.api.login(password).await;
        self.establish(password, response).await
    }

    /// First-run password setup. The backend signs the caller in on success,
    /// always with setup still pending.
    #[instrument(skip_all)]
    pub async fn setup_password(&self, password: &str) -> Result<LoginOutcome> {
        if password.is_empty() {
            return Err(AuthError::EmptyPassword);
        }
        let response = self.api.setup_password(password).await.map(|mut r| {
            r.need_setup = true;
            r
        });
        self.establish(password, response).await
    }

    async fn establish(
        &self,
        password: &str,
        response: core_api::Result<LoginResponse>,
    ) -> Result<LoginOutcome> {
        let outcome = match response {
            Ok(body) if body.success => {
                self.tokens
                    .store(&derive_token(password))
                    .await
                    .map_err(storage_error)?;
                *self.state.write().await = SessionState::signed_in(body.need_setup);
                info!(needs_setup = body.need_setup, "Signed in");
                LoginOutcome::Success {
                    needs_setup: body.need_setup,
                }
            }
            Ok(body) => LoginOutcome::rejected(body.failure_message()),
            Err(error) => {
                warn!(error = %error, "Login request failed");
                LoginOutcome::rejected(backend_message(&error))
            }
        };

        let event = match &outcome {
            LoginOutcome::Success { needs_setup } => AuthEvent::SignedIn {
                needs_setup: *needs_setup,
            },
            LoginOutcome::Rejected { message } => AuthEvent::LoginRejected {
                message: message.clone(),
            },
        };
        let _ = self.event_bus.emit(CoreEvent::Auth(event));

        Ok(outcome)
    }

    /// Revalidate the stored token.
    ///
    /// Without a token this returns false without contacting the backend.
    /// Any failure of the status call ends the session.
    #[instrument(skip(self))]
    pub async fn check_auth(&self) -> bool {
        if !self.tokens.is_present().await {
            debug!("No session token, skipping status check");
            return false;
        }

        match self.api.auth_status().await {
            Ok(status) => {
                *self.state.write().await = SessionState {
                    authenticated: status.authenticated,
                    needs_setup: status.need_setup,
                };
                debug!(
                    authenticated = status.authenticated,
                    needs_setup = status.need_setup,
                    "Session revalidated"
                );
                status.authenticated
            }
            Err(error) => {
                warn!(error = %error, "Session check failed, signing out");
                self.logout().await;
                false
            }
        }
    }

    /// End the session locally. There is no backend call.
    pub async fn logout(&self) {
        *self.state.write().await = SessionState::default();
        if let Err(e) = self.tokens.clear().await {
            warn!(error = %e, "Failed to remove persisted session token");
        }
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedOut));
        info!("Signed out");
    }

    /// Whether the backend already has an admin password.
    pub async fn password_status(&self) -> Result<bool> {
        Ok(self.api.password_status().await?.password_set)
    }

    /// Record that the bucket configuration has been saved.
    pub async fn mark_setup_complete(&self) {
        self.state.write().await.needs_setup = false;
        debug!("Setup marked complete");
    }
}

fn storage_error(error: ApiError) -> AuthError {
    AuthError::SecureStorageUnavailable(error.to_string())
}

fn backend_message(error: &ApiError) -> Option<&str> {
    match error {
        ApiError::Unauthorized { message }
        | ApiError::Validation { message }
        | ApiError::Status { message, .. } => Some(message.as_str()),
        _ => None,
    }
}
