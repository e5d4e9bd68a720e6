//! Request and response middleware for the API gateway.
//!
//! Decorators run on every outbound backend request before it reaches the
//! transport; policies observe every response before it is mapped to a
//! result. The standard stack is [`BearerAuth`] plus [`UnauthorizedRedirect`].

use crate::token_store::TokenStore;
use async_trait::async_trait;
use bridge_traits::{HttpMethod, HttpRequest, HttpResponse, Navigator};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tracing::{debug, warn};

/// Path prefix of the endpoints that establish or inspect a session.
pub const AUTH_PATH_PREFIX: &str = "/auth/";

/// Where the host is sent when the backend rejects the session.
pub const LOGIN_PATH: &str = "/login";

/// The request a middleware is acting on, relative to the API base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: HttpMethod,
    pub path: String,
}

impl RequestContext {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    /// Auth endpoints answer 401 for a wrong password; that is not an
    /// expired session.
    pub fn is_auth_endpoint(&self) -> bool {
        self.path.contains(AUTH_PATH_PREFIX)
    }
}

#[async_trait]
pub trait RequestDecorator: Send + Sync {
    async fn decorate(&self, ctx: &RequestContext, request: HttpRequest) -> HttpRequest;
}

/// What the gateway should do after a policy looked at a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    Continue,
    /// The session was revoked; the response still maps to an error.
    SessionRevoked,
}

#[async_trait]
pub trait ResponsePolicy: Send + Sync {
    async fn on_response(&self, ctx: &RequestContext, response: &HttpResponse) -> PolicyOutcome;
}

/// Attaches `Authorization: Bearer <token>` when a session token is present.
pub struct BearerAuth {
    tokens: TokenStore,
}

impl BearerAuth {
    pub fn new(tokens: TokenStore) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl RequestDecorator for BearerAuth {
    async fn decorate(&self, ctx: &RequestContext, request: HttpRequest) -> HttpRequest {
        match self.tokens.current().await {
            Some(token) => request.bearer_token(token),
            None => {
                debug!(path = %ctx.path, "No session token, sending request anonymously");
                request
            }
        }
    }
}

/// On a 401 from a non-auth endpoint, clears the session token and hard
/// navigates the host to the login screen.
pub struct UnauthorizedRedirect {
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
    event_bus: EventBus,
    login_path: String,
}

impl UnauthorizedRedirect {
    pub fn new(tokens: TokenStore, navigator: Arc<dyn Navigator>, event_bus: EventBus) -> Self {
        Self {
            tokens,
            navigator,
            event_bus,
            login_path: LOGIN_PATH.to_string(),
        }
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }
}

#[async_trait]
impl ResponsePolicy for UnauthorizedRedirect {
    async fn on_response(&self, ctx: &RequestContext, response: &HttpResponse) -> PolicyOutcome {
        if response.status != 401 || ctx.is_auth_endpoint() {
            return PolicyOutcome::Continue;
        }

        warn!(method = %ctx.method, path = %ctx.path, "Session rejected by backend, redirecting to login");

        if let Err(e) = self.tokens.clear().await {
            warn!(error = %e, "Failed to clear persisted token after 401");
        }
        self.event_bus
            .emit(CoreEvent::Auth(AuthEvent::SessionExpired))
            .ok();
        self.navigator.hard_navigate(&self.login_path);

        PolicyOutcome::SessionRevoked
    }
}
