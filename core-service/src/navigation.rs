//! # Navigation
//!
//! Declarative route table, the guard that gates route entry, and the
//! router that applies its decisions.
//!
//! ## Guard decisions
//!
//! | Condition | Action |
//! |---|---|
//! | Route is public | proceed |
//! | Not authenticated and revalidation fails | redirect to `/login` |
//! | Storage not configured and not heading to `/setup` | redirect to `/setup` |
//! | Otherwise | proceed |
//!
//! A hard navigation (see [`Navigator`]) replaces the current route without
//! consulting the guard.

use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use bridge_traits::Navigator;
use core_auth::AuthSession;
use core_runtime::events::{CoreEvent, EventBus, NavigationEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Screens of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    Login,
    Setup,
    Upload,
    Files,
    Stats,
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Login,
        Route::Setup,
        Route::Upload,
        Route::Files,
        Route::Stats,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Setup => "/setup",
            Route::Upload => "/",
            Route::Files => "/files",
            Route::Stats => "/stats",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Setup => "Setup",
            Route::Upload => "Upload",
            Route::Files => "Files",
            Route::Stats => "Stats",
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Login)
    }

    /// Resolve a location. Query strings, fragments and a trailing slash are
    /// ignored.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        Self::ALL.into_iter().find(|route| route.path() == path)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(Route),
}

/// Session queries the guard depends on.
#[async_trait]
pub trait SessionProbe: Send + Sync {
    async fn is_authenticated(&self) -> bool;

    /// Revalidate against the backend.
    async fn check_auth(&self) -> bool;

    async fn needs_setup(&self) -> bool;
}

#[async_trait]
impl SessionProbe for AuthSession {
    async fn is_authenticated(&self) -> bool {
        AuthSession::is_authenticated(self).await
    }

    async fn check_auth(&self) -> bool {
        AuthSession::check_auth(self).await
    }

    async fn needs_setup(&self) -> bool {
        AuthSession::needs_setup(self).await
    }
}

#[derive(Clone)]
pub struct NavigationGuard {
    session: Arc<dyn SessionProbe>,
}

impl NavigationGuard {
    pub fn new(session: Arc<dyn SessionProbe>) -> Self {
        Self { session }
    }

    pub async fn evaluate(&self, to: Route) -> GuardDecision {
        if !to.requires_auth() {
            return GuardDecision::Proceed;
        }

        if !self.session.is_authenticated().await && !self.session.check_auth().await {
            return GuardDecision::Redirect(Route::Login);
        }

        if self.session.needs_setup().await && to != Route::Setup {
            return GuardDecision::Redirect(Route::Setup);
        }

        GuardDecision::Proceed
    }
}

/// Holds the current route and applies guard decisions.
///
/// Implements [`Navigator`] so the gateway's 401 policy can force the login
/// screen; hard navigations are forwarded to the host's navigator, if any.
pub struct Router {
    current: watch::Sender<Option<Route>>,
    host: Option<Arc<dyn Navigator>>,
    event_bus: EventBus,
}

impl Router {
    pub fn new(host: Option<Arc<dyn Navigator>>, event_bus: EventBus) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            host,
            event_bus,
        }
    }

    pub fn current(&self) -> Option<Route> {
        *self.current.borrow()
    }

    /// Receiver that observes route changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Route>> {
        self.current.subscribe()
    }

    /// Navigate to `path` through `guard`. Returns the route actually entered.
    pub async fn navigate(&self, guard: &NavigationGuard, path: &str) -> Result<Route> {
        let requested =
            Route::from_path(path).ok_or_else(|| ServiceError::UnknownRoute(path.to_string()))?;

        match guard.evaluate(requested).await {
            GuardDecision::Proceed => {
                self.current.send_replace(Some(requested));
                debug!(route = %requested, "Route entered");
                self.emit(NavigationEvent::Entered {
                    path: requested.path().to_string(),
                });
                Ok(requested)
            }
            GuardDecision::Redirect(target) => {
                self.current.send_replace(Some(target));
                info!(requested = %requested, route = %target, "Route redirected");
                self.emit(NavigationEvent::Redirected {
                    requested: requested.path().to_string(),
                    path: target.path().to_string(),
                });
                Ok(target)
            }
        }
    }

    fn emit(&self, event: NavigationEvent) {
        let _ = self.event_bus.emit(CoreEvent::Navigation(event));
    }
}

impl Navigator for Router {
    fn hard_navigate(&self, path: &str) {
        match Route::from_path(path) {
            Some(route) => {
                self.current.send_replace(Some(route));
            }
            None => warn!(path, "Hard navigation to an unknown route"),
        }
        info!(path, "Hard navigation");
        self.emit(NavigationEvent::HardNavigated {
            path: path.to_string(),
        });

        if let Some(host) = &self.host {
            host.hard_navigate(path);
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("current", &self.current())
            .field("has_host", &self.host.is_some())
            .finish()
    }
}
