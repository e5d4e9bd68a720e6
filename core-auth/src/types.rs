use serde::{Deserialize, Serialize};
use std::fmt;

/// Fallback shown when the backend rejects a login without a reason.
pub const DEFAULT_LOGIN_FAILURE: &str = "login failed";

/// In-memory session flags.
///
/// The token itself lives in the [`TokenStore`](core_api::TokenStore).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub authenticated: bool,
    /// The backend has a password but no bucket configuration yet.
    pub needs_setup: bool,
}

impl SessionState {
    pub fn signed_in(needs_setup: bool) -> Self {
        Self {
            authenticated: true,
            needs_setup,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.authenticated, self.needs_setup) {
            (false, _) => write!(f, "signed out"),
            (true, false) => write!(f, "signed in"),
            (true, true) => write!(f, "signed in, setup pending"),
        }
    }
}

/// Result of a login attempt.
///
/// A wrong password or an unreachable backend is a `Rejected` outcome rather
/// than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success { needs_setup: bool },
    Rejected { message: String },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success { .. })
    }

    pub(crate) fn rejected(message: Option<&str>) -> Self {
        LoginOutcome::Rejected {
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(DEFAULT_LOGIN_FAILURE)
                .to_string(),
        }
    }
}
