//! # Authentication Module
//!
//! Password sign-in against the r2box backend.
//!
//! ## Overview
//!
//! The backend protects every resource with a single admin password. A
//! successful login yields a session token that is persisted through the
//! host's secure store, attached to later requests by the API gateway and
//! revalidated on start-up.
//!
//! ## Features
//!
//! - Login, first-run password setup and local logout
//! - Start-up hydration and revalidation of a persisted session
//! - Tracking of the backend's "storage not configured yet" flag
//! - Auth event emission

pub mod credential;
pub mod error;
pub mod session;
pub mod types;

pub use credential::derive_token;
pub use error::{AuthError, Result};
pub use session::AuthSession;
pub use types::{LoginOutcome, SessionState, DEFAULT_LOGIN_FAILURE};
