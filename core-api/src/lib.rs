//! # Backend API
//!
//! HTTP gateway and typed endpoint client for the r2box backend.
//!
//! ## Overview
//!
//! - [`ApiGateway`] runs every backend request through the middleware stack
//!   ([`RequestDecorator`]s, then the transport under a deadline, then
//!   [`ResponsePolicy`]s) and maps non-2xx statuses onto [`ApiError`]
//! - [`ApiClient`] exposes one typed method per REST endpoint
//! - [`TokenStore`] persists the session token in the host's secure store
//!
//! Presigned storage uploads do not go through this crate; they are plain
//! PUTs without a bearer token.

pub mod client;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod token_store;

pub use client::ApiClient;
pub use error::{ApiError, ErrorKind, Result};
pub use gateway::ApiGateway;
pub use middleware::{
    BearerAuth, PolicyOutcome, RequestContext, RequestDecorator, ResponsePolicy,
    UnauthorizedRedirect, LOGIN_PATH,
};
pub use models::{
    AuthStatus, CompletedPart, ConnectionTestResult, FileRecord, LoginResponse, R2Config,
    SetupStatus, StorageStats, UploadRequest,
};
pub use token_store::{TokenStore, TOKEN_KEY};
