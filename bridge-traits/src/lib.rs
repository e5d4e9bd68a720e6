//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host shell.
//!
//! ## Overview
//!
//! This crate defines the contract between the r2box client core and the
//! environment embedding it. Each trait represents a capability that the core
//! requires but that is provided differently per host (desktop app, TUI,
//! webview bridge).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Backend calls and direct-to-storage uploads
//! - [`SecureStore`](storage::SecureStore) - Session token persistence
//! - [`Navigator`](navigation::Navigator) - Hard navigation of the host UI
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert their own errors to `BridgeError`, and must
//! report deadline expiry as [`BridgeError::Timeout`] so the core can tell a
//! timeout apart from other transport failures.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.
//!
//! ## Test Support
//!
//! The `test-support` feature exposes [`testing`] with a scripted HTTP client,
//! an in-memory secure store and a recording navigator.

pub mod error;
pub mod http;
pub mod logging;
pub mod navigation;
pub mod storage;

#[cfg(feature = "test-support")]
pub mod testing;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, TransferProgress};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use navigation::Navigator;
pub use storage::SecureStore;
