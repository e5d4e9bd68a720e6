//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the r2box client core:
//! - Logging and tracing setup
//! - Client configuration
//! - Event bus
//! - Build metadata
//!
//! ## Overview
//!
//! Every other core crate depends on this one. It fixes the logging
//! conventions, the configuration surface and the event types that sessions
//! broadcast to the host.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod version;

pub use config::{ClientConfig, ExpiryOption, UploadSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};
pub use version::BuildInfo;
