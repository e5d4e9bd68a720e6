//! # Core Service
//!
//! Client facade and bootstrap for the r2box client core.
//!
//! This crate wires host-provided bridges (HTTP transport, secure storage,
//! navigation) into the shared sessions and exposes them through one
//! [`R2BoxClient`]. Desktop hosts typically enable the `desktop-shims`
//! feature, which supplies a reqwest transport and a keyring-backed token
//! store when none is injected.
//!
//! ```rust,ignore
//! use core_runtime::config::ClientConfig;
//! use core_service::R2BoxClient;
//!
//! # async fn example() -> core_service::Result<()> {
//! let config = ClientConfig::builder()
//!     .api_base_url("https://files.example.com/api")
//!     .build()?;
//! let client = R2BoxClient::bootstrap(config).await?;
//!
//! let route = client.navigate("/files").await?;
//! println!("entered {}", route);
//!
//! client.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod navigation;

pub use client::R2BoxClient;
pub use error::{Result, ServiceError};
pub use navigation::{GuardDecision, NavigationGuard, Route, Router, SessionProbe};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::{KeyringSecureStore, ReqwestHttpClient};
