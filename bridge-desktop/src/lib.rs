//! Desktop host bridge for the r2box client.
//!
//! [`ReqwestHttpClient`] talks to the r2box API and streams presigned PUT
//! bodies to object storage. [`KeyringSecureStore`] keeps the session token
//! in the OS credential vault; it sits behind the `secure-store` feature,
//! which is on by default.
//!
//! ```ignore
//! use bridge_desktop::{KeyringSecureStore, ReqwestHttpClient};
//! use core_runtime::config::ClientConfig;
//! use std::sync::Arc;
//!
//! let config = ClientConfig::builder()
//!     .api_base_url("https://box.example.com/api")
//!     .http_client(Arc::new(ReqwestHttpClient::new()?))
//!     .secure_store(Arc::new(KeyringSecureStore::new()))
//!     .build()?;
//! ```

mod http;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use http::ReqwestHttpClient;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
