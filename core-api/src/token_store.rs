//! Session Token Storage
//!
//! Persists the single opaque session token under a fixed key and keeps an
//! in-memory copy so request decoration never touches the OS keychain.
//!
//! ## Security
//!
//! - Token values are never logged
//! - A stored value that is not valid UTF-8 or is blank is deleted on load
//!
//! ## Example
//!
//! ```no_run
//! use core_api::TokenStore;
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_api::Result<()> {
//! let tokens = TokenStore::new(secure_store);
//! tokens.hydrate().await?;
//!
//! if tokens.current().await.is_none() {
//!     tokens.store("9f86d0...").await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{ApiError, Result};
use bridge_traits::storage::SecureStore;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Secure-store key holding the session token.
pub const TOKEN_KEY: &str = "auth_token";

/// Persisted session token with an in-memory cache.
///
/// Clones share the same cache.
#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
    cached: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        debug!("Initializing TokenStore");
        Self {
            secure_store,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Load the persisted token into memory.
    ///
    /// Returns whether a token was found.
    pub async fn hydrate(&self) -> Result<bool> {
        let raw = self
            .secure_store
            .get_secret(TOKEN_KEY)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to read session token from secure storage");
                ApiError::SecureStorage(e.to_string())
            })?;

        let token = match raw {
            None => None,
            Some(bytes) => match String::from_utf8(bytes) {
                Ok(token) if !token.trim().is_empty() => Some(token),
                _ => {
                    warn!("Stored session token is corrupted, deleting");
                    if let Err(e) = self.secure_store.delete_secret(TOKEN_KEY).await {
                        warn!(error = %e, "Failed to delete corrupted session token");
                    }
                    None
                }
            },
        };

        let found = token.is_some();
        *self.cached.write().await = token;
        debug!(found, "Session token hydrated");
        Ok(found)
    }

    /// Token currently in memory.
    pub async fn current(&self) -> Option<String> {
        self.cached.read().await.clone()
    }

    pub async fn is_present(&self) -> bool {
        self.cached.read().await.is_some()
    }

    /// Persist `token` and make it current.
    pub async fn store(&self, token: &str) -> Result<()> {
        self.secure_store
            .set_secret(TOKEN_KEY, token.as_bytes())
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to persist session token");
                ApiError::SecureStorage(e.to_string())
            })?;

        *self.cached.write().await = Some(token.to_string());
        info!("Session token stored");
        Ok(())
    }

    /// Forget the token in memory and in secure storage.
    ///
    /// The in-memory token is dropped even when the storage delete fails, so
    /// no further request carries it.
    pub async fn clear(&self) -> Result<()> {
        let had_token = self.cached.write().await.take().is_some();

        self.secure_store
            .delete_secret(TOKEN_KEY)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete session token from secure storage");
                ApiError::SecureStorage(e.to_string())
            })?;

        info!(had_token, "Session token cleared");
        Ok(())
    }
}
