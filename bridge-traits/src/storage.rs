//! Secret persistence.
//!
//! Persists the small amount of client state that must survive a restart
//! (the session token).

use async_trait::async_trait;

use crate::error::Result;

/// Key/value vault for secrets.
///
/// Desktop shells back this with the OS keychain; browser shells with
/// whatever storage the host page offers. Values are opaque bytes and must
/// never be written to logs.
///
/// ```ignore
/// async fn remember(store: &dyn SecureStore, token: &str) -> Result<()> {
///     store.set_secret("r2box.token", token.as_bytes()).await
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value under `key`.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// `Ok(None)` when nothing is stored under `key`.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Deleting a missing key succeeds.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }
}
