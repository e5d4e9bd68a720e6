//! Session token storage using the OS keychain

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use keyring::Entry;
use tracing::{debug, error};

const DEFAULT_SERVICE: &str = "r2box";

/// [`SecureStore`] over the OS credential vault (Keychain, Credential
/// Manager or Secret Service), one entry per key under a shared service name.
///
/// Values are base64-encoded since the vault only holds strings. Keyring
/// calls block on platform IPC, so each one runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct KeyringSecureStore {
    service_name: String,
}

impl KeyringSecureStore {
    pub fn new() -> Self {
        Self::with_service_name(DEFAULT_SERVICE)
    }

    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> std::result::Result<T, keyring::Error> + Send + 'static,
    {
        let service = self.service_name.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key).map_err(map_keyring_error)?;
            op(entry).map_err(map_keyring_error)
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("Keyring task failed: {}", e)))?
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

fn map_keyring_error(e: keyring::Error) -> BridgeError {
    match e {
        keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
            BridgeError::NotAvailable(format!("Keyring unavailable: {}", e))
        }
        other => BridgeError::OperationFailed(format!("Keyring error: {}", other)),
    }
}

#[async_trait]
impl SecureStore for KeyringSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let encoded = STANDARD.encode(value);
        self.with_entry(key, move |entry| entry.set_password(&encoded))
            .await?;

        debug!(key = key, "Stored secret in keyring");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let stored = self
            .with_entry(key, |entry| match entry.get_password() {
                Ok(encoded) => Ok(Some(encoded)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(e),
            })
            .await?;

        let Some(encoded) = stored else {
            debug!(key = key, "Secret not found in keyring");
            return Ok(None);
        };

        let decoded = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
            error!(key = key, error = %e, "Failed to decode secret");
            BridgeError::OperationFailed(format!("Failed to decode secret: {}", e))
        })?;
        Ok(Some(decoded))
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await?;

        debug!(key = key, "Deleted secret from keyring");
        Ok(())
    }
}
