//! # Client Configuration
//!
//! Builder-based configuration for the r2box client core.
//!
//! ## Overview
//!
//! [`ClientConfig`] holds the backend location, transport limits, upload
//! tuning and the host bridges the core runs on. It is validated once, when
//! [`ClientConfigBuilder::build`] is called, so a misconfigured client fails
//! before any request is made.
//!
//! ## Required Dependencies
//!
//! - API base URL (e.g. `https://files.example.com/api`)
//! - `HttpClient` and `SecureStore` (desktop defaults with `desktop-shims`)
//!
//! ## Optional Dependencies
//!
//! - `Navigator` - receives hard navigations. When absent, the client's own
//!   router handles them.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{ClientConfig, ExpiryOption};
//! use std::time::Duration;
//!
//! let config = ClientConfig::builder()
//!     .api_base_url("https://files.example.com/api")
//!     .request_timeout(Duration::from_secs(30))
//!     .default_expiry(ExpiryOption::ThreeDays)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, Navigator, SecureStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const MIB: u64 = 1024 * 1024;

/// Default ceiling for a single backend request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Files at or above this size use multipart upload.
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 100 * MIB;
pub const DEFAULT_PART_CONCURRENCY: usize = 6;
/// Deadline for one direct-to-storage PUT (a whole file or one part).
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// The backend rejects pages larger than this.
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * MIB;
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// How long an uploaded file is kept before the backend expires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExpiryOption {
    /// Thirty seconds; for exercising expiry end to end.
    TestThirtySeconds,
    OneDay,
    ThreeDays,
    #[default]
    SevenDays,
    ThirtyDays,
}

impl ExpiryOption {
    pub const ALL: [ExpiryOption; 5] = [
        ExpiryOption::TestThirtySeconds,
        ExpiryOption::OneDay,
        ExpiryOption::ThreeDays,
        ExpiryOption::SevenDays,
        ExpiryOption::ThirtyDays,
    ];

    /// Value of the `expires_in` request field. Days, or -30 for the
    /// thirty-second test retention.
    pub fn wire_value(&self) -> i32 {
        match self {
            ExpiryOption::TestThirtySeconds => -30,
            ExpiryOption::OneDay => 1,
            ExpiryOption::ThreeDays => 3,
            ExpiryOption::SevenDays => 7,
            ExpiryOption::ThirtyDays => 30,
        }
    }

    pub fn from_wire_value(value: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.wire_value() == value)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExpiryOption::TestThirtySeconds => "30 seconds (test)",
            ExpiryOption::OneDay => "1 day",
            ExpiryOption::ThreeDays => "3 days",
            ExpiryOption::SevenDays => "7 days",
            ExpiryOption::ThirtyDays => "30 days",
        }
    }
}

impl fmt::Display for ExpiryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Upload tuning shared by every upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    pub multipart_threshold: u64,
    pub part_concurrency: usize,
    pub transfer_timeout: Duration,
    pub max_file_size: u64,
    pub default_expiry: ExpiryOption,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            part_concurrency: DEFAULT_PART_CONCURRENCY,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            default_expiry: ExpiryOption::default(),
        }
    }
}

/// Configuration for the r2box client core.
///
/// Use [`ClientConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct ClientConfig {
    /// Backend API root, without a trailing slash.
    pub api_base_url: String,

    /// Ceiling applied to each backend request.
    pub request_timeout: Duration,

    /// Items requested per file listing page.
    pub page_size: u32,

    pub upload: UploadSettings,

    /// Capacity of the event bus broadcast channel.
    pub event_buffer: usize,

    pub http_client: Arc<dyn HttpClient>,

    /// Persists the session token.
    pub secure_store: Arc<dyn SecureStore>,

    /// Host navigator; the client router is used when absent.
    pub navigator: Option<Arc<dyn Navigator>>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("page_size", &self.page_size)
            .field("upload", &self.upload)
            .field("event_buffer", &self.event_buffer)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("navigator", &self.navigator.as_ref().map(|_| "Navigator { ... }"))
            .finish()
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(Error::config(format!(
                "API base URL must be absolute (http:// or https://), got '{}'",
                self.api_base_url
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::config("Request timeout must be greater than zero"));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::config(format!(
                "Page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let upload = &self.upload;
        if upload.multipart_threshold == 0 {
            return Err(Error::config("Multipart threshold must be greater than 0 bytes"));
        }

        if upload.part_concurrency == 0 || upload.part_concurrency > 32 {
            return Err(Error::config("Part concurrency must be between 1 and 32"));
        }

        if upload.transfer_timeout.is_zero() {
            return Err(Error::config("Transfer timeout must be greater than zero"));
        }

        if upload.max_file_size == 0 {
            return Err(Error::config("Maximum file size must be greater than 0 bytes"));
        }

        if self.event_buffer == 0 {
            return Err(Error::config("Event buffer must hold at least one event"));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for backend calls. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Other hosts: inject a platform-native client."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::with_timeout(timeout).map_err(|e| {
        Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for session persistence. \
                 Desktop: enable the 'desktop-shims' feature to use KeyringSecureStore. \
                 Other hosts: inject platform-native secure storage."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Ok(Arc::new(bridge_desktop::KeyringSecureStore::new()))
}

/// Builder for constructing [`ClientConfig`] instances.
#[derive(Default)]
pub struct ClientConfigBuilder {
    api_base_url: Option<String>,
    request_timeout: Option<Duration>,
    page_size: Option<u32>,
    upload: UploadSettings,
    event_buffer: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl ClientConfigBuilder {
    /// Sets the backend API root, e.g. `https://files.example.com/api`.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Default: 30 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Default: 20
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Files of at least `bytes` are uploaded in parts. Default: 100 MiB
    pub fn multipart_threshold(mut self, bytes: u64) -> Self {
        self.upload.multipart_threshold = bytes;
        self
    }

    /// Parts in flight at once for a multipart upload. Default: 6
    pub fn part_concurrency(mut self, limit: usize) -> Self {
        self.upload.part_concurrency = limit;
        self
    }

    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.upload.transfer_timeout = timeout;
        self
    }

    /// Default: 5 GiB
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.upload.max_file_size = bytes;
        self
    }

    pub fn default_expiry(mut self, expiry: ExpiryOption) -> Self {
        self.upload.default_expiry = expiry;
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the reqwest-based client is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the secure store implementation.
    ///
    /// If not provided, the OS keychain is used when the `desktop-shims`
    /// feature is enabled.
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Builds the final `ClientConfig` instance.
    ///
    /// # Errors
    ///
    /// - The API base URL is missing or not absolute
    /// - A required bridge is missing and no desktop default is available
    /// - A limit is out of range
    pub fn build(self) -> Result<ClientConfig> {
        let api_base_url = self.api_base_url.ok_or_else(|| {
            Error::config("API base URL is required. Use .api_base_url() to set it.")
        })?;
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let config = ClientConfig {
            api_base_url,
            request_timeout,
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            upload: self.upload,
            event_buffer: self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER),
            http_client,
            secure_store,
            navigator: self.navigator,
        };

        config.validate()?;

        Ok(config)
    }
}
