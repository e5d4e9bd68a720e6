//! Wire types for the r2box REST API.
//!
//! Response structs default every field the backend may omit so that a
//! partially populated body still decodes.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct PasswordRequest<'a> {
    pub password: &'a str,
}

impl fmt::Debug for PasswordRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordRequest")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Body of `POST /auth/login` and `POST /auth/setup-password`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoginResponse {
    pub success: bool,
    pub need_setup: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl LoginResponse {
    /// Backend failure text, whichever key carried it.
    pub fn failure_message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .filter(|m| !m.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub need_setup: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PasswordStatus {
    pub password_set: bool,
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Bucket connection settings entered in the setup wizard.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct R2Config {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
}

impl R2Config {
    pub fn new(
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        bucket_name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            bucket_name: bucket_name.into(),
        }
    }

    /// Names of the fields left blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("endpoint", &self.endpoint),
            ("access_key_id", &self.access_key_id),
            ("secret_access_key", &self.secret_access_key),
            ("bucket_name", &self.bucket_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

impl fmt::Debug for R2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R2Config")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

/// The non-secret part of a saved bucket configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfiguredBucket {
    pub endpoint: String,
    pub bucket_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SetupStatus {
    pub configured: bool,
    pub config: Option<ConfiguredBucket>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SetupResult {
    pub success: bool,
    pub message: Option<String>,
}

/// Outcome of `POST /setup/test`. A failed connection test still answers 200.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
    pub bucket_info: Option<serde_json::Map<String, serde_json::Value>>,
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Body of `POST /upload/presign` and `POST /upload/multipart/init`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadRequest {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    /// Retention in days; negative values are seconds (test option).
    pub expires_in: i32,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PresignResponse {
    pub file_id: String,
    pub upload_url: String,
    pub download_url: String,
    pub short_url: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MultipartInit {
    pub file_id: String,
    pub upload_id: String,
    pub part_size: u64,
    pub total_parts: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PartPresignRequest<'a> {
    pub file_id: &'a str,
    pub upload_id: &'a str,
    pub part_number: u32,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PartPresignResponse {
    pub upload_url: String,
    pub part_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompleteMultipartRequest<'a> {
    pub file_id: &'a str,
    pub upload_id: &'a str,
    pub parts: &'a [CompletedPart],
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompleteMultipartResponse {
    pub file_id: String,
    pub download_url: String,
    pub short_url: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileIdRequest<'a> {
    pub file_id: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfirmResponse {
    pub success: bool,
    pub message: String,
    pub download_url: String,
    pub short_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CancelUploadRequest<'a> {
    pub file_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// A stored file as listed by `GET /files`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    pub r2_key: String,
    pub size: i64,
    pub content_type: String,
    pub expires_in: i32,
    pub created_at: String,
    pub expires_at: String,
    pub upload_status: String,
    pub short_code: String,
    pub remaining_time: String,
    /// Presigned download link; empty when the backend could not sign one.
    pub download_url: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileListResponse {
    /// `null` when there are no files.
    pub files: Option<Vec<FileRecord>>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Serialize)]
pub(crate) struct ListQuery {
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageStats {
    pub used_space: u64,
    pub total_space: u64,
    pub used_space_formatted: String,
    pub total_space_formatted: String,
    pub usage_percent: f64,
    pub file_count: u64,
    pub expiring_today: u64,
    pub expiring_this_week: u64,
}
