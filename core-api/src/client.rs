//! Typed endpoint surface over [`ApiGateway`].

use crate::error::{ApiError, Result};
use crate::gateway::ApiGateway;
use crate::models::*;
use std::sync::Arc;
use tracing::{debug, instrument};

/// One method per backend REST call.
///
/// Cloning is cheap; clones share the gateway.
#[derive(Clone)]
pub struct ApiClient {
    gateway: Arc<ApiGateway>,
}

impl ApiClient {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    // -- auth ---------------------------------------------------------------

    #[instrument(skip_all)]
    pub async fn login(&self, password: &str) -> Result<LoginResponse> {
        self.gateway
            .post("/auth/login", &PasswordRequest { password })
            .await
    }

    pub async fn auth_status(&self) -> Result<AuthStatus> {
        self.gateway.get("/auth/status").await
    }

    pub async fn password_status(&self) -> Result<PasswordStatus> {
        self.gateway.get("/auth/password-status").await
    }

    #[instrument(skip_all)]
    pub async fn setup_password(&self, password: &str) -> Result<LoginResponse> {
        self.gateway
            .post("/auth/setup-password", &PasswordRequest { password })
            .await
    }

    // -- setup --------------------------------------------------------------

    pub async fn setup_status(&self) -> Result<SetupStatus> {
        self.gateway.get("/setup/status").await
    }

    #[instrument(skip(self, config), fields(bucket = %config.bucket_name))]
    pub async fn save_config(&self, config: &R2Config) -> Result<SetupResult> {
        let result: SetupResult = self.gateway.post("/setup/config", config).await?;
        if !result.success {
            return Err(ApiError::Validation {
                message: result
                    .message
                    .unwrap_or_else(|| "configuration was not saved".to_string()),
            });
        }
        Ok(result)
    }

    #[instrument(skip(self, config), fields(bucket = %config.bucket_name))]
    pub async fn test_connection(&self, config: &R2Config) -> Result<ConnectionTestResult> {
        self.gateway.post("/setup/test", config).await
    }

    // -- upload -------------------------------------------------------------

    #[instrument(skip(self, request), fields(filename = %request.filename, size = request.size))]
    pub async fn presign_upload(&self, request: &UploadRequest) -> Result<PresignResponse> {
        self.gateway.post("/upload/presign", request).await
    }

    pub async fn confirm_upload(&self, file_id: &str) -> Result<ConfirmResponse> {
        self.gateway
            .post("/upload/confirm", &FileIdRequest { file_id })
            .await
    }

    #[instrument(skip(self, request), fields(filename = %request.filename, size = request.size))]
    pub async fn init_multipart(&self, request: &UploadRequest) -> Result<MultipartInit> {
        self.gateway.post("/upload/multipart/init", request).await
    }

    pub async fn presign_part(
        &self,
        file_id: &str,
        upload_id: &str,
        part_number: u32,
    ) -> Result<PartPresignResponse> {
        self.gateway
            .post(
                "/upload/multipart/presign",
                &PartPresignRequest {
                    file_id,
                    upload_id,
                    part_number,
                },
            )
            .await
    }

    /// `parts` must already be sorted by part number.
    pub async fn complete_multipart(
        &self,
        file_id: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<CompleteMultipartResponse> {
        debug!(file_id, parts = parts.len(), "Completing multipart upload");
        self.gateway
            .post(
                "/upload/multipart/complete",
                &CompleteMultipartRequest {
                    file_id,
                    upload_id,
                    parts,
                },
            )
            .await
    }

    pub async fn cancel_upload(&self, file_id: &str, upload_id: Option<&str>) -> Result<()> {
        self.gateway
            .post_unit("/upload/cancel", &CancelUploadRequest { file_id, upload_id })
            .await
    }

    // -- files --------------------------------------------------------------

    pub async fn list_files(&self, page: u32, limit: u32) -> Result<FileListResponse> {
        let query = serde_urlencoded::to_string(ListQuery { page, limit })
            .map_err(|e| ApiError::Decode(format!("query: {}", e)))?;
        self.gateway.get(&format!("/files?{}", query)).await
    }

    pub async fn delete_file(&self, id: &str) -> Result<DeleteResponse> {
        self.gateway.delete(&format!("/files/{}", id)).await
    }

    pub async fn stats(&self) -> Result<StorageStats> {
        self.gateway.get("/stats").await
    }

    // -- urls ---------------------------------------------------------------

    /// Backend download link for a file; the backend redirects to storage.
    pub fn download_url(&self, id: &str) -> String {
        self.gateway.url(&format!("/files/{}/download", id))
    }

    /// Public share link for a short code.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/s/{}", self.gateway.origin(), code)
    }

    /// Resolve a link the backend returned relative to its own host.
    pub fn site_url(&self, link: &str) -> String {
        if link.is_empty() || link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else if link.starts_with('/') {
            format!("{}{}", self.gateway.origin(), link)
        } else {
            format!("{}/{}", self.gateway.origin(), link)
        }
    }
}
