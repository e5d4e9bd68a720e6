//! # Upload Coordinator
//!
//! Drives one upload session from presign to confirmation.
//!
//! ## Workflow
//!
//! ### Single PUT (size below the multipart threshold)
//! 1. `POST /upload/presign` for one signed URL
//! 2. PUT the whole body straight to storage
//! 3. `POST /upload/confirm`
//!
//! ### Multipart
//! 1. `POST /upload/multipart/init` for the part plan
//! 2. For each part, with at most `part_concurrency` in flight: presign the
//!    part, PUT it, keep the returned ETag
//! 3. `POST /upload/multipart/complete` with the parts sorted by number
//!
//! Cancelling at any point stops in-flight transfers, discards their late
//! progress reports and asks the backend to drop the remote object.

use crate::error::{Result, UploadError};
use crate::handle::{UploadOutcome, UploadReceipt};
use crate::progress::ProgressTracker;
use crate::source::UploadSource;
use crate::state::UploadState;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, TransferProgress};
use core_api::models::{MultipartInit, PresignResponse};
use core_api::{ApiClient, CompletedPart, UploadRequest};
use core_runtime::config::UploadSettings;
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// The backend-side identity of an upload, once it has one.
#[derive(Debug, Clone)]
struct RemoteUpload {
    file_id: String,
    upload_id: Option<String>,
}

pub(crate) struct UploadTask {
    pub(crate) id: String,
    pub(crate) api: ApiClient,
    pub(crate) http: Arc<dyn HttpClient>,
    pub(crate) settings: UploadSettings,
    pub(crate) source: Arc<UploadSource>,
    pub(crate) expires_in: i32,
    pub(crate) cancel: CancellationToken,
    pub(crate) tracker: Arc<ProgressTracker>,
    pub(crate) event_bus: EventBus,
}

impl UploadTask {
    pub(crate) fn is_multipart(&self) -> bool {
        is_multipart(self.source.size(), self.settings.multipart_threshold)
    }

    #[instrument(skip(self), fields(upload_id = %self.id, filename = %self.source.filename()))]
    pub(crate) async fn run(self) -> Result<UploadOutcome> {
        let multipart = self.is_multipart();
        self.emit(UploadEvent::Started {
            upload_id: self.id.clone(),
            filename: self.source.filename().to_string(),
            size: self.source.size(),
            multipart,
        });
        info!(size = self.source.size(), multipart, "Upload started");

        self.tracker.set_state(UploadState::Presigning)?;

        let mut remote = None;
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            result = self.drive(&mut remote) => result,
        };

        match result {
            Ok(receipt) => {
                self.tracker.set_state(UploadState::Completed)?;
                info!(file_id = %receipt.file_id, "Upload completed");
                self.emit(UploadEvent::Completed {
                    upload_id: self.id.clone(),
                    file_id: receipt.file_id.clone(),
                    download_url: receipt.download_url.clone(),
                    short_url: receipt.short_url.clone(),
                });
                Ok(UploadOutcome::Completed(receipt))
            }
            Err(e) if e.is_cancelled() || self.cancel.is_cancelled() => {
                self.tracker.mute();
                self.tracker.set_state(UploadState::Cancelled)?;
                info!("Upload cancelled");
                self.release(remote).await;
                self.emit(UploadEvent::Cancelled {
                    upload_id: self.id.clone(),
                });
                Ok(UploadOutcome::Cancelled)
            }
            Err(e) => {
                self.tracker.mute();
                if let Err(transition) = self.tracker.set_state(UploadState::Failed) {
                    warn!(error = %transition, "Could not record failure");
                }
                warn!(error = %e, "Upload failed");
                self.release(remote).await;
                self.emit(UploadEvent::Failed {
                    upload_id: self.id.clone(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(&self, remote: &mut Option<RemoteUpload>) -> Result<UploadReceipt> {
        let request = UploadRequest {
            filename: self.source.filename().to_string(),
            content_type: self.source.content_type().to_string(),
            size: self.source.size(),
            expires_in: self.expires_in,
        };

        if self.is_multipart() {
            self.upload_multipart(&request, remote).await
        } else {
            self.upload_single(&request, remote).await
        }
    }

    async fn upload_single(
        &self,
        request: &UploadRequest,
        remote: &mut Option<RemoteUpload>,
    ) -> Result<UploadReceipt> {
        let presign: PresignResponse = self.api.presign_upload(request).await?;
        *remote = Some(RemoteUpload {
            file_id: presign.file_id.clone(),
            upload_id: None,
        });

        self.tracker.set_state(UploadState::Transferring)?;
        let body = self.source.read_range(0, self.source.size()).await?;
        put_object(
            self.http.as_ref(),
            &presign.upload_url,
            Some(self.source.content_type()),
            body,
            self.settings.transfer_timeout,
            &self.tracker,
            None,
        )
        .await?;

        self.tracker.set_state(UploadState::Confirming)?;
        let confirm = self.api.confirm_upload(&presign.file_id).await?;
        if !confirm.success {
            return Err(UploadError::NotConfirmed(confirm.message));
        }

        Ok(self.receipt(
            &presign.file_id,
            first_non_empty(&confirm.download_url, &presign.download_url),
            first_non_empty(&confirm.short_url, &presign.short_url),
            &presign.expires_at,
            false,
        ))
    }

    async fn upload_multipart(
        &self,
        request: &UploadRequest,
        remote: &mut Option<RemoteUpload>,
    ) -> Result<UploadReceipt> {
        let init = self.api.init_multipart(request).await?;
        *remote = Some(RemoteUpload {
            file_id: init.file_id.clone(),
            upload_id: Some(init.upload_id.clone()),
        });
        let parts = plan_parts(self.source.size(), &init)?;
        debug!(parts = parts.len(), part_size = init.part_size, "Multipart plan accepted");

        self.tracker.set_state(UploadState::Transferring)?;

        let context = Arc::new(PartContext {
            api: self.api.clone(),
            http: Arc::clone(&self.http),
            source: Arc::clone(&self.source),
            file_id: init.file_id.clone(),
            upload_id: init.upload_id.clone(),
            transfer_timeout: self.settings.transfer_timeout,
            tracker: Arc::clone(&self.tracker),
            cancel: self.cancel.clone(),
            limiter: Arc::new(Semaphore::new(self.settings.part_concurrency.max(1))),
        });

        // Dropping the set aborts whatever is still running.
        let mut in_flight = JoinSet::new();
        for part in parts.iter().copied() {
            in_flight.spawn(upload_part(Arc::clone(&context), part));
        }

        let mut completed = Vec::with_capacity(parts.len());
        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok(Ok(part)) => completed.push(part),
                Ok(Err(e)) => {
                    in_flight.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    in_flight.abort_all();
                    return Err(UploadError::TaskFailed(e.to_string()));
                }
            }
        }
        completed.sort_by_key(|part| part.part_number);

        self.tracker.set_state(UploadState::Confirming)?;
        let done = self
            .api
            .complete_multipart(&init.file_id, &init.upload_id, &completed)
            .await?;

        let file_id = if done.file_id.is_empty() {
            init.file_id.as_str()
        } else {
            done.file_id.as_str()
        };
        Ok(self.receipt(
            file_id,
            &done.download_url,
            &done.short_url,
            &done.expires_at,
            true,
        ))
    }

    /// Ask the backend to drop a remote upload that will never be confirmed.
    async fn release(&self, remote: Option<RemoteUpload>) {
        let Some(remote) = remote else {
            return;
        };
        if let Err(e) = self
            .api
            .cancel_upload(&remote.file_id, remote.upload_id.as_deref())
            .await
        {
            warn!(error = %e, file_id = %remote.file_id, "Backend cleanup failed");
        }
    }

    fn receipt(
        &self,
        file_id: &str,
        download_url: &str,
        short_url: &str,
        expires_at: &str,
        multipart: bool,
    ) -> UploadReceipt {
        let download_url = if download_url.is_empty() {
            self.api.download_url(file_id)
        } else {
            self.api.site_url(download_url)
        };
        UploadReceipt {
            upload_id: self.id.clone(),
            file_id: file_id.to_string(),
            filename: self.source.filename().to_string(),
            size: self.source.size(),
            download_url,
            short_url: (!short_url.is_empty()).then(|| self.api.site_url(short_url)),
            expires_at: (!expires_at.is_empty()).then(|| expires_at.to_string()),
            multipart,
        }
    }

    fn emit(&self, event: UploadEvent) {
        let _ = self.event_bus.emit(CoreEvent::Upload(event));
    }
}

pub(crate) fn is_multipart(size: u64, threshold: u64) -> bool {
    size >= threshold
}

fn first_non_empty<'a>(preferred: &'a str, fallback: &'a str) -> &'a str {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}

/// One slice of the source in a multipart upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PartSpec {
    pub(crate) number: u32,
    pub(crate) offset: u64,
    pub(crate) len: u64,
}

/// Split `size` bytes by the backend's part size. Part numbers start at 1.
pub(crate) fn plan_parts(size: u64, init: &MultipartInit) -> Result<Vec<PartSpec>> {
    if init.file_id.is_empty() || init.upload_id.is_empty() {
        return Err(UploadError::InvalidPlan("missing file or upload id".to_string()));
    }
    if init.part_size == 0 {
        return Err(UploadError::InvalidPlan("part size is zero".to_string()));
    }

    let count = size.div_ceil(init.part_size);
    let count = u32::try_from(count)
        .map_err(|_| UploadError::InvalidPlan(format!("{} parts is too many", count)))?;
    if init.total_parts != 0 && init.total_parts != count {
        warn!(
            expected = count,
            reported = init.total_parts,
            "Backend part count disagrees with part size"
        );
    }

    Ok((0..count)
        .map(|index| {
            let offset = u64::from(index) * init.part_size;
            PartSpec {
                number: index + 1,
                offset,
                len: init.part_size.min(size - offset),
            }
        })
        .collect())
}

struct PartContext {
    api: ApiClient,
    http: Arc<dyn HttpClient>,
    source: Arc<UploadSource>,
    file_id: String,
    upload_id: String,
    transfer_timeout: Duration,
    tracker: Arc<ProgressTracker>,
    cancel: CancellationToken,
    limiter: Arc<Semaphore>,
}

async fn upload_part(context: Arc<PartContext>, part: PartSpec) -> Result<CompletedPart> {
    let _permit = tokio::select! {
        biased;
        _ = context.cancel.cancelled() => return Err(UploadError::Cancelled),
        permit = Arc::clone(&context.limiter).acquire_owned() => permit
            .map_err(|e| UploadError::TaskFailed(e.to_string()))?,
    };

    tokio::select! {
        biased;
        _ = context.cancel.cancelled() => Err(UploadError::Cancelled),
        result = send_part(&context, part) => result,
    }
}

async fn send_part(context: &PartContext, part: PartSpec) -> Result<CompletedPart> {
    let presigned = context
        .api
        .presign_part(&context.file_id, &context.upload_id, part.number)
        .await?;
    let body = context.source.read_range(part.offset, part.len).await?;

    let response = put_object(
        context.http.as_ref(),
        &presigned.upload_url,
        None,
        body,
        context.transfer_timeout,
        &context.tracker,
        Some(part.number),
    )
    .await?;

    let etag = response
        .header("ETag")
        .map(str::trim)
        .filter(|etag| !etag.is_empty())
        .ok_or(UploadError::MissingETag {
            part_number: part.number,
        })?;
    debug!(part = part.number, "Part stored");

    Ok(CompletedPart {
        part_number: part.number,
        etag: etag.to_string(),
    })
}

/// PUT `body` to a presigned storage URL.
///
/// The single-PUT signature covers `Content-Type`, so it must be sent exactly
/// as presigned; part URLs are signed without one.
async fn put_object(
    http: &dyn HttpClient,
    url: &str,
    content_type: Option<&str>,
    body: bytes::Bytes,
    deadline: Duration,
    tracker: &Arc<ProgressTracker>,
    part_number: Option<u32>,
) -> Result<HttpResponse> {
    let mut request = HttpRequest::new(HttpMethod::Put, url)
        .body(body)
        .timeout(deadline);
    if let Some(content_type) = content_type {
        request = request.header("Content-Type", content_type);
    }

    let tracker = Arc::clone(tracker);
    let on_progress: TransferProgress = Arc::new(move |bytes| tracker.add_bytes(bytes));

    let response = match tokio::time::timeout(deadline, http.upload(request, on_progress)).await {
        Err(_) => return Err(UploadError::Timeout(deadline)),
        Ok(Err(e)) if e.is_timeout() => return Err(UploadError::Timeout(deadline)),
        Ok(Err(e)) => {
            return Err(UploadError::Transfer {
                part_number,
                message: e.to_string(),
            })
        }
        Ok(Ok(response)) => response,
    };

    if !response.is_success() {
        return Err(UploadError::Transfer {
            part_number,
            message: format!("HTTP {}", response.status),
        });
    }
    Ok(response)
}
