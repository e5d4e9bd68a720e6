//! Starts upload sessions and keeps track of the ones still running.

use crate::error::{Result, UploadError};
use crate::handle::UploadHandle;
use crate::progress::ProgressTracker;
use crate::source::UploadSource;
use crate::task::{is_multipart, UploadTask};
use bridge_traits::HttpClient;
use core_api::ApiClient;
use core_runtime::config::{ExpiryOption, UploadSettings};
use core_runtime::events::EventBus;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Upload entry point.
///
/// Each upload runs as its own task with a child of the manager's
/// cancellation token, so [`shutdown`](Self::shutdown) stops all of them.
#[derive(Clone)]
pub struct UploadManager {
    api: ApiClient,
    http: Arc<dyn HttpClient>,
    settings: UploadSettings,
    event_bus: EventBus,
    active: Arc<Mutex<HashMap<String, CancellationToken>>>,
    root: CancellationToken,
}

impl UploadManager {
    pub fn new(
        api: ApiClient,
        http: Arc<dyn HttpClient>,
        settings: UploadSettings,
        event_bus: EventBus,
    ) -> Self {
        Self {
            api,
            http,
            settings,
            event_bus,
            active: Arc::new(Mutex::new(HashMap::new())),
            root: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Whether `size` bytes would go through the multipart path.
    pub fn uses_multipart(&self, size: u64) -> bool {
        is_multipart(size, self.settings.multipart_threshold)
    }

    /// Start uploading with the configured default expiry.
    pub async fn start_upload(&self, source: UploadSource) -> Result<UploadHandle> {
        self.start_upload_with_expiry(source, self.settings.default_expiry)
            .await
    }

    /// Start uploading `source`; the stored file expires after `expiry`.
    ///
    /// Validation failures are returned before anything is sent.
    pub async fn start_upload_with_expiry(
        &self,
        source: UploadSource,
        expiry: ExpiryOption,
    ) -> Result<UploadHandle> {
        if self.root.is_cancelled() {
            return Err(UploadError::ShutDown);
        }
        source.validate(self.settings.max_file_size)?;

        let id = Uuid::new_v4().to_string();
        let source = Arc::new(source);
        let cancel = self.root.child_token();
        let tracker = Arc::new(ProgressTracker::new(
            id.clone(),
            source.size(),
            self.event_bus.clone(),
        ));
        let progress = tracker.subscribe();

        let task = UploadTask {
            id: id.clone(),
            api: self.api.clone(),
            http: Arc::clone(&self.http),
            settings: self.settings,
            source: Arc::clone(&source),
            expires_in: expiry.wire_value(),
            cancel: cancel.clone(),
            tracker,
            event_bus: self.event_bus.clone(),
        };
        let multipart = task.is_multipart();

        self.active.lock().await.insert(id.clone(), cancel.clone());
        let active = Arc::clone(&self.active);
        let task_id = id.clone();
        let join = tokio::spawn(async move {
            let result = task.run().await;
            active.lock().await.remove(&task_id);
            result
        });

        debug!(upload_id = %id, multipart, "Upload task spawned");
        Ok(UploadHandle::new(
            id,
            source.filename().to_string(),
            source.size(),
            multipart,
            cancel,
            progress,
            join,
        ))
    }

    /// Cancel one upload. Returns `false` if it is not running.
    pub async fn cancel(&self, upload_id: &str) -> bool {
        match self.active.lock().await.get(upload_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every running upload. New uploads can still be started.
    pub async fn cancel_all(&self) -> usize {
        let active = self.active.lock().await;
        for token in active.values() {
            token.cancel();
        }
        active.len()
    }

    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    pub async fn active_uploads(&self) -> Vec<String> {
        self.active.lock().await.keys().cloned().collect()
    }

    /// Cancel everything and refuse new uploads.
    pub fn shutdown(&self) {
        if !self.root.is_cancelled() {
            info!("Upload manager shutting down");
        }
        self.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}
