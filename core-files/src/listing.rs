//! # File Listing Session
//!
//! Holds the page of uploaded files the UI is showing and keeps it in step
//! with the backend. There is no local editing of the page: every change is
//! followed by a refetch of the page being displayed.

use crate::error::{FilesError, Result};
use crate::pagination::{Page, PageRequest};
use core_api::{ApiClient, FileRecord};
use core_runtime::events::{CoreEvent, EventBus, FilesEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
pub struct FileListing {
    api: ApiClient,
    page_size: u32,
    current: Arc<RwLock<Page<FileRecord>>>,
    loading: Arc<LoadingFlag>,
    event_bus: EventBus,
}

impl FileListing {
    pub fn new(api: ApiClient, page_size: u32, event_bus: EventBus) -> Self {
        Self {
            api,
            page_size,
            current: Arc::new(RwLock::new(Page::empty(page_size))),
            loading: Arc::new(LoadingFlag::new()),
            event_bus,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch `page` (1-indexed) and make it the displayed page.
    ///
    /// On failure the previous page stays displayed and the error is
    /// returned as-is.
    #[instrument(skip(self))]
    pub async fn fetch_files(&self, page: u32) -> Result<Page<FileRecord>> {
        if page == 0 {
            return Err(FilesError::InvalidPage(page));
        }

        let response = {
            let _loading = self.loading.begin();
            self.api.list_files(page, self.page_size).await
        }
        .map_err(|e| {
            warn!(error = %e, page, "Failed to fetch file list");
            e
        })?;

        // The backend clamps out-of-range values; trust what it echoes.
        let request = PageRequest::new(
            if response.page > 0 { response.page } else { page },
            if response.limit > 0 {
                response.limit
            } else {
                self.page_size
            },
        );
        let listed = Page::new(response.files.unwrap_or_default(), response.total, request);

        *self.current.write().await = listed.clone();
        debug!(
            page = listed.page,
            items = listed.items.len(),
            total = listed.total,
            "File page loaded"
        );
        let _ = self.event_bus.emit(CoreEvent::Files(FilesEvent::PageLoaded {
            page: listed.page,
            items: listed.items.len(),
            total: listed.total,
        }));

        Ok(listed)
    }

    /// Delete a file, then refetch the displayed page once.
    ///
    /// Nothing is refetched when the delete itself fails.
    #[instrument(skip(self))]
    pub async fn delete_file(&self, id: &str) -> Result<Page<FileRecord>> {
        if !is_valid_file_id(id) {
            return Err(FilesError::InvalidFileId(id.to_string()));
        }

        self.api.delete_file(id).await.map_err(|e| {
            warn!(error = %e, "Failed to delete file");
            e
        })?;
        info!(file_id = id, "File deleted");
        let _ = self.event_bus.emit(CoreEvent::Files(FilesEvent::FileDeleted {
            file_id: id.to_string(),
        }));

        let page = self.current.read().await.page.max(1);
        self.fetch_files(page).await
    }

    /// Refetch the displayed page.
    pub async fn refresh(&self) -> Result<Page<FileRecord>> {
        let page = self.current.read().await.page.max(1);
        self.fetch_files(page).await
    }

    pub async fn current_page(&self) -> Page<FileRecord> {
        self.current.read().await.clone()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.sender.borrow()
    }

    /// Receiver that observes the loading flag.
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.sender.subscribe()
    }

    /// Where the UI should send the user to download `record`.
    pub fn download_link(&self, record: &FileRecord) -> String {
        if record.download_url.is_empty() {
            self.api.download_url(&record.id)
        } else {
            self.api.site_url(&record.download_url)
        }
    }

    /// Public share link of `record`, if it has a short code.
    pub fn share_link(&self, record: &FileRecord) -> Option<String> {
        if record.short_code.is_empty() {
            None
        } else {
            Some(self.api.short_url(&record.short_code))
        }
    }
}

/// Loading flag that stays up while any fetch is in flight.
struct LoadingFlag {
    sender: watch::Sender<bool>,
    in_flight: AtomicUsize,
}

impl LoadingFlag {
    fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
            in_flight: AtomicUsize::new(0),
        }
    }

    fn begin(&self) -> LoadingGuard<'_> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.sender.send_replace(true);
        }
        LoadingGuard { flag: self }
    }
}

/// Lowers the flag on drop, so a failed or abandoned fetch clears it too.
struct LoadingGuard<'a> {
    flag: &'a LoadingFlag,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.flag.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.flag.sender.send_replace(false);
        }
    }
}

/// Backend ids are UUIDs; anything outside `[A-Za-z0-9_-]` would change
/// the request path.
fn is_valid_file_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::testing::{json_response, Scripted, ScriptedHttpClient};
    use bridge_traits::HttpMethod;
    use core_api::{ApiError, ApiGateway};
    use serde_json::json;
    use std::time::Duration;

    fn listing(http: Arc<ScriptedHttpClient>) -> FileListing {
        let gateway = ApiGateway::new(http, "https://files.example.com/api", Duration::from_secs(5));
        FileListing::new(ApiClient::new(Arc::new(gateway)), 20, EventBus::new(16))
    }

    fn records(n: usize, offset: usize) -> serde_json::Value {
        json!((0..n)
            .map(|i| json!({ "id": format!("f{}", offset + i), "filename": format!("file{}.bin", offset + i) }))
            .collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_fetch_replaces_page() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.on_json(
            HttpMethod::Get,
            "/files",
            200,
            json!({ "files": records(20, 0), "total": 45, "page": 1, "limit": 20 }),
        );
        let files = listing(http);

        let page = files.fetch_files(1).await.unwrap();

        assert_eq!(page.items.len(), 20);
        assert_eq!(page.total, 45);
        assert_eq!(page.total_pages, 3);
        assert_eq!(files.current_page().await, page);
        assert!(!files.is_loading());
    }

    #[tokio::test]
    async fn test_null_files_is_empty_page() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.on_json(
            HttpMethod::Get,
            "/files",
            200,
            json!({ "files": null, "total": 0, "page": 1, "limit": 20 }),
        );

        let page = listing(http).fetch_files(1).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_page_and_clears_loading() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.on_json(
            HttpMethod::Get,
            "/files?page=1",
            200,
            json!({ "files": records(2, 0), "total": 2, "page": 1, "limit": 20 }),
        );
        http.on_json(
            HttpMethod::Get,
            "/files?page=2",
            500,
            json!({ "error": "database unavailable" }),
        );
        let files = listing(http);
        files.fetch_files(1).await.unwrap();

        let err = files.fetch_files(2).await.unwrap_err();

        assert!(matches!(err, FilesError::Api(ApiError::Status { status: 500, .. })));
        assert_eq!(files.current_page().await.items.len(), 2);
        assert!(!files.is_loading());
    }

    #[tokio::test]
    async fn test_loading_flag_is_observable() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.on_fn(HttpMethod::Get, "/files", |_| {
            Scripted::Delay(
                Duration::from_millis(50),
                json_response(200, &json!({ "files": [], "total": 0, "page": 1, "limit": 20 })),
            )
        });
        let files = listing(http);
        let mut loading = files.loading();

        let fetch = {
            let files = files.clone();
            tokio::spawn(async move { files.fetch_files(1).await })
        };

        loading.changed().await.unwrap();
        assert!(*loading.borrow_and_update());
        loading.changed().await.unwrap();
        assert!(!*loading.borrow_and_update());

        fetch.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_delete_refetches_current_page_once() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.on_json(
            HttpMethod::Get,
            "/files?page=3",
            200,
            json!({ "files": records(1, 40), "total": 41, "page": 3, "limit": 20 }),
        );
        http.on_json(
            HttpMethod::Delete,
            "/files/f40",
            200,
            json!({ "success": true, "message": "deleted" }),
        );
        let files = listing(http.clone());
        files.fetch_files(3).await.unwrap();

        files.delete_file("f40").await.unwrap();

        assert_eq!(http.count(HttpMethod::Delete, "/files/f40"), 1);
        // One initial fetch plus exactly one refetch of page 3.
        assert_eq!(http.count(HttpMethod::Get, "/files?page=3"), 2);
        assert_eq!(http.count(HttpMethod::Get, "/files?page=2"), 0);
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_refetch() {
        let http = Arc::new(ScriptedHttpClient::new());
        http.on_json(
            HttpMethod::Delete,
            "/files/missing",
            404,
            json!({ "error": "file not found" }),
        );
        let files = listing(http.clone());

        let err = files.delete_file("missing").await.unwrap_err();

        assert_eq!(err.to_string(), "HTTP 404: file not found");
        assert_eq!(http.count(HttpMethod::Get, "/files"), 0);
    }

    #[tokio::test]
    async fn test_invalid_arguments_make_no_request() {
        let http = Arc::new(ScriptedHttpClient::new());
        let files = listing(http.clone());

        assert!(matches!(files.fetch_files(0).await, Err(FilesError::InvalidPage(0))));
        for id in ["", "../stats", "f1?force=1", "f1#x", "f 1", "f1\n", "fé"] {
            assert!(
                matches!(files.delete_file(id).await, Err(FilesError::InvalidFileId(_))),
                "{:?} accepted",
                id
            );
        }
        assert!(http.requests().is_empty());
    }

    #[test]
    fn test_links() {
        let files = listing(Arc::new(ScriptedHttpClient::new()));
        let mut record = FileRecord {
            id: "f1".into(),
            short_code: "Ab3x".into(),
            ..Default::default()
        };

        assert_eq!(
            files.download_link(&record),
            "https://files.example.com/api/files/f1/download"
        );
        assert_eq!(
            files.share_link(&record).as_deref(),
            Some("https://files.example.com/s/Ab3x")
        );

        record.download_url = "https://bucket.r2.dev/f1?X-Amz-Signature=x".into();
        assert_eq!(files.download_link(&record), record.download_url);
    }
}
