//! # Client Context
//!
//! Composition root of the r2box client core. Host shells build one
//! [`R2BoxClient`] at start-up, drive every session through it and
//! [`dispose`](R2BoxClient::dispose) it on shutdown.

use crate::error::{Result, ServiceError};
use crate::navigation::{NavigationGuard, Route, Router};
use bridge_traits::Navigator;
use core_api::models::SetupResult;
use core_api::{
    ApiClient, ApiError, ApiGateway, ConnectionTestResult, FileRecord, R2Config, SetupStatus,
    StorageStats, TokenStore,
};
use core_auth::{AuthSession, LoginOutcome, SessionState};
use core_files::{FileListing, Page};
use core_runtime::config::{ClientConfig, ExpiryOption};
use core_runtime::events::{EventBus, EventStream};
use core_runtime::BuildInfo;
use core_upload::{UploadHandle, UploadManager, UploadSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct R2BoxClient {
    api: ApiClient,
    auth: AuthSession,
    files: FileListing,
    uploads: UploadManager,
    router: Arc<Router>,
    guard: NavigationGuard,
    event_bus: EventBus,
    disposed: Arc<AtomicBool>,
}

impl R2BoxClient {
    /// Wire every session from `config` and restore a persisted token.
    ///
    /// The restored session is not trusted until [`check_auth`](Self::check_auth)
    /// or the navigation guard revalidates it. A secure store that cannot be
    /// read leaves the client signed out rather than failing start-up.
    #[instrument(skip_all, fields(api = %config.api_base_url))]
    pub async fn bootstrap(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer);
        let tokens = TokenStore::new(Arc::clone(&config.secure_store));
        let router = Arc::new(Router::new(config.navigator.clone(), event_bus.clone()));

        let gateway = ApiGateway::with_session(
            Arc::clone(&config.http_client),
            config.api_base_url.clone(),
            config.request_timeout,
            tokens.clone(),
            Arc::clone(&router) as Arc<dyn Navigator>,
            event_bus.clone(),
        );
        let api = ApiClient::new(Arc::new(gateway));

        let auth = AuthSession::new(api.clone(), tokens, event_bus.clone());
        match auth.hydrate().await {
            Ok(found) => info!(restored = found, "Client bootstrapped"),
            Err(e) => warn!(error = %e, "Could not restore session; starting signed out"),
        }

        let files = FileListing::new(api.clone(), config.page_size, event_bus.clone());
        let uploads = UploadManager::new(
            api.clone(),
            Arc::clone(&config.http_client),
            config.upload,
            event_bus.clone(),
        );
        let guard = NavigationGuard::new(Arc::new(auth.clone()));

        Ok(Self {
            api,
            auth,
            files,
            uploads,
            router,
            guard,
            event_bus,
            disposed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Cancel every running upload and close the client. Later operations
    /// fail with [`ServiceError::Disposed`].
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancelled = self.uploads.cancel_all().await;
        self.uploads.shutdown();
        info!(cancelled_uploads = cancelled, "Client disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_disposed() {
            Err(ServiceError::Disposed)
        } else {
            Ok(())
        }
    }

    // -- sessions -----------------------------------------------------------

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    pub fn files(&self) -> &FileListing {
        &self.files
    }

    pub fn uploads(&self) -> &UploadManager {
        &self.uploads
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // -- auth ---------------------------------------------------------------

    pub async fn login(&self, password: &str) -> Result<LoginOutcome> {
        self.ensure_open()?;
        Ok(self.auth.login(password).await?)
    }

    pub async fn setup_password(&self, password: &str) -> Result<LoginOutcome> {
        self.ensure_open()?;
        Ok(self.auth.setup_password(password).await?)
    }

    pub async fn check_auth(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.auth.check_auth().await)
    }

    pub async fn logout(&self) -> Result<()> {
        self.ensure_open()?;
        self.auth.logout().await;
        Ok(())
    }

    pub async fn session(&self) -> SessionState {
        self.auth.state().await
    }

    // -- navigation ---------------------------------------------------------

    /// Navigate through the guard. Returns the route actually entered.
    pub async fn navigate(&self, path: &str) -> Result<Route> {
        self.ensure_open()?;
        self.router.navigate(&self.guard, path).await
    }

    pub fn current_route(&self) -> Option<Route> {
        self.router.current()
    }

    // -- files --------------------------------------------------------------

    pub async fn fetch_files(&self, page: u32) -> Result<Page<FileRecord>> {
        self.ensure_open()?;
        Ok(self.files.fetch_files(page).await?)
    }

    pub async fn delete_file(&self, id: &str) -> Result<Page<FileRecord>> {
        self.ensure_open()?;
        Ok(self.files.delete_file(id).await?)
    }

    // -- uploads ------------------------------------------------------------

    pub async fn start_upload(&self, source: UploadSource) -> Result<UploadHandle> {
        self.ensure_open()?;
        Ok(self.uploads.start_upload(source).await?)
    }

    pub async fn start_upload_with_expiry(
        &self,
        source: UploadSource,
        expiry: ExpiryOption,
    ) -> Result<UploadHandle> {
        self.ensure_open()?;
        Ok(self.uploads.start_upload_with_expiry(source, expiry).await?)
    }

    // -- setup & stats ------------------------------------------------------

    pub async fn storage_stats(&self) -> Result<StorageStats> {
        self.ensure_open()?;
        Ok(self.api.stats().await?)
    }

    pub async fn setup_status(&self) -> Result<SetupStatus> {
        self.ensure_open()?;
        Ok(self.api.setup_status().await?)
    }

    /// Save bucket settings. On success the session no longer needs setup.
    pub async fn save_r2_config(&self, config: &R2Config) -> Result<SetupResult> {
        self.ensure_open()?;
        require_complete(config)?;
        let result = self.api.save_config(config).await?;
        self.auth.mark_setup_complete().await;
        Ok(result)
    }

    /// Try bucket settings without saving them.
    pub async fn test_r2_connection(&self, config: &R2Config) -> Result<ConnectionTestResult> {
        self.ensure_open()?;
        require_complete(config)?;
        Ok(self.api.test_connection(config).await?)
    }

    pub fn build_info(&self) -> BuildInfo {
        BuildInfo::current()
    }

    // -- events -------------------------------------------------------------

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }
}

fn require_complete(config: &R2Config) -> Result<()> {
    let missing = config.missing_fields();
    if missing.is_empty() {
        return Ok(());
    }
    Err(ApiError::Validation {
        message: format!("missing required fields: {}", missing.join(", ")),
    }
    .into())
}

impl std::fmt::Debug for R2BoxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2BoxClient")
            .field("api", &self.api.gateway().base_url())
            .field("router", &self.router)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
