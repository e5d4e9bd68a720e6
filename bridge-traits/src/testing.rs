//! In-memory bridge doubles for tests.
//!
//! Enabled with the `test-support` feature. The workspace crates use these
//! to drive their sessions against a scripted backend without a network.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, TransferProgress};
use crate::navigation::Navigator;
use crate::storage::SecureStore;

/// What a scripted route does with a matching request.
pub enum Scripted {
    Respond(HttpResponse),
    Fail(BridgeError),
    Delay(Duration, HttpResponse),
    /// Never completes; used to hold a transfer open until it is cancelled.
    Hang,
}

type Handler = Arc<dyn Fn(&HttpRequest) -> Scripted + Send + Sync>;

struct Route {
    method: HttpMethod,
    fragment: String,
    handler: Handler,
}

/// HTTP client answering from a table of `(method, url fragment)` routes.
///
/// When several fragments match a URL the longest one wins. Every executed
/// request is recorded, including ones that hit no route (those get a 404).
#[derive(Default)]
pub struct ScriptedHttpClient {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
    chunk_size: Option<usize>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report upload progress in chunks of `size` bytes instead of all at once.
    pub fn with_upload_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    pub fn on_fn<F>(&self, method: HttpMethod, fragment: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(&HttpRequest) -> Scripted + Send + Sync + 'static,
    {
        self.routes.lock().unwrap().push(Route {
            method,
            fragment: fragment.into(),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn on(&self, method: HttpMethod, fragment: impl Into<String>, response: HttpResponse) -> &Self {
        self.on_fn(method, fragment, move |_| Scripted::Respond(response.clone()))
    }

    pub fn on_json(
        &self,
        method: HttpMethod,
        fragment: impl Into<String>,
        status: u16,
        body: serde_json::Value,
    ) -> &Self {
        self.on(method, fragment, json_response(status, &body))
    }

    pub fn on_timeout(&self, method: HttpMethod, fragment: impl Into<String>) -> &Self {
        self.on_fn(method, fragment, |req| {
            Scripted::Fail(BridgeError::Timeout(req.url.clone()))
        })
    }

    pub fn on_hang(&self, method: HttpMethod, fragment: impl Into<String>) -> &Self {
        self.on_fn(method, fragment, |_| Scripted::Hang)
    }

    /// All requests executed so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of recorded requests with `method` whose URL contains `fragment`.
    pub fn count(&self, method: HttpMethod, fragment: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.contains(fragment))
            .count()
    }

    fn resolve(&self, request: &HttpRequest) -> Scripted {
        let routes = self.routes.lock().unwrap();
        let handler = routes
            .iter()
            .filter(|r| r.method == request.method && request.url.contains(&r.fragment))
            .max_by_key(|r| r.fragment.len())
            .map(|r| r.handler.clone());
        drop(routes);

        match handler {
            Some(handler) => handler(request),
            None => Scripted::Respond(json_response(
                404,
                &serde_json::json!({ "error": "no scripted route" }),
            )),
        }
    }

    async fn run(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        match self.resolve(&request) {
            Scripted::Respond(response) => Ok(response),
            Scripted::Fail(error) => Err(error),
            Scripted::Delay(delay, response) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Scripted::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.run(request).await
    }

    async fn upload(
        &self,
        request: HttpRequest,
        on_progress: TransferProgress,
    ) -> Result<HttpResponse> {
        let len = request.body_len();
        match self.chunk_size {
            Some(size) => {
                let mut sent = 0u64;
                while sent < len {
                    let step = (len - sent).min(size as u64);
                    sent += step;
                    on_progress(step);
                    tokio::task::yield_now().await;
                }
                self.run(request).await
            }
            None => {
                let response = self.run(request).await?;
                on_progress(len);
                Ok(response)
            }
        }
    }
}

/// Build a response with a JSON body.
pub fn json_response(status: u16, body: &serde_json::Value) -> HttpResponse {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    HttpResponse::new(status, Bytes::from(bytes)).with_header("Content-Type", "application/json")
}

/// Secure store backed by a `HashMap`.
#[derive(Default)]
pub struct MemorySecureStore {
    secrets: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .secrets
            .lock()
            .unwrap()
            .insert(key.to_string(), value.as_bytes().to_vec());
        store
    }

    /// Raw string value under `key`, for assertions.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.secrets
            .lock()
            .unwrap()
            .get(key)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        self.secrets
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.secrets.lock().unwrap().get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.secrets.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Navigator that records every hard navigation.
#[derive(Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn hard_navigate(&self, path: &str) {
        self.visits.lock().unwrap().push(path.to_string());
    }
}
