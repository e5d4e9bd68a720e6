//! `reqwest` transport for desktop hosts.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, TransferProgress},
};
use bytes::Bytes;
use futures_util::stream;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Size of the slices an upload body is streamed in.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// [`HttpClient`] over a pooled `reqwest::Client`.
///
/// Every request carries a deadline, 30 s unless the request or
/// [`with_timeout`](Self::with_timeout) says otherwise. Upload bodies are
/// streamed in 64 KiB slices so progress can be reported as they leave.
/// Requests are sent exactly once.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Client whose requests default to `timeout` instead of 30 s.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("r2box-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wrap a preconfigured client, e.g. one with a proxy or custom roots.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    /// Build reqwest request from bridge request, leaving the body to the caller.
    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    async fn send(&self, req: reqwest::RequestBuilder, url: &str) -> Result<HttpResponse> {
        let response = req.send().await.map_err(|e| map_reqwest_error(e, url))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, url))?;

        debug!(status, url = %strip_query(url), "HTTP response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error, url: &str) -> BridgeError {
    warn!(error = %e, url = %strip_query(url), "HTTP request failed");
    if e.is_timeout() {
        BridgeError::Timeout(format!("{} did not answer in time", strip_query(url)))
    } else if e.is_connect() {
        BridgeError::Connection(e.to_string())
    } else {
        BridgeError::OperationFailed(e.to_string())
    }
}

/// Presigned URLs carry credentials in the query string; keep them out of logs.
fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Split a body into owned slices without copying.
fn chunk_body(body: Bytes) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(body.len() / UPLOAD_CHUNK_SIZE + 1);
    let mut offset = 0;
    while offset < body.len() {
        let end = (offset + UPLOAD_CHUNK_SIZE).min(body.len());
        chunks.push(body.slice(offset..end));
        offset = end;
    }
    chunks
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = %request.method, url = %strip_query(&request.url), "Executing HTTP request");

        let mut req = self.build_request(&request);
        if let Some(body) = request.body {
            req = req.body(body);
        }
        self.send(req, &request.url).await
    }

    async fn upload(
        &self,
        request: HttpRequest,
        on_progress: TransferProgress,
    ) -> Result<HttpResponse> {
        let body = request.body.clone().unwrap_or_default();
        let total = body.len() as u64;
        debug!(url = %strip_query(&request.url), bytes = total, "Streaming upload body");

        let chunks = chunk_body(body).into_iter().map(move |chunk| {
            on_progress(chunk.len() as u64);
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let req = self
            .build_request(&request)
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream::iter(chunks)));

        self.send(req, &request.url).await
    }
}
