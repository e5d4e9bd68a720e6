//! Backend HTTP gateway.
//!
//! Every request to the r2box backend goes through [`ApiGateway`]: the
//! decorators attach credentials, the transport call runs under a fixed
//! deadline, the policies see the raw response and the status is mapped onto
//! [`ApiError`]. Nothing here retries.

use crate::error::{ApiError, Result};
use crate::middleware::{
    BearerAuth, PolicyOutcome, RequestContext, RequestDecorator, ResponsePolicy,
    UnauthorizedRedirect,
};
use crate::token_store::TokenStore;
use bridge_traits::{HttpClient, HttpMethod, HttpRequest, HttpResponse, Navigator};
use core_runtime::events::EventBus;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub struct ApiGateway {
    http: Arc<dyn HttpClient>,
    base_url: String,
    timeout: Duration,
    decorators: Vec<Arc<dyn RequestDecorator>>,
    policies: Vec<Arc<dyn ResponsePolicy>>,
}

impl ApiGateway {
    /// A gateway with no middleware installed.
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            timeout,
            decorators: Vec::new(),
            policies: Vec::new(),
        }
    }

    /// The gateway the client runs with: bearer injection plus the 401
    /// login redirect.
    pub fn with_session(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        timeout: Duration,
        tokens: TokenStore,
        navigator: Arc<dyn Navigator>,
        event_bus: EventBus,
    ) -> Self {
        Self::new(http, base_url, timeout)
            .with_decorator(Arc::new(BearerAuth::new(tokens.clone())))
            .with_policy(Arc::new(UnauthorizedRedirect::new(
                tokens, navigator, event_bus,
            )))
    }

    pub fn with_decorator(mut self, decorator: Arc<dyn RequestDecorator>) -> Self {
        self.decorators.push(decorator);
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn ResponsePolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL for a path relative to the API base.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Scheme and authority of the base URL, e.g. `https://files.example.com`.
    pub fn origin(&self) -> &str {
        let after_scheme = self.base_url.find("://").map(|i| i + 3).unwrap_or(0);
        match self.base_url[after_scheme..].find('/') {
            Some(i) => &self.base_url[..after_scheme + i],
            None => &self.base_url,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(HttpMethod::Get, path, None).await?;
        decode(&response)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let payload = encode(body)?;
        let response = self.send(HttpMethod::Post, path, Some(payload)).await?;
        decode(&response)
    }

    /// POST whose response body is ignored.
    pub async fn post_unit<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        let payload = encode(body)?;
        self.send(HttpMethod::Post, path, Some(payload)).await?;
        Ok(())
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(HttpMethod::Delete, path, None).await?;
        decode(&response)
    }

    /// Run one request through the middleware stack.
    ///
    /// Returns the response only when its status is 2xx.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        let ctx = RequestContext::new(method, path);

        let mut request = HttpRequest::new(method, self.url(path))
            .header("Accept", "application/json")
            .timeout(self.timeout);
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(body.into());
        }
        for decorator in &self.decorators {
            request = decorator.decorate(&ctx, request).await;
        }

        let response = match tokio::time::timeout(self.timeout, self.http.execute(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(error = %e, "Backend request failed");
                return Err(ApiError::from_bridge(e, self.timeout));
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Backend request timed out");
                return Err(ApiError::Timeout(self.timeout));
            }
        };

        for policy in &self.policies {
            if policy.on_response(&ctx, &response).await == PolicyOutcome::SessionRevoked {
                debug!("Response policy revoked the session");
            }
        }

        map_status(response)
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| ApiError::Decode(format!("request body: {}", e)))
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    // Some endpoints answer an empty body; treat it as `null`.
    let body: &[u8] = if response.body.is_empty() {
        b"null"
    } else {
        &response.body
    };
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn map_status(response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let message = error_message(&response);
    Err(match response.status {
        401 => ApiError::Unauthorized { message },
        400 | 413 | 422 => ApiError::Validation { message },
        status => ApiError::Status { status, message },
    })
}

/// Human-readable failure text from a non-2xx response.
///
/// The backend uses `message` on handler-level failures and `error` on
/// middleware rejections; plain-text bodies are taken as-is.
pub fn error_message(response: &HttpResponse) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&response.body) {
        for key in ["message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                if !text.trim().is_empty() {
                    return text.to_string();
                }
            }
        }
    }

    match response.text() {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => format!("request failed with status {}", response.status),
    }
}
