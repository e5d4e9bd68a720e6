//! Client context flows: bootstrap, guarded navigation, session expiry and
//! disposal, against a scripted backend.

use bridge_traits::testing::{MemorySecureStore, RecordingNavigator, ScriptedHttpClient};
use bridge_traits::HttpMethod;
use core_api::{ApiError, R2Config, TOKEN_KEY};
use core_auth::{derive_token, LoginOutcome};
use core_runtime::config::ClientConfig;
use core_runtime::events::{AuthEvent, CoreEvent};
use core_service::{R2BoxClient, Route, ServiceError};
use core_upload::{UploadOutcome, UploadSource, UploadState};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;

struct Harness {
    http: Arc<ScriptedHttpClient>,
    store: Arc<MemorySecureStore>,
    host: Arc<RecordingNavigator>,
    client: R2BoxClient,
}

async fn harness(store: MemorySecureStore) -> Harness {
    let http = Arc::new(ScriptedHttpClient::new());
    let store = Arc::new(store);
    let host = Arc::new(RecordingNavigator::new());
    let config = ClientConfig::builder()
        .api_base_url("https://box.example.com/api")
        .http_client(http.clone())
        .secure_store(store.clone())
        .navigator(host.clone())
        .build()
        .unwrap();
    let client = R2BoxClient::bootstrap(config).await.unwrap();
    Harness {
        http,
        store,
        host,
        client,
    }
}

fn signed_in_store() -> MemorySecureStore {
    MemorySecureStore::with_secret(TOKEN_KEY, &derive_token("hunter2"))
}

#[tokio::test]
async fn test_no_token_redirects_to_login_without_network() {
    let h = harness(MemorySecureStore::new()).await;

    let route = h.client.navigate("/files").await.unwrap();

    assert_eq!(route, Route::Login);
    assert_eq!(h.client.current_route(), Some(Route::Login));
    assert!(h.http.requests().is_empty());
}

#[tokio::test]
async fn test_restored_token_is_revalidated_on_first_navigation() {
    let h = harness(signed_in_store()).await;
    h.http.on_json(
        HttpMethod::Get,
        "/auth/status",
        200,
        json!({ "authenticated": true, "need_setup": false }),
    );

    assert_eq!(h.client.navigate("/files").await.unwrap(), Route::Files);
    assert_eq!(h.client.navigate("/stats").await.unwrap(), Route::Stats);

    // Revalidated once; afterwards the session flag is trusted.
    assert_eq!(h.http.count(HttpMethod::Get, "/auth/status"), 1);
    let status = &h.http.requests()[0];
    assert_eq!(
        status.header_value("Authorization"),
        Some(format!("Bearer {}", derive_token("hunter2")).as_str())
    );
}

#[tokio::test]
async fn test_setup_flow() {
    let h = harness(MemorySecureStore::new()).await;
    h.http.on_json(
        HttpMethod::Post,
        "/auth/login",
        200,
        json!({ "success": true, "need_setup": true }),
    );
    h.http.on_json(
        HttpMethod::Post,
        "/setup/config",
        200,
        json!({ "success": true, "message": "R2 configuration saved" }),
    );

    let outcome = h.client.login("hunter2").await.unwrap();
    assert_eq!(outcome, LoginOutcome::Success { needs_setup: true });
    assert_eq!(h.store.peek(TOKEN_KEY), Some(derive_token("hunter2")));

    assert_eq!(h.client.navigate("/").await.unwrap(), Route::Setup);
    assert_eq!(h.client.navigate("/setup").await.unwrap(), Route::Setup);

    let config = R2Config::new(
        "https://acct.r2.cloudflarestorage.com",
        "AKIA",
        "secret",
        "uploads",
    );
    h.client.save_r2_config(&config).await.unwrap();

    assert_eq!(h.client.navigate("/").await.unwrap(), Route::Upload);
}

#[tokio::test]
async fn test_incomplete_r2_config_is_rejected_locally() {
    let h = harness(signed_in_store()).await;
    let config = R2Config::new("https://acct.r2.cloudflarestorage.com", "", "secret", " ");

    let err = h.client.save_r2_config(&config).await.unwrap_err();

    match err {
        ServiceError::Api(ApiError::Validation { message }) => {
            assert_eq!(message, "missing required fields: access_key_id, bucket_name")
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(h.http.requests().is_empty());
}

#[tokio::test]
async fn test_expired_session_forces_login() {
    let h = harness(signed_in_store()).await;
    h.http.on_json(
        HttpMethod::Get,
        "/auth/status",
        200,
        json!({ "authenticated": true, "need_setup": false }),
    );
    h.http.on_json(HttpMethod::Get, "/files", 401, json!({ "error": "invalid token" }));
    let mut events = h.client.event_bus().subscribe();

    assert_eq!(h.client.navigate("/files").await.unwrap(), Route::Files);
    let err = h.client.fetch_files(1).await.unwrap_err();

    assert!(matches!(err, ServiceError::Files(_)));
    assert_eq!(h.store.peek(TOKEN_KEY), None);
    assert_eq!(h.client.current_route(), Some(Route::Login));
    assert_eq!(h.host.visits(), vec!["/login".to_string()]);
    assert!(!h.client.auth().is_authenticated().await);

    let mut saw_expiry = false;
    while let Ok(event) = events.try_recv() {
        if event == CoreEvent::Auth(AuthEvent::SessionExpired) {
            saw_expiry = true;
        }
    }
    assert!(saw_expiry);
}

#[tokio::test]
async fn test_rejected_login_does_not_redirect() {
    let h = harness(MemorySecureStore::new()).await;
    h.http.on_json(
        HttpMethod::Post,
        "/auth/login",
        401,
        json!({ "success": false, "message": "invalid password" }),
    );

    let outcome = h.client.login("wrong").await.unwrap();

    assert_eq!(
        outcome,
        LoginOutcome::Rejected {
            message: "invalid password".into()
        }
    );
    assert!(!h.client.auth().is_authenticated().await);
    assert!(h.host.visits().is_empty());
    assert_eq!(h.store.peek(TOKEN_KEY), None);
}

#[tokio::test]
async fn test_dispose_cancels_uploads_and_closes_client() {
    let h = harness(signed_in_store()).await;
    h.http.on_json(
        HttpMethod::Post,
        "/upload/presign",
        200,
        json!({
            "file_id": "f1",
            "upload_url": "https://storage.example.com/f1?sig",
            "download_url": "/api/files/f1/download",
            "short_url": "/s/Ab3x",
            "expires_at": "2026-10-25T00:00:00Z"
        }),
    );
    h.http.on_hang(HttpMethod::Put, "storage.example.com/f1");
    h.http.on_json(HttpMethod::Post, "/upload/cancel", 200, json!({ "success": true }));

    let handle = h
        .client
        .start_upload(UploadSource::from_bytes("a.bin", vec![7u8; 32]))
        .await
        .unwrap();
    let mut progress = Box::pin(handle.progress());
    while let Some(snapshot) = progress.next().await {
        if snapshot.state == UploadState::Transferring {
            break;
        }
    }

    h.client.dispose().await;

    assert_eq!(handle.join().await.unwrap(), UploadOutcome::Cancelled);
    assert_eq!(h.http.count(HttpMethod::Post, "/upload/confirm"), 0);
    assert!(h.client.is_disposed());
    assert!(matches!(
        h.client.fetch_files(1).await,
        Err(ServiceError::Disposed)
    ));
    assert!(matches!(
        h.client.navigate("/").await,
        Err(ServiceError::Disposed)
    ));
}

#[tokio::test]
async fn test_build_info_is_available() {
    let h = harness(MemorySecureStore::new()).await;
    let info = h.client.build_info();
    assert!(info.display_version().starts_with('v'));
}
