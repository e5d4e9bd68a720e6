//! End-to-end upload sessions against a scripted backend and storage.

use bridge_traits::testing::{json_response, Scripted, ScriptedHttpClient};
use bridge_traits::{HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_api::{ApiClient, ApiGateway};
use core_runtime::config::{ExpiryOption, UploadSettings};
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use core_upload::{UploadError, UploadManager, UploadOutcome, UploadSource, UploadState};
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

const BASE: &str = "https://box.example.com/api";

fn manager(http: &Arc<ScriptedHttpClient>, settings: UploadSettings, bus: &EventBus) -> UploadManager {
    let gateway = ApiGateway::new(http.clone(), BASE, Duration::from_secs(5));
    UploadManager::new(
        ApiClient::new(Arc::new(gateway)),
        http.clone(),
        settings,
        bus.clone(),
    )
}

fn body_json(request: &HttpRequest) -> Value {
    request
        .body
        .as_ref()
        .map(|b| serde_json::from_slice(b).unwrap())
        .unwrap_or(Value::Null)
}

fn script_single(http: &ScriptedHttpClient) {
    http.on_json(
        HttpMethod::Post,
        "/upload/presign",
        200,
        json!({
            "file_id": "f1",
            "upload_url": "https://storage.example.com/f1?X-Amz-Signature=abc",
            "download_url": "/api/files/f1/download",
            "short_url": "/s/Ab3x",
            "expires_at": "2026-10-25T00:00:00Z"
        }),
    );
    http.on(
        HttpMethod::Put,
        "storage.example.com/f1",
        HttpResponse::new(200, Bytes::new()).with_header("ETag", "\"e1\""),
    );
    http.on_json(
        HttpMethod::Post,
        "/upload/confirm",
        200,
        json!({
            "success": true,
            "message": "Upload confirmed",
            "download_url": "https://bucket.example.com/f1?X-Amz-Signature=dl",
            "short_url": "/s/Ab3x"
        }),
    );
    http.on_json(HttpMethod::Post, "/upload/cancel", 200, json!({ "success": true }));
}

/// Backend and storage for a 10 byte file split into 4 byte parts.
fn script_multipart(http: &ScriptedHttpClient) {
    http.on_json(
        HttpMethod::Post,
        "/upload/multipart/init",
        200,
        json!({ "file_id": "f9", "upload_id": "mp9", "part_size": 4, "total_parts": 3 }),
    );
    http.on_fn(HttpMethod::Post, "/upload/multipart/presign", |req| {
        let n = body_json(req)["part_number"].as_u64().unwrap();
        Scripted::Respond(json_response(
            200,
            &json!({
                "upload_url": format!("https://storage.example.com/f9?partNumber={}", n),
                "part_number": n
            }),
        ))
    });
    http.on_json(
        HttpMethod::Post,
        "/upload/multipart/complete",
        200,
        json!({
            "file_id": "f9",
            "download_url": "https://bucket.example.com/f9?X-Amz-Signature=dl",
            "short_url": "/s/Zz9",
            "expires_at": "2026-10-25T00:00:00Z"
        }),
    );
    http.on_json(HttpMethod::Post, "/upload/cancel", 200, json!({ "success": true }));
}

fn part_number(request: &HttpRequest) -> u64 {
    request.url.rsplit('=').next().unwrap().parse().unwrap()
}

fn multipart_settings() -> UploadSettings {
    UploadSettings {
        multipart_threshold: 8,
        part_concurrency: 2,
        ..UploadSettings::default()
    }
}

fn drain(events: &mut Receiver<CoreEvent>) -> Vec<UploadEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Upload(event) = event {
            seen.push(event);
        }
    }
    seen
}

async fn wait_for(handle: &core_upload::UploadHandle, state: UploadState) {
    let mut progress = Box::pin(handle.progress());
    while let Some(snapshot) = progress.next().await {
        if snapshot.state == state {
            return;
        }
    }
    panic!("upload never reached {}", state);
}

#[tokio::test]
async fn test_single_put_upload_completes() {
    let http = Arc::new(ScriptedHttpClient::new().with_upload_chunk_size(7));
    script_single(&http);
    let bus = EventBus::new(512);
    let mut events = bus.subscribe();
    let uploads = manager(&http, UploadSettings::default(), &bus);

    let source = UploadSource::from_bytes("notes.txt", vec![b'x'; 100]).with_content_type("text/plain");
    let handle = uploads
        .start_upload_with_expiry(source, ExpiryOption::OneDay)
        .await
        .unwrap();
    assert!(!handle.is_multipart());
    let snapshots = tokio::spawn(handle.progress().collect::<Vec<_>>());

    let outcome = handle.join().await.unwrap();
    let receipt = outcome.receipt().unwrap();
    assert_eq!(receipt.file_id, "f1");
    assert_eq!(receipt.download_url, "https://bucket.example.com/f1?X-Amz-Signature=dl");
    assert_eq!(receipt.short_url.as_deref(), Some("https://box.example.com/s/Ab3x"));
    assert!(!receipt.multipart);

    let presign = http
        .requests()
        .into_iter()
        .find(|r| r.url.ends_with("/upload/presign"))
        .unwrap();
    assert_eq!(
        body_json(&presign),
        json!({ "filename": "notes.txt", "content_type": "text/plain", "size": 100, "expires_in": 1 })
    );

    let put = http
        .requests()
        .into_iter()
        .find(|r| r.method == HttpMethod::Put)
        .unwrap();
    assert_eq!(put.header_value("Content-Type"), Some("text/plain"));
    assert_eq!(put.header_value("Authorization"), None);
    assert_eq!(put.body_len(), 100);

    let snapshots = snapshots.await.unwrap();
    let last = snapshots.last().unwrap();
    assert_eq!(last.state, UploadState::Completed);
    assert_eq!(last.percent, 100);
    assert!(snapshots.windows(2).all(|w| w[0].percent <= w[1].percent));

    let seen = drain(&mut events);
    let percents: Vec<u8> = seen
        .iter()
        .filter_map(|e| match e {
            UploadEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|w| w[0] < w[1]));
    assert!(percents.iter().all(|p| *p <= 100));
    assert!(matches!(seen.first(), Some(UploadEvent::Started { multipart: false, .. })));
    assert!(matches!(seen.last(), Some(UploadEvent::Completed { file_id, .. }) if file_id == "f1"));
}

#[tokio::test]
async fn test_multipart_parts_are_completed_in_order() {
    let http = Arc::new(ScriptedHttpClient::new());
    script_multipart(&http);
    // Later parts finish first.
    http.on_fn(HttpMethod::Put, "storage.example.com/f9", |req| {
        let n = part_number(req);
        Scripted::Delay(
            Duration::from_millis((4 - n) * 20),
            HttpResponse::new(200, Bytes::new()).with_header("ETag", format!("\"etag-{}\"", n)),
        )
    });
    let bus = EventBus::new(64);
    let uploads = manager(&http, multipart_settings(), &bus);

    let handle = uploads
        .start_upload(UploadSource::from_bytes("big.bin", &b"0123456789"[..]))
        .await
        .unwrap();
    assert!(handle.is_multipart());

    let outcome = handle.join().await.unwrap();
    let receipt = outcome.receipt().unwrap();
    assert!(receipt.multipart);
    assert_eq!(receipt.file_id, "f9");
    assert_eq!(receipt.short_url.as_deref(), Some("https://box.example.com/s/Zz9"));

    let requests = http.requests();
    let bodies: Vec<Bytes> = requests
        .iter()
        .filter(|r| r.method == HttpMethod::Put)
        .map(|r| r.body.clone().unwrap())
        .collect();
    assert_eq!(bodies.len(), 3);
    assert!(bodies.contains(&Bytes::from_static(b"0123")));
    assert!(bodies.contains(&Bytes::from_static(b"4567")));
    assert!(bodies.contains(&Bytes::from_static(b"89")));
    assert!(requests
        .iter()
        .filter(|r| r.method == HttpMethod::Put)
        .all(|r| r.header_value("Content-Type").is_none()));

    let complete = requests
        .iter()
        .find(|r| r.url.ends_with("/upload/multipart/complete"))
        .unwrap();
    assert_eq!(
        body_json(complete),
        json!({
            "file_id": "f9",
            "upload_id": "mp9",
            "parts": [
                { "part_number": 1, "etag": "\"etag-1\"" },
                { "part_number": 2, "etag": "\"etag-2\"" },
                { "part_number": 3, "etag": "\"etag-3\"" }
            ]
        })
    );
    assert_eq!(http.count(HttpMethod::Post, "/upload/cancel"), 0);
}

#[tokio::test]
async fn test_cancel_during_transfer_releases_remote_upload() {
    let http = Arc::new(ScriptedHttpClient::new());
    script_single(&http);
    http.on_hang(HttpMethod::Put, "storage.example.com/f1");
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let uploads = manager(&http, UploadSettings::default(), &bus);

    let handle = uploads
        .start_upload(UploadSource::from_bytes("slow.bin", vec![0u8; 64]))
        .await
        .unwrap();
    wait_for(&handle, UploadState::Transferring).await;
    handle.cancel();

    let progress = handle.snapshot();
    let outcome = handle.join().await.unwrap();

    assert_eq!(outcome, UploadOutcome::Cancelled);
    assert!(progress.percent < 100);
    assert_eq!(http.count(HttpMethod::Post, "/upload/confirm"), 0);

    let release = http
        .requests()
        .into_iter()
        .find(|r| r.url.ends_with("/upload/cancel"))
        .unwrap();
    assert_eq!(body_json(&release), json!({ "file_id": "f1" }));

    let seen = drain(&mut events);
    assert!(seen.iter().any(|e| matches!(e, UploadEvent::Cancelled { .. })));
    assert!(!seen.iter().any(|e| matches!(e, UploadEvent::Completed { .. })));
    assert_eq!(uploads.active_count().await, 0);
}

#[tokio::test]
async fn test_cancel_multipart_aborts_parts() {
    let http = Arc::new(ScriptedHttpClient::new());
    script_multipart(&http);
    http.on_hang(HttpMethod::Put, "storage.example.com/f9");
    let bus = EventBus::new(64);
    let uploads = manager(&http, multipart_settings(), &bus);

    let handle = uploads
        .start_upload(UploadSource::from_bytes("big.bin", vec![1u8; 10]))
        .await
        .unwrap();
    let id = handle.id().to_string();
    wait_for(&handle, UploadState::Transferring).await;

    assert!(uploads.cancel(&id).await);
    assert_eq!(handle.join().await.unwrap(), UploadOutcome::Cancelled);

    assert_eq!(http.count(HttpMethod::Post, "/upload/multipart/complete"), 0);
    let release = http
        .requests()
        .into_iter()
        .find(|r| r.url.ends_with("/upload/cancel"))
        .unwrap();
    assert_eq!(body_json(&release), json!({ "file_id": "f9", "upload_id": "mp9" }));
    assert!(!uploads.cancel(&id).await);
}

#[tokio::test]
async fn test_missing_etag_fails_the_upload() {
    let http = Arc::new(ScriptedHttpClient::new());
    script_multipart(&http);
    http.on(HttpMethod::Put, "storage.example.com/f9", HttpResponse::new(200, Bytes::new()));
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let uploads = manager(&http, multipart_settings(), &bus);

    let handle = uploads
        .start_upload(UploadSource::from_bytes("big.bin", vec![1u8; 10]))
        .await
        .unwrap();
    let status = handle.progress();
    let err = handle.join().await.unwrap_err();

    assert!(matches!(err, UploadError::MissingETag { .. }));
    let states: Vec<UploadState> = status.map(|s| s.state).collect().await;
    assert_eq!(states.last(), Some(&UploadState::Failed));
    assert_eq!(http.count(HttpMethod::Post, "/upload/multipart/complete"), 0);
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, UploadEvent::Failed { .. })));
}

#[tokio::test]
async fn test_storage_rejection_is_reported() {
    let http = Arc::new(ScriptedHttpClient::new());
    script_single(&http);
    http.on(
        HttpMethod::Put,
        "storage.example.com/f1",
        HttpResponse::new(403, Bytes::from_static(b"<Error>SignatureDoesNotMatch</Error>")),
    );
    let bus = EventBus::new(64);
    let uploads = manager(&http, UploadSettings::default(), &bus);

    let handle = uploads
        .start_upload(UploadSource::from_bytes("a.bin", vec![1u8; 3]))
        .await
        .unwrap();
    let err = handle.join().await.unwrap_err();

    assert!(matches!(err, UploadError::Transfer { part_number: None, .. }));
    assert_eq!(err.to_string(), "Storage rejected the transfer: HTTP 403");
    assert_eq!(http.count(HttpMethod::Post, "/upload/confirm"), 0);
}

#[tokio::test]
async fn test_transfer_timeout() {
    let http = Arc::new(ScriptedHttpClient::new());
    script_single(&http);
    http.on_timeout(HttpMethod::Put, "storage.example.com/f1");
    let uploads = manager(&http, UploadSettings::default(), &EventBus::new(16));

    let handle = uploads
        .start_upload(UploadSource::from_bytes("a.bin", vec![1u8; 3]))
        .await
        .unwrap();

    assert!(matches!(handle.join().await, Err(UploadError::Timeout(_))));
}

#[tokio::test]
async fn test_unconfirmed_upload_fails() {
    let http = Arc::new(ScriptedHttpClient::new());
    script_single(&http);
    http.on_json(
        HttpMethod::Post,
        "/upload/confirm",
        200,
        json!({ "success": false, "message": "object not found in storage" }),
    );
    let uploads = manager(&http, UploadSettings::default(), &EventBus::new(16));

    let handle = uploads
        .start_upload(UploadSource::from_bytes("a.bin", vec![1u8; 3]))
        .await
        .unwrap();

    match handle.join().await {
        Err(UploadError::NotConfirmed(message)) => {
            assert_eq!(message, "object not found in storage")
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_sources_send_nothing() {
    let http = Arc::new(ScriptedHttpClient::new());
    let settings = UploadSettings {
        max_file_size: 16,
        ..UploadSettings::default()
    };
    let uploads = manager(&http, settings, &EventBus::new(16));

    let err = uploads
        .start_upload(UploadSource::from_bytes("big.bin", vec![0u8; 17]))
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::FileTooLarge { size: 17, limit: 16 }));
    assert!(http.requests().is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_and_refuses_uploads() {
    let http = Arc::new(ScriptedHttpClient::new());
    script_single(&http);
    http.on_hang(HttpMethod::Put, "storage.example.com/f1");
    let uploads = manager(&http, UploadSettings::default(), &EventBus::new(16));

    let handle = uploads
        .start_upload(UploadSource::from_bytes("a.bin", vec![1u8; 3]))
        .await
        .unwrap();
    wait_for(&handle, UploadState::Transferring).await;

    uploads.shutdown();

    assert_eq!(handle.join().await.unwrap(), UploadOutcome::Cancelled);
    assert!(matches!(
        uploads
            .start_upload(UploadSource::from_bytes("b.bin", vec![1u8; 3]))
            .await,
        Err(UploadError::ShutDown)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_parts_report_increasing_progress() {
    let http = Arc::new(ScriptedHttpClient::new().with_upload_chunk_size(3));
    script_multipart(&http);
    http.on_json(
        HttpMethod::Post,
        "/upload/multipart/init",
        200,
        json!({ "file_id": "f9", "upload_id": "mp9", "part_size": 10, "total_parts": 100 }),
    );
    http.on_fn(HttpMethod::Put, "storage.example.com/f9", |req| {
        Scripted::Respond(
            HttpResponse::new(200, Bytes::new())
                .with_header("ETag", format!("\"etag-{}\"", part_number(req))),
        )
    });
    let bus = EventBus::new(4096);
    let mut events = bus.subscribe();
    let settings = UploadSettings {
        multipart_threshold: 8,
        part_concurrency: 8,
        ..UploadSettings::default()
    };
    let uploads = manager(&http, settings, &bus);

    let handle = uploads
        .start_upload(UploadSource::from_bytes("wide.bin", vec![3u8; 1000]))
        .await
        .unwrap();
    let outcome = handle.join().await.unwrap();

    assert!(outcome.receipt().is_some());
    assert_eq!(http.count(HttpMethod::Put, "storage.example.com/f9"), 100);
    let percents: Vec<u8> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            UploadEvent::Progress { percent, .. } => Some(percent),
            _ => None,
        })
        .collect();
    assert!(!percents.is_empty());
    assert!(
        percents.windows(2).all(|w| w[0] < w[1]),
        "progress went backwards: {:?}",
        percents
    );
}

#[tokio::test]
async fn test_cancel_while_presigning_has_nothing_to_release() {
    let http = Arc::new(ScriptedHttpClient::new());
    script_single(&http);
    http.on_hang(HttpMethod::Post, "/upload/presign");
    let bus = EventBus::new(64);
    let uploads = manager(&http, UploadSettings::default(), &bus);

    let handle = uploads
        .start_upload(UploadSource::from_bytes("a.bin", vec![0u8; 16]))
        .await
        .unwrap();
    wait_for(&handle, UploadState::Presigning).await;
    handle.cancel();

    assert_eq!(handle.join().await.unwrap(), UploadOutcome::Cancelled);
    assert_eq!(http.count(HttpMethod::Put, "storage.example.com"), 0);
    assert_eq!(http.count(HttpMethod::Post, "/upload/cancel"), 0);
}

#[tokio::test]
async fn test_cancel_while_confirming_releases_remote_upload() {
    let http = Arc::new(ScriptedHttpClient::new());
    script_single(&http);
    http.on_hang(HttpMethod::Post, "/upload/confirm");
    let bus = EventBus::new(64);
    let uploads = manager(&http, UploadSettings::default(), &bus);

    let handle = uploads
        .start_upload(UploadSource::from_bytes("a.bin", vec![0u8; 16]))
        .await
        .unwrap();
    wait_for(&handle, UploadState::Confirming).await;
    handle.cancel();

    assert_eq!(handle.join().await.unwrap(), UploadOutcome::Cancelled);
    let release = http
        .requests()
        .into_iter()
        .find(|r| r.url.ends_with("/upload/cancel"))
        .unwrap();
    assert_eq!(body_json(&release), json!({ "file_id": "f1" }));
}
