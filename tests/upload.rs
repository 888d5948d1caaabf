//! End-to-end tests for the upload and reputation routes, using a stub
//! inspector so no real package parsing happens.

use apk_triage::inspector::{ExtractedFacts, InspectionError, Inspector};
use apk_triage::server::{routes, AppState};
use apk_triage::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt;

const BOUNDARY: &str = "test-boundary";

/// Inspector double returning canned facts and counting invocations.
struct StubInspector {
    calls: AtomicUsize,
}

impl StubInspector {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl Inspector for StubInspector {
    fn inspect(&self, _path: &Path) -> Result<ExtractedFacts, InspectionError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExtractedFacts {
            package_name: "com.example.app".to_owned(),
            app_name: Some("Example".to_owned()),
            version_name: Some("1.0".to_owned()),
            version_code: Some(1),
            debuggable: true,
            permissions: vec![
                "android.permission.CAMERA".to_owned(),
                "android.permission.INTERNET".to_owned(),
            ],
            ..ExtractedFacts::default()
        })
    }
}

/// Inspector double that fails on every package.
struct FailingInspector;

impl Inspector for FailingInspector {
    fn inspect(&self, _path: &Path) -> Result<ExtractedFacts, InspectionError> {
        Err(InspectionError::InvalidPackage(
            "zip header not found".to_owned(),
        ))
    }
}

fn test_app(inspector: Arc<StubInspector>) -> Router {
    test_app_in(inspector, std::env::temp_dir().join("apk-triage-tests"))
}

fn test_app_in(inspector: Arc<dyn Inspector>, uploads: std::path::PathBuf) -> Router {
    let mut config = Config::default();
    config.server.max_upload_size = 4096;
    config.server.uploads_folder = uploads;
    routes(AppState::new(config, inspector))
}

fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn rejects_wrong_extension() {
    let inspector = StubInspector::new();
    let app = test_app(Arc::clone(&inspector));

    let body = multipart_body("file", "payload.exe", b"not an apk");
    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["ok"], false);
    assert!(json["error"].as_str().unwrap().contains(".apk"));
    assert_eq!(inspector.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejects_oversized_upload() {
    let inspector = StubInspector::new();
    let app = test_app(Arc::clone(&inspector));

    let body = multipart_body("file", "big.apk", &vec![0u8; 8192]);
    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["ok"], false);
    assert_eq!(inspector.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejects_missing_file_field() {
    let inspector = StubInspector::new();
    let app = test_app(Arc::clone(&inspector));

    let body = multipart_body("document", "app.apk", b"content");
    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "No file part");
    assert_eq!(inspector.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn analyzes_valid_upload() {
    let inspector = StubInspector::new();
    let app = test_app(Arc::clone(&inspector));

    let body = multipart_body("file", "example.apk", b"fake apk bytes");
    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["ok"], true);
    assert_eq!(json["filename"], "example.apk");
    assert_eq!(json["package_name"], "com.example.app");
    assert_eq!(json["debuggable"], true);

    // One dangerous permission plus the debuggable flag.
    assert_eq!(json["risk_score"], 2.0);
    assert_eq!(json["risk_label"], "Low");
    assert_eq!(json["risk_reasons"].as_array().unwrap().len(), 2);
    assert_eq!(
        json["dangerous_permissions"],
        serde_json::json!(["android.permission.CAMERA"])
    );

    let sha256 = json["sha256"].as_str().unwrap();
    assert_eq!(sha256.len(), 64);
    assert!(sha256.chars().all(|c| c.is_ascii_hexdigit()));

    assert_eq!(inspector.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reports_inspection_failure_and_removes_staged_file() {
    let uploads = std::env::temp_dir().join("apk-triage-tests-failure");
    let _ = std::fs::remove_dir_all(&uploads);
    let app = test_app_in(Arc::new(FailingInspector), uploads.clone());

    let body = multipart_body("file", "broken.apk", b"not really a zip");
    let response = app.oneshot(upload_request(body)).await.unwrap();

    // Inspection errors are distinguishable from a valid-but-minimal result.
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["ok"], false);
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("Failed to parse APK"));
    assert!(error.contains("zip header not found"));

    // The staged copy is removed even when inspection fails.
    let leftovers = std::fs::read_dir(&uploads).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn reputation_disabled_without_key() {
    let app = test_app(StubInspector::new());

    let hash = "a".repeat(64);
    let request = Request::builder()
        .uri(format!("/reputation/{hash}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["enabled"], false);
}

#[tokio::test]
async fn rejects_invalid_reputation_hash() {
    let app = test_app(StubInspector::new());

    let request = Request::builder()
        .uri("/reputation/nothex")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["ok"], false);
}
