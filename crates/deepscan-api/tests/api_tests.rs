//! Router tests against stub models and a temporary media root.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use deepscan_api::{create_router, ApiConfig, AppState};
use deepscan_media::{
    DeepfakePipeline, FaceClassifier, FaceDetector, MediaResult, PipelineConfig,
};
use deepscan_models::{FaceBox, Label, Prediction};
use image::{Rgb, RgbImage};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "deepscan-test-boundary";

struct NoFaces;

impl FaceDetector for NoFaces {
    fn detect(&self, _frame: &RgbImage) -> MediaResult<Vec<FaceBox>> {
        Ok(Vec::new())
    }
}

/// Deepfake when the top-left pixel is mostly red.
struct RedIsFake;

impl FaceClassifier for RedIsFake {
    fn classify(&self, face: &RgbImage) -> MediaResult<Prediction> {
        let label = if face.get_pixel(0, 0)[0] > 128 {
            Label::Deepfake
        } else {
            Label::Real
        };
        Ok(Prediction::new(label, 87.5))
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    _dir: TempDir,
}

async fn test_app(with_models: bool) -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = ApiConfig {
        media_root: dir.path().join("media"),
        metrics_enabled: false,
        ..Default::default()
    };

    let detector = with_models.then(|| Arc::new(NoFaces) as Arc<dyn FaceDetector>);
    let classifier = with_models.then(|| Arc::new(RedIsFake) as Arc<dyn FaceClassifier>);
    let pipeline = DeepfakePipeline::new(detector, classifier, PipelineConfig::default()).unwrap();

    let state = AppState::with_pipeline(config, pipeline).await.unwrap();
    TestApp {
        router: create_router(state.clone(), None),
        state,
        _dir: dir,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_upload(field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_and_security_headers() {
    let app = test_app(true).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-ID", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-123");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let (status, body) = send(
        &app.router,
        Request::builder().uri("/healthz").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_degraded_without_models() {
    let app = test_app(false).await;

    let (status, body) = send(
        &app.router,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["face_detector"]["status"], "error");
    assert_eq!(body["checks"]["classifier"]["status"], "error");
}

#[tokio::test]
async fn test_upload_stores_sanitized_file_and_serves_it() {
    let app = test_app(true).await;

    let (status, body) = send(&app.router, multipart_upload("video", "my clip.mp4", b"fake-mp4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file_url"], "/media/uploads/my_clip.mp4");

    let stored = app.state.media.uploads.join("my_clip.mp4");
    assert_eq!(std::fs::read(&stored).unwrap(), b"fake-mp4");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/media/uploads/my_clip.mp4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"fake-mp4");
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = test_app(true).await;

    let (status, body) = send(&app.router, multipart_upload("video", "notes.txt", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid file format");

    for name in ["dir/.mp4", ".mp4", "clips/.avi"] {
        let (status, body) = send(&app.router, multipart_upload("video", name, b"x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{name}");
        assert_eq!(body["error"], "Invalid file format", "{name}");
    }
    assert!(!app.state.media.uploads.join("mp4").exists());
    assert!(!app.state.media.uploads.join("avi").exists());

    let (status, body) = send(&app.router, multipart_upload("other", "clip.mp4", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No video file uploaded");

    let (status, body) = send(&app.router, post_json("/upload/", "{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No video file uploaded");
}

#[tokio::test]
async fn test_analyze_file_errors() {
    let app = test_app(true).await;

    let cases = [
        ("not json", "Invalid JSON data"),
        ("{}", "Video file not found"),
        (r#"{"file_url": ""}"#, "Video file not found"),
        (r#"{"file_url": "/media/uploads/missing.mp4"}"#, "Video file not found"),
        (r#"{"file_url": "/media/../../etc/passwd"}"#, "Invalid file path"),
        (r#"{"file_url": "/etc/passwd"}"#, "Invalid file path"),
    ];

    for (body, expected) in cases {
        let (status, json) = send(&app.router, post_json("/analyze/", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["error"], expected, "{body}");
    }
}

#[tokio::test]
async fn test_analyze_media_image() {
    let app = test_app(true).await;
    let uploads = &app.state.media.uploads;
    RgbImage::from_pixel(32, 32, Rgb([220, 10, 10]))
        .save(uploads.join("red.png"))
        .unwrap();
    RgbImage::from_pixel(32, 32, Rgb([10, 200, 10]))
        .save(uploads.join("green.jpg"))
        .unwrap();

    let (status, body) = send(
        &app.router,
        post_json("/deepfake/analyze/", r#"{"file_name": "red.png"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": "Deepfake", "confidence": 87.5}));

    let (status, body) = send(
        &app.router,
        post_json("/deepfake/analyze/", r#"{"file_name": "green.jpg"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "Real");
}

#[tokio::test]
async fn test_analyze_media_without_classifier_is_unknown() {
    let app = test_app(false).await;
    RgbImage::from_pixel(8, 8, Rgb([220, 10, 10]))
        .save(app.state.media.uploads.join("face.png"))
        .unwrap();

    let (status, body) = send(
        &app.router,
        post_json("/deepfake/analyze/", r#"{"file_name": "face.png"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": "Unknown"}));
}

#[tokio::test]
async fn test_analyze_media_errors() {
    let app = test_app(true).await;
    std::fs::write(app.state.media.uploads.join("notes.txt"), b"hello").unwrap();

    let cases = [
        ("{oops", StatusCode::BAD_REQUEST, "Invalid JSON format"),
        ("{}", StatusCode::BAD_REQUEST, "No file specified"),
        (r#"{"file_name": "gone.png"}"#, StatusCode::NOT_FOUND, "File not found"),
        (r#"{"file_name": "notes.txt"}"#, StatusCode::BAD_REQUEST, "Unsupported file format"),
        (r#"{"file_name": "../secret.png"}"#, StatusCode::BAD_REQUEST, "Invalid file name"),
    ];

    for (body, expected_status, expected) in cases {
        let (status, json) = send(&app.router, post_json("/deepfake/analyze/", body)).await;
        assert_eq!(status, expected_status, "{body}");
        assert_eq!(json["error"], expected, "{body}");
    }
}

#[tokio::test]
async fn test_url_endpoints_validate_input() {
    let app = test_app(true).await;

    for uri in ["/analyze_url/", "/download/"] {
        let (status, json) = send(&app.router, post_json(uri, "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No URL provided");

        let (status, json) = send(&app.router, post_json(uri, "[")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid JSON format");

        let (status, json) = send(
            &app.router,
            post_json(uri, r#"{"video_url": "http://localhost/video.mp4"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid URL");

        let (status, json) = send(
            &app.router,
            post_json(uri, r#"{"video_url": "ftp://files.example.com/video.mp4"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid URL");
    }
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app(true).await;
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
