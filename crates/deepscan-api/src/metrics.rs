//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use deepscan_models::VideoAnalysis;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "deepscan_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "deepscan_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "deepscan_http_requests_in_flight";

    // Pipeline metrics
    pub const ANALYSES_TOTAL: &str = "deepscan_analyses_total";
    pub const FACES_EXTRACTED_TOTAL: &str = "deepscan_faces_extracted_total";
    pub const PIPELINE_DURATION_SECONDS: &str = "deepscan_pipeline_duration_seconds";
    pub const IMAGE_PREDICTIONS_TOTAL: &str = "deepscan_image_predictions_total";

    // Media transfer metrics
    pub const UPLOADS_TOTAL: &str = "deepscan_uploads_total";
    pub const DOWNLOADS_TOTAL: &str = "deepscan_downloads_total";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "deepscan_download_duration_seconds";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "deepscan_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished video analysis.
pub fn record_analysis(analysis: &VideoAnalysis) {
    let labels = [("result", analysis.verdict.label.to_string())];
    counter!(names::ANALYSES_TOTAL, &labels).increment(1);
    counter!(names::FACES_EXTRACTED_TOTAL).increment(analysis.faces_extracted as u64);
    histogram!(names::PIPELINE_DURATION_SECONDS).record(analysis.elapsed_ms as f64 / 1000.0);
}

/// Record a single-image prediction.
pub fn record_image_prediction(label: &str) {
    let labels = [("result", label.to_string())];
    counter!(names::IMAGE_PREDICTIONS_TOTAL, &labels).increment(1);
}

/// Record an upload attempt.
pub fn record_upload(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
}

/// Record a remote download.
pub fn record_download(success: bool, duration_secs: f64) {
    let outcome = if success { "success" } else { "failure" };
    let labels = [("outcome", outcome.to_string())];
    counter!(names::DOWNLOADS_TOTAL, &labels).increment(1);
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse static file paths so labels stay bounded.
fn sanitize_path(path: &str) -> String {
    if path.starts_with("/media/") {
        "/media/:file".to_string()
    } else {
        path.to_string()
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
