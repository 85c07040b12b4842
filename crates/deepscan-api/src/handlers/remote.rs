//! Remote video handlers.

use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use deepscan_media::{download_video, MediaError};
use deepscan_models::{AnalyzeUrlRequest, AnalyzeUrlResponse, FileUrlResponse};
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{media_url, validate_video_url};
use crate::state::AppState;

/// Download a remote video into `downloads/` and analyze it.
pub async fn analyze_url(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeUrlRequest>, JsonRejection>,
) -> ApiResult<Json<AnalyzeUrlResponse>> {
    let video_url = requested_url(body)?;
    info!(url = %video_url, "Processing URL");

    let video_path = fetch(&video_url, &state.media.downloads)
        .await
        .map_err(|e| match e {
            MediaError::InvalidUrl(_) => ApiError::bad_request("Invalid URL"),
            _ => ApiError::bad_gateway("Video download failed"),
        })?;

    let analysis = state
        .pipeline
        .analyze_video(&video_path, &state.media.faces_writer())
        .await?;
    metrics::record_analysis(&analysis);

    let file_path = media_url(&state.media.root, &video_path)
        .ok_or_else(|| ApiError::internal("Download stored outside media root"))?;

    Ok(Json(AnalyzeUrlResponse {
        result: analysis.verdict.label,
        file_path,
        verdict: analysis.verdict,
    }))
}

/// Download a remote video into `uploads/` for a later `/analyze/` call.
pub async fn download_to_uploads(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeUrlRequest>, JsonRejection>,
) -> ApiResult<Json<FileUrlResponse>> {
    let video_url = requested_url(body)?;

    let video_path = fetch(&video_url, &state.media.uploads)
        .await
        .map_err(|e| match e {
            MediaError::InvalidUrl(_) => ApiError::bad_request("Invalid URL"),
            _ => ApiError::internal("Failed to download video"),
        })?;

    let file_url = media_url(&state.media.root, &video_path)
        .ok_or_else(|| ApiError::internal("Failed to download video"))?;

    info!(file_url = %file_url, "Video downloaded successfully");
    Ok(Json(FileUrlResponse { file_url }))
}

/// Pull `video_url` out of the body and vet it.
fn requested_url(body: Result<Json<AnalyzeUrlRequest>, JsonRejection>) -> ApiResult<String> {
    let Json(request) = body.map_err(|_| ApiError::bad_request("Invalid JSON format"))?;

    let video_url = request
        .video_url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No URL provided"))?;

    validate_video_url(&video_url).map_err(|e| {
        warn!(url = %video_url, error = %e, "Rejected video URL");
        ApiError::bad_request("Invalid URL")
    })
}

async fn fetch(url: &str, dest_dir: &Path) -> Result<PathBuf, MediaError> {
    let start = Instant::now();
    let result = download_video(url, dest_dir).await;
    metrics::record_download(result.is_ok(), start.elapsed().as_secs_f64());

    if let Err(e) = &result {
        error!(url = %url, error = %e, "Video download error");
    }
    result
}
