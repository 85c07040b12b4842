//! Deepfake analysis handlers for stored media.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use deepscan_models::{
    AnalyzeFileRequest, AnalyzeFileResponse, AnalyzeMediaRequest, Label, MediaKind,
    MediaResultResponse,
};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{resolve_file_name, resolve_media_path};
use crate::state::AppState;

const VIDEO_FILE_NOT_FOUND: &str = "Video file not found";

/// Extract faces from an uploaded video and return the video verdict.
///
/// `file_url` is the value `/upload/` returned, or a path inside the media root.
pub async fn analyze_file(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeFileRequest>, JsonRejection>,
) -> ApiResult<Json<AnalyzeFileResponse>> {
    let Json(request) = body.map_err(|_| ApiError::bad_request("Invalid JSON data"))?;

    let file_url = request
        .file_url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(VIDEO_FILE_NOT_FOUND))?;

    let video_path = resolve_media_path(&state.media.root, &file_url).map_err(|e| {
        warn!(file_url = %file_url, error = %e, "Rejected video path");
        ApiError::bad_request("Invalid file path")
    })?;

    if !tokio::fs::metadata(&video_path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
    {
        warn!(path = %video_path.display(), "Video file not found");
        return Err(ApiError::bad_request(VIDEO_FILE_NOT_FOUND));
    }

    info!(path = %video_path.display(), "Processing video");

    let analysis = state
        .pipeline
        .analyze_video(&video_path, &state.media.faces_writer())
        .await?;
    metrics::record_analysis(&analysis);

    if analysis.faces_extracted == 0 {
        warn!(analysis_id = %analysis.analysis_id, "No faces detected in video");
        return Err(ApiError::bad_request("No faces detected"));
    }

    Ok(Json(AnalyzeFileResponse::success(analysis.verdict)))
}

/// Analyze a file stored in `uploads/` by name.
///
/// Images are classified as a single face; videos run the full pipeline.
pub async fn analyze_media(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeMediaRequest>, JsonRejection>,
) -> ApiResult<Json<MediaResultResponse>> {
    let Json(request) = body.map_err(|_| ApiError::bad_request("Invalid JSON format"))?;

    let file_name = request
        .file_name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No file specified"))?;

    let path = resolve_file_name(&state.media.uploads, &file_name).map_err(|e| {
        warn!(file_name = %file_name, error = %e, "Rejected file name");
        ApiError::bad_request("Invalid file name")
    })?;

    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(ApiError::not_found("File not found"));
    }

    let response = match MediaKind::from_file_name(&file_name) {
        MediaKind::Image => {
            let prediction = state.pipeline.detect_deepfake(&path).await;
            info!(file_name = %file_name, result = %prediction.label, "Image analysis result");
            metrics::record_image_prediction(prediction.label.as_str());
            MediaResultResponse {
                result: prediction.label,
                confidence: (prediction.label != Label::Unknown).then_some(prediction.confidence),
            }
        }
        MediaKind::Video => {
            let analysis = state
                .pipeline
                .analyze_video(&path, &state.media.faces_writer())
                .await?;
            metrics::record_analysis(&analysis);
            info!(file_name = %file_name, result = %analysis.verdict.label, "Video analysis result");
            MediaResultResponse {
                result: analysis.verdict.label,
                confidence: None,
            }
        }
        MediaKind::Unsupported => {
            return Err(ApiError::bad_request("Unsupported file format"));
        }
    };

    Ok(Json(response))
}
