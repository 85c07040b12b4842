//! Video upload handler.

use std::path::Path;

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use deepscan_models::{has_allowed_upload_extension, sanitize_file_name, FileUrlResponse};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::media_url;
use crate::state::AppState;

/// Multipart field carrying the video.
pub const VIDEO_FIELD: &str = "video";

const NO_VIDEO_UPLOADED: &str = "No video file uploaded";
const INVALID_FILE_FORMAT: &str = "Invalid file format";

/// Store an uploaded video under `uploads/`.
///
/// An existing file with the same sanitized name is overwritten.
pub async fn upload_video(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<FileUrlResponse>> {
    let mut multipart = multipart.map_err(|_| ApiError::bad_request(NO_VIDEO_UPLOADED))?;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e.status(), e.body_text()))?;

        let Some(field) = field else {
            metrics::record_upload("missing");
            return Err(ApiError::bad_request(NO_VIDEO_UPLOADED));
        };

        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        // A plain form value named "video" is not a file
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        // Check the stored name, not the client's: "dir/.mp4" sanitizes to "mp4"
        let file_name = sanitize_file_name(&original_name);
        if !has_allowed_upload_extension(&file_name) {
            warn!(file_name = %original_name, "Rejected upload with invalid extension");
            metrics::record_upload("invalid_format");
            return Err(ApiError::bad_request(INVALID_FILE_FORMAT));
        }

        let path = state.media.uploads.join(&file_name);

        let bytes = match save_field(field, &path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                metrics::record_upload("failed");
                return Err(e);
            }
        };

        let file_url = media_url(&state.media.root, &path)
            .ok_or_else(|| ApiError::internal("Upload stored outside media root"))?;

        info!(file_name = %file_name, bytes, "Video uploaded");
        metrics::record_upload("success");

        return Ok(Json(FileUrlResponse { file_url }));
    }
}

/// Stream a multipart field to disk, returning the number of bytes written.
async fn save_field(mut field: Field<'_>, path: &Path) -> ApiResult<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create upload file: {}", e)))?;

    let mut written = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e.status(), e.body_text()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to write upload: {}", e)))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to write upload: {}", e)))?;

    Ok(written)
}

fn multipart_error(status: StatusCode, detail: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::bad_request(format!("Malformed upload: {}", detail))
    }
}
