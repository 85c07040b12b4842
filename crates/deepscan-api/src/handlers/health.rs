//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use deepscan_media::{check_ffmpeg, check_ffprobe, check_ytdlp, MediaResult};
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub face_detector: CheckStatus,
    pub classifier: CheckStatus,
    pub ffmpeg: CheckStatus,
    pub ffprobe: CheckStatus,
    /// Informational; only URL analysis of platform links needs it
    pub yt_dlp: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
        }
    }

    fn loaded(loaded: bool, what: &str) -> Self {
        if loaded {
            Self::ok()
        } else {
            Self::error(format!("{} not loaded", what))
        }
    }

    fn tool<T>(result: MediaResult<T>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(e) => Self::error(e.to_string()),
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness check endpoint (readiness probe).
/// Requires both models and the FFmpeg tools.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let checks = ReadinessChecks {
        face_detector: CheckStatus::loaded(state.pipeline.has_detector(), "Face detector"),
        classifier: CheckStatus::loaded(state.pipeline.has_classifier(), "Classifier"),
        ffmpeg: CheckStatus::tool(check_ffmpeg()),
        ffprobe: CheckStatus::tool(check_ffprobe()),
        yt_dlp: CheckStatus::tool(check_ytdlp()),
    };

    let all_ok = checks.face_detector.is_ok()
        && checks.classifier.is_ok()
        && checks.ffmpeg.is_ok()
        && checks.ffprobe.is_ok();

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
