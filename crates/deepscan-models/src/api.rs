//! HTTP request and response bodies.
//!
//! Field names follow the JSON contract the browser client already speaks
//! (`file_url`, `file_name`, `video_url`, `result`).

use serde::{Deserialize, Serialize};

use crate::prediction::Label;
use crate::verdict::Verdict;

/// Error body returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Response to a successful upload or download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUrlResponse {
    pub file_url: String,
}

/// Analyze a previously uploaded video by path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeFileRequest {
    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeFileResponse {
    pub status: String,
    pub result: Label,
    pub verdict: Verdict,
}

impl AnalyzeFileResponse {
    pub fn success(verdict: Verdict) -> Self {
        Self {
            status: "success".to_string(),
            result: verdict.label,
            verdict,
        }
    }
}

/// Analyze a stored image or video by file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeMediaRequest {
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaResultResponse {
    pub result: Label,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Download (and optionally analyze) a remote video.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeUrlRequest {
    #[serde(default)]
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeUrlResponse {
    pub result: Label,
    pub file_path: String,
    pub verdict: Verdict,
}
