//! Shared data models for the deepscan backend.
//!
//! This crate provides Serde-serializable types for:
//! - Per-face predictions and their labels
//! - Video-level verdicts and the counting rule that produces them
//! - Detected face boxes
//! - Media file naming and kind detection
//! - HTTP request/response bodies

pub mod analysis;
pub mod api;
pub mod face;
pub mod media;
pub mod prediction;
pub mod verdict;

// Re-export common types
pub use analysis::{AnalysisId, VideoAnalysis};
pub use api::{
    AnalyzeFileRequest, AnalyzeFileResponse, AnalyzeMediaRequest, AnalyzeUrlRequest,
    AnalyzeUrlResponse, ErrorBody, FileUrlResponse, MediaResultResponse,
};
pub use face::{FaceBox, Landmark};
pub use media::{
    has_allowed_upload_extension, sanitize_file_name, MediaKind, ALLOWED_UPLOAD_EXTENSIONS,
};
pub use prediction::{Label, Prediction};
pub use verdict::{aggregate_labels, Verdict, VerdictPolicy, VerdictPolicyError, DEFAULT_DEEPFAKE_THRESHOLD};
