#![deny(unreachable_patterns)]
//! Video processing and face inference for deepfake detection.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and frame sampling over a rawvideo pipe
//! - FFprobe metadata
//! - Remote video download (direct HTTP or yt-dlp)
//! - ONNX face detection (YuNet) and real/deepfake classification
//! - The extraction and classification pipeline

pub mod command;
pub mod download;
pub mod error;
pub mod faces;
pub mod frames;
pub mod inference;
pub mod pipeline;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegProgress};
pub use download::{download_video, is_direct_media_url, is_valid_url};
pub use error::{MediaError, MediaResult};
pub use faces::{crop_face, FaceWriter};
pub use frames::{FrameSampler, FrameStream, SampledFrame, DEFAULT_FRAME_SKIP};
pub use inference::{
    ClassifierConfig, DeepfakeClassifier, DetectorConfig, FaceClassifier, FaceDetector,
    YuNetFaceDetector,
};
pub use pipeline::{DeepfakePipeline, ExtractedFace, PipelineConfig};
pub use probe::{probe_video, VideoInfo};
