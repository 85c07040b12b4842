//! API and pipeline configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use deepscan_media::{ClassifierConfig, DetectorConfig, PipelineConfig, DEFAULT_FRAME_SKIP};
use deepscan_models::{VerdictPolicy, DEFAULT_DEEPFAKE_THRESHOLD};
use thiserror::Error;

/// Upload and request body cap (100 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 100 * 1024 * 1024;

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second, per client IP
    pub rate_limit_rps: u32,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Directory holding uploads, face crops and downloads
    pub media_root: PathBuf,
    /// Serve Prometheus metrics at /metrics
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            request_timeout: Duration::from_secs(300),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            environment: "development".to_string(),
            media_root: PathBuf::from("media"),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            request_timeout: env_parse("REQUEST_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            media_root: std::env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        is_production_environment(&self.environment)
    }
}

/// Whether an `ENVIRONMENT` value names production, ignoring case and padding.
pub fn is_production_environment(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("production")
}

/// Model paths and pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub frame_skip: u32,
    pub deepfake_threshold: usize,
    /// 0 = unlimited
    pub max_faces: usize,
    pub face_detector_model_path: PathBuf,
    pub classifier_model_path: PathBuf,
    pub face_score_threshold: f32,
    pub classifier_input_size: u32,
    pub deepfake_class_index: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            frame_skip: DEFAULT_FRAME_SKIP,
            deepfake_threshold: DEFAULT_DEEPFAKE_THRESHOLD,
            max_faces: 0,
            face_detector_model_path: PathBuf::from(
                "models/face_detection/face_detection_yunet_2023mar.onnx",
            ),
            classifier_model_path: PathBuf::from("models/deepfake/xception_deepfake.onnx"),
            face_score_threshold: DetectorConfig::default().score_threshold,
            classifier_input_size: ClassifierConfig::default().input_size,
            deepfake_class_index: ClassifierConfig::default().deepfake_class_index,
        }
    }
}

impl PipelineSettings {
    /// Create settings from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frame_skip: env_parse("FRAME_SKIP").unwrap_or(defaults.frame_skip),
            deepfake_threshold: env_parse("DEEPFAKE_THRESHOLD")
                .unwrap_or(defaults.deepfake_threshold),
            max_faces: env_parse("MAX_FACES").unwrap_or(defaults.max_faces),
            face_detector_model_path: std::env::var("FACE_DETECTOR_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.face_detector_model_path),
            classifier_model_path: std::env::var("CLASSIFIER_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.classifier_model_path),
            face_score_threshold: env_parse("FACE_SCORE_THRESHOLD")
                .unwrap_or(defaults.face_score_threshold),
            classifier_input_size: env_parse("CLASSIFIER_INPUT_SIZE")
                .unwrap_or(defaults.classifier_input_size),
            deepfake_class_index: env_parse("DEEPFAKE_CLASS_INDEX")
                .unwrap_or(defaults.deepfake_class_index),
        }
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        if self.frame_skip == 0 {
            return Err(ConfigError::Invalid {
                name: "FRAME_SKIP",
                reason: "must be at least 1".to_string(),
            });
        }
        let policy = VerdictPolicy::new(self.deepfake_threshold).map_err(|e| ConfigError::Invalid {
            name: "DEEPFAKE_THRESHOLD",
            reason: e.to_string(),
        })?;

        Ok(PipelineConfig {
            frame_skip: self.frame_skip,
            policy,
            max_faces: self.max_faces,
        })
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            score_threshold: self.face_score_threshold,
            ..Default::default()
        }
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            input_size: self.classifier_input_size,
            deepfake_class_index: self.deepfake_class_index,
            ..Default::default()
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
