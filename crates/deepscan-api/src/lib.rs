//! Axum HTTP API for deepfake video analysis.
//!
//! This crate provides:
//! - Upload, analysis and URL download endpoints
//! - Path and URL validation for client input
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::{ApiConfig, ConfigError, PipelineSettings};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, MediaDirs};
