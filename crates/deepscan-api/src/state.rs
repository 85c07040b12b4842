//! Application state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use deepscan_media::{
    DeepfakeClassifier, DeepfakePipeline, FaceClassifier, FaceDetector, FaceWriter,
    YuNetFaceDetector,
};
use tracing::{error, info};

use crate::config::{ApiConfig, PipelineSettings};

/// Directory layout under the media root.
#[derive(Debug, Clone)]
pub struct MediaDirs {
    /// Absolute media root, served at `/media`
    pub root: PathBuf,
    /// Uploaded and downloaded-for-upload videos
    pub uploads: PathBuf,
    /// Per-analysis face crop directories
    pub faces: PathBuf,
    /// Videos fetched for URL analysis
    pub downloads: PathBuf,
}

impl MediaDirs {
    /// Create the layout on disk and resolve the root to an absolute path.
    pub async fn create(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref();
        tokio::fs::create_dir_all(root).await?;
        let root = tokio::fs::canonicalize(root).await?;

        let dirs = Self {
            uploads: root.join("uploads"),
            faces: root.join("uploads").join("faces"),
            downloads: root.join("downloads"),
            root,
        };

        for dir in [&dirs.uploads, &dirs.faces, &dirs.downloads] {
            tokio::fs::create_dir_all(dir).await?;
        }

        Ok(dirs)
    }

    pub fn faces_writer(&self) -> FaceWriter {
        FaceWriter::new(&self.faces)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<DeepfakePipeline>,
    pub media: Arc<MediaDirs>,
}

impl AppState {
    /// Create new application state, loading both models.
    ///
    /// A model that fails to load is logged and left out; `/ready` reports it.
    pub async fn new(
        config: ApiConfig,
        settings: &PipelineSettings,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let pipeline_config = settings.pipeline_config()?;
        let (detector, classifier) = load_models(settings);
        let pipeline = DeepfakePipeline::new(detector, classifier, pipeline_config)?;
        Self::with_pipeline(config, pipeline).await
    }

    /// Create state around an existing pipeline.
    pub async fn with_pipeline(
        config: ApiConfig,
        pipeline: DeepfakePipeline,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let media = MediaDirs::create(&config.media_root).await?;
        info!(media_root = %media.root.display(), "Media directories ready");

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            media: Arc::new(media),
        })
    }
}

/// Load the face detector and classifier, keeping whichever succeeds.
pub fn load_models(
    settings: &PipelineSettings,
) -> (Option<Arc<dyn FaceDetector>>, Option<Arc<dyn FaceClassifier>>) {
    let detector: Option<Arc<dyn FaceDetector>> =
        match YuNetFaceDetector::load(&settings.face_detector_model_path, settings.detector_config()) {
            Ok(detector) => Some(Arc::new(detector)),
            Err(e) => {
                error!(
                    path = %settings.face_detector_model_path.display(),
                    error = %e,
                    "Face detector failed to load"
                );
                None
            }
        };

    let classifier: Option<Arc<dyn FaceClassifier>> =
        match DeepfakeClassifier::load(&settings.classifier_model_path, settings.classifier_config()) {
            Ok(classifier) => Some(Arc::new(classifier)),
            Err(e) => {
                error!(
                    path = %settings.classifier_model_path.display(),
                    error = %e,
                    "Deepfake classifier failed to load"
                );
                None
            }
        };

    (detector, classifier)
}
