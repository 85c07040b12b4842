//! Deepfake detection pipeline.
//!
//! Sample frames, detect and crop faces, classify each crop, then aggregate
//! the per-face labels into a video verdict. Work for one request is
//! sequential; model calls run on the blocking thread pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use deepscan_models::{
    aggregate_labels, AnalysisId, FaceBox, Prediction, Verdict, VerdictPolicy, VideoAnalysis,
};
use tracing::{debug, error, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::faces::{crop_face, FaceWriter};
use crate::frames::{FrameSampler, SampledFrame, DEFAULT_FRAME_SKIP};
use crate::inference::{FaceClassifier, FaceDetector};

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sample every Nth frame
    pub frame_skip: u32,
    pub policy: VerdictPolicy,
    /// Stop after this many faces (0 = unlimited)
    pub max_faces: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_skip: DEFAULT_FRAME_SKIP,
            policy: VerdictPolicy::default(),
            max_faces: 0,
        }
    }
}

/// A face crop written to disk.
#[derive(Debug, Clone)]
pub struct ExtractedFace {
    pub frame_index: u64,
    pub detection_index: usize,
    pub path: PathBuf,
    pub face: FaceBox,
}

/// Face extraction plus classification over pluggable models.
///
/// A missing model is not fatal at construction: extraction then fails with
/// `ModelNotFound` and classification yields `Unknown`.
#[derive(Clone)]
pub struct DeepfakePipeline {
    detector: Option<Arc<dyn FaceDetector>>,
    classifier: Option<Arc<dyn FaceClassifier>>,
    sampler: FrameSampler,
    config: PipelineConfig,
}

impl DeepfakePipeline {
    pub fn new(
        detector: Option<Arc<dyn FaceDetector>>,
        classifier: Option<Arc<dyn FaceClassifier>>,
        config: PipelineConfig,
    ) -> MediaResult<Self> {
        let sampler = FrameSampler::new(config.frame_skip)?;
        Ok(Self {
            detector,
            classifier,
            sampler,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Detect faces in sampled frames and write every crop through `writer`.
    pub async fn extract_faces(
        &self,
        video_path: impl AsRef<Path>,
        writer: &FaceWriter,
    ) -> MediaResult<Vec<ExtractedFace>> {
        let (faces, _) = self.extract_faces_counted(video_path.as_ref(), writer).await?;
        Ok(faces)
    }

    /// Extract faces, also returning how many frames were sampled.
    async fn extract_faces_counted(
        &self,
        video_path: &Path,
        writer: &FaceWriter,
    ) -> MediaResult<(Vec<ExtractedFace>, u64)> {
        if !video_path.exists() {
            error!(path = %video_path.display(), "Video file not found");
            return Err(MediaError::FileNotFound(video_path.to_path_buf()));
        }

        let detector = self
            .detector
            .clone()
            .ok_or_else(|| MediaError::model_not_found("face detector"))?;

        info!(path = %video_path.display(), frame_skip = self.config.frame_skip, "Processing video");

        let mut stream = self.sampler.sample(video_path).await?;
        let mut extracted: Vec<ExtractedFace> = Vec::new();
        let mut frames_sampled = 0u64;

        while let Some(frame) = stream.next().await {
            frames_sampled += 1;
            let frame_index = frame.index;

            let detector = Arc::clone(&detector);
            let writer = writer.clone();
            let result =
                tokio::task::spawn_blocking(move || detect_and_write(detector.as_ref(), &writer, &frame))
                    .await;

            match result {
                Ok(Ok(mut faces)) => extracted.append(&mut faces),
                Ok(Err(e)) => {
                    warn!(frame = frame_index, error = %e, "Skipping frame");
                }
                Err(e) => {
                    warn!(frame = frame_index, error = %e, "Face detection task failed");
                }
            }

            if self.config.max_faces > 0 && extracted.len() >= self.config.max_faces {
                extracted.truncate(self.config.max_faces);
                debug!(max_faces = self.config.max_faces, "Face limit reached");
                break;
            }
        }

        info!(
            path = %video_path.display(),
            frames = frames_sampled,
            faces = extracted.len(),
            "Face extraction complete"
        );

        Ok((extracted, frames_sampled))
    }

    /// Classify one face image. Never fails: any problem yields `Unknown`.
    pub async fn detect_deepfake(&self, image_path: impl AsRef<Path>) -> Prediction {
        let image_path = image_path.as_ref();

        let Some(classifier) = self.classifier.clone() else {
            error!(path = %image_path.display(), "Classifier not loaded");
            return Prediction::unknown();
        };

        if !image_path.exists() {
            error!(path = %image_path.display(), "Image not found");
            return Prediction::unknown();
        }

        let path = image_path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || -> MediaResult<Prediction> {
            let image = image::open(&path)?.to_rgb8();
            classifier.classify(&image)
        })
        .await;

        match result {
            Ok(Ok(prediction)) => {
                debug!(
                    path = %image_path.display(),
                    label = %prediction.label,
                    confidence = prediction.confidence,
                    "Prediction"
                );
                prediction
            }
            Ok(Err(e)) => {
                error!(path = %image_path.display(), error = %e, "Deepfake prediction error");
                Prediction::unknown()
            }
            Err(e) => {
                error!(path = %image_path.display(), error = %e, "Prediction task failed");
                Prediction::unknown()
            }
        }
    }

    /// Classify each face and aggregate into a verdict.
    pub async fn classify_video_deepfake(&self, faces: &[ExtractedFace]) -> Verdict {
        if faces.is_empty() {
            warn!("No faces extracted, cannot classify video");
            return Verdict::no_faces(&self.config.policy);
        }

        let mut labels = Vec::with_capacity(faces.len());
        for face in faces {
            labels.push(self.detect_deepfake(&face.path).await.label);
        }

        let verdict = aggregate_labels(labels, &self.config.policy);
        info!(
            result = %verdict.label,
            total = verdict.total_faces,
            deepfake = verdict.deepfake_faces,
            real = verdict.real_faces,
            unknown = verdict.unknown_faces,
            threshold = verdict.threshold,
            "Video classified"
        );
        verdict
    }

    /// Run the full pipeline on one video.
    ///
    /// Crops go to a fresh subdirectory of `faces_writer`'s directory named
    /// by the analysis id.
    pub async fn analyze_video(
        &self,
        video_path: impl AsRef<Path>,
        faces_writer: &FaceWriter,
    ) -> MediaResult<VideoAnalysis> {
        let start = Instant::now();
        let video_path = video_path.as_ref();

        let analysis_id = AnalysisId::new();
        let writer = faces_writer.for_analysis(&analysis_id).await?;

        let (faces, frames_sampled) = self.extract_faces_counted(video_path, &writer).await?;
        let verdict = self.classify_video_deepfake(&faces).await;

        let analysis = VideoAnalysis {
            analysis_id,
            verdict,
            frames_sampled,
            faces_extracted: faces.len(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            analysis_id = %analysis.analysis_id,
            result = %analysis.verdict.label,
            faces = analysis.faces_extracted,
            elapsed_ms = analysis.elapsed_ms,
            "Video analysis complete"
        );

        Ok(analysis)
    }
}

/// Detect faces in one frame and write their crops.
fn detect_and_write(
    detector: &dyn FaceDetector,
    writer: &FaceWriter,
    frame: &SampledFrame,
) -> MediaResult<Vec<ExtractedFace>> {
    let boxes = detector.detect(&frame.image)?;
    let mut faces = Vec::with_capacity(boxes.len());

    for (detection_index, face) in boxes.into_iter().enumerate() {
        let Some(crop) = crop_face(&frame.image, &face) else {
            continue;
        };
        let path = match writer.write(frame.index, detection_index, &crop) {
            Ok(path) => path,
            Err(e) => {
                warn!(frame = frame.index, detection = detection_index, error = %e, "Failed to save face");
                continue;
            }
        };
        faces.push(ExtractedFace {
            frame_index: frame.index,
            detection_index,
            path,
            face,
        });
    }

    Ok(faces)
}
