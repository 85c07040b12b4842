//! Face detection with the YuNet ONNX model.
//!
//! YuNet is anchor-free: for each stride (8, 16, 32) it emits per-cell
//! classification, objectness, box and landmark heads. The raw heads are
//! decoded here, so the exported model needs no post-processing graph.

use std::path::Path;
use std::sync::Mutex;

use deepscan_models::{FaceBox, Landmark};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use super::session::create_session;
use crate::error::{MediaError, MediaResult};

/// Feature map strides of the detection heads.
pub const STRIDES: [u32; 3] = [8, 16, 32];

/// Locates faces in a frame.
pub trait FaceDetector: Send + Sync {
    /// Detect faces, returning boxes in frame pixel coordinates.
    fn detect(&self, frame: &RgbImage) -> MediaResult<Vec<FaceBox>>;
}

/// Configuration for face detection.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Minimum face score to keep a detection
    pub score_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Maximum faces kept per frame
    pub top_k: usize,
    /// Side of the square model input; must be a multiple of 32
    pub input_side: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.8,
            nms_threshold: 0.3,
            top_k: 50,
            input_side: 640,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> MediaResult<()> {
        if self.input_side == 0 || self.input_side % 32 != 0 {
            return Err(MediaError::invalid_config(format!(
                "detector input side {} is not a positive multiple of 32",
                self.input_side
            )));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(MediaError::invalid_config("score threshold must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.nms_threshold) {
            return Err(MediaError::invalid_config("NMS threshold must be in [0, 1]"));
        }
        Ok(())
    }
}

/// Mapping between frame and model input coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Frame-to-input scale factor
    pub scale: f32,
    /// Resized frame width inside the padded input
    pub width: u32,
    pub height: u32,
    /// Padded input side
    pub side: u32,
}

impl Letterbox {
    /// Fit a frame into a `side` x `side` input, padding right and bottom.
    pub fn fit(frame_width: u32, frame_height: u32, side: u32) -> Self {
        let longest = frame_width.max(frame_height).max(1) as f32;
        let scale = side as f32 / longest;
        let width = ((frame_width as f32 * scale).round() as u32).clamp(1, side);
        let height = ((frame_height as f32 * scale).round() as u32).clamp(1, side);
        Self {
            scale,
            width,
            height,
            side,
        }
    }
}

/// Raw head outputs for one stride.
#[derive(Debug, Clone, Default)]
pub struct StrideHeads {
    pub stride: u32,
    /// `[cells]`
    pub cls: Vec<f32>,
    /// `[cells]`
    pub obj: Vec<f32>,
    /// `[cells, 4]`: dx, dy, log w, log h
    pub bbox: Vec<f32>,
    /// `[cells, 10]`: five (dx, dy) landmark offsets
    pub kps: Vec<f32>,
}

/// YuNet face detector backed by ONNX Runtime.
pub struct YuNetFaceDetector {
    session: Mutex<Session>,
    config: DetectorConfig,
}

impl YuNetFaceDetector {
    /// Load the detector model.
    pub fn load(model_path: impl AsRef<Path>, config: DetectorConfig) -> MediaResult<Self> {
        config.validate()?;
        let model_path = model_path.as_ref();
        let session = Mutex::new(create_session(model_path, "face_detector")?);

        info!(
            model_path = %model_path.display(),
            input_side = config.input_side,
            score_threshold = config.score_threshold,
            "Face detector initialized"
        );

        Ok(Self { session, config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Resize, pad and convert a frame to a BGR NCHW tensor.
    fn preprocess(&self, frame: &RgbImage) -> MediaResult<(Value, Letterbox)> {
        let letterbox = Letterbox::fit(frame.width(), frame.height(), self.config.input_side);
        let data = letterbox_bgr_chw(frame, &letterbox);
        let side = letterbox.side as usize;

        let tensor = Tensor::from_array((vec![1usize, 3, side, side], data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::detection_failed(format!("Failed to create tensor: {}", e)))?;

        Ok((tensor, letterbox))
    }

    /// Run inference and collect the per-stride heads.
    fn run_inference(&self, input: Value) -> MediaResult<Vec<StrideHeads>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let extract = |name: &str| -> MediaResult<Vec<f32>> {
            let output = outputs
                .get(name)
                .ok_or_else(|| MediaError::detection_failed(format!("Missing {} tensor", name)))?;
            let (_, data) = output
                .try_extract_tensor::<f32>()
                .map_err(|e| MediaError::detection_failed(format!("Failed to extract {}: {}", name, e)))?;
            Ok(data.to_vec())
        };

        let mut heads = Vec::with_capacity(STRIDES.len());
        for stride in STRIDES {
            heads.push(StrideHeads {
                stride,
                cls: extract(&format!("cls_{stride}"))?,
                obj: extract(&format!("obj_{stride}"))?,
                bbox: extract(&format!("bbox_{stride}"))?,
                kps: extract(&format!("kps_{stride}"))?,
            });
        }
        Ok(heads)
    }
}

impl FaceDetector for YuNetFaceDetector {
    fn detect(&self, frame: &RgbImage) -> MediaResult<Vec<FaceBox>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }

        let (input, letterbox) = self.preprocess(frame)?;
        let heads = self.run_inference(input)?;
        let faces = decode_heads(&heads, letterbox.side, &self.config)?;

        let inv = 1.0 / letterbox.scale;
        let faces: Vec<FaceBox> = faces.iter().map(|f| f.scaled(inv, inv)).collect();

        debug!(faces = faces.len(), "Face detection complete");
        Ok(faces)
    }
}

/// Resize into the letterbox and lay out as BGR CHW floats in [0, 255].
fn letterbox_bgr_chw(frame: &RgbImage, letterbox: &Letterbox) -> Vec<f32> {
    let resized = if (letterbox.width, letterbox.height) == frame.dimensions() {
        frame.clone()
    } else {
        imageops::resize(frame, letterbox.width, letterbox.height, FilterType::Triangle)
    };

    let side = letterbox.side as usize;
    let plane = side * side;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = y as usize * side + x as usize;
        // BGR channel order
        data[offset] = pixel[2] as f32;
        data[plane + offset] = pixel[1] as f32;
        data[2 * plane + offset] = pixel[0] as f32;
    }

    data
}

/// Decode raw heads into faces in input coordinates, then apply NMS.
pub fn decode_heads(
    heads: &[StrideHeads],
    input_side: u32,
    config: &DetectorConfig,
) -> MediaResult<Vec<FaceBox>> {
    let mut candidates = Vec::new();

    for head in heads {
        let cols = (input_side / head.stride) as usize;
        let rows = cols;
        let cells = rows * cols;

        if head.cls.len() < cells
            || head.obj.len() < cells
            || head.bbox.len() < cells * 4
            || head.kps.len() < cells * 10
        {
            return Err(MediaError::detection_failed(format!(
                "Unexpected head size for stride {}: expected {} cells",
                head.stride, cells
            )));
        }

        let stride = head.stride as f32;

        for r in 0..rows {
            for c in 0..cols {
                let idx = r * cols + c;

                let cls = head.cls[idx].clamp(0.0, 1.0);
                let obj = head.obj[idx].clamp(0.0, 1.0);
                let score = (cls * obj).sqrt();
                if score < config.score_threshold {
                    continue;
                }

                let b = &head.bbox[idx * 4..idx * 4 + 4];
                let cx = (c as f32 + b[0]) * stride;
                let cy = (r as f32 + b[1]) * stride;
                let w = b[2].exp() * stride;
                let h = b[3].exp() * stride;

                let k = &head.kps[idx * 10..idx * 10 + 10];
                let mut landmarks = [Landmark::default(); 5];
                for (n, lm) in landmarks.iter_mut().enumerate() {
                    lm.x = (k[2 * n] + c as f32) * stride;
                    lm.y = (k[2 * n + 1] + r as f32) * stride;
                }

                candidates.push(FaceBox {
                    x: cx - w / 2.0,
                    y: cy - h / 2.0,
                    width: w,
                    height: h,
                    score,
                    landmarks,
                });
            }
        }
    }

    Ok(non_maximum_suppression(
        candidates,
        config.nms_threshold,
        config.top_k,
    ))
}

/// Greedy NMS, highest score first, keeping at most `top_k` faces.
pub fn non_maximum_suppression(
    mut faces: Vec<FaceBox>,
    iou_threshold: f32,
    top_k: usize,
) -> Vec<FaceBox> {
    faces.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<FaceBox> = Vec::new();
    for face in faces {
        if keep.len() >= top_k {
            break;
        }
        if keep.iter().all(|kept| kept.iou(&face) <= iou_threshold) {
            keep.push(face);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_heads(side: u32) -> Vec<StrideHeads> {
        STRIDES
            .iter()
            .map(|&stride| {
                let cells = ((side / stride) * (side / stride)) as usize;
                StrideHeads {
                    stride,
                    cls: vec![0.0; cells],
                    obj: vec![0.0; cells],
                    bbox: vec![0.0; cells * 4],
                    kps: vec![0.0; cells * 10],
                }
            })
            .collect()
    }

    fn set_cell(head: &mut StrideHeads, idx: usize, score: f32, bbox: [f32; 4]) {
        head.cls[idx] = score;
        head.obj[idx] = score;
        head.bbox[idx * 4..idx * 4 + 4].copy_from_slice(&bbox);
    }

    #[test]
    fn test_letterbox_fit() {
        let lb = Letterbox::fit(1280, 720, 640);
        assert!((lb.scale - 0.5).abs() < 1e-6);
        assert_eq!((lb.width, lb.height, lb.side), (640, 360, 640));

        let lb = Letterbox::fit(320, 640, 640);
        assert!((lb.scale - 1.0).abs() < 1e-6);
        assert_eq!((lb.width, lb.height), (320, 640));
    }

    #[test]
    fn test_letterbox_bgr_layout() {
        let frame = RgbImage::from_pixel(2, 1, image::Rgb([10, 20, 30]));
        let lb = Letterbox::fit(2, 1, 32);
        let data = letterbox_bgr_chw(&frame, &lb);

        let plane = 32 * 32;
        assert_eq!(data.len(), 3 * plane);
        // Pixel (0, 0): B, G, R planes
        assert_eq!(data[0], 30.0);
        assert_eq!(data[plane], 20.0);
        assert_eq!(data[2 * plane], 10.0);
        // Padding stays zero
        assert_eq!(data[plane - 1], 0.0);
    }

    #[test]
    fn test_decode_single_face() {
        let mut heads = empty_heads(32);
        // stride 8 grid is 4x4; cell (row 1, col 2)
        let idx = 4 + 2;
        set_cell(&mut heads[0], idx, 0.9, [0.5, 0.5, 2f32.ln(), 2f32.ln()]);
        heads[0].kps[idx * 10] = 0.25;
        heads[0].kps[idx * 10 + 1] = 0.75;

        let faces = decode_heads(&heads, 32, &DetectorConfig::default()).unwrap();
        assert_eq!(faces.len(), 1);

        let face = faces[0];
        assert!((face.score - 0.9).abs() < 1e-5);
        assert!((face.x - 12.0).abs() < 1e-4);
        assert!((face.y - 4.0).abs() < 1e-4);
        assert!((face.width - 16.0).abs() < 1e-4);
        assert!((face.height - 16.0).abs() < 1e-4);
        assert!((face.landmarks[0].x - 18.0).abs() < 1e-4);
        assert!((face.landmarks[0].y - 14.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_filters_low_scores() {
        let mut heads = empty_heads(32);
        set_cell(&mut heads[1], 0, 0.5, [0.5, 0.5, 0.0, 0.0]);
        // cls above 1 is clamped before the geometric mean
        heads[2].cls[0] = 4.0;
        heads[2].obj[0] = 0.25;

        let faces = decode_heads(&heads, 32, &DetectorConfig::default()).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_decode_rejects_short_heads() {
        let mut heads = empty_heads(32);
        heads[0].cls.truncate(3);
        assert!(matches!(
            decode_heads(&heads, 32, &DetectorConfig::default()),
            Err(MediaError::DetectionFailed(_))
        ));
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let faces = vec![
            FaceBox::new(0.0, 0.0, 10.0, 10.0, 0.85),
            FaceBox::new(1.0, 1.0, 10.0, 10.0, 0.95),
            FaceBox::new(50.0, 50.0, 10.0, 10.0, 0.9),
        ];

        let kept = non_maximum_suppression(faces, 0.3, 50);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.95);
        assert_eq!(kept[1].score, 0.9);
    }

    #[test]
    fn test_nms_top_k() {
        let faces = (0..5)
            .map(|i| FaceBox::new(i as f32 * 100.0, 0.0, 10.0, 10.0, 0.9 - i as f32 * 0.01))
            .collect();
        assert_eq!(non_maximum_suppression(faces, 0.3, 2).len(), 2);
    }

    #[test]
    fn test_config_validation() {
        assert!(DetectorConfig::default().validate().is_ok());
        let bad = DetectorConfig {
            input_side: 100,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_load_missing_model() {
        let result = YuNetFaceDetector::load("/nonexistent/yunet.onnx", DetectorConfig::default());
        assert!(matches!(result, Err(MediaError::ModelNotFound(_))));
    }
}
