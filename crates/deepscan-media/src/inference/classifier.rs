//! Real/deepfake face classification with an ONNX model.

use std::path::Path;
use std::sync::Mutex;

use deepscan_models::{Label, Prediction};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use super::session::create_session;
use crate::error::{MediaError, MediaResult};

/// Maps a face crop to a Real/Deepfake prediction.
pub trait FaceClassifier: Send + Sync {
    fn classify(&self, face: &RgbImage) -> MediaResult<Prediction>;
}

/// Configuration for face classification.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Square input side (299 for Xception)
    pub input_size: u32,
    /// Per-channel normalization: (x / 255 - mean) / std
    pub mean: f32,
    pub std: f32,
    /// Output column for the deepfake class
    pub deepfake_class_index: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            input_size: 299,
            mean: 0.5,
            std: 0.5,
            deepfake_class_index: 1,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> MediaResult<()> {
        if self.input_size == 0 {
            return Err(MediaError::invalid_config("classifier input size must be positive"));
        }
        if self.std <= 0.0 || !self.std.is_finite() {
            return Err(MediaError::invalid_config("classifier std must be positive"));
        }
        Ok(())
    }
}

/// Deepfake classifier backed by ONNX Runtime.
pub struct DeepfakeClassifier {
    session: Mutex<Session>,
    output_name: String,
    config: ClassifierConfig,
}

impl DeepfakeClassifier {
    /// Load the classifier model.
    pub fn load(model_path: impl AsRef<Path>, config: ClassifierConfig) -> MediaResult<Self> {
        config.validate()?;
        let model_path = model_path.as_ref();
        let session = create_session(model_path, "classifier")?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| MediaError::classification_failed("Model has no outputs"))?;

        info!(
            model_path = %model_path.display(),
            input_size = config.input_size,
            output = %output_name,
            "Deepfake classifier initialized"
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            config,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn run_inference(&self, input: Value) -> MediaResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::classification_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            MediaError::classification_failed(format!("Missing {} tensor", self.output_name))
        })?;

        let (_, logits) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::classification_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok(logits.to_vec())
    }
}

impl FaceClassifier for DeepfakeClassifier {
    fn classify(&self, face: &RgbImage) -> MediaResult<Prediction> {
        if face.width() == 0 || face.height() == 0 {
            return Err(MediaError::classification_failed("Empty face image"));
        }

        let size = self.config.input_size as usize;
        let data = preprocess(face, &self.config);
        let input = Tensor::from_array((vec![1usize, 3, size, size], data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::classification_failed(format!("Failed to create tensor: {}", e)))?;

        let logits = self.run_inference(input)?;
        let prediction = interpret_logits(&logits, self.config.deepfake_class_index)?;

        debug!(
            label = %prediction.label,
            confidence = prediction.confidence,
            "Face classified"
        );
        Ok(prediction)
    }
}

/// Resize to the model input and normalize into RGB NCHW floats.
pub fn preprocess(face: &RgbImage, config: &ClassifierConfig) -> Vec<f32> {
    let size = config.input_size;
    let resized = if face.dimensions() == (size, size) {
        face.clone()
    } else {
        imageops::resize(face, size, size, FilterType::Triangle)
    };

    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = (y * size + x) as usize;
        for c in 0..3 {
            data[c * plane + offset] = (pixel[c] as f32 / 255.0 - config.mean) / config.std;
        }
    }

    data
}

/// Turn raw model outputs into a prediction.
///
/// One value is a deepfake logit (sigmoid); two or more are class logits
/// (softmax, then argmax).
pub fn interpret_logits(logits: &[f32], deepfake_index: usize) -> MediaResult<Prediction> {
    match logits {
        [] => Err(MediaError::classification_failed("Model returned no logits")),
        [logit] => {
            let p = sigmoid(*logit);
            if !p.is_finite() {
                return Err(MediaError::classification_failed("Non-finite logit"));
            }
            let prediction = if p >= 0.5 {
                Prediction::new(Label::Deepfake, p * 100.0)
            } else {
                Prediction::new(Label::Real, (1.0 - p) * 100.0)
            };
            Ok(prediction)
        }
        _ => {
            if deepfake_index >= logits.len() {
                return Err(MediaError::classification_failed(format!(
                    "Deepfake class index {} out of range for {} outputs",
                    deepfake_index,
                    logits.len()
                )));
            }
            let probabilities = softmax(logits);
            let prediction = Prediction::from_probabilities(&probabilities, deepfake_index);
            if prediction.label == Label::Unknown {
                return Err(MediaError::classification_failed("Non-finite logits"));
            }
            Ok(prediction)
        }
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax() {
        let p = softmax(&[1.0, 1.0]);
        assert!((p[0] - 0.5).abs() < 1e-6);

        let p = softmax(&[1000.0, 0.0]);
        assert!((p[0] - 1.0).abs() < 1e-6);
        assert!(p[1] >= 0.0);

        let sum: f32 = softmax(&[0.3, -1.2, 2.5]).iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_two_logit_head() {
        let prediction = interpret_logits(&[-1.0, 3.0], 1).unwrap();
        assert_eq!(prediction.label, Label::Deepfake);
        assert!(prediction.confidence > 98.0);

        let prediction = interpret_logits(&[2.0, 0.0], 1).unwrap();
        assert_eq!(prediction.label, Label::Real);

        // Models trained with the deepfake class first
        let prediction = interpret_logits(&[2.0, 0.0], 0).unwrap();
        assert_eq!(prediction.label, Label::Deepfake);
    }

    #[test]
    fn test_equal_logits_pick_first_class() {
        let prediction = interpret_logits(&[0.0, 0.0], 1).unwrap();
        assert_eq!(prediction.label, Label::Real);
        assert!((prediction.confidence - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_single_logit_head() {
        let prediction = interpret_logits(&[0.0], 1).unwrap();
        assert_eq!(prediction.label, Label::Deepfake);
        assert!((prediction.confidence - 50.0).abs() < 1e-4);

        let prediction = interpret_logits(&[-4.0], 1).unwrap();
        assert_eq!(prediction.label, Label::Real);
        assert!(prediction.confidence > 98.0);
    }

    #[test]
    fn test_invalid_logits() {
        assert!(interpret_logits(&[], 1).is_err());
        assert!(interpret_logits(&[f32::NAN], 1).is_err());
        assert!(interpret_logits(&[0.1, 0.2], 5).is_err());
    }

    #[test]
    fn test_preprocess_normalization() {
        let config = ClassifierConfig {
            input_size: 4,
            ..Default::default()
        };
        let face = RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 51]));
        let data = preprocess(&face, &config);

        assert_eq!(data.len(), 3 * 16);
        // R plane, then G, then B
        assert!((data[0] - 1.0).abs() < 1e-6);
        assert!((data[16] + 1.0).abs() < 1e-6);
        assert!((data[32] - (0.2 - 0.5) / 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_load_missing_model() {
        let result = DeepfakeClassifier::load("/nonexistent/xception.onnx", ClassifierConfig::default());
        assert!(matches!(result, Err(MediaError::ModelNotFound(_))));
    }
}
