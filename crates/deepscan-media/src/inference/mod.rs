//! ONNX model inference.
//!
//! - [`face_detector`]: YuNet face detection
//! - [`classifier`]: real/deepfake face classification
//!
//! Sessions are guarded by a mutex; callers run inference on the blocking
//! thread pool.

pub mod classifier;
pub mod face_detector;
pub mod session;

pub use classifier::{ClassifierConfig, DeepfakeClassifier, FaceClassifier};
pub use face_detector::{DetectorConfig, FaceDetector, YuNetFaceDetector};
pub use session::create_session;
