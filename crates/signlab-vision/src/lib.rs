//! signlab-vision: hand landmarks and sign classification.
//!
//! A hand landmark network runs via ONNX Runtime; its keypoints become a
//! fixed-size feature vector that a `SignClassifier` turns into a label.

pub mod classifier;
pub mod features;
pub mod landmarker;
pub mod types;

pub use classifier::{validate, DemoClassifier, OnnxClassifier, PredictionCheck, SignClassifier};
pub use landmarker::HandLandmarker;
pub use types::{BoundingBox, Hand, Handedness, Landmark, Prediction, RankedLabel};
