use serde::{Deserialize, Serialize};

/// Landmarks per hand in the MediaPipe hand topology.
pub const LANDMARKS_PER_HAND: usize = 21;

/// One hand keypoint. `x`/`y` are normalized to the frame, `z` is depth
/// relative to the wrist on roughly the same scale as `x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// A detected hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hand {
    pub landmarks: Vec<Landmark>,
    pub handedness: Handedness,
    /// Hand presence score in [0, 1].
    pub score: f32,
}

/// Axis-aligned box in normalized frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLabel {
    pub label: String,
    pub confidence: f32,
}

/// Classifier output: best label plus the top candidates, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
    pub top: Vec<RankedLabel>,
}
