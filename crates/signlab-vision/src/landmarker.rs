//! Hand landmark model via ONNX Runtime.
//!
//! Runs a MediaPipe-style hand landmark network on the whole frame: one
//! hand per frame, 21 keypoints, a presence score and a handedness score.
//! There is no separate palm detector, so the hand should fill a good part
//! of the frame for reliable results.

use crate::types::{Hand, Handedness, Landmark, LANDMARKS_PER_HAND};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const LANDMARK_INPUT_SIZE: usize = 224;
/// Hands below this presence score are dropped.
const PRESENCE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum LandmarkerError {
    #[error("model file not found: {0} (place a hand landmark ONNX model in models/)")]
    ModelNotFound(String),
    #[error("frame buffer is {got} bytes, expected {expected} for {width}x{height} RGB")]
    BadFrame {
        got: usize,
        expected: usize,
        width: u32,
        height: u32,
    },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Metadata for mapping letterboxed model coordinates back to the frame.
#[derive(Debug, Clone, Copy)]
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Output tensor indices: (landmarks, presence, handedness).
type OutputIndices = (usize, usize, Option<usize>);

pub struct HandLandmarker {
    session: Session,
    outputs: OutputIndices,
}

impl HandLandmarker {
    pub fn load(model_path: &str) -> Result<Self, LandmarkerError> {
        if !Path::new(model_path).exists() {
            return Err(LandmarkerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded hand landmark model"
        );

        if output_names.len() < 2 {
            return Err(LandmarkerError::InferenceFailed(format!(
                "hand landmark model needs landmark and presence outputs, got {}",
                output_names.len()
            )));
        }

        let outputs = discover_output_indices(&output_names);
        tracing::debug!(?outputs, "hand landmark output tensor mapping");

        Ok(Self { session, outputs })
    }

    /// Detect at most one hand in a packed RGB8 frame.
    pub fn detect(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<Hand>, LandmarkerError> {
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected || width == 0 || height == 0 {
            return Err(LandmarkerError::BadFrame {
                got: rgb.len(),
                expected,
                width,
                height,
            });
        }

        let (input, letterbox) = preprocess(rgb, width as usize, height as usize);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (lm_idx, presence_idx, handed_idx) = self.outputs;
        let (_, coords) = outputs[lm_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkerError::InferenceFailed(format!("landmarks: {e}")))?;
        let (_, presence) = outputs[presence_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkerError::InferenceFailed(format!("presence: {e}")))?;
        let handedness = match handed_idx {
            Some(i) => {
                let (_, h) = outputs[i]
                    .try_extract_tensor::<f32>()
                    .map_err(|e| LandmarkerError::InferenceFailed(format!("handedness: {e}")))?;
                h.first().copied()
            }
            None => None,
        };

        let presence = presence.first().copied().unwrap_or(0.0);
        let hand = decode_hand(
            coords,
            presence,
            handedness,
            &letterbox,
            width as f32,
            height as f32,
        );
        Ok(hand.into_iter().collect())
    }
}

/// Pick output tensors by name, falling back to the usual export order
/// `[landmarks, presence, handedness, ...]`.
fn discover_output_indices(names: &[String]) -> OutputIndices {
    let find = |keys: &[&str]| -> Option<usize> {
        names.iter().position(|n| {
            let n = n.to_ascii_lowercase();
            keys.iter().any(|k| n.contains(k)) && !n.contains("world")
        })
    };

    let landmarks = find(&["landmark"]);
    let presence = find(&["presence", "flag", "score"]);
    let handedness = find(&["handed"]);

    match (landmarks, presence) {
        (Some(l), Some(p)) => (l, p, handedness),
        _ => {
            tracing::info!(
                ?names,
                "hand landmark output names not recognized, using positional mapping"
            );
            (0, 1, (names.len() > 2).then_some(2))
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Scores already in [0, 1] are probabilities; anything else is a logit.
fn to_probability(x: f32) -> f32 {
    if (0.0..=1.0).contains(&x) {
        x
    } else {
        sigmoid(x)
    }
}

/// Turn raw model outputs into a hand in normalized frame coordinates.
fn decode_hand(
    coords: &[f32],
    presence: f32,
    handedness: Option<f32>,
    letterbox: &LetterboxInfo,
    width: f32,
    height: f32,
) -> Option<Hand> {
    let score = to_probability(presence);
    if score < PRESENCE_THRESHOLD || coords.len() < LANDMARKS_PER_HAND * 3 {
        return None;
    }

    let landmarks = coords
        .chunks_exact(3)
        .take(LANDMARKS_PER_HAND)
        .map(|c| Landmark {
            x: (c[0] - letterbox.pad_x) / letterbox.scale / width,
            y: (c[1] - letterbox.pad_y) / letterbox.scale / height,
            z: c[2] / letterbox.scale / width,
        })
        .collect();

    let handedness = match handedness.map(to_probability) {
        Some(p) if p < 0.5 => Handedness::Left,
        _ => Handedness::Right,
    };

    Some(Hand {
        landmarks,
        handedness,
        score,
    })
}

/// Letterbox an RGB frame into a NHWC tensor in [0, 1].
///
/// Bilinear resize keeps thin finger edges intact; padding is black.
fn preprocess(rgb: &[u8], width: usize, height: usize) -> (Array4<f32>, LetterboxInfo) {
    let size = LANDMARK_INPUT_SIZE;
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as usize).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as usize).clamp(1, size);
    let pad_x = (size - new_w) as f32 / 2.0;
    let pad_y = (size - new_h) as f32 / 2.0;
    let pad_x_start = pad_x.floor() as usize;
    let pad_y_start = pad_y.floor() as usize;

    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));
    let inv_scale = 1.0 / scale;

    for y in 0..new_h {
        let src_y = (y as f32 + 0.5) * inv_scale - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
        let y1 = (y0 + 1).min(height - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..new_w {
            let src_x = (x as f32 + 0.5) * inv_scale - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
            let x1 = (x0 + 1).min(width - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            for c in 0..3 {
                let px = |xx: usize, yy: usize| rgb[(yy * width + xx) * 3 + c] as f32;
                let val = px(x0, y0) * (1.0 - fx) * (1.0 - fy)
                    + px(x1, y0) * fx * (1.0 - fy)
                    + px(x0, y1) * (1.0 - fx) * fy
                    + px(x1, y1) * fx * fy;
                tensor[[0, pad_y_start + y, pad_x_start + x, c]] = val / 255.0;
            }
        }
    }

    (tensor, LetterboxInfo { scale, pad_x, pad_y })
}
