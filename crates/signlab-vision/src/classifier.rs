//! Sign classification from hand feature vectors.

use crate::types::{Prediction, RankedLabel};
use ndarray::Array2;
use ort::session::Session;
use ort::value::TensorRef;
use serde::Serialize;
use signlab_core::scoring::{confidence_feedback, ConfidenceFeedback};
use std::path::Path;
use thiserror::Error;

/// Candidates reported alongside the best label.
pub const TOP_K: usize = 5;

/// Labels used when no `class_names.txt` sits next to the model.
pub const DEFAULT_CLASS_NAMES: [&str; 26] = [
    "hello", "thank_you", "please", "sorry", "yes", "no", "help", "water", "food", "more", "stop", "good", "bad",
    "happy", "sad", "love", "family", "friend", "work", "home", "school", "car", "money", "time", "day", "night",
];

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("no features to classify")]
    EmptyFeatures,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Trait for turning a feature vector into a labelled prediction.
pub trait SignClassifier: Send {
    fn classify(&mut self, features: &[f32]) -> Result<Prediction, ClassifierError>;

    /// Short identifier for status reporting.
    fn name(&self) -> &'static str;

    fn classes(&self) -> &[String];
}

/// Read one label per line, skipping blanks. Missing or unreadable files
/// yield the built-in list.
pub fn load_class_names(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let names: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            if names.is_empty() {
                tracing::warn!(path = %path.display(), "class names file is empty, using defaults");
                default_class_names()
            } else {
                tracing::info!(path = %path.display(), count = names.len(), "loaded class names");
                names
            }
        }
        Err(e) => {
            tracing::info!(path = %path.display(), error = %e, "class names file unavailable, using defaults");
            default_class_names()
        }
    }
}

pub fn default_class_names() -> Vec<String> {
    DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Feature-vector classifier backed by an ONNX model with a `[1, N]` input.
pub struct OnnxClassifier {
    session: Session,
    classes: Vec<String>,
}

impl OnnxClassifier {
    pub fn load(model_path: &str, class_names_path: &Path) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded sign classifier model"
        );

        Ok(Self {
            session,
            classes: load_class_names(class_names_path),
        })
    }
}

impl SignClassifier for OnnxClassifier {
    fn classify(&mut self, features: &[f32]) -> Result<Prediction, ClassifierError> {
        if features.is_empty() {
            return Err(ClassifierError::EmptyFeatures);
        }

        let input = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| ClassifierError::InferenceFailed(format!("input shape: {e}")))?;
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("class scores: {e}")))?;

        if raw.is_empty() {
            return Err(ClassifierError::InferenceFailed("model returned no scores".into()));
        }

        let probs = if is_distribution(raw) {
            raw.to_vec()
        } else {
            softmax(raw)
        };
        Ok(rank(&probs, &self.classes))
    }

    fn name(&self) -> &'static str {
        "onnx"
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Deterministic stand-in used when no classifier model is installed.
///
/// The label comes from a hash of the feature bits, so the same pose always
/// maps to the same sign. Confidence grows with feature variance.
pub struct DemoClassifier {
    classes: Vec<String>,
}

impl DemoClassifier {
    pub fn new(classes: Vec<String>) -> Self {
        let classes = if classes.is_empty() {
            default_class_names()
        } else {
            classes
        };
        Self { classes }
    }
}

impl Default for DemoClassifier {
    fn default() -> Self {
        Self::new(default_class_names())
    }
}

impl SignClassifier for DemoClassifier {
    fn classify(&mut self, features: &[f32]) -> Result<Prediction, ClassifierError> {
        if features.is_empty() {
            return Err(ClassifierError::EmptyFeatures);
        }

        let n = self.classes.len();
        let best = (fnv1a(features) % n as u64) as usize;
        let confidence = (0.5 + 10.0 * variance(features)).clamp(0.3, 0.95);

        let top = (0..TOP_K.min(n))
            .map(|i| RankedLabel {
                label: self.classes[(best + i) % n].clone(),
                confidence: confidence * 0.9f32.powi(i as i32),
            })
            .collect();

        Ok(Prediction {
            label: self.classes[best].clone(),
            confidence,
            top,
        })
    }

    fn name(&self) -> &'static str {
        "demo"
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }
}

fn fnv1a(values: &[f32]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for v in values {
        for b in v.to_bits().to_le_bytes() {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(PRIME);
        }
    }
    hash
}

/// Population variance.
fn variance(values: &[f32]) -> f32 {
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n
}

fn is_distribution(values: &[f32]) -> bool {
    values.iter().all(|v| (0.0..=1.0).contains(v)) && (values.iter().sum::<f32>() - 1.0).abs() < 1e-3
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Sort scores descending and keep the top candidates. Indices without a
/// class name are reported as `class_<i>`.
fn rank(probs: &[f32], classes: &[String]) -> Prediction {
    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));

    let label_of = |i: usize| classes.get(i).cloned().unwrap_or_else(|| format!("class_{i}"));
    let top: Vec<RankedLabel> = order
        .iter()
        .take(TOP_K)
        .map(|&i| RankedLabel {
            label: label_of(i),
            confidence: probs[i],
        })
        .collect();

    Prediction {
        label: top[0].label.clone(),
        confidence: top[0].confidence,
        top,
    }
}

/// Outcome of comparing a prediction to the sign the learner was asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionCheck {
    pub correct: bool,
    pub meets_threshold: bool,
    /// Confidence as a whole percentage, truncated.
    pub accuracy_percentage: u32,
    pub feedback: ConfidenceFeedback,
    pub target: String,
    pub predicted: String,
}

/// Case-insensitive label match plus confidence gating.
pub fn validate(target: &str, predicted: &str, confidence: f32, threshold: f32) -> PredictionCheck {
    PredictionCheck {
        correct: target.eq_ignore_ascii_case(predicted),
        meets_threshold: confidence >= threshold,
        accuracy_percentage: (confidence.clamp(0.0, 1.0) * 100.0) as u32,
        feedback: confidence_feedback(confidence),
        target: target.to_string(),
        predicted: predicted.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signlab_core::scoring::ConfidenceLevel;

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[2.0, 1.0, 0.1]);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(p[0] > p[1] && p[1] > p[2]);
    }

    #[test]
    fn test_is_distribution() {
        assert!(is_distribution(&[0.7, 0.2, 0.1]));
        assert!(!is_distribution(&[2.0, -1.0]));
        assert!(!is_distribution(&[0.5, 0.1]));
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let classes: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let probs = [0.05, 0.3, 0.1, 0.2, 0.15, 0.2];
        let p = rank(&probs, &classes);
        assert_eq!(p.label, "b");
        assert_eq!(p.top.len(), TOP_K);
        assert!(p.top.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        assert!(p.top.iter().any(|r| r.label.starts_with("class_")));
    }

    #[test]
    fn test_demo_is_deterministic() {
        let mut clf = DemoClassifier::default();
        let features: Vec<f32> = (0..78).map(|i| i as f32 * 0.01).collect();
        let a = clf.classify(&features).unwrap();
        let b = clf.classify(&features).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.top.len(), TOP_K);
        assert_eq!(a.top[0].label, a.label);
        assert!((a.top[1].confidence - a.confidence * 0.9).abs() < 1e-6);
        assert!(DEFAULT_CLASS_NAMES.contains(&a.label.as_str()));
    }

    #[test]
    fn test_demo_confidence_bounds() {
        let mut clf = DemoClassifier::default();
        let flat = clf.classify(&[0.5; 10]).unwrap();
        assert!((flat.confidence - 0.5).abs() < 1e-6);

        let spread: Vec<f32> = (0..10).map(|i| if i % 2 == 0 { 0.0 } else { 1.0 }).collect();
        let high = clf.classify(&spread).unwrap();
        assert!((high.confidence - 0.95).abs() < 1e-6);

        assert!(matches!(clf.classify(&[]), Err(ClassifierError::EmptyFeatures)));
    }

    #[test]
    fn test_demo_small_class_list() {
        let mut clf = DemoClassifier::new(vec!["yes".into(), "no".into()]);
        let p = clf.classify(&[0.1, 0.2]).unwrap();
        assert_eq!(p.top.len(), 2);
        assert_eq!(clf.classes().len(), 2);
        assert_eq!(clf.name(), "demo");
    }

    #[test]
    fn test_load_class_names_falls_back() {
        let names = load_class_names(Path::new("/nonexistent/class_names.txt"));
        assert_eq!(names.len(), 26);
        assert_eq!(names[0], "hello");
    }

    #[test]
    fn test_load_class_names_from_file() {
        let path = std::env::temp_dir().join(format!("signlab-classes-{}.txt", std::process::id()));
        std::fs::write(&path, "A\n\n B \nC\n").unwrap();
        let names = load_class_names(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_onnx_missing_model() {
        let err = OnnxClassifier::load("/nonexistent/model.onnx", Path::new("x")).err().unwrap();
        assert!(matches!(err, ClassifierError::ModelNotFound(_)));
    }

    #[test]
    fn test_validate() {
        let check = validate("Hello", "hello", 0.93, 0.7);
        assert!(check.correct);
        assert!(check.meets_threshold);
        assert_eq!(check.accuracy_percentage, 93);
        assert_eq!(check.feedback.level, ConfidenceLevel::Excellent);

        let miss = validate("hello", "thank_you", 0.4, 0.7);
        assert!(!miss.correct);
        assert!(!miss.meets_threshold);
        assert_eq!(miss.feedback.level, ConfidenceLevel::NotRecognized);
    }
}
