use crate::config::Config;
use chrono::Utc;
use serde::Serialize;
use signlab_core::progress::{validate_window, FramePrediction, WindowValidation};
use signlab_hw::{Camera, CameraError, Frame, FrameError, PixelFormat};
use signlab_vision::classifier::{load_class_names, ClassifierError};
use signlab_vision::features::{bounding_box, features};
use signlab_vision::landmarker::LandmarkerError;
use signlab_vision::{BoundingBox, DemoClassifier, Hand, HandLandmarker, OnnxClassifier, Prediction, SignClassifier};
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Consecutive capture failures before camera requests are refused.
pub const MAX_CAMERA_FAILURES: u32 = 10;

/// How long fallback mode refuses the camera before one capture is retried.
pub const FALLBACK_RETRY: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("landmarker error: {0}")]
    Landmarker(#[from] LandmarkerError),
    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("no hands detected")]
    NoHands,
    #[error("camera unavailable")]
    CameraUnavailable,
    #[error("hand landmark model not loaded")]
    LandmarkModelMissing,
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Hands found in a frame (or supplied by a client) and what they sign.
#[derive(Debug, Clone, Serialize)]
pub struct Recognition {
    pub hands: Vec<Hand>,
    pub bounding_box: Option<BoundingBox>,
    pub prediction: Prediction,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub camera_available: bool,
    pub camera_device: Option<String>,
    pub resolution: Option<(u32, u32)>,
    pub pixel_format: Option<PixelFormat>,
    pub landmark_model_loaded: bool,
    pub classifier: &'static str,
    pub classes: usize,
    pub fallback_mode: bool,
    pub consecutive_failures: u32,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Classify {
        hands: Vec<Hand>,
        reply: oneshot::Sender<Result<Recognition, EngineError>>,
    },
    Recognize {
        reply: oneshot::Sender<Result<Recognition, EngineError>>,
    },
    Validate {
        target: String,
        duration: Duration,
        reply: oneshot::Sender<Result<WindowValidation, EngineError>>,
    },
    Snapshot {
        quality: u8,
        reply: oneshot::Sender<Result<Vec<u8>, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
}

/// Owns the camera and both models. Lives on the engine thread.
pub struct Engine {
    camera: Option<Camera>,
    landmarker: Option<HandLandmarker>,
    classifier: Box<dyn SignClassifier>,
    failures: u32,
    fallback_since: Option<Instant>,
}

impl Engine {
    pub fn new(
        camera: Option<Camera>,
        landmarker: Option<HandLandmarker>,
        classifier: Box<dyn SignClassifier>,
    ) -> Self {
        Self {
            camera,
            landmarker,
            classifier,
            failures: 0,
            fallback_since: None,
        }
    }

    /// Open whatever is available. A missing camera or landmark model
    /// leaves the engine serving client-supplied landmarks only; a missing
    /// classifier model falls back to the demo classifier.
    pub fn from_config(config: &Config) -> Self {
        let camera = match Camera::open(&config.camera_config()) {
            Ok(cam) => {
                tracing::info!(
                    device = %cam.device_path,
                    width = cam.width,
                    height = cam.height,
                    fourcc = ?cam.fourcc,
                    "camera opened"
                );
                Some(cam)
            }
            Err(e) => {
                tracing::warn!(error = %e, "no camera; camera endpoints disabled");
                None
            }
        };

        let landmark_path = config.hand_landmark_model_path();
        let landmarker = match HandLandmarker::load(&landmark_path) {
            Ok(l) => {
                tracing::info!(path = %landmark_path, "hand landmarker loaded");
                Some(l)
            }
            Err(e) => {
                tracing::warn!(path = %landmark_path, error = %e, "hand landmarker unavailable");
                None
            }
        };

        let classifier = load_classifier(&config.sign_model_path(), &config.class_names);
        tracing::info!(
            classifier = classifier.name(),
            classes = classifier.classes().len(),
            "classifier ready"
        );

        Self::new(camera, landmarker, classifier)
    }

    pub fn in_fallback(&self) -> bool {
        self.failures >= MAX_CAMERA_FAILURES
    }

    /// Fallback refuses the camera until the retry interval has passed.
    fn camera_refused(&self) -> bool {
        self.fallback_since.is_some_and(|at| at.elapsed() < FALLBACK_RETRY)
    }

    pub fn status(&self) -> EngineStatus {
        let fallback_mode = self.in_fallback();
        let cam = self.camera.as_ref();
        EngineStatus {
            camera_available: cam.is_some() && !fallback_mode,
            camera_device: cam.map(|c| c.device_path.clone()),
            resolution: cam.map(|c| (c.width, c.height)),
            pixel_format: cam.map(Camera::pixel_format),
            landmark_model_loaded: self.landmarker.is_some(),
            classifier: self.classifier.name(),
            classes: self.classifier.classes().len(),
            fallback_mode,
            consecutive_failures: self.failures,
        }
    }

    /// Classify hands without touching the camera.
    pub fn classify(&mut self, hands: Vec<Hand>) -> Result<Recognition, EngineError> {
        if hands.is_empty() {
            return Err(EngineError::NoHands);
        }
        let prediction = self.classifier.classify(&features(&hands))?;
        tracing::debug!(label = %prediction.label, confidence = prediction.confidence, "classified");
        Ok(Recognition {
            bounding_box: bounding_box(&hands),
            hands,
            prediction,
        })
    }

    pub fn recognize(&mut self) -> Result<Recognition, EngineError> {
        let frame = self.capture()?;
        if frame.is_dark {
            tracing::debug!(seq = frame.sequence, "frame is mostly dark");
        }
        let landmarker = self.landmarker.as_mut().ok_or(EngineError::LandmarkModelMissing)?;
        let hands = landmarker.detect(&frame.data, frame.width, frame.height)?;
        self.classify(hands)
    }

    /// Stream frames for `duration`, classifying every frame with a hand.
    pub fn validate(&mut self, target: &str, duration: Duration) -> Result<WindowValidation, EngineError> {
        if self.camera_refused() {
            return Err(EngineError::CameraUnavailable);
        }
        let camera = self.camera.as_ref().ok_or(EngineError::CameraUnavailable)?;
        let landmarker = self.landmarker.as_mut().ok_or(EngineError::LandmarkModelMissing)?;
        let classifier = &mut self.classifier;

        let deadline = Instant::now() + duration;
        let mut predictions = Vec::new();
        let streamed = camera.capture_while(|frame| {
            if !frame.is_dark {
                match landmarker.detect(&frame.data, frame.width, frame.height) {
                    Ok(hands) if !hands.is_empty() => match classifier.classify(&features(&hands)) {
                        Ok(p) => predictions.push(FramePrediction {
                            sign: p.label,
                            confidence: p.confidence,
                            timestamp: Utc::now(),
                        }),
                        Err(e) => tracing::debug!(error = %e, "classification failed"),
                    },
                    Ok(_) => {}
                    Err(e) => tracing::debug!(error = %e, "landmark detection failed"),
                }
            }
            Instant::now() < deadline
        });
        let frames = self.track(streamed)?;

        tracing::info!(sign = target, frames, predictions = predictions.len(), "validation window closed");
        Ok(validate_window(target, predictions))
    }

    pub fn snapshot(&mut self, quality: u8) -> Result<Vec<u8>, EngineError> {
        let frame = self.capture()?;
        Ok(frame.to_jpeg(quality)?)
    }

    fn capture(&mut self) -> Result<Frame, EngineError> {
        if self.camera_refused() {
            return Err(EngineError::CameraUnavailable);
        }
        let camera = self.camera.as_ref().ok_or(EngineError::CameraUnavailable)?;
        let result = camera.capture_frame();
        self.track(result)
    }

    /// Count consecutive capture failures; any success resets the count
    /// and leaves fallback mode. A failed retry restarts the cooldown.
    fn track<T>(&mut self, result: Result<T, CameraError>) -> Result<T, EngineError> {
        match result {
            Ok(v) => {
                if self.fallback_since.take().is_some() {
                    tracing::info!(failures = self.failures, "camera recovered, leaving fallback mode");
                }
                self.failures = 0;
                Ok(v)
            }
            Err(e) => {
                self.failures += 1;
                if self.failures == MAX_CAMERA_FAILURES {
                    tracing::error!(failures = self.failures, "camera keeps failing, entering fallback mode");
                } else {
                    tracing::warn!(failures = self.failures, error = %e, "capture failed");
                }
                if self.in_fallback() {
                    self.fallback_since = Some(Instant::now());
                }
                Err(e.into())
            }
        }
    }
}

fn load_classifier(model_path: &str, class_names: &Path) -> Box<dyn SignClassifier> {
    if Path::new(model_path).exists() {
        match OnnxClassifier::load(model_path, class_names) {
            Ok(c) => return Box::new(c),
            Err(e) => tracing::warn!(path = model_path, error = %e, "sign model failed to load, using demo classifier"),
        }
    } else {
        tracing::info!(path = model_path, "no sign model, using demo classifier");
    }
    Box::new(DemoClassifier::new(load_class_names(class_names)))
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn classify(&self, hands: Vec<Hand>) -> Result<Recognition, EngineError> {
        self.call(|reply| EngineRequest::Classify { hands, reply }).await?
    }

    pub async fn recognize(&self) -> Result<Recognition, EngineError> {
        self.call(|reply| EngineRequest::Recognize { reply }).await?
    }

    pub async fn validate(&self, target: String, duration: Duration) -> Result<WindowValidation, EngineError> {
        self.call(|reply| EngineRequest::Validate {
            target,
            duration,
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self, quality: u8) -> Result<Vec<u8>, EngineError> {
        self.call(|reply| EngineRequest::Snapshot { quality, reply }).await?
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.call(|reply| EngineRequest::Status { reply }).await
    }
}

/// Build the engine from config and run it on a dedicated OS thread.
pub fn spawn_engine(config: &Config) -> EngineHandle {
    spawn(Engine::from_config(config))
}

/// Run an already-built engine on a dedicated OS thread.
pub fn spawn(mut engine: Engine) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("signlab-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Classify { hands, reply } => {
                        let _ = reply.send(engine.classify(hands));
                    }
                    EngineRequest::Recognize { reply } => {
                        let _ = reply.send(engine.recognize());
                    }
                    EngineRequest::Validate {
                        target,
                        duration,
                        reply,
                    } => {
                        let _ = reply.send(engine.validate(&target, duration));
                    }
                    EngineRequest::Snapshot { quality, reply } => {
                        let _ = reply.send(engine.snapshot(quality));
                    }
                    EngineRequest::Status { reply } => {
                        let _ = reply.send(engine.status());
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use signlab_vision::{Handedness, Landmark};

    pub(crate) fn demo_engine() -> Engine {
        Engine::new(None, None, Box::new(DemoClassifier::default()))
    }

    pub(crate) fn sample_hand() -> Hand {
        let landmarks = (0..21)
            .map(|i| Landmark {
                x: 0.3 + 0.01 * i as f32,
                y: 0.6 - 0.015 * i as f32,
                z: -0.002 * i as f32,
            })
            .collect();
        Hand {
            landmarks,
            handedness: Handedness::Right,
            score: 0.93,
        }
    }

    #[test]
    fn test_classify_requires_hands() {
        let mut engine = demo_engine();
        assert!(matches!(engine.classify(vec![]), Err(EngineError::NoHands)));
    }

    #[test]
    fn test_classify_supplied_hand() {
        let mut engine = demo_engine();
        let r = engine.classify(vec![sample_hand()]).unwrap();
        assert!(DemoClassifier::default().classes().contains(&r.prediction.label));
        assert!((0.3..=0.95).contains(&r.prediction.confidence));
        let bbox = r.bounding_box.unwrap();
        assert!(bbox.x >= 0.0 && bbox.x + bbox.width <= 1.0 + 1e-6);
    }

    #[test]
    fn test_camera_requests_without_camera() {
        let mut engine = demo_engine();
        assert!(matches!(engine.recognize(), Err(EngineError::CameraUnavailable)));
        assert!(matches!(engine.snapshot(80), Err(EngineError::CameraUnavailable)));
        assert!(matches!(
            engine.validate("hello", Duration::from_millis(10)),
            Err(EngineError::CameraUnavailable)
        ));
    }

    #[test]
    fn test_failures_enter_fallback_and_reset() {
        let mut engine = demo_engine();
        for _ in 0..MAX_CAMERA_FAILURES - 1 {
            let _ = engine.track::<()>(Err(CameraError::CaptureFailed("timeout".into())));
        }
        assert!(!engine.in_fallback());
        let _ = engine.track::<()>(Ok(()));
        assert_eq!(engine.status().consecutive_failures, 0);

        for _ in 0..MAX_CAMERA_FAILURES {
            let _ = engine.track::<()>(Err(CameraError::DeviceBusy));
        }
        assert!(engine.status().fallback_mode);
        assert!(engine.camera_refused());
        // landmark-based prediction keeps working
        assert!(engine.classify(vec![sample_hand()]).is_ok());
    }

    #[test]
    fn test_fallback_retries_after_cooldown() {
        let mut engine = demo_engine();
        for _ in 0..MAX_CAMERA_FAILURES {
            let _ = engine.track::<()>(Err(CameraError::DeviceBusy));
        }
        assert!(engine.camera_refused());

        let cooled = Instant::now().checked_sub(FALLBACK_RETRY + Duration::from_secs(1));
        engine.fallback_since = cooled;
        assert!(!engine.camera_refused());
        assert!(engine.in_fallback());

        // A failed retry arms the cooldown again.
        let _ = engine.track::<()>(Err(CameraError::DeviceBusy));
        assert!(engine.camera_refused());

        engine.fallback_since = cooled;
        assert!(engine.track(Ok(())).is_ok());
        assert!(!engine.in_fallback());
        assert!(!engine.camera_refused());
        assert!(!engine.status().fallback_mode);
    }

    #[test]
    fn test_status_without_hardware() {
        let status = demo_engine().status();
        assert!(!status.camera_available);
        assert!(!status.landmark_model_loaded);
        assert_eq!(status.classifier, "demo");
        assert_eq!(status.classes, 26);
    }

    #[tokio::test]
    async fn test_handle_round_trip() {
        let handle = spawn(demo_engine());
        let status = handle.status().await.unwrap();
        assert_eq!(status.classifier, "demo");
        let r = handle.classify(vec![sample_hand()]).await.unwrap();
        assert_eq!(r.hands.len(), 1);
        assert!(matches!(handle.recognize().await, Err(EngineError::CameraUnavailable)));
    }
}
