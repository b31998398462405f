//! Shared state plus system, catalog and recognition handlers.

use axum::body::Bytes;
use axum::extract::{Json, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use signlab_core::language::{self, SignLanguage, DEFAULT_LANGUAGE};
use signlab_core::progress::WindowValidation;
use signlab_core::scoring::{confidence_feedback, ConfidenceFeedback};
use signlab_core::{bank, ChallengeRun, Module, PracticeSession, Question, QuizSession};
use signlab_store::{SignAttempt, Store};
use signlab_vision::{validate, PredictionCheck};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::quiz::{save_practice, save_quiz};
use super::types::*;
use crate::config::Config;
use crate::engine::{EngineHandle, Recognition};

/// Longest camera validation window a client may request.
const MAX_VALIDATE_SECS: u64 = 10;
const DEFAULT_VALIDATE_SECS: u64 = 3;
const DEFAULT_JPEG_QUALITY: u8 = 85;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// A paused quiz is closed after this many minutes.
const QUIZ_MAX_PAUSE_MINS: i64 = 30;
/// Minutes a challenge run stays completable after its time limit.
const CHALLENGE_GRACE_MINS: i64 = 5;
/// Practice sessions are closed this many hours after they start.
const PRACTICE_MAX_HOURS: i64 = 4;

pub struct ActiveQuiz {
    pub session: QuizSession,
    pub user_id: Option<String>,
}

pub struct ActiveChallenge {
    pub run: ChallengeRun,
    pub user_id: Option<String>,
}

/// Background task: close stale sessions every minute.
pub fn spawn_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            state.evict_stale(Utc::now()).await;
        }
    });
}

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub store: Mutex<Store>,
    pub engine: EngineHandle,
    pub quizzes: Mutex<HashMap<Uuid, ActiveQuiz>>,
    pub practice: Mutex<HashMap<String, PracticeSession>>,
    pub challenges: Mutex<HashMap<Uuid, ActiveChallenge>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config, store: Store, engine: EngineHandle) -> Self {
        Self {
            config,
            store: Mutex::new(store),
            engine,
            quizzes: Mutex::new(HashMap::new()),
            practice: Mutex::new(HashMap::new()),
            challenges: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Close every quiz, practice session and challenge run nobody can
    /// finish any more, storing what the learner reached. Returns how many
    /// entries left memory.
    pub async fn evict_stale(&self, now: DateTime<Utc>) -> usize {
        let quizzes: Vec<ActiveQuiz> = {
            let mut active = self.quizzes.lock().await;
            let max_pause = chrono::Duration::minutes(QUIZ_MAX_PAUSE_MINS);
            let stale: Vec<Uuid> = active
                .iter()
                .filter(|(_, q)| q.session.is_abandoned(now, max_pause))
                .map(|(id, _)| *id)
                .collect();
            stale.iter().filter_map(|id| active.remove(id)).collect()
        };
        let practice: Vec<PracticeSession> = {
            let mut active = self.practice.lock().await;
            let max_age = chrono::Duration::hours(PRACTICE_MAX_HOURS);
            let stale: Vec<String> = active
                .iter()
                .filter(|(_, s)| now - s.start_time > max_age)
                .map(|(id, _)| id.clone())
                .collect();
            stale.iter().filter_map(|id| active.remove(id)).collect()
        };
        let challenges: Vec<ActiveChallenge> = {
            let mut active = self.challenges.lock().await;
            let cutoff = now - chrono::Duration::minutes(CHALLENGE_GRACE_MINS);
            let stale: Vec<Uuid> = active
                .iter()
                .filter(|(_, c)| c.run.is_expired(cutoff))
                .map(|(id, _)| *id)
                .collect();
            stale.iter().filter_map(|id| active.remove(id)).collect()
        };

        let evicted = quizzes.len() + practice.len() + challenges.len();
        if evicted == 0 {
            return 0;
        }

        let store = self.store.lock().await;
        for mut quiz in quizzes {
            let results = quiz.session.abandon(now);
            if let Some(user_id) = &quiz.user_id {
                if let Err(e) = save_quiz(&store, user_id, &results) {
                    tracing::warn!(quiz = %results.quiz_id, error = %e, "abandoned quiz not stored");
                }
            }
        }
        for mut session in practice {
            let summary = session.end(session.start_time + chrono::Duration::hours(PRACTICE_MAX_HOURS));
            if let Err(e) = save_practice(&store, &session, &summary) {
                tracing::warn!(session = %session.id, error = %e, "abandoned practice session not stored");
            }
        }
        for mut entry in challenges {
            let deadline = entry.run.deadline();
            let result = entry.run.complete(deadline);
            if let Some(user_id) = &entry.user_id {
                if let Err(e) = store.record_challenge(user_id, &result) {
                    tracing::warn!(run = %result.run_id, error = %e, "abandoned challenge not recorded");
                }
            }
        }
        tracing::info!(evicted, "stale sessions closed");
        evicted
    }

    /// Canonical code for a requested language. Anything other than the
    /// default needs multi-language support switched on.
    pub fn resolve_language(&self, requested: Option<&str>) -> Result<&'static str, Failure> {
        let Some(code) = requested else {
            return Ok(DEFAULT_LANGUAGE);
        };
        // The bank carries a few codes (FSL, GSL, PSL) the catalog lists differently.
        let resolved = language::get(code).map(|l| l.code).or_else(|| {
            bank()
                .languages()
                .into_iter()
                .find(|c| c.eq_ignore_ascii_case(code))
        });
        let Some(resolved) = resolved else {
            return Err(Failure::new(
                StatusCode::BAD_REQUEST,
                ApiError::bad_request(format!("unsupported language: {code}")),
            ));
        };
        if resolved != DEFAULT_LANGUAGE && !self.config.enable_multi_language {
            return Err(Failure::new(StatusCode::FORBIDDEN, ApiError::disabled("multi-language support")));
        }
        Ok(resolved)
    }

    /// Reject requests for a switched-off feature.
    pub fn require(&self, enabled: bool, feature: &str) -> Result<(), Failure> {
        if enabled {
            Ok(())
        } else {
            Err(Failure::new(StatusCode::FORBIDDEN, ApiError::disabled(feature)))
        }
    }
}

// ============================================
// Health & Status
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    };

    Json(ApiResponse::success(data, start.elapsed().as_secs_f64() * 1000.0))
}

pub async fn status(State(state): State<Arc<AppState>>) -> ApiResult<StatusData> {
    let t = Timer::start();
    let engine = state.engine.status().await.map_err(|e| t.err(e))?;
    let cfg = &state.config;

    t.ok(StatusData {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        engine,
        confidence_threshold: cfg.confidence_threshold,
        features: FeatureFlags {
            real_time_feedback: cfg.enable_real_time_feedback,
            progress_analytics: cfg.enable_progress_analytics,
            multi_language: cfg.enable_multi_language,
            export_data: cfg.enable_export_data,
        },
        active_quizzes: state.quizzes.lock().await.len(),
        active_practice_sessions: state.practice.lock().await.len(),
        active_challenges: state.challenges.lock().await.len(),
    })
}

// ============================================
// Catalog
// ============================================

pub async fn list_languages(State(state): State<Arc<AppState>>) -> ApiResult<Vec<&'static SignLanguage>> {
    let t = Timer::start();
    let langs = language::all()
        .iter()
        .filter(|l| state.config.enable_multi_language || l.code == DEFAULT_LANGUAGE)
        .collect();
    t.ok(langs)
}

pub async fn language_modules(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<Vec<Module>> {
    let t = Timer::start();
    let code = state.resolve_language(Some(&code)).map_err(|e| t.err(e))?;
    t.ok(bank().modules(code).to_vec())
}

pub async fn search_signs(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<Question>> {
    let t = Timer::start();
    let code = state.resolve_language(Some(&code)).map_err(|e| t.err(e))?;
    let term = query.q.trim();
    if term.is_empty() {
        return Err(t.fail(StatusCode::BAD_REQUEST, ApiError::bad_request("empty search term")));
    }
    t.ok(bank().search_signs(code, term).into_iter().cloned().collect())
}

// ============================================
// Recognition
// ============================================

/// Classify client-supplied hand landmarks. Works without a camera.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PredictRequest>,
) -> ApiResult<PredictData> {
    let t = Timer::start();
    let language = state
        .resolve_language(req.language.as_deref())
        .map_err(|e| t.err(e))?;
    let recognition = state.engine.classify(req.hands).await.map_err(|e| t.err(e))?;
    let label = recognition.prediction.label.clone();
    let confidence = recognition.prediction.confidence;

    let check = req
        .target_sign
        .as_deref()
        .map(|target| validate(target, &label, confidence, state.config.confidence_threshold));

    if let (Some(user_id), Some(check)) = (&req.user_id, &check) {
        let attempt = SignAttempt {
            user_id: user_id.clone(),
            session_id: req.session_id.clone().unwrap_or_default(),
            language: language.to_string(),
            target_sign: check.target.clone(),
            predicted_sign: label.clone(),
            confidence,
            is_correct: check.correct && check.meets_threshold,
            feedback: Some(check.feedback.message.to_string()),
            attempt_time: Utc::now(),
        };
        let store = state.store.lock().await;
        if store.user(user_id).map_err(|e| t.err(e))?.is_none() {
            return Err(t.not_found(format!("user not found: {user_id}")));
        }
        store.record_sign_attempt(&attempt).map_err(|e| t.err(e))?;
    }

    let feedback = state
        .config
        .enable_real_time_feedback
        .then(|| confidence_feedback(confidence));

    t.ok(PredictData {
        recognition,
        check,
        feedback,
    })
}

pub async fn recognize(State(state): State<Arc<AppState>>) -> ApiResult<Recognition> {
    let t = Timer::start();
    let recognition = state.engine.recognize().await.map_err(|e| t.err(e))?;
    t.ok(recognition)
}

/// Watch the camera for a target sign over a short window.
pub async fn validate_sign(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<WindowValidation> {
    let t = Timer::start();
    let secs = req
        .duration_secs
        .unwrap_or(DEFAULT_VALIDATE_SECS)
        .clamp(1, MAX_VALIDATE_SECS);
    let result = state
        .engine
        .validate(req.target_sign, Duration::from_secs(secs))
        .await
        .map_err(|e| t.err(e))?;
    t.ok(result)
}

/// Current camera frame as JPEG.
pub async fn snapshot(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Response, ErrorReply> {
    let t = Timer::start();
    let quality = query.quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100);
    let jpeg = state.engine.snapshot(quality).await.map_err(|e| t.err(e))?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], Bytes::from(jpeg)).into_response())
}

#[derive(Debug, serde::Serialize)]
pub struct FeedbackData {
    pub feedback: ConfidenceFeedback,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<PredictionCheck>,
}

pub async fn feedback(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<FeedbackData> {
    let t = Timer::start();
    if !(0.0..=1.0).contains(&req.confidence) {
        return Err(t.fail(
            StatusCode::BAD_REQUEST,
            ApiError::bad_request("confidence must be between 0 and 1"),
        ));
    }
    let check = match (&req.target_sign, &req.predicted_sign) {
        (Some(target), Some(predicted)) => Some(validate(
            target,
            predicted,
            req.confidence,
            state.config.confidence_threshold,
        )),
        _ => None,
    };
    t.ok(FeedbackData {
        feedback: confidence_feedback(req.confidence),
        check,
    })
}
