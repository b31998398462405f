//! API request/response types and error mapping.

use crate::engine::EngineError;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use signlab_core::{ChallengeError, QuizError};
use signlab_store::StoreError;
use signlab_vision::Hand;
use std::time::Instant;

/// Response envelope shared by every JSON endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn disabled(feature: &str) -> Self {
        Self::new("FEATURE_DISABLED", format!("{feature} is disabled"))
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new("UNPROCESSABLE", message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new("SERVICE_UNAVAILABLE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

pub type ErrorReply = (StatusCode, Json<ApiResponse<()>>);
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ErrorReply>;

/// A status code plus error body, built from any domain error.
#[derive(Debug)]
pub struct Failure {
    pub status: StatusCode,
    pub error: ApiError,
}

impl Failure {
    pub fn new(status: StatusCode, error: ApiError) -> Self {
        Self { status, error }
    }
}

impl From<StoreError> for Failure {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::EmailTaken(_) | StoreError::DailyChallengeDone(_) => {
                Self::new(StatusCode::CONFLICT, ApiError::conflict(e.to_string()))
            }
            StoreError::UserNotFound(_) => Self::new(StatusCode::NOT_FOUND, ApiError::not_found(e.to_string())),
            StoreError::Invalid(_) => Self::new(StatusCode::BAD_REQUEST, ApiError::bad_request(e.to_string())),
            _ => {
                tracing::error!(error = %e, "store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal("database error"))
            }
        }
    }
}

impl From<EngineError> for Failure {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NoHands => Self::new(StatusCode::UNPROCESSABLE_ENTITY, ApiError::unprocessable(e.to_string())),
            EngineError::CameraUnavailable | EngineError::LandmarkModelMissing | EngineError::Camera(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, ApiError::unavailable(e.to_string()))
            }
            _ => {
                tracing::error!(error = %e, "engine failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal(e.to_string()))
            }
        }
    }
}

impl From<QuizError> for Failure {
    fn from(e: QuizError) -> Self {
        match e {
            QuizError::UnknownKind(_) => Self::new(StatusCode::BAD_REQUEST, ApiError::bad_request(e.to_string())),
            _ => Self::new(StatusCode::CONFLICT, ApiError::conflict(e.to_string())),
        }
    }
}

impl From<ChallengeError> for Failure {
    fn from(e: ChallengeError) -> Self {
        match e {
            ChallengeError::UnknownKind(_)
            | ChallengeError::UnknownMini(_)
            | ChallengeError::WrongAction { .. }
            | ChallengeError::InvalidIndex(_) => {
                Self::new(StatusCode::BAD_REQUEST, ApiError::bad_request(e.to_string()))
            }
            _ => Self::new(StatusCode::CONFLICT, ApiError::conflict(e.to_string())),
        }
    }
}

/// Request latency clock; turns results into envelopes.
pub struct Timer(Instant);

impl Timer {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn ms(&self) -> f64 {
        self.0.elapsed().as_secs_f64() * 1000.0
    }

    pub fn ok<T: Serialize>(&self, data: T) -> ApiResult<T> {
        Ok(Json(ApiResponse::success(data, self.ms())))
    }

    pub fn fail(&self, status: StatusCode, error: ApiError) -> ErrorReply {
        (status, Json(ApiResponse::error(error, self.ms())))
    }

    pub fn err(&self, e: impl Into<Failure>) -> ErrorReply {
        let f = e.into();
        self.fail(f.status, f.error)
    }

    pub fn not_found(&self, what: impl Into<String>) -> ErrorReply {
        self.fail(StatusCode::NOT_FOUND, ApiError::not_found(what))
    }
}

// ---- system ----

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct FeatureFlags {
    pub real_time_feedback: bool,
    pub progress_analytics: bool,
    pub multi_language: bool,
    pub export_data: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusData {
    pub version: String,
    pub uptime_seconds: u64,
    pub engine: crate::engine::EngineStatus,
    pub confidence_threshold: f32,
    pub features: FeatureFlags,
    pub active_quizzes: usize,
    pub active_practice_sessions: usize,
    pub active_challenges: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

// ---- users ----

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub device_info: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub session_id: String,
    pub user: signlab_store::User,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterData {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub stats: signlab_store::UserStats,
    pub daily_goal: signlab_store::DailyGoal,
    pub languages: std::collections::BTreeMap<String, signlab_store::models::LanguageStats>,
}

#[derive(Debug, Deserialize)]
pub struct AchievementRequest {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub metric: Option<String>,
    pub limit: Option<usize>,
}

// ---- vision ----

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub hands: Vec<Hand>,
    #[serde(default)]
    pub target_sign: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PredictData {
    pub recognition: crate::engine::Recognition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<signlab_vision::PredictionCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<signlab_core::scoring::ConfidenceFeedback>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub target_sign: String,
    /// Seconds to watch the camera, clamped to 1..=10.
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub quality: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub confidence: f32,
    #[serde(default)]
    pub target_sign: Option<String>,
    #[serde(default)]
    pub predicted_sign: Option<String>,
}

// ---- quiz and practice ----

#[derive(Debug, Deserialize)]
pub struct QuizStartRequest {
    pub quiz_type: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuizStartData {
    pub quiz_id: uuid::Uuid,
    pub quiz_type: signlab_core::QuizKind,
    pub language: String,
    pub total_signs: usize,
    pub duration_secs: u64,
    pub current_sign: Option<String>,
    pub progress: signlab_core::quiz::QuizProgress,
}

#[derive(Debug, Deserialize)]
pub struct QuizAttemptRequest {
    pub predicted_sign: String,
    pub confidence: f32,
}

#[derive(Debug, Deserialize)]
pub struct PracticeStartRequest {
    pub user_id: String,
    #[serde(default)]
    pub session_type: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PracticeAttemptRequest {
    pub sign: String,
    pub correct: bool,
    pub confidence: f32,
}

// ---- challenges ----

#[derive(Debug, Deserialize)]
pub struct ChallengeStartRequest {
    /// Challenge type to run; without it (and without `mini_name`) the
    /// challenge of the day starts.
    #[serde(default)]
    pub challenge_type: Option<String>,
    #[serde(default)]
    pub mini_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TodayData {
    pub challenge: signlab_core::Challenge,
    pub info: signlab_core::challenge::ChallengeInfo,
    pub puzzles: Vec<signlab_core::Puzzle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}
