//! Timed quizzes and free practice sessions.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use signlab_core::progress::{LiveStats, SessionKind, SessionSummary};
use signlab_core::quiz::{AttemptOutcome, QuizProgress, QuizState, SkipOutcome};
use signlab_core::{bank, PracticeSession, QuizError, QuizKind, QuizResults, QuizSession};
use signlab_store::{ProgressUpdate, Store};
use std::sync::Arc;
use uuid::Uuid;

use super::handlers::{ActiveQuiz, AppState};
use super::types::*;
use super::users::ensure_user;

#[derive(Debug, Serialize)]
pub struct QuizView {
    pub quiz_id: Uuid,
    pub quiz_type: QuizKind,
    pub language: String,
    pub state: QuizState,
    pub current_sign: Option<String>,
    pub progress: QuizProgress,
}

pub async fn start_quiz(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuizStartRequest>,
) -> ApiResult<QuizStartData> {
    let t = Timer::start();
    let kind = QuizKind::parse(&req.quiz_type).map_err(|e| t.err(e))?;
    let language = state
        .resolve_language(req.language.as_deref())
        .map_err(|e| t.err(e))?;
    if let Some(user_id) = &req.user_id {
        ensure_user(&*state.store.lock().await, user_id, &t)?;
    }

    let now = Utc::now();
    let mut rng = StdRng::from_entropy();
    let session = QuizSession::start_from_bank(kind, language, bank(), &mut rng, now)
        .with_confidence_threshold(state.config.confidence_threshold);
    let data = QuizStartData {
        quiz_id: session.id,
        quiz_type: kind,
        language: language.to_string(),
        total_signs: session.questions.len(),
        duration_secs: kind.config().duration_secs,
        current_sign: session.current_sign().map(String::from),
        progress: session.progress(now),
    };
    state.quizzes.lock().await.insert(
        session.id,
        ActiveQuiz {
            session,
            user_id: req.user_id,
        },
    );
    t.ok(data)
}

pub async fn get_quiz(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<QuizView> {
    let t = Timer::start();
    let quizzes = state.quizzes.lock().await;
    let quiz = quizzes.get(&id).ok_or_else(|| t.not_found(format!("quiz not found: {id}")))?;
    let s = &quiz.session;
    t.ok(QuizView {
        quiz_id: s.id,
        quiz_type: s.kind,
        language: s.language.clone(),
        state: s.state(),
        current_sign: s.current_sign().map(String::from),
        progress: s.progress(Utc::now()),
    })
}

pub async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<QuizAttemptRequest>,
) -> ApiResult<AttemptOutcome> {
    let t = Timer::start();
    let now = Utc::now();
    let mut quizzes = state.quizzes.lock().await;
    let quiz = quizzes
        .get_mut(&id)
        .ok_or_else(|| t.not_found(format!("quiz not found: {id}")))?;
    let outcome = match quiz.session.submit(&req.predicted_sign, req.confidence, now) {
        Ok(outcome) => outcome,
        Err(QuizError::Expired) => {
            // The session completed itself; store what was reached in time.
            let results = quiz.session.end(now);
            let user_id = quiz.user_id.clone();
            quizzes.remove(&id);
            persist_results(&state, user_id.as_deref(), &results, &t).await?;
            return Err(t.err(QuizError::Expired));
        }
        Err(e) => return Err(t.err(e)),
    };
    if let Some(results) = &outcome.results {
        let user_id = quiz.user_id.clone();
        quizzes.remove(&id);
        persist_results(&state, user_id.as_deref(), results, &t).await?;
    }
    t.ok(outcome)
}

pub async fn skip_sign(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<SkipOutcome> {
    let t = Timer::start();
    let mut quizzes = state.quizzes.lock().await;
    let quiz = quizzes
        .get_mut(&id)
        .ok_or_else(|| t.not_found(format!("quiz not found: {id}")))?;
    let outcome = quiz.session.skip(Utc::now()).map_err(|e| t.err(e))?;
    if let Some(results) = &outcome.results {
        let user_id = quiz.user_id.clone();
        quizzes.remove(&id);
        persist_results(&state, user_id.as_deref(), results, &t).await?;
    }
    t.ok(outcome)
}

pub async fn pause_quiz(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<QuizProgress> {
    let t = Timer::start();
    let now = Utc::now();
    let mut quizzes = state.quizzes.lock().await;
    let quiz = quizzes
        .get_mut(&id)
        .ok_or_else(|| t.not_found(format!("quiz not found: {id}")))?;
    quiz.session.pause(now).map_err(|e| t.err(e))?;
    t.ok(quiz.session.progress(now))
}

pub async fn resume_quiz(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<QuizProgress> {
    let t = Timer::start();
    let now = Utc::now();
    let mut quizzes = state.quizzes.lock().await;
    let quiz = quizzes
        .get_mut(&id)
        .ok_or_else(|| t.not_found(format!("quiz not found: {id}")))?;
    quiz.session.resume(now).map_err(|e| t.err(e))?;
    t.ok(quiz.session.progress(now))
}

/// End early. The quiz leaves memory once its results are stored.
pub async fn end_quiz(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<QuizResults> {
    let t = Timer::start();
    let mut quiz = state
        .quizzes
        .lock()
        .await
        .remove(&id)
        .ok_or_else(|| t.not_found(format!("quiz not found: {id}")))?;
    let results = quiz.session.end(Utc::now());
    persist_results(&state, quiz.user_id.as_deref(), &results, &t).await?;
    t.ok(results)
}

/// Store a finished quiz and fold it into the learner's progress.
async fn persist_results(
    state: &AppState,
    user_id: Option<&str>,
    results: &QuizResults,
    t: &Timer,
) -> Result<(), ErrorReply> {
    let Some(user_id) = user_id else {
        return Ok(());
    };
    save_quiz(&state.store.lock().await, user_id, results).map_err(|e| t.err(e))
}

pub(super) fn save_quiz(store: &Store, user_id: &str, results: &QuizResults) -> Result<(), signlab_store::StoreError> {
    store.save_quiz_result(user_id, results)?;
    let update = ProgressUpdate {
        signs_learned: Some(results.correct_signs),
        accuracy_score: Some((results.accuracy / 100.0).clamp(0.0, 1.0)),
        practice_time: Some(minutes(results.time_taken_secs / 60.0)),
        level: None,
    };
    store.update_progress(user_id, &results.language, &update, results.completed_at)?;
    tracing::info!(user = user_id, quiz = %results.quiz_id, accuracy = results.accuracy, "quiz results stored");
    Ok(())
}

fn minutes(m: f64) -> u32 {
    m.round().max(0.0) as u32
}

// ============================================
// Practice sessions
// ============================================

pub async fn start_practice(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PracticeStartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PracticeSession>>), ErrorReply> {
    let t = Timer::start();
    let kind = match req.session_type.as_deref() {
        None => SessionKind::Practice,
        Some(s) => SessionKind::parse(s).ok_or_else(|| {
            t.fail(
                StatusCode::BAD_REQUEST,
                ApiError::bad_request(format!("unknown session type: {s}")),
            )
        })?,
    };
    let language = state
        .resolve_language(req.language.as_deref())
        .map_err(|e| t.err(e))?;

    let session = PracticeSession::start(&req.user_id, kind, language, Utc::now());
    let mut active = state.practice.lock().await;
    if active.contains_key(&session.id) {
        return Err(t.fail(
            StatusCode::CONFLICT,
            ApiError::conflict("a session was started for this user in the same second"),
        ));
    }
    {
        let store = state.store.lock().await;
        ensure_user(&store, &req.user_id, &t)?;
        store.save_practice_session(&session).map_err(|e| t.err(e))?;
    }
    active.insert(session.id.clone(), session.clone());
    Ok((StatusCode::CREATED, Json(ApiResponse::success(session, t.ms()))))
}

pub async fn practice_attempt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PracticeAttemptRequest>,
) -> ApiResult<LiveStats> {
    let t = Timer::start();
    let mut active = state.practice.lock().await;
    let session = active
        .get_mut(&id)
        .ok_or_else(|| t.not_found(format!("practice session not found: {id}")))?;
    session.record_attempt(&req.sign, req.correct, req.confidence.clamp(0.0, 1.0));
    t.ok(session.live_stats(Utc::now()))
}

pub async fn end_practice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<SessionSummary> {
    let t = Timer::start();
    let mut session = state
        .practice
        .lock()
        .await
        .remove(&id)
        .ok_or_else(|| t.not_found(format!("practice session not found: {id}")))?;
    let summary = session.end(Utc::now());
    save_practice(&state.store.lock().await, &session, &summary).map_err(|e| t.err(e))?;
    t.ok(summary)
}

pub(super) fn save_practice(
    store: &Store,
    session: &PracticeSession,
    summary: &SessionSummary,
) -> Result<(), signlab_store::StoreError> {
    store.save_practice_session(session)?;
    let update = ProgressUpdate {
        signs_learned: Some(summary.signs_learned as u32),
        accuracy_score: Some(session.accuracy),
        practice_time: Some(minutes(session.duration_minutes)),
        level: None,
    };
    let at = session.end_time.unwrap_or(session.start_time);
    store.update_progress(&session.user_id, &session.language, &update, at)
}
