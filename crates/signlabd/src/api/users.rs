//! Accounts, profiles, progress and reports.

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use signlab_core::progress::{self, ProgressOverview, WeeklyReport};
use signlab_store::models::LanguageProgress;
use signlab_store::{Achievement, LeaderboardEntry, LeaderboardMetric, ProfileUpdate, ProgressUpdate, User};
use std::sync::Arc;

use super::handlers::AppState;
use super::types::*;

const DEFAULT_OVERVIEW_DAYS: u32 = 30;
const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegisterData>>), ErrorReply> {
    let t = Timer::start();
    let user_id = state
        .store
        .lock()
        .await
        .create_user(&req.email, &req.password, &req.name, Utc::now())
        .map_err(|e| t.err(e))?;
    tracing::info!(user = %user_id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(RegisterData { user_id }, t.ms())),
    ))
}

pub async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> ApiResult<LoginData> {
    let t = Timer::start();
    let now = Utc::now();
    let store = state.store.lock().await;
    let user = store
        .authenticate(&req.email, &req.password, now)
        .map_err(|e| t.err(e))?
        .ok_or_else(|| t.fail(StatusCode::UNAUTHORIZED, ApiError::unauthorized("invalid email or password")))?;
    let device = req.device_info.as_deref().unwrap_or("api");
    let session_id = store
        .create_session(&user.id, device, None, now)
        .map_err(|e| t.err(e))?;
    store
        .log_activity(&user.id, Some(&session_id), "login", &serde_json::json!({ "device": device }), now)
        .map_err(|e| t.err(e))?;
    t.ok(LoginData { session_id, user })
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> ApiResult<serde_json::Value> {
    let t = Timer::start();
    let now = Utc::now();
    let store = state.store.lock().await;
    let user_id = store.session_user(&req.session_id).map_err(|e| t.err(e))?;
    let ended = store.end_session(&req.session_id, now).map_err(|e| t.err(e))?;
    let Some(user_id) = user_id.filter(|_| ended) else {
        return Err(t.not_found("session not found or already ended"));
    };
    store
        .log_activity(&user_id, Some(&req.session_id), "logout", &serde_json::Value::Null, now)
        .map_err(|e| t.err(e))?;
    t.ok(serde_json::json!({ "session_id": req.session_id, "ended": true }))
}

pub async fn get_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<User> {
    let t = Timer::start();
    let user = state.store.lock().await.user(&id).map_err(|e| t.err(e))?;
    match user {
        Some(user) => t.ok(user),
        None => Err(t.not_found(format!("user not found: {id}"))),
    }
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let t = Timer::start();
    let deleted = state.store.lock().await.delete_user(&id).map_err(|e| t.err(e))?;
    if !deleted {
        return Err(t.not_found(format!("user not found: {id}")));
    }
    state.practice.lock().await.retain(|_, s| s.user_id != id);
    tracing::info!(user = %id, "user deleted");
    t.ok(serde_json::json!({ "user_id": id, "deleted": true }))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut update): Json<ProfileUpdate>,
) -> ApiResult<User> {
    let t = Timer::start();
    if let Some(lang) = update.preferred_language.take() {
        let code = state.resolve_language(Some(&lang)).map_err(|e| t.err(e))?;
        update.preferred_language = Some(code.to_string());
    }
    let user = state
        .store
        .lock()
        .await
        .update_profile(&id, update)
        .map_err(|e| t.err(e))?;
    t.ok(user)
}

pub async fn user_stats(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<StatsData> {
    let t = Timer::start();
    let today = Utc::now().date_naive();
    let store = state.store.lock().await;
    let stats = store.user_stats(&id, today).map_err(|e| t.err(e))?;
    let daily_goal = store.daily_goal(&id, today).map_err(|e| t.err(e))?;
    let languages = store.language_stats(&id).map_err(|e| t.err(e))?;
    t.ok(StatsData {
        stats,
        daily_goal,
        languages,
    })
}

pub async fn user_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<LanguageProgress>> {
    let t = Timer::start();
    let store = state.store.lock().await;
    ensure_user(&store, &id, &t)?;
    let progress = store.all_progress(&id).map_err(|e| t.err(e))?;
    t.ok(progress)
}

pub async fn update_progress(
    State(state): State<Arc<AppState>>,
    Path((id, lang)): Path<(String, String)>,
    Json(update): Json<ProgressUpdate>,
) -> ApiResult<Option<LanguageProgress>> {
    let t = Timer::start();
    let lang = state.resolve_language(Some(&lang)).map_err(|e| t.err(e))?;
    let store = state.store.lock().await;
    ensure_user(&store, &id, &t)?;
    store
        .update_progress(&id, lang, &update, Utc::now())
        .map_err(|e| t.err(e))?;
    let progress = store.progress(&id, lang).map_err(|e| t.err(e))?;
    t.ok(progress)
}

pub async fn export_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let t = Timer::start();
    state
        .require(state.config.enable_export_data, "data export")
        .map_err(|e| t.err(e))?;
    let export = state.store.lock().await.export_user(&id).map_err(|e| t.err(e))?;
    match export {
        Some(data) => t.ok(data),
        None => Err(t.not_found(format!("user not found: {id}"))),
    }
}

pub async fn add_achievement(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AchievementRequest>,
) -> ApiResult<serde_json::Value> {
    let t = Timer::start();
    let achievement = Achievement {
        id: req.id,
        name: req.name,
        description: req.description,
        earned_at: None,
    };
    let added = state
        .store
        .lock()
        .await
        .add_achievement(&id, achievement, Utc::now())
        .map_err(|e| t.err(e))?;
    t.ok(serde_json::json!({ "added": added }))
}

pub async fn progress_overview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DaysQuery>,
) -> ApiResult<ProgressOverview> {
    let t = Timer::start();
    state
        .require(state.config.enable_progress_analytics, "progress analytics")
        .map_err(|e| t.err(e))?;
    let days = query.days.unwrap_or(DEFAULT_OVERVIEW_DAYS).max(1);
    let store = state.store.lock().await;
    ensure_user(&store, &id, &t)?;
    let sessions = store.practice_sessions(&id).map_err(|e| t.err(e))?;
    t.ok(progress::overview(&sessions, days, Utc::now()))
}

pub async fn weekly_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<WeeklyReport> {
    let t = Timer::start();
    state
        .require(state.config.enable_progress_analytics, "progress analytics")
        .map_err(|e| t.err(e))?;
    let store = state.store.lock().await;
    ensure_user(&store, &id, &t)?;
    let sessions = store.practice_sessions(&id).map_err(|e| t.err(e))?;
    t.ok(progress::weekly_report(&sessions, Utc::now()))
}

pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Vec<LeaderboardEntry>> {
    let t = Timer::start();
    let metric = match query.metric.as_deref() {
        None => LeaderboardMetric::SignsLearned,
        Some(m) => LeaderboardMetric::parse(m)
            .ok_or_else(|| t.fail(StatusCode::BAD_REQUEST, ApiError::bad_request(format!("unknown metric: {m}"))))?,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);
    let entries = state
        .store
        .lock()
        .await
        .leaderboard(metric, limit)
        .map_err(|e| t.err(e))?;
    t.ok(entries)
}

pub(crate) fn ensure_user(store: &signlab_store::Store, id: &str, t: &Timer) -> Result<(), ErrorReply> {
    match store.user(id).map_err(|e| t.err(e))? {
        Some(_) => Ok(()),
        None => Err(t.not_found(format!("user not found: {id}"))),
    }
}
