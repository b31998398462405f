//! Daily and on-demand challenges.

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::{Datelike, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use signlab_core::challenge::{self, ActionOutcome, ChallengeResult, MiniChallenge};
use signlab_core::{bank, ChallengeAction, ChallengeKind, ChallengeRun, ChallengeStats};
use std::sync::Arc;
use uuid::Uuid;

use super::handlers::{ActiveChallenge, AppState};
use super::types::*;
use super::users::ensure_user;

/// Puzzles offered next to the challenge of the day.
const DAILY_PUZZLES: usize = 3;

pub async fn today(State(state): State<Arc<AppState>>, Query(query): Query<UserQuery>) -> ApiResult<TodayData> {
    let t = Timer::start();
    let date = Utc::now().date_naive();
    let challenge = challenge::daily(date, bank());
    let mut rng = StdRng::seed_from_u64(date.num_days_from_ce() as u64);
    let puzzles = bank().daily_puzzles(DAILY_PUZZLES, &mut rng);

    let completed = match &query.user_id {
        Some(user_id) => {
            let store = state.store.lock().await;
            ensure_user(&store, user_id, &t)?;
            Some(store.challenge_completed_on(user_id, date).map_err(|e| t.err(e))?)
        }
        None => None,
    };

    t.ok(TodayData {
        info: challenge.kind.info(),
        challenge,
        puzzles,
        completed,
    })
}

pub async fn list_mini() -> ApiResult<&'static [MiniChallenge]> {
    let t = Timer::start();
    t.ok(challenge::mini_challenges())
}

/// Start the daily challenge, a challenge of a given type, or a named mini
/// challenge. The daily one can be completed once per day per learner.
pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChallengeStartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ChallengeRun>>), ErrorReply> {
    let t = Timer::start();
    let now = Utc::now();
    let mut rng = StdRng::from_entropy();

    let challenge = match (&req.challenge_type, &req.mini_name) {
        (Some(kind), _) => {
            let kind = ChallengeKind::parse(kind).map_err(|e| t.err(e))?;
            challenge::of_kind(kind, bank(), &mut rng)
        }
        (None, Some(name)) => challenge::mini(name, bank(), &mut rng).map_err(|e| t.err(e))?,
        (None, None) => challenge::daily(now.date_naive(), bank()),
    };

    if let Some(user_id) = &req.user_id {
        let store = state.store.lock().await;
        ensure_user(&store, user_id, &t)?;
        if let Some(date) = challenge.date {
            if store.challenge_completed_on(user_id, date).map_err(|e| t.err(e))? {
                return Err(t.fail(
                    StatusCode::CONFLICT,
                    ApiError::conflict("today's challenge is already completed"),
                ));
            }
        }
    }

    let run = ChallengeRun::start(challenge, &mut rng, now);
    tracing::info!(run = %run.id, kind = run.challenge.kind.as_str(), daily = run.challenge.is_daily(), "challenge started");
    state.challenges.lock().await.insert(
        run.id,
        ActiveChallenge {
            run: run.clone(),
            user_id: req.user_id,
        },
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(run, t.ms()))))
}

pub async fn act(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(action): Json<ChallengeAction>,
) -> ApiResult<ActionOutcome> {
    let t = Timer::start();
    let mut active = state.challenges.lock().await;
    let entry = active
        .get_mut(&id)
        .ok_or_else(|| t.not_found(format!("challenge run not found: {id}")))?;
    let outcome = entry.run.act(action, Utc::now()).map_err(|e| t.err(e))?;
    t.ok(outcome)
}

/// Finish a run, scoring it and recording it for the learner. Two daily
/// runs started the same day cannot both be recorded: the store refuses the
/// second with a conflict.
pub async fn complete(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<ChallengeResult> {
    let t = Timer::start();
    let mut entry = state
        .challenges
        .lock()
        .await
        .remove(&id)
        .ok_or_else(|| t.not_found(format!("challenge run not found: {id}")))?;
    let result = entry.run.complete(Utc::now());
    if let Some(user_id) = &entry.user_id {
        state
            .store
            .lock()
            .await
            .record_challenge(user_id, &result)
            .map_err(|e| {
                tracing::warn!(run = %id, user = %user_id, error = %e, "challenge result not recorded");
                t.err(e)
            })?;
    }
    tracing::info!(run = %id, score = result.final_score, "challenge completed");
    t.ok(result)
}

/// Challenge history folded into streaks and best scores.
pub async fn stats(State(state): State<Arc<AppState>>, Path(user_id): Path<String>) -> ApiResult<ChallengeStats> {
    let t = Timer::start();
    let store = state.store.lock().await;
    ensure_user(&store, &user_id, &t)?;
    let mut results = store.challenge_results(&user_id).map_err(|e| t.err(e))?;
    results.sort_by_key(|r| r.completed_at);

    let mut stats = ChallengeStats::default();
    for result in &results {
        stats.record(result, result.completed_at.date_naive());
    }
    t.ok(stats)
}
