//! API Route Configuration

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{self, AppState};
use super::{challenges, quiz, users};

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health & Status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::status))
        // Catalog
        .route("/languages", get(handlers::list_languages))
        .route("/languages/:code/modules", get(handlers::language_modules))
        .route("/languages/:code/search", get(handlers::search_signs))
        // Users
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/logout", post(users::logout))
        .route("/users/:id", get(users::get_user).delete(users::delete_user))
        .route("/users/:id/profile", put(users::update_profile))
        .route("/users/:id/stats", get(users::user_stats))
        .route("/users/:id/progress", get(users::user_progress))
        .route("/users/:id/progress/:lang", put(users::update_progress))
        .route("/users/:id/export", get(users::export_user))
        .route("/users/:id/achievements", post(users::add_achievement))
        .route("/users/:id/overview", get(users::progress_overview))
        .route("/users/:id/weekly-report", get(users::weekly_report))
        .route("/users/:id/challenges/stats", get(challenges::stats))
        .route("/leaderboard", get(users::leaderboard))
        // Recognition
        .route("/predict", post(handlers::predict))
        .route("/recognize", post(handlers::recognize))
        .route("/validate", post(handlers::validate_sign))
        .route("/snapshot", get(handlers::snapshot))
        .route("/feedback", post(handlers::feedback))
        // Quizzes
        .route("/quiz/start", post(quiz::start_quiz))
        .route("/quiz/:id", get(quiz::get_quiz))
        .route("/quiz/:id/attempt", post(quiz::submit_attempt))
        .route("/quiz/:id/skip", post(quiz::skip_sign))
        .route("/quiz/:id/pause", post(quiz::pause_quiz))
        .route("/quiz/:id/resume", post(quiz::resume_quiz))
        .route("/quiz/:id/end", post(quiz::end_quiz))
        // Practice sessions
        .route("/practice/start", post(quiz::start_practice))
        .route("/practice/:id/attempt", post(quiz::practice_attempt))
        .route("/practice/:id/end", post(quiz::end_practice))
        // Challenges
        .route("/challenges/today", get(challenges::today))
        .route("/challenges/mini", get(challenges::list_mini))
        .route("/challenges/start", post(challenges::start))
        .route("/challenges/:id/action", post(challenges::act))
        .route("/challenges/:id/complete", post(challenges::complete));

    Router::new()
        .nest("/api/v1", api_v1)
        // Also expose at root for load balancer health checks
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
