//! SignLab HTTP API
//! JSON endpoints for the learning platform and the recognition engine.

pub mod challenges;
pub mod handlers;
pub mod quiz;
pub mod routes;
pub mod types;
pub mod users;

pub use handlers::AppState;
pub use routes::create_router;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::{self, tests::{demo_engine, sample_hand}};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use chrono::{Duration, Utc};
    use super::handlers::{ActiveChallenge, ActiveQuiz};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::{json, Value};
    use signlab_core::{bank, challenge, ChallengeKind, ChallengeRun, PracticeSession, QuizKind, QuizSession, SessionKind};
    use signlab_store::Store;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state_with(config: Config) -> Arc<AppState> {
        let store = Store::open_in_memory().unwrap();
        Arc::new(AppState::new(config, store, engine::spawn(demo_engine())))
    }

    fn app_with(config: Config) -> Router {
        create_router(state_with(config))
    }

    fn app() -> Router {
        app_with(Config::default())
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register(app: &Router, email: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/v1/users/register",
            Some(json!({"email": email, "password": "secret1", "name": "Learner"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["user_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        for uri in ["/health", "/api/v1/health"] {
            let (status, body) = call(&app, "GET", uri, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["data"]["status"], "healthy");
        }
    }

    #[tokio::test]
    async fn test_status_reports_engine() {
        let (status, body) = call(&app(), "GET", "/api/v1/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["engine"]["classifier"], "demo");
        assert_eq!(body["data"]["engine"]["camera_available"], false);
        assert_eq!(body["data"]["features"]["export_data"], true);
    }

    #[tokio::test]
    async fn test_catalog() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/v1/languages", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].as_array().unwrap().len() >= 10);

        let (status, body) = call(&app, "GET", "/api/v1/languages/asl/modules", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);

        let (status, body) = call(&app, "GET", "/api/v1/languages/ASL/search?q=hello", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body["data"].as_array().unwrap().is_empty());

        let (status, body) = call(&app, "GET", "/api/v1/languages/fsl/modules", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);

        let (status, _) = call(&app, "GET", "/api/v1/languages/XYZ/modules", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_multi_language_flag() {
        let app = app_with(Config::from_lookup(|k| {
            (k == "ENABLE_MULTI_LANGUAGE").then(|| "false".to_string())
        }));
        let (status, body) = call(&app, "GET", "/api/v1/languages/BSL/modules", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FEATURE_DISABLED");
        let (_, body) = call(&app, "GET", "/api/v1/languages", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_login_logout() {
        let app = app();
        let user_id = register(&app, "Ana@Example.com").await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/users/register",
            Some(json!({"email": "ana@example.com", "password": "secret1", "name": "Ana"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/users/login",
            Some(json!({"email": "ana@example.com", "password": "wrong!!"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/users/login",
            Some(json!({"email": "ana@example.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["id"], user_id.as_str());
        let session_id = body["data"]["session_id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, "POST", "/api/v1/users/logout", Some(json!({"session_id": session_id}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "POST", "/api/v1/users/logout", Some(json!({"session_id": session_id}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_profile_export_and_delete() {
        let app = app();
        let user_id = register(&app, "ben@example.com").await;

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/v1/users/{user_id}/profile"),
            Some(json!({"preferred_language": "bsl", "daily_goal_minutes": 20})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["profile"]["preferred_language"], "BSL");
        assert_eq!(body["data"]["profile"]["daily_goal_minutes"], 20);

        let (status, body) = call(&app, "GET", &format!("/api/v1/users/{user_id}/export"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].to_string().find("password").is_none());

        let (status, _) = call(&app, "DELETE", &format!("/api/v1/users/{user_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GET", &format!("/api/v1/users/{user_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_export_flag() {
        let app = app_with(Config::from_lookup(|k| {
            (k == "ENABLE_EXPORT_DATA").then(|| "0".to_string())
        }));
        let user_id = register(&app, "cy@example.com").await;
        let (status, _) = call(&app, "GET", &format!("/api/v1/users/{user_id}/export"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_predict_from_landmarks() {
        let app = app();
        let hand = serde_json::to_value(sample_hand()).unwrap();
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/predict",
            Some(json!({"hands": [hand], "target_sign": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["recognition"]["prediction"]["label"].is_string());
        assert_eq!(body["data"]["check"]["target"], "hello");
        assert!(body["data"]["feedback"]["message"].is_string());

        let (status, body) = call(&app, "POST", "/api/v1/predict", Some(json!({"hands": []}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "UNPROCESSABLE");
    }

    #[tokio::test]
    async fn test_camera_endpoints_unavailable() {
        let app = app();
        let (status, _) = call(&app, "POST", "/api/v1/recognize", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = call(&app, "GET", "/api/v1/snapshot", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/validate",
            Some(json!({"target_sign": "hello", "duration_secs": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_feedback() {
        let app = app();
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/feedback",
            Some(json!({"confidence": 0.95, "target_sign": "Hello", "predicted_sign": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["check"]["correct"], true);
        let (status, _) = call(&app, "POST", "/api/v1/feedback", Some(json!({"confidence": 1.5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_quiz_lifecycle() {
        let app = app();
        let user_id = register(&app, "dee@example.com").await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/quiz/start",
            Some(json!({"quiz_type": "practice", "user_id": user_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_signs"], 10);
        let quiz_id = body["data"]["quiz_id"].as_str().unwrap().to_string();
        let sign = body["data"]["current_sign"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/v1/quiz/{quiz_id}/attempt"),
            Some(json!({"predicted_sign": sign, "confidence": 0.95})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["correct"], true);

        let (status, _) = call(&app, "POST", &format!("/api/v1/quiz/{quiz_id}/pause"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "POST", &format!("/api/v1/quiz/{quiz_id}/pause"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = call(&app, "POST", &format!("/api/v1/quiz/{quiz_id}/resume"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "POST", &format!("/api/v1/quiz/{quiz_id}/end"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["correct_signs"], 1);

        let (status, _) = call(&app, "GET", &format!("/api/v1/quiz/{quiz_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(&app, "GET", &format!("/api/v1/users/{user_id}/stats"), None).await;
        assert_eq!(body["data"]["stats"]["quizzes_completed"], 1);
    }

    fn quiz_started_at(start: chrono::DateTime<Utc>) -> QuizSession {
        QuizSession::start_from_bank(QuizKind::Practice, "ASL", bank(), &mut StdRng::seed_from_u64(5), start)
    }

    #[tokio::test]
    async fn test_expired_quiz_is_stored_and_dropped() {
        let state = state_with(Config::default());
        let app = create_router(state.clone());
        let user_id = register(&app, "ida@example.com").await;
        let session = quiz_started_at(Utc::now() - Duration::minutes(10));
        let quiz_id = session.id;
        state.quizzes.lock().await.insert(
            quiz_id,
            ActiveQuiz { session, user_id: Some(user_id.clone()) },
        );

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/v1/quiz/{quiz_id}/attempt"),
            Some(json!({"predicted_sign": "hello", "confidence": 0.95})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["message"], "quiz time expired");

        let (status, _) = call(&app, "GET", &format!("/api/v1/quiz/{quiz_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, body) = call(&app, "GET", &format!("/api/v1/users/{user_id}/stats"), None).await;
        assert_eq!(body["data"]["stats"]["quizzes_completed"], 1);
    }

    #[tokio::test]
    async fn test_stale_sessions_evicted() {
        let state = state_with(Config::default());
        let app = create_router(state.clone());
        let user_id = register(&app, "jon@example.com").await;
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(9);

        let stale = quiz_started_at(now - Duration::minutes(10));
        let fresh = quiz_started_at(now);
        let fresh_id = fresh.id;
        {
            let mut quizzes = state.quizzes.lock().await;
            quizzes.insert(stale.id, ActiveQuiz { session: stale, user_id: Some(user_id.clone()) });
            quizzes.insert(fresh_id, ActiveQuiz { session: fresh, user_id: Some(user_id.clone()) });
        }
        let mut practice = PracticeSession::start(&user_id, SessionKind::Practice, "ASL", now - Duration::hours(5));
        practice.record_attempt("hello", true, 0.9);
        state.practice.lock().await.insert(practice.id.clone(), practice);
        let run = ChallengeRun::start(
            challenge::of_kind(ChallengeKind::RapidFire, bank(), &mut rng),
            &mut rng,
            now - Duration::hours(1),
        );
        state
            .challenges
            .lock()
            .await
            .insert(run.id, ActiveChallenge { run, user_id: Some(user_id.clone()) });

        assert_eq!(state.evict_stale(now).await, 3);
        assert_eq!(state.evict_stale(now).await, 0);
        let quizzes = state.quizzes.lock().await;
        assert_eq!(quizzes.len(), 1);
        assert!(quizzes.contains_key(&fresh_id));
        drop(quizzes);
        assert!(state.practice.lock().await.is_empty());
        assert!(state.challenges.lock().await.is_empty());

        let (_, body) = call(&app, "GET", &format!("/api/v1/users/{user_id}/stats"), None).await;
        assert_eq!(body["data"]["stats"]["quizzes_completed"], 1);
        assert_eq!(body["data"]["stats"]["practice_sessions"], 1);
        let (_, body) = call(&app, "GET", &format!("/api/v1/users/{user_id}/challenges/stats"), None).await;
        assert_eq!(body["data"]["total_completed"], 1);
    }

    #[tokio::test]
    async fn test_quiz_uses_configured_threshold() {
        let strict = Config::from_lookup(|k| (k == "CONFIDENCE_THRESHOLD").then(|| "0.9".to_string()));
        let app = app_with(strict);
        let (_, body) = call(&app, "POST", "/api/v1/quiz/start", Some(json!({"quiz_type": "practice"}))).await;
        let quiz_id = body["data"]["quiz_id"].as_str().unwrap().to_string();
        let sign = body["data"]["current_sign"].as_str().unwrap().to_string();

        let attempt = |confidence: f64| json!({"predicted_sign": sign, "confidence": confidence});
        let uri = format!("/api/v1/quiz/{quiz_id}/attempt");
        let (status, body) = call(&app, "POST", &uri, Some(attempt(0.8))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["correct"], false);
        let (_, body) = call(&app, "POST", &uri, Some(attempt(0.95))).await;
        assert_eq!(body["data"]["correct"], true);
    }

    #[tokio::test]
    async fn test_quiz_rejects_unknown_type() {
        let (status, _) = call(&app(), "POST", "/api/v1/quiz/start", Some(json!({"quiz_type": "module_9"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_practice_session_updates_progress() {
        let app = app();
        let user_id = register(&app, "eve@example.com").await;
        let (status, body) = call(&app, "POST", "/api/v1/practice/start", Some(json!({"user_id": user_id}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let session_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/v1/practice/{session_id}/attempt"),
            Some(json!({"sign": "Hello", "correct": true, "confidence": 0.9})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_attempts"], 1);

        let (status, body) = call(&app, "POST", &format!("/api/v1/practice/{session_id}/end"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["signs_learned"], 1);

        let (_, body) = call(&app, "GET", &format!("/api/v1/users/{user_id}/progress"), None).await;
        let asl = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["language"] == "ASL")
            .unwrap()
            .clone();
        assert_eq!(asl["signs_learned"], 1);

        let (status, body) = call(&app, "GET", &format!("/api/v1/users/{user_id}/overview?days=7"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_sessions"], 1);
    }

    #[tokio::test]
    async fn test_challenge_run() {
        let app = app();
        let user_id = register(&app, "fay@example.com").await;

        let (status, body) = call(&app, "GET", "/api/v1/challenges/today", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["challenge"]["date"].is_string());

        let (status, body) = call(&app, "GET", "/api/v1/challenges/mini", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 4);

        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/challenges/start",
            Some(json!({"challenge_type": "rapid_fire", "user_id": user_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let run_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/v1/challenges/{run_id}/action"),
            Some(json!({"action": "done"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["points"], 5);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/v1/challenges/{run_id}/action"),
            Some(json!({"action": "skip"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, "POST", &format!("/api/v1/challenges/{run_id}/complete"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["final_score"], 5);

        let (_, body) = call(&app, "GET", &format!("/api/v1/users/{user_id}/challenges/stats"), None).await;
        assert_eq!(body["data"]["total_completed"], 1);
        assert_eq!(body["data"]["best_scores"]["rapid_fire"], 5);
    }

    #[tokio::test]
    async fn test_daily_challenge_completes_once_per_day() {
        let app = app();
        let user_id = register(&app, "hal@example.com").await;
        let mut runs = Vec::new();
        for _ in 0..2 {
            let (status, body) =
                call(&app, "POST", "/api/v1/challenges/start", Some(json!({"user_id": user_id}))).await;
            assert_eq!(status, StatusCode::CREATED);
            assert!(body["data"]["challenge"]["date"].is_string());
            runs.push(body["data"]["id"].as_str().unwrap().to_string());
        }

        let (status, body) = call(&app, "POST", &format!("/api/v1/challenges/{}/complete", runs[0]), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["daily"], true);
        let (status, body) = call(&app, "POST", &format!("/api/v1/challenges/{}/complete", runs[1]), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (_, body) = call(&app, "GET", &format!("/api/v1/users/{user_id}/challenges/stats"), None).await;
        assert_eq!(body["data"]["total_completed"], 1);
        let (status, _) = call(&app, "POST", "/api/v1/challenges/start", Some(json!({"user_id": user_id}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_leaderboard() {
        let app = app();
        register(&app, "gus@example.com").await;
        let (status, body) = call(&app, "GET", "/api/v1/leaderboard?metric=accuracy&limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].is_array());
        let (status, _) = call(&app, "GET", "/api/v1/leaderboard?metric=karma", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
