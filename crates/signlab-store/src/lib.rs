//! signlab-store: SQLite persistence for the learning platform.
//!
//! Accounts with Argon2 password hashes, per-language progress, practice
//! sessions, quiz results, challenge history and recognition attempts.

pub mod models;
mod password;
mod schema;
pub mod store;

pub use models::{
    Achievement, DailyGoal, LanguageProgress, LeaderboardEntry, LeaderboardMetric, Profile, ProfileUpdate,
    ProgressUpdate, SignAttempt, User, UserStats,
};
pub use store::Store;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    EmailTaken(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("daily challenge already completed on {0}")]
    DailyChallengeDone(chrono::NaiveDate),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
