//! Row and report types returned by the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use signlab_core::language::DEFAULT_LANGUAGE;
use signlab_core::scoring::{QuizDifficulty, SkillLevel};

/// Default minutes of practice per day for new accounts.
pub const DEFAULT_DAILY_GOAL_MINUTES: u32 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub earned_at: Option<DateTime<Utc>>,
}

/// Learner preferences, stored as JSON in `users.profile_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub skill_level: SkillLevel,
    pub preferred_language: String,
    pub daily_goal_minutes: u32,
    pub difficulty: QuizDifficulty,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            skill_level: SkillLevel::Beginner,
            preferred_language: DEFAULT_LANGUAGE.to_string(),
            daily_goal_minutes: DEFAULT_DAILY_GOAL_MINUTES,
            difficulty: QuizDifficulty::Easy,
            achievements: Vec::new(),
        }
    }
}

/// Partial profile change; `None` fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub skill_level: Option<SkillLevel>,
    pub preferred_language: Option<String>,
    pub daily_goal_minutes: Option<u32>,
    pub difficulty: Option<QuizDifficulty>,
}

/// A user account. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub profile: Profile,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub activity_type: String,
    pub activity_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Per-language progress row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageProgress {
    pub language: String,
    pub signs_learned: u32,
    /// Fraction in [0, 1].
    pub accuracy_score: f64,
    /// Minutes.
    pub practice_time: u32,
    pub level: SkillLevel,
    pub last_updated: DateTime<Utc>,
}

/// Additive progress change: signs and time accumulate, accuracy and
/// level replace the stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressUpdate {
    pub signs_learned: Option<u32>,
    pub accuracy_score: Option<f64>,
    pub practice_time: Option<u32>,
    pub level: Option<SkillLevel>,
}

/// A single recognition attempt against a target sign.
#[derive(Debug, Clone)]
pub struct SignAttempt {
    pub user_id: String,
    pub session_id: String,
    pub language: String,
    pub target_sign: String,
    pub predicted_sign: String,
    pub confidence: f32,
    pub is_correct: bool,
    pub feedback: Option<String>,
    pub attempt_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageStats {
    pub total_attempts: u32,
    /// Percent, one decimal place.
    pub average_confidence: f64,
    /// Percent, one decimal place.
    pub accuracy_rate: f64,
    pub correct_attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizResultRow {
    pub quiz_id: String,
    pub language: String,
    pub score: u32,
    pub total_questions: u32,
    pub time_taken_secs: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub total_signs_learned: u32,
    /// Percent, one decimal place.
    pub average_accuracy: f64,
    /// Minutes.
    pub total_practice_time: u32,
    pub quizzes_completed: u32,
    /// Percent, one decimal place.
    pub average_quiz_score: f64,
    pub practice_sessions: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    /// Most recent practice days, newest first, at most seven.
    pub practice_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardMetric {
    SignsLearned,
    Accuracy,
    PracticeTime,
}

impl LeaderboardMetric {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "signs" | "signs_learned" => Some(Self::SignsLearned),
            "accuracy" | "accuracy_average" => Some(Self::Accuracy),
            "time" | "practice_time" | "total_practice_time" => Some(Self::PracticeTime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub name: String,
    /// Signs, accuracy percent or practice hours depending on the metric.
    pub value: f64,
    pub level: SkillLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyGoal {
    pub met_goal: bool,
    /// Percent of the goal, capped at 100, one decimal place.
    pub progress: f64,
    pub today_minutes: f64,
    pub goal_minutes: u32,
}

pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
