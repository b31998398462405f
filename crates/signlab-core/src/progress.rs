//! Practice sessions and progress analytics.
//!
//! Sessions collect attempts while live; finished sessions feed the
//! overview and weekly report. Nothing here touches storage: callers
//! hand in the session history and the current time.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Minimum share of matching predictions for a validation window to pass.
pub const VALIDATION_PASS_RATE: f64 = 0.6;

/// Sessions considered for the accuracy trend.
const TREND_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Practice,
    Lesson,
    Challenge,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Practice => "practice",
            SessionKind::Lesson => "lesson",
            SessionKind::Challenge => "challenge",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "practice" => Some(SessionKind::Practice),
            "lesson" => Some(SessionKind::Lesson),
            "challenge" => Some(SessionKind::Challenge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeSession {
    pub id: String,
    pub user_id: String,
    pub kind: SessionKind,
    pub language: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub signs_attempted: Vec<String>,
    pub signs_correct: Vec<String>,
    pub confidence_scores: Vec<f32>,
    pub total_attempts: u32,
    pub total_correct: u32,
    /// Fraction in [0, 1]; set when the session ends.
    pub accuracy: f64,
    pub duration_minutes: f64,
}

/// Stats for a session still in progress.
#[derive(Debug, Clone, Serialize)]
pub struct LiveStats {
    pub total_attempts: u32,
    pub total_correct: u32,
    /// Percent, one decimal place.
    pub current_accuracy: f64,
    pub duration_minutes: f64,
    pub unique_signs: usize,
    /// Percent, one decimal place.
    pub average_confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub kind: SessionKind,
    pub language: String,
    pub duration_minutes: f64,
    pub total_attempts: u32,
    pub total_correct: u32,
    pub session_accuracy: f64,
    pub unique_signs_attempted: usize,
    pub signs_learned: usize,
    pub average_confidence: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    round1((end - start).num_milliseconds() as f64 / 60_000.0)
}

fn mean_percent(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|&v| f64::from(v)).sum();
    round1(sum / values.len() as f64 * 100.0)
}

impl PracticeSession {
    pub fn start(user_id: &str, kind: SessionKind, language: &str, now: DateTime<Utc>) -> Self {
        let id = format!("{user_id}_{}", now.format("%Y%m%d_%H%M%S"));
        tracing::info!(session = %id, kind = kind.as_str(), "practice session started");
        Self {
            id,
            user_id: user_id.to_string(),
            kind,
            language: language.to_string(),
            start_time: now,
            end_time: None,
            signs_attempted: Vec::new(),
            signs_correct: Vec::new(),
            confidence_scores: Vec::new(),
            total_attempts: 0,
            total_correct: 0,
            accuracy: 0.0,
            duration_minutes: 0.0,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn record_attempt(&mut self, sign: &str, correct: bool, confidence: f32) {
        self.signs_attempted.push(sign.to_string());
        self.confidence_scores.push(confidence);
        self.total_attempts += 1;
        if correct {
            self.signs_correct.push(sign.to_string());
            self.total_correct += 1;
        }
        tracing::debug!(session = %self.id, sign, correct, "sign attempt recorded");
    }

    fn current_accuracy(&self) -> f64 {
        if self.total_attempts > 0 {
            f64::from(self.total_correct) / f64::from(self.total_attempts)
        } else {
            0.0
        }
    }

    pub fn live_stats(&self, now: DateTime<Utc>) -> LiveStats {
        let unique: HashSet<&str> = self.signs_attempted.iter().map(String::as_str).collect();
        LiveStats {
            total_attempts: self.total_attempts,
            total_correct: self.total_correct,
            current_accuracy: round1(self.current_accuracy() * 100.0),
            duration_minutes: minutes_between(self.start_time, now),
            unique_signs: unique.len(),
            average_confidence: mean_percent(&self.confidence_scores),
        }
    }

    /// Close the session. Ending twice keeps the first end time.
    pub fn end(&mut self, now: DateTime<Utc>) -> SessionSummary {
        if self.end_time.is_none() {
            self.end_time = Some(now);
            self.duration_minutes = minutes_between(self.start_time, now);
            self.accuracy = self.current_accuracy();
            tracing::info!(
                session = %self.id,
                attempts = self.total_attempts,
                accuracy = self.accuracy,
                "practice session ended"
            );
        }
        self.summary()
    }

    pub fn summary(&self) -> SessionSummary {
        let attempted: HashSet<&str> = self.signs_attempted.iter().map(String::as_str).collect();
        let learned: HashSet<&str> = self.signs_correct.iter().map(String::as_str).collect();
        SessionSummary {
            session_id: self.id.clone(),
            kind: self.kind,
            language: self.language.clone(),
            duration_minutes: self.duration_minutes,
            total_attempts: self.total_attempts,
            total_correct: self.total_correct,
            session_accuracy: round1(self.accuracy * 100.0),
            unique_signs_attempted: attempted.len(),
            signs_learned: learned.len(),
            average_confidence: mean_percent(&self.confidence_scores),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyTrend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeTrend {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakInfo {
    pub current_streak: u32,
    pub best_streak: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImprovementArea {
    pub area: &'static str,
    pub suggestion: &'static str,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressOverview {
    pub period_days: u32,
    pub total_sessions: usize,
    pub total_practice_minutes: f64,
    pub total_attempts: u32,
    pub total_correct: u32,
    pub average_accuracy: f64,
    pub average_session_duration: f64,
    pub unique_signs_attempted: usize,
    pub unique_signs_learned: usize,
    pub accuracy_trend: AccuracyTrend,
    pub practice_trend: PracticeTrend,
    pub streak_info: StreakInfo,
    pub improvement_areas: Vec<ImprovementArea>,
}

impl ProgressOverview {
    fn empty() -> Self {
        Self {
            period_days: 0,
            total_sessions: 0,
            total_practice_minutes: 0.0,
            total_attempts: 0,
            total_correct: 0,
            average_accuracy: 0.0,
            average_session_duration: 0.0,
            unique_signs_attempted: 0,
            unique_signs_learned: 0,
            accuracy_trend: AccuracyTrend::Stable,
            practice_trend: PracticeTrend::Stable,
            streak_info: StreakInfo::default(),
            improvement_areas: Vec::new(),
        }
    }
}

/// Current streak (consecutive days ending `today`) and longest run.
pub fn streaks(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> StreakInfo {
    let mut current = 0;
    let mut day = today;
    while dates.contains(&day) {
        current += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }

    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for &d in dates {
        run = match prev {
            Some(p) if p.succ_opt() == Some(d) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(d);
    }

    StreakInfo {
        current_streak: current,
        best_streak: best.max(current),
    }
}

/// Least-squares slope of `ys` against their indices.
fn slope(ys: &[f64]) -> f64 {
    let n = ys.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn accuracy_trend(sessions: &[&PracticeSession]) -> AccuracyTrend {
    if sessions.len() < 3 {
        return AccuracyTrend::Stable;
    }
    let start = sessions.len().saturating_sub(TREND_WINDOW);
    let accuracies: Vec<f64> = sessions[start..].iter().map(|s| s.accuracy).collect();
    let m = slope(&accuracies);
    if m > 0.05 {
        AccuracyTrend::Improving
    } else if m < -0.05 {
        AccuracyTrend::Declining
    } else {
        AccuracyTrend::Stable
    }
}

fn practice_trend(sessions: &[&PracticeSession], days: u32) -> PracticeTrend {
    if days < 7 {
        return PracticeTrend::Stable;
    }
    let mid = sessions.len() / 2;
    let (first, second) = sessions.split_at(mid);
    if first.is_empty() || second.is_empty() {
        return PracticeTrend::Stable;
    }
    // Both halves span the same number of days, so counts compare directly.
    let (a, b) = (first.len() as f64, second.len() as f64);
    if b > a * 1.2 {
        PracticeTrend::Increasing
    } else if b < a * 0.8 {
        PracticeTrend::Decreasing
    } else {
        PracticeTrend::Stable
    }
}

fn improvement_areas(
    accuracy: f64,
    avg_duration: f64,
    distinct_signs: usize,
) -> Vec<ImprovementArea> {
    let mut areas = Vec::new();
    if accuracy < 0.7 {
        areas.push(ImprovementArea {
            area: "accuracy",
            suggestion: "Focus on proper hand positioning and finger placement",
            priority: Priority::High,
        });
    }
    if avg_duration < 10.0 {
        areas.push(ImprovementArea {
            area: "practice_time",
            suggestion: "Try to practice for at least 15 minutes per session",
            priority: Priority::Medium,
        });
    }
    if distinct_signs < 10 {
        areas.push(ImprovementArea {
            area: "vocabulary",
            suggestion: "Practice a wider variety of signs to expand your vocabulary",
            priority: Priority::Medium,
        });
    }
    areas
}

/// Aggregate the sessions started within the last `days` days.
pub fn overview(sessions: &[PracticeSession], days: u32, now: DateTime<Utc>) -> ProgressOverview {
    let cutoff = now - Duration::days(i64::from(days));
    let mut recent: Vec<&PracticeSession> =
        sessions.iter().filter(|s| s.start_time >= cutoff).collect();
    if recent.is_empty() {
        return ProgressOverview::empty();
    }
    recent.sort_by_key(|s| s.start_time);

    let total_sessions = recent.len();
    let total_minutes: f64 = recent.iter().map(|s| s.duration_minutes).sum();
    let total_attempts: u32 = recent.iter().map(|s| s.total_attempts).sum();
    let total_correct: u32 = recent.iter().map(|s| s.total_correct).sum();
    let accuracy = if total_attempts > 0 {
        f64::from(total_correct) / f64::from(total_attempts)
    } else {
        0.0
    };
    let avg_duration = total_minutes / total_sessions as f64;

    let attempted: HashSet<&str> = recent
        .iter()
        .flat_map(|s| s.signs_attempted.iter().map(String::as_str))
        .collect();
    let learned: HashSet<&str> = recent
        .iter()
        .flat_map(|s| s.signs_correct.iter().map(String::as_str))
        .collect();
    let dates: BTreeSet<NaiveDate> = recent.iter().map(|s| s.start_time.date_naive()).collect();

    ProgressOverview {
        period_days: days,
        total_sessions,
        total_practice_minutes: round1(total_minutes),
        total_attempts,
        total_correct,
        average_accuracy: round1(accuracy * 100.0),
        average_session_duration: round1(avg_duration),
        unique_signs_attempted: attempted.len(),
        unique_signs_learned: learned.len(),
        accuracy_trend: accuracy_trend(&recent),
        practice_trend: practice_trend(&recent, days),
        streak_info: streaks(&dates, now.date_naive()),
        improvement_areas: improvement_areas(accuracy, avg_duration, attempted.len()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Achievement {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    #[serde(flatten)]
    pub overview: ProgressOverview,
    pub generated_at: DateTime<Utc>,
    pub achievements_this_week: Vec<Achievement>,
    pub recommended_focus: Vec<String>,
    pub next_week_goals: Vec<String>,
}

fn weekly_achievements(o: &ProgressOverview) -> Vec<Achievement> {
    let mut out = Vec::new();
    if o.total_sessions >= 5 {
        out.push(Achievement {
            name: "Consistent Learner",
            description: "Practiced 5 or more times this week",
        });
    }
    if o.average_accuracy >= 85.0 {
        out.push(Achievement {
            name: "Accuracy Master",
            description: "Maintained 85%+ accuracy this week",
        });
    }
    if o.total_practice_minutes >= 60.0 {
        out.push(Achievement {
            name: "Dedicated Practitioner",
            description: "Practiced for over 1 hour this week",
        });
    }
    out
}

fn weekly_recommendations(o: &ProgressOverview) -> Vec<String> {
    let mut out = Vec::new();
    if o.accuracy_trend == AccuracyTrend::Declining {
        out.push("Review basic signs and focus on proper hand positioning".to_string());
    }
    if o.total_sessions < 3 {
        out.push("Try to practice at least 3 times per week for better retention".to_string());
    }
    if o.average_session_duration < 10.0 {
        out.push("Increase session length to 15-20 minutes for better learning".to_string());
    }
    if out.is_empty() {
        out.push("Great progress! Continue with your current practice routine".to_string());
    }
    out
}

fn next_week_goals(o: &ProgressOverview) -> Vec<String> {
    let mut goals = Vec::new();
    if o.average_accuracy < 80.0 {
        let target = (o.average_accuracy + 10.0).min(85.0);
        goals.push(format!("Improve accuracy to {target}%"));
    } else {
        goals.push("Maintain accuracy above 80%".to_string());
    }
    if o.total_sessions < 5 {
        goals.push("Practice at least 5 times next week".to_string());
    } else {
        goals.push("Continue consistent daily practice".to_string());
    }
    let new_signs = (o.unique_signs_learned / 2).max(3);
    goals.push(format!("Learn {new_signs} new signs"));
    goals
}

pub fn weekly_report(sessions: &[PracticeSession], now: DateTime<Utc>) -> WeeklyReport {
    let overview = overview(sessions, 7, now);
    WeeklyReport {
        achievements_this_week: weekly_achievements(&overview),
        recommended_focus: weekly_recommendations(&overview),
        next_week_goals: next_week_goals(&overview),
        generated_at: now,
        overview,
    }
}

/// One frame's prediction collected during a validation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePrediction {
    pub sign: String,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowValidation {
    pub success: bool,
    pub target_sign: String,
    pub total_attempts: usize,
    pub correct_attempts: usize,
    pub accuracy_rate: f64,
    /// Mean confidence of the matching predictions only.
    pub average_confidence: f64,
    pub message: &'static str,
    pub attempts: Vec<FramePrediction>,
}

/// Judge a window of per-frame predictions against `target`.
pub fn validate_window(target: &str, predictions: Vec<FramePrediction>) -> WindowValidation {
    if predictions.is_empty() {
        return WindowValidation {
            success: false,
            target_sign: target.to_string(),
            total_attempts: 0,
            correct_attempts: 0,
            accuracy_rate: 0.0,
            average_confidence: 0.0,
            message: "No sign detected during validation period",
            attempts: predictions,
        };
    }

    let matching: Vec<f64> = predictions
        .iter()
        .filter(|p| p.sign.eq_ignore_ascii_case(target))
        .map(|p| f64::from(p.confidence))
        .collect();
    let total = predictions.len();
    let correct = matching.len();
    let average_confidence = if matching.is_empty() {
        0.0
    } else {
        matching.iter().sum::<f64>() / correct as f64
    };
    let success = correct as f64 >= total as f64 * VALIDATION_PASS_RATE;

    WindowValidation {
        success,
        target_sign: target.to_string(),
        total_attempts: total,
        correct_attempts: correct,
        accuracy_rate: correct as f64 / total as f64,
        average_confidence,
        message: if success {
            "Sign validated successfully!"
        } else {
            "Sign validation failed. Try again."
        },
        attempts: predictions,
    }
}
