//! Timed sign quizzes.
//!
//! A [`QuizSession`] walks a fixed list of signs. Each attempt is checked
//! against the current sign; a correct attempt advances, a wrong one is
//! recorded and the learner tries again. Skips count as wrong and advance.
//! Time is always passed in by the caller.

use crate::bank::{Question, QuizBank};
use crate::scoring::{self, FinalFeedback, QuizDifficulty};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default minimum confidence for an attempt to count as correct.
pub const MIN_CONFIDENCE: f32 = 0.7;

/// Recorded as the prediction of a skipped sign.
pub const SKIPPED: &str = "SKIPPED";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("no active quiz")]
    NotActive,
    #[error("no current sign")]
    NoCurrentSign,
    #[error("quiz time expired")]
    Expired,
    #[error("quiz is not paused")]
    NotPaused,
    #[error("invalid quiz type: {0}")]
    UnknownKind(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuizKind {
    #[serde(rename = "practice")]
    Practice,
    #[serde(rename = "module_1")]
    Module1,
    #[serde(rename = "module_2")]
    Module2,
    #[serde(rename = "module_3")]
    Module3,
}

/// Fixed parameters of a quiz kind.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QuizConfig {
    pub duration_secs: u64,
    pub signs_count: usize,
    pub difficulty: QuizDifficulty,
    pub passing_score: f64,
}

impl QuizKind {
    pub fn parse(s: &str) -> Result<Self, QuizError> {
        match s {
            "practice" => Ok(QuizKind::Practice),
            "module_1" => Ok(QuizKind::Module1),
            "module_2" => Ok(QuizKind::Module2),
            "module_3" => Ok(QuizKind::Module3),
            other => Err(QuizError::UnknownKind(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuizKind::Practice => "practice",
            QuizKind::Module1 => "module_1",
            QuizKind::Module2 => "module_2",
            QuizKind::Module3 => "module_3",
        }
    }

    pub fn config(self) -> QuizConfig {
        let (duration_secs, signs_count, difficulty, passing_score) = match self {
            QuizKind::Practice => (180, 10, QuizDifficulty::Easy, 70.0),
            QuizKind::Module1 => (600, 15, QuizDifficulty::Easy, 80.0),
            QuizKind::Module2 => (600, 15, QuizDifficulty::Medium, 85.0),
            QuizKind::Module3 => (600, 15, QuizDifficulty::Hard, 90.0),
        };
        QuizConfig {
            duration_secs,
            signs_count,
            difficulty,
            passing_score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizState {
    Active,
    Paused,
    Completed,
}

/// One recorded attempt at the current sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub sign: String,
    pub predicted: String,
    pub confidence: f32,
    pub correct: bool,
    pub skipped: bool,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the quiz started.
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptFeedbackKind {
    Excellent,
    Good,
    LowConfidence,
    WrongSign,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptFeedback {
    pub kind: AttemptFeedbackKind,
    pub message: String,
}

fn attempt_feedback(attempt: &Attempt) -> AttemptFeedback {
    let (kind, message) = if attempt.correct {
        if attempt.confidence >= 0.9 {
            (
                AttemptFeedbackKind::Excellent,
                "Excellent! Perfect sign recognition!".to_string(),
            )
        } else {
            (
                AttemptFeedbackKind::Good,
                "Good job! Sign recognized correctly.".to_string(),
            )
        }
    } else if attempt.confidence < 0.3 {
        (
            AttemptFeedbackKind::LowConfidence,
            "Sign not clearly detected. Please adjust your position and try again.".to_string(),
        )
    } else {
        (
            AttemptFeedbackKind::WrongSign,
            format!(
                "Incorrect. Expected '{}', got '{}'.",
                attempt.sign, attempt.predicted
            ),
        )
    };
    AttemptFeedback { kind, message }
}

/// Snapshot of how far through the quiz the learner is.
#[derive(Debug, Clone, Serialize)]
pub struct QuizProgress {
    pub current_index: usize,
    pub total_signs: usize,
    pub percentage: f64,
    pub score: u32,
    /// Percent correct over signs passed so far.
    pub accuracy: f64,
    /// Whole seconds, never negative.
    pub time_remaining: u64,
    pub time_remaining_formatted: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizResults {
    pub quiz_id: Uuid,
    pub quiz_kind: QuizKind,
    pub language: String,
    pub total_signs: usize,
    pub correct_signs: u32,
    pub total_attempts: usize,
    /// Percent, one decimal place.
    pub accuracy: f64,
    pub passing_score: f64,
    pub passed: bool,
    pub xp_earned: u32,
    pub duration_secs: u64,
    pub time_taken_secs: f64,
    pub attempts: Vec<Attempt>,
    pub grade: &'static str,
    pub feedback: FinalFeedback,
    pub completed_at: DateTime<Utc>,
}

/// Result of [`QuizSession::submit`].
#[derive(Debug, Clone, Serialize)]
pub struct AttemptOutcome {
    pub correct: bool,
    pub confidence: f32,
    pub current_sign: String,
    pub predicted_sign: String,
    pub feedback: AttemptFeedback,
    pub progress: QuizProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_sign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<QuizResults>,
}

/// Result of [`QuizSession::skip`].
#[derive(Debug, Clone, Serialize)]
pub struct SkipOutcome {
    pub skipped_sign: String,
    pub progress: QuizProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_sign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<QuizResults>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizSession {
    pub id: Uuid,
    pub kind: QuizKind,
    pub language: String,
    pub questions: Vec<Question>,
    index: usize,
    score: u32,
    attempts: Vec<Attempt>,
    state: QuizState,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    paused_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    confidence_threshold: f32,
}

impl QuizSession {
    pub fn start(
        kind: QuizKind,
        language: &str,
        questions: Vec<Question>,
        now: DateTime<Utc>,
    ) -> Self {
        let config = kind.config();
        tracing::info!(
            kind = kind.as_str(),
            language,
            signs = questions.len(),
            "quiz started"
        );
        Self {
            id: Uuid::new_v4(),
            kind,
            language: language.to_string(),
            questions,
            index: 0,
            score: 0,
            attempts: Vec::new(),
            state: QuizState::Active,
            start_time: now,
            end_time: now + Duration::seconds(config.duration_secs as i64),
            paused_at: None,
            completed_at: None,
            confidence_threshold: MIN_CONFIDENCE,
        }
    }

    /// Override the confidence an attempt needs to count as correct.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Start a quiz with questions drawn from `bank`. Practice quizzes use
    /// the practice pool, module quizzes the language's module.
    pub fn start_from_bank<R: Rng + ?Sized>(
        kind: QuizKind,
        language: &str,
        bank: &QuizBank,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Self {
        let count = kind.config().signs_count;
        let questions = match kind {
            QuizKind::Practice => bank.practice_questions(count, rng),
            _ => bank.quiz_questions(language, kind.as_str(), count, rng),
        };
        Self::start(kind, language, questions, now)
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn current_sign(&self) -> Option<&str> {
        self.questions.get(self.index).map(|q| q.sign.as_str())
    }

    fn current_or_err(&self) -> Result<String, QuizError> {
        if self.state != QuizState::Active {
            return Err(QuizError::NotActive);
        }
        self.current_sign()
            .map(str::to_string)
            .ok_or(QuizError::NoCurrentSign)
    }

    fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    pub fn submit(
        &mut self,
        predicted: &str,
        confidence: f32,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome, QuizError> {
        let sign = self.current_or_err()?;

        if now > self.end_time {
            tracing::info!(quiz = %self.id, "quiz expired");
            self.complete(now);
            return Err(QuizError::Expired);
        }

        let correct = predicted.eq_ignore_ascii_case(&sign) && confidence >= self.confidence_threshold;
        let attempt = Attempt {
            sign: sign.clone(),
            predicted: predicted.to_string(),
            confidence,
            correct,
            skipped: false,
            timestamp: now,
            elapsed_secs: self.elapsed_secs(now),
        };
        let feedback = attempt_feedback(&attempt);
        self.attempts.push(attempt);
        tracing::debug!(quiz = %self.id, sign = %sign, predicted, confidence, correct, "quiz attempt");

        let mut next_sign = None;
        let mut results = None;
        if correct {
            self.score += 1;
            self.index += 1;
            if self.index >= self.questions.len() {
                results = Some(self.complete(now));
            } else {
                next_sign = self.current_sign().map(str::to_string);
            }
        }

        Ok(AttemptOutcome {
            correct,
            confidence,
            current_sign: sign,
            predicted_sign: predicted.to_string(),
            feedback,
            progress: self.progress(now),
            next_sign,
            results,
        })
    }

    pub fn skip(&mut self, now: DateTime<Utc>) -> Result<SkipOutcome, QuizError> {
        let sign = self.current_or_err()?;
        self.attempts.push(Attempt {
            sign: sign.clone(),
            predicted: SKIPPED.to_string(),
            confidence: 0.0,
            correct: false,
            skipped: true,
            timestamp: now,
            elapsed_secs: self.elapsed_secs(now),
        });
        self.index += 1;

        let mut next_sign = None;
        let mut results = None;
        if self.index >= self.questions.len() {
            results = Some(self.complete(now));
        } else {
            next_sign = self.current_sign().map(str::to_string);
        }

        Ok(SkipOutcome {
            skipped_sign: sign,
            progress: self.progress(now),
            next_sign,
            results,
        })
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), QuizError> {
        if self.state != QuizState::Active {
            return Err(QuizError::NotActive);
        }
        self.state = QuizState::Paused;
        self.paused_at = Some(now);
        Ok(())
    }

    /// Resume a paused quiz; the deadline moves out by the time spent paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), QuizError> {
        if self.state != QuizState::Paused {
            return Err(QuizError::NotPaused);
        }
        let paused_at = self.paused_at.take().unwrap_or(now);
        if now > paused_at {
            self.end_time += now - paused_at;
        }
        self.state = QuizState::Active;
        Ok(())
    }

    /// Finish the quiz. Ending an already completed quiz returns the same
    /// results.
    pub fn end(&mut self, now: DateTime<Utc>) -> QuizResults {
        match self.completed_at {
            Some(at) => self.results(at),
            None => self.complete(now),
        }
    }

    /// True once nobody can drive the quiz any more: active past its
    /// deadline, paused for longer than `max_pause`, or already completed.
    pub fn is_abandoned(&self, now: DateTime<Utc>, max_pause: Duration) -> bool {
        match self.state {
            QuizState::Active => now > self.end_time,
            QuizState::Paused => self.paused_at.is_some_and(|at| now - at > max_pause),
            QuizState::Completed => true,
        }
    }

    /// Close an abandoned quiz. Results are stamped at the deadline, or at
    /// the pause for a quiz left paused.
    pub fn abandon(&mut self, now: DateTime<Utc>) -> QuizResults {
        let at = self.paused_at.unwrap_or(self.end_time).min(now);
        self.end(at)
    }

    fn complete(&mut self, now: DateTime<Utc>) -> QuizResults {
        self.state = QuizState::Completed;
        self.paused_at = None;
        self.completed_at = Some(now);
        let results = self.results(now);
        tracing::info!(
            quiz = %self.id,
            accuracy = results.accuracy,
            passed = results.passed,
            xp = results.xp_earned,
            "quiz completed"
        );
        results
    }

    pub fn progress(&self, now: DateTime<Utc>) -> QuizProgress {
        let total = self.questions.len();
        let reference = self.completed_at.or(self.paused_at).unwrap_or(now);
        let remaining = (self.end_time - reference).num_seconds().max(0) as u64;
        let percentage = if total > 0 {
            self.index as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let accuracy = if self.index > 0 {
            f64::from(self.score) / self.index as f64 * 100.0
        } else {
            0.0
        };
        QuizProgress {
            current_index: self.index,
            total_signs: total,
            percentage,
            score: self.score,
            accuracy,
            time_remaining: remaining,
            time_remaining_formatted: scoring::format_mm_ss(remaining),
        }
    }

    /// Results as of `now` (or completion time, once completed).
    pub fn results(&self, now: DateTime<Utc>) -> QuizResults {
        let config = self.kind.config();
        let total = self.questions.len();
        let accuracy = if total > 0 {
            f64::from(self.score) / total as f64 * 100.0
        } else {
            0.0
        };
        let passed = accuracy >= config.passing_score;
        let finished = self.completed_at.unwrap_or(now);
        QuizResults {
            quiz_id: self.id,
            quiz_kind: self.kind,
            language: self.language.clone(),
            total_signs: total,
            correct_signs: self.score,
            total_attempts: self.attempts.len(),
            accuracy: (accuracy * 10.0).round() / 10.0,
            passing_score: config.passing_score,
            passed,
            xp_earned: scoring::xp_earned(self.score, accuracy, config.difficulty),
            duration_secs: config.duration_secs,
            time_taken_secs: self.elapsed_secs(finished),
            attempts: self.attempts.clone(),
            grade: scoring::grade(accuracy),
            feedback: scoring::final_feedback(accuracy, passed),
            completed_at: finished,
        }
    }
}
