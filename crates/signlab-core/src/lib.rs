//! signlab-core: learning logic for the sign language platform.
//!
//! Language catalog, embedded quiz bank, timed quizzes, daily challenges
//! and progress analytics. Pure logic: no I/O beyond the compile-time
//! bank, and time and randomness always come from the caller.

pub mod bank;
pub mod challenge;
pub mod language;
pub mod progress;
pub mod quiz;
pub mod scoring;

pub use bank::{bank, Module, Puzzle, Question, QuizBank};
pub use challenge::{Challenge, ChallengeAction, ChallengeError, ChallengeKind, ChallengeRun, ChallengeStats};
pub use language::{LanguageSelection, SignLanguage};
pub use progress::{PracticeSession, ProgressOverview, SessionKind, WeeklyReport};
pub use quiz::{QuizError, QuizKind, QuizResults, QuizSession};
pub use scoring::{QuizDifficulty, SkillLevel};
