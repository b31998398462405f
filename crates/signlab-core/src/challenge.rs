//! Daily and mini challenges.
//!
//! The challenge of the day is derived from the calendar date alone, so
//! every learner sees the same one. A [`ChallengeRun`] scores actions
//! within the kind's time limit; [`ChallengeStats`] keeps per-learner
//! bookkeeping across runs.

use crate::bank::QuizBank;
use crate::language::DEFAULT_LANGUAGE;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use uuid::Uuid;

/// Used when a kind's category has no signs in the chosen language.
const FALLBACK_SIGNS: [&str; 5] = ["Hello", "Thank You", "Please", "Sorry", "Yes"];

const MAX_SIGNS: usize = 10;
const SEQUENCE_LEN: usize = 5;
const PATTERN_LEN: usize = 4;
const SCRAMBLE_WORDS: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("time is up")]
    TimeUp,
    #[error("action {action} is not valid for {kind}")]
    WrongAction { kind: &'static str, action: &'static str },
    #[error("no signs remaining")]
    NoSignsRemaining,
    #[error("no scrambled word at index {0}")]
    InvalidIndex(usize),
    #[error("challenge already completed")]
    Completed,
    #[error("unknown challenge type: {0}")]
    UnknownKind(String),
    #[error("unknown mini challenge: {0}")]
    UnknownMini(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    SpeedSigning,
    SequenceMemory,
    PatternMatching,
    SignScramble,
    RapidFire,
}

/// Display metadata and time limit of a challenge kind.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChallengeInfo {
    pub kind: ChallengeKind,
    pub name: &'static str,
    pub description: &'static str,
    pub time_limit_secs: u64,
    /// What the score measures.
    pub scoring: &'static str,
}

impl ChallengeKind {
    pub const ALL: [ChallengeKind; 5] = [
        ChallengeKind::SpeedSigning,
        ChallengeKind::SequenceMemory,
        ChallengeKind::PatternMatching,
        ChallengeKind::SignScramble,
        ChallengeKind::RapidFire,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeKind::SpeedSigning => "speed_signing",
            ChallengeKind::SequenceMemory => "sequence_memory",
            ChallengeKind::PatternMatching => "pattern_matching",
            ChallengeKind::SignScramble => "sign_scramble",
            ChallengeKind::RapidFire => "rapid_fire",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ChallengeError> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ChallengeError::UnknownKind(s.to_string()))
    }

    pub fn info(self) -> ChallengeInfo {
        let (name, description, time_limit_secs, scoring) = match self {
            ChallengeKind::SpeedSigning => (
                "Speed Signing",
                "Sign as many words as possible in the time limit",
                60,
                "signs_per_minute",
            ),
            ChallengeKind::SequenceMemory => (
                "Sequence Memory",
                "Remember and repeat the sequence of signs",
                120,
                "sequence_length",
            ),
            ChallengeKind::PatternMatching => (
                "Pattern Matching",
                "Match the pattern shown with correct signs",
                90,
                "patterns_completed",
            ),
            ChallengeKind::SignScramble => (
                "Sign Scramble",
                "Unscramble the letters to form sign words",
                180,
                "words_unscrambled",
            ),
            ChallengeKind::RapidFire => (
                "Rapid Fire",
                "Quick fire questions with immediate signing",
                45,
                "correct_signs",
            ),
        };
        ChallengeInfo {
            kind: self,
            name,
            description,
            time_limit_secs,
            scoring,
        }
    }
}

/// A concrete challenge ready to be run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub kind: ChallengeKind,
    pub name: String,
    pub language: String,
    pub signs: Vec<String>,
    /// 1 (easy) to 3 (hard).
    pub difficulty: u8,
    pub time_limit_secs: u64,
    /// Set for the challenge of the day.
    pub date: Option<NaiveDate>,
}

impl Challenge {
    pub fn is_daily(&self) -> bool {
        self.date.is_some()
    }
}

fn date_seed(date: NaiveDate) -> u64 {
    // YYYYMMDD
    date.year() as u64 * 10_000 + u64::from(date.month()) * 100 + u64::from(date.day())
}

/// Pick a language and up to ten signs suited to `kind`.
pub fn challenge_signs<R: Rng + ?Sized>(
    kind: ChallengeKind,
    bank: &QuizBank,
    rng: &mut R,
) -> (String, Vec<String>) {
    let language = bank
        .languages()
        .choose(rng)
        .map(|l| l.to_string())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    let signs: Vec<String> = match kind {
        ChallengeKind::SpeedSigning | ChallengeKind::SignScramble => bank
            .practice_questions(MAX_SIGNS, rng)
            .into_iter()
            .map(|q| q.sign)
            .collect(),
        ChallengeKind::SequenceMemory => category_signs(bank, &language, "numbers"),
        ChallengeKind::PatternMatching | ChallengeKind::RapidFire => {
            category_signs(bank, &language, "greetings")
        }
    };

    if signs.is_empty() {
        return (language, FALLBACK_SIGNS.iter().map(|s| s.to_string()).collect());
    }
    (language, signs)
}

fn category_signs(bank: &QuizBank, language: &str, category: &str) -> Vec<String> {
    bank.signs_by_category(language, category)
        .iter()
        .take(MAX_SIGNS)
        .map(|q| q.sign.clone())
        .collect()
}

/// The challenge of the day. Deterministic for a given date.
pub fn daily(date: NaiveDate, bank: &QuizBank) -> Challenge {
    let mut rng = StdRng::seed_from_u64(date_seed(date));
    let kind = ChallengeKind::ALL[rng.gen_range(0..ChallengeKind::ALL.len())];
    let (language, signs) = challenge_signs(kind, bank, &mut rng);
    let difficulty = rng.gen_range(1..=3);
    let info = kind.info();
    Challenge {
        kind,
        name: info.name.to_string(),
        language,
        signs,
        difficulty,
        time_limit_secs: info.time_limit_secs,
        date: Some(date),
    }
}

/// An on-demand challenge of one kind, at medium difficulty.
pub fn of_kind<R: Rng + ?Sized>(kind: ChallengeKind, bank: &QuizBank, rng: &mut R) -> Challenge {
    let (language, signs) = challenge_signs(kind, bank, rng);
    let info = kind.info();
    Challenge {
        kind,
        name: info.name.to_string(),
        language,
        signs,
        difficulty: 2,
        time_limit_secs: info.time_limit_secs,
        date: None,
    }
}

/// A short challenge outside the daily rotation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MiniChallenge {
    pub name: &'static str,
    pub kind: ChallengeKind,
    pub duration_secs: u64,
    pub target: &'static str,
}

static MINI_CHALLENGES: [MiniChallenge; 4] = [
    MiniChallenge {
        name: "5-Sign Sprint",
        kind: ChallengeKind::SpeedSigning,
        duration_secs: 30,
        target: "5",
    },
    MiniChallenge {
        name: "Number Sequence",
        kind: ChallengeKind::SequenceMemory,
        duration_secs: 45,
        target: "1-10",
    },
    MiniChallenge {
        name: "Color Match",
        kind: ChallengeKind::PatternMatching,
        duration_secs: 60,
        target: "colors",
    },
    MiniChallenge {
        name: "Family Signs",
        kind: ChallengeKind::RapidFire,
        duration_secs: 30,
        target: "family",
    },
];

pub fn mini_challenges() -> &'static [MiniChallenge] {
    &MINI_CHALLENGES
}

/// Build a runnable mini challenge by name.
pub fn mini<R: Rng + ?Sized>(
    name: &str,
    bank: &QuizBank,
    rng: &mut R,
) -> Result<Challenge, ChallengeError> {
    let m = MINI_CHALLENGES
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ChallengeError::UnknownMini(name.to_string()))?;
    let (language, signs) = challenge_signs(m.kind, bank, rng);
    Ok(Challenge {
        kind: m.kind,
        name: m.name.to_string(),
        language,
        signs,
        difficulty: 1,
        time_limit_secs: m.duration_secs,
        date: None,
    })
}

/// Something the learner does during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChallengeAction {
    /// Current sign performed (speed signing, rapid fire).
    Done,
    /// Current sign skipped (speed signing).
    Skip,
    /// Repeat of the shown sequence.
    Sequence { signs: Vec<String> },
    /// Signs picked to reproduce the shown pattern.
    Pattern { signs: Vec<String> },
    /// Answer for one scrambled word.
    Unscramble { index: usize, answer: String },
}

impl ChallengeAction {
    fn name(&self) -> &'static str {
        match self {
            ChallengeAction::Done => "done",
            ChallengeAction::Skip => "skip",
            ChallengeAction::Sequence { .. } => "sequence",
            ChallengeAction::Pattern { .. } => "pattern",
            ChallengeAction::Unscramble { .. } => "unscramble",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub correct: bool,
    pub points: u32,
    pub score: u32,
    pub completed: usize,
    pub time_remaining: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_sign: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResult {
    pub run_id: Uuid,
    pub kind: ChallengeKind,
    pub language: String,
    pub daily: bool,
    pub final_score: u32,
    pub signs_completed: usize,
    /// `score / max(1, signs) * 100`.
    pub efficiency: f64,
    pub completed_at: DateTime<Utc>,
}

/// One in-progress attempt at a challenge.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeRun {
    pub id: Uuid,
    pub challenge: Challenge,
    pub started_at: DateTime<Utc>,
    score: u32,
    completed_signs: Vec<String>,
    /// Scrambled first words, shown for sign scramble.
    pub scrambled: Vec<String>,
    /// Pattern plus two distractors in random order, for pattern matching.
    pub pattern_options: Vec<String>,
    solved_words: Vec<bool>,
    sequence_solved: bool,
    pattern_solved: bool,
    result: Option<ChallengeResult>,
}

fn scramble<R: Rng + ?Sized>(word: &str, rng: &mut R) -> String {
    let mut letters: Vec<char> = word.chars().filter(|c| *c != ' ').collect();
    letters.shuffle(rng);
    letters.into_iter().collect()
}

fn normalize_word(s: &str) -> String {
    s.to_lowercase().replace(' ', "")
}

impl ChallengeRun {
    pub fn start<R: Rng + ?Sized>(challenge: Challenge, rng: &mut R, now: DateTime<Utc>) -> Self {
        let scrambled: Vec<String> = if challenge.kind == ChallengeKind::SignScramble {
            challenge
                .signs
                .iter()
                .take(SCRAMBLE_WORDS)
                .map(|w| scramble(w, rng))
                .collect()
        } else {
            Vec::new()
        };

        let pattern_options = if challenge.kind == ChallengeKind::PatternMatching {
            let mut options: Vec<String> =
                challenge.signs.iter().take(PATTERN_LEN).cloned().collect();
            options.extend(challenge.signs.choose_multiple(rng, 2).cloned());
            options.shuffle(rng);
            options
        } else {
            Vec::new()
        };

        tracing::info!(
            kind = challenge.kind.as_str(),
            language = %challenge.language,
            signs = challenge.signs.len(),
            daily = challenge.is_daily(),
            "challenge started"
        );

        Self {
            id: Uuid::new_v4(),
            solved_words: vec![false; scrambled.len()],
            challenge,
            started_at: now,
            score: 0,
            completed_signs: Vec::new(),
            scrambled,
            pattern_options,
            sequence_solved: false,
            pattern_solved: false,
            result: None,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn completed_signs(&self) -> &[String] {
        &self.completed_signs
    }

    pub fn result(&self) -> Option<&ChallengeResult> {
        self.result.as_ref()
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.started_at + Duration::seconds(self.challenge.time_limit_secs as i64)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline()
    }

    /// Whole seconds left, never negative.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> u64 {
        (self.deadline() - now).num_seconds().max(0) as u64
    }

    /// The first signs to repeat in sequence memory.
    pub fn sequence(&self) -> &[String] {
        let n = SEQUENCE_LEN.min(self.challenge.signs.len());
        &self.challenge.signs[..n]
    }

    /// The pattern to reproduce in pattern matching.
    pub fn pattern(&self) -> &[String] {
        let n = PATTERN_LEN.min(self.challenge.signs.len());
        &self.challenge.signs[..n]
    }

    /// Next sign for speed signing or rapid fire.
    pub fn current_sign(&self) -> Option<&str> {
        match self.challenge.kind {
            ChallengeKind::SpeedSigning | ChallengeKind::RapidFire => self
                .challenge
                .signs
                .get(self.completed_signs.len())
                .map(String::as_str),
            _ => None,
        }
    }

    fn wrong_action(&self, action: &ChallengeAction) -> ChallengeError {
        ChallengeError::WrongAction {
            kind: self.challenge.kind.as_str(),
            action: action.name(),
        }
    }

    pub fn act(
        &mut self,
        action: ChallengeAction,
        now: DateTime<Utc>,
    ) -> Result<ActionOutcome, ChallengeError> {
        if self.result.is_some() {
            return Err(ChallengeError::Completed);
        }
        if self.is_expired(now) {
            return Err(ChallengeError::TimeUp);
        }

        let kind = self.challenge.kind;
        let (correct, points) = match (&action, kind) {
            (ChallengeAction::Done, ChallengeKind::SpeedSigning | ChallengeKind::RapidFire) => {
                let sign = self
                    .current_sign()
                    .ok_or(ChallengeError::NoSignsRemaining)?
                    .to_string();
                self.completed_signs.push(sign);
                let points = if kind == ChallengeKind::SpeedSigning { 10 } else { 5 };
                (true, points)
            }
            (ChallengeAction::Skip, ChallengeKind::SpeedSigning) => {
                let sign = self
                    .current_sign()
                    .ok_or(ChallengeError::NoSignsRemaining)?
                    .to_string();
                self.completed_signs.push(format!("{sign} (skipped)"));
                (false, 0)
            }
            (ChallengeAction::Sequence { signs }, ChallengeKind::SequenceMemory) => {
                let given: Vec<&str> = signs.iter().map(|s| s.trim()).collect();
                let correct = given == self.sequence();
                let points = if correct && !self.sequence_solved {
                    self.sequence_solved = true;
                    let seq = self.sequence().to_vec();
                    self.completed_signs.extend(seq);
                    50
                } else {
                    0
                };
                (correct, points)
            }
            (ChallengeAction::Pattern { signs }, ChallengeKind::PatternMatching) => {
                let correct = signs.as_slice() == self.pattern();
                let points = if correct && !self.pattern_solved {
                    self.pattern_solved = true;
                    let pattern = self.pattern().to_vec();
                    self.completed_signs.extend(pattern);
                    30
                } else {
                    0
                };
                (correct, points)
            }
            (ChallengeAction::Unscramble { index, answer }, ChallengeKind::SignScramble) => {
                let index = *index;
                if index >= self.scrambled.len() {
                    return Err(ChallengeError::InvalidIndex(index));
                }
                let word = &self.challenge.signs[index];
                let correct = normalize_word(answer) == normalize_word(word);
                let points = if correct && !self.solved_words[index] {
                    self.solved_words[index] = true;
                    self.completed_signs.push(word.clone());
                    20
                } else {
                    0
                };
                (correct, points)
            }
            _ => return Err(self.wrong_action(&action)),
        };

        self.score += points;
        tracing::debug!(
            run = %self.id,
            action = action.name(),
            correct,
            points,
            score = self.score,
            "challenge action"
        );

        Ok(ActionOutcome {
            correct,
            points,
            score: self.score,
            completed: self.completed_signs.len(),
            time_remaining: self.time_remaining(now),
            current_sign: self.current_sign().map(str::to_string),
        })
    }

    /// Finish the run. Completing twice returns the first result.
    pub fn complete(&mut self, now: DateTime<Utc>) -> ChallengeResult {
        if let Some(r) = &self.result {
            return r.clone();
        }
        let efficiency =
            f64::from(self.score) / self.challenge.signs.len().max(1) as f64 * 100.0;
        let result = ChallengeResult {
            run_id: self.id,
            kind: self.challenge.kind,
            language: self.challenge.language.clone(),
            daily: self.challenge.is_daily(),
            final_score: self.score,
            signs_completed: self.completed_signs.len(),
            efficiency,
            completed_at: now,
        };
        tracing::info!(
            run = %self.id,
            kind = self.challenge.kind.as_str(),
            score = self.score,
            "challenge completed"
        );
        self.result = Some(result.clone());
        result
    }
}

/// Per-learner challenge history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChallengeStats {
    pub total_completed: u32,
    /// Best final score keyed by challenge type name.
    pub best_scores: BTreeMap<String, u32>,
    pub current_streak: u32,
    pub best_streak: u32,
    pub last_completed: Option<NaiveDate>,
    pub total_score: u64,
    pub average_score: f64,
    pub daily_completed: BTreeSet<NaiveDate>,
}

impl ChallengeStats {
    pub fn record(&mut self, result: &ChallengeResult, today: NaiveDate) {
        self.total_completed += 1;

        let best = self
            .best_scores
            .entry(result.kind.as_str().to_string())
            .or_insert(result.final_score);
        *best = (*best).max(result.final_score);

        self.current_streak = match self.last_completed {
            Some(last) if last == today => self.current_streak.max(1),
            Some(last) if today.pred_opt() == Some(last) => self.current_streak + 1,
            _ => 1,
        };
        self.best_streak = self.best_streak.max(self.current_streak);
        self.last_completed = Some(today);

        self.total_score += u64::from(result.final_score);
        self.average_score = self.total_score as f64 / f64::from(self.total_completed);

        if result.daily {
            self.daily_completed.insert(today);
        }
    }

    pub fn daily_completed_on(&self, date: NaiveDate) -> bool {
        self.daily_completed.contains(&date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::bank;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn challenge(kind: ChallengeKind, signs: &[&str]) -> Challenge {
        Challenge {
            kind,
            name: kind.info().name.to_string(),
            language: "ASL".to_string(),
            signs: signs.iter().map(|s| s.to_string()).collect(),
            difficulty: 1,
            time_limit_secs: kind.info().time_limit_secs,
            date: None,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_daily_is_deterministic_per_date() {
        let a = daily(date(2024, 5, 10), bank());
        let b = daily(date(2024, 5, 10), bank());
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.language, b.language);
        assert_eq!(a.signs, b.signs);
        assert_eq!(a.difficulty, b.difficulty);
        assert!((1..=3).contains(&a.difficulty));
        assert!(!a.signs.is_empty() && a.signs.len() <= 10);
        assert!(a.is_daily());
        assert_eq!(date_seed(date(2024, 5, 10)), 20240510);
    }

    #[test]
    fn test_sequence_signs_come_from_numbers() {
        let (lang, signs) = challenge_signs(ChallengeKind::SequenceMemory, bank(), &mut rng());
        let numbers: Vec<String> = bank()
            .signs_by_category(&lang, "numbers")
            .iter()
            .take(10)
            .map(|q| q.sign.clone())
            .collect();
        assert_eq!(signs, numbers);
    }

    #[test]
    fn test_empty_bank_uses_fallback_signs() {
        let empty = QuizBank::default();
        let (lang, signs) = challenge_signs(ChallengeKind::RapidFire, &empty, &mut rng());
        assert_eq!(lang, "ASL");
        assert_eq!(signs, FALLBACK_SIGNS.map(String::from).to_vec());
    }

    #[test]
    fn test_mini_challenge_uses_own_duration() {
        let c = mini("5-sign sprint", bank(), &mut rng()).unwrap();
        assert_eq!(c.kind, ChallengeKind::SpeedSigning);
        assert_eq!(c.time_limit_secs, 30);
        assert!(!c.is_daily());
        assert!(matches!(
            mini("nope", bank(), &mut rng()),
            Err(ChallengeError::UnknownMini(_))
        ));
        assert_eq!(mini_challenges().len(), 4);
    }

    #[test]
    fn test_of_kind_uses_kind_time_limit() {
        let c = of_kind(ChallengeKind::RapidFire, bank(), &mut rng());
        assert_eq!(c.time_limit_secs, 45);
        assert_eq!(c.difficulty, 2);
        assert!(!c.signs.is_empty());
        assert!(!c.is_daily());
    }

    #[test]
    fn test_speed_signing_done_and_skip() {
        let mut run = ChallengeRun::start(
            challenge(ChallengeKind::SpeedSigning, &["hello", "yes"]),
            &mut rng(),
            t0(),
        );
        let out = run.act(ChallengeAction::Done, t0()).unwrap();
        assert_eq!(out.points, 10);
        assert_eq!(out.current_sign.as_deref(), Some("yes"));
        let out = run.act(ChallengeAction::Skip, t0()).unwrap();
        assert_eq!(out.score, 10);
        assert_eq!(run.completed_signs(), ["hello", "yes (skipped)"]);
        assert_eq!(
            run.act(ChallengeAction::Done, t0()).unwrap_err(),
            ChallengeError::NoSignsRemaining
        );
    }

    #[test]
    fn test_actions_rejected_after_time_limit() {
        let mut run = ChallengeRun::start(
            challenge(ChallengeKind::RapidFire, &["hello"]),
            &mut rng(),
            t0(),
        );
        let late = t0() + Duration::seconds(45);
        assert_eq!(run.act(ChallengeAction::Done, late).unwrap_err(), ChallengeError::TimeUp);
        assert_eq!(run.time_remaining(late), 0);
    }

    #[test]
    fn test_last_second_still_accepts_actions() {
        let mut run = ChallengeRun::start(
            challenge(ChallengeKind::RapidFire, &["hello", "yes"]),
            &mut rng(),
            t0(),
        );
        let almost = t0() + Duration::seconds(45) - Duration::milliseconds(500);
        assert_eq!(run.time_remaining(almost), 0);
        assert!(!run.is_expired(almost));
        let out = run.act(ChallengeAction::Done, almost).unwrap();
        assert_eq!(out.points, 5);

        let deadline = t0() + Duration::seconds(45);
        assert!(run.is_expired(deadline));
        assert_eq!(run.act(ChallengeAction::Done, deadline).unwrap_err(), ChallengeError::TimeUp);
    }

    #[test]
    fn test_wrong_action_for_kind() {
        let mut run = ChallengeRun::start(
            challenge(ChallengeKind::RapidFire, &["hello"]),
            &mut rng(),
            t0(),
        );
        assert!(matches!(
            run.act(ChallengeAction::Skip, t0()),
            Err(ChallengeError::WrongAction { .. })
        ));
    }

    #[test]
    fn test_sequence_scores_once() {
        let signs = ["one", "two", "three", "four", "five", "six"];
        let mut run = ChallengeRun::start(
            challenge(ChallengeKind::SequenceMemory, &signs),
            &mut rng(),
            t0(),
        );
        let wrong = ChallengeAction::Sequence {
            signs: vec!["one".into(), "three".into()],
        };
        assert!(!run.act(wrong, t0()).unwrap().correct);

        let right = || ChallengeAction::Sequence {
            signs: ["one", " two", "three ", "four", "five"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };
        assert_eq!(run.act(right(), t0()).unwrap().points, 50);
        let again = run.act(right(), t0()).unwrap();
        assert!(again.correct);
        assert_eq!(again.points, 0);
        assert_eq!(run.score(), 50);
    }

    #[test]
    fn test_pattern_options_contain_pattern() {
        let signs = ["hello", "please", "sorry", "yes", "no", "help"];
        let mut run = ChallengeRun::start(
            challenge(ChallengeKind::PatternMatching, &signs),
            &mut rng(),
            t0(),
        );
        assert_eq!(run.pattern_options.len(), 6);
        for s in run.pattern() {
            assert!(run.pattern_options.contains(s));
        }
        let action = ChallengeAction::Pattern {
            signs: run.pattern().to_vec(),
        };
        assert_eq!(run.act(action, t0()).unwrap().points, 30);
    }

    #[test]
    fn test_scramble_is_case_and_space_insensitive() {
        let mut run = ChallengeRun::start(
            challenge(ChallengeKind::SignScramble, &["Thank You", "hello", "no", "yes"]),
            &mut rng(),
            t0(),
        );
        assert_eq!(run.scrambled.len(), 3);
        let mut letters: Vec<char> = run.scrambled[0].chars().collect();
        letters.sort_unstable();
        let mut expected: Vec<char> = "ThankYou".chars().collect();
        expected.sort_unstable();
        assert_eq!(letters, expected);

        let answer = |index: usize, answer: &str| ChallengeAction::Unscramble {
            index,
            answer: answer.to_string(),
        };
        assert_eq!(run.act(answer(0, "thankyou"), t0()).unwrap().points, 20);
        assert_eq!(run.act(answer(0, "THANK YOU"), t0()).unwrap().points, 0);
        assert!(!run.act(answer(1, "hallo"), t0()).unwrap().correct);
        assert_eq!(
            run.act(answer(3, "yes"), t0()).unwrap_err(),
            ChallengeError::InvalidIndex(3)
        );
    }

    #[test]
    fn test_complete_computes_efficiency() {
        let mut run = ChallengeRun::start(
            challenge(ChallengeKind::RapidFire, &["a", "b", "c", "d"]),
            &mut rng(),
            t0(),
        );
        run.act(ChallengeAction::Done, t0()).unwrap();
        run.act(ChallengeAction::Done, t0()).unwrap();
        let r = run.complete(t0() + Duration::seconds(10));
        assert_eq!(r.final_score, 10);
        assert_eq!(r.signs_completed, 2);
        assert_eq!(r.efficiency, 250.0);
        assert_eq!(run.act(ChallengeAction::Done, t0()).unwrap_err(), ChallengeError::Completed);
        assert_eq!(run.complete(t0()).completed_at, r.completed_at);
    }

    #[test]
    fn test_stats_streak_rules() {
        let mut stats = ChallengeStats::default();
        let result = |score: u32, daily: bool| ChallengeResult {
            run_id: Uuid::new_v4(),
            kind: ChallengeKind::SpeedSigning,
            language: "ASL".into(),
            daily,
            final_score: score,
            signs_completed: 0,
            efficiency: 0.0,
            completed_at: t0(),
        };

        stats.record(&result(30, true), date(2024, 5, 1));
        assert_eq!(stats.current_streak, 1);
        stats.record(&result(10, false), date(2024, 5, 1));
        assert_eq!(stats.current_streak, 1);
        stats.record(&result(50, false), date(2024, 5, 2));
        assert_eq!(stats.current_streak, 2);
        stats.record(&result(20, false), date(2024, 5, 5));
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.best_streak, 2);

        assert_eq!(stats.total_completed, 4);
        assert_eq!(stats.best_scores["speed_signing"], 50);
        assert_eq!(stats.total_score, 110);
        assert_eq!(stats.average_score, 27.5);
        assert!(stats.daily_completed_on(date(2024, 5, 1)));
        assert!(!stats.daily_completed_on(date(2024, 5, 2)));
    }
}
