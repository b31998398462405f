//! Quiz question bank.
//!
//! Module content is embedded at compile time from `contrib/bank/*.toml`.
//! Languages without dedicated content are instantiated from
//! `generic.toml`, with `{lang}` replaced by the language code.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const BANK_ASL: &str = include_str!("../../../contrib/bank/asl.toml");
const BANK_BSL: &str = include_str!("../../../contrib/bank/bsl.toml");
const BANK_FSL: &str = include_str!("../../../contrib/bank/fsl.toml");
const BANK_GENERIC: &str = include_str!("../../../contrib/bank/generic.toml");
const BANK_POOLS: &str = include_str!("../../../contrib/bank/pools.toml");

/// Languages filled from the generic template, in catalog order.
const GENERIC_LANGUAGES: [&str; 7] = ["GSL", "JSL", "CSL", "ISL", "PSL", "SSL", "RSL"];

static BANK: OnceLock<QuizBank> = OnceLock::new();

/// One sign to perform, with a short hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub sign: String,
    pub description: String,
}

/// A themed group of questions (`module_1` greetings, `module_2` numbers,
/// `module_3` family).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub title: String,
    /// Time budget in seconds.
    pub duration: u64,
    pub questions: Vec<Question>,
}

/// A daily puzzle offered alongside the challenge of the day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Puzzle {
    pub title: String,
    pub description: String,
    pub signs: Vec<String>,
    pub difficulty: String,
    pub reward_xp: u32,
    /// Seconds.
    pub time_limit: u64,
}

#[derive(Debug, Deserialize)]
struct LanguageFile {
    code: String,
    modules: Vec<Module>,
}

#[derive(Debug, Deserialize)]
struct PoolsFile {
    practice: Vec<Question>,
    fallback: Vec<Question>,
    puzzles: Vec<Puzzle>,
}

/// In-memory question bank.
#[derive(Debug, Default)]
pub struct QuizBank {
    languages: Vec<(String, Vec<Module>)>,
    practice: Vec<Question>,
    fallback: Vec<Question>,
    puzzles: Vec<Puzzle>,
}

/// The embedded bank, parsed on first use.
pub fn bank() -> &'static QuizBank {
    BANK.get_or_init(QuizBank::embedded)
}

impl QuizBank {
    fn embedded() -> Self {
        let mut bank = QuizBank::default();

        let generic: Vec<String> = GENERIC_LANGUAGES
            .iter()
            .map(|code| BANK_GENERIC.replace("{lang}", code))
            .collect();
        let sources = [BANK_ASL, BANK_BSL, BANK_FSL]
            .into_iter()
            .chain(generic.iter().map(String::as_str));

        for src in sources {
            match toml::from_str::<LanguageFile>(src) {
                Ok(file) => bank.languages.push((file.code, file.modules)),
                Err(e) => tracing::error!(error = %e, "bad quiz bank TOML"),
            }
        }

        match toml::from_str::<PoolsFile>(BANK_POOLS) {
            Ok(pools) => {
                bank.practice = pools.practice;
                bank.fallback = pools.fallback;
                bank.puzzles = pools.puzzles;
            }
            Err(e) => tracing::error!(error = %e, "bad question pool TOML"),
        }

        tracing::debug!(languages = bank.languages.len(), "quiz bank loaded");
        bank
    }

    fn language(&self, lang: &str) -> Option<&[Module]> {
        self.languages
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(lang))
            .map(|(_, modules)| modules.as_slice())
    }

    /// Codes of every language with quiz content.
    pub fn languages(&self) -> Vec<&str> {
        self.languages.iter().map(|(code, _)| code.as_str()).collect()
    }

    /// Modules for `lang`; empty when the language has no content.
    pub fn modules(&self, lang: &str) -> &[Module] {
        self.language(lang).unwrap_or(&[])
    }

    pub fn module(&self, lang: &str, module: &str) -> Option<&Module> {
        self.modules(lang).iter().find(|m| m.id == module)
    }

    /// Random sample of `min(count, n)` questions from a module, without
    /// replacement. Unknown language or module draws from the fallback pool.
    pub fn quiz_questions<R: Rng + ?Sized>(
        &self,
        lang: &str,
        module: &str,
        count: usize,
        rng: &mut R,
    ) -> Vec<Question> {
        let pool = match self.module(lang, module) {
            Some(m) => m.questions.as_slice(),
            None => {
                tracing::warn!(lang, module, "no quiz content, using fallback pool");
                self.fallback.as_slice()
            }
        };
        sample(pool, count, rng)
    }

    pub fn practice_questions<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Question> {
        sample(&self.practice, count, rng)
    }

    pub fn practice_pool(&self) -> &[Question] {
        &self.practice
    }

    pub fn daily_puzzles<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Puzzle> {
        sample(&self.puzzles, count, rng)
    }

    /// Questions of a named category: `greetings`, `numbers` or `family`.
    pub fn signs_by_category(&self, lang: &str, category: &str) -> &[Question] {
        let module = match category {
            "greetings" => "module_1",
            "numbers" => "module_2",
            "family" => "module_3",
            _ => return &[],
        };
        self.module(lang, module)
            .map(|m| m.questions.as_slice())
            .unwrap_or(&[])
    }

    /// Case-insensitive substring search over sign names and descriptions.
    pub fn search_signs(&self, lang: &str, term: &str) -> Vec<&Question> {
        let needle = term.to_lowercase();
        self.modules(lang)
            .iter()
            .flat_map(|m| m.questions.iter())
            .filter(|q| {
                q.sign.to_lowercase().contains(&needle)
                    || q.description.to_lowercase().contains(&needle)
            })
            .collect()
    }
}

fn sample<T: Clone, R: Rng + ?Sized>(pool: &[T], count: usize, rng: &mut R) -> Vec<T> {
    let n = count.min(pool.len());
    pool.choose_multiple(rng, n).cloned().collect()
}
