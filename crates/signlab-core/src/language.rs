//! Supported sign languages and the active-language selection.

use serde::{Deserialize, Serialize};

/// Learning difficulty of a sign language for a new learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Static metadata for one sign language.
#[derive(Debug, Clone, Serialize)]
pub struct SignLanguage {
    pub code: &'static str,
    pub name: &'static str,
    pub region: &'static str,
    pub difficulty: Difficulty,
    /// Approximate number of signers, as displayed to users (e.g. "500,000+").
    pub users: &'static str,
    pub description: &'static str,
}

pub const DEFAULT_LANGUAGE: &str = "ASL";

const fn lang(
    code: &'static str,
    name: &'static str,
    region: &'static str,
    difficulty: Difficulty,
    users: &'static str,
    description: &'static str,
) -> SignLanguage {
    SignLanguage {
        code,
        name,
        region,
        difficulty,
        users,
        description,
    }
}

static LANGUAGES: [SignLanguage; 20] = [
    lang("ASL", "American Sign Language", "North America", Difficulty::Medium, "500,000+",
        "The primary sign language of deaf communities in the United States and Canada."),
    lang("BSL", "British Sign Language", "Europe", Difficulty::Medium, "150,000+",
        "The sign language used in the United Kingdom and Northern Ireland."),
    lang("LSF", "French Sign Language", "Europe", Difficulty::Medium, "100,000+",
        "The sign language of the deaf community in France."),
    lang("DGS", "German Sign Language", "Europe", Difficulty::Hard, "80,000+",
        "The sign language of the deaf community in Germany."),
    lang("JSL", "Japanese Sign Language", "Asia", Difficulty::Hard, "320,000+",
        "The sign language of the deaf community in Japan."),
    lang("CSL", "Chinese Sign Language", "Asia", Difficulty::Hard, "20M+",
        "The sign language used by the deaf community in China."),
    lang("LIBRAS", "Brazilian Sign Language", "South America", Difficulty::Medium, "5M+",
        "The sign language of the deaf community in Brazil."),
    lang("LSE", "Spanish Sign Language", "Europe", Difficulty::Medium, "120,000+",
        "The sign language used in Spain."),
    lang("LSP", "Portuguese Sign Language", "Europe", Difficulty::Medium, "60,000+",
        "The sign language of the deaf community in Portugal."),
    lang("AUSLAN", "Australian Sign Language", "Oceania", Difficulty::Medium, "16,000+",
        "The sign language of the Australian deaf community."),
    lang("ISL", "Indian Sign Language", "Asia", Difficulty::Medium, "2.7M+",
        "The sign language used by the deaf community in India."),
    lang("RSL", "Russian Sign Language", "Europe/Asia", Difficulty::Hard, "120,000+",
        "The sign language of the deaf community in Russia."),
    lang("TSL", "Thai Sign Language", "Asia", Difficulty::Medium, "56,000+",
        "The sign language used in Thailand."),
    lang("KSL", "Korean Sign Language", "Asia", Difficulty::Hard, "300,000+",
        "The sign language of the deaf community in South Korea."),
    lang("NZSL", "New Zealand Sign Language", "Oceania", Difficulty::Medium, "24,000+",
        "The sign language of New Zealand's deaf community."),
    lang("SASL", "South African Sign Language", "Africa", Difficulty::Medium, "600,000+",
        "The sign language used in South Africa."),
    lang("FinSL", "Finnish Sign Language", "Europe", Difficulty::Hard, "14,000+",
        "The sign language of the Finnish deaf community."),
    lang("SSL", "Swedish Sign Language", "Europe", Difficulty::Medium, "35,000+",
        "The sign language used in Sweden."),
    lang("DSL", "Danish Sign Language", "Europe", Difficulty::Medium, "5,000+",
        "The sign language of the Danish deaf community."),
    lang("NSL", "Norwegian Sign Language", "Europe", Difficulty::Medium, "5,000+",
        "The sign language used in Norway."),
];

/// All supported languages in catalog order.
pub fn all() -> &'static [SignLanguage] {
    &LANGUAGES
}

/// Look up a language by code, ignoring ASCII case.
pub fn get(code: &str) -> Option<&'static SignLanguage> {
    LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

pub fn is_supported(code: &str) -> bool {
    get(code).is_some()
}

pub fn codes() -> Vec<&'static str> {
    LANGUAGES.iter().map(|l| l.code).collect()
}

pub fn names() -> Vec<&'static str> {
    LANGUAGES.iter().map(|l| l.name).collect()
}

/// The language a learner is currently practicing.
#[derive(Debug, Clone)]
pub struct LanguageSelection {
    current: &'static SignLanguage,
}

impl Default for LanguageSelection {
    fn default() -> Self {
        Self {
            current: &LANGUAGES[0],
        }
    }
}

impl LanguageSelection {
    /// Switch to `code`. Unsupported codes leave the selection unchanged.
    pub fn set(&mut self, code: &str) -> bool {
        match get(code) {
            Some(l) => {
                tracing::info!(language = l.code, "language changed");
                self.current = l;
                true
            }
            None => {
                tracing::warn!(code, "unsupported language code");
                false
            }
        }
    }

    pub fn code(&self) -> &'static str {
        self.current.code
    }

    pub fn info(&self) -> &'static SignLanguage {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_asl() {
        let sel = LanguageSelection::default();
        assert_eq!(sel.code(), DEFAULT_LANGUAGE);
        assert_eq!(sel.info().name, "American Sign Language");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(get("bsl").map(|l| l.code), Some("BSL"));
        assert_eq!(get("finsl").map(|l| l.code), Some("FinSL"));
        assert!(get("XYZ").is_none());
    }

    #[test]
    fn test_set_rejects_unknown_code() {
        let mut sel = LanguageSelection::default();
        assert!(!sel.set("klingon"));
        assert_eq!(sel.code(), "ASL");
        assert!(sel.set("jsl"));
        assert_eq!(sel.code(), "JSL");
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes = codes();
        let n = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), n);
        assert_eq!(names().len(), n);
    }
}
