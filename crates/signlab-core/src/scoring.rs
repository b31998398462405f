//! XP, grades, feedback tiers and skill levels.

use serde::{Deserialize, Serialize};

/// Quiz difficulty; scales XP earned per correct sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizDifficulty {
    Easy,
    Medium,
    Hard,
}

impl QuizDifficulty {
    pub fn multiplier(self) -> f64 {
        match self {
            QuizDifficulty::Easy => 1.0,
            QuizDifficulty::Medium => 1.5,
            QuizDifficulty::Hard => 2.0,
        }
    }
}

/// XP per correct sign before the difficulty multiplier.
pub const XP_PER_SIGN: u32 = 10;

fn accuracy_bonus(accuracy: f64) -> u32 {
    if accuracy >= 95.0 {
        50
    } else if accuracy >= 90.0 {
        30
    } else if accuracy >= 80.0 {
        20
    } else {
        0
    }
}

/// XP earned for `correct` signs at `accuracy` percent.
pub fn xp_earned(correct: u32, accuracy: f64, difficulty: QuizDifficulty) -> u32 {
    let base = f64::from(correct * XP_PER_SIGN) * difficulty.multiplier();
    base.floor() as u32 + accuracy_bonus(accuracy)
}

/// Letter grade for an accuracy percentage.
pub fn grade(accuracy: f64) -> &'static str {
    const GRADES: [(f64, &str); 8] = [
        (95.0, "A+"),
        (90.0, "A"),
        (85.0, "B+"),
        (80.0, "B"),
        (75.0, "C+"),
        (70.0, "C"),
        (65.0, "D+"),
        (60.0, "D"),
    ];
    GRADES
        .iter()
        .find(|(min, _)| accuracy >= *min)
        .map(|(_, g)| *g)
        .unwrap_or("F")
}

/// Severity used by clients to colour a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Success,
    Warning,
    Error,
}

/// Summary shown when a quiz ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalFeedback {
    pub title: &'static str,
    pub message: &'static str,
    pub tone: Tone,
}

pub fn final_feedback(accuracy: f64, passed: bool) -> FinalFeedback {
    let (title, message, tone) = match (passed, accuracy) {
        (true, a) if a >= 95.0 => (
            "Outstanding Performance!",
            "You've mastered these signs with exceptional accuracy!",
            Tone::Success,
        ),
        (true, a) if a >= 85.0 => (
            "Excellent Work!",
            "Great job! You're showing strong progress in sign language.",
            Tone::Success,
        ),
        (true, _) => (
            "Well Done!",
            "You passed! Keep practicing to improve your accuracy.",
            Tone::Success,
        ),
        (false, _) => (
            "Keep Practicing!",
            "Don't worry! Practice makes perfect. Review the signs and try again.",
            Tone::Warning,
        ),
    };
    FinalFeedback {
        title,
        message,
        tone,
    }
}

/// Recognition-quality tier for a single prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Excellent,
    Good,
    Fair,
    NotRecognized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfidenceFeedback {
    pub level: ConfidenceLevel,
    pub message: &'static str,
    pub suggestion: &'static str,
    pub tone: Tone,
}

pub fn confidence_feedback(confidence: f32) -> ConfidenceFeedback {
    let (level, message, suggestion, tone) = if confidence >= 0.9 {
        (
            ConfidenceLevel::Excellent,
            "Excellent! Your sign is perfectly recognized.",
            "Great job! Try practicing another sign.",
            Tone::Success,
        )
    } else if confidence >= 0.7 {
        (
            ConfidenceLevel::Good,
            "Good! Your sign is well recognized.",
            "Nice work! Small adjustments can improve accuracy.",
            Tone::Success,
        )
    } else if confidence >= 0.5 {
        (
            ConfidenceLevel::Fair,
            "Fair attempt. Your sign is partially recognized.",
            "Try adjusting your hand position and finger placement.",
            Tone::Warning,
        )
    } else {
        (
            ConfidenceLevel::NotRecognized,
            "Sign not recognized clearly.",
            "Check the reference video and ensure good lighting.",
            Tone::Error,
        )
    };
    ConfidenceFeedback {
        level,
        message,
        suggestion,
        tone,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SkillLevel::Beginner => "Beginner",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
        }
    }

    /// Parse a stored level name; unknown names read as `Beginner`.
    pub fn parse(s: &str) -> Self {
        match s {
            "Intermediate" => SkillLevel::Intermediate,
            "Advanced" => SkillLevel::Advanced,
            _ => SkillLevel::Beginner,
        }
    }

    /// Signs learned required to complete this level.
    pub fn next_threshold(self) -> u32 {
        match self {
            SkillLevel::Beginner => 50,
            SkillLevel::Intermediate => 150,
            SkillLevel::Advanced => 300,
        }
    }

    /// Percentage toward [`next_threshold`](Self::next_threshold), capped at 100.
    pub fn progress(self, signs_learned: u32) -> f64 {
        let pct = f64::from(signs_learned) / f64::from(self.next_threshold()) * 100.0;
        pct.min(100.0)
    }
}

/// `MM:SS` rendering of a seconds count.
pub fn format_mm_ss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
