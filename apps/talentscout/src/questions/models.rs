use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[serde(alias = "Easy", alias = "EASY")]
    Easy,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "Hard", alias = "HARD")]
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    Generated,
    Fallback,
}

/// Requested number of questions per difficulty for one technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyMix {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

impl Default for DifficultyMix {
    fn default() -> Self {
        Self {
            easy: 2,
            medium: 2,
            hard: 1,
        }
    }
}

impl DifficultyMix {
    pub fn count(&self, difficulty: Difficulty) -> usize {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    pub fn total(&self) -> usize {
        self.easy + self.medium + self.hard
    }
}

/// One technical question. Identity is (technology, ordinal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub technology: String,
    /// Position within this technology's set, starting at 0.
    pub ordinal: usize,
    pub difficulty: Difficulty,
    pub text: String,
    pub source: QuestionSource,
}

impl QuestionSpec {
    /// Stable identifier used as the answer key, e.g. `node-js-3`.
    pub fn id(&self) -> String {
        format!("{}-{}", slug(&self.technology), self.ordinal)
    }
}

/// Lowercases and replaces every run of non-alphanumerics with a single `-`.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else if c == '+' {
            // keeps "c++" distinct from "c"
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push('p');
        } else if c == '#' {
            out.push_str("sharp");
        } else {
            pending_dash = true;
        }
    }
    out
}
