//! Answer scoring: pluggable, trait-based scorer for technical answers.
//!
//! Default: `HeuristicScorer` (rule-based, deterministic, no LLM call).
//! Optional: `LlmAnswerScorer` (semantic via the completion client), which
//! falls back to the heuristic whenever the model is unavailable or its output
//! does not match the schema.
//!
//! The state machine holds an `Arc<dyn AnswerScorer>`, chosen at startup via
//! `ENABLE_LLM_SCORING`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm_client::prompts::UNTRUSTED_INPUT_INSTRUCTION;
use crate::llm_client::{strip_json_fences, TextCompletion};
use crate::questions::models::{Difficulty, QuestionSpec};
use crate::questions::prompts::SCORING_PROMPT_TEMPLATE;

pub const MAX_SCORE: u8 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerScore {
    pub score: u8, // 0 to 10
    pub reasoning: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub scorer_backend: String, // "heuristic" or "llm"
}

/// Swap backends without touching the state machine.
#[async_trait]
pub trait AnswerScorer: Send + Sync {
    /// Never fails; backends degrade to a heuristic score instead.
    async fn score(&self, question: &QuestionSpec, answer: &str, years_experience: f32)
        -> AnswerScore;
}

// ────────────────────────────────────────────────────────────────────────────
// HeuristicScorer
// ────────────────────────────────────────────────────────────────────────────

/// Length-based scoring, adjusted by difficulty.
///
/// Bands (trimmed character count): <20 → 3, <50 → 5, <150 → 7, else 8.
/// Easy questions add 1 to scores of 6 or more; hard questions subtract 1
/// from scores of 7 or less (never below 1).
pub struct HeuristicScorer;

#[async_trait]
impl AnswerScorer for HeuristicScorer {
    async fn score(&self, question: &QuestionSpec, answer: &str, _years: f32) -> AnswerScore {
        heuristic_score(answer, question.difficulty)
    }
}

pub fn heuristic_score(answer: &str, difficulty: Difficulty) -> AnswerScore {
    let length = answer.trim().chars().count();

    let (mut score, reasoning, strengths, improvements): (u8, &str, &[&str], &[&str]) =
        match length {
            0..=19 => (
                3,
                "Answer is too brief for a technical question",
                &[],
                &[
                    "Provide a more detailed explanation",
                    "Include examples or use cases",
                ],
            ),
            20..=49 => (
                5,
                "Answer has basic content but lacks depth",
                &["Clear and concise"],
                &[
                    "Add more technical details",
                    "Explain the reasoning behind the answer",
                ],
            ),
            50..=149 => (
                7,
                "Good answer with adequate detail",
                &["Well-structured response", "Good level of detail"],
                &["Could include more specific examples"],
            ),
            _ => (
                8,
                "Comprehensive and detailed answer",
                &["Thorough explanation", "Good depth of knowledge"],
                &[],
            ),
        };

    match difficulty {
        Difficulty::Easy if score >= 6 => score = (score + 1).min(MAX_SCORE),
        Difficulty::Hard if score <= 7 => score = score.saturating_sub(1).max(1),
        _ => {}
    }

    AnswerScore {
        score,
        reasoning: reasoning.to_string(),
        strengths: strengths.iter().map(|s| s.to_string()).collect(),
        improvements: improvements.iter().map(|s| s.to_string()).collect(),
        scorer_backend: "heuristic".to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmAnswerScorer
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawScore {
    score: i64,
    reasoning: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvements: Vec<String>,
}

pub struct LlmAnswerScorer {
    llm: Arc<dyn TextCompletion>,
    timeout: Duration,
}

impl LlmAnswerScorer {
    pub fn new(llm: Arc<dyn TextCompletion>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    async fn try_score(
        &self,
        question: &QuestionSpec,
        answer: &str,
        years_experience: f32,
    ) -> anyhow::Result<AnswerScore> {
        let prompt = SCORING_PROMPT_TEMPLATE
            .replace("{untrusted_instruction}", UNTRUSTED_INPUT_INSTRUCTION)
            .replace("{technology}", &question.technology)
            .replace("{difficulty}", question.difficulty.as_str())
            .replace("{years}", &years_experience.to_string())
            .replace("{question}", &question.text)
            .replace("{answer}", answer);

        let raw = tokio::time::timeout(self.timeout, self.llm.complete(&prompt, self.timeout))
            .await
            .map_err(|_| anyhow::anyhow!("scoring timed out after {:?}", self.timeout))??;
        let parsed: RawScore = serde_json::from_str(strip_json_fences(&raw))?;

        Ok(AnswerScore {
            score: parsed.score.clamp(0, MAX_SCORE as i64) as u8,
            reasoning: parsed.reasoning,
            strengths: parsed.strengths,
            improvements: parsed.improvements,
            scorer_backend: "llm".to_string(),
        })
    }
}

#[async_trait]
impl AnswerScorer for LlmAnswerScorer {
    async fn score(
        &self,
        question: &QuestionSpec,
        answer: &str,
        years_experience: f32,
    ) -> AnswerScore {
        match self.try_score(question, answer, years_experience).await {
            Ok(score) => score,
            Err(e) => {
                warn!(
                    "LLM scoring failed for question {}, using heuristic: {e}",
                    question.id()
                );
                heuristic_score(answer, question.difficulty)
            }
        }
    }
}

/// Mean score rounded to one decimal; `None` when nothing was scored.
pub fn overall_score<'a>(scores: impl IntoIterator<Item = &'a AnswerScore>) -> Option<f32> {
    let (sum, count) = scores
        .into_iter()
        .fold((0u32, 0u32), |(sum, count), s| (sum + s.score as u32, count + 1));
    if count == 0 {
        return None;
    }
    Some((sum as f32 / count as f32 * 10.0).round() / 10.0)
}
