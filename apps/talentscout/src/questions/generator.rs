//! Question generation: one LLM call per declared technology, strict parse,
//! per-technology fallback.
//!
//! Flow per technology: build prompt → `complete` (bounded by timeout) →
//! schema parse → count/shape validation → QuestionSpecs. Any failure swaps in
//! the fallback bank for that technology only. A technology missing from the
//! bank is skipped and reported, never fatal.
//!
//! Technologies are generated concurrently, one task each. Tasks return their
//! own partial result tagged with the declared index and the results are
//! merged in declared order once all tasks have joined.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::llm_client::{strip_json_fences, LlmError, TextCompletion};
use crate::questions::fallback::FallbackQuestionBank;
use crate::questions::models::{Difficulty, DifficultyMix, QuestionSource, QuestionSpec};
use crate::questions::prompts::GENERATION_PROMPT_TEMPLATE;

/// Longest accepted question text, in characters.
pub const MAX_QUESTION_CHARS: usize = 400;

// ────────────────────────────────────────────────────────────────────────────
// Errors and reports
// ────────────────────────────────────────────────────────────────────────────

/// Why generation for a single technology was rejected.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation unavailable: {0}")]
    Unavailable(#[from] LlmError),

    #[error("generation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("response does not match the question schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("invalid question: {0}")]
    InvalidQuestion(String),

    #[error("expected {expected} {difficulty} questions, got {actual}")]
    CountMismatch {
        difficulty: Difficulty,
        expected: usize,
        actual: usize,
    },

    #[error("generation task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TechnologyOutcome {
    Generated,
    Fallback { reason: String },
    /// Neither generation nor the fallback bank produced questions.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologyReport {
    pub technology: String,
    pub question_count: usize,
    #[serde(flatten)]
    pub outcome: TechnologyOutcome,
}

/// Result of one `generate` call. Questions are in declared technology order.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    pub questions: Vec<QuestionSpec>,
    pub reports: Vec<TechnologyReport>,
}

impl GenerationOutcome {
    pub fn gaps(&self) -> impl Iterator<Item = &TechnologyReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, TechnologyOutcome::Skipped { .. }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Strict response schema
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQuestionSet {
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQuestion {
    difficulty: Difficulty,
    text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Generator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct QuestionGenerator {
    llm: Arc<dyn TextCompletion>,
    mix: DifficultyMix,
    timeout: Duration,
}

impl QuestionGenerator {
    pub fn new(llm: Arc<dyn TextCompletion>, mix: DifficultyMix, timeout: Duration) -> Self {
        Self { llm, mix, timeout }
    }

    /// Generates questions for every technology in `tech_stack`.
    ///
    /// Total: every failure is absorbed per technology, so the outcome is
    /// always usable even when the LLM is down for the whole call.
    pub async fn generate(&self, tech_stack: &[String]) -> GenerationOutcome {
        let mut tasks = JoinSet::new();
        for (index, technology) in tech_stack.iter().enumerate() {
            let llm = Arc::clone(&self.llm);
            let technology = technology.clone();
            let mix = self.mix;
            let timeout = self.timeout;
            tasks.spawn(async move {
                let result = generate_for_technology(llm.as_ref(), &technology, mix, timeout).await;
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<Vec<QuestionSpec>, GenerationError>>> =
            tech_stack.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!("Question generation task did not finish: {e}"),
            }
        }

        let mut outcome = GenerationOutcome::default();
        for (technology, result) in tech_stack.iter().zip(results) {
            let result = result.unwrap_or_else(|| {
                Err(GenerationError::TaskFailed(
                    "task panicked or was cancelled".to_string(),
                ))
            });
            self.absorb(&mut outcome, technology, result);
        }

        let fallback_count = outcome
            .reports
            .iter()
            .filter(|r| matches!(r.outcome, TechnologyOutcome::Fallback { .. }))
            .count();
        info!(
            "Generated {} questions for {} technologies ({} via fallback, {} skipped)",
            outcome.questions.len(),
            tech_stack.len(),
            fallback_count,
            outcome.gaps().count()
        );

        outcome
    }

    fn absorb(
        &self,
        outcome: &mut GenerationOutcome,
        technology: &str,
        result: Result<Vec<QuestionSpec>, GenerationError>,
    ) {
        let (questions, report) = match result {
            Ok(questions) => {
                let report = TechnologyReport {
                    technology: technology.to_string(),
                    question_count: questions.len(),
                    outcome: TechnologyOutcome::Generated,
                };
                (questions, report)
            }
            Err(err) => {
                warn!("Question generation for '{technology}' failed, using fallback bank: {err}");
                let fallback = FallbackQuestionBank::questions(technology, self.mix);
                let reason = err.to_string();
                let outcome = if fallback.is_empty() {
                    warn!("No fallback questions for '{technology}', skipping it");
                    TechnologyOutcome::Skipped { reason }
                } else {
                    TechnologyOutcome::Fallback { reason }
                };
                let report = TechnologyReport {
                    technology: technology.to_string(),
                    question_count: fallback.len(),
                    outcome,
                };
                (fallback, report)
            }
        };
        outcome.questions.extend(questions);
        outcome.reports.push(report);
    }
}

async fn generate_for_technology(
    llm: &dyn TextCompletion,
    technology: &str,
    mix: DifficultyMix,
    timeout: Duration,
) -> Result<Vec<QuestionSpec>, GenerationError> {
    if mix.total() == 0 {
        return Ok(Vec::new());
    }

    let prompt = build_generation_prompt(technology, mix);
    let raw = tokio::time::timeout(timeout, llm.complete(&prompt, timeout))
        .await
        .map_err(|_| GenerationError::TimedOut(timeout))??;

    parse_question_set(technology, &raw, mix)
}

fn build_generation_prompt(technology: &str, mix: DifficultyMix) -> String {
    GENERATION_PROMPT_TEMPLATE
        .replace("{technology}", technology)
        .replace("{easy}", &mix.easy.to_string())
        .replace("{medium}", &mix.medium.to_string())
        .replace("{hard}", &mix.hard.to_string())
        .replace("{total}", &mix.total().to_string())
        .replace("{max_chars}", &MAX_QUESTION_CHARS.to_string())
}

/// Parses and validates a model response. Any deviation from the schema or
/// from the requested mix rejects the whole set.
fn parse_question_set(
    technology: &str,
    raw: &str,
    mix: DifficultyMix,
) -> Result<Vec<QuestionSpec>, GenerationError> {
    let set: RawQuestionSet = serde_json::from_str(strip_json_fences(raw))?;

    let mut seen = HashSet::new();
    for question in &set.questions {
        let text = question.text.trim();
        if text.is_empty() {
            return Err(GenerationError::InvalidQuestion(
                "empty question text".to_string(),
            ));
        }
        if text.chars().count() > MAX_QUESTION_CHARS {
            return Err(GenerationError::InvalidQuestion(format!(
                "question longer than {MAX_QUESTION_CHARS} characters"
            )));
        }
        if !seen.insert(text.to_lowercase()) {
            return Err(GenerationError::InvalidQuestion(
                "duplicate question text".to_string(),
            ));
        }
    }

    for difficulty in Difficulty::ALL {
        let expected = mix.count(difficulty);
        let actual = set
            .questions
            .iter()
            .filter(|q| q.difficulty == difficulty)
            .count();
        if actual != expected {
            return Err(GenerationError::CountMismatch {
                difficulty,
                expected,
                actual,
            });
        }
    }

    let mut accepted = set.questions;
    accepted.sort_by_key(|q| q.difficulty);

    Ok(accepted
        .into_iter()
        .enumerate()
        .map(|(ordinal, q)| QuestionSpec {
            technology: technology.to_string(),
            ordinal,
            difficulty: q.difficulty,
            text: q.text.trim().to_string(),
            source: QuestionSource::Generated,
        })
        .collect())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
