use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::conversation::stage::Stage;
use crate::profile::models::{Answer, CandidateProfile};
use crate::questions::generator::TechnologyReport;
use crate::questions::models::QuestionSpec;
use crate::storage::ProfileSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    Candidate,
}

/// One transcript line. Display only; never read back by the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// One candidate conversation. Mutated only by `ConversationStateMachine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub(crate) id: Uuid,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) profile: CandidateProfile,
    pub(crate) stage: Stage,
    pub(crate) questions: Vec<QuestionSpec>,
    pub(crate) next_question: usize,
    pub(crate) transcript: Vec<ChatMessage>,
    pub(crate) generation: Vec<TechnologyReport>,
    #[serde(skip)]
    pub(crate) cancel: CancellationToken,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            profile: CandidateProfile::default(),
            stage: Stage::AwaitingConsent,
            questions: Vec::new(),
            next_question: 0,
            transcript: Vec::new(),
            generation: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn profile(&self) -> &CandidateProfile {
        &self.profile
    }

    pub fn questions(&self) -> &[QuestionSpec] {
        &self.questions
    }

    pub fn current_question(&self) -> Option<&QuestionSpec> {
        self.questions.get(self.next_question)
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn generation(&self) -> &[TechnologyReport] {
        &self.generation
    }

    /// Token that interrupts in-flight question generation for this session.
    /// The hosting layer may clone it and cancel without holding the session.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    pub(crate) fn push_message(&mut self, role: Role, content: impl Into<String>) {
        self.transcript.push(ChatMessage {
            role,
            content: content.into(),
            at: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            session_id: self.id,
            profile: self.profile.clone(),
            questions: self.questions.clone(),
            generation: self.generation.clone(),
        }
    }

    /// What the candidate-facing UI may show. Scores and raw contact details
    /// stay inside the profile.
    pub fn view(&self) -> SessionView {
        let profile = self.profile();
        let answers = profile.answers();
        SessionView {
            session_id: self.id,
            created_at: self.created_at(),
            stage: self.stage,
            consent_given: profile.consent_given(),
            tech_stack: profile.tech_stack().to_vec(),
            question_count: self.questions().len(),
            answered: answers
                .values()
                .filter(|a| matches!(a, Answer::Text(_)))
                .count(),
            skipped: answers
                .values()
                .filter(|a| matches!(a, Answer::Skipped))
                .count(),
            current_question: self.current_question().cloned(),
            additional_comments: profile.additional_comments().map(str::to_string),
            submitted_at: profile.submitted_at(),
            generation: self.generation().to_vec(),
            transcript: self.transcript().to_vec(),
        }
    }

    #[cfg(test)]
    pub(crate) fn force_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub stage: Stage,
    pub consent_given: bool,
    pub tech_stack: Vec<String>,
    pub question_count: usize,
    pub answered: usize,
    pub skipped: usize,
    pub current_question: Option<QuestionSpec>,
    pub additional_comments: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub generation: Vec<TechnologyReport>,
    pub transcript: Vec<ChatMessage>,
}
