//! Conversation state machine. Drives one candidate session from consent to
//! submission.
//!
//! Every turn runs the exit check first, then dispatches on the current
//! `Stage`. Stage changes go through `transition`, which enforces
//! `Stage::can_transition_to`. Question generation runs inside the turn that
//! declares the tech stack and can be interrupted through the session's
//! cancellation token.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::conversation::intent::{detect_exit, is_confirmation, is_skip, parse_consent, ConsentReply};
use crate::conversation::messages;
use crate::conversation::session::{ConversationSession, Role};
use crate::conversation::stage::{BasicField, Stage};
use crate::profile::models::{Answer, CandidateProfile, ProfileError};
use crate::questions::generator::QuestionGenerator;
use crate::questions::scoring::{overall_score, AnswerScorer};
use crate::storage::ProfileSink;
use crate::validation::{
    sanitize_input, validate_email, validate_experience, validate_location, validate_name,
    validate_phone, validate_roles, validate_tech_stack, PhoneRules, ValidationFailure,
};

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("cannot {action} while the conversation is {from}")]
    InvalidStateTransition { from: Stage, action: &'static str },

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("profile is missing required details or answers and cannot be submitted")]
    IncompleteProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Started,
    Advanced,
    Reprompted,
    /// Review-stage comment recorded; stage unchanged.
    Recorded,
    Completed,
    Aborted,
}

/// Everything a UI needs to render one assistant turn.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    #[serde(flatten)]
    pub stage: Stage,
    pub outcome: TurnOutcome,
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationFailure>,
    /// Operator-facing only.
    #[serde(skip)]
    pub storage_failure: Option<String>,
}

impl Reply {
    /// Farewell for a session some earlier request already aborted.
    pub fn aborted() -> Self {
        Self {
            stage: Stage::Aborted,
            outcome: TurnOutcome::Aborted,
            messages: vec![messages::ABORTED.to_string()],
            validation: None,
            storage_failure: None,
        }
    }
}

#[derive(Debug, Error)]
enum FieldError {
    #[error(transparent)]
    Invalid(#[from] ValidationFailure),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

pub struct ConversationStateMachine {
    generator: QuestionGenerator,
    scorer: Arc<dyn AnswerScorer>,
    sink: Arc<dyn ProfileSink>,
    phone_rules: PhoneRules,
}

impl ConversationStateMachine {
    pub fn new(
        generator: QuestionGenerator,
        scorer: Arc<dyn AnswerScorer>,
        sink: Arc<dyn ProfileSink>,
        phone_rules: PhoneRules,
    ) -> Self {
        Self {
            generator,
            scorer,
            sink,
            phone_rules,
        }
    }

    /// Greeting and consent prompt for a fresh session.
    pub fn start(&self, session: &mut ConversationSession) -> Result<Reply, ConversationError> {
        if session.stage != Stage::AwaitingConsent || !session.transcript.is_empty() {
            return Err(ConversationError::InvalidStateTransition {
                from: session.stage,
                action: "start",
            });
        }
        info!("Session {} started", session.id);
        Ok(self.respond(
            session,
            TurnOutcome::Started,
            vec![messages::GREETING.to_string(), messages::CONSENT_PROMPT.to_string()],
        ))
    }

    pub async fn handle_input(
        &self,
        session: &mut ConversationSession,
        raw: &str,
    ) -> Result<Reply, ConversationError> {
        if session.is_terminal() {
            return Err(ConversationError::InvalidStateTransition {
                from: session.stage,
                action: "accept input",
            });
        }

        let text = sanitize_input(raw);
        session.push_message(Role::Candidate, text.clone());

        if detect_exit(&text) {
            info!("Session {} exit requested during {}", session.id, session.stage);
            return self.abort_with(session, messages::ABORTED);
        }

        match session.stage {
            Stage::AwaitingConsent => self.on_consent(session, &text),
            Stage::CollectingBasicInfo(field) => self.on_basic_field(session, field, &text),
            Stage::CollectingTechStack => self.on_tech_stack(session, &text).await,
            Stage::GeneratingQuestions => self.generate_pending(session, Vec::new()).await,
            Stage::AskingQuestions => self.on_answer(session, &text).await,
            Stage::ReviewAndSubmit => self.on_review(session, &text).await,
            Stage::Completed | Stage::Aborted => Err(ConversationError::InvalidStateTransition {
                from: session.stage,
                action: "accept input",
            }),
        }
    }

    /// Generates questions for technologies that have none yet. Questions
    /// already asked or answered are kept as they are.
    pub async fn retry_generation(
        &self,
        session: &mut ConversationSession,
    ) -> Result<Reply, ConversationError> {
        match session.stage {
            Stage::GeneratingQuestions => {}
            Stage::AskingQuestions => self.transition(session, Stage::GeneratingQuestions)?,
            from => {
                return Err(ConversationError::InvalidStateTransition {
                    from,
                    action: "retry question generation",
                })
            }
        }
        self.generate_pending(session, Vec::new()).await
    }

    /// Cancel from the hosting environment.
    pub fn abort(&self, session: &mut ConversationSession) -> Result<Reply, ConversationError> {
        if session.is_terminal() {
            return Err(ConversationError::InvalidStateTransition {
                from: session.stage,
                action: "abort",
            });
        }
        self.abort_with(session, messages::ABORTED)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Stage handlers
    // ────────────────────────────────────────────────────────────────────────

    fn on_consent(
        &self,
        session: &mut ConversationSession,
        text: &str,
    ) -> Result<Reply, ConversationError> {
        match parse_consent(text) {
            ConsentReply::Granted => {
                session.profile.grant_consent();
                let first = BasicField::FullName;
                self.transition(session, Stage::CollectingBasicInfo(first))?;
                Ok(self.respond(
                    session,
                    TurnOutcome::Advanced,
                    vec![
                        "Thank you!".to_string(),
                        messages::field_prompt(first).to_string(),
                    ],
                ))
            }
            ConsentReply::Refused => self.abort_with(session, messages::CONSENT_REFUSED),
            ConsentReply::Unclear => Ok(self.respond(
                session,
                TurnOutcome::Reprompted,
                vec![messages::CONSENT_REPROMPT.to_string()],
            )),
        }
    }

    fn on_basic_field(
        &self,
        session: &mut ConversationSession,
        field: BasicField,
        text: &str,
    ) -> Result<Reply, ConversationError> {
        match apply_field(&mut session.profile, field, text, self.phone_rules) {
            Ok(()) => {}
            Err(FieldError::Invalid(failure)) => {
                let mut reply = self.respond(
                    session,
                    TurnOutcome::Reprompted,
                    vec![
                        failure.reason.clone(),
                        messages::field_prompt(field).to_string(),
                    ],
                );
                reply.validation = Some(failure);
                return Ok(reply);
            }
            Err(FieldError::Profile(e)) => return Err(e.into()),
        }

        let (next, prompt) = match field.next() {
            Some(next) => (Stage::CollectingBasicInfo(next), messages::field_prompt(next)),
            None => (Stage::CollectingTechStack, messages::TECH_STACK_PROMPT),
        };
        self.transition(session, next)?;
        Ok(self.respond(session, TurnOutcome::Advanced, vec![prompt.to_string()]))
    }

    async fn on_tech_stack(
        &self,
        session: &mut ConversationSession,
        text: &str,
    ) -> Result<Reply, ConversationError> {
        let stack = match validate_tech_stack(text) {
            Ok(stack) => stack,
            Err(failure) => {
                let mut reply = self.respond(
                    session,
                    TurnOutcome::Reprompted,
                    vec![
                        failure.reason.clone(),
                        messages::TECH_STACK_PROMPT.to_string(),
                    ],
                );
                reply.validation = Some(failure);
                return Ok(reply);
            }
        };

        let notice = messages::generation_notice(&stack);
        session.profile.set_tech_stack(stack)?;
        self.transition(session, Stage::GeneratingQuestions)?;
        self.generate_pending(session, vec![notice]).await
    }

    async fn on_answer(
        &self,
        session: &mut ConversationSession,
        text: &str,
    ) -> Result<Reply, ConversationError> {
        let Some(question) = session.current_question().cloned() else {
            return self.enter_review(session, Vec::new());
        };

        if text.is_empty() {
            let prompt = self.current_question_prompt(session);
            return Ok(self.respond(
                session,
                TurnOutcome::Reprompted,
                vec![messages::EMPTY_ANSWER_REPROMPT.to_string(), prompt],
            ));
        }

        if is_skip(text) {
            session.profile.record_answer(question.id(), Answer::Skipped)?;
        } else {
            let years = session.profile.years_experience().unwrap_or(0.0);
            let cancel = session.cancel.clone();
            let score = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                score = self.scorer.score(&question, text, years) => Some(score),
            };
            let Some(score) = score else {
                info!("Session {} answer scoring cancelled", session.id);
                return self.abort_with(session, messages::ABORTED);
            };
            session.profile.record_score(question.id(), score)?;
            session
                .profile
                .record_answer(question.id(), Answer::Text(text.to_string()))?;
        }
        advance_cursor(session);

        if session.current_question().is_some() {
            let prompt = self.current_question_prompt(session);
            Ok(self.respond(session, TurnOutcome::Advanced, vec![prompt]))
        } else {
            self.enter_review(session, Vec::new())
        }
    }

    async fn on_review(
        &self,
        session: &mut ConversationSession,
        text: &str,
    ) -> Result<Reply, ConversationError> {
        if is_confirmation(text) {
            return self.submit(session).await;
        }
        if text.is_empty() {
            return Ok(self.respond(
                session,
                TurnOutcome::Reprompted,
                vec![messages::REVIEW_PROMPT.to_string()],
            ));
        }
        session.profile.append_comment(text)?;
        Ok(self.respond(
            session,
            TurnOutcome::Recorded,
            vec![messages::COMMENT_NOTED.to_string()],
        ))
    }

    // ────────────────────────────────────────────────────────────────────────
    // Generation, review and submission
    // ────────────────────────────────────────────────────────────────────────

    async fn generate_pending(
        &self,
        session: &mut ConversationSession,
        mut messages_out: Vec<String>,
    ) -> Result<Reply, ConversationError> {
        let pending: Vec<String> = session
            .profile
            .tech_stack()
            .iter()
            .filter(|tech| !session.questions.iter().any(|q| &q.technology == *tech))
            .cloned()
            .collect();

        let cancel = session.cancel.clone();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = self.generator.generate(&pending) => Some(outcome),
        };
        let Some(outcome) = outcome else {
            info!("Session {} question generation cancelled", session.id);
            return self.abort_with(session, messages::ABORTED);
        };

        if let Some(notice) = messages::gap_notice(outcome.gaps()) {
            messages_out.push(notice);
        }
        for report in outcome.reports {
            session.generation.retain(|r| r.technology != report.technology);
            session.generation.push(report);
        }
        session.questions.extend(outcome.questions);

        // Merge in declared technology order; the sort is stable so ordinals
        // within a technology keep their Easy → Hard order.
        let order: Vec<String> = session.profile.tech_stack().to_vec();
        session
            .questions
            .sort_by_key(|q| order.iter().position(|t| *t == q.technology));
        session
            .generation
            .sort_by_key(|r| order.iter().position(|t| *t == r.technology));
        advance_cursor(session);

        if session.current_question().is_none() {
            if session.questions.is_empty() {
                messages_out.push(messages::NO_QUESTIONS.to_string());
            }
            return self.enter_review(session, messages_out);
        }

        self.transition(session, Stage::AskingQuestions)?;
        messages_out.push(self.current_question_prompt(session));
        Ok(self.respond(session, TurnOutcome::Advanced, messages_out))
    }

    fn enter_review(
        &self,
        session: &mut ConversationSession,
        mut messages_out: Vec<String>,
    ) -> Result<Reply, ConversationError> {
        self.transition(session, Stage::ReviewAndSubmit)?;

        let overall = overall_score(session.profile.answer_scores().values());
        session.profile.set_overall_score(overall);

        let (answered, skipped) =
            session
                .profile
                .answers()
                .values()
                .fold((0, 0), |(answered, skipped), a| match a {
                    Answer::Text(_) => (answered + 1, skipped),
                    Answer::Skipped => (answered, skipped + 1),
                });
        messages_out.push(messages::review_summary(&session.profile, answered, skipped));
        messages_out.push(messages::REVIEW_PROMPT.to_string());
        Ok(self.respond(session, TurnOutcome::Advanced, messages_out))
    }

    async fn submit(&self, session: &mut ConversationSession) -> Result<Reply, ConversationError> {
        if !session.profile.is_complete(&session.questions) {
            error!("Session {} reached submission with an incomplete profile", session.id);
            return Err(ConversationError::IncompleteProfile);
        }
        session.profile.mark_submitted(Utc::now())?;
        self.transition(session, Stage::Completed)?;

        let snapshot = session.snapshot();
        let storage_failure = match self.sink.submit(&snapshot).await {
            Ok(()) => None,
            Err(e) => {
                error!("Failed to store profile for session {}: {}", session.id, e);
                Some(e.to_string())
            }
        };

        let mut reply = self.respond(
            session,
            TurnOutcome::Completed,
            vec![messages::COMPLETED.to_string()],
        );
        reply.storage_failure = storage_failure;
        Ok(reply)
    }

    fn abort_with(
        &self,
        session: &mut ConversationSession,
        message: &str,
    ) -> Result<Reply, ConversationError> {
        self.transition(session, Stage::Aborted)?;
        session.cancel.cancel();
        Ok(self.respond(session, TurnOutcome::Aborted, vec![message.to_string()]))
    }

    // ────────────────────────────────────────────────────────────────────────
    // Helpers
    // ────────────────────────────────────────────────────────────────────────

    fn transition(
        &self,
        session: &mut ConversationSession,
        next: Stage,
    ) -> Result<(), ConversationError> {
        if !session.stage.can_transition_to(next) {
            return Err(ConversationError::InvalidStateTransition {
                from: session.stage,
                action: "change stage",
            });
        }
        info!("Session {}: {} -> {}", session.id, session.stage, next);
        session.stage = next;
        Ok(())
    }

    fn respond(
        &self,
        session: &mut ConversationSession,
        outcome: TurnOutcome,
        messages_out: Vec<String>,
    ) -> Reply {
        for message in &messages_out {
            session.push_message(Role::Assistant, message.clone());
        }
        Reply {
            stage: session.stage,
            outcome,
            messages: messages_out,
            validation: None,
            storage_failure: None,
        }
    }

    fn current_question_prompt(&self, session: &ConversationSession) -> String {
        match session.current_question() {
            Some(q) => messages::question_prompt(q, session.next_question + 1, session.questions.len()),
            None => String::new(),
        }
    }
}

/// Points the cursor at the first unanswered question.
fn advance_cursor(session: &mut ConversationSession) {
    let answers = session.profile.answers();
    session.next_question = session
        .questions
        .iter()
        .position(|q| !answers.contains_key(&q.id()))
        .unwrap_or(session.questions.len());
}

fn apply_field(
    profile: &mut CandidateProfile,
    field: BasicField,
    text: &str,
    phone_rules: PhoneRules,
) -> Result<(), FieldError> {
    match field {
        BasicField::FullName => profile.set_full_name(validate_name(text)?)?,
        BasicField::Email => profile.set_email(validate_email(text)?)?,
        BasicField::Phone => profile.set_phone(validate_phone(text, phone_rules)?)?,
        BasicField::YearsExperience => profile.set_years_experience(validate_experience(text)?)?,
        BasicField::DesiredRoles => profile.set_desired_roles(validate_roles(text)?)?,
        BasicField::Location => profile.set_location(validate_location(text)?)?,
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::llm_client::testing::{HangingCompletion, ScriptedCompletion};
    use crate::llm_client::{LlmError, TextCompletion};
    use crate::questions::generator::tests::{echo_llm, prompt_technology, valid_response};
    use crate::questions::generator::TechnologyOutcome;
    use crate::questions::models::{Difficulty, DifficultyMix, QuestionSource};
    use crate::questions::scoring::{HeuristicScorer, LlmAnswerScorer};
    use crate::storage::{ProfileSnapshot, StorageError};
    use crate::validation::ValidationErrorKind;

    #[derive(Default)]
    struct RecordingSink {
        submitted: Mutex<Vec<ProfileSnapshot>>,
    }

    #[async_trait]
    impl ProfileSink for RecordingSink {
        async fn submit(&self, snapshot: &ProfileSnapshot) -> Result<(), StorageError> {
            self.submitted.lock().unwrap().push(snapshot.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ProfileSink for FailingSink {
        async fn submit(&self, _snapshot: &ProfileSnapshot) -> Result<(), StorageError> {
            Err(StorageError::Io {
                path: "/nowhere/candidates.jsonl".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    fn machine_with(
        llm: Arc<dyn TextCompletion>,
        sink: Arc<dyn ProfileSink>,
    ) -> ConversationStateMachine {
        ConversationStateMachine::new(
            QuestionGenerator::new(llm, DifficultyMix::default(), Duration::from_secs(5)),
            Arc::new(HeuristicScorer),
            sink,
            PhoneRules::default(),
        )
    }

    fn machine(llm: impl TextCompletion + 'static) -> ConversationStateMachine {
        machine_with(Arc::new(llm), Arc::new(RecordingSink::default()))
    }

    const BASIC_INFO: [&str; 6] = [
        "Jane Doe",
        "jane@x.com",
        "+15551234567",
        "3",
        "Backend Engineer",
        "Remote",
    ];

    async fn send(m: &ConversationStateMachine, s: &mut ConversationSession, text: &str) -> Reply {
        m.handle_input(s, text).await.unwrap()
    }

    /// Drives a fresh session up to `CollectingTechStack`.
    async fn through_basic_info(m: &ConversationStateMachine) -> ConversationSession {
        let mut s = ConversationSession::new();
        m.start(&mut s).unwrap();
        send(m, &mut s, "yes").await;
        for text in BASIC_INFO {
            send(m, &mut s, text).await;
        }
        assert_eq!(s.stage(), Stage::CollectingTechStack);
        s
    }

    fn levels(s: &ConversationSession, technology: &str) -> Vec<Difficulty> {
        s.questions()
            .iter()
            .filter(|q| q.technology == technology)
            .map(|q| q.difficulty)
            .collect()
    }

    const PATTERN: [Difficulty; 5] = [
        Difficulty::Easy,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Medium,
        Difficulty::Hard,
    ];

    #[tokio::test]
    async fn test_happy_path_reaches_questions_in_declared_order() {
        let m = machine(echo_llm());
        let mut s = through_basic_info(&m).await;

        let reply = send(&m, &mut s, "Python, Django").await;
        assert_eq!(reply.stage, Stage::AskingQuestions);
        assert_eq!(s.questions().len(), 10);
        assert!(s.questions()[..5].iter().all(|q| q.technology == "Python"));
        assert!(s.questions()[5..].iter().all(|q| q.technology == "Django"));
        assert_eq!(levels(&s, "Python"), PATTERN);
        assert_eq!(levels(&s, "Django"), PATTERN);

        let p = s.profile();
        assert_eq!(p.full_name(), Some("Jane Doe"));
        assert_eq!(p.email(), Some("jane@x.com"));
        assert_eq!(p.years_experience(), Some(3.0));
        assert_eq!(p.desired_roles(), ["Backend Engineer".to_string()]);
        assert_eq!(p.tech_stack(), ["Python".to_string(), "Django".to_string()]);
        assert!(reply.messages.last().unwrap().contains("Question 1 of 10"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_llm_timeouts_fall_back_with_same_shape() {
        let m = machine(HangingCompletion);
        let mut s = through_basic_info(&m).await;

        let reply = send(&m, &mut s, "Python, Django").await;
        assert_eq!(reply.stage, Stage::AskingQuestions);
        assert_eq!(s.questions().len(), 10);
        assert_eq!(levels(&s, "Python"), PATTERN);
        assert_eq!(levels(&s, "Django"), PATTERN);
        assert!(s
            .questions()
            .iter()
            .all(|q| q.source == QuestionSource::Fallback));
    }

    #[tokio::test]
    async fn test_quit_during_tech_stack_keeps_collected_info() {
        let llm = Arc::new(echo_llm());
        let m = machine_with(llm.clone(), Arc::new(RecordingSink::default()));
        let mut s = through_basic_info(&m).await;

        let reply = send(&m, &mut s, "quit").await;
        assert_eq!(reply.stage, Stage::Aborted);
        assert_eq!(reply.outcome, TurnOutcome::Aborted);
        assert!(s.questions().is_empty());
        assert_eq!(llm.calls(), 0);
        assert!(s.profile().consent_given());
        assert!(s.profile().basic_info_complete());
    }

    #[tokio::test]
    async fn test_invalid_email_reprompts_same_field() {
        let m = machine(echo_llm());
        let mut s = ConversationSession::new();
        m.start(&mut s).unwrap();
        send(&m, &mut s, "yes").await;
        send(&m, &mut s, "Jane Doe").await;

        let reply = send(&m, &mut s, "not-an-email").await;
        assert_eq!(reply.stage, Stage::CollectingBasicInfo(BasicField::Email));
        assert_eq!(reply.outcome, TurnOutcome::Reprompted);
        assert_eq!(
            reply.validation.map(|v| v.kind),
            Some(ValidationErrorKind::InvalidEmail)
        );
        assert_eq!(s.profile().email(), None);
    }

    #[tokio::test]
    async fn test_exit_from_every_non_terminal_stage() {
        let stages = [
            Stage::AwaitingConsent,
            Stage::CollectingBasicInfo(BasicField::Phone),
            Stage::CollectingTechStack,
            Stage::GeneratingQuestions,
            Stage::AskingQuestions,
            Stage::ReviewAndSubmit,
        ];
        for stage in stages {
            let m = machine(echo_llm());
            let mut s = ConversationSession::new();
            s.force_stage(stage);
            let reply = send(&m, &mut s, "Goodbye!").await;
            assert_eq!(reply.stage, Stage::Aborted, "from {stage}");
            assert!(s.cancellation_token().is_cancelled());
        }
    }

    #[tokio::test]
    async fn test_exit_word_inside_answer_does_not_abort() {
        let m = machine(echo_llm());
        let mut s = ConversationSession::new();
        m.start(&mut s).unwrap();
        send(&m, &mut s, "yes").await;
        for text in &BASIC_INFO[..4] {
            send(&m, &mut s, text).await;
        }
        let reply = send(&m, &mut s, "Backend Engineer, stop-gap contractor").await;
        assert_eq!(reply.stage, Stage::CollectingBasicInfo(BasicField::Location));
    }

    #[tokio::test]
    async fn test_consent_required_before_any_field() {
        let m = machine(echo_llm());
        let mut s = ConversationSession::new();
        m.start(&mut s).unwrap();

        let reply = send(&m, &mut s, "Jane Doe").await;
        assert_eq!(reply.stage, Stage::AwaitingConsent);
        assert_eq!(reply.outcome, TurnOutcome::Reprompted);
        assert!(!s.profile().consent_given());
        assert_eq!(s.profile().full_name(), None);

        let reply = send(&m, &mut s, "I do not agree").await;
        assert_eq!(reply.stage, Stage::Aborted);
        assert!(!s.profile().consent_given());
    }

    #[tokio::test]
    async fn test_basic_field_without_consent_is_rejected() {
        let m = machine(echo_llm());
        let mut s = ConversationSession::new();
        s.force_stage(Stage::CollectingBasicInfo(BasicField::FullName));

        let err = m.handle_input(&mut s, "Jane Doe").await.unwrap_err();
        assert!(matches!(
            err,
            ConversationError::Profile(ProfileError::ConsentRequired)
        ));
        assert_eq!(s.stage(), Stage::CollectingBasicInfo(BasicField::FullName));
        assert_eq!(s.profile().full_name(), None);
        assert!(!s.profile().consent_given());
    }

    #[tokio::test]
    async fn test_submit_rejects_incomplete_profile() {
        let sink = Arc::new(RecordingSink::default());
        let m = machine_with(Arc::new(echo_llm()), sink.clone());
        let mut s = ConversationSession::new();
        s.profile.grant_consent();
        s.profile.set_full_name("Jane Doe".to_string()).unwrap();
        s.force_stage(Stage::ReviewAndSubmit);

        let err = m.handle_input(&mut s, "confirm").await.unwrap_err();
        assert!(matches!(err, ConversationError::IncompleteProfile));
        assert_eq!(s.stage(), Stage::ReviewAndSubmit);
        assert!(s.profile().submitted_at().is_none());
        assert!(sink.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spellings_sharing_an_id_are_asked_once_each() {
        let m = machine(echo_llm());
        let mut s = through_basic_info(&m).await;

        send(&m, &mut s, "Node.js, Node JS").await;
        assert_eq!(s.profile().tech_stack(), ["Node.js".to_string()]);
        assert_eq!(s.questions().len(), 5);

        let mut asked = 0;
        while s.stage() == Stage::AskingQuestions {
            send(&m, &mut s, "An event loop runs callbacks when I/O completes.").await;
            asked += 1;
        }
        assert_eq!(asked, s.questions().len());
        assert_eq!(s.profile().answers().len(), s.questions().len());
        let ids: std::collections::HashSet<_> = s.questions().iter().map(|q| q.id()).collect();
        assert_eq!(ids.len(), s.questions().len());
        assert!(s.profile().is_complete(s.questions()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_scoring_aborts() {
        let m = ConversationStateMachine::new(
            QuestionGenerator::new(
                Arc::new(echo_llm()),
                DifficultyMix::default(),
                Duration::from_secs(5),
            ),
            Arc::new(LlmAnswerScorer::new(
                Arc::new(HangingCompletion),
                Duration::from_secs(600),
            )),
            Arc::new(RecordingSink::default()),
            PhoneRules::default(),
        );
        let mut s = through_basic_info(&m).await;
        send(&m, &mut s, "Rust").await;
        assert_eq!(s.stage(), Stage::AskingQuestions);

        let token = s.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let reply = send(&m, &mut s, "Ownership gives each value a single owner.").await;
        assert_eq!(reply.stage, Stage::Aborted);
        assert!(s.profile().answers().is_empty());
        assert!(s.profile().answer_scores().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_session_rejects_input() {
        let m = machine(echo_llm());
        let mut s = ConversationSession::new();
        m.start(&mut s).unwrap();
        send(&m, &mut s, "exit").await;

        let err = m.handle_input(&mut s, "hello").await.unwrap_err();
        assert!(matches!(
            err,
            ConversationError::InvalidStateTransition {
                from: Stage::Aborted,
                ..
            }
        ));
        assert!(m.abort(&mut s).is_err());
    }

    #[tokio::test]
    async fn test_answers_skips_and_review() {
        let m = machine(echo_llm());
        let mut s = through_basic_info(&m).await;
        send(&m, &mut s, "Rust").await;
        assert_eq!(s.questions().len(), 5);

        let reply = send(&m, &mut s, "").await;
        assert_eq!(reply.outcome, TurnOutcome::Reprompted);
        assert!(s.profile().answers().is_empty());

        send(&m, &mut s, "skip").await;
        for _ in 0..3 {
            send(
                &m,
                &mut s,
                "Ownership moves values; borrowing lends references without moving.",
            )
            .await;
        }
        let reply = send(&m, &mut s, "idk").await;
        assert_eq!(reply.stage, Stage::ReviewAndSubmit);

        let first = s.questions()[0].id();
        assert_eq!(s.profile().answers()[&first], Answer::Skipped);
        assert!(!s.profile().answer_scores().contains_key(&first));
        assert_eq!(s.profile().answer_scores().len(), 4);
        assert!(s.profile().overall_score().is_some());
        assert!(s.profile().is_complete(s.questions()));

        let summary = reply.messages.join("\n");
        assert!(summary.contains("j**e@x.com"));
        assert!(summary.contains("4 answered, 1 skipped"));
    }

    #[tokio::test]
    async fn test_review_comments_then_submit_once() {
        let sink = Arc::new(RecordingSink::default());
        let m = machine_with(Arc::new(echo_llm()), sink.clone());
        let mut s = through_basic_info(&m).await;
        send(&m, &mut s, "Rust").await;
        for _ in 0..5 {
            send(&m, &mut s, "skip").await;
        }
        assert_eq!(s.stage(), Stage::ReviewAndSubmit);

        let reply = send(&m, &mut s, "Open to relocation").await;
        assert_eq!(reply.outcome, TurnOutcome::Recorded);
        assert_eq!(reply.stage, Stage::ReviewAndSubmit);
        assert_eq!(s.profile().additional_comments(), Some("Open to relocation"));

        let reply = send(&m, &mut s, "confirm").await;
        assert_eq!(reply.stage, Stage::Completed);
        assert!(reply.storage_failure.is_none());
        assert!(s.profile().submitted_at().is_some());
        assert!(m.handle_input(&mut s, "confirm").await.is_err());

        let submitted = sink.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].session_id, s.id());
        assert_eq!(submitted[0].questions.len(), 5);
        assert_eq!(
            submitted[0].profile.additional_comments(),
            Some("Open to relocation")
        );
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_fatal() {
        let m = machine_with(Arc::new(echo_llm()), Arc::new(FailingSink));
        let mut s = through_basic_info(&m).await;
        send(&m, &mut s, "Rust").await;
        for _ in 0..5 {
            send(&m, &mut s, "skip").await;
        }
        let reply = send(&m, &mut s, "submit").await;
        assert_eq!(reply.stage, Stage::Completed);
        assert_eq!(reply.outcome, TurnOutcome::Completed);
        assert!(reply.storage_failure.is_some());

        let json = serde_json::to_value(&reply).unwrap();
        assert!(json.get("storage_failure").is_none());
    }

    #[tokio::test]
    async fn test_zero_questions_goes_straight_to_review() {
        let m = machine(ScriptedCompletion::unavailable());
        let mut s = through_basic_info(&m).await;

        let reply = send(&m, &mut s, "COBOL").await;
        assert_eq!(reply.stage, Stage::ReviewAndSubmit);
        assert!(s.questions().is_empty());
        assert!(matches!(
            s.generation()[0].outcome,
            TechnologyOutcome::Skipped { .. }
        ));
    }

    #[tokio::test]
    async fn test_retry_generation_is_idempotent() {
        let llm = Arc::new(echo_llm());
        let m = machine_with(llm.clone(), Arc::new(RecordingSink::default()));
        let mut s = through_basic_info(&m).await;
        send(&m, &mut s, "Python, Django").await;
        send(&m, &mut s, "A first answer about Python basics.").await;
        assert_eq!(llm.calls(), 2);

        let reply = m.retry_generation(&mut s).await.unwrap();
        assert_eq!(reply.stage, Stage::AskingQuestions);
        assert_eq!(llm.calls(), 2);
        assert_eq!(s.questions().len(), 10);
        assert_eq!(s.generation().len(), 2);
        assert_eq!(s.current_question().map(|q| q.ordinal), Some(1));
    }

    #[tokio::test]
    async fn test_retry_fills_skipped_technology_only() {
        let available = Arc::new(AtomicBool::new(false));
        let flag = available.clone();
        let llm = Arc::new(ScriptedCompletion::new(move |prompt| {
            if flag.load(Ordering::SeqCst) {
                Ok(valid_response(
                    &prompt_technology(prompt),
                    DifficultyMix::default(),
                ))
            } else {
                Err(LlmError::Unconfigured)
            }
        }));
        let m = machine_with(llm.clone(), Arc::new(RecordingSink::default()));
        let mut s = through_basic_info(&m).await;
        send(&m, &mut s, "COBOL, Rust").await;
        assert_eq!(s.stage(), Stage::AskingQuestions);
        assert_eq!(s.questions().len(), 5);
        send(&m, &mut s, "skip").await;

        available.store(true, Ordering::SeqCst);
        let calls_before = llm.calls();
        m.retry_generation(&mut s).await.unwrap();

        assert_eq!(llm.calls(), calls_before + 1);
        assert_eq!(s.questions().len(), 10);
        assert!(s.questions()[..5].iter().all(|q| q.technology == "COBOL"));
        // The new COBOL questions come first, so the cursor moves back to them.
        assert_eq!(s.current_question().map(|q| q.technology.as_str()), Some("COBOL"));
        assert_eq!(s.generation()[0].technology, "COBOL");
        assert_eq!(s.generation()[0].outcome, TechnologyOutcome::Generated);
        assert!(matches!(
            s.generation()[1].outcome,
            TechnologyOutcome::Fallback { .. }
        ));
    }

    #[tokio::test]
    async fn test_retry_rejected_outside_generation_stages() {
        let m = machine(echo_llm());
        let mut s = ConversationSession::new();
        let err = m.retry_generation(&mut s).await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidStateTransition { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_generation_aborts() {
        let m = ConversationStateMachine::new(
            QuestionGenerator::new(
                Arc::new(HangingCompletion),
                DifficultyMix::default(),
                Duration::from_secs(600),
            ),
            Arc::new(HeuristicScorer),
            Arc::new(RecordingSink::default()),
            PhoneRules::default(),
        );
        let mut s = through_basic_info(&m).await;

        let token = s.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let reply = send(&m, &mut s, "Python, Django").await;
        assert_eq!(reply.stage, Stage::Aborted);
        assert!(s.questions().is_empty());
    }
}
