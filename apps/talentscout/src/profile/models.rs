use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::questions::models::QuestionSpec;
use crate::questions::scoring::AnswerScore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("consent must be given before profile data is recorded")]
    ConsentRequired,

    #[error("profile was already submitted at {0}")]
    AlreadySubmitted(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Answer {
    Text(String),
    Skipped,
}

/// Candidate record accumulated over one conversation.
///
/// Consent gates every setter and cannot be withdrawn once given; the
/// submission timestamp can be set only once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateProfile {
    consent_given: bool,
    full_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    years_experience: Option<f32>,
    desired_roles: Vec<String>,
    location: Option<String>,
    tech_stack: Vec<String>,
    answers: BTreeMap<String, Answer>,
    answer_scores: BTreeMap<String, AnswerScore>,
    overall_score: Option<f32>,
    additional_comments: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
}

impl CandidateProfile {
    pub fn consent_given(&self) -> bool {
        self.consent_given
    }

    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn years_experience(&self) -> Option<f32> {
        self.years_experience
    }

    pub fn desired_roles(&self) -> &[String] {
        &self.desired_roles
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn tech_stack(&self) -> &[String] {
        &self.tech_stack
    }

    pub fn answers(&self) -> &BTreeMap<String, Answer> {
        &self.answers
    }

    pub fn answer_scores(&self) -> &BTreeMap<String, AnswerScore> {
        &self.answer_scores
    }

    #[cfg(test)]
    pub fn overall_score(&self) -> Option<f32> {
        self.overall_score
    }

    pub fn additional_comments(&self) -> Option<&str> {
        self.additional_comments.as_deref()
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Idempotent. There is no operation that withdraws consent.
    pub fn grant_consent(&mut self) {
        self.consent_given = true;
    }

    fn require_consent(&self) -> Result<(), ProfileError> {
        if self.consent_given {
            Ok(())
        } else {
            Err(ProfileError::ConsentRequired)
        }
    }

    pub fn set_full_name(&mut self, value: String) -> Result<(), ProfileError> {
        self.require_consent()?;
        self.full_name = Some(value);
        Ok(())
    }

    pub fn set_email(&mut self, value: String) -> Result<(), ProfileError> {
        self.require_consent()?;
        self.email = Some(value);
        Ok(())
    }

    pub fn set_phone(&mut self, value: String) -> Result<(), ProfileError> {
        self.require_consent()?;
        self.phone = Some(value);
        Ok(())
    }

    pub fn set_years_experience(&mut self, value: f32) -> Result<(), ProfileError> {
        self.require_consent()?;
        self.years_experience = Some(value);
        Ok(())
    }

    pub fn set_desired_roles(&mut self, value: Vec<String>) -> Result<(), ProfileError> {
        self.require_consent()?;
        self.desired_roles = value;
        Ok(())
    }

    pub fn set_location(&mut self, value: String) -> Result<(), ProfileError> {
        self.require_consent()?;
        self.location = Some(value);
        Ok(())
    }

    pub fn set_tech_stack(&mut self, value: Vec<String>) -> Result<(), ProfileError> {
        self.require_consent()?;
        self.tech_stack = value;
        Ok(())
    }

    pub fn record_answer(&mut self, question_id: String, answer: Answer) -> Result<(), ProfileError> {
        self.require_consent()?;
        self.answers.insert(question_id, answer);
        Ok(())
    }

    pub fn record_score(&mut self, question_id: String, score: AnswerScore) -> Result<(), ProfileError> {
        self.require_consent()?;
        self.answer_scores.insert(question_id, score);
        Ok(())
    }

    pub fn set_overall_score(&mut self, value: Option<f32>) {
        self.overall_score = value;
    }

    /// Appends to any comments already given, one per line.
    pub fn append_comment(&mut self, comment: &str) -> Result<(), ProfileError> {
        self.require_consent()?;
        match &mut self.additional_comments {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(comment);
            }
            None => self.additional_comments = Some(comment.to_string()),
        }
        Ok(())
    }

    pub fn mark_submitted(&mut self, at: DateTime<Utc>) -> Result<(), ProfileError> {
        self.require_consent()?;
        if let Some(previous) = self.submitted_at {
            return Err(ProfileError::AlreadySubmitted(previous));
        }
        self.submitted_at = Some(at);
        Ok(())
    }

    pub fn basic_info_complete(&self) -> bool {
        self.full_name.is_some()
            && self.email.is_some()
            && self.phone.is_some()
            && self.years_experience.is_some()
            && !self.desired_roles.is_empty()
            && self.location.is_some()
    }

    /// Consent given, identity complete, non-empty stack, every question
    /// answered or explicitly skipped.
    pub fn is_complete(&self, questions: &[QuestionSpec]) -> bool {
        self.consent_given
            && self.basic_info_complete()
            && !self.tech_stack.is_empty()
            && questions.iter().all(|q| self.answers.contains_key(&q.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::models::{Difficulty, QuestionSource};

    fn consented() -> CandidateProfile {
        let mut p = CandidateProfile::default();
        p.grant_consent();
        p
    }

    #[test]
    fn test_setters_rejected_without_consent() {
        let mut p = CandidateProfile::default();
        assert_eq!(
            p.set_full_name("Jane Doe".to_string()),
            Err(ProfileError::ConsentRequired)
        );
        assert_eq!(
            p.set_email("jane@x.com".to_string()),
            Err(ProfileError::ConsentRequired)
        );
        assert!(p.full_name().is_none());
        assert!(p.email().is_none());
    }

    #[test]
    fn test_consent_is_sticky() {
        let mut p = consented();
        p.grant_consent();
        assert!(p.consent_given());
    }

    #[test]
    fn test_submitted_at_set_once() {
        let mut p = consented();
        let first = Utc::now();
        p.mark_submitted(first).unwrap();
        assert_eq!(
            p.mark_submitted(Utc::now()),
            Err(ProfileError::AlreadySubmitted(first))
        );
        assert_eq!(p.submitted_at(), Some(first));
    }

    #[test]
    fn test_comments_append() {
        let mut p = consented();
        p.append_comment("Open to relocation").unwrap();
        p.append_comment("Available in May").unwrap();
        assert_eq!(
            p.additional_comments(),
            Some("Open to relocation\nAvailable in May")
        );
    }

    #[test]
    fn test_is_complete_requires_every_answer() {
        let mut p = consented();
        p.set_full_name("Jane Doe".to_string()).unwrap();
        p.set_email("jane@x.com".to_string()).unwrap();
        p.set_phone("+15551234567".to_string()).unwrap();
        p.set_years_experience(3.0).unwrap();
        p.set_desired_roles(vec!["Backend Engineer".to_string()])
            .unwrap();
        p.set_location("Remote".to_string()).unwrap();
        p.set_tech_stack(vec!["Rust".to_string()]).unwrap();

        let questions: Vec<_> = (0..2)
            .map(|ordinal| QuestionSpec {
                technology: "Rust".to_string(),
                ordinal,
                difficulty: Difficulty::Easy,
                text: format!("Question {ordinal}"),
                source: QuestionSource::Fallback,
            })
            .collect();

        assert!(!p.is_complete(&questions));
        p.record_answer(questions[0].id(), Answer::Text("Ownership is...".to_string()))
            .unwrap();
        assert!(!p.is_complete(&questions));
        p.record_answer(questions[1].id(), Answer::Skipped).unwrap();
        assert!(p.is_complete(&questions));
    }

    #[test]
    fn test_answer_serializes_with_kind_tag() {
        let json = serde_json::to_value(Answer::Text("hi".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "text", "text": "hi"}));
        let skipped = serde_json::to_value(Answer::Skipped).unwrap();
        assert_eq!(skipped, serde_json::json!({"kind": "skipped"}));
    }
}
