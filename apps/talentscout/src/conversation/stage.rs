use std::fmt;

use serde::{Deserialize, Serialize};

/// Basic-info fields, collected one per turn in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasicField {
    FullName,
    Email,
    Phone,
    YearsExperience,
    DesiredRoles,
    Location,
}

impl BasicField {
    /// The field after this one, or `None` after `Location`.
    pub fn next(self) -> Option<BasicField> {
        match self {
            BasicField::FullName => Some(BasicField::Email),
            BasicField::Email => Some(BasicField::Phone),
            BasicField::Phone => Some(BasicField::YearsExperience),
            BasicField::YearsExperience => Some(BasicField::DesiredRoles),
            BasicField::DesiredRoles => Some(BasicField::Location),
            BasicField::Location => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "stage", content = "field", rename_all = "snake_case")]
pub enum Stage {
    AwaitingConsent,
    CollectingBasicInfo(BasicField),
    CollectingTechStack,
    GeneratingQuestions,
    AskingQuestions,
    ReviewAndSubmit,
    Completed,
    Aborted,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Aborted)
    }

    /// The transition table. Every non-terminal stage may abort; terminal
    /// stages go nowhere.
    pub fn can_transition_to(self, next: Stage) -> bool {
        use Stage::*;

        if next == Aborted {
            return !self.is_terminal();
        }

        match (self, next) {
            (AwaitingConsent, CollectingBasicInfo(BasicField::FullName)) => true,
            (CollectingBasicInfo(from), CollectingBasicInfo(to)) => from.next() == Some(to),
            (CollectingBasicInfo(BasicField::Location), CollectingTechStack) => true,
            (CollectingTechStack, GeneratingQuestions) => true,
            (GeneratingQuestions, AskingQuestions) => true,
            // nothing to ask when every technology was skipped
            (GeneratingQuestions, ReviewAndSubmit) => true,
            // retry of a partially generated question set
            (AskingQuestions, GeneratingQuestions) => true,
            (AskingQuestions, ReviewAndSubmit) => true,
            (ReviewAndSubmit, Completed) => true,
            (AwaitingConsent, _)
            | (CollectingBasicInfo(_), _)
            | (CollectingTechStack, _)
            | (GeneratingQuestions, _)
            | (AskingQuestions, _)
            | (ReviewAndSubmit, _)
            | (Completed, _)
            | (Aborted, _) => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::AwaitingConsent => "awaiting_consent",
            Stage::CollectingBasicInfo(_) => "collecting_basic_info",
            Stage::CollectingTechStack => "collecting_tech_stack",
            Stage::GeneratingQuestions => "generating_questions",
            Stage::AskingQuestions => "asking_questions",
            Stage::ReviewAndSubmit => "review_and_submit",
            Stage::Completed => "completed",
            Stage::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::CollectingBasicInfo(field) => write!(f, "{}({:?})", self.name(), field),
            _ => f.write_str(self.name()),
        }
    }
}
