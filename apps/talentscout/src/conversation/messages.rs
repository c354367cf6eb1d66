// Assistant-side text. Kept apart from the state machine so wording can change
// without touching transitions.

use crate::conversation::stage::BasicField;
use crate::profile::masking::{mask_email, mask_phone};
use crate::profile::models::CandidateProfile;
use crate::questions::generator::TechnologyReport;
use crate::questions::models::QuestionSpec;

pub const GREETING: &str = "Hello! I'm the TalentScout screening assistant. I'll collect a few \
details for an initial screening and then ask some technical questions based on the \
technologies you work with. Type 'exit' at any time to end the conversation.";

pub const CONSENT_PROMPT: &str = "Before we begin, please confirm that you consent to your \
details being processed strictly for screening purposes. Reply 'I agree' to continue.";

pub const CONSENT_REPROMPT: &str =
    "I need your consent before collecting any details. Reply 'I agree' to continue or 'no' to stop.";

pub const TECH_STACK_PROMPT: &str =
    "What are your main technical skills and technologies? (comma-separated, e.g. Python, Django, SQL)";

pub const EMPTY_ANSWER_REPROMPT: &str =
    "Please type an answer, or reply 'skip' to move on to the next question.";

pub const NO_QUESTIONS: &str = "I couldn't prepare technical questions for the technologies \
you listed, so we'll go straight to the review.";

pub const REVIEW_PROMPT: &str = "Reply 'confirm' to submit your profile. Anything else you type \
will be added as an additional comment.";

pub const COMMENT_NOTED: &str =
    "Thanks, I've added that to your comments. Reply 'confirm' when you're ready to submit.";

pub const COMPLETED: &str = "Thank you for completing the TalentScout screening! Your details \
and answers have been recorded. A recruiter will review your profile and contact you if \
there's a good fit.";

pub const ABORTED: &str =
    "Thank you for your time. The conversation has ended and nothing further will be collected.";

pub const CONSENT_REFUSED: &str = "Understood. Without consent I can't continue the screening. \
Thank you for your time.";

pub fn field_prompt(field: BasicField) -> &'static str {
    match field {
        BasicField::FullName => "What's your full name?",
        BasicField::Email => "What's your email address?",
        BasicField::Phone => "What's your phone number?",
        BasicField::YearsExperience => "How many years of professional experience do you have?",
        BasicField::DesiredRoles => {
            "What position(s) are you interested in? (comma-separated if multiple)"
        }
        BasicField::Location => "What's your current location?",
    }
}

pub fn question_prompt(question: &QuestionSpec, number: usize, total: usize) -> String {
    format!(
        "Question {number} of {total} ({}, {}):\n{}",
        question.technology, question.difficulty, question.text
    )
}

pub fn generation_notice(tech_stack: &[String]) -> String {
    format!(
        "Thanks! Preparing technical questions for: {}.",
        tech_stack.join(", ")
    )
}

/// Tells the candidate which technologies had to be left out.
pub fn gap_notice<'a>(gaps: impl IntoIterator<Item = &'a TechnologyReport>) -> Option<String> {
    let names: Vec<&str> = gaps.into_iter().map(|r| r.technology.as_str()).collect();
    if names.is_empty() {
        return None;
    }
    Some(format!(
        "I don't have questions for {} yet, so those are skipped.",
        names.join(", ")
    ))
}

/// Review summary with contact details masked. Scores are never included.
pub fn review_summary(profile: &CandidateProfile, answered: usize, skipped: usize) -> String {
    let join = |items: &[String]| {
        if items.is_empty() {
            "-".to_string()
        } else {
            items.join(", ")
        }
    };

    format!(
        "Here's a summary of your details:\n\
         - Name: {}\n\
         - Email: {}\n\
         - Phone: {}\n\
         - Experience: {} years\n\
         - Position(s): {}\n\
         - Location: {}\n\
         - Tech stack: {}\n\
         - Technical questions: {answered} answered, {skipped} skipped",
        profile.full_name().unwrap_or("-"),
        profile.email().map(mask_email).unwrap_or_else(|| "-".to_string()),
        profile.phone().map(mask_phone).unwrap_or_else(|| "-".to_string()),
        profile
            .years_experience()
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string()),
        join(profile.desired_roles()),
        profile.location().unwrap_or("-"),
        join(profile.tech_stack()),
    )
}
