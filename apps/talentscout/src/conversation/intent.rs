//! Intent checks on raw candidate text: exit, consent, confirmation, skip.
//!
//! All matching is on the whole trimmed, lowercased message with trailing
//! punctuation removed, so "I'm a backend engineer" never reads as "end".

const EXIT_PHRASES: &[&str] = &[
    "exit",
    "quit",
    "stop",
    "cancel",
    "bye",
    "goodbye",
    "end interview",
    "end chat",
];

const AFFIRMATIVE: &[&str] = &[
    "yes",
    "y",
    "yeah",
    "yep",
    "sure",
    "ok",
    "okay",
    "i agree",
    "agree",
    "i accept",
    "accept",
    "i consent",
    "consent",
    "proceed",
];

const NEGATIVE: &[&str] = &[
    "no",
    "n",
    "nope",
    "i disagree",
    "disagree",
    "i do not agree",
    "i don't agree",
    "decline",
    "i decline",
    "i do not consent",
    "i don't consent",
];

const CONFIRMATIONS: &[&str] = &["confirm", "submit", "yes", "yes, submit", "confirm and submit"];

const SKIP_PHRASES: &[&str] = &["skip", "pass", "skip question", "i don't know", "i do not know"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentReply {
    Granted,
    Refused,
    Unclear,
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(&['.', '!', '?', ','][..])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .replace('’', "'")
}

fn matches_any(raw: &str, phrases: &[&str]) -> bool {
    let text = normalize(raw);
    phrases.iter().any(|p| *p == text)
}

/// True when the candidate wants to end the conversation.
pub fn detect_exit(raw: &str) -> bool {
    matches_any(raw, EXIT_PHRASES)
}

pub fn parse_consent(raw: &str) -> ConsentReply {
    if matches_any(raw, NEGATIVE) {
        ConsentReply::Refused
    } else if matches_any(raw, AFFIRMATIVE) {
        ConsentReply::Granted
    } else {
        ConsentReply::Unclear
    }
}

pub fn is_confirmation(raw: &str) -> bool {
    matches_any(raw, CONFIRMATIONS)
}

pub fn is_skip(raw: &str) -> bool {
    matches_any(raw, SKIP_PHRASES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_phrases_case_insensitive_and_trimmed() {
        for text in ["quit", "  QUIT  ", "Exit!", "stop.", "Cancel", "Goodbye", "end interview"] {
            assert!(detect_exit(text), "{text}");
        }
    }

    #[test]
    fn test_exit_does_not_fire_inside_sentences() {
        for text in [
            "Backend Engineer",
            "I stopped using Java in 2019",
            "Python, Django",
            "quite",
            "",
        ] {
            assert!(!detect_exit(text), "{text}");
        }
    }

    #[test]
    fn test_consent_affirmative() {
        for text in ["yes", "Yes.", "I agree", "i  AGREE", "ok", "proceed"] {
            assert_eq!(parse_consent(text), ConsentReply::Granted, "{text}");
        }
    }

    #[test]
    fn test_consent_negative_wins_over_agree() {
        assert_eq!(parse_consent("I do not agree"), ConsentReply::Refused);
        assert_eq!(parse_consent("I don’t agree"), ConsentReply::Refused);
        assert_eq!(parse_consent("no"), ConsentReply::Refused);
    }

    #[test]
    fn test_consent_unclear() {
        assert_eq!(parse_consent("Jane Doe"), ConsentReply::Unclear);
        assert_eq!(parse_consent("maybe later"), ConsentReply::Unclear);
    }

    #[test]
    fn test_confirmation_and_skip() {
        assert!(is_confirmation("Confirm"));
        assert!(is_confirmation("submit!"));
        assert!(!is_confirmation("please wait"));
        assert!(is_skip("Skip"));
        assert!(!is_skip("skipping lunch is bad"));
    }
}
