//! Field validators. Pure functions, one per profile field.
//!
//! Each returns the normalized value or a `ValidationFailure` the state
//! machine turns into a corrective re-prompt. Nothing here touches session
//! state.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::questions::models::slug;

/// Upper bound on any single candidate message.
pub const MAX_INPUT_CHARS: usize = 2000;
/// Upper bound on a name, role or location.
pub const MAX_FIELD_CHARS: usize = 120;
pub const MIN_FIELD_CHARS: usize = 2;
pub const MAX_EXPERIENCE_YEARS: f32 = 60.0;
pub const MAX_TECHNOLOGIES: usize = 10;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9\-]+(\.[a-z0-9\-]+)*\.[a-z]{2,}$").unwrap()
});

static LIST_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;|\n]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    Empty,
    TooShort,
    TooLong,
    InvalidEmail,
    InvalidPhone,
    NotANumber,
    OutOfRange,
    TooMany,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{reason}")]
pub struct ValidationFailure {
    pub kind: ValidationErrorKind,
    pub reason: String,
}

impl ValidationFailure {
    fn new(kind: ValidationErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Accepted digit count for phone numbers, excluding the leading `+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhoneRules {
    pub min_digits: usize,
    pub max_digits: usize,
}

impl Default for PhoneRules {
    fn default() -> Self {
        Self {
            min_digits: 6,
            max_digits: 15,
        }
    }
}

/// Trims, drops control characters (newlines and tabs survive) and caps length.
pub fn sanitize_input(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(MAX_INPUT_CHARS)
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn validate_free_text(raw: &str, label: &str) -> Result<String, ValidationFailure> {
    let value = collapse_whitespace(raw);
    if value.is_empty() {
        return Err(ValidationFailure::new(
            ValidationErrorKind::Empty,
            format!("Please provide your {label}."),
        ));
    }
    let len = value.chars().count();
    if len < MIN_FIELD_CHARS {
        return Err(ValidationFailure::new(
            ValidationErrorKind::TooShort,
            format!("Your {label} should be at least {MIN_FIELD_CHARS} characters."),
        ));
    }
    if len > MAX_FIELD_CHARS {
        return Err(ValidationFailure::new(
            ValidationErrorKind::TooLong,
            format!("Your {label} should be at most {MAX_FIELD_CHARS} characters."),
        ));
    }
    Ok(value)
}

pub fn validate_name(raw: &str) -> Result<String, ValidationFailure> {
    validate_free_text(raw, "full name")
}

pub fn validate_location(raw: &str) -> Result<String, ValidationFailure> {
    validate_free_text(raw, "current location")
}

/// Validates `local@domain.tld`, lowercasing and stripping trailing `,` / `.`.
///
/// Idempotent: an already-normalized address comes back unchanged.
pub fn validate_email(raw: &str) -> Result<String, ValidationFailure> {
    let value = raw
        .trim()
        .trim_end_matches([',', '.', ' '])
        .to_lowercase();
    if value.is_empty() {
        return Err(ValidationFailure::new(
            ValidationErrorKind::Empty,
            "Please provide your email address.",
        ));
    }
    if EMAIL_PATTERN.is_match(&value) {
        return Ok(value);
    }
    let reason = if value.contains('@') {
        "That looks almost like an email. Please check the spelling and domain (e.g., name@example.com)."
    } else {
        "That doesn't look like a valid email address. Please try again (e.g., name@example.com)."
    };
    Err(ValidationFailure::new(
        ValidationErrorKind::InvalidEmail,
        reason,
    ))
}

/// Strips separators (spaces, dashes, dots, parentheses) and keeps an
/// optional leading `+`. Any other character rejects the number.
pub fn validate_phone(raw: &str, rules: PhoneRules) -> Result<String, ValidationFailure> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationFailure::new(
            ValidationErrorKind::Empty,
            "Please provide your phone number.",
        ));
    }

    let (prefix, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => {
                return Err(ValidationFailure::new(
                    ValidationErrorKind::InvalidPhone,
                    "Please provide a valid phone number with country code if possible (e.g., +1234567890).",
                ))
            }
        }
    }

    if digits.len() < rules.min_digits || digits.len() > rules.max_digits {
        return Err(ValidationFailure::new(
            ValidationErrorKind::InvalidPhone,
            format!(
                "A phone number should have between {} and {} digits.",
                rules.min_digits, rules.max_digits
            ),
        ));
    }

    Ok(format!("{prefix}{digits}"))
}

/// Parses years of experience; `,` is accepted as a decimal separator.
pub fn validate_experience(raw: &str) -> Result<f32, ValidationFailure> {
    let value = raw.trim().replace(',', ".");
    let value = value
        .strip_suffix("years")
        .or_else(|| value.strip_suffix("year"))
        .unwrap_or(&value)
        .trim();

    let years: f32 = value.parse().map_err(|_| {
        ValidationFailure::new(
            ValidationErrorKind::NotANumber,
            "Please provide years of experience as a number (e.g., 3.5).",
        )
    })?;

    if !years.is_finite() || !(0.0..=MAX_EXPERIENCE_YEARS).contains(&years) {
        return Err(ValidationFailure::new(
            ValidationErrorKind::OutOfRange,
            format!("Years of experience should be between 0 and {MAX_EXPERIENCE_YEARS}."),
        ));
    }

    Ok(years)
}

/// Splits a delimited list, trimming and collapsing whitespace in each item
/// and dropping empties and case-insensitive duplicates. First spelling wins.
pub fn split_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    LIST_SEPARATOR
        .split(raw)
        .map(collapse_whitespace)
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

pub fn validate_roles(raw: &str) -> Result<Vec<String>, ValidationFailure> {
    let roles = split_list(raw);
    if roles.is_empty() {
        return Err(ValidationFailure::new(
            ValidationErrorKind::Empty,
            "Please provide the position(s) you're interested in.",
        ));
    }
    if let Some(role) = roles.iter().find(|r| r.chars().count() > MAX_FIELD_CHARS) {
        return Err(ValidationFailure::new(
            ValidationErrorKind::TooLong,
            format!(
                "Position '{}…' is too long.",
                role.chars().take(20).collect::<String>()
            ),
        ));
    }
    Ok(roles)
}

/// Technologies are also merged when they share a question-id slug
/// ("Node.js" and "Node JS"), keeping the first spelling.
pub fn validate_tech_stack(raw: &str) -> Result<Vec<String>, ValidationFailure> {
    let mut slugs = HashSet::new();
    let stack: Vec<String> = split_list(raw)
        .into_iter()
        .filter(|tech| slugs.insert(slug(tech)))
        .collect();
    if stack.is_empty() {
        return Err(ValidationFailure::new(
            ValidationErrorKind::Empty,
            "Please list at least one technology (comma-separated).",
        ));
    }
    if stack.len() > MAX_TECHNOLOGIES {
        return Err(ValidationFailure::new(
            ValidationErrorKind::TooMany,
            format!("Please list at most {MAX_TECHNOLOGIES} technologies you know best."),
        ));
    }
    if let Some(tech) = stack.iter().find(|t| t.chars().count() > MAX_FIELD_CHARS) {
        return Err(ValidationFailure::new(
            ValidationErrorKind::TooLong,
            format!(
                "Technology '{}…' is too long.",
                tech.chars().take(20).collect::<String>()
            ),
        ));
    }
    Ok(stack)
}
