use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::questions::models::DifficultyMix;
use crate::validation::PhoneRules;

/// Application configuration loaded from environment variables.
/// Every variable has a default; a missing `LLM_API_KEY` leaves the LLM
/// client unconfigured and the fallback bank serves every question.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: Option<String>,
    pub llm_endpoint: String,
    pub llm_model: String,
    pub question_mix: DifficultyMix,
    pub generation_timeout: Duration,
    pub phone_rules: PhoneRules,
    pub enable_llm_scoring: bool,
    pub data_file: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            llm_api_key: None,
            llm_endpoint: DEFAULT_ENDPOINT.to_string(),
            llm_model: DEFAULT_MODEL.to_string(),
            question_mix: DifficultyMix::default(),
            generation_timeout: Duration::from_secs(20),
            phone_rules: PhoneRules::default(),
            enable_llm_scoring: false,
            data_file: PathBuf::from("data/candidates.jsonl"),
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        let question_mix = DifficultyMix {
            easy: env_or("QUESTIONS_EASY", defaults.question_mix.easy)?,
            medium: env_or("QUESTIONS_MEDIUM", defaults.question_mix.medium)?,
            hard: env_or("QUESTIONS_HARD", defaults.question_mix.hard)?,
        };
        let phone_rules = PhoneRules {
            min_digits: env_or("PHONE_MIN_DIGITS", defaults.phone_rules.min_digits)?,
            max_digits: env_or("PHONE_MAX_DIGITS", defaults.phone_rules.max_digits)?,
        };
        if phone_rules.min_digits == 0 || phone_rules.min_digits > phone_rules.max_digits {
            bail!(
                "PHONE_MIN_DIGITS ({}) must be between 1 and PHONE_MAX_DIGITS ({})",
                phone_rules.min_digits,
                phone_rules.max_digits
            );
        }

        let timeout_secs: u64 = env_or("GENERATION_TIMEOUT_SECS", 20)?;
        if timeout_secs == 0 {
            bail!("GENERATION_TIMEOUT_SECS must be at least 1");
        }

        let enable_llm_scoring = match std::env::var("ENABLE_LLM_SCORING") {
            Ok(raw) => parse_flag(&raw)
                .with_context(|| format!("ENABLE_LLM_SCORING must be true or false, got '{raw}'"))?,
            Err(_) => defaults.enable_llm_scoring,
        };

        Ok(Config {
            llm_api_key: std::env::var("LLM_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            llm_endpoint: std::env::var("LLM_ENDPOINT").unwrap_or(defaults.llm_endpoint),
            llm_model: std::env::var("LLM_MODEL").unwrap_or(defaults.llm_model),
            question_mix,
            generation_timeout: Duration::from_secs(timeout_secs),
            phone_rules,
            enable_llm_scoring,
            data_file: std::env::var("DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
            port: env_or("PORT", defaults.port).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.question_mix.total(), 5);
        assert_eq!(config.generation_timeout, Duration::from_secs(20));
        assert_eq!(config.phone_rules, PhoneRules::default());
        assert!(!config.enable_llm_scoring);
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_env_or_uses_default_when_unset() {
        let value: usize = env_or("TALENTSCOUT_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
