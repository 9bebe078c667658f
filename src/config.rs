use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_QUESTIONS_FILE: &str = "quiz.json";
const DEFAULT_POINTS_FILE: &str = "points.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive number of seconds, got {value:?}")]
    InvalidTimeout { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub questions_file: PathBuf,
    pub points_file: PathBuf,
    /// Session-wide limit, counted from `/quiz`.
    pub quiz_timeout: Duration,
}

impl Config {
    /// Reads the process environment. Call after `dotenv()`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let questions_file: PathBuf = lookup("QUIZ_QUESTIONS_FILE")
            .unwrap_or_else(|| DEFAULT_QUESTIONS_FILE.to_string())
            .into();
        let points_file: PathBuf = lookup("QUIZ_POINTS_FILE")
            .unwrap_or_else(|| DEFAULT_POINTS_FILE.to_string())
            .into();

        let quiz_timeout = match lookup("QUIZ_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        name: "QUIZ_TIMEOUT_SECS",
                        value,
                    })
                }
            },
        };

        Ok(Self {
            questions_file,
            points_file,
            quiz_timeout,
        })
    }
}
