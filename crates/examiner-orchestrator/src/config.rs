//! Configuration types for the oral examiner.
//!
//! This module provides the configuration structures that control where the
//! roster and question bank are read from, where results are written, how
//! the examiner behaves, and which LLM endpoint it talks to.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ExamError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "examiner.json";

/// Default roster file path.
fn default_roster() -> String {
    "students.txt".to_string()
}

/// Default question bank file path.
fn default_questions() -> String {
    "themes.txt".to_string()
}

/// Default directory for result files.
fn default_results_dir() -> String {
    "exam_results".to_string()
}

/// Default course name used in examiner prompts.
fn default_course() -> String {
    "Natural Language Processing".to_string()
}

/// Default number of follow-up questions per exam question.
const fn default_max_follow_ups() -> u32 {
    1
}

/// Default cap on sessions still waiting for an identity.
const fn default_max_pending_sessions() -> usize {
    100
}

/// Default idle time before a session is dropped, in minutes.
const fn default_session_idle_minutes() -> u64 {
    60
}

/// Default OpenAI-compatible API base URL.
fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

/// Default model name.
fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

/// Default sampling temperature.
const fn default_temperature() -> f32 {
    0.7
}

/// Default completion token limit.
const fn default_max_tokens() -> u32 {
    1024
}

/// Default per-request timeout in seconds.
const fn default_request_timeout() -> u64 {
    60
}

/// Default environment variable holding the API key.
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Main configuration for the examiner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Path to the roster file (one email per line).
    #[serde(default = "default_roster")]
    pub roster: String,

    /// Path to the question bank (one question per line).
    #[serde(default = "default_questions")]
    pub questions: String,

    /// Directory where result files are written.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,

    /// Course name the examiner introduces itself with.
    #[serde(default = "default_course")]
    pub course: String,

    /// Language the examiner speaks.
    #[serde(default)]
    pub language: ExamLanguage,

    /// Follow-up questions allowed per exam question before moving on.
    #[serde(default = "default_max_follow_ups")]
    pub max_follow_ups: u32,

    /// Score applied when the grading reply cannot be parsed.
    ///
    /// When absent, an unparseable reply is reported as a retryable error.
    #[serde(default)]
    pub fallback_score: Option<f64>,

    /// Sessions awaiting an identity that may exist at once.
    #[serde(default = "default_max_pending_sessions")]
    pub max_pending_sessions: usize,

    /// Minutes without a request after which a session is dropped.
    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: u64,

    /// LLM endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roster: default_roster(),
            questions: default_questions(),
            results_dir: default_results_dir(),
            course: default_course(),
            language: ExamLanguage::default(),
            max_follow_ups: default_max_follow_ups(),
            fallback_score: None,
            max_pending_sessions: default_max_pending_sessions(),
            session_idle_minutes: default_session_idle_minutes(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `examiner.json` in the current directory. If found, loads and
    /// validates the configuration. If not found, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            ExamError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `examiner.json` in a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::ConfigParseError` if the file exists but contains
    /// invalid JSON or invalid enum values.
    ///
    /// Returns `ExamError::ConfigValidationError` if the configuration values
    /// are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(ExamError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ExamError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        if self.roster.trim().is_empty() {
            return Err(ExamError::config_validation(
                "roster path must not be empty",
                "Provide the path of the student roster in your examiner.json",
            ));
        }

        if self.questions.trim().is_empty() {
            return Err(ExamError::config_validation(
                "questions path must not be empty",
                "Provide the path of the question bank in your examiner.json",
            ));
        }

        if self.results_dir.trim().is_empty() {
            return Err(ExamError::config_validation(
                "resultsDir must not be empty",
                "Provide a results directory in your examiner.json (e.g. 'exam_results')",
            ));
        }

        if self.course.trim().is_empty() {
            return Err(ExamError::config_validation(
                "course must not be empty",
                "Set course to the subject being examined in your examiner.json",
            ));
        }

        if let Some(score) = self.fallback_score {
            if !(0.0..=10.0).contains(&score) {
                return Err(ExamError::config_validation(
                    format!("fallbackScore {score} is outside 0-10"),
                    "Set fallbackScore to a value between 0 and 10, or remove it",
                ));
            }
        }

        if self.max_pending_sessions == 0 {
            return Err(ExamError::config_validation(
                "maxPendingSessions must be greater than 0",
                "Set maxPendingSessions to at least 1 in your examiner.json",
            ));
        }

        if self.session_idle_minutes == 0 {
            return Err(ExamError::config_validation(
                "sessionIdleMinutes must be greater than 0",
                "Set sessionIdleMinutes to at least 1 in your examiner.json",
            ));
        }

        self.llm.validate()
    }
}

/// Settings for the OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// API base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in a completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_request_timeout(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl LlmConfig {
    /// Validates the endpoint settings.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ExamError::config_validation(
                format!("llm.baseUrl '{}' is not an http(s) URL", self.base_url),
                "Set llm.baseUrl to e.g. https://api.groq.com/openai/v1",
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ExamError::config_validation(
                "llm.model must not be empty",
                "Set llm.model to a model offered by your provider",
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ExamError::config_validation(
                format!("llm.temperature {} is outside 0-2", self.temperature),
                "Set llm.temperature between 0 and 2",
            ));
        }

        if self.max_tokens == 0 {
            return Err(ExamError::config_validation(
                "llm.maxTokens must be greater than 0",
                "Set llm.maxTokens to at least 1 in your examiner.json",
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ExamError::config_validation(
                "llm.timeoutSeconds must be greater than 0",
                "Set llm.timeoutSeconds to at least 1 second in your examiner.json",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(ExamError::config_validation(
                "llm.apiKeyEnv must not be empty",
                "Set llm.apiKeyEnv to the environment variable holding your API key",
            ));
        }

        Ok(())
    }

    /// Reads the API key from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::ConfigValidationError` if the variable is unset or empty.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ExamError::config_validation(
                format!("environment variable {} is not set", self.api_key_env),
                format!("Export {} with your LLM provider's API key", self.api_key_env),
            )),
        }
    }
}

/// Language the examiner conducts the exam in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExamLanguage {
    /// English (default).
    #[default]
    English,
    /// Ukrainian.
    Ukrainian,
}

impl ExamLanguage {
    /// Parses a string into an `ExamLanguage`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "english" | "en" => Some(Self::English),
            "ukrainian" | "uk" => Some(Self::Ukrainian),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for ExamLanguage {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid language '{s}': expected one of 'english', 'ukrainian'"
            ))
        })
    }
}

impl Serialize for ExamLanguage {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::English => "english",
            Self::Ukrainian => "ukrainian",
        };
        serializer.serialize_str(s)
    }
}
