//! Error types for the oral examiner.
//!
//! This module defines the error hierarchy for all examiner operations,
//! including configuration loading, roster and question bank parsing, the
//! session state machine, LLM interactions, and result persistence.

use std::path::PathBuf;

/// A specialized `Result` type for examiner operations.
pub type Result<T> = std::result::Result<T, ExamError>;

/// Errors that can occur while running oral examinations.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum ExamError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your examiner.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The loaded data cannot support an examination (e.g. too few questions).
    #[error("Configuration error: {message}\n\nSuggestion: {suggestion}")]
    Configuration {
        /// Description of the problem.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Data File Errors
    // ========================================================================
    /// A roster or question bank file was not found.
    #[error("{kind} file not found: '{path}'\n\nSuggestion: Check the '{kind}' path in examiner.json or pass it on the command line")]
    DataFileNotFound {
        /// Which file was missing ("roster" or "questions").
        kind: &'static str,
        /// Path where the file was expected.
        path: PathBuf,
    },

    /// A roster or question bank file contains non-UTF-8 content.
    #[error("{kind} file has invalid encoding: '{path}'\n\nSuggestion: Convert the file to UTF-8 encoding")]
    DataFileEncoding {
        /// Which file was unreadable ("roster" or "questions").
        kind: &'static str,
        /// Path to the file.
        path: PathBuf,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The email is not on the exam roster.
    #[error("Student '{email}' is not registered for this exam\n\nSuggestion: Check the spelling of your email address")]
    UnauthorizedStudent {
        /// The rejected email.
        email: String,
    },

    /// User-supplied input was empty or malformed.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// An operation was called in a state that does not accept it.
    #[error("Invalid state: cannot {operation} while session is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The session's current state.
        state: String,
    },

    /// No session exists with the given identifier.
    #[error("Session not found: {id}")]
    SessionNotFound {
        /// The unknown identifier.
        id: String,
    },

    // ========================================================================
    // LLM Errors
    // ========================================================================
    /// LLM API call failed (authentication, rate limiting, network, etc.).
    #[error("LLM API error ({kind}): {message}\n\nSuggestion: {suggestion}")]
    LlmApiError {
        /// The kind of API error.
        kind: LlmErrorKind,
        /// Detailed error message from the API or transport.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The examiner's grading reply did not contain a usable score.
    #[error("Could not read a score between 0 and 10 from the examiner's reply\n\nSuggestion: Retry finalizing the exam")]
    ScoreParse {
        /// The reply that could not be parsed.
        reply: String,
    },

    // ========================================================================
    // Result Errors
    // ========================================================================
    /// Failed to write the result file to disk.
    #[error("Failed to write exam result to '{path}': {message}\n\nSuggestion: Check write permissions and available disk space")]
    ResultWriteError {
        /// Directory or file the result was to be written to.
        path: PathBuf,
        /// Description of the write failure.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Categories of LLM API errors for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The API answered, but not with a usable completion.
    InvalidResponse,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidResponse => write!(f, "invalid_response"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl LlmErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the API key in the configured environment variable",
            Self::RateLimit => "Wait a moment and send your answer again",
            Self::Server => "Retry later; the LLM service may be experiencing issues",
            Self::Network => "Check your network connection and retry",
            Self::Timeout => "Retry; the examiner took too long to respond",
            Self::InvalidResponse => "Retry; the LLM service returned an unexpected response",
            Self::Other => "Check the LLM provider's status page",
        }
    }

    /// Classifies an HTTP status code returned by the LLM API.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            408 => Self::Timeout,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl ExamError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `DataFileNotFound` error.
    #[must_use]
    pub fn data_file_not_found(kind: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::DataFileNotFound {
            kind,
            path: path.into(),
        }
    }

    /// Creates a new `DataFileEncoding` error.
    #[must_use]
    pub fn data_file_encoding(kind: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::DataFileEncoding {
            kind,
            path: path.into(),
        }
    }

    /// Creates a new `UnauthorizedStudent` error.
    #[must_use]
    pub fn unauthorized(email: impl Into<String>) -> Self {
        Self::UnauthorizedStudent {
            email: email.into(),
        }
    }

    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidState` error.
    #[must_use]
    pub fn invalid_state(operation: &'static str, state: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    /// Creates a new `SessionNotFound` error.
    #[must_use]
    pub fn session_not_found(id: impl std::fmt::Display) -> Self {
        Self::SessionNotFound { id: id.to_string() }
    }

    /// Creates a new `LlmApiError` with automatic suggestion based on error kind.
    #[must_use]
    pub fn llm_api_error(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::LlmApiError {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Creates a new `ScoreParse` error.
    #[must_use]
    pub fn score_parse(reply: impl Into<String>) -> Self {
        Self::ScoreParse {
            reply: reply.into(),
        }
    }

    /// Creates a new `ResultWriteError`.
    #[must_use]
    pub fn result_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ResultWriteError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error is transient and the operation may be retried
    /// with the session left exactly as it was.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LlmApiError {
                kind: LlmErrorKind::RateLimit
                    | LlmErrorKind::Server
                    | LlmErrorKind::Network
                    | LlmErrorKind::Timeout
                    | LlmErrorKind::InvalidResponse,
                ..
            } | Self::ScoreParse { .. }
                | Self::ResultWriteError { .. }
        )
    }

    /// Returns `true` if this error is fatal and the process should not serve exams.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::Configuration { .. }
                | Self::DataFileNotFound { .. }
                | Self::DataFileEncoding { .. }
                | Self::LlmApiError {
                    kind: LlmErrorKind::Authentication,
                    ..
                }
        )
    }

    /// Returns `true` if the student caused this error and should simply be
    /// prompted again.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::UnauthorizedStudent { .. } | Self::InvalidInput { .. }
        )
    }
}
