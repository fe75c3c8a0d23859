//! Examination result documents.
//!
//! This crate defines the JSON document written for every completed oral
//! examination, together with the generator that serializes it to the
//! results directory.
//!
//! # Types
//!
//! - [`ExamReport`] - The complete result document for one session
//! - [`TranscriptEntry`] - One turn of the examination conversation
//! - [`SpeakerRole`] - Who produced a transcript entry
//! - [`ScoreSource`] - Whether the score came from the examiner or a fallback
//!
//! # Generators
//!
//! - [`json::JsonGenerator`] - Generate JSON documents and write them without
//!   overwriting earlier results
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use examiner_report::{ExamReport, ScoreSource, SpeakerRole, TranscriptEntry};
//! use examiner_report::json::JsonGenerator;
//!
//! let now = Utc::now();
//! let report = ExamReport::builder()
//!     .session_id("3f2a")
//!     .student("Ada Lovelace", "ada@example.com")
//!     .questions(vec!["What is a token?".to_string()])
//!     .score(8.0, ScoreSource::Examiner)
//!     .started_at(now)
//!     .completed_at(now)
//!     .entry(TranscriptEntry::new(SpeakerRole::Examiner, "What is a token?", 0, now))
//!     .build()
//!     .unwrap();
//!
//! let json = JsonGenerator::new(&report).generate_pretty().unwrap();
//! assert!(json.contains("ada@example.com"));
//! ```

pub mod json;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest score an examination can award.
pub const MAX_SCORE: f64 = 10.0;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while producing a result document.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid report data.
    #[error("invalid report data: {0}")]
    InvalidData(String),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Roles and score provenance
// ============================================================================

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    /// The student sitting the exam.
    Student,
    /// The examiner (question prompts and LLM replies).
    Examiner,
}

impl std::fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Examiner => write!(f, "examiner"),
        }
    }
}

/// Where the final score came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Parsed from the examiner's grading reply.
    #[default]
    Examiner,
    /// The configured fallback, applied because the reply had no usable score.
    Fallback,
}

// ============================================================================
// TranscriptEntry
// ============================================================================

/// One turn of the examination conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Who spoke.
    pub role: SpeakerRole,

    /// What was said.
    pub content: String,

    /// Index (0-based) of the question this turn belongs to.
    pub question_index: usize,

    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    /// Creates a new transcript entry.
    #[must_use]
    pub fn new(
        role: SpeakerRole,
        content: impl Into<String>,
        question_index: usize,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            role,
            content: content.into(),
            question_index,
            timestamp,
        }
    }
}

// ============================================================================
// ExamReport
// ============================================================================

/// Complete result document for one examination session.
///
/// Field names follow the layout of the results directory consumed by
/// graders: `student_name`, `student_email`, `score` and the full
/// `conversation_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamReport {
    /// Identifier of the examination session.
    pub session_id: String,

    /// Student's full name as entered.
    pub student_name: String,

    /// Student's roster email.
    pub student_email: String,

    /// The questions selected for this session, in the order asked.
    pub questions: Vec<String>,

    /// Final score in `[0, 10]`.
    pub score: f64,

    /// Whether the score was graded or fell back to the configured default.
    pub score_source: ScoreSource,

    /// When the student was admitted to the exam.
    pub started_at: DateTime<Utc>,

    /// When the score was recorded.
    pub completed_at: DateTime<Utc>,

    /// When this document was produced.
    pub timestamp: DateTime<Utc>,

    /// Every turn of the examination, in order.
    pub conversation_history: Vec<TranscriptEntry>,
}

impl ExamReport {
    /// Creates a new report builder.
    #[must_use]
    pub fn builder() -> ExamReportBuilder {
        ExamReportBuilder::default()
    }

    /// Returns the file stem used for this report in the results directory.
    ///
    /// The stem combines the completion time with the student's email, with
    /// characters that are awkward in file names replaced by `_`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use examiner_report::{ExamReport, ScoreSource};
    ///
    /// let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 5).unwrap();
    /// let report = ExamReport::builder()
    ///     .session_id("s1")
    ///     .student("A", "a@x.com")
    ///     .questions(vec!["q".to_string()])
    ///     .score(7.0, ScoreSource::Examiner)
    ///     .started_at(at)
    ///     .completed_at(at)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(report.file_stem(), "20261016093005_a_x.com");
    /// ```
    #[must_use]
    pub fn file_stem(&self) -> String {
        let email: String = self
            .student_email
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{email}", self.completed_at.format("%Y%m%d%H%M%S"))
    }

    /// Returns the number of turns contributed by the given role.
    #[must_use]
    pub fn turns_by(&self, role: SpeakerRole) -> usize {
        self.conversation_history
            .iter()
            .filter(|entry| entry.role == role)
            .count()
    }
}

// ============================================================================
// ExamReportBuilder
// ============================================================================

/// Builder for constructing [`ExamReport`] instances.
#[derive(Debug, Clone, Default)]
pub struct ExamReportBuilder {
    session_id: Option<String>,
    student_name: Option<String>,
    student_email: Option<String>,
    questions: Vec<String>,
    score: Option<(f64, ScoreSource)>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    conversation_history: Vec<TranscriptEntry>,
}

impl ExamReportBuilder {
    /// Sets the session identifier.
    #[must_use]
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Sets the student's name and email.
    #[must_use]
    pub fn student(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.student_name = Some(name.into());
        self.student_email = Some(email.into());
        self
    }

    /// Sets the selected questions.
    #[must_use]
    pub fn questions(mut self, questions: Vec<String>) -> Self {
        self.questions = questions;
        self
    }

    /// Sets the final score and its provenance.
    #[must_use]
    pub const fn score(mut self, score: f64, source: ScoreSource) -> Self {
        self.score = Some((score, source));
        self
    }

    /// Sets the admission time.
    #[must_use]
    pub const fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    /// Sets the completion time.
    #[must_use]
    pub const fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    /// Appends one transcript entry.
    #[must_use]
    pub fn entry(mut self, entry: TranscriptEntry) -> Self {
        self.conversation_history.push(entry);
        self
    }

    /// Sets the complete transcript.
    #[must_use]
    pub fn conversation_history(mut self, history: Vec<TranscriptEntry>) -> Self {
        self.conversation_history = history;
        self
    }

    /// Builds the report.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidData` if required fields are missing,
    /// no questions were given, or the score is outside `[0, 10]`.
    pub fn build(self) -> Result<ExamReport> {
        let session_id = self
            .session_id
            .ok_or_else(|| ReportError::InvalidData("session_id is required".to_string()))?;
        let student_name = self
            .student_name
            .ok_or_else(|| ReportError::InvalidData("student_name is required".to_string()))?;
        let student_email = self
            .student_email
            .ok_or_else(|| ReportError::InvalidData("student_email is required".to_string()))?;
        let (score, score_source) = self
            .score
            .ok_or_else(|| ReportError::InvalidData("score is required".to_string()))?;
        let started_at = self
            .started_at
            .ok_or_else(|| ReportError::InvalidData("started_at is required".to_string()))?;
        let completed_at = self
            .completed_at
            .ok_or_else(|| ReportError::InvalidData("completed_at is required".to_string()))?;

        if self.questions.is_empty() {
            return Err(ReportError::InvalidData(
                "at least one question is required".to_string(),
            ));
        }

        if !(0.0..=MAX_SCORE).contains(&score) {
            return Err(ReportError::InvalidData(format!(
                "score {score} is outside 0-{MAX_SCORE}"
            )));
        }

        Ok(ExamReport {
            session_id,
            student_name,
            student_email,
            questions: self.questions,
            score,
            score_source,
            started_at,
            completed_at,
            timestamp: Utc::now(),
            conversation_history: self.conversation_history,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
