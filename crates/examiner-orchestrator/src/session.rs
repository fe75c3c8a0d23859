//! Exam session state.
//!
//! This module defines the per-student session record driven by
//! [`crate::Examiner`]. Fields are only mutated by the examiner so the status
//! transitions below always hold.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use examiner_report::{ExamReport, ScoreSource, TranscriptEntry};

use crate::error::{ExamError, Result};

pub use examiner_report::SpeakerRole as Role;

// ============================================================================
// SessionStatus
// ============================================================================

/// Lifecycle of an exam session.
///
/// The status transitions through these states:
/// - `AwaitingIdentity` -> `InProgress` (identity accepted, questions drawn)
/// - `InProgress` -> `AwaitingScore` (third question closed)
/// - `AwaitingScore` -> `Completed` (score parsed and result persisted)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for the student's email and name.
    #[default]
    AwaitingIdentity,
    /// Questions are being asked and answered.
    InProgress,
    /// All questions answered; waiting for finalization.
    AwaitingScore,
    /// Score recorded and result written. Terminal.
    Completed,
}

impl SessionStatus {
    /// Returns `true` for the terminal state.
    ///
    /// # Examples
    ///
    /// ```
    /// use examiner_orchestrator::SessionStatus;
    ///
    /// assert!(SessionStatus::Completed.is_terminal());
    /// assert!(!SessionStatus::AwaitingScore.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingIdentity => "awaiting_identity",
            Self::InProgress => "in_progress",
            Self::AwaitingScore => "awaiting_score",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Turn and StudentIdentity
// ============================================================================

/// One utterance in the exam conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub text: String,
    /// Zero-based index of the question this turn belongs to.
    pub question_index: usize,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Creates a turn stamped with the current time.
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>, question_index: usize) -> Self {
        Self {
            role,
            text: text.into(),
            question_index,
            timestamp: Utc::now(),
        }
    }
}

/// The admitted student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentIdentity {
    /// Normalized (trimmed, lowercased) email.
    pub email: String,
    /// Full name as entered, trimmed.
    pub full_name: String,
}

// ============================================================================
// ExamSession
// ============================================================================

/// Complete state of one examination attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ExamSession {
    pub(crate) id: Uuid,
    pub(crate) status: SessionStatus,
    pub(crate) identity: Option<StudentIdentity>,
    pub(crate) selected_questions: Vec<String>,
    pub(crate) current_question_index: usize,
    pub(crate) transcript: Vec<Turn>,
    pub(crate) score: Option<f64>,
    pub(crate) score_source: Option<ScoreSource>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
    pub(crate) result_path: Option<PathBuf>,
}

impl Default for ExamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ExamSession {
    /// Creates a fresh session awaiting the student's identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::AwaitingIdentity,
            identity: None,
            selected_questions: Vec::new(),
            current_question_index: 0,
            transcript: Vec::new(),
            score: None,
            score_source: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result_path: None,
        }
    }

    /// Unique session identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// The admitted student, once `begin` succeeded.
    #[must_use]
    pub const fn identity(&self) -> Option<&StudentIdentity> {
        self.identity.as_ref()
    }

    /// The questions drawn for this exam, in asking order.
    #[must_use]
    pub fn selected_questions(&self) -> &[String] {
        &self.selected_questions
    }

    /// Zero-based index of the question being discussed.
    ///
    /// Stays at the last index once all questions are answered.
    #[must_use]
    pub const fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    /// The question being discussed, if the exam is in progress.
    #[must_use]
    pub fn current_question(&self) -> Option<&str> {
        match self.status {
            SessionStatus::InProgress => self
                .selected_questions
                .get(self.current_question_index)
                .map(String::as_str),
            _ => None,
        }
    }

    /// Every recorded turn, oldest first.
    #[must_use]
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Final score, once completed.
    #[must_use]
    pub const fn score(&self) -> Option<f64> {
        self.score
    }

    /// Where the final score came from.
    #[must_use]
    pub const fn score_source(&self) -> Option<ScoreSource> {
        self.score_source
    }

    /// When the session was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the student was admitted.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the score was recorded.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Where the result file was written, once completed.
    #[must_use]
    pub fn result_path(&self) -> Option<&Path> {
        self.result_path.as_deref()
    }

    /// Turns belonging to one question, in order.
    pub fn turns_for(&self, question_index: usize) -> impl Iterator<Item = &Turn> {
        self.transcript
            .iter()
            .filter(move |turn| turn.question_index == question_index)
    }

    /// Number of student answers recorded for one question.
    #[must_use]
    pub fn answers_for(&self, question_index: usize) -> usize {
        self.turns_for(question_index)
            .filter(|turn| turn.role == Role::Student)
            .count()
    }

    pub(crate) fn push_turn(&mut self, role: Role, text: impl Into<String>) {
        let index = self.current_question_index;
        self.transcript.push(Turn::new(role, text, index));
    }

    /// Converts a completed session into its persisted report form.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::InvalidState` if the session has no identity,
    /// score, or timestamps yet.
    pub fn to_report(&self) -> Result<ExamReport> {
        let (Some(identity), Some(score), Some(started_at), Some(completed_at)) = (
            self.identity.as_ref(),
            self.score,
            self.started_at,
            self.completed_at,
        ) else {
            return Err(ExamError::invalid_state("build a report", self.status));
        };

        ExamReport::builder()
            .session_id(self.id.to_string())
            .student(&identity.full_name, &identity.email)
            .questions(self.selected_questions.clone())
            .score(score, self.score_source.unwrap_or_default())
            .started_at(started_at)
            .completed_at(completed_at)
            .conversation_history(
                self.transcript
                    .iter()
                    .map(|turn| {
                        TranscriptEntry::new(
                            turn.role,
                            turn.text.clone(),
                            turn.question_index,
                            turn.timestamp,
                        )
                    })
                    .collect(),
            )
            .build()
            .map_err(|e| ExamError::invalid_state("build a report", e))
    }
}

// ============================================================================
// SessionView
// ============================================================================

/// Client-facing snapshot of a session.
///
/// Only questions that have already been asked are included.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Session identifier.
    pub id: Uuid,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// Student name, once admitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    /// Normalized student email, once admitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_email: Option<String>,
    /// One-based number of the question being discussed.
    pub question_number: Option<usize>,
    /// Questions in a complete exam.
    pub total_questions: usize,
    /// Questions asked so far, in order.
    pub asked_questions: Vec<String>,
    /// The conversation so far.
    pub transcript: Vec<Turn>,
    /// Final score, once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Where the score came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_source: Option<ScoreSource>,
    /// File name of the written result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_file: Option<String>,
}

impl From<&ExamSession> for SessionView {
    fn from(session: &ExamSession) -> Self {
        let asked = match session.status {
            SessionStatus::AwaitingIdentity => 0,
            SessionStatus::InProgress => session.current_question_index + 1,
            SessionStatus::AwaitingScore | SessionStatus::Completed => {
                session.selected_questions.len()
            }
        };

        Self {
            id: session.id,
            status: session.status,
            student_name: session.identity.as_ref().map(|i| i.full_name.clone()),
            student_email: session.identity.as_ref().map(|i| i.email.clone()),
            question_number: (session.status == SessionStatus::InProgress)
                .then_some(session.current_question_index + 1),
            total_questions: crate::questions::QUESTIONS_PER_EXAM,
            asked_questions: session.selected_questions.iter().take(asked).cloned().collect(),
            transcript: session.transcript.clone(),
            score: session.score,
            score_source: session.score_source,
            result_file: session
                .result_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn in_progress() -> ExamSession {
        let mut session = ExamSession::new();
        session.status = SessionStatus::InProgress;
        session.identity = Some(StudentIdentity {
            email: "a@x.com".to_string(),
            full_name: "Ada Lovelace".to_string(),
        });
        session.selected_questions = vec!["Q1".into(), "Q2".into(), "Q3".into()];
        session.started_at = Some(Utc::now());
        session
    }

    #[test]
    fn test_new_session_defaults() {
        let session = ExamSession::new();

        assert_eq!(session.status(), SessionStatus::AwaitingIdentity);
        assert!(session.identity().is_none());
        assert!(session.transcript().is_empty());
        assert!(session.current_question().is_none());
        assert_ne!(session.id(), ExamSession::new().id());
    }

    #[test]
    fn test_status_display_is_snake_case() {
        assert_eq!(SessionStatus::AwaitingIdentity.to_string(), "awaiting_identity");
        assert_eq!(
            serde_json::to_value(SessionStatus::AwaitingScore).unwrap(),
            "awaiting_score"
        );
    }

    #[test]
    fn test_push_turn_uses_current_index() {
        let mut session = in_progress();
        session.push_turn(Role::Examiner, "Question 1 of 3: Q1");
        session.current_question_index = 1;
        session.push_turn(Role::Student, "answer");

        assert_eq!(session.transcript()[0].question_index, 0);
        assert_eq!(session.transcript()[1].question_index, 1);
        assert_eq!(session.answers_for(1), 1);
        assert_eq!(session.answers_for(0), 0);
        assert_eq!(session.current_question(), Some("Q2"));
    }

    #[test]
    fn test_to_report_requires_completion() {
        let session = in_progress();
        let err = session.to_report().unwrap_err();
        assert!(matches!(err, ExamError::InvalidState { .. }));
    }

    #[test]
    fn test_to_report_copies_fields() {
        let mut session = in_progress();
        session.push_turn(Role::Examiner, "Question 1 of 3: Q1");
        session.push_turn(Role::Student, "answer");
        session.status = SessionStatus::Completed;
        session.score = Some(8.0);
        session.score_source = Some(ScoreSource::Examiner);
        session.completed_at = Some(Utc::now());

        let report = session.to_report().unwrap();

        assert_eq!(report.session_id, session.id().to_string());
        assert_eq!(report.student_email, "a@x.com");
        assert_eq!(report.student_name, "Ada Lovelace");
        assert_eq!(report.questions.len(), 3);
        assert_eq!(report.conversation_history.len(), 2);
        assert!((report.score - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_view_hides_unasked_questions() {
        let session = in_progress();
        let view = SessionView::from(&session);

        assert_eq!(view.asked_questions, ["Q1"]);
        assert_eq!(view.question_number, Some(1));
        assert_eq!(view.total_questions, 3);

        let fresh = SessionView::from(&ExamSession::new());
        assert!(fresh.asked_questions.is_empty());
        assert!(fresh.question_number.is_none());
    }
}
