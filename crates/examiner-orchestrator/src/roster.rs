//! Student roster loading.
//!
//! The roster is a UTF-8 text file with one email address per line. Blank
//! lines are ignored and surrounding whitespace is trimmed. It is loaded once
//! at startup and shared read-only between all sessions.
//!
//! Emails are matched case-insensitively: both the roster entries and the
//! email a student types are trimmed and ASCII-lowercased before comparison.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::error::{ExamError, Result};

/// The set of students admitted to the exam.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    emails: HashSet<String>,
}

impl Roster {
    /// Loads the roster from the given file path.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::DataFileNotFound` if the file doesn't exist.
    /// Returns `ExamError::DataFileEncoding` if the file is not valid UTF-8.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let lines = read_line_file("roster", path)?;
        let roster = Self::from_emails(lines);
        debug!(path = %path.display(), students = roster.len(), "Roster loaded");
        Ok(roster)
    }

    /// Builds a roster from in-memory email addresses.
    ///
    /// # Examples
    ///
    /// ```
    /// use examiner_orchestrator::Roster;
    ///
    /// let roster = Roster::from_emails(["a@x.com", "B@X.com"]);
    /// assert!(roster.contains("A@x.com"));
    /// assert!(roster.contains(" b@x.com "));
    /// assert!(!roster.contains("c@x.com"));
    /// ```
    #[must_use]
    pub fn from_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|email| normalize_email(email.as_ref()))
            .filter(|email| !email.is_empty())
            .collect();
        Self { emails }
    }

    /// Returns `true` if the email is on the roster.
    #[must_use]
    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }

    /// Number of distinct students on the roster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    /// Returns `true` if no student is admitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// Canonical form used for roster comparisons.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Reads a line-oriented data file, dropping blank lines and trimming the rest.
pub(crate) fn read_line_file(kind: &'static str, path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExamError::data_file_not_found(kind, path),
        std::io::ErrorKind::InvalidData => ExamError::data_file_encoding(kind, path),
        _ => ExamError::Io(e),
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
