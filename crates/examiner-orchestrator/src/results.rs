//! Result persistence.

use std::path::PathBuf;

use tracing::info;

use examiner_report::json::JsonGenerator;

use crate::error::{ExamError, Result};
use crate::session::ExamSession;

/// Stores the result of a completed session.
pub trait ResultWriter: Send + Sync {
    /// Persists the session and returns where it was written.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::ResultWriteError` if the result could not be stored.
    fn persist(&self, session: &ExamSession) -> Result<PathBuf>;
}

/// Writes one pretty-printed JSON file per session into a directory.
///
/// Files are named `<YYYYmmddHHMMSS>_<email>.json` and are never
/// overwritten; a numeric suffix is added on collision.
#[derive(Debug, Clone)]
pub struct JsonResultWriter {
    dir: PathBuf,
    pretty: bool,
}

impl JsonResultWriter {
    /// Creates a writer for the given results directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pretty: true,
        }
    }

    /// Writes compact JSON instead.
    #[must_use]
    pub const fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }
}

impl ResultWriter for JsonResultWriter {
    fn persist(&self, session: &ExamSession) -> Result<PathBuf> {
        let report = session.to_report()?;
        let path = JsonGenerator::new(&report)
            .write_to_dir(&self.dir, self.pretty)
            .map_err(|e| ExamError::result_write(&self.dir, e.to_string()))?;

        info!(
            session_id = %report.session_id,
            path = %path.display(),
            "Exam result written"
        );
        Ok(path)
    }
}
