//! JSON result generation.
//!
//! This module provides [`JsonGenerator`] for serializing an [`ExamReport`]
//! and writing it into the results directory. Written files are never
//! overwritten: if the preferred name is taken, a numeric suffix is added.
//!
//! # Example
//!
//! ```rust,no_run
//! use examiner_report::{ExamReport, json::JsonGenerator};
//! use std::path::Path;
//!
//! # fn example(report: &ExamReport) {
//! let generator = JsonGenerator::new(report);
//! let path = generator.write_to_dir(Path::new("exam_results"), true).unwrap();
//! println!("saved {}", path.display());
//! # }
//! ```

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{ExamReport, ReportError, Result};

/// Upper bound on `-N` suffixes tried before giving up on a unique name.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// JSON report generator.
///
/// Wraps an [`ExamReport`] reference and provides methods for serializing it
/// to JSON and persisting it.
pub struct JsonGenerator<'a> {
    report: &'a ExamReport,
}

impl<'a> JsonGenerator<'a> {
    /// Creates a new JSON generator for the given report.
    #[must_use]
    pub const fn new(report: &'a ExamReport) -> Self {
        Self { report }
    }

    /// Generates compact JSON output (single line, no extra whitespace).
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.report).map_err(ReportError::from)
    }

    /// Generates pretty-printed JSON output with indentation.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.report).map_err(ReportError::from)
    }

    /// Writes the JSON report into `dir` under a name unique to this session.
    ///
    /// The directory is created if missing. The file is named after
    /// [`ExamReport::file_stem`]; when that name already exists, `-1`, `-2`,
    /// ... are appended until an unused name is found. Existing files are
    /// never touched.
    ///
    /// Returns the path of the written file.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] if the directory cannot be created or the
    /// file cannot be written, and [`ReportError::InvalidData`] if no unused
    /// name is found.
    pub fn write_to_dir(&self, dir: &Path, pretty: bool) -> Result<PathBuf> {
        let json = self.render(pretty)?;
        persist_unique(dir, &self.report.file_stem(), |file| {
            file.write_all(json.as_bytes())
        })
    }

    fn render(&self, pretty: bool) -> Result<String> {
        if pretty {
            self.generate_pretty()
        } else {
            self.generate()
        }
    }
}

/// Fills a staged file in `dir` and links it under the first unused
/// `<stem>[-N].json` name.
///
/// The staged file is removed when filling or linking fails, so a failed
/// write never leaves a partial result behind.
fn persist_unique<F>(dir: &Path, stem: &str, fill: F) -> Result<PathBuf>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    std::fs::create_dir_all(dir)?;

    let mut staged = NamedTempFile::new_in(dir)?;
    fill(staged.as_file_mut())?;
    staged.as_file().sync_all()?;

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{stem}.json")
        } else {
            format!("{stem}-{attempt}.json")
        };
        let path = dir.join(name);

        match staged.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => staged = e.file,
            Err(e) => return Err(ReportError::Io(e.error)),
        }
    }

    Err(ReportError::InvalidData(format!(
        "no unused file name for '{stem}' in {}",
        dir.display()
    )))
}
