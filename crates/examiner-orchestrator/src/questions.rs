//! Question bank loading and question selection.
//!
//! The bank is a UTF-8 text file with one question per line, loaded once at
//! startup. Each exam draws [`QUESTIONS_PER_EXAM`] distinct questions through a
//! [`QuestionPicker`], so tests can substitute a deterministic picker.

use std::collections::HashSet;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{ExamError, Result};
use crate::roster::read_line_file;

/// Number of questions asked in every examination.
pub const QUESTIONS_PER_EXAM: usize = 3;

/// The ordered, read-only pool of exam questions.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<String>,
}

impl QuestionBank {
    /// Loads the bank from the given file path.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::DataFileNotFound` or `ExamError::DataFileEncoding`
    /// if the file cannot be read, and `ExamError::Configuration` if it holds
    /// fewer than [`QUESTIONS_PER_EXAM`] questions.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bank = Self::new(read_line_file("questions", path)?)?;
        debug!(path = %path.display(), questions = bank.len(), "Question bank loaded");
        Ok(bank)
    }

    /// Builds a bank from in-memory questions, blank entries excluded.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Configuration` if fewer than [`QUESTIONS_PER_EXAM`]
    /// questions remain.
    pub fn new<I, S>(questions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let questions: Vec<String> = questions
            .into_iter()
            .map(Into::into)
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();

        if questions.len() < QUESTIONS_PER_EXAM {
            return Err(ExamError::configuration(
                format!(
                    "question bank has {} question(s); an exam needs {QUESTIONS_PER_EXAM}",
                    questions.len()
                ),
                format!("Add at least {QUESTIONS_PER_EXAM} questions, one per line"),
            ));
        }

        Ok(Self { questions })
    }

    /// Number of questions in the bank.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always `false`; a bank is never constructed empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// All questions in bank order.
    #[must_use]
    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Draws the questions for one exam.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Configuration` if the picker returns the wrong
    /// number of indices, an index outside the bank, or a repeated index.
    pub fn select(&self, picker: &mut dyn QuestionPicker) -> Result<Vec<String>> {
        let indices = picker.pick(self.questions.len(), QUESTIONS_PER_EXAM);

        if indices.len() != QUESTIONS_PER_EXAM {
            return Err(ExamError::configuration(
                format!(
                    "question picker returned {} indices instead of {QUESTIONS_PER_EXAM}",
                    indices.len()
                ),
                "Use a picker that draws exactly one index per exam question",
            ));
        }

        let mut seen = HashSet::with_capacity(indices.len());
        for &index in &indices {
            if index >= self.questions.len() || !seen.insert(index) {
                return Err(ExamError::configuration(
                    format!("question picker returned invalid index {index}"),
                    "Use a picker that draws distinct indices within the bank",
                ));
            }
        }

        Ok(indices
            .into_iter()
            .map(|index| self.questions[index].clone())
            .collect())
    }
}

/// Chooses which questions of the bank an exam uses.
pub trait QuestionPicker: Send {
    /// Returns `count` distinct indices in `0..bank_len`, in asking order.
    fn pick(&mut self, bank_len: usize, count: usize) -> Vec<usize>;
}

/// Uniform sampling without replacement.
///
/// The returned order is random too, so a bank of exactly three questions is
/// asked as a random permutation of the whole bank.
#[derive(Debug, Clone)]
pub struct RandomPicker<R = StdRng> {
    rng: R,
}

impl RandomPicker<StdRng> {
    /// Creates a picker seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a reproducible picker.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> RandomPicker<R> {
    /// Wraps an existing random number generator.
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> QuestionPicker for RandomPicker<R> {
    fn pick(&mut self, bank_len: usize, count: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.rng, bank_len, count.min(bank_len)).into_vec()
    }
}
