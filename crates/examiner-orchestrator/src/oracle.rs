//! The examiner oracle port.
//!
//! All grading intelligence lives behind [`ExamOracle`]: given a system prompt
//! and the conversation so far, it returns the examiner's next reply. The
//! production implementation is [`crate::openai::ChatCompletionsOracle`];
//! tests substitute scripted doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::Role;

/// One message of the conversation sent to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleMessage {
    /// Who said it.
    pub role: Role,
    /// What was said.
    pub text: String,
}

impl OracleMessage {
    /// Creates a message from the student.
    #[must_use]
    pub fn student(text: impl Into<String>) -> Self {
        Self {
            role: Role::Student,
            text: text.into(),
        }
    }

    /// Creates a message from the examiner.
    #[must_use]
    pub fn examiner(text: impl Into<String>) -> Self {
        Self {
            role: Role::Examiner,
            text: text.into(),
        }
    }
}

/// Text-in, text-out examiner backend.
///
/// Implementations must be stateless with respect to sessions: everything the
/// oracle needs is in the arguments of each call.
#[async_trait]
pub trait ExamOracle: Send + Sync {
    /// Generates the examiner's reply.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::LlmApiError` on transport, timeout or API failures.
    async fn generate(&self, system_prompt: &str, conversation: &[OracleMessage])
        -> Result<String>;
}
