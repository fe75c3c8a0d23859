//! Oral Examiner Orchestrator
//!
//! Runs oral examinations: admits students from a roster, draws questions
//! from a bank, relays answers to an LLM examiner, and writes a JSON result
//! for every completed exam. Exposed over HTTP through [`create_router`].

pub mod api;
pub mod config;
pub mod error;
pub mod examiner;
pub mod openai;
pub mod oracle;
pub mod prompt;
pub mod questions;
pub mod reply;
pub mod results;
pub mod roster;
pub mod session;

pub use api::{
    create_router, AnswerRequest, AnswerResponse, AppState, BeginRequest, ErrorResponse,
    FinalizeResponse, HealthResponse, SessionLimits,
};
pub use config::{Config, ExamLanguage, LlmConfig};
pub use error::{ExamError, LlmErrorKind, Result};
pub use examiner::{AnswerOutcome, AnswerStep, ExamSettings, Examiner, FinalOutcome};
pub use openai::ChatCompletionsOracle;
pub use oracle::{ExamOracle, OracleMessage};
pub use prompt::PromptBuilder;
pub use questions::{QuestionBank, QuestionPicker, RandomPicker, QUESTIONS_PER_EXAM};
pub use reply::{parse_answer_reply, parse_score, Directive, ParsedReply, FOLLOW_UP_TAG, NEXT_TAG};
pub use results::{JsonResultWriter, ResultWriter};
pub use roster::Roster;
pub use session::{ExamSession, Role, SessionStatus, SessionView, StudentIdentity, Turn};
