//! The exam session state machine.
//!
//! [`Examiner`] holds the process-wide shared pieces (roster, question bank,
//! oracle, result writer) and drives one [`ExamSession`] at a time through
//! `begin`, `submit_answer` and `finalize`. Each operation takes the session
//! by `&mut`, so operations on one session are sequential by construction.
//!
//! Every operation either fully applies or leaves the session untouched: the
//! oracle is called before anything is appended, and finalization works on a
//! copy that only replaces the session once the result has been persisted.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use examiner_report::ScoreSource;

use crate::config::{Config, ExamLanguage};
use crate::error::{ExamError, Result};
use crate::oracle::{ExamOracle, OracleMessage};
use crate::prompt::PromptBuilder;
use crate::questions::{QuestionBank, QuestionPicker};
use crate::reply::{parse_answer_reply, parse_score, Directive};
use crate::results::ResultWriter;
use crate::roster::{normalize_email, Roster};
use crate::session::{ExamSession, Role, SessionStatus, StudentIdentity};

// ============================================================================
// Settings
// ============================================================================

/// Behavioural knobs of the examiner.
#[derive(Debug, Clone)]
pub struct ExamSettings {
    /// Course name used in prompts.
    pub course: String,
    /// Language of prompts and fixed examiner texts.
    pub language: ExamLanguage,
    /// Follow-ups allowed per question before the exam moves on.
    pub max_follow_ups: u32,
    /// Score applied when the grading reply has no parseable score.
    pub fallback_score: Option<f64>,
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ExamSettings {
    /// Extracts the examiner settings from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            course: config.course.clone(),
            language: config.language,
            max_follow_ups: config.max_follow_ups,
            fallback_score: config.fallback_score,
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// What happens after an answer has been evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerStep {
    /// The examiner asked a follow-up on the same question.
    FollowUp,
    /// The exam moved to the next question.
    NextQuestion {
        /// Zero-based index of the new question.
        index: usize,
        /// The examiner turn presenting it.
        prompt: String,
    },
    /// All questions are answered; the session awaits finalization.
    AllAnswered,
}

/// Result of [`Examiner::submit_answer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    /// The examiner's reply with control tags removed.
    pub feedback: String,
    /// Where the exam goes next.
    pub step: AnswerStep,
}

/// Result of [`Examiner::finalize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalOutcome {
    /// Final score in `0..=10`.
    pub score: f64,
    /// Whether the score was parsed or the configured fallback.
    pub score_source: ScoreSource,
    /// The examiner's grading reply.
    pub feedback: String,
    /// Where the result file was written.
    pub result_path: PathBuf,
}

// ============================================================================
// Examiner
// ============================================================================

/// Drives exam sessions.
pub struct Examiner {
    roster: Arc<Roster>,
    bank: Arc<QuestionBank>,
    oracle: Arc<dyn ExamOracle>,
    writer: Arc<dyn ResultWriter>,
    prompts: PromptBuilder,
    max_follow_ups: u32,
    fallback_score: Option<f64>,
}

impl std::fmt::Debug for Examiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Examiner")
            .field("roster", &self.roster.len())
            .field("bank", &self.bank.len())
            .field("prompts", &self.prompts)
            .field("max_follow_ups", &self.max_follow_ups)
            .field("fallback_score", &self.fallback_score)
            .finish_non_exhaustive()
    }
}

impl Examiner {
    /// Creates an examiner over shared roster and question bank.
    #[must_use]
    pub fn new(
        roster: Arc<Roster>,
        bank: Arc<QuestionBank>,
        oracle: Arc<dyn ExamOracle>,
        writer: Arc<dyn ResultWriter>,
        settings: ExamSettings,
    ) -> Self {
        Self {
            roster,
            bank,
            oracle,
            writer,
            prompts: PromptBuilder::new(settings.course, settings.language),
            max_follow_ups: settings.max_follow_ups,
            fallback_score: settings.fallback_score,
        }
    }

    /// Students allowed to sit the exam.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Questions exams are drawn from.
    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    /// Admits a student and asks the first question.
    ///
    /// # Errors
    ///
    /// - `ExamError::InvalidState` if the session already has an identity.
    /// - `ExamError::InvalidInput` if the email or name is blank.
    /// - `ExamError::UnauthorizedStudent` if the email is not on the roster.
    /// - `ExamError::Configuration` if the picker misbehaves.
    ///
    /// On error the session is unchanged.
    pub fn begin(
        &self,
        session: &mut ExamSession,
        email: &str,
        full_name: &str,
        picker: &mut dyn QuestionPicker,
    ) -> Result<()> {
        if session.status != SessionStatus::AwaitingIdentity {
            return Err(ExamError::invalid_state("begin", session.status));
        }

        let email = normalize_email(email);
        let full_name = full_name.trim();
        if email.is_empty() {
            return Err(ExamError::invalid_input("email must not be empty"));
        }
        if full_name.is_empty() {
            return Err(ExamError::invalid_input("full name must not be empty"));
        }

        if !self.roster.contains(&email) {
            warn!(session_id = %session.id, email = %email, "Rejected student not on roster");
            return Err(ExamError::unauthorized(email));
        }

        let questions = self.bank.select(picker)?;
        let opening = self.prompts.question_turn(0, &questions[0]);

        session.identity = Some(StudentIdentity {
            email,
            full_name: full_name.to_string(),
        });
        session.selected_questions = questions;
        session.current_question_index = 0;
        session.started_at = Some(Utc::now());
        session.status = SessionStatus::InProgress;
        session.push_turn(Role::Examiner, opening);

        info!(
            session_id = %session.id,
            student = %full_name,
            "Exam started"
        );
        Ok(())
    }

    /// Evaluates an answer to the current question.
    ///
    /// # Errors
    ///
    /// - `ExamError::InvalidState` unless the session is in progress.
    /// - `ExamError::InvalidInput` if the answer is blank.
    /// - `ExamError::LlmApiError` if the oracle fails; nothing is recorded.
    pub async fn submit_answer(
        &self,
        session: &mut ExamSession,
        text: &str,
    ) -> Result<AnswerOutcome> {
        if session.status != SessionStatus::InProgress {
            return Err(ExamError::invalid_state("submit an answer", session.status));
        }

        let answer = text.trim();
        if answer.is_empty() {
            return Err(ExamError::invalid_input("answer must not be empty"));
        }

        let index = session.current_question_index;
        let question = session
            .selected_questions
            .get(index)
            .cloned()
            .ok_or_else(|| ExamError::invalid_state("submit an answer", session.status))?;
        let follow_up_allowed =
            session.answers_for(index) < usize::try_from(self.max_follow_ups).unwrap_or(usize::MAX);

        let mut conversation: Vec<OracleMessage> = session
            .turns_for(index)
            .map(|turn| OracleMessage {
                role: turn.role,
                text: turn.text.clone(),
            })
            .collect();
        conversation.push(OracleMessage::student(answer));

        let system_prompt = self
            .prompts
            .answer_prompt(index, &question, follow_up_allowed);

        debug!(
            session_id = %session.id,
            question = index + 1,
            follow_up_allowed,
            "Evaluating answer"
        );
        let reply = self.oracle.generate(&system_prompt, &conversation).await?;

        let parsed = parse_answer_reply(&reply);
        let advance = match parsed.directive {
            Some(Directive::Next) => true,
            Some(Directive::FollowUp) | None => !follow_up_allowed,
        };
        let feedback = if parsed.text.is_empty() {
            self.prompts.empty_reply_placeholder().to_string()
        } else {
            parsed.text
        };

        session.push_turn(Role::Student, answer);
        session.push_turn(Role::Examiner, feedback.clone());

        let step = if !advance {
            AnswerStep::FollowUp
        } else if index + 1 < session.selected_questions.len() {
            let next = index + 1;
            let prompt = self
                .prompts
                .question_turn(next, &session.selected_questions[next]);
            session.current_question_index = next;
            session.push_turn(Role::Examiner, prompt.clone());
            AnswerStep::NextQuestion {
                index: next,
                prompt,
            }
        } else {
            session.status = SessionStatus::AwaitingScore;
            AnswerStep::AllAnswered
        };

        info!(
            session_id = %session.id,
            question = index + 1,
            advanced = advance,
            status = %session.status,
            "Answer recorded"
        );
        Ok(AnswerOutcome { feedback, step })
    }

    /// Grades the exam and persists the result.
    ///
    /// # Errors
    ///
    /// - `ExamError::InvalidState` unless all questions have been answered and
    ///   the session is not yet completed.
    /// - `ExamError::LlmApiError` if the oracle fails.
    /// - `ExamError::ScoreParse` if the reply carries no usable score and no
    ///   fallback score is configured.
    /// - `ExamError::ResultWriteError` if the result cannot be written.
    ///
    /// On error the session stays awaiting its score and may be finalized again.
    pub async fn finalize(&self, session: &mut ExamSession) -> Result<FinalOutcome> {
        if session.status != SessionStatus::AwaitingScore {
            return Err(ExamError::invalid_state("finalize", session.status));
        }

        let mut conversation: Vec<OracleMessage> = session
            .transcript
            .iter()
            .map(|turn| OracleMessage {
                role: turn.role,
                text: turn.text.clone(),
            })
            .collect();
        conversation.push(OracleMessage::student(self.prompts.scoring_request()));

        let system_prompt = self.prompts.scoring_prompt(&session.selected_questions);
        let reply = self.oracle.generate(&system_prompt, &conversation).await?;

        let (score, score_source) = match (parse_score(&reply), self.fallback_score) {
            (Some(score), _) => (score, ScoreSource::Examiner),
            (None, Some(fallback)) => {
                warn!(
                    session_id = %session.id,
                    fallback,
                    "Grading reply had no usable score, applying fallback"
                );
                (fallback, ScoreSource::Fallback)
            }
            (None, None) => return Err(ExamError::score_parse(reply)),
        };

        let feedback = reply.trim().to_string();
        let mut completed = session.clone();
        completed.push_turn(Role::Examiner, feedback.clone());
        completed.score = Some(score);
        completed.score_source = Some(score_source);
        completed.completed_at = Some(Utc::now());
        completed.status = SessionStatus::Completed;

        let result_path = self.writer.persist(&completed)?;
        completed.result_path = Some(result_path.clone());
        *session = completed;

        info!(
            session_id = %session.id,
            score,
            source = ?score_source,
            "Exam completed"
        );
        Ok(FinalOutcome {
            score,
            score_source,
            feedback,
            result_path,
        })
    }
}
