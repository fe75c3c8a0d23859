//! End-to-end tests for the exam session state machine.
//!
//! These tests drive complete exams against the fixture roster and question
//! bank with a scripted oracle, writing real result files into a temporary
//! directory.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use examiner_orchestrator::{
    Config, ExamError, ExamOracle, ExamSession, ExamSettings, Examiner, JsonResultWriter,
    LlmErrorKind, OracleMessage, QuestionBank, QuestionPicker, RandomPicker, Result, Role,
    Roster, SessionStatus,
};
use examiner_report::{ExamReport, ScoreSource, SpeakerRole};

/// Path to the fixtures directory.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Oracle that replays queued replies, then advances on every answer.
struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String>>>,
    fallback: String,
}

impl ScriptedOracle {
    fn new(replies: Vec<Result<String>>, fallback: &str) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: fallback.to_string(),
        }
    }

    /// Advances after each of the three answers, then grades with `score_reply`.
    fn advancing(score_reply: &str) -> Self {
        Self::new(
            vec![
                Ok("Good explanation. [[NEXT]]".to_string()),
                Ok("Good explanation. [[NEXT]]".to_string()),
                Ok("Good explanation. [[NEXT]]".to_string()),
                Ok(score_reply.to_string()),
            ],
            "Good explanation. [[NEXT]]",
        )
    }
}

#[async_trait]
impl ExamOracle for ScriptedOracle {
    async fn generate(&self, _system_prompt: &str, _conversation: &[OracleMessage]) -> Result<String> {
        self.replies
            .lock()
            .expect("oracle lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

struct FixedPicker(Vec<usize>);

impl QuestionPicker for FixedPicker {
    fn pick(&mut self, _bank_len: usize, _count: usize) -> Vec<usize> {
        self.0.clone()
    }
}

fn examiner(oracle: ScriptedOracle, results: &Path, settings: ExamSettings) -> Examiner {
    let roster = Roster::load(fixture_path().join("students.txt")).expect("roster loads");
    let bank = QuestionBank::load(fixture_path().join("themes.txt")).expect("bank loads");

    Examiner::new(
        Arc::new(roster),
        Arc::new(bank),
        Arc::new(oracle),
        Arc::new(JsonResultWriter::new(results)),
        settings,
    )
}

fn result_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.expect("dir entry").path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Tests that the fixture config parses with the expected overrides.
#[test]
fn test_fixture_config_loads() {
    let config = Config::load_from_dir(&fixture_path()).expect("config loads");

    assert_eq!(config.roster, "students.txt");
    assert_eq!(config.max_follow_ups, 1);
    assert_eq!(config.llm.timeout_seconds, 30);
    assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
}

/// Tests that the fixture data loads with blank lines dropped.
#[test]
fn test_fixture_data_loads() {
    let roster = Roster::load(fixture_path().join("students.txt")).expect("roster loads");
    let bank = QuestionBank::load(fixture_path().join("themes.txt")).expect("bank loads");

    assert_eq!(roster.len(), 2);
    assert!(roster.contains("b.student@uni.edu"));
    assert_eq!(bank.len(), 5);
}

/// Roster ["a@x.com"], five questions, an always-advancing oracle and a
/// "Score: 7" grading reply produce exactly one result file.
#[tokio::test]
async fn test_complete_exam_writes_one_result() {
    let temp = tempfile::tempdir().expect("tempdir");
    let results = temp.path().join("exam_results");
    let examiner = examiner(
        ScriptedOracle::advancing("Solid understanding overall.\nScore: 7"),
        &results,
        ExamSettings::default(),
    );

    let mut session = ExamSession::new();
    examiner
        .begin(&mut session, "a@x.com", "Ada Lovelace", &mut RandomPicker::from_entropy())
        .expect("begin succeeds");

    for answer in ["first answer", "second answer", "third answer"] {
        examiner
            .submit_answer(&mut session, answer)
            .await
            .expect("answer accepted");
    }
    assert_eq!(session.status(), SessionStatus::AwaitingScore);

    let outcome = examiner.finalize(&mut session).await.expect("finalize succeeds");
    assert_eq!(session.status(), SessionStatus::Completed);

    let files = result_files(&results);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0], outcome.result_path);

    let report: ExamReport =
        serde_json::from_str(&std::fs::read_to_string(&files[0]).expect("readable"))
            .expect("valid report");

    assert_eq!(report.student_email, "a@x.com");
    assert_eq!(report.student_name, "Ada Lovelace");
    assert_eq!(report.questions.len(), 3);
    assert!((report.score - 7.0).abs() < f64::EPSILON);
    assert_eq!(report.score_source, ScoreSource::Examiner);
    assert!(report.conversation_history.len() >= 6);
    assert_eq!(report.turns_by(SpeakerRole::Student), 3);

    let distinct: std::collections::HashSet<_> = report.questions.iter().collect();
    assert_eq!(distinct.len(), 3);
}

/// The persisted document has a stable shape.
#[tokio::test]
async fn test_result_document_snapshot() {
    let temp = tempfile::tempdir().expect("tempdir");
    let examiner = examiner(
        ScriptedOracle::advancing("Clear answers throughout.\nScore: 7"),
        temp.path(),
        ExamSettings::default(),
    );

    let mut session = ExamSession::new();
    examiner
        .begin(&mut session, " A@X.com ", "Ada Lovelace", &mut FixedPicker(vec![1, 4, 0]))
        .expect("begin succeeds");
    for answer in [
        "Attention weighs tokens by relevance.",
        "Dense vectors learned by predicting context.",
        "Splitting text into units; subwords cover rare words.",
    ] {
        examiner
            .submit_answer(&mut session, answer)
            .await
            .expect("answer accepted");
    }
    let outcome = examiner.finalize(&mut session).await.expect("finalize succeeds");

    let report: ExamReport = serde_json::from_str(
        &std::fs::read_to_string(&outcome.result_path).expect("readable"),
    )
    .expect("valid report");

    assert!((report.score - 7.0).abs() < f64::EPSILON);
    insta::assert_json_snapshot!(report, {
        ".session_id" => "[session_id]",
        ".score" => "[score]",
        ".started_at" => "[timestamp]",
        ".completed_at" => "[timestamp]",
        ".timestamp" => "[timestamp]",
        ".conversation_history[].timestamp" => "[timestamp]",
    }, @r###"
    {
      "session_id": "[session_id]",
      "student_name": "Ada Lovelace",
      "student_email": "a@x.com",
      "questions": [
        "Explain the attention mechanism in transformers.",
        "What are word embeddings and how does word2vec learn them?",
        "What is tokenization and why does subword tokenization help with rare words?"
      ],
      "score": "[score]",
      "score_source": "examiner",
      "started_at": "[timestamp]",
      "completed_at": "[timestamp]",
      "timestamp": "[timestamp]",
      "conversation_history": [
        {
          "role": "examiner",
          "content": "Question 1 of 3: Explain the attention mechanism in transformers.",
          "question_index": 0,
          "timestamp": "[timestamp]"
        },
        {
          "role": "student",
          "content": "Attention weighs tokens by relevance.",
          "question_index": 0,
          "timestamp": "[timestamp]"
        },
        {
          "role": "examiner",
          "content": "Good explanation.",
          "question_index": 0,
          "timestamp": "[timestamp]"
        },
        {
          "role": "examiner",
          "content": "Question 2 of 3: What are word embeddings and how does word2vec learn them?",
          "question_index": 1,
          "timestamp": "[timestamp]"
        },
        {
          "role": "student",
          "content": "Dense vectors learned by predicting context.",
          "question_index": 1,
          "timestamp": "[timestamp]"
        },
        {
          "role": "examiner",
          "content": "Good explanation.",
          "question_index": 1,
          "timestamp": "[timestamp]"
        },
        {
          "role": "examiner",
          "content": "Question 3 of 3: What is tokenization and why does subword tokenization help with rare words?",
          "question_index": 2,
          "timestamp": "[timestamp]"
        },
        {
          "role": "student",
          "content": "Splitting text into units; subwords cover rare words.",
          "question_index": 2,
          "timestamp": "[timestamp]"
        },
        {
          "role": "examiner",
          "content": "Good explanation.",
          "question_index": 2,
          "timestamp": "[timestamp]"
        },
        {
          "role": "examiner",
          "content": "Clear answers throughout.\nScore: 7",
          "question_index": 2,
          "timestamp": "[timestamp]"
        }
      ]
    }
    "###);
}

/// An email missing from the roster never mutates the session or writes a file.
#[tokio::test]
async fn test_unknown_email_writes_no_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let results = temp.path().join("exam_results");
    let examiner = examiner(ScriptedOracle::advancing("Score: 9"), &results, ExamSettings::default());

    let mut session = ExamSession::new();
    let err = examiner
        .begin(&mut session, "mallory@x.com", "Mallory", &mut RandomPicker::seeded(1))
        .expect_err("unknown email is rejected");

    assert!(matches!(err, ExamError::UnauthorizedStudent { .. }));
    assert_eq!(session.status(), SessionStatus::AwaitingIdentity);
    assert!(session.transcript().is_empty());

    let err = examiner
        .submit_answer(&mut session, "an answer")
        .await
        .expect_err("no answers before begin");
    assert!(matches!(err, ExamError::InvalidState { .. }));
    assert!(session.transcript().is_empty());
    assert!(result_files(&results).is_empty());
}

/// A failing oracle leaves the transcript exactly as it was.
#[tokio::test]
async fn test_oracle_failure_is_retryable() {
    let temp = tempfile::tempdir().expect("tempdir");
    let oracle = ScriptedOracle::new(
        vec![Err(ExamError::llm_api_error(
            LlmErrorKind::RateLimit,
            "HTTP 429: slow down",
        ))],
        "Fine. [[NEXT]]",
    );
    let examiner = examiner(oracle, temp.path(), ExamSettings::default());

    let mut session = ExamSession::new();
    examiner
        .begin(&mut session, "a@x.com", "Ada", &mut RandomPicker::seeded(7))
        .expect("begin succeeds");
    let before = session.transcript().to_vec();

    let err = examiner
        .submit_answer(&mut session, "answer")
        .await
        .expect_err("oracle fails");

    assert!(err.is_transient());
    assert_eq!(session.transcript(), before.as_slice());

    examiner
        .submit_answer(&mut session, "answer")
        .await
        .expect("retry succeeds");
    assert_eq!(session.current_question_index(), 1);
}

/// After completion, answering and finalizing again both fail with `InvalidState`.
#[tokio::test]
async fn test_completed_session_rejects_further_operations() {
    let temp = tempfile::tempdir().expect("tempdir");
    let examiner = examiner(
        ScriptedOracle::advancing("Score: 4"),
        temp.path(),
        ExamSettings::default(),
    );

    let mut session = ExamSession::new();
    examiner
        .begin(&mut session, "a@x.com", "Ada", &mut RandomPicker::seeded(3))
        .expect("begin succeeds");
    for answer in ["one", "two", "three"] {
        examiner.submit_answer(&mut session, answer).await.expect("answer accepted");
    }
    examiner.finalize(&mut session).await.expect("finalize succeeds");
    let turns = session.transcript().len();

    let err = examiner
        .submit_answer(&mut session, "late answer")
        .await
        .expect_err("no answers after completion");
    assert!(matches!(err, ExamError::InvalidState { .. }));

    let err = examiner
        .finalize(&mut session)
        .await
        .expect_err("second finalize fails");
    assert!(matches!(err, ExamError::InvalidState { .. }));

    assert_eq!(session.transcript().len(), turns);
    assert_eq!(result_files(temp.path()).len(), 1);
}

/// A follow-up keeps the exam on the same question until the cap is reached.
#[tokio::test]
async fn test_follow_up_is_capped() {
    let temp = tempfile::tempdir().expect("tempdir");
    let oracle = ScriptedOracle::new(
        vec![
            Ok("Can you give an example? [[FOLLOW_UP]]".to_string()),
            Ok("And another one? [[FOLLOW_UP]]".to_string()),
        ],
        "Thanks. [[NEXT]]",
    );
    let examiner = examiner(oracle, temp.path(), ExamSettings::default());

    let mut session = ExamSession::new();
    examiner
        .begin(&mut session, "a@x.com", "Ada", &mut RandomPicker::seeded(11))
        .expect("begin succeeds");

    examiner.submit_answer(&mut session, "short").await.expect("answer accepted");
    assert_eq!(session.current_question_index(), 0);

    examiner.submit_answer(&mut session, "example").await.expect("answer accepted");
    assert_eq!(session.current_question_index(), 1);

    let roles: Vec<_> = session.turns_for(0).map(|t| t.role).collect();
    assert_eq!(
        roles,
        [
            Role::Examiner,
            Role::Student,
            Role::Examiner,
            Role::Student,
            Role::Examiner
        ]
    );
}

/// With a fallback score configured, an unparseable grading reply still completes.
#[tokio::test]
async fn test_fallback_score_is_recorded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let settings = ExamSettings {
        fallback_score: Some(5.0),
        ..ExamSettings::default()
    };
    let examiner = examiner(
        ScriptedOracle::advancing("Thank you for your answers."),
        temp.path(),
        settings,
    );

    let mut session = ExamSession::new();
    examiner
        .begin(&mut session, "b.student@uni.edu", "Bo", &mut RandomPicker::seeded(5))
        .expect("begin succeeds");
    for answer in ["one", "two", "three"] {
        examiner.submit_answer(&mut session, answer).await.expect("answer accepted");
    }
    let outcome = examiner.finalize(&mut session).await.expect("finalize succeeds");

    let report: ExamReport = serde_json::from_str(
        &std::fs::read_to_string(&outcome.result_path).expect("readable"),
    )
    .expect("valid report");
    assert_eq!(report.score_source, ScoreSource::Fallback);
    assert!((report.score - 5.0).abs() < f64::EPSILON);
}
