//! Integration tests for the HTTP surface.
//!
//! A real server is bound to an ephemeral port and driven with `reqwest`,
//! the way the chat page drives it. The examiner behind it talks to a second
//! local server that speaks the chat completions protocol, so the whole
//! stack from HTTP request to LLM request to result file is exercised.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::post, Json, Router};
use examiner_orchestrator::{
    create_router, AppState, ChatCompletionsOracle, ExamSettings, Examiner, JsonResultWriter,
    LlmConfig, QuestionBank, QuestionPicker, Roster,
};
use serde_json::{json, Value};

/// Picks the first questions of the bank in order.
struct InOrder;

impl QuestionPicker for InOrder {
    fn pick(&mut self, _bank_len: usize, count: usize) -> Vec<usize> {
        (0..count).collect()
    }
}

/// Serves a router on an ephemeral port and returns its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    format!("http://{addr}")
}

/// A fake chat completions endpoint: advances on every answer and grades
/// when the conversation asks for a score.
async fn spawn_fake_llm(calls: Arc<AtomicUsize>) -> String {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move |Json(body): Json<Value>| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let last = body["messages"]
                    .as_array()
                    .and_then(|m| m.last())
                    .and_then(|m| m["content"].as_str())
                    .unwrap_or_default()
                    .to_string();
                let content = if last.contains("final assessment") {
                    "Good command of the material.\nScore: 8/10"
                } else {
                    "Thank you, that covers it. [[NEXT]]"
                };
                Json(json!({
                    "id": "chatcmpl-test",
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": content},
                        "finish_reason": "stop"
                    }]
                }))
            }
        }),
    );
    format!("{}/v1", serve(router).await)
}

async fn spawn_examiner(llm_url: String, results: &std::path::Path) -> String {
    let llm = LlmConfig {
        base_url: llm_url,
        timeout_seconds: 5,
        ..LlmConfig::default()
    };
    let oracle = ChatCompletionsOracle::new(&llm, "test-key").expect("client builds");

    let examiner = Examiner::new(
        Arc::new(Roster::from_emails(["a@x.com"])),
        Arc::new(
            QuestionBank::new([
                "What is a language model?",
                "What is a transformer?",
                "What is BLEU?",
                "What is an n-gram?",
                "What is a stop word?",
            ])
            .expect("bank builds"),
        ),
        Arc::new(oracle),
        Arc::new(JsonResultWriter::new(results)),
        ExamSettings::default(),
    );

    serve(create_router(AppState::with_picker(
        Arc::new(examiner),
        Box::new(InOrder),
    )))
    .await
}

async fn post_json(client: &reqwest::Client, url: String, body: Option<Value>) -> (u16, Value) {
    let request = client.post(url).timeout(Duration::from_secs(10));
    let request = match body {
        Some(body) => request.json(&body),
        None => request,
    };
    let response = request.send().await.expect("request sent");
    let status = response.status().as_u16();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

/// Drives a full exam over HTTP and checks the result file.
#[tokio::test]
async fn test_exam_over_http() {
    let temp = tempfile::tempdir().expect("tempdir");
    let calls = Arc::new(AtomicUsize::new(0));
    let llm_url = spawn_fake_llm(Arc::clone(&calls)).await;
    let base = spawn_examiner(llm_url, temp.path()).await;
    let client = reqwest::Client::new();

    let (status, session) = post_json(&client, format!("{base}/api/sessions"), None).await;
    assert_eq!(status, 201);
    let id = session["id"].as_str().expect("session id").to_string();

    let (status, view) = post_json(
        &client,
        format!("{base}/api/sessions/{id}/begin"),
        Some(json!({"email": "a@x.com", "fullName": "Ada Lovelace"})),
    )
    .await;
    assert_eq!(status, 200, "{view}");
    assert_eq!(view["askedQuestions"], json!(["What is a language model?"]));

    let mut last_step = Value::Null;
    for answer in ["A distribution over text.", "Attention layers.", "An MT metric."] {
        let (status, body) = post_json(
            &client,
            format!("{base}/api/sessions/{id}/answer"),
            Some(json!({ "text": answer })),
        )
        .await;
        assert_eq!(status, 200, "{body}");
        assert_eq!(body["feedback"], "Thank you, that covers it.");
        last_step = body["step"].clone();
    }
    assert_eq!(last_step["kind"], "all_answered");

    let (status, result) =
        post_json(&client, format!("{base}/api/sessions/{id}/finalize"), None).await;
    assert_eq!(status, 200, "{result}");
    assert_eq!(result["score"], 8.0);
    assert_eq!(result["session"]["status"], "completed");
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let file_name = result["resultFile"].as_str().expect("result file");
    assert!(file_name.ends_with("_a_x.com.json"), "{file_name}");
    let written: Value = serde_json::from_str(
        &std::fs::read_to_string(temp.path().join(file_name)).expect("file exists"),
    )
    .expect("valid json");
    assert_eq!(written["student_email"], "a@x.com");
    assert_eq!(written["conversation_history"].as_array().map(Vec::len), Some(10));

    assert_eq!(result["session"]["resultFile"], file_name);

    // The server lets go of the session once its result is on disk.
    let response = client
        .get(format!("{base}/api/sessions/{id}"))
        .send()
        .await
        .expect("request sent");
    assert_eq!(response.status().as_u16(), 404);
}

/// A retake is a fresh session; the finished one stays closed.
#[tokio::test]
async fn test_retake_starts_fresh_session() {
    let temp = tempfile::tempdir().expect("tempdir");
    let llm_url = spawn_fake_llm(Arc::new(AtomicUsize::new(0))).await;
    let base = spawn_examiner(llm_url, temp.path()).await;
    let client = reqwest::Client::new();

    let (_, first) = post_json(&client, format!("{base}/api/sessions"), None).await;
    let (_, second) = post_json(&client, format!("{base}/api/sessions"), None).await;
    assert_ne!(first["id"], second["id"]);

    let health: Value = client
        .get(format!("{base}/api/health"))
        .send()
        .await
        .expect("request sent")
        .json()
        .await
        .expect("json body");
    assert_eq!(health["activeSessions"], 2);
    assert_eq!(health["questionBankSize"], 5);
}

/// An unreachable LLM surfaces as a retryable 502 and records nothing.
#[tokio::test]
async fn test_unreachable_llm_returns_bad_gateway() {
    let temp = tempfile::tempdir().expect("tempdir");
    let unused = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let dead_url = format!("http://{}/v1", unused.local_addr().expect("addr"));
    drop(unused);

    let base = spawn_examiner(dead_url, temp.path()).await;
    let client = reqwest::Client::new();

    let (_, session) = post_json(&client, format!("{base}/api/sessions"), None).await;
    let id = session["id"].as_str().expect("session id").to_string();
    post_json(
        &client,
        format!("{base}/api/sessions/{id}/begin"),
        Some(json!({"email": "a@x.com", "fullName": "Ada"})),
    )
    .await;

    let (status, body) = post_json(
        &client,
        format!("{base}/api/sessions/{id}/answer"),
        Some(json!({"text": "answer"})),
    )
    .await;

    assert_eq!(status, 502);
    assert_eq!(body["retryable"], true);

    let view: Value = client
        .get(format!("{base}/api/sessions/{id}"))
        .send()
        .await
        .expect("request sent")
        .json()
        .await
        .expect("json body");
    assert_eq!(view["transcript"].as_array().map(Vec::len), Some(1));
}
