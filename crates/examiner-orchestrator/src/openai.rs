//! OpenAI-compatible chat completions oracle.
//!
//! Talks to any endpoint implementing `POST {base_url}/chat/completions`
//! (Groq, OpenAI, local gateways). Each call is a single request with the
//! configured timeout; retrying is left to the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{ExamError, LlmErrorKind, Result};
use crate::oracle::{ExamOracle, OracleMessage};
use crate::session::Role;

/// Longest slice of an error body carried into error messages.
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`ExamOracle`] backed by an OpenAI-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct ChatCompletionsOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionsOracle {
    /// Creates an oracle from endpoint settings and an API key.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::LlmApiError` if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ExamError::llm_api_error(LlmErrorKind::Other, e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Creates an oracle reading the API key from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::ConfigValidationError` if the key is not set.
    pub fn from_env(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::new(config, api_key)
    }

    /// The full chat completions URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

const fn wire_role(role: Role) -> &'static str {
    match role {
        Role::Student => "user",
        Role::Examiner => "assistant",
    }
}

fn classify(error: &reqwest::Error) -> LlmErrorKind {
    if error.is_timeout() {
        LlmErrorKind::Timeout
    } else if error.is_decode() {
        LlmErrorKind::InvalidResponse
    } else if let Some(status) = error.status() {
        LlmErrorKind::from_status(status.as_u16())
    } else {
        LlmErrorKind::Network
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[async_trait]
impl ExamOracle for ChatCompletionsOracle {
    async fn generate(
        &self,
        system_prompt: &str,
        conversation: &[OracleMessage],
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: system_prompt,
        });
        messages.extend(conversation.iter().map(|message| ChatMessage {
            role: wire_role(message.role),
            content: &message.text,
        }));

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExamError::llm_api_error(classify(&e), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "LLM API returned an error status");
            return Err(ExamError::llm_api_error(
                LlmErrorKind::from_status(status.as_u16()),
                format!("HTTP {status}: {}", truncate(&body)),
            ));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExamError::llm_api_error(classify(&e), e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                ExamError::llm_api_error(
                    LlmErrorKind::InvalidResponse,
                    "response contained no completion text",
                )
            })
    }
}
