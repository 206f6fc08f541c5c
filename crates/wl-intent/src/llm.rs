//! LLM provider abstraction and the Gemini implementation behind the
//! intent classifier.
//!
//! The classifier talks to models through the [`LlmProvider`] trait so that
//! tests can substitute a [`MockProvider`] and the daemon can run without
//! any provider at all (rules-only mode).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    ParseError(String),

    #[error("rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::HttpError(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for LlmRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Gemini's wire name for the assistant role is "model".
        let s = match self {
            LlmRole::System => "system",
            LlmRole::User => "user",
            LlmRole::Assistant => "model",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-request generation settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Sent out-of-band as the system instruction, not as a message.
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            system_prompt: None,
        }
    }
}

/// A completed (non-streaming) model response.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub finish_reason: String,
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send messages and wait for the complete response.
    async fn complete(
        &self,
        messages: &[LlmMessage],
        config: &LlmConfig,
    ) -> Result<LlmResponse, LlmError>;
}

// ---------------------------------------------------------------------------
// GeminiProvider
// ---------------------------------------------------------------------------

/// LLM provider for the Google Gemini `generateContent` API.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider with a 30 second request timeout.
    ///
    /// `api_key` is the Gemini API key (x-goog-api-key header).
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_timeout(api_key, Duration::from_secs(30))
    }

    /// Create a provider with an explicit request timeout.
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }

    /// Override the base URL (useful for testing with a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the JSON request body for the Gemini generateContent API.
    pub fn build_request_body(messages: &[LlmMessage], config: &LlmConfig) -> serde_json::Value {
        // Gemini API: the system prompt goes in the top-level
        // `systemInstruction` field, not into the contents array. Fold any
        // system messages in with it.
        let mut system_text: Option<String> = config.system_prompt.clone();

        let contents: Vec<serde_json::Value> = messages
            .iter()
            .filter_map(|msg| {
                if msg.role == LlmRole::System {
                    if let Some(ref mut s) = system_text {
                        s.push('\n');
                        s.push_str(&msg.content);
                    } else {
                        system_text = Some(msg.content.clone());
                    }
                    None
                } else {
                    Some(serde_json::json!({
                        "role": msg.role.to_string(),
                        "parts": [{ "text": msg.content }],
                    }))
                }
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": config.max_tokens,
                "temperature": config.temperature,
            },
        });

        if let Some(system) = system_text {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": system }],
            });
        }

        body
    }
}

/// Deserialize helpers for the Gemini API response.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: GeminiContent,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        messages: &[LlmMessage],
        config: &LlmConfig,
    ) -> Result<LlmResponse, LlmError> {
        let body = Self::build_request_body(messages, config);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, config.model
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();

        if status == 429 {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(LlmError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status,
                message: text,
            });
        }

        let api_resp: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let candidate = api_resp
            .candidates
            .first()
            .ok_or_else(|| LlmError::ParseError("no candidates in response".into()))?;

        let content = candidate
            .content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let usage = api_resp.usage_metadata.as_ref();

        Ok(LlmResponse {
            content,
            model: api_resp
                .model_version
                .unwrap_or_else(|| config.model.clone()),
            input_tokens: usage.and_then(|u| u.prompt_token_count).unwrap_or(0),
            output_tokens: usage.and_then(|u| u.candidates_token_count).unwrap_or(0),
            finish_reason: candidate
                .finish_reason
                .clone()
                .unwrap_or_else(|| "unknown".into()),
        })
    }
}

// ---------------------------------------------------------------------------
// MockProvider
// ---------------------------------------------------------------------------

/// A mock LLM provider for testing.
///
/// Returns pre-configured responses. Each call to `complete` pops the next
/// response from the queue. If the queue is empty, returns a default response.
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Result<LlmResponse, LlmError>>>>,
    /// Captured request bodies for test assertions.
    #[allow(clippy::type_complexity)]
    captured_requests: Arc<Mutex<Vec<(Vec<LlmMessage>, LlmConfig)>>>,
}

impl MockProvider {
    /// Create a mock provider with no pre-configured responses (returns defaults).
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            captured_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful response.
    pub fn with_response(self, response: LlmResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    /// Queue a successful response carrying only `text` as content.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        let response = LlmResponse {
            content: text.into(),
            ..Self::default_response("mock-model")
        };
        self.with_response(response)
    }

    /// Queue an error response.
    pub fn with_error(self, error: LlmError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Get captured requests for assertions.
    pub fn captured_requests(&self) -> Vec<(Vec<LlmMessage>, LlmConfig)> {
        self.captured_requests.lock().unwrap().clone()
    }

    fn default_response(model: &str) -> LlmResponse {
        LlmResponse {
            content: "Mock response".to_string(),
            model: model.to_string(),
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: "stop".to_string(),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(
        &self,
        messages: &[LlmMessage],
        config: &LlmConfig,
    ) -> Result<LlmResponse, LlmError> {
        self.captured_requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), config.clone()));

        let mut queue = self.responses.lock().unwrap();
        if queue.is_empty() {
            Ok(Self::default_response(&config.model))
        } else {
            queue.pop_front().unwrap()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
