//! LLM client implementation
//!
//! A blocking (per-request) client for OpenAI-compatible chat endpoints.
//! No client-side timeout is imposed; the external service's own limits
//! apply.

use super::{chat::ChatRequest, LlmConfig};
use crate::error::AgentError;
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capability interface for chat completion.
///
/// The router and agent loop depend on this trait rather than on the
/// concrete HTTP client, so tests drive them with scripted stubs.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Resolve one chat request to the model's free-text completion.
    async fn complete(&self, request: &ChatRequest) -> Result<String, AgentError>;
}

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint
pub struct LlmClient {
    config: LlmConfig,
    http_client: HttpClient,
}

impl LlmClient {
    /// Create a new LLM client
    pub fn new(config: LlmConfig) -> Result<Self, AgentError> {
        let http_client = HttpClient::builder()
            .build()
            .map_err(|e| AgentError::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(LlmClient {
            config,
            http_client,
        })
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, AgentError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let body = OpenAiRequest {
            model: self.config.model.clone(),
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        };

        let mut builder = self
            .http_client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(api_key) = &self.config.api_key {
            if !api_key.is_empty() {
                builder = builder.bearer_auth(api_key);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::Provider(format!("request failed: {e}")))?;

        match response.status() {
            StatusCode::OK => {
                let response_body: OpenAiResponse = response
                    .json()
                    .await
                    .map_err(|e| AgentError::Provider(format!("unparseable response: {e}")))?;
                Ok(response_body
                    .choices
                    .first()
                    .map(|c| c.message.content.clone())
                    .unwrap_or_default())
            }
            StatusCode::UNAUTHORIZED => Err(AgentError::Provider(
                "authentication failed, check your API key".into(),
            )),
            StatusCode::TOO_MANY_REQUESTS => Err(AgentError::Provider(
                "rate limit exceeded, try again later".into(),
            )),
            status => {
                let error_body: Option<Value> = response.json().await.ok();
                let error_msg = error_body
                    .as_ref()
                    .and_then(|v| v.get("error").and_then(|e| e.get("message")))
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error");
                Err(AgentError::Provider(format!(
                    "API request failed ({status}): {error_msg}"
                )))
            }
        }
    }
}

// OpenAI-compatible API types
#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: String,
    messages: &'a Vec<super::chat::ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}
