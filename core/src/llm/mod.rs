//! LLM client module
//!
//! Talks to an OpenAI-compatible chat-completions endpoint (LM Studio,
//! Ollama, local models). The routing and loop logic only ever sees the
//! [`CompletionProvider`] trait, so it can be exercised against a
//! deterministic stub in tests.

pub mod chat;
pub mod client;

pub use chat::{ChatMessage, ChatRequest, MessageRole};
pub use client::{CompletionProvider, LlmClient};

/// LLM endpoint configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API endpoint base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// API key (if required; local endpoints accept anything)
    pub api_key: Option<String>,
}

impl LlmConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        LlmConfig {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}
