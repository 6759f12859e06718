mod anthropic;
mod factory;
mod fallback;
mod image_gen;
mod ollama;
mod open_ai;
mod vision;

pub use anthropic::AnthropicProvider;
pub use factory::ProviderFactory;
pub use fallback::FallbackProvider;
pub use image_gen::{illustration_prompt, ImageGenerator, OpenAIImageGenerator};
pub use ollama::OllamaProvider;
pub use open_ai::OpenAIProvider;
pub use vision::{ImageTranscriber, OpenAIVisionTranscriber};

use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single model call: system prompt plus the conversation so far
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Overrides the provider's configured temperature
    pub temperature: Option<f32>,
    /// Overrides the provider's configured token limit
    pub max_tokens: Option<u32>,
    /// Ask the provider for a bare JSON object where it supports that
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![ChatMessage::user(user)],
            ..Default::default()
        }
    }
}

/// Unified trait for all LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openai", "anthropic")
    fn provider_name(&self) -> &str;

    /// Run a completion and return the assistant's text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Client for model APIs, with every request bounded by `timeout`.
pub(crate) fn api_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Pull a human-readable message out of an API error body.
pub(crate) fn api_error_message(body: &serde_json::Value) -> Option<String> {
    let error = body.get("error")?;
    error
        .as_str()
        .or_else(|| error["message"].as_str())
        .map(String::from)
        .or_else(|| Some(error.to_string()))
}
