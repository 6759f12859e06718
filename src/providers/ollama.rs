use crate::config::ProviderConfig;
use crate::error::Result;
use crate::providers::open_ai::{chat_completions_body, chat_completions_content};
use crate::providers::{api_client, CompletionRequest, LlmProvider};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Local models served by Ollama through its OpenAI-compatible endpoint
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(OllamaProvider {
            client: api_client(timeout)?,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(base_url: String, model: String) -> Self {
        OllamaProvider {
            client: Client::new(),
            base_url,
            model,
            temperature: 0.2,
            max_tokens: 2000,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&chat_completions_body(
                &self.model,
                request,
                self.temperature,
                self.max_tokens,
            ))
            .send()
            .await?;

        let status = response.status();
        let response_body: Value =
            serde_json::from_str(&response.text().await?).unwrap_or(Value::Null);
        debug!("Ollama response: {:?}", response_body);

        chat_completions_content("Ollama", status, &response_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_ollama_complete() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model": "llama3.2", "choices": [{"message": {"content": "Hello"}}]}"#)
            .create_async()
            .await;

        let provider = OllamaProvider::with_base_url(server.url(), "llama3.2".to_string());
        let reply = provider
            .complete(&CompletionRequest::new("system", "hi"))
            .await
            .unwrap();

        assert_eq!(reply, "Hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ollama_missing_model() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(404)
            .with_body(r#"{"error": "model 'llama9' not found"}"#)
            .create_async()
            .await;

        let provider = OllamaProvider::with_base_url(server.url(), "llama9".to_string());
        let err = provider
            .complete(&CompletionRequest::new("system", "hi"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model 'llama9' not found"));
    }
}
