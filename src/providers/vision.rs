use crate::config::AiConfig;
use crate::error::{Result, TastebaseError};
use crate::providers::open_ai::chat_completions_content;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const TRANSCRIBE_PROMPT: &str = "Transcribe all recipe text visible in this image: title, ingredients, and steps. \
Keep the original wording and line breaks. Reply with the text only. \
If there is no readable text, reply with an empty message.";

/// Reads the text off a photographed or scanned recipe
#[async_trait]
pub trait ImageTranscriber: Send + Sync {
    async fn transcribe(&self, image: &[u8], content_type: &str) -> Result<String>;
}

/// Vision-capable chat model behind the OpenAI chat-completions API
pub struct OpenAIVisionTranscriber {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIVisionTranscriber {
    /// Uses the `openai` provider's credentials and endpoint.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let provider = config.providers.get("openai").filter(|p| p.enabled);
        let api_key = provider
            .and_then(|p| p.api_key.clone())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                TastebaseError::NotConfigured("reading recipe photos needs an OpenAI API key".into())
            })?;
        let base_url = provider
            .and_then(|p| p.base_url.clone())
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(60)))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model: config.vision_model.clone(),
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl ImageTranscriber for OpenAIVisionTranscriber {
    async fn transcribe(&self, image: &[u8], content_type: &str) -> Result<String> {
        let data_url = format!("data:{content_type};base64,{}", STANDARD.encode(image));
        debug!("Sending {} byte image to {} for transcription", image.len(), self.model);

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "temperature": 0.0,
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": TRANSCRIBE_PROMPT},
                        {"type": "image_url", "image_url": {"url": data_url}},
                    ],
                }],
            }))
            .send()
            .await?;

        let status = response.status();
        let body: Value = serde_json::from_str(&response.text().await?).unwrap_or(Value::Null);
        let text = chat_completions_content("OpenAI vision", status, &body)?;

        if text.trim().is_empty() {
            return Err(TastebaseError::NoRecipeFound(
                "no text detected in image".into(),
            ));
        }
        debug!("Transcribed {} characters from image", text.len());
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn completion(content: &str) -> String {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
    }

    #[tokio::test]
    async fn test_transcribe_sends_data_url() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer key")
            .match_body(Matcher::Regex("data:image/png;base64,".into()))
            .with_status(200)
            .with_body(completion("Pancakes\n2 eggs\nMix and fry.\n"))
            .create_async()
            .await;

        let transcriber =
            OpenAIVisionTranscriber::with_base_url("key".into(), server.url(), "gpt-4o-mini".into());
        let text = transcriber.transcribe(b"\x89PNG", "image/png").await.unwrap();

        assert_eq!(text, "Pancakes\n2 eggs\nMix and fry.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_blank_transcription_is_no_recipe() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(completion("  "))
            .create_async()
            .await;

        let transcriber =
            OpenAIVisionTranscriber::with_base_url("key".into(), server.url(), "gpt-4o-mini".into());
        let err = transcriber.transcribe(b"x", "image/jpeg").await.unwrap_err();
        assert!(matches!(err, TastebaseError::NoRecipeFound(_)));
    }

    #[tokio::test]
    async fn test_api_error_is_provider_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(400)
            .with_body(r#"{"error": {"message": "image too large"}}"#)
            .create_async()
            .await;

        let transcriber =
            OpenAIVisionTranscriber::with_base_url("key".into(), server.url(), "gpt-4o-mini".into());
        let err = transcriber.transcribe(b"x", "image/jpeg").await.unwrap_err();
        assert!(matches!(err, TastebaseError::Provider(m) if m.contains("image too large")));
    }
}
