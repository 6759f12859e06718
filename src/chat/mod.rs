//! Conversational recipe discovery.

use crate::error::{Result, TastebaseError};
use crate::ingest::{decode_recipe, extract_json_object};
use crate::model::ParsedRecipe;
use crate::providers::{ChatMessage, CompletionRequest, LlmProvider, Role};
use log::{debug, warn};
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, OnceLock};

pub const DISCOVERY_PROMPT: &str = include_str!("discovery_prompt.txt");

/// Messages sent to the model per turn, including the new one
pub const MAX_HISTORY: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub message: String,
    pub suggestions: Vec<ParsedRecipe>,
}

fn recipe_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```recipe[ \t]*\r?\n?(.*?)```").expect("recipe block pattern"))
}

fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("blank line pattern"))
}

pub struct DiscoveryChat {
    provider: Arc<dyn LlmProvider>,
}

impl DiscoveryChat {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub async fn reply(&self, history: &[ChatMessage], user_message: &str) -> Result<ChatReply> {
        let user_message = user_message.trim();
        if user_message.is_empty() {
            return Err(TastebaseError::InvalidInput("message is empty".into()));
        }

        let mut request = CompletionRequest {
            system: DISCOVERY_PROMPT.to_string(),
            messages: history_window(history, user_message),
            ..Default::default()
        };
        request.temperature = Some(0.7);

        let raw = self.provider.complete(&request).await?;
        Ok(split_reply(&raw))
    }
}

/// Trailing slice of the conversation plus the new message. The window
/// never opens with an assistant turn.
fn history_window(history: &[ChatMessage], user_message: &str) -> Vec<ChatMessage> {
    let keep = MAX_HISTORY - 1;
    let tail = &history[history.len().saturating_sub(keep)..];
    let first_user = tail
        .iter()
        .position(|m| m.role == Role::User)
        .unwrap_or(tail.len());

    let mut messages: Vec<ChatMessage> = tail[first_user..].to_vec();
    messages.push(ChatMessage::user(user_message));
    messages
}

fn split_reply(raw: &str) -> ChatReply {
    let mut suggestions = Vec::new();

    for caps in recipe_block().captures_iter(raw) {
        let Some(json) = extract_json_object(&caps[1]) else {
            debug!("Recipe block without a JSON object");
            continue;
        };
        match decode_recipe(json) {
            Ok(recipe) => suggestions.push(recipe),
            Err(e) => warn!("Dropping invalid recipe suggestion: {}", e),
        }
    }

    let stripped = recipe_block().replace_all(raw, "");
    let message = blank_runs().replace_all(stripped.trim(), "\n\n").into_owned();

    ChatReply {
        message,
        suggestions,
    }
}
