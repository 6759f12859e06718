use crate::error::{Result, TastebaseError};
use url::Url;

/// What the user handed us
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeInput {
    Url(Url),
    Text(String),
}

/// Decide whether the input is a web address or recipe text.
///
/// Only a single token counts as a URL; a pasted recipe that happens to
/// mention a link is still text.
pub fn classify(input: &str) -> Result<RecipeInput> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TastebaseError::InvalidInput("input is empty".into()));
    }

    if !trimmed.contains(char::is_whitespace) {
        let candidate = if trimmed.to_ascii_lowercase().starts_with("www.") {
            format!("https://{trimmed}")
        } else {
            trimmed.to_string()
        };

        if let Ok(url) = Url::parse(&candidate) {
            let web_scheme = matches!(url.scheme(), "http" | "https");
            let has_host = url.host_str().is_some_and(|h| !h.is_empty());
            if web_scheme && has_host {
                return Ok(RecipeInput::Url(url));
            }
        }
    }

    Ok(RecipeInput::Text(trimmed.to_string()))
}
