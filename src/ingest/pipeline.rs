use super::fetcher::PageFetcher;
use super::input::{classify, RecipeInput};
use super::json_ld::JsonLdExtractor;
use super::llm::{LlmExtraction, LlmRecipeExtractor};
use super::page_text::visible_text;
use super::salvage::salvage;
use crate::config::AppConfig;
use crate::error::{Result, TastebaseError};
use crate::model::ParsedRecipe;
use crate::media::sniff_content_type;
use crate::providers::{ImageTranscriber, LlmProvider};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Which stage of the chain produced the recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMethod {
    JsonLd,
    Llm,
    Salvage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    pub recipe: ParsedRecipe,
    pub method: ParseMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Turns a URL, pasted text or a recipe photo into a recipe.
///
/// Stages, cheapest first:
/// 1. JSON-LD on the fetched page (URLs only, no model call)
/// 2. LLM extraction of the page text or the pasted text
/// 3. Regex salvage of whatever the model (or the user) produced
///
/// Photos are transcribed first and then enter the chain as text.
///
/// Every stage is side-effect free, so parsing the same input twice is safe.
pub struct RecipeParser {
    fetcher: PageFetcher,
    llm: Option<LlmRecipeExtractor>,
    transcriber: Option<Arc<dyn ImageTranscriber>>,
    max_prompt_chars: usize,
}

impl RecipeParser {
    pub fn new(
        fetcher: PageFetcher,
        provider: Option<Arc<dyn LlmProvider>>,
        max_prompt_chars: usize,
    ) -> Self {
        Self {
            fetcher,
            llm: provider.map(|p| LlmRecipeExtractor::new(p, max_prompt_chars)),
            transcriber: None,
            max_prompt_chars,
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn ImageTranscriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn from_config(config: &AppConfig, provider: Option<Arc<dyn LlmProvider>>) -> Result<Self> {
        let fetcher = PageFetcher::new(
            Duration::from_secs(config.ai.timeout),
            &config.ingest.user_agent,
            config.ingest.max_page_bytes,
        )?;
        Ok(Self::new(fetcher, provider, config.ingest.max_prompt_chars))
    }

    pub async fn parse(&self, input: &str) -> Result<ParseOutcome> {
        let mut outcome = match classify(input)? {
            RecipeInput::Url(url) => self.parse_url(url.as_str()).await?,
            RecipeInput::Text(text) => self.parse_text(&text, None, Vec::new()).await?,
        };

        if outcome.source_url.is_some() {
            outcome.recipe.source_url = outcome.source_url.clone();
        }
        info!(
            "Parsed '{}' via {:?} ({} ingredients, {} steps)",
            outcome.recipe.title,
            outcome.method,
            outcome.recipe.ingredients.len(),
            outcome.recipe.instructions.len()
        );
        Ok(outcome)
    }

    /// Read a recipe photo or scan, then parse the transcribed text.
    pub async fn parse_image(&self, image: &[u8]) -> Result<ParseOutcome> {
        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            TastebaseError::NotConfigured("no vision model for recipe photos".into())
        })?;
        let content_type = sniff_content_type(image)?;

        let text = transcriber.transcribe(image, content_type).await?;
        debug!("Transcribed {} characters from {} photo", text.len(), content_type);

        let outcome = self.parse_text(&text, None, Vec::new()).await?;
        info!(
            "Parsed photo '{}' via {:?}",
            outcome.recipe.title, outcome.method
        );
        Ok(outcome)
    }

    async fn parse_url(&self, url: &str) -> Result<ParseOutcome> {
        let html = self.fetcher.fetch(url).await?;

        match JsonLdExtractor.extract(&html, url) {
            Ok(recipe) => {
                return Ok(ParseOutcome {
                    recipe,
                    method: ParseMethod::JsonLd,
                    source_url: Some(url.to_string()),
                    warnings: Vec::new(),
                })
            }
            Err(e) => debug!("JSON-LD extraction failed for {}: {}", url, e),
        }

        let text = visible_text(&html, self.max_prompt_chars);
        let warnings = vec!["No structured recipe data found on the page".to_string()];
        self.parse_text(&text, Some(url), warnings).await
    }

    async fn parse_text(
        &self,
        text: &str,
        source_url: Option<&str>,
        mut warnings: Vec<String>,
    ) -> Result<ParseOutcome> {
        let salvaged = |raw: &str, warnings: Vec<String>| ParseOutcome {
            recipe: salvage(raw, text, source_url),
            method: ParseMethod::Salvage,
            source_url: source_url.map(String::from),
            warnings,
        };

        let Some(llm) = &self.llm else {
            warnings.push("No AI provider configured; recipe was recovered heuristically".into());
            return Ok(salvaged(text, warnings));
        };

        match llm.extract(text, source_url).await {
            Ok(LlmExtraction::Parsed(recipe)) => Ok(ParseOutcome {
                recipe,
                method: ParseMethod::Llm,
                source_url: source_url.map(String::from),
                warnings,
            }),
            Ok(LlmExtraction::Unparseable(raw)) => {
                warn!("{} returned output that is not recipe JSON", llm.provider_name());
                warnings.push("AI output was not valid recipe JSON; recovered what we could".into());
                Ok(salvaged(&raw, warnings))
            }
            Err(TastebaseError::NotARecipe(reason)) => Err(TastebaseError::NotARecipe(reason)),
            Err(e) => {
                warn!("AI extraction failed, salvaging input text: {}", e);
                warnings.push(format!("AI extraction failed: {e}"));
                Ok(salvaged(text, warnings))
            }
        }
    }
}
