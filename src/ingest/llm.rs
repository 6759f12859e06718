use super::ingredient::parse_ingredient_line;
use super::page_text::truncate_chars;
use crate::error::{Result, TastebaseError};
use crate::model::{
    deserialize_difficulty, Difficulty, ParsedIngredient, ParsedInstruction, ParsedRecipe,
};
use crate::providers::{CompletionRequest, LlmProvider};
use log::debug;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;

/// System prompt for turning free text into recipe JSON.
///
/// Kept in `parser_prompt.txt` so it can be edited without Rust string escaping.
pub const RECIPE_PARSER_PROMPT: &str = include_str!("parser_prompt.txt");

/// What the model produced for a piece of text
#[derive(Debug, Clone, PartialEq)]
pub enum LlmExtraction {
    /// Valid recipe JSON that passed validation
    Parsed(ParsedRecipe),
    /// Output that could not be decoded as recipe JSON (kept for salvage)
    Unparseable(String),
}

pub struct LlmRecipeExtractor {
    provider: Arc<dyn LlmProvider>,
    max_prompt_chars: usize,
}

impl LlmRecipeExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>, max_prompt_chars: usize) -> Self {
        Self {
            provider,
            max_prompt_chars,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub async fn extract(&self, text: &str, source_url: Option<&str>) -> Result<LlmExtraction> {
        let mut user = String::new();
        if let Some(url) = source_url {
            user.push_str(&format!("Source: {url}\n\n"));
        }
        user.push_str(&truncate_chars(text, self.max_prompt_chars));

        let mut request = CompletionRequest::new(RECIPE_PARSER_PROMPT, user);
        request.json_mode = true;

        let raw = self.provider.complete(&request).await?;
        debug!("LlmRecipeExtractor: raw model output: {}", raw);

        let Some(json) = extract_json_object(&raw) else {
            return Ok(LlmExtraction::Unparseable(raw));
        };

        match decode_recipe(json) {
            Ok(mut recipe) => {
                // The page we fetched beats any URL the model names.
                if let Some(url) = source_url {
                    recipe.source_url = Some(url.to_string());
                }
                Ok(LlmExtraction::Parsed(recipe))
            }
            Err(TastebaseError::Json(e)) => {
                debug!("LlmRecipeExtractor: output is not recipe JSON: {}", e);
                Ok(LlmExtraction::Unparseable(raw))
            }
            Err(e) => Err(e),
        }
    }
}

/// First balanced `{...}` in model output, ignoring code fences and prose.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode model JSON into a normalized, validated recipe.
///
/// Shape errors surface as `TastebaseError::Json`, a refusal as `NotARecipe`
/// and schema violations as `InvalidRecipe`.
pub fn decode_recipe(json: &str) -> Result<ParsedRecipe> {
    let raw: LlmRecipe = serde_json::from_str(json)?;

    if let Some(reason) = raw.error.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        if raw.ingredients.is_empty() && raw.instructions.is_empty() {
            return Err(TastebaseError::NotARecipe(reason.to_string()));
        }
    }

    let recipe = raw.into_parsed().normalize().drop_out_of_range();
    recipe.validate()?;
    Ok(recipe)
}

#[derive(Debug, Deserialize)]
struct LlmRecipe {
    #[serde(default, alias = "name")]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    servings: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32", alias = "prep_time")]
    prep_time_minutes: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32", alias = "cook_time")]
    cook_time_minutes: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_difficulty")]
    difficulty: Option<Difficulty>,
    #[serde(default)]
    cuisine: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    ingredients: Vec<LlmIngredient>,
    #[serde(default, deserialize_with = "null_as_empty", alias = "steps")]
    instructions: Vec<LlmInstruction>,
    #[serde(default, deserialize_with = "null_as_empty")]
    tags: Vec<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LlmIngredient {
    Line(String),
    Structured {
        name: String,
        #[serde(default, deserialize_with = "lenient_string", alias = "amount")]
        quantity: Option<String>,
        #[serde(default)]
        unit: Option<String>,
        #[serde(default)]
        notes: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LlmInstruction {
    Text(String),
    Structured {
        #[serde(alias = "instruction", alias = "step")]
        text: String,
        #[serde(default, deserialize_with = "lenient_u32")]
        time_minutes: Option<u32>,
    },
}

impl LlmRecipe {
    fn into_parsed(self) -> ParsedRecipe {
        let ingredients = self
            .ingredients
            .into_iter()
            .map(|ingredient| match ingredient {
                LlmIngredient::Line(line) => parse_ingredient_line(&line),
                LlmIngredient::Structured {
                    name,
                    quantity,
                    unit,
                    notes,
                } => ParsedIngredient {
                    name,
                    quantity,
                    unit,
                    notes,
                },
            })
            .collect();

        let instructions = self
            .instructions
            .into_iter()
            .enumerate()
            .map(|(idx, instruction)| {
                let (text, time_minutes) = match instruction {
                    LlmInstruction::Text(text) => (text, None),
                    LlmInstruction::Structured { text, time_minutes } => (text, time_minutes),
                };
                ParsedInstruction {
                    step_number: idx as u32 + 1,
                    text,
                    time_minutes,
                }
            })
            .collect();

        ParsedRecipe {
            title: self.title.unwrap_or_default(),
            description: self.description,
            servings: self.servings,
            prep_time_minutes: self.prep_time_minutes,
            cook_time_minutes: self.cook_time_minutes,
            difficulty: self.difficulty,
            cuisine: self.cuisine,
            ingredients,
            instructions,
            tags: self.tags,
            source_url: self.source_url,
            image_url: self.image_url,
        }
    }
}

/// Accepts `4`, `4.0`, `"4"` and `"4 servings"`; anything else is `None`.
fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => {
            let digits: String = s
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        }
        _ => None,
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts strings and numbers, rendering numbers as written.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
