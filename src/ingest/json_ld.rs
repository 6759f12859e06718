use super::duration::iso8601_minutes;
use super::ingredient::parse_ingredient_line;
use crate::error::{Result, TastebaseError};
use crate::model::{ParsedInstruction, ParsedRecipe};
use html_escape::decode_html_entities;
use log::debug;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Extracts `schema.org/Recipe` data embedded as JSON-LD.
pub struct JsonLdExtractor;

fn script_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| {
        Selector::parse("script[type='application/ld+json']").expect("static selector")
    })
}

impl JsonLdExtractor {
    pub fn extract(&self, html: &str, source_url: &str) -> Result<ParsedRecipe> {
        let document = Html::parse_document(html);
        let scripts: Vec<String> = document
            .select(script_selector())
            .map(|script| script.text().collect())
            .collect();
        debug!(
            "JsonLdExtractor: Found {} JSON-LD script tags on {}",
            scripts.len(),
            source_url
        );

        for (index, raw_json) in scripts.iter().enumerate() {
            let Some(json_ld) = parse_lenient(raw_json) else {
                debug!("JsonLdExtractor: Script {} is not valid JSON", index);
                continue;
            };

            for candidate in recipe_candidates(&json_ld) {
                match serde_json::from_value::<JsonLdRecipe>(candidate.clone()) {
                    Ok(recipe) => {
                        let recipe = recipe
                            .into_parsed(source_url)
                            .normalize()
                            .drop_out_of_range();
                        match recipe.validate() {
                            Ok(()) => return Ok(recipe),
                            Err(e) => debug!("JsonLdExtractor: Rejected candidate: {}", e),
                        }
                    }
                    Err(e) => debug!("JsonLdExtractor: Failed to decode candidate: {}", e),
                }
            }
        }

        Err(TastebaseError::NoRecipeFound(format!(
            "no usable JSON-LD recipe on {source_url}"
        )))
    }
}

fn parse_lenient(raw: &str) -> Option<Value> {
    serde_json::from_str(raw.trim())
        .or_else(|_| serde_json::from_str(&repair_json(raw)))
        .ok()
}

fn is_recipe_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case("recipe"),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.eq_ignore_ascii_case("recipe")),
        _ => false,
    }
}

/// Recipe nodes at the root, in a root array, or inside `@graph`.
fn recipe_candidates(json_ld: &Value) -> Vec<&Value> {
    let mut candidates = Vec::new();
    match json_ld {
        Value::Array(items) => {
            for item in items {
                if is_recipe_type(item) {
                    candidates.push(item);
                } else if let Some(Value::Array(graph)) = item.get("@graph") {
                    candidates.extend(graph.iter().filter(|n| is_recipe_type(n)));
                }
            }
        }
        Value::Object(_) => {
            if is_recipe_type(json_ld) {
                candidates.push(json_ld);
            }
            if let Some(Value::Array(graph)) = json_ld.get("@graph") {
                candidates.extend(graph.iter().filter(|n| is_recipe_type(n)));
            }
        }
        _ => {}
    }
    candidates
}

#[derive(Debug, Deserialize)]
struct JsonLdRecipe {
    #[serde(default)]
    name: Option<String>,
    description: Option<TextValue>,
    image: Option<Value>,
    #[serde(rename = "recipeIngredient", alias = "ingredients")]
    recipe_ingredient: Option<OneOrMany<String>>,
    #[serde(rename = "recipeInstructions")]
    recipe_instructions: Option<Value>,
    #[serde(rename = "recipeYield")]
    recipe_yield: Option<Value>,
    #[serde(rename = "prepTime")]
    prep_time: Option<String>,
    #[serde(rename = "cookTime")]
    cook_time: Option<String>,
    #[serde(rename = "totalTime")]
    total_time: Option<String>,
    #[serde(rename = "recipeCategory")]
    recipe_category: Option<OneOrMany<String>>,
    #[serde(rename = "recipeCuisine")]
    recipe_cuisine: Option<OneOrMany<String>>,
    keywords: Option<OneOrMany<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextValue {
    String(String),
    Object { text: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

impl JsonLdRecipe {
    fn into_parsed(self, source_url: &str) -> ParsedRecipe {
        let ingredients = self
            .recipe_ingredient
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .iter()
            .map(|line| decode_html_symbols(line))
            .filter(|line| !line.trim().is_empty())
            .map(|line| parse_ingredient_line(&line))
            .collect();

        let mut steps = Vec::new();
        if let Some(instructions) = &self.recipe_instructions {
            collect_steps(instructions, &mut steps);
        }
        let instructions = steps
            .into_iter()
            .enumerate()
            .map(|(idx, text)| ParsedInstruction::new(idx as u32 + 1, text))
            .collect();

        let prep_time_minutes = self.prep_time.as_deref().and_then(iso8601_minutes);
        let mut cook_time_minutes = self.cook_time.as_deref().and_then(iso8601_minutes);
        if prep_time_minutes.is_none() && cook_time_minutes.is_none() {
            cook_time_minutes = self.total_time.as_deref().and_then(iso8601_minutes);
        }

        let mut tags = Vec::new();
        if let Some(category) = self.recipe_category {
            tags.extend(category.into_vec());
        }
        if let Some(keywords) = self.keywords {
            for keyword in keywords.into_vec() {
                tags.extend(keyword.split(',').map(|k| decode_html_symbols(k)));
            }
        }

        ParsedRecipe {
            title: decode_html_symbols(self.name.as_deref().unwrap_or_default()),
            description: self.description.map(|d| match d {
                TextValue::String(s) => decode_html_symbols(&s),
                TextValue::Object { text } => decode_html_symbols(&text),
            }),
            servings: self.recipe_yield.as_ref().and_then(servings_from_yield),
            prep_time_minutes,
            cook_time_minutes,
            difficulty: None,
            cuisine: self
                .recipe_cuisine
                .and_then(|c| c.into_vec().into_iter().next()),
            ingredients,
            instructions,
            tags,
            source_url: Some(source_url.to_string()),
            image_url: self.image.as_ref().and_then(first_image_url),
        }
    }
}

/// Flatten every instruction shape sites use: plain strings, HowToStep,
/// HowToSection with `itemListElement`, and nested arrays of those.
fn collect_steps(value: &Value, steps: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            let decoded = decode_html_symbols(text);
            steps.extend(
                decoded
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from),
            );
        }
        Value::Array(items) => {
            for item in items {
                collect_steps(item, steps);
            }
        }
        Value::Object(obj) => {
            if let Some(elements) = obj.get("itemListElement") {
                collect_steps(elements, steps);
            } else if let Some(text) = obj
                .get("text")
                .or_else(|| obj.get("name"))
                .and_then(Value::as_str)
            {
                let text = decode_html_symbols(text);
                if !text.trim().is_empty() {
                    steps.push(text.trim().to_string());
                }
            }
        }
        _ => {}
    }
}

fn servings_from_yield(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => first_integer(s),
        Value::Array(items) => items.iter().find_map(servings_from_yield),
        _ => None,
    }
}

fn first_integer(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn first_image_url(value: &Value) -> Option<String> {
    match value {
        Value::String(url) if !url.trim().is_empty() => Some(decode_html_symbols(url)),
        Value::Object(obj) => obj
            .get("url")
            .or_else(|| obj.get("contentUrl"))
            .and_then(first_image_url),
        Value::Array(items) => items.iter().find_map(first_image_url),
        _ => None,
    }
}

fn decode_html_symbols(text: &str) -> String {
    // Some sites double-encode entities (&amp;amp;)
    decode_html_entities(&decode_html_entities(text)).into_owned()
}

/// Best-effort repair of JSON-LD that sites hand-write: raw newlines in
/// strings, missing commas between members and trailing commas.
fn repair_json(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut last: Option<char> = None;

    for c in raw.trim().chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
            } else if c == '\\' {
                escaped = true;
                out.push(c);
            } else if c == '"' {
                in_string = false;
                out.push(c);
                last = Some(c);
            } else if c.is_control() {
                out.push(' ');
            } else {
                out.push(c);
            }
            continue;
        }

        if c.is_whitespace() {
            out.push(c);
            continue;
        }

        match c {
            '}' | ']' if last == Some(',') => {
                if let Some(pos) = out.rfind(',') {
                    out.remove(pos);
                }
            }
            ',' if matches!(last, Some(',') | Some('{') | Some('[')) => continue,
            '"' | '{' | '[' => {
                let ends_value = matches!(last, Some('"') | Some('}') | Some(']'))
                    || last.is_some_and(|l| l.is_ascii_alphanumeric());
                if ends_value {
                    out.push(',');
                }
            }
            _ => {}
        }

        if c == '"' {
            in_string = true;
        }
        out.push(c);
        last = Some(c);
    }

    out
}
