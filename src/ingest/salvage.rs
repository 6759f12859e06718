//! Last-resort recovery of a recipe from text that no stage could parse.

use super::ingredient::parse_ingredient_line;
use super::page_text::truncate_chars;
use crate::model::{ParsedInstruction, ParsedRecipe, MAX_TITLE_CHARS};
use regex::Regex;
use std::sync::OnceLock;

pub const UNTITLED: &str = "Untitled recipe";

const MAX_FALLBACK_STEP_CHARS: usize = 4000;
const MAX_TITLE_LINE_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    None,
    Ingredients,
    Instructions,
}

struct Patterns {
    json_title: Regex,
    json_array: Regex,
    json_string: Regex,
    json_field: Regex,
    numbered: Regex,
    bullet: Regex,
    quantity_led: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        json_title: Regex::new(r#""(?:title|name)"\s*:\s*"((?:[^"\\]|\\.)*)""#)
            .expect("title pattern"),
        json_array: Regex::new(r#"(?s)"(ingredients|instructions|steps)"\s*:\s*\[(.*?)\]"#)
            .expect("array pattern"),
        json_string: Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("string pattern"),
        json_field: Regex::new(
            r#""(?:name|text|instruction|step)"\s*:\s*"((?:[^"\\]|\\.)*)""#,
        )
        .expect("field pattern"),
        numbered: Regex::new(r"(?i)^(?:step\s*)?\d{1,2}\s*[.):]\s*(.+)$")
            .expect("numbered pattern"),
        bullet: Regex::new(r"^[-*•·]\s*(.+)$").expect("bullet pattern"),
        quantity_led: Regex::new(r"^(?:\d|[½⅓⅔¼¾⅛])").expect("quantity pattern"),
    })
}

/// Build the best record possible from `raw` (usually model output), then
/// from `fallback_text` (the original input). Never fails and never returns
/// an empty recipe.
pub fn salvage(raw: &str, fallback_text: &str, source_url: Option<&str>) -> ParsedRecipe {
    let (mut ingredients, mut steps) = from_json_fragments(raw);
    if ingredients.is_empty() && steps.is_empty() {
        (ingredients, steps) = from_sections(raw);
    }
    if ingredients.is_empty() && steps.is_empty() && fallback_text != raw {
        (ingredients, steps) = from_sections(fallback_text);
    }

    let title = find_title(raw)
        .or_else(|| find_title(fallback_text))
        .unwrap_or_else(|| UNTITLED.to_string());

    let mut recipe = ParsedRecipe {
        title: truncate_chars(&title, MAX_TITLE_CHARS),
        ingredients: ingredients.iter().map(|l| parse_ingredient_line(l)).collect(),
        instructions: numbered(steps),
        source_url: source_url.map(String::from),
        ..Default::default()
    }
    .normalize();

    // Recovered lines can all normalize away (e.g. bare quantities).
    if recipe.ingredients.is_empty() && recipe.instructions.is_empty() {
        recipe.instructions = numbered(vec![whole_text_step(raw, fallback_text)]);
    }
    recipe
}

fn numbered(steps: Vec<String>) -> Vec<ParsedInstruction> {
    steps
        .into_iter()
        .enumerate()
        .map(|(idx, text)| ParsedInstruction::new(idx as u32 + 1, text))
        .collect()
}

fn whole_text_step(raw: &str, fallback_text: &str) -> String {
    let body = if fallback_text.trim().is_empty() {
        raw
    } else {
        fallback_text
    };
    let body = truncate_chars(body.trim(), MAX_FALLBACK_STEP_CHARS);
    if body.is_empty() {
        "No instructions could be recovered.".to_string()
    } else {
        body
    }
}

fn unescape(fragment: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{fragment}\""))
        .unwrap_or_else(|_| fragment.to_string())
}

/// Pulls string arrays out of JSON-ish output, e.g. truncated model replies.
fn from_json_fragments(raw: &str) -> (Vec<String>, Vec<String>) {
    let p = patterns();
    let mut ingredients = Vec::new();
    let mut steps = Vec::new();

    for caps in p.json_array.captures_iter(raw) {
        let body = &caps[2];
        let items: Vec<String> = if body.contains('{') {
            p.json_field
                .captures_iter(body)
                .map(|c| unescape(&c[1]))
                .collect()
        } else {
            p.json_string
                .captures_iter(body)
                .map(|c| unescape(&c[1]))
                .collect()
        };
        if &caps[1] == "ingredients" {
            ingredients.extend(items);
        } else {
            steps.extend(items);
        }
    }
    (ingredients, steps)
}

fn heading(line: &str) -> Option<Section> {
    let cleaned = line
        .trim_matches(|c: char| c == '#' || c == '*' || c == ':' || c == '=' || c.is_whitespace())
        .to_lowercase();
    if cleaned.len() > 30 {
        return None;
    }
    let first_word = cleaned
        .split(|c: char| !c.is_alphabetic())
        .next()
        .unwrap_or_default();
    match first_word.trim_end_matches('s') {
        "ingredient" => Some(Section::Ingredients),
        "method" | "instruction" | "direction" | "step" | "preparation" => {
            Some(Section::Instructions)
        }
        _ => None,
    }
}

fn from_sections(text: &str) -> (Vec<String>, Vec<String>) {
    let p = patterns();
    let mut section = Section::None;
    let mut ingredients = Vec::new();
    let mut steps = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(next) = heading(line) {
            section = next;
            continue;
        }
        let numbered = p.numbered.captures(line).map(|c| c[1].trim().to_string());
        let bulleted = p.bullet.captures(line).map(|c| c[1].trim().to_string());

        match section {
            Section::Ingredients => {
                if let Some(item) = bulleted {
                    ingredients.push(item);
                } else if p.quantity_led.is_match(line) || !line.ends_with('.') {
                    ingredients.push(line.to_string());
                }
            }
            Section::Instructions => {
                steps.push(numbered.or(bulleted).unwrap_or_else(|| line.to_string()));
            }
            Section::None => {
                if let Some(step) = numbered {
                    steps.push(step);
                }
            }
        }
    }
    (ingredients, steps)
}

fn find_title(text: &str) -> Option<String> {
    let p = patterns();
    if let Some(caps) = p.json_title.captures(text) {
        let title = unescape(&caps[1]).trim().to_string();
        if !title.is_empty() {
            return Some(title);
        }
    }

    text.lines()
        .map(|l| {
            l.trim()
                .trim_start_matches(['#', '*', '-'])
                .trim_end_matches('*')
                .trim()
        })
        .map(|l| {
            l.strip_prefix("Title:")
                .or_else(|| l.strip_prefix("title:"))
                .map(str::trim)
                .unwrap_or(l)
        })
        .find(|l| {
            !l.is_empty()
                && l.chars().count() <= MAX_TITLE_LINE_CHARS
                && heading(l).is_none()
                && !l.starts_with(['{', '[', '"', '`'])
                && !p.numbered.is_match(l)
        })
        .map(String::from)
}
