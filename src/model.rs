use crate::error::{Result, TastebaseError};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_SERVINGS: u32 = 100;
pub const MAX_TIME_MINUTES: u32 = 48 * 60;

/// Structured recipe produced by any ingestion stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecipe {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_time_minutes: Option<u32>,
    #[serde(
        default,
        deserialize_with = "deserialize_difficulty",
        skip_serializing_if = "Option::is_none"
    )]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<ParsedIngredient>,
    #[serde(default)]
    pub instructions: Vec<ParsedInstruction>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedIngredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ParsedIngredient {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedInstruction {
    pub step_number: u32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_minutes: Option<u32>,
}

impl ParsedInstruction {
    pub fn new(step_number: u32, text: impl Into<String>) -> Self {
        Self {
            step_number,
            text: text.into(),
            time_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = TastebaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" | "beginner" | "simple" => Ok(Difficulty::Easy),
            "medium" | "intermediate" | "moderate" => Ok(Difficulty::Medium),
            "hard" | "difficult" | "advanced" => Ok(Difficulty::Hard),
            other => Err(TastebaseError::InvalidInput(format!(
                "unknown difficulty '{other}'"
            ))),
        }
    }
}

/// Unknown difficulty labels are dropped rather than rejected.
pub(crate) fn deserialize_difficulty<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Difficulty>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

impl ParsedRecipe {
    /// Check the recipe against the storage schema.
    pub fn validate(&self) -> Result<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(TastebaseError::InvalidRecipe("title is empty".into()));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(TastebaseError::InvalidRecipe(format!(
                "title is longer than {MAX_TITLE_CHARS} characters"
            )));
        }
        if self.ingredients.is_empty() && self.instructions.is_empty() {
            return Err(TastebaseError::InvalidRecipe(
                "recipe has neither ingredients nor instructions".into(),
            ));
        }
        if let Some(pos) = self
            .ingredients
            .iter()
            .position(|i| i.name.trim().is_empty())
        {
            return Err(TastebaseError::InvalidRecipe(format!(
                "ingredient {} has no name",
                pos + 1
            )));
        }
        if let Some(pos) = self
            .instructions
            .iter()
            .position(|i| i.text.trim().is_empty())
        {
            return Err(TastebaseError::InvalidRecipe(format!(
                "instruction {} is empty",
                pos + 1
            )));
        }
        if let Some(servings) = self.servings {
            if servings == 0 || servings > MAX_SERVINGS {
                return Err(TastebaseError::InvalidRecipe(format!(
                    "servings must be between 1 and {MAX_SERVINGS}, got {servings}"
                )));
            }
        }
        for (label, value) in [
            ("prep time", self.prep_time_minutes),
            ("cook time", self.cook_time_minutes),
        ] {
            if let Some(minutes) = value {
                if minutes > MAX_TIME_MINUTES {
                    return Err(TastebaseError::InvalidRecipe(format!(
                        "{label} of {minutes} minutes exceeds 48 hours"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Forget optional numbers the store cannot hold, so an extracted recipe
    /// with an odd yield or a multi-day proof is kept rather than rejected.
    pub fn drop_out_of_range(mut self) -> Self {
        self.servings = self.servings.filter(|s| (1..=MAX_SERVINGS).contains(s));
        self.prep_time_minutes = self.prep_time_minutes.filter(|m| *m <= MAX_TIME_MINUTES);
        self.cook_time_minutes = self.cook_time_minutes.filter(|m| *m <= MAX_TIME_MINUTES);
        self
    }

    /// Trim strings, drop blanks, renumber steps and dedupe tags.
    pub fn normalize(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = clean_optional(self.description);
        self.cuisine = clean_optional(self.cuisine);
        self.source_url = clean_optional(self.source_url);
        self.image_url = clean_optional(self.image_url);

        self.ingredients = self
            .ingredients
            .into_iter()
            .filter_map(|i| {
                let name = i.name.trim().to_string();
                if name.is_empty() {
                    return None;
                }
                Some(ParsedIngredient {
                    name,
                    quantity: clean_optional(i.quantity),
                    unit: clean_optional(i.unit),
                    notes: clean_optional(i.notes),
                })
            })
            .collect();

        self.instructions = self
            .instructions
            .into_iter()
            .map(|i| ParsedInstruction {
                text: i.text.trim().to_string(),
                ..i
            })
            .filter(|i| !i.text.is_empty())
            .enumerate()
            .map(|(idx, i)| ParsedInstruction {
                step_number: idx as u32 + 1,
                ..i
            })
            .collect();

        let mut seen = HashSet::new();
        self.tags = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();

        self
    }
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ParsedRecipe {
        ParsedRecipe {
            title: "Toast".into(),
            ingredients: vec![ParsedIngredient::named("bread")],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_minimal_recipe() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_title() {
        let recipe = ParsedRecipe {
            title: "   ".into(),
            ..minimal()
        };
        assert!(matches!(
            recipe.validate(),
            Err(TastebaseError::InvalidRecipe(_))
        ));
    }

    #[test]
    fn test_validate_requires_content() {
        let recipe = ParsedRecipe {
            title: "Nothing".into(),
            ..Default::default()
        };
        let err = recipe.validate().unwrap_err();
        assert!(err.to_string().contains("neither ingredients nor instructions"));
    }

    #[test]
    fn test_validate_bounds() {
        let recipe = ParsedRecipe {
            servings: Some(0),
            ..minimal()
        };
        assert!(recipe.validate().is_err());

        let recipe = ParsedRecipe {
            cook_time_minutes: Some(MAX_TIME_MINUTES + 1),
            ..minimal()
        };
        assert!(recipe.validate().unwrap_err().to_string().contains("cook time"));
    }

    #[test]
    fn test_normalize_renumbers_and_dedupes() {
        let recipe = ParsedRecipe {
            title: "  Soup ".into(),
            description: Some("  ".into()),
            ingredients: vec![
                ParsedIngredient::named(" leek "),
                ParsedIngredient::named(""),
            ],
            instructions: vec![
                ParsedInstruction::new(4, "Chop"),
                ParsedInstruction::new(9, "  "),
                ParsedInstruction::new(2, "Simmer"),
            ],
            tags: vec!["Soup".into(), "soup".into(), " Winter ".into(), "".into()],
            ..Default::default()
        }
        .normalize();

        assert_eq!(recipe.title, "Soup");
        assert_eq!(recipe.description, None);
        assert_eq!(recipe.ingredients, vec![ParsedIngredient::named("leek")]);
        assert_eq!(
            recipe.instructions,
            vec![
                ParsedInstruction::new(1, "Chop"),
                ParsedInstruction::new(2, "Simmer")
            ]
        );
        assert_eq!(recipe.tags, vec!["soup", "winter"]);
    }

    #[test]
    fn test_difficulty_is_lenient() {
        let recipe: ParsedRecipe = serde_json::from_str(
            r#"{"title": "x", "difficulty": "Intermediate", "ingredients": [{"name": "egg"}]}"#,
        )
        .unwrap();
        assert_eq!(recipe.difficulty, Some(Difficulty::Medium));

        let recipe: ParsedRecipe =
            serde_json::from_str(r#"{"title": "x", "difficulty": "chef-level"}"#).unwrap();
        assert_eq!(recipe.difficulty, None);
    }
}
