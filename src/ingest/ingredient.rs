//! Free-text ingredient line parsing ("1 1/2 cups flour, sifted").

use crate::model::ParsedIngredient;
use regex::Regex;
use std::sync::OnceLock;

const UNITS: &[&str] = &[
    "cup", "cups", "c", "tablespoon", "tablespoons", "tbsp", "tbsps", "tbs", "tbl", "teaspoon",
    "teaspoons", "tsp", "tsps", "gram", "grams", "g", "kilogram", "kilograms", "kg",
    "milligram", "milligrams", "mg", "ounce", "ounces", "oz", "pound", "pounds", "lb", "lbs",
    "milliliter", "milliliters", "millilitre", "millilitres", "ml", "liter", "liters", "litre",
    "litres", "l", "pint", "pints", "pt", "quart", "quarts", "qt", "gallon", "gallons", "gal",
    "clove", "cloves", "can", "cans", "pinch", "pinches", "dash", "dashes", "slice", "slices",
    "stick", "sticks", "bunch", "bunches", "handful", "handfuls", "sprig", "sprigs", "package",
    "packages", "pkg", "piece", "pieces", "head", "heads",
];

const VULGAR_FRACTIONS: &[(char, &str)] = &[
    ('½', "1/2"),
    ('⅓', "1/3"),
    ('⅔', "2/3"),
    ('¼', "1/4"),
    ('¾', "3/4"),
    ('⅛', "1/8"),
    ('⅜', "3/8"),
    ('⅝', "5/8"),
    ('⅞', "7/8"),
];

fn quantity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let single = r"(?:\d+\s+\d+/\d+|\d+/\d+|\d+(?:[.,]\d+)?\s?[½⅓⅔¼¾⅛⅜⅝⅞]?|[½⅓⅔¼¾⅛⅜⅝⅞])";
        let pattern = format!(r"^(?P<qty>{single}(?:\s*(?:-|–|to)\s*{single})?)\s*(?P<rest>.*)$");
        Regex::new(&pattern).expect("quantity pattern is valid")
    })
}

/// Parse one ingredient line into quantity, unit, name and notes.
pub fn parse_ingredient_line(line: &str) -> ParsedIngredient {
    let line = line
        .trim()
        .trim_start_matches(['-', '*', '•', '·'])
        .trim();

    let (quantity, rest) = match quantity_regex().captures(line) {
        Some(caps) => (
            Some(normalize_quantity(&caps["qty"])),
            caps.name("rest").map_or("", |m| m.as_str()).to_string(),
        ),
        None => (None, line.to_string()),
    };

    let (unit, rest) = split_unit(&rest, quantity.is_some());
    let rest = rest
        .strip_prefix("of ")
        .map(str::to_string)
        .unwrap_or(rest);
    let (name, notes) = split_notes(&rest);

    ParsedIngredient {
        name,
        quantity,
        unit,
        notes,
    }
}

fn split_unit(rest: &str, has_quantity: bool) -> (Option<String>, String) {
    let mut parts = rest.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or_default();
    let remainder = parts.next().unwrap_or_default().trim_start();
    let candidate = first.trim_end_matches('.').to_lowercase();

    let is_unit = UNITS.contains(&candidate.as_str())
        && (has_quantity || candidate.chars().count() > 1)
        && !remainder.is_empty();
    if is_unit {
        (Some(candidate), remainder.to_string())
    } else {
        (None, rest.to_string())
    }
}

fn split_notes(rest: &str) -> (String, Option<String>) {
    let mut name = rest.trim().to_string();
    let mut notes = Vec::new();

    if name.ends_with(')') {
        if let Some(open) = name.rfind('(') {
            let inner = name[open + 1..name.len() - 1].trim().to_string();
            name = name[..open].trim().to_string();
            if !inner.is_empty() {
                notes.push(inner);
            }
        }
    }

    if let Some((before, after)) = name.split_once(',') {
        let after = after.trim().to_string();
        name = before.trim().to_string();
        if !after.is_empty() {
            notes.insert(0, after);
        }
    }

    let notes = if notes.is_empty() {
        None
    } else {
        Some(notes.join("; "))
    };
    (name, notes)
}

fn normalize_quantity(raw: &str) -> String {
    let mut expanded = String::with_capacity(raw.len() + 4);
    for c in raw.chars() {
        match VULGAR_FRACTIONS.iter().find(|(v, _)| *v == c) {
            Some((_, ascii)) => {
                expanded.push(' ');
                expanded.push_str(ascii);
            }
            None if c == '–' => expanded.push('-'),
            None if c == ',' => expanded.push('.'),
            None => expanded.push(c),
        }
    }

    let collapsed = expanded.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = collapsed.replace(" to ", "-");
    collapsed
        .split('-')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(
        quantity: Option<&str>,
        unit: Option<&str>,
        name: &str,
        notes: Option<&str>,
    ) -> ParsedIngredient {
        ParsedIngredient {
            name: name.to_string(),
            quantity: quantity.map(String::from),
            unit: unit.map(String::from),
            notes: notes.map(String::from),
        }
    }

    #[test]
    fn test_quantity_unit_name_notes() {
        assert_eq!(
            parse_ingredient_line("1 1/2 cups flour, sifted"),
            parsed(Some("1 1/2"), Some("cups"), "flour", Some("sifted"))
        );
        assert_eq!(
            parse_ingredient_line("2 Tbsp. olive oil"),
            parsed(Some("2"), Some("tbsp"), "olive oil", None)
        );
        assert_eq!(
            parse_ingredient_line("200g dark chocolate (70%)"),
            parsed(Some("200"), Some("g"), "dark chocolate", Some("70%"))
        );
    }

    #[test]
    fn test_unicode_fractions_and_ranges() {
        assert_eq!(
            parse_ingredient_line("½ tsp salt"),
            parsed(Some("1/2"), Some("tsp"), "salt", None)
        );
        assert_eq!(
            parse_ingredient_line("1½ cups milk"),
            parsed(Some("1 1/2"), Some("cups"), "milk", None)
        );
        assert_eq!(
            parse_ingredient_line("2-3 cloves garlic, minced"),
            parsed(Some("2-3"), Some("cloves"), "garlic", Some("minced"))
        );
        assert_eq!(
            parse_ingredient_line("0,5 l water"),
            parsed(Some("0.5"), Some("l"), "water", None)
        );
    }

    #[test]
    fn test_lines_without_quantity() {
        assert_eq!(
            parse_ingredient_line("- pinch of salt"),
            parsed(None, Some("pinch"), "salt", None)
        );
        assert_eq!(
            parse_ingredient_line("Salt and pepper, to taste"),
            parsed(None, None, "Salt and pepper", Some("to taste"))
        );
    }

    #[test]
    fn test_count_only() {
        assert_eq!(
            parse_ingredient_line("3 eggs"),
            parsed(Some("3"), None, "eggs", None)
        );
    }
}
