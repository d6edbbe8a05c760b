//! Model reply parsing
//!
//! Vision models do not reliably return bare JSON. Replies are tried in order:
//! 1. JSON object embedded anywhere in the text (code fences, prose around it)
//! 2. Labelled lines ("Part Type: ...", "Part Numbers: ...")
//! 3. Keyword heuristics over free text

use crate::types::{IdentifyError, RawIdentification};
use serde_json::Value;
use tracing::debug;

/// Part terms recognised by the keyword heuristic, most specific first
const AUTO_PART_TERMS: [&str; 28] = [
    "brake rotor", "brake pad", "brake disc", "brake caliper",
    "air filter", "oil filter", "fuel filter",
    "spark plug", "ignition coil", "alternator", "starter",
    "radiator", "thermostat", "water pump",
    "shock absorber", "strut", "spring",
    "tie rod", "ball joint", "control arm",
    "headlight", "tail light", "taillight", "mirror",
    "bumper", "fender", "hood", "door",
];

const CONDITION_TERMS: [&str; 5] = ["new", "used", "refurbished", "damaged", "worn"];

/// Parse a model reply into a raw identification
///
/// # Errors
/// `IdentifyError::Parse` when the reply is empty.
pub fn parse_model_reply(text: &str) -> Result<RawIdentification, IdentifyError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(IdentifyError::Parse("Model returned an empty reply".to_string()));
    }

    if let Some(json) = extract_json_object(trimmed) {
        match serde_json::from_str::<Value>(json) {
            Ok(value) if value.is_object() => {
                debug!("Parsed model reply as JSON object");
                let mut raw = from_json_value(&value);
                raw.raw_text = Some(trimmed.to_string());
                return Ok(raw);
            }
            Ok(_) | Err(_) => debug!("Embedded braces were not a JSON object; trying labelled lines"),
        }
    }

    if let Some(mut raw) = parse_labelled(trimmed) {
        debug!("Parsed model reply as labelled lines");
        raw.raw_text = Some(trimmed.to_string());
        return Ok(raw);
    }

    debug!("Falling back to keyword heuristics for model reply");
    Ok(parse_keywords(trimmed))
}

/// Slice from the first `{` to the last `}`
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Lenient mapping from a JSON object
///
/// Accepts `name`/`part_type` for the part name, and arrays or comma
/// separated strings for compatibility.
fn from_json_value(value: &Value) -> RawIdentification {
    let string_field = |keys: &[&str]| -> Option<String> {
        keys.iter().find_map(|key| match value.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Array(items)) => items
                .iter()
                .find_map(|item| item.as_str().map(|s| s.trim().to_string()))
                .filter(|s| !s.is_empty()),
            _ => None,
        })
    };

    let compatibility = ["compatibility", "compatible_vehicles", "vehicles"]
        .iter()
        .find_map(|key| value.get(*key))
        .map(|v| match v {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Value::String(s) => split_list(s),
            _ => Vec::new(),
        })
        .unwrap_or_default();

    RawIdentification {
        part_name: string_field(&["part_name", "name", "part_type"])
            .unwrap_or_else(|| "Unknown Part".to_string()),
        part_number: string_field(&["part_number", "part_numbers"]),
        category: string_field(&["category"]).unwrap_or_else(|| "Auto Parts".to_string()),
        condition: string_field(&["condition"]).unwrap_or_else(|| "Unknown".to_string()),
        description: string_field(&["description"]).unwrap_or_default(),
        compatibility,
        brand: string_field(&["brand", "manufacturer"]),
        raw_text: None,
    }
}

/// Parse "Label: value" lines
///
/// Returns `None` unless a part name label is present.
fn parse_labelled(text: &str) -> Option<RawIdentification> {
    let mut raw = RawIdentification {
        category: "Auto Parts".to_string(),
        condition: "Unknown".to_string(),
        ..Default::default()
    };
    let mut found_name = false;

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*', ' ']);
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().trim_matches(['[', ']']).trim();
        if value.is_empty() {
            continue;
        }

        match label.trim().to_lowercase().as_str() {
            "part type" | "part name" => {
                raw.part_name = value.to_string();
                found_name = true;
            }
            "part number" | "part numbers" => {
                raw.part_number = split_list(value).into_iter().next();
            }
            "brand" | "manufacturer" => raw.brand = Some(value.to_string()),
            "condition" => raw.condition = value.to_string(),
            "category" => raw.category = value.to_string(),
            "description" => raw.description = value.to_string(),
            "compatible vehicles" | "compatibility" => raw.compatibility = split_list(value),
            _ => {}
        }
    }

    found_name.then_some(raw)
}

/// Best-effort extraction from free text
fn parse_keywords(text: &str) -> RawIdentification {
    let lower = text.to_lowercase();

    let part_name = AUTO_PART_TERMS
        .iter()
        .find(|term| lower.contains(*term))
        .map(|term| title_case(term))
        .unwrap_or_else(|| "Unknown Part".to_string());

    let condition = CONDITION_TERMS
        .iter()
        .find(|term| lower.split(|c: char| !c.is_alphanumeric()).any(|w| w == **term))
        .map(|term| title_case(term))
        .unwrap_or_else(|| "Unknown".to_string());

    RawIdentification {
        part_name,
        part_number: find_part_number(text),
        category: "Auto Parts".to_string(),
        condition,
        description: text.to_string(),
        compatibility: Vec::new(),
        brand: None,
        raw_text: Some(text.to_string()),
    }
}

/// First token that looks like a part number
///
/// Six or more alphanumerics (dashes allowed) containing at least one digit.
fn find_part_number(text: &str) -> Option<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .map(|token| token.trim_matches('-'))
        .find(|token| {
            let significant = token.chars().filter(|c| c.is_ascii_alphanumeric()).count();
            significant >= 6 && token.chars().any(|c| c.is_ascii_digit())
        })
        .map(str::to_string)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn title_case(term: &str) -> String {
    term.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
