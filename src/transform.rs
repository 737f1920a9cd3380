//! Provider-specific relabeling of raw KML/GPX property names.

use geojson::JsonObject;
use serde_json::Value as JsonValue;

pub const PARKS_AND_RECREATION: &str = "Idaho Parks & Recreation";
pub const GEOLOGICAL_SURVEY: &str = "Idaho Geological Survey";

/// Seasonal vehicle access flags and their display names.
const VEHICLES: [(&str, &str); 5] = [
    ("ATV", "ATV"),
    ("AUTOMOBILE", "Automobile"),
    ("JEEP", "Jeep"),
    ("MOTORCYCLE", "Motorcycle"),
    ("UTV", "UTV"),
];

/// Designations longer than this are internal IDs, not route numbers.
const MAX_LABEL_DIGITS: usize = 3;

/// Rewrite `props` for the named provider. Unknown providers pass through.
pub fn relabel(provider: &str, props: JsonObject) -> JsonObject {
    match provider {
        PARKS_AND_RECREATION => parks_and_recreation(props),
        GEOLOGICAL_SURVEY => geological_survey(props),
        _ => props,
    }
}

fn parks_and_recreation(mut from: JsonObject) -> JsonObject {
    let mut out = JsonObject::new();

    let name = take_text(&mut from, "NAME");
    let number = from.shift_remove("ROUTE_NO");
    if let Some(label) = label(name.as_deref(), number.as_ref()) {
        out.insert("Label".to_string(), JsonValue::String(label));
    }

    for (key, display) in VEHICLES {
        if let Some(allowed) = from.shift_remove(key) {
            out.insert(format!("{display} Allowed"), allowed);
        }
    }

    if let Some(who) = take_text(&mut from, "JURISDICTION") {
        out.insert("Jurisdiction".to_string(), JsonValue::String(title_case(&who)));
    }

    out.extend(from);
    out
}

fn geological_survey(mut from: JsonObject) -> JsonObject {
    let mut out = JsonObject::new();

    let name = take_text(&mut from, "DEPOSIT").or_else(|| take_text(&mut from, "SITE_NAME"));
    let number = from.shift_remove("MINE_NO");
    if let Some(label) = label(name.as_deref(), number.as_ref()) {
        out.insert("Label".to_string(), JsonValue::String(label));
    }

    if let Some(owner) = take_text(&mut from, "LAND_OWNER") {
        out.insert("Land Owner".to_string(), JsonValue::String(title_case(&owner)));
    }
    if let Some(commodity) = take_text(&mut from, "COMMODITY") {
        out.insert("Commodity".to_string(), JsonValue::String(title_case(&commodity)));
    }

    out.extend(from);
    out
}

/// Remove a key, keeping it only when it holds non-empty text or a number.
fn take_text(props: &mut JsonObject, key: &str) -> Option<String> {
    match props.shift_remove(key)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Title-cased name followed by a short numeric designation.
///
/// The number is left off when it is already part of the name or has more
/// than [`MAX_LABEL_DIGITS`] digits.
fn label(name: Option<&str>, number: Option<&JsonValue>) -> Option<String> {
    let digits = number.and_then(designation);
    let name = name.map(title_case).filter(|n| !n.is_empty());

    match (name, digits) {
        (Some(name), Some(digits))
            if digits.len() <= MAX_LABEL_DIGITS && !contains_number(&name, &digits) =>
        {
            Some(format!("{name} {digits}"))
        }
        (Some(name), _) => Some(name),
        (None, Some(digits)) if digits.len() <= MAX_LABEL_DIGITS => Some(digits),
        _ => None,
    }
}

/// Whole-number designation as digits, from a JSON number or numeric text.
fn designation(value: &JsonValue) -> Option<String> {
    let n = match value {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() || n <= 0.0 || n.fract() != 0.0 {
        return None;
    }
    Some(format!("{}", n as u64))
}

fn contains_number(name: &str, digits: &str) -> bool {
    name.split(|c: char| !c.is_ascii_digit())
        .any(|run| run.trim_start_matches('0') == digits)
}

/// Capitalize the first letter of every word and lowercase the rest.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
