//! Wire Normalization
//!
//! The backend sends loosely typed payloads: prices and balances as numeric
//! strings, images as either a path or a JSON-encoded list of paths, tags as
//! arrays or comma-joined strings. Everything is normalized here, once, so
//! the rest of the crate only sees typed values.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .ok()
        .or_else(|| Decimal::from_scientific(raw).ok())
}

/// Decimal from a JSON number or numeric string. `None` for anything else.
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Deserialize a money amount; missing, null or non-numeric becomes zero.
pub fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(decimal_from_value)
        .unwrap_or(Decimal::ZERO))
}

/// Deserialize an optional money amount; unparseable becomes `None`.
pub fn lenient_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(decimal_from_value))
}

/// Deserialize an identifier sent either as a number or a string.
pub fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected id, found {other}"))),
    }
}

/// Deserialize a flag that may be null or missing.
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(
        Option::<Value>::deserialize(deserializer)?,
        Some(Value::Bool(true))
    ))
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn value_to_tag(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Normalize a tag field: array, JSON array in a string, or comma-joined.
pub fn tags_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .map(value_to_tag)
            .filter(|t| !t.is_empty())
            .collect(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
                    return items
                        .iter()
                        .map(value_to_tag)
                        .filter(|t| !t.is_empty())
                        .collect();
                }
            }
            split_tags(trimmed)
        }
        other => split_tags(&other.to_string()),
    }
}

/// Image paths from an image field: a single path, a JSON array, or a
/// JSON-encoded array inside a string. Empty entries are dropped.
pub fn image_paths_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Array(_)) => image_paths_from_value(&parsed),
            _ if s.trim().is_empty() => Vec::new(),
            _ => vec![s.trim().to_string()],
        },
        _ => Vec::new(),
    }
}

/// Resolve a backend-relative upload path against the asset host.
pub fn resolve_asset(path: &str, asset_base: &str) -> String {
    if path.starts_with("uploads/") {
        format!("{}/{}", asset_base.trim_end_matches('/'), path)
    } else {
        path.to_string()
    }
}
