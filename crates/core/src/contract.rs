//! Response contract parsing.
//!
//! Models are told to answer with a bare JSON object but regularly wrap it in
//! prose or code fences anyway. Parsing runs in two stages: the whole text as
//! JSON, then the span from the first `{` to the last `}`. Anything else is a
//! [`TutorError::ContractViolation`]. No shape validation happens here; the
//! typed results in [`crate::types`] tolerate missing fields on their own.

use crate::error::{Result, TutorError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Parses raw model text into a JSON value using the two-stage strategy.
pub fn parse_contract(raw: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Ok(value);
    }

    let span = extract_object_span(raw).ok_or_else(|| {
        TutorError::ContractViolation("no JSON object found in model response".to_string())
    })?;

    debug!(
        prefix_len = raw.find('{').unwrap_or(0),
        span_len = span.len(),
        "Falling back to embedded JSON object"
    );
    serde_json::from_str::<Value>(span).map_err(|e| {
        TutorError::ContractViolation(format!("model response is not valid JSON: {}", e))
    })
}

/// Parses raw model text straight into one of the typed results.
///
/// A well-formed value that is not an object (a bare string, an array) is
/// treated as an empty object, so every field takes its default.
pub fn decode_contract<T>(raw: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let value = parse_contract(raw)?;
    Ok(from_contract_value(value))
}

/// Converts an already parsed value into a typed result, tolerating shape drift.
pub fn from_contract_value<T>(value: Value) -> T
where
    T: DeserializeOwned + Default,
{
    let object = match value {
        Value::Object(map) => Value::Object(map),
        other => {
            warn!(found = %json_kind(&other), "Model response is not a JSON object");
            Value::Object(Map::new())
        }
    };
    serde_json::from_value(object).unwrap_or_default()
}

/// The substring from the first `{` through the last `}`, if both exist in order.
fn extract_object_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
