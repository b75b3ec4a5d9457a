//! Request/response shape checks run around every plugin invocation

use op_core::{Error, Payload, Result};
use serde_json::Value;

use crate::schema::InputSchema;

/// Check a request payload against a schema and the nesting limit.
///
/// Collects every violation instead of stopping at the first one.
pub fn validate_input(
    payload: &Payload,
    schema: &InputSchema,
    max_depth: usize,
) -> std::result::Result<(), Vec<String>> {
    let mut errors: Vec<String> = schema
        .missing_required(payload)
        .map(|name| format!("Missing required field: {}", name))
        .collect();

    for (name, value) in payload {
        if name.is_empty() {
            errors.push("Field names must not be empty".to_string());
        }
        if let Some(error) = schema.check_field(name, value) {
            errors.push(error);
        }
    }

    let too_deep = match max_depth.checked_sub(1) {
        Some(budget) => payload.values().any(|value| exceeds_depth(value, budget)),
        None => true,
    };
    if too_deep {
        errors.push(format!(
            "Payload nesting depth exceeds maximum of {}",
            max_depth
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Plugin output must be a non-null mapping
pub fn validate_output(value: Value) -> Result<Payload> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::output_validation(format!(
            "Plugin returned {}, expected an object",
            json_type_name(&other)
        ))),
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whether `value` holds more than `budget` levels of containers.
///
/// Recursion never goes deeper than `budget`.
fn exceeds_depth(value: &Value, budget: usize) -> bool {
    let mut children: Box<dyn Iterator<Item = &Value>> = match value {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(map) => Box::new(map.values()),
        _ => return false,
    };
    match budget.checked_sub(1) {
        Some(rest) => children.any(|child| exceeds_depth(child, rest)),
        None => true,
    }
}
