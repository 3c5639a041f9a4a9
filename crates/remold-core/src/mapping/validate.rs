//! Constraint validation over derived values
//!
//! Validation runs inside the value pipeline after the value is derived and
//! transformed, and before `default` and coercion. Failures never abort the
//! pipeline directly; they accumulate as structured records on the shared
//! error list and the enclosing mapping stops after the current pairing.
//!
//! The constraint set is JSON-Schema-like, not conformant. Numeric bounds are
//! enforced whenever the constraint key is present, including bounds of zero.
//!
//! Copyright (c) 2025 Remold Team
//! Licensed under the Apache-2.0 license

use serde::Serialize;
use serde_json::Value;

use super::context::Context;
use super::descriptor::is_truthy;

/// One validation failure, in the shape surfaced by the mapping report
///
/// The violated constraint serializes as a dynamically keyed field, so a
/// record renders as `{"source": "/n", "value": 3, "minimum": 10, "message": …}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// The offending value, `null` when it was undefined
    pub value: Value,
    #[serde(flatten)]
    pub constraint: Constraint,
    pub message: String,
}

/// The violated constraint together with its configured bound
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Constraint {
    Type(String),
    Maximum(f64),
    Minimum(f64),
    MultipleOf(f64),
    MinLength(u64),
    MaxLength(u64),
    Enum(Vec<Value>),
    Pattern(String),
    Required(bool),
}

/// Check `value` against every constraint key of `descriptor`, appending one
/// record per violation
pub fn validate(descriptor: &Value, value: &Option<Value>, context: &Context) {
    if let Some(expected) = descriptor.get("type").and_then(Value::as_str) {
        if let Some(v) = value {
            if !type_matches(expected, v) {
                push(
                    descriptor,
                    value,
                    Constraint::Type(expected.to_string()),
                    format!("expected {}, got {}", expected, type_name(v)),
                    context,
                );
            }
        }
    }

    if let Some(maximum) = descriptor.get("maximum").and_then(Value::as_f64) {
        if let Some(number) = finite_number(value) {
            if number > maximum {
                push(
                    descriptor,
                    value,
                    Constraint::Maximum(maximum),
                    format!("{} is greater than {}", number, maximum),
                    context,
                );
            }
        }
    }

    if let Some(minimum) = descriptor.get("minimum").and_then(Value::as_f64) {
        if let Some(number) = finite_number(value) {
            if number < minimum {
                push(
                    descriptor,
                    value,
                    Constraint::Minimum(minimum),
                    format!("{} is less than {}", number, minimum),
                    context,
                );
            }
        }
    }

    if let Some(step) = descriptor.get("multipleOf").and_then(Value::as_f64) {
        if let Some(number) = finite_number(value) {
            if !is_multiple_of(number, step) {
                push(
                    descriptor,
                    value,
                    Constraint::MultipleOf(step),
                    format!("{} is not a multiple of {}", number, step),
                    context,
                );
            }
        }
    }

    if let Some(bound) = descriptor.get("minLength").and_then(Value::as_u64) {
        if let Some(length) = length_of(value) {
            if length < bound {
                push(
                    descriptor,
                    value,
                    Constraint::MinLength(bound),
                    format!("length {} is less than {}", length, bound),
                    context,
                );
            }
        }
    }

    if let Some(bound) = descriptor.get("maxLength").and_then(Value::as_u64) {
        if let Some(length) = length_of(value) {
            if length > bound {
                push(
                    descriptor,
                    value,
                    Constraint::MaxLength(bound),
                    format!("length {} is greater than {}", length, bound),
                    context,
                );
            }
        }
    }

    if let Some(allowed) = descriptor.get("enum").and_then(Value::as_array) {
        if let Some(v) = value {
            if !allowed.contains(v) {
                push(
                    descriptor,
                    value,
                    Constraint::Enum(allowed.clone()),
                    format!("{} is not one of the allowed values", v),
                    context,
                );
            }
        }
    }

    if let Some(pattern) = descriptor.get("pattern").and_then(Value::as_str) {
        if let Some(Value::String(text)) = value {
            match regex::Regex::new(pattern) {
                Ok(expression) => {
                    if !expression.is_match(text) {
                        push(
                            descriptor,
                            value,
                            Constraint::Pattern(pattern.to_string()),
                            format!("'{}' does not match /{}/", text, pattern),
                            context,
                        );
                    }
                }
                Err(parse_error) => {
                    log::debug!("skipping unparseable pattern '{}': {}", pattern, parse_error);
                }
            }
        }
    }

    if descriptor.get("required").map_or(false, is_truthy) && value.is_none() {
        push(
            descriptor,
            value,
            Constraint::Required(true),
            "value is required".to_string(),
            context,
        );
    }
}

fn push(
    descriptor: &Value,
    value: &Option<Value>,
    constraint: Constraint,
    message: String,
    context: &Context,
) {
    let addressing = |key: &str| descriptor.get(key).and_then(Value::as_str).map(String::from);
    context.push_error(ValidationError {
        source: addressing("source").or_else(|| Some(context.paths.source.clone())),
        target: addressing("target").or_else(|| Some(context.paths.target.clone())),
        input: addressing("input"),
        output: addressing("output"),
        value: value.clone().unwrap_or(Value::Null),
        constraint,
        message,
    });
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "array" => value.is_array(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "object" => value.is_object(),
        "string" => value.is_string(),
        // integers accept anything that converts to a whole number, so a
        // numeric string like "3" passes
        "integer" => to_number(value).is_some_and(|n| n.is_finite() && n.fract() == 0.0),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.parse::<f64>().ok(),
        _ => None,
    }
}

fn finite_number(value: &Option<Value>) -> Option<f64> {
    match value {
        Some(Value::Number(number)) => number.as_f64().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn length_of(value: &Option<Value>) -> Option<u64> {
    match value {
        Some(Value::String(text)) => Some(text.chars().count() as u64),
        Some(Value::Array(items)) => Some(items.len() as u64),
        _ => None,
    }
}

/// Decimal-aware multiple check, scaling both operands into integers first
fn is_multiple_of(number: f64, step: f64) -> bool {
    if step == 0.0 {
        return true;
    }
    let decimals = step
        .to_string()
        .split('.')
        .nth(1)
        .map_or(0, |fraction| fraction.len()) as i32;
    let factor = 10f64.powi(decimals);
    let scaled_number = (number * factor).round();
    let scaled_step = (step * factor).round();
    if scaled_step == 0.0 {
        return true;
    }
    scaled_number % scaled_step == 0.0
}
