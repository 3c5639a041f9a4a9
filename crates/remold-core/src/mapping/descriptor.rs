//! Descriptor shape inspection and dereferencing
//!
//! Descriptors stay untyped `serde_json::Value` trees; shape is an open sum
//! discriminated by key presence. An object carrying `mapping` or `each` is a
//! mapping node, `$ref` is a reference, an array is a disjunction of
//! variants, and a string is a mapping name or a pointer.
//!
//! Copyright (c) 2025 Remold Team
//! Licensed under the Apache-2.0 license

use serde_json::Value;
use std::collections::HashMap;

/// Resolve a name or `$ref` into the registered mapping it designates
///
/// A string resolves as a mapping name only when it is a registered `$id`;
/// any other string passes through and is treated downstream as a pointer.
/// A `$ref` to an unregistered name resolves to `None`, which callers treat
/// as a no-op.
pub fn deref<'a>(
    descriptor: &'a Value,
    mappings: &'a HashMap<String, Value>,
) -> Option<&'a Value> {
    match descriptor {
        Value::String(name) => Some(mappings.get(name).unwrap_or(descriptor)),
        Value::Object(map) => match map.get("$ref").and_then(Value::as_str) {
            Some(name) => {
                let resolved = mappings.get(name);
                if resolved.is_none() {
                    log::debug!("$ref to unregistered mapping '{}'", name);
                }
                resolved
            }
            None => Some(descriptor),
        },
        _ => Some(descriptor),
    }
}

/// Whether the descriptor is a mapping node (carries `mapping` or `each`)
pub fn is_mapping(descriptor: &Value) -> bool {
    descriptor.get("mapping").is_some() || descriptor.get("each").is_some()
}

/// The sub-mapping of a mapping node
pub fn sub_mapping(descriptor: &Value) -> Option<&Value> {
    descriptor.get("mapping").or_else(|| descriptor.get("each"))
}

/// Ordered pairing entries of a resolved mapping
///
/// The pairing table may sit directly on the resolved value or one level
/// down under a `mapping` key.
pub fn pairing_entries(resolved: &Value) -> Vec<(String, Value)> {
    let table = resolved.get("mapping").unwrap_or(resolved);
    match table.as_object() {
        Some(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        None => Vec::new(),
    }
}

/// JavaScript-style truthiness over JSON values
///
/// `false`, `0`, the empty string, and `null` are falsy; every array and
/// object (empty included) is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
