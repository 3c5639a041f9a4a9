//! Eager `$extend` flattening for registered mappings
//!
//! Inheritance is resolved once, when a mapping is registered, never during
//! evaluation. Flattening merges the parent's pairing table into the child's
//! with stable first-appearance key order: child order wins for keys the
//! child defines, new child keys append in child source order, and
//! parent-only keys stay in parent position.
//!
//! An unknown `$extend` target and a cyclic `$extend` chain are structural
//! errors and fail Mapper construction.
//!
//! Copyright (c) 2025 Remold Team
//! Licensed under the Apache-2.0 license

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Flatten `descriptor` against its `$extend` chain in `mappings`
pub fn extend(descriptor: &Value, mappings: &HashMap<String, Value>) -> Result<Value> {
    extend_inner(descriptor, mappings, &mut Vec::new())
}

fn extend_inner(
    descriptor: &Value,
    mappings: &HashMap<String, Value>,
    visiting: &mut Vec<String>,
) -> Result<Value> {
    let Some(parent_id) = descriptor.get("$extend").and_then(Value::as_str) else {
        return Ok(descriptor.clone());
    };
    if visiting.iter().any(|seen| seen == parent_id) {
        return Err(Error::ExtendCycle {
            id: parent_id.to_string(),
        });
    }
    let child_id = descriptor
        .get("$id")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let parent = mappings.get(parent_id).ok_or_else(|| Error::UnknownExtend {
        id: child_id.to_string(),
        extend: parent_id.to_string(),
    })?;

    visiting.push(parent_id.to_string());
    let parent = extend_inner(parent, mappings, visiting)?;
    visiting.pop();

    Ok(merge(&parent, descriptor))
}

/// Merge a flattened parent into a child descriptor
///
/// Non-mapping keys come from the parent first and are overlaid by the
/// child, so `$id`, `$extend`, and `description` are the child's. The merged
/// pairing table keeps stable first-appearance order, computed by reversing
/// the concatenated key list, keeping first occurrences, and reversing back.
fn merge(parent: &Value, child: &Value) -> Value {
    let mut merged = Map::new();
    for source in [parent, child] {
        if let Some(map) = source.as_object() {
            for (key, value) in map {
                if key != "mapping" {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }

    let parent_table = parent.get("mapping").and_then(Value::as_object);
    let child_table = child.get("mapping").and_then(Value::as_object);

    let concatenated: Vec<&String> = parent_table
        .into_iter()
        .flat_map(|table| table.keys())
        .chain(child_table.into_iter().flat_map(|table| table.keys()))
        .collect();
    let mut seen = HashSet::new();
    let mut ordered: Vec<&String> = concatenated
        .into_iter()
        .rev()
        .filter(|key| seen.insert(key.to_string()))
        .collect();
    ordered.reverse();

    let mut table = Map::new();
    for key in ordered {
        let value = child_table
            .and_then(|t| t.get(key))
            .or_else(|| parent_table.and_then(|t| t.get(key)));
        if let Some(value) = value {
            table.insert(key.clone(), value.clone());
        }
    }
    merged.insert("mapping".to_string(), Value::Object(table));
    Value::Object(merged)
}
