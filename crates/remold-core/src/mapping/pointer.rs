//! JSON Pointer reads and writes
//!
//! RFC 6901 addressing over `serde_json::Value` trees. Reads return `None`
//! for any missing segment instead of failing. Writes create intermediate
//! containers on demand, inferring an array when the next segment parses as
//! an index and the slot is unset, an object otherwise.
//!
//! This dialect treats the empty pointer and `"/"` both as the document root
//! and collapses duplicate separators, because scoped paths are produced by
//! string composition (see [`super::scope`]).
//!
//! Copyright (c) 2025 Remold Team
//! Licensed under the Apache-2.0 license

use serde_json::{Map, Value};

/// Decode one reference token (`~1` then `~0`, per RFC 6901 order)
fn decode(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode)
        .collect()
}

/// Read the value at `pointer`, or `None` when any segment is missing
pub fn get<'a>(root: &'a Value, pointer: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(pointer) {
        current = match current {
            Value::Object(map) => map.get(&segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `pointer`, creating intermediate containers as needed
///
/// Arrays are padded with `null` up to the addressed index. A scalar or null
/// in the middle of the path is replaced by the container the next segment
/// requires. A non-numeric segment under an existing array is dropped.
pub fn set(root: &mut Value, pointer: &str, value: Value) {
    let segments = segments(pointer);
    set_inner(root, &segments, value);
}

fn set_inner(node: &mut Value, segments: &[String], value: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    let index = segment.parse::<usize>().ok();
    if !node.is_object() && !node.is_array() {
        *node = match index {
            Some(_) => Value::Array(Vec::new()),
            None => Value::Object(Map::new()),
        };
    }
    match node {
        Value::Object(map) => {
            let slot = map.entry(segment.clone()).or_insert(Value::Null);
            set_inner(slot, rest, value);
        }
        Value::Array(items) => {
            let Some(index) = index else {
                log::debug!("dropping write of non-numeric segment '{}' under an array", segment);
                return;
            };
            while items.len() <= index {
                items.push(Value::Null);
            }
            set_inner(&mut items[index], rest, value);
        }
        _ => {}
    }
}
