//! Mapping evaluation
//!
//! `map` walks the pairing entries of a mapping descriptor in order, derives
//! one value per pairing through the value pipeline, and writes it into the
//! frame's target. Nested mappings recurse through `nest` with a fresh
//! target; `read` dispatches a reference to either path.
//!
//! Pairings run sequentially so each one observes the error list before the
//! next starts; sibling elements of a fan-out run concurrently and their
//! results are written as one array after all of them settle.
//!
//! Copyright (c) 2025 Remold Team
//! Licensed under the Apache-2.0 license

use crate::Result;
use futures::future::{join_all, BoxFuture};
use serde_json::{Map, Value};

use super::context::{Changes, Context};
use super::descriptor;
use super::pipeline;
use super::pointer;

/// Evaluate a mapping descriptor and return its populated target
///
/// Returns `None` when the mapping aborted because a pairing recorded a
/// validation error, or when the descriptor dereferences to nothing.
pub(crate) fn map(
    descriptor: Value,
    parent: Context,
    changes: Changes,
) -> BoxFuture<'static, Result<Option<Value>>> {
    Box::pin(async move {
        let Some(resolved) = super::descriptor::deref(&descriptor, &parent.mappings) else {
            return Ok(None);
        };
        let resolved = resolved.clone();
        let mut context = parent.shift(&resolved, changes);

        // mappings reuse the source-selection keys of the pipeline, so the
        // seed value every pairing reads from is derived the same way
        let seed = pipeline::derive(resolved.clone(), context.clone()).await?;

        let pairings = context.pairings.clone();
        for (left, right) in pairings {
            let value = evaluate_pairing(&right, &seed, &context).await?;
            if let Some(value) = value {
                pointer::set(&mut context.target, &left, value);
                if context.root {
                    context.output = context.target.clone();
                }
            }
            if context.has_errors() {
                return Ok(None);
            }
        }

        emit_stdout(&resolved, &context);
        Ok(Some(context.target))
    })
}

/// Derive the value of one pairing's right-hand descriptor
async fn evaluate_pairing(
    right: &Value,
    seed: &Option<Value>,
    context: &Context,
) -> Result<Option<Value>> {
    let Some(resolved) = descriptor::deref(right, &context.mappings) else {
        return Ok(None);
    };
    let resolved = resolved.clone();
    let changes = Changes {
        source: seed.clone(),
        ..Changes::default()
    };

    // an array is a disjunction of variants: the first truthy result wins
    if let Value::Array(variants) = &resolved {
        let futures: Vec<_> = variants
            .iter()
            .map(|variant| read(variant.clone(), context.clone(), changes.clone()))
            .collect();
        for result in join_all(futures).await {
            if let Some(value) = result? {
                if descriptor::is_truthy(&value) {
                    return Ok(Some(value));
                }
            }
        }
        return Ok(None);
    }

    if !descriptor::is_mapping(&resolved) && resolved.get("switch").is_none() {
        let child = context.shift(&resolved, changes);
        return pipeline::derive(resolved, child).await;
    }

    // mapping node: derive its seed, then project scalars as-is, arrays per
    // element, and objects through one nested evaluation
    let child = context.shift(&resolved, changes);
    let value = pipeline::derive(resolved.clone(), child.clone()).await?;
    match value {
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return Ok(Some(Value::Array(Vec::new())));
            }
            let futures: Vec<_> = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    let changes = Changes {
                        source: Some(item),
                        index: Some(index),
                        ..Changes::default()
                    };
                    nest(resolved.clone(), child.clone(), changes)
                })
                .collect();
            let mut collected = Vec::with_capacity(futures.len());
            for result in join_all(futures).await {
                collected.push(result?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Array(collected)))
        }
        Some(Value::Object(_)) => {
            let changes = Changes {
                source: value,
                ..Changes::default()
            };
            nest(resolved, child, changes).await
        }
        other => Ok(other),
    }
}

/// Evaluate the sub-mapping of `descriptor` against a fresh target
///
/// Wraps the sub-mapping so the element or object passed through `changes`
/// becomes the frame's whole source. Without a sub-mapping the source passes
/// through unchanged.
pub(crate) fn nest(
    descriptor: Value,
    parent: Context,
    changes: Changes,
) -> BoxFuture<'static, Result<Option<Value>>> {
    Box::pin(async move {
        let Some(sub) = descriptor::sub_mapping(&descriptor).cloned() else {
            return Ok(changes.source.or_else(|| Some(parent.source.clone())));
        };
        let wrapper = serde_json::json!({"source": "/", "mapping": sub});
        let changes = Changes {
            target: Some(Value::Object(Map::new())),
            ..changes
        };
        map(wrapper, parent, changes).await
    })
}

/// Dispatch a reference: mapping nodes evaluate through `map` with a fresh
/// target, everything else through the value pipeline
pub(crate) fn read(
    reference: Value,
    parent: Context,
    changes: Changes,
) -> BoxFuture<'static, Result<Option<Value>>> {
    Box::pin(async move {
        let Some(resolved) = descriptor::deref(&reference, &parent.mappings) else {
            return Ok(None);
        };
        let resolved = resolved.clone();
        if descriptor::is_mapping(&resolved) {
            let changes = Changes {
                target: Some(Value::Object(Map::new())),
                ..changes
            };
            map(resolved, parent, changes).await
        } else {
            let context = parent.shift(&resolved, changes);
            pipeline::derive(resolved, context).await
        }
    })
}

fn emit_stdout(descriptor: &Value, context: &Context) {
    match descriptor.get("stdout") {
        Some(Value::String(ptr)) => {
            let view = pointer::get(&context.target, ptr).cloned().unwrap_or(Value::Null);
            if let Ok(text) = serde_json::to_string_pretty(&view) {
                context.sink.write(&text);
            }
        }
        Some(flag) if descriptor::is_truthy(flag) => {
            if let Ok(text) = serde_json::to_string_pretty(&context.target) {
                context.sink.write(&text);
            }
        }
        _ => {}
    }
}
