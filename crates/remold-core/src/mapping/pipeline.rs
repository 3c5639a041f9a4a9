//! The value pipeline
//!
//! Turns a leaf descriptor plus a context into a value through a fixed stage
//! order: source selection, `switch`, the plugin chain, `find`, `concat`,
//! `init`, `constant`, `random`, `template`, `transform`, validation,
//! `default`, `regexp_i`, and `as` coercion. Stages the descriptor does not
//! mention are skipped.
//!
//! An undefined value is `None` throughout; only `default` and the selector
//! stages may turn it back into `Some`. The pipeline is asynchronous because
//! plugins and template sub-mappings may be.
//!
//! Copyright (c) 2025 Remold Team
//! Licensed under the Apache-2.0 license

use crate::Result;
use futures::future::{join_all, BoxFuture};
use rand::seq::SliceRandom;
use serde_json::{Map, Value};

use super::context::{Changes, Context};
use super::descriptor::is_truthy;
use super::evaluator;
use super::pointer;
use super::scope;
use super::validate;

/// Derive a value for `descriptor` by running every applicable stage
pub(crate) fn derive(
    descriptor: Value,
    context: Context,
) -> BoxFuture<'static, Result<Option<Value>>> {
    Box::pin(async move {
        let mut value = select_source(&descriptor, &context).await?;
        if let Some(switch) = descriptor.get("switch") {
            value = apply_switch(switch, value, &context).await?;
        }
        value = apply_plugins(&descriptor, value, &context).await?;
        if let Some(find) = descriptor.get("find") {
            value = apply_find(find, value);
        }
        if descriptor.get("concat").map_or(false, is_truthy) {
            value = apply_concat(value);
        }
        if let Some(name) = descriptor.get("init").and_then(Value::as_str) {
            value = apply_init(name, value, &context)?;
        }
        if let Some(constant) = descriptor.get("constant") {
            value = Some(constant.clone());
        }
        if let Some(count) = descriptor.get("random").and_then(Value::as_u64) {
            let unique = descriptor.get("unique").map_or(false, is_truthy);
            value = apply_random(count, unique, value);
        }
        if let Some(template) = descriptor.get("template").and_then(Value::as_str) {
            value = render_template(template, &descriptor, value, &context).await?;
        }
        if let Some(transform) = descriptor.get("transform") {
            value = apply_transform(transform, value, &context)?;
        }
        validate::validate(&descriptor, &value, &context);
        if value.is_none() {
            if let Some(default) = descriptor.get("default") {
                value = Some(default.clone());
            }
        }
        if descriptor.get("regexp_i").map_or(false, is_truthy) {
            value = value.map(wrap_case_insensitive);
        }
        if let Some(kind) = descriptor.get("as").and_then(Value::as_str) {
            value = coerce(kind, value)?;
        }
        Ok(value)
    })
}

/// Stage 1: pick the value the rest of the pipeline works on
///
/// First match wins: pointer string, relative pointer string, one of the
/// four addressing keys, a selector list, and finally the source root.
async fn select_source(descriptor: &Value, context: &Context) -> Result<Option<Value>> {
    if let Some(text) = descriptor.as_str() {
        if text.starts_with('/') {
            return Ok(pointer::get(&context.source, text).cloned());
        }
        if text.contains("../") {
            let absolute = scope::resolve(&context.paths.source, &[text]);
            return Ok(pointer::get(&context.input, &absolute).cloned());
        }
        return Ok(Some(context.source.clone()));
    }
    if let Some(ptr) = descriptor.get("source").and_then(Value::as_str) {
        return Ok(pointer::get(&context.source, ptr).cloned());
    }
    if let Some(ptr) = descriptor.get("target").and_then(Value::as_str) {
        return Ok(pointer::get(&context.target, ptr).cloned());
    }
    if let Some(ptr) = descriptor.get("input").and_then(Value::as_str) {
        return Ok(pointer::get(&context.input, ptr).cloned());
    }
    if let Some(ptr) = descriptor.get("output").and_then(Value::as_str) {
        return Ok(pointer::get(&context.output, ptr).cloned());
    }
    if let Some(list) = descriptor.get("first").and_then(Value::as_array) {
        return pick(list, Pick::First, context).await;
    }
    if let Some(list) = descriptor.get("last").and_then(Value::as_array) {
        return pick(list, Pick::Last, context).await;
    }
    if let Some(list) = descriptor.get("all").and_then(Value::as_array) {
        return pick(list, Pick::All, context).await;
    }
    Ok(Some(context.source.clone()))
}

enum Pick {
    First,
    Last,
    All,
}

async fn pick(list: &[Value], mode: Pick, context: &Context) -> Result<Option<Value>> {
    let futures: Vec<_> = list
        .iter()
        .map(|variant| evaluator::read(variant.clone(), context.clone(), Changes::default()))
        .collect();
    let mut settled = Vec::with_capacity(list.len());
    for result in join_all(futures).await {
        settled.push(result?);
    }
    Ok(match mode {
        Pick::First => settled.into_iter().flatten().next(),
        Pick::Last => settled.into_iter().flatten().last(),
        Pick::All => Some(Value::Array(settled.into_iter().flatten().collect())),
    })
}

/// Stage 2: branch on a key read out of the current value (or a root)
async fn apply_switch(
    switch: &Value,
    value: Option<Value>,
    context: &Context,
) -> Result<Option<Value>> {
    let Some(cases) = switch.get("cases") else {
        return Ok(value);
    };
    let branch = if let Some(ptr) = switch.get("source").and_then(Value::as_str) {
        value.as_ref().and_then(|current| pointer::get(current, ptr))
    } else if let Some(ptr) = switch.get("input").and_then(Value::as_str) {
        pointer::get(&context.input, ptr)
    } else if let Some(ptr) = switch.get("output").and_then(Value::as_str) {
        pointer::get(&context.output, ptr)
    } else {
        None
    };
    let key = branch.map(|branch| match branch {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    });
    let selected = key
        .and_then(|key| cases.get(key.as_str()))
        .or_else(|| cases.get("default"));
    match selected {
        Some(case) => {
            let changes = Changes {
                source: value,
                ..Changes::default()
            };
            evaluator::read(case.clone(), context.clone(), changes).await
        }
        None => Ok(None),
    }
}

/// Stage 3: run every descriptor key that names a registered plugin, in
/// descriptor key order
async fn apply_plugins(
    descriptor: &Value,
    mut value: Option<Value>,
    context: &Context,
) -> Result<Option<Value>> {
    let Some(map) = descriptor.as_object() else {
        return Ok(value);
    };
    for (key, sub) in map {
        let Some(plugin) = context.registries.plugins.get(key) else {
            continue;
        };
        value = plugin(sub.clone(), value, context.clone()).await?;
        if let Some(ptr) = sub.get("pointer").and_then(Value::as_str) {
            value = value.as_ref().and_then(|result| pointer::get(result, ptr)).cloned();
        }
    }
    Ok(value)
}

/// Stage 4: select the first element matching every `eq` pair
fn apply_find(find: &Value, value: Option<Value>) -> Option<Value> {
    let candidates = match value {
        Some(Value::Array(items)) => items,
        Some(single) => vec![single],
        None => return None,
    };
    let eq = find.get("eq").and_then(Value::as_object);
    let matched = candidates.into_iter().find(|candidate| {
        eq.map_or(true, |pairs| {
            pairs
                .iter()
                .all(|(key, expected)| candidate.get(key) == Some(expected))
        })
    });
    match (matched, find.get("pointer").and_then(Value::as_str)) {
        (Some(found), Some(ptr)) => pointer::get(&found, ptr).cloned(),
        (found, _) => found,
    }
}

/// Stage 5: flatten one level of a nested array
fn apply_concat(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::Array(items)) => Some(Value::Array(
            items
                .into_iter()
                .flat_map(|item| match item {
                    Value::Array(inner) => inner,
                    other => vec![other],
                })
                .collect(),
        )),
        other => other,
    }
}

fn apply_init(name: &str, value: Option<Value>, context: &Context) -> Result<Option<Value>> {
    match context.registries.initializers.get(name) {
        Some(initializer) => initializer(value, context),
        None => {
            log::debug!("initializer '{}' is not registered", name);
            Ok(value)
        }
    }
}

/// Stage 8: pick one or several elements of an array value
///
/// Unique picks are capped at the array length so oversized requests cannot
/// spin forever.
fn apply_random(count: u64, unique: bool, value: Option<Value>) -> Option<Value> {
    let items = match value {
        Some(Value::Array(items)) => items,
        other => return other,
    };
    let mut rng = rand::thread_rng();
    if count <= 1 {
        return items.choose(&mut rng).cloned();
    }
    let wanted = count as usize;
    if unique {
        let capped = wanted.min(items.len());
        if capped < wanted {
            log::warn!(
                "random: clamping {} unique picks to array length {}",
                wanted,
                items.len()
            );
        }
        Some(Value::Array(
            items.choose_multiple(&mut rng, capped).cloned().collect(),
        ))
    } else {
        Some(Value::Array(
            (0..wanted)
                .filter_map(|_| items.choose(&mut rng).cloned())
                .collect(),
        ))
    }
}

/// Stage 9: build a parameter object through the sub-mapping, then replace
/// each `{{name}}` occurrence
///
/// Only object values are rendered; scalars pass through untouched.
async fn render_template(
    template: &str,
    descriptor: &Value,
    value: Option<Value>,
    context: &Context,
) -> Result<Option<Value>> {
    let Some(current) = value else {
        return Ok(None);
    };
    if !current.is_object() {
        return Ok(Some(current));
    }
    let changes = Changes {
        source: Some(current),
        ..Changes::default()
    };
    let params = evaluator::nest(descriptor.clone(), context.clone(), changes)
        .await?
        .unwrap_or_else(|| Value::Object(Map::new()));
    Ok(Some(Value::String(substitute(template, &params))))
}

fn substitute(template: &str, params: &Value) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match pointer::get(params, &format!("/{}", name)) {
                    Some(Value::String(text)) => rendered.push_str(text),
                    Some(Value::Null) | None => {}
                    Some(other) => rendered.push_str(&other.to_string()),
                }
                rest = &after[end + 2..];
            }
            None => {
                rendered.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    rendered.push_str(rest);
    rendered
}

/// Stage 10: fold the value through named transformers
fn apply_transform(
    transform: &Value,
    value: Option<Value>,
    context: &Context,
) -> Result<Option<Value>> {
    match transform {
        Value::String(name) => run_transformer(name, value, None, context),
        Value::Array(steps) => {
            let mut result = value;
            for step in steps {
                match step {
                    Value::String(name) => {
                        result = run_transformer(name, result, None, context)?;
                    }
                    Value::Object(options) => {
                        for (name, step_options) in options {
                            result = run_transformer(name, result, Some(step_options), context)?;
                        }
                    }
                    _ => {}
                }
            }
            Ok(result)
        }
        _ => Ok(value),
    }
}

fn run_transformer(
    name: &str,
    value: Option<Value>,
    options: Option<&Value>,
    context: &Context,
) -> Result<Option<Value>> {
    match context.registries.transformers.get(name) {
        Some(transformer) => transformer(value, context, options),
        None => {
            log::debug!("transformer '{}' is not registered", name);
            Ok(value)
        }
    }
}

/// Stage 13: wrap the value as a case-insensitive regular expression literal
fn wrap_case_insensitive(value: Value) -> Value {
    let text = match value {
        Value::String(text) => text,
        other => other.to_string(),
    };
    Value::String(format!("/{}/i", text))
}

/// Stage 14: coerce into the requested primitive shape
fn coerce(kind: &str, value: Option<Value>) -> Result<Option<Value>> {
    let Some(current) = value else {
        return Ok(None);
    };
    let coerced = match kind {
        "string" => Value::String(render_text(&current)),
        "number" => {
            if current.is_number() {
                current
            } else {
                as_number(&current).map_or(Value::Null, number_value)
            }
        }
        "boolean" => Value::Bool(is_truthy(&current)),
        "json" => Value::String(serde_json::to_string(&current)?),
        _ => current,
    };
    Ok(Some(coerced))
}

fn render_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::Number(serde_json::Number::from(number as i64))
    } else {
        serde_json::Number::from_f64(number).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::registry::{ConsoleSink, Registries};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn create_test_context(input: Value) -> Context {
        Context::new(
            input,
            json!({}),
            Arc::new(HashMap::new()),
            Arc::new(Registries::new()),
            Arc::new(ConsoleSink),
        )
    }

    fn create_context_with(input: Value, registries: Registries) -> Context {
        Context::new(
            input,
            json!({}),
            Arc::new(HashMap::new()),
            Arc::new(registries),
            Arc::new(ConsoleSink),
        )
    }

    #[tokio::test]
    async fn test_pointer_string_reads_source() {
        let context = create_test_context(json!({"user": {"name": "Ada"}}));
        let value = derive(json!("/user/name"), context).await.unwrap();
        assert_eq!(value, Some(json!("Ada")));
    }

    #[tokio::test]
    async fn test_missing_pointer_is_undefined() {
        let context = create_test_context(json!({"a": 1}));
        let value = derive(json!("/b"), context).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_relative_pointer_reads_input() {
        let mut context = create_test_context(json!({"books": [{"title": "A"}], "count": 1}));
        context.paths.source = "/books/0".to_string();
        let value = derive(json!("../../count"), context).await.unwrap();
        assert_eq!(value, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_constant_overrides_source() {
        let context = create_test_context(json!({"a": 1}));
        let value = derive(json!({"source": "/a", "constant": 42}), context)
            .await
            .unwrap();
        assert_eq!(value, Some(json!(42)));
    }

    #[tokio::test]
    async fn test_fallback_value_is_source_root() {
        let context = create_test_context(json!({"a": 1}));
        let value = derive(json!({}), context).await.unwrap();
        assert_eq!(value, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_first_picks_earliest_defined() {
        let context = create_test_context(json!({"b": 7}));
        let descriptor = json!({"first": ["/a", "/b", {"constant": "fallback"}]});
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!(7)));
    }

    #[tokio::test]
    async fn test_first_over_all_undefined() {
        let context = create_test_context(json!({}));
        let value = derive(json!({"first": ["/a", "/b"]}), context).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_last_and_all() {
        let context = create_test_context(json!({"a": 1, "b": 2}));
        let last = derive(json!({"last": ["/a", "/b", "/c"]}), context.clone())
            .await
            .unwrap();
        assert_eq!(last, Some(json!(2)));

        let all = derive(json!({"all": ["/a", "/c", "/b"]}), context)
            .await
            .unwrap();
        assert_eq!(all, Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_switch_selects_case() {
        let context = create_test_context(json!({"kind": "book", "title": "A"}));
        let descriptor = json!({
            "switch": {
                "source": "/kind",
                "cases": {
                    "book": "/title",
                    "default": {"constant": "other"}
                }
            }
        });
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!("A")));
    }

    #[tokio::test]
    async fn test_switch_falls_back_to_default() {
        let context = create_test_context(json!({"kind": "movie"}));
        let descriptor = json!({
            "switch": {
                "source": "/kind",
                "cases": {"book": "/title", "default": {"constant": "other"}}
            }
        });
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!("other")));
    }

    #[tokio::test]
    async fn test_switch_without_match_is_undefined() {
        let context = create_test_context(json!({"kind": "movie"}));
        let descriptor = json!({
            "switch": {"source": "/kind", "cases": {"book": "/title"}}
        });
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_plugins_run_in_key_order() {
        let registries = Registries::new()
            .with_plugin("append_a", |_sub, value, _context| {
                Box::pin(async move {
                    let text = value.and_then(|v| v.as_str().map(String::from)).unwrap_or_default();
                    Ok(Some(json!(format!("{}a", text))))
                })
            })
            .with_plugin("append_b", |_sub, value, _context| {
                Box::pin(async move {
                    let text = value.and_then(|v| v.as_str().map(String::from)).unwrap_or_default();
                    Ok(Some(json!(format!("{}b", text))))
                })
            });
        let context = create_context_with(json!({"seed": ""}), registries);
        let descriptor = json!({"source": "/seed", "append_b": true, "append_a": true});
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!("ba")));
    }

    #[tokio::test]
    async fn test_plugin_pointer_projection() {
        let registries = Registries::new().with_plugin("wrap", |_sub, value, _context| {
            Box::pin(async move { Ok(Some(json!({"inner": value.unwrap_or(json!(null))}))) })
        });
        let context = create_context_with(json!({"a": 5}), registries);
        let descriptor = json!({"source": "/a", "wrap": {"pointer": "/inner"}});
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!(5)));
    }

    #[tokio::test]
    async fn test_find_matches_and_projects() {
        let context = create_test_context(json!({
            "users": [
                {"id": 1, "name": "Ada"},
                {"id": 2, "name": "Grace"}
            ]
        }));
        let descriptor = json!({
            "source": "/users",
            "find": {"eq": {"id": 2}, "pointer": "/name"}
        });
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!("Grace")));
    }

    #[tokio::test]
    async fn test_find_wraps_singletons() {
        let context = create_test_context(json!({"user": {"id": 1}}));
        let descriptor = json!({"source": "/user", "find": {"eq": {"id": 1}}});
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!({"id": 1})));
    }

    #[tokio::test]
    async fn test_concat_flattens_one_level() {
        let context = create_test_context(json!({"groups": [[1, 2], [3], 4]}));
        let descriptor = json!({"source": "/groups", "concat": true});
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!([1, 2, 3, 4])));
    }

    #[tokio::test]
    async fn test_init_applies_registered_function() {
        let registries = Registries::new().with_initializer("double", |value, _context| {
            let number = value.and_then(|v| v.as_i64()).unwrap_or_default();
            Ok(Some(json!(number * 2)))
        });
        let context = create_context_with(json!({"n": 21}), registries);
        let value = derive(json!({"source": "/n", "init": "double"}), context)
            .await
            .unwrap();
        assert_eq!(value, Some(json!(42)));
    }

    #[tokio::test]
    async fn test_unknown_init_is_noop() {
        let context = create_test_context(json!({"n": 21}));
        let value = derive(json!({"source": "/n", "init": "absent"}), context)
            .await
            .unwrap();
        assert_eq!(value, Some(json!(21)));
    }

    #[tokio::test]
    async fn test_random_single_pick() {
        let context = create_test_context(json!({"options": ["a", "b", "c"]}));
        let value = derive(json!({"source": "/options", "random": 1}), context)
            .await
            .unwrap()
            .unwrap();
        assert!(value.is_string());
    }

    #[tokio::test]
    async fn test_random_unique_caps_at_length() {
        let context = create_test_context(json!({"options": ["a", "b"]}));
        let descriptor = json!({"source": "/options", "random": 5, "unique": true});
        let value = derive(descriptor, context).await.unwrap().unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_template_substitutes_params() {
        let context = create_test_context(json!({"f": "Grace", "l": "Hopper"}));
        let descriptor = json!({
            "template": "{{first}} {{last}}",
            "mapping": {"/first": "/f", "/last": "/l"}
        });
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!("Grace Hopper")));
    }

    #[tokio::test]
    async fn test_template_missing_param_renders_empty() {
        let context = create_test_context(json!({"f": "Grace"}));
        let descriptor = json!({
            "template": "{{first}}{{last}}",
            "mapping": {"/first": "/f", "/last": "/l"}
        });
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!("Grace")));
    }

    #[tokio::test]
    async fn test_template_scalar_passes_through() {
        let context = create_test_context(json!({"n": 3}));
        let descriptor = json!({"source": "/n", "template": "{{x}}", "mapping": {"/x": "/n"}});
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_transform_array_folds_left_to_right() {
        let registries = Registries::new()
            .with_transformer("inc", |value, _context, _options| {
                Ok(Some(json!(value.and_then(|v| v.as_i64()).unwrap_or_default() + 1)))
            })
            .with_transformer("scale", |value, _context, options| {
                let factor = options.and_then(Value::as_i64).unwrap_or(1);
                Ok(Some(json!(
                    value.and_then(|v| v.as_i64()).unwrap_or_default() * factor
                )))
            });
        let context = create_context_with(json!({"n": 4}), registries);
        let descriptor = json!({"source": "/n", "transform": ["inc", {"scale": 10}]});
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!(50)));
    }

    #[tokio::test]
    async fn test_unknown_transform_is_noop() {
        let context = create_test_context(json!({"n": 4}));
        let descriptor = json!({"source": "/n", "transform": ["absent"]});
        let value = derive(descriptor, context).await.unwrap();
        assert_eq!(value, Some(json!(4)));
    }

    #[tokio::test]
    async fn test_validation_runs_before_default() {
        let context = create_test_context(json!({}));
        let descriptor = json!({"source": "/missing", "required": true, "default": "filled"});
        let value = derive(descriptor, context.clone()).await.unwrap();
        // the required check saw the undefined value, then default filled it
        assert_eq!(value, Some(json!("filled")));
        assert_eq!(context.errors_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_regexp_i_wraps_value() {
        let context = create_test_context(json!({"q": "ada"}));
        let value = derive(json!({"source": "/q", "regexp_i": true}), context)
            .await
            .unwrap();
        assert_eq!(value, Some(json!("/ada/i")));
    }

    #[tokio::test]
    async fn test_coercions() {
        let context = create_test_context(json!({"n": 7, "s": "8", "obj": {"a": 1}}));
        let as_string = derive(json!({"source": "/n", "as": "string"}), context.clone())
            .await
            .unwrap();
        assert_eq!(as_string, Some(json!("7")));

        let as_number = derive(json!({"source": "/s", "as": "number"}), context.clone())
            .await
            .unwrap();
        assert_eq!(as_number, Some(json!(8)));

        let as_boolean = derive(json!({"source": "/s", "as": "boolean"}), context.clone())
            .await
            .unwrap();
        assert_eq!(as_boolean, Some(json!(true)));

        let as_json = derive(json!({"source": "/obj", "as": "json"}), context)
            .await
            .unwrap();
        assert_eq!(as_json, Some(json!("{\"a\":1}")));
    }
}
