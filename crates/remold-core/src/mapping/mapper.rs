//! The Mapper façade
//!
//! Owns the registered mapping library and the extension registries,
//! normalizes the shapes callers may pass (bare pairing tables, mapping
//! containers, names, array inputs), and drives the evaluator. Inheritance
//! is flattened eagerly whenever a mapping is registered, so evaluation
//! never walks an `$extend` chain.
//!
//! Copyright (c) 2025 Remold Team
//! Licensed under the Apache-2.0 license

use crate::Result;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::context::{Changes, Context};
use super::descriptor;
use super::evaluator;
use super::extend;
use super::registry::{ConsoleSink, Registries, Sink};
use super::validate::ValidationError;

/// Outcome of one evaluation: the populated target plus the error list
#[derive(Debug, Clone, PartialEq)]
pub struct MapReport {
    /// The populated target, `null` when the evaluation aborted
    pub target: Value,
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl MapReport {
    /// Render the spread envelope `{ …target, valid, errors }`
    ///
    /// A non-object target contributes no keys, mirroring how an aborted
    /// evaluation spreads nothing.
    pub fn into_value(self) -> Value {
        let mut envelope = match self.target {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        envelope.insert("valid".to_string(), Value::Bool(self.valid));
        envelope.insert(
            "errors".to_string(),
            serde_json::to_value(&self.errors).unwrap_or_else(|_| Value::Array(Vec::new())),
        );
        Value::Object(envelope)
    }
}

/// Descriptor-driven JSON mapper
///
/// ```
/// use remold_core::mapping::{Mapper, Registries};
/// use serde_json::json;
///
/// # async fn example() -> remold_core::Result<()> {
/// let mapper = Mapper::new(&json!({}), Registries::new())?;
/// let report = mapper
///     .map(&json!({"/name": "/user/name"}), &json!({"user": {"name": "Ada"}}), None)
///     .await?;
/// assert_eq!(report.target, json!({"name": "Ada"}));
/// assert!(report.valid);
/// # Ok(())
/// # }
/// ```
pub struct Mapper {
    mappings: HashMap<String, Value>,
    registries: Arc<Registries>,
    sink: Arc<dyn Sink>,
}

impl Mapper {
    /// Build a mapper, registering and flattening the descriptor's mappings
    pub fn new(descriptor: &Value, registries: Registries) -> Result<Self> {
        let mut mapper = Self {
            mappings: HashMap::new(),
            registries: Arc::new(registries),
            sink: Arc::new(ConsoleSink),
        };
        mapper.add(descriptor)?;
        Ok(mapper)
    }

    /// Replace the stdout side channel
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = sink;
        self
    }

    /// Register the mappings carried by `descriptor` and flatten every
    /// `$extend` chain
    pub fn add(&mut self, descriptor: &Value) -> Result<()> {
        register(&mut self.mappings, descriptor);
        normalize(&mut self.mappings)
    }

    /// The registered mappings, flattened
    pub fn mappings(&self) -> &HashMap<String, Value> {
        &self.mappings
    }

    /// The host extension registries
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Evaluate `descriptor` against `input`, seeding the output with
    /// `initial` when given
    pub async fn map(
        &self,
        descriptor: &Value,
        input: &Value,
        initial: Option<Value>,
    ) -> Result<MapReport> {
        let mut mappings = self.mappings.clone();
        let mut wrapped = descriptor.clone();

        // a container of mappings registers them all for this evaluation
        // and evaluates the one registered last
        if descriptor.get("mappings").is_some() {
            let ids = register(&mut mappings, descriptor);
            normalize(&mut mappings)?;
            if let Some(selected) = ids.last().and_then(|id| mappings.get(id)) {
                wrapped = selected.clone();
            }
        }
        if !descriptor::is_mapping(&wrapped) {
            wrapped = json!({"mapping": wrapped});
        }

        // array inputs are rewrapped so the mapping applies per element
        let input_value = if input.is_array() {
            wrapped = json!({"mapping": {"/items": {"source": "/items", "each": wrapped}}});
            json!({"items": input})
        } else {
            input.clone()
        };

        let output = initial.unwrap_or_else(|| Value::Object(Map::new()));
        let mut context = Context::new(
            input_value,
            output,
            Arc::new(mappings),
            self.registries.clone(),
            self.sink.clone(),
        );
        context.root = true;

        let target = evaluator::map(wrapped, context.clone(), Changes::default()).await?;
        let errors = context.errors_snapshot();
        Ok(MapReport {
            valid: errors.is_empty(),
            target: target.unwrap_or(Value::Null),
            errors,
        })
    }
}

/// Collect every mapping `descriptor` carries, returning the ids in
/// registration order
fn register(mappings: &mut HashMap<String, Value>, descriptor: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    match descriptor.get("mappings") {
        Some(Value::Array(list)) => {
            for entry in list {
                match entry.get("$id").and_then(Value::as_str) {
                    Some(id) => {
                        mappings.insert(id.to_string(), entry.clone());
                        ids.push(id.to_string());
                    }
                    None => log::debug!("skipping mappings entry without $id"),
                }
            }
        }
        Some(Value::Object(table)) => {
            for (key, entry) in table {
                let id = entry.get("$id").and_then(Value::as_str).unwrap_or(key.as_str());
                mappings.insert(id.to_string(), entry.clone());
                ids.push(id.to_string());
            }
        }
        _ => {}
    }
    if let Some(id) = descriptor.get("$id").and_then(Value::as_str) {
        if descriptor::is_mapping(descriptor) {
            mappings.insert(id.to_string(), descriptor.clone());
            ids.push(id.to_string());
        }
    }
    ids
}

/// Flatten every registered mapping against its `$extend` chain
fn normalize(mappings: &mut HashMap<String, Value>) -> Result<()> {
    let ids: Vec<String> = mappings.keys().cloned().collect();
    for id in ids {
        if let Some(raw) = mappings.get(&id).cloned() {
            let flattened = extend::extend(&raw, mappings)?;
            mappings.insert(id, flattened);
        }
    }
    Ok(())
}
