//! Evaluation context threaded through the descriptor tree
//!
//! A context is one evaluation frame. The root input, the extension
//! registries, the mapping registry, and the error accumulator are shared
//! across all frames; the current `source`/`target` roots and the scope
//! paths are recomputed per descriptor by [`Context::shift`].
//!
//! The engine never rolls a frame back. Writes into a target and appends to
//! the error list are the only mutations, and both are append-only.
//!
//! Copyright (c) 2025 Remold Team
//! Licensed under the Apache-2.0 license

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::descriptor;
use super::registry::{Registries, Sink};
use super::scope::{self, ScopePaths};
use super::validate::ValidationError;

/// Per-frame overrides applied by [`Context::shift`]
///
/// `index` is set when entering one element of an `each` fan-out; the element
/// index lands in the source path between the enclosing scope and the
/// descriptor's own source offset.
#[derive(Debug, Clone, Default)]
pub struct Changes {
    pub source: Option<Value>,
    pub target: Option<Value>,
    pub index: Option<usize>,
}

/// Ambient evaluation state for one descriptor frame
#[derive(Clone)]
pub struct Context {
    /// Root input document, immutable across the evaluation
    pub input: Arc<Value>,
    /// Root output as of this frame's creation
    pub output: Value,
    /// Current read root
    pub source: Value,
    /// Current write root
    pub target: Value,
    /// Accumulated source and target scopes, absolute pointers
    pub paths: ScopePaths,
    /// Shared append-only error accumulator
    pub errors: Arc<Mutex<Vec<ValidationError>>>,
    /// Registered mappings, flattened at registration
    pub mappings: Arc<HashMap<String, Value>>,
    /// Host extension registries
    pub registries: Arc<Registries>,
    /// Destination of the `stdout` side channel
    pub sink: Arc<dyn Sink>,
    /// The current mapping descriptor, when this frame is a mapping
    pub mapping: Option<Value>,
    /// Ordered pairing entries of the current mapping
    pub pairings: Vec<(String, Value)>,
    /// Whether this frame's target is the root output
    pub(crate) root: bool,
}

impl Context {
    pub(crate) fn new(
        input: Value,
        output: Value,
        mappings: Arc<HashMap<String, Value>>,
        registries: Arc<Registries>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        Self {
            source: input.clone(),
            target: output.clone(),
            input: Arc::new(input),
            output,
            paths: ScopePaths::default(),
            errors: Arc::new(Mutex::new(Vec::new())),
            mappings,
            registries,
            sink,
            mapping: None,
            pairings: Vec::new(),
            root: false,
        }
    }

    /// Produce the child frame for `descriptor`
    ///
    /// Inherits the shared state, applies `changes`, appends the descriptor's
    /// `source`/`target` offsets to the scope paths, and resolves the
    /// descriptor's sub-mapping into pairing entries.
    pub fn shift(&self, descriptor: &Value, changes: Changes) -> Context {
        let mut child = self.clone();
        if changes.target.is_some() {
            // a frame with its own target no longer aliases the root output
            child.root = false;
        }
        if let Some(source) = changes.source {
            child.source = source;
        }
        if let Some(target) = changes.target {
            child.target = target;
        }

        let index_segment = changes.index.map(|index| format!("/{}", index));
        let source_offset = descriptor.get("source").and_then(Value::as_str);
        match (&index_segment, source_offset) {
            (Some(index), Some(offset)) => {
                child.paths.source = scope::resolve(&self.paths.source, &[index, offset]);
            }
            (Some(index), None) => {
                child.paths.source = scope::resolve(&self.paths.source, &[index]);
            }
            (None, Some(offset)) => {
                child.paths.source = scope::resolve(&self.paths.source, &[offset]);
            }
            (None, None) => {}
        }
        if let Some(offset) = descriptor.get("target").and_then(Value::as_str) {
            child.paths.target = scope::resolve(&self.paths.target, &[offset]);
        }

        child.mapping = None;
        child.pairings = Vec::new();
        if let Some(sub) = descriptor::sub_mapping(descriptor) {
            if let Some(resolved) = descriptor::deref(sub, &self.mappings) {
                child.mapping = Some(resolved.clone());
                child.pairings = descriptor::pairing_entries(resolved);
            }
        }
        child
    }

    pub(crate) fn push_error(&self, error: ValidationError) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(error);
        }
    }

    /// Whether any validation error has been recorded so far
    pub fn has_errors(&self) -> bool {
        self.errors.lock().map(|errors| !errors.is_empty()).unwrap_or(true)
    }

    /// Clone of the error list as recorded so far
    pub fn errors_snapshot(&self) -> Vec<ValidationError> {
        self.errors
            .lock()
            .map(|errors| errors.clone())
            .unwrap_or_default()
    }
}

// The sink is not Debug; render the frame through its addressing state.
impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("paths", &self.paths)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("pairings", &self.pairings.len())
            .field("root", &self.root)
            .finish()
    }
}
