//! Host-supplied extension registries and the stdout sink
//!
//! The engine itself carries no value-producing functions beyond the
//! descriptor keywords. Hosts contribute behavior through three named
//! registries consulted by the value pipeline: initializers (the `init`
//! stage), transformers (the `transform` stage), and plugins (any descriptor
//! key that matches a registered name). A missing entry is a silent no-op;
//! a registered entry that returns an error aborts the evaluation.
//!
//! Values cross the host boundary as `Option<serde_json::Value>`, where
//! `None` is the engine's rendering of an undefined value.
//!
//! Copyright (c) 2025 Remold Team
//! Licensed under the Apache-2.0 license

use crate::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::context::Context;

/// Synchronous seed function for the `init` pipeline stage
pub type InitializerFn =
    Arc<dyn Fn(Option<Value>, &Context) -> Result<Option<Value>> + Send + Sync>;

/// Synchronous value rewriter for the `transform` pipeline stage
///
/// The third argument carries the per-step options of the array form
/// (`{ "name": options }`), or `None` for bare string steps.
pub type TransformerFn =
    Arc<dyn Fn(Option<Value>, &Context, Option<&Value>) -> Result<Option<Value>> + Send + Sync>;

/// Asynchronous extension invoked for any descriptor key matching its name
///
/// Receives the sub-descriptor under the matching key, the value computed so
/// far, and a clone of the evaluation context.
pub type PluginFn = Arc<
    dyn Fn(Value, Option<Value>, Context) -> BoxFuture<'static, Result<Option<Value>>>
        + Send
        + Sync,
>;

/// The three named extension registries of a [`super::Mapper`]
#[derive(Clone, Default)]
pub struct Registries {
    pub initializers: HashMap<String, InitializerFn>,
    pub transformers: HashMap<String, TransformerFn>,
    pub plugins: HashMap<String, PluginFn>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initializer<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(Option<Value>, &Context) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        self.initializers.insert(name.into(), Arc::new(function));
        self
    }

    pub fn with_transformer<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(Option<Value>, &Context, Option<&Value>) -> Result<Option<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.transformers.insert(name.into(), Arc::new(function));
        self
    }

    pub fn with_plugin<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(Value, Option<Value>, Context) -> BoxFuture<'static, Result<Option<Value>>>
            + Send
            + Sync
            + 'static,
    {
        self.plugins.insert(name.into(), Arc::new(function));
        self
    }
}

impl fmt::Debug for Registries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registries")
            .field("initializers", &self.initializers.keys().collect::<Vec<_>>())
            .field("transformers", &self.transformers.keys().collect::<Vec<_>>())
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Destination of the `stdout` descriptor key
///
/// The default sink prints to standard output. Tests and embedders inject
/// their own via [`super::Mapper::with_sink`].
pub trait Sink: Send + Sync {
    fn write(&self, text: &str);
}

/// Sink that prints to the process standard output
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn write(&self, text: &str) {
        println!("{}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_registration() {
        let registries = Registries::new()
            .with_initializer("seed", |value, _context| Ok(value))
            .with_transformer("upper", |value, _context, _options| Ok(value))
            .with_plugin("fetch", |_sub, value, _context| {
                Box::pin(async move { Ok(value) })
            });

        assert!(registries.initializers.contains_key("seed"));
        assert!(registries.transformers.contains_key("upper"));
        assert!(registries.plugins.contains_key("fetch"));
    }

    #[test]
    fn test_debug_lists_names() {
        let registries = Registries::new().with_transformer("trim", |value, _c, _o| Ok(value));
        let rendered = format!("{:?}", registries);
        assert!(rendered.contains("trim"));
    }
}
