//! Descriptor evaluation engine
//!
//! This module implements the core mapping functionality: a recursive,
//! asynchronous interpreter over JSON descriptors that project a source
//! document into a target document, accumulating validation errors along
//! the way.
//!
//! Copyright (c) 2025 Remold Team
//! Licensed under the Apache-2.0 license

pub mod context;
pub mod descriptor;
pub(crate) mod evaluator;
pub(crate) mod extend;
pub mod mapper;
pub(crate) mod pipeline;
pub mod pointer;
pub mod registry;
pub mod scope;
pub mod validate;

pub use context::{Changes, Context};
pub use mapper::{MapReport, Mapper};
pub use registry::{ConsoleSink, InitializerFn, PluginFn, Registries, Sink, TransformerFn};
pub use scope::ScopePaths;
pub use validate::{Constraint, ValidationError};
