//! Error types for the Remold core library
//!
//! This module defines the error handling system for Remold, using thiserror
//! for ergonomic error definitions and anyhow for flexible error sources from
//! host-supplied extension functions.
//!
//! Validation failures are not represented here. They are data, accumulated on
//! the evaluation context and surfaced in the mapping report (see
//! [`crate::mapping::ValidationError`]). The variants below are structural:
//! they indicate an unusable configuration or a failing host extension and
//! abort the evaluation.

use std::fmt;
use thiserror::Error;

/// Main error type for Remold operations
#[derive(Error, Debug)]
pub enum Error {
    /// A mapping names an `$extend` parent that is not registered
    #[error("unknown $extend target '{extend}' referenced by mapping '{id}'")]
    UnknownExtend { id: String, extend: String },

    /// An `$extend` chain revisits a mapping
    #[error("$extend cycle detected through mapping '{id}'")]
    ExtendCycle { id: String },

    /// A registered initializer, transformer, or plugin returned an error
    #[error("{kind} '{name}' failed: {source}")]
    Extension {
        kind: ExtensionKind,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// The registry a failing host function was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Initializer,
    Transformer,
    Plugin,
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionKind::Initializer => write!(f, "initializer"),
            ExtensionKind::Transformer => write!(f, "transformer"),
            ExtensionKind::Plugin => write!(f, "plugin"),
        }
    }
}

impl Error {
    /// Wrap a host extension failure with the registry kind and entry name
    pub fn extension(
        kind: ExtensionKind,
        name: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Error::Extension {
            kind,
            name: name.into(),
            source: source.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}
