//! Remold Core - Descriptor-driven JSON mapping engine
//!
//! This crate evaluates declarative, JSON-valued *mapping descriptors*
//! against an input document and produces an output document together with
//! a list of validation errors.
//!
//! # Main Components
//!
//! - **Error Handling**: Structural error types using `thiserror`
//! - **Pointer and Scope**: RFC 6901 addressing and scope composition
//! - **Value Pipeline**: The ordered derivation stages behind every leaf
//! - **Evaluator**: Mapping traversal with concurrent fan-out
//! - **Mapper Façade**: Mapping registration, `$extend` flattening, and the
//!   evaluation entry point
//!
//! # Example
//!
//! ```
//! use remold_core::mapping::{Mapper, Registries};
//! use serde_json::json;
//!
//! # async fn example() -> remold_core::Result<()> {
//! let mapper = Mapper::new(&json!({}), Registries::new())?;
//! let report = mapper
//!     .map(
//!         &json!({"mapping": {"/name": "/user/name"}}),
//!         &json!({"user": {"name": "Ada"}}),
//!         None,
//!     )
//!     .await?;
//! assert!(report.valid);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod mapping;

pub use error::{Error, ExtensionKind, Result};
pub use mapping::{MapReport, Mapper, Registries};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
    }
}
