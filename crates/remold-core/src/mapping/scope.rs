//! Pointer path composition for nested descriptor scopes
//!
//! As the evaluator descends into nested descriptors it accumulates a source
//! and a target scope. Scopes are joined POSIX-style: segments concatenate,
//! `.` and empty segments collapse, and `..` pops one segment. Unlike a
//! filesystem resolve, a leading `/` in a later segment does not reset the
//! path to the root.
//!
//! Copyright (c) 2025 Remold Team
//! Licensed under the Apache-2.0 license

/// The accumulated read and write scopes of an evaluation frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePaths {
    pub source: String,
    pub target: String,
}

impl Default for ScopePaths {
    fn default() -> Self {
        Self {
            source: "/".to_string(),
            target: "/".to_string(),
        }
    }
}

/// Join `base` and `segments` into one normalized absolute pointer
///
/// Popping past the root stays at the root.
pub fn resolve(base: &str, segments: &[&str]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for piece in std::iter::once(base).chain(segments.iter().copied()) {
        for segment in piece.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}
