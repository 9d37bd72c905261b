//! Per-property diagnostics.
//!
//! A diagnostic drops one key from the run and never aborts it. Global
//! failures are `Error`s; the two channels are kept apart.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What went wrong with a single metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// The key is not a qualified name in either accepted form.
    UnparseableKey,
    /// The key parsed but its namespace is not registered.
    UnregisteredNamespace,
    /// Another key already resolved to the same qualified name.
    DuplicateProperty { kept: String },
    /// A reserved-prefix key that names no known directive.
    UnknownDirective,
    /// The value cannot be converted to the declared type.
    Unconvertible { expected: String, reason: String },
}

/// A dropped metadata entry with enough context for an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDiagnostic {
    pub key: String,
    pub value: serde_json::Value,
    pub kind: DiagnosticKind,
}

impl PropertyDiagnostic {
    pub fn new(key: impl Into<String>, value: serde_json::Value, kind: DiagnosticKind) -> Self {
        Self { key: key.into(), value, kind }
    }
}

impl fmt::Display for PropertyDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (key, value) = (&self.key, &self.value);
        match &self.kind {
            DiagnosticKind::UnparseableKey => write!(f, "cannot create qualified name from '{key}'"),
            DiagnosticKind::UnregisteredNamespace => write!(f, "unregistered namespace in '{key}'"),
            DiagnosticKind::DuplicateProperty { kept } => {
                write!(f, "'{key}' resolves to the same property as '{kept}'")
            }
            DiagnosticKind::UnknownDirective => write!(f, "unknown directive {key}={value}"),
            DiagnosticKind::Unconvertible { expected, reason } => {
                write!(f, "{key}={value} is not a valid {expected}: {reason}")
            }
        }
    }
}
