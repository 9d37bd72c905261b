//! Namespace-qualified names for properties, aspects and types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A globally unique name: namespace URI plus local name.
///
/// Displayed in Clark notation, `{uri}local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    namespace: String,
    local_name: String,
}

/// Why a string could not be read as a qualified name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QNameError {
    #[error("'{0}' is not a qualified name")]
    Malformed(String),

    #[error("namespace prefix '{prefix}' is not registered")]
    UnknownPrefix { prefix: String },

    #[error("namespace '{uri}' is not registered")]
    UnregisteredNamespace { uri: String },
}

impl QNameError {
    /// True when the name was well-formed but its namespace is unknown.
    pub fn is_unregistered(&self) -> bool {
        matches!(self, QNameError::UnknownPrefix { .. } | QNameError::UnregisteredNamespace { .. })
    }
}

impl QName {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), local_name: local_name.into() }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Parse `{uri}local`. A string without braces is a local name in the
    /// default (empty) namespace.
    pub fn from_clark(s: &str) -> Result<Self, QNameError> {
        let malformed = || QNameError::Malformed(s.to_owned());
        let (namespace, local) = match s.strip_prefix('{') {
            Some(rest) => {
                let end = rest.find('}').ok_or_else(malformed)?;
                (&rest[..end], &rest[end + 1..])
            }
            None => ("", s),
        };
        if !is_valid_local_name(local) || namespace.contains('{') {
            return Err(malformed());
        }
        Ok(Self::new(namespace, local))
    }
}

/// Local names must be non-empty and free of namespace syntax and whitespace.
pub(crate) fn is_valid_local_name(local: &str) -> bool {
    !local.is_empty()
        && !local.chars().any(|c| matches!(c, '{' | '}' | ':') || c.is_whitespace())
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local_name)
    }
}
