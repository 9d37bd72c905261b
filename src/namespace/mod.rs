//! # Namespace Registry
//!
//! Maps namespace prefixes to URIs and back. The registry is read-only for
//! the pipeline; registering prefixes happens elsewhere.
//!
//! `qualify` is the Key Qualifier: it turns raw document keys into
//! `QName`s, dropping and reporting keys that fail to resolve.

pub mod qualify;

use std::collections::HashMap;

use crate::model::qname::is_valid_local_name;
use crate::model::{QName, QNameError};

pub use qualify::qualify;

/// Read-only lookup of registered namespaces.
pub trait NamespaceRegistry: Send + Sync {
    /// URI registered for a prefix.
    fn namespace_uri(&self, prefix: &str) -> Option<&str>;

    /// Preferred prefix registered for a URI.
    fn prefix(&self, uri: &str) -> Option<&str>;

    /// Resolve `{uri}local`, `prefix:local` or a bare local name to a
    /// `QName` whose namespace is registered.
    fn resolve(&self, key: &str) -> Result<QName, QNameError> {
        let qname = if key.starts_with('{') {
            QName::from_clark(key)?
        } else if let Some((prefix, local)) = key.split_once(':') {
            if prefix.is_empty() || !is_valid_local_name(local) {
                return Err(QNameError::Malformed(key.to_owned()));
            }
            let uri = self
                .namespace_uri(prefix)
                .ok_or_else(|| QNameError::UnknownPrefix { prefix: prefix.to_owned() })?;
            QName::new(uri, local)
        } else {
            QName::from_clark(key)?
        };
        // Round-trip through the prefix table to prove the namespace is known.
        self.to_prefix_string(&qname)?;
        Ok(qname)
    }

    /// Render as `prefix:local` (or just `local` for the empty prefix).
    fn to_prefix_string(&self, qname: &QName) -> Result<String, QNameError> {
        let prefix = self.prefix(qname.namespace()).ok_or_else(|| {
            QNameError::UnregisteredNamespace { uri: qname.namespace().to_owned() }
        })?;
        if prefix.is_empty() {
            Ok(qname.local_name().to_owned())
        } else {
            Ok(format!("{prefix}:{}", qname.local_name()))
        }
    }
}

// ============================================================================
// MemoryNamespaceRegistry
// ============================================================================

/// In-memory namespace registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryNamespaceRegistry {
    uris: HashMap<String, String>,
    prefixes: HashMap<String, String>,
}

impl MemoryNamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `prefix` for `uri`. The first prefix registered for a URI
    /// stays its preferred prefix.
    pub fn register(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let (prefix, uri) = (prefix.into(), uri.into());
        self.prefixes.entry(uri.clone()).or_insert_with(|| prefix.clone());
        self.uris.insert(prefix, uri);
    }

    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.register(prefix, uri);
        self
    }
}

impl NamespaceRegistry for MemoryNamespaceRegistry {
    fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.uris.get(prefix).map(String::as_str)
    }

    fn prefix(&self, uri: &str) -> Option<&str> {
        self.prefixes.get(uri).map(String::as_str)
    }
}
