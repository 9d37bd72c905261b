//! Content objects and their stable references.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use super::{PropertyMap, QName, Value};

/// Store that bare identifiers are assumed to live in.
pub const DEFAULT_STORE: &str = "workspace://SpacesStore";

/// Stable reference to a content object: `{protocol}://{identifier}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    store: String,
    id: String,
}

impl NodeRef {
    pub fn new(store: impl Into<String>, id: impl Into<String>) -> Self {
        Self { store: store.into(), id: id.into() }
    }

    /// Resolve a full reference, or a bare id in the default store.
    pub fn resolve(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        if !s.contains("://") {
            return Some(Self::new(DEFAULT_STORE, s));
        }
        let (store, id) = s.rsplit_once('/')?;
        if id.is_empty() || store.ends_with(':') || store.ends_with('/') {
            return None;
        }
        Some(Self::new(store, id))
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store, self.id)
    }
}

/// A persistent content item: type, aspects, properties and tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentObject {
    pub node_ref: NodeRef,
    pub type_name: QName,
    pub aspects: BTreeSet<QName>,
    pub properties: PropertyMap,
    pub tags: BTreeSet<String>,
    /// Optimistic-concurrency stamp, bumped on every committed write.
    pub version: u64,
    /// Identity of the last committed writer.
    pub modifier: Option<String>,
}

impl ContentObject {
    pub fn new(node_ref: NodeRef, type_name: QName) -> Self {
        Self {
            node_ref,
            type_name,
            aspects: BTreeSet::new(),
            properties: PropertyMap::new(),
            tags: BTreeSet::new(),
            version: 0,
            modifier: None,
        }
    }

    pub fn has_aspect(&self, aspect: &QName) -> bool {
        self.aspects.contains(aspect)
    }

    pub fn get(&self, key: &QName) -> Option<&Value> {
        self.properties.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_full_reference() {
        let r = NodeRef::resolve("workspace://SpacesStore/abc-123").unwrap();
        assert_eq!(r.store(), "workspace://SpacesStore");
        assert_eq!(r.id(), "abc-123");
        assert_eq!(r.to_string(), "workspace://SpacesStore/abc-123");
    }

    #[test]
    fn test_resolve_bare_id() {
        let r = NodeRef::resolve("abc-123").unwrap();
        assert_eq!(r, NodeRef::new(DEFAULT_STORE, "abc-123"));
    }

    #[test]
    fn test_resolve_rejects_incomplete() {
        assert!(NodeRef::resolve("").is_none());
        assert!(NodeRef::resolve("workspace://SpacesStore/").is_none());
        assert!(NodeRef::resolve("workspace://").is_none());
    }
}
