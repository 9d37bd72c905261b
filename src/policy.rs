//! Overwrite Policy Engine.
//!
//! A policy is a pure function of (incoming, existing) properties to the
//! minimal delta to write. Properties absent from the incoming set are
//! never touched; no policy deletes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{PropertyMap, QName, Value};

/// How incoming values treat values already on the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverwritePolicy {
    /// Incoming values replace existing values whenever they differ.
    Eager,
    /// Incoming values only fill properties that are absent or empty.
    Pragmatic,
}

impl OverwritePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            OverwritePolicy::Eager => "EAGER",
            OverwritePolicy::Pragmatic => "PRAGMATIC",
        }
    }

    /// Compute the properties that must change on the object.
    pub fn apply<'a, I>(&self, incoming: I, existing: &PropertyMap) -> PropertyDelta
    where
        I: IntoIterator<Item = (&'a QName, &'a Value)>,
    {
        let mut delta = PropertyDelta::default();
        for (name, value) in incoming {
            let current = existing.get(name);
            if current == Some(value) {
                continue;
            }
            let accept = match self {
                OverwritePolicy::Eager => true,
                OverwritePolicy::Pragmatic => current.is_none_or(Value::is_empty),
            };
            if accept {
                delta.insert(name.clone(), value.clone());
            }
        }
        delta
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses the exact variant names only.
impl FromStr for OverwritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EAGER" => Ok(OverwritePolicy::Eager),
            "PRAGMATIC" => Ok(OverwritePolicy::Pragmatic),
            other => Err(format!("unknown overwrite policy '{other}'")),
        }
    }
}

// ============================================================================
// PropertyDelta
// ============================================================================

/// Properties whose value must change on the target object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDelta {
    changes: BTreeMap<QName, Value>,
}

impl PropertyDelta {
    pub fn insert(&mut self, name: QName, value: Value) {
        self.changes.insert(name, value);
    }

    pub fn get(&self, name: &QName) -> Option<&Value> {
        self.changes.get(name)
    }

    pub fn contains(&self, name: &QName) -> bool {
        self.changes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &QName> {
        self.changes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QName, &Value)> {
        self.changes.iter()
    }
}

impl IntoIterator for PropertyDelta {
    type Item = (QName, Value);
    type IntoIter = std::collections::btree_map::IntoIter<QName, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl FromIterator<(QName, Value)> for PropertyDelta {
    fn from_iter<I: IntoIterator<Item = (QName, Value)>>(iter: I) -> Self {
        Self { changes: iter.into_iter().collect() }
    }
}
