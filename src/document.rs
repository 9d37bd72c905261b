//! Raw metadata documents as produced by the content-analysis step.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Decoded key/value pairs awaiting directive extraction and qualification.
///
/// Keys iterate in lexicographic order so that every downstream stage sees
/// the same sequence for the same input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadataDocument {
    entries: BTreeMap<String, JsonValue>,
}

impl RawMetadataDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one JSON object. Anything else is a malformed document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let decoded: JsonValue = serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidDocument(e.to_string()))?;
        match decoded {
            JsonValue::Object(map) => Ok(Self { entries: map.into_iter().collect() }),
            other => Err(Error::InvalidDocument(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl IntoIterator for RawMetadataDocument {
    type Item = (String, JsonValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, JsonValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, JsonValue)> for RawMetadataDocument {
    fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

pub(crate) fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_object() {
        let doc = RawMetadataDocument::from_slice(br#"{"b": 1, "a": "x"}"#).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(
            RawMetadataDocument::from_slice(b"[1, 2]"),
            Err(Error::InvalidDocument(_))
        ));
        assert!(matches!(
            RawMetadataDocument::from_slice(b"{not json"),
            Err(Error::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_empty_object() {
        assert!(RawMetadataDocument::from_slice(b"{}").unwrap().is_empty());
    }
}
