//! Key Qualifier: raw document keys to qualified property names.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::diagnostic::{DiagnosticKind, PropertyDiagnostic};
use crate::document::RawMetadataDocument;
use crate::model::QName;
use super::NamespaceRegistry;

/// Resolve every key of `document` against `registry`.
///
/// Keys that do not parse, or whose namespace is unknown, are dropped with
/// a diagnostic. Keys are visited in lexicographic order; when two keys
/// resolve to the same name the first one is kept and the later ones are
/// reported as duplicates.
pub fn qualify(
    document: RawMetadataDocument,
    registry: &dyn NamespaceRegistry,
    diagnostics: &mut Vec<PropertyDiagnostic>,
) -> BTreeMap<QName, JsonValue> {
    let mut resolved: BTreeMap<QName, (String, JsonValue)> = BTreeMap::new();

    for (key, value) in document {
        let qname = match registry.resolve(&key) {
            Ok(qname) => qname,
            Err(e) => {
                let kind = if e.is_unregistered() {
                    DiagnosticKind::UnregisteredNamespace
                } else {
                    DiagnosticKind::UnparseableKey
                };
                tracing::debug!(key = %key, error = %e, "dropping metadata key");
                diagnostics.push(PropertyDiagnostic::new(key, value, kind));
                continue;
            }
        };

        if let Some((kept, _)) = resolved.get(&qname) {
            tracing::debug!(key = %key, kept = %kept, property = %qname, "duplicate metadata key");
            let kind = DiagnosticKind::DuplicateProperty { kept: kept.clone() };
            diagnostics.push(PropertyDiagnostic::new(key, value, kind));
            continue;
        }
        resolved.insert(qname, (key, value));
    }

    resolved.into_iter().map(|(qname, (_, value))| (qname, value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::MemoryNamespaceRegistry;
    use serde_json::json;

    const EXAMPLE: &str = "http://example.org/model";

    fn document(pairs: &[(&str, JsonValue)]) -> RawMetadataDocument {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_qualify_mixed_keys() {
        let reg = MemoryNamespaceRegistry::new().with("example", EXAMPLE);
        let doc = document(&[
            ("{http://example.org/model}title", json!("Report")),
            ("example:author", json!("Ada")),
            ("{http://unknown}x", json!(1)),
            ("{broken", json!(2)),
        ]);
        let mut diags = Vec::new();
        let out = qualify(doc, &reg, &mut diags);

        assert_eq!(out.len(), 2);
        assert_eq!(out[&QName::new(EXAMPLE, "title")], json!("Report"));
        assert_eq!(out[&QName::new(EXAMPLE, "author")], json!("Ada"));

        assert_eq!(diags.len(), 2);
        let kind_of = |k: &str| diags.iter().find(|d| d.key == k).map(|d| d.kind.clone());
        assert_eq!(kind_of("{http://unknown}x"), Some(DiagnosticKind::UnregisteredNamespace));
        assert_eq!(kind_of("{broken"), Some(DiagnosticKind::UnparseableKey));
    }

    #[test]
    fn test_duplicates_keep_first_in_key_order() {
        let reg = MemoryNamespaceRegistry::new().with("example", EXAMPLE);
        let doc = document(&[
            ("example:title", json!("prefixed")),
            ("{http://example.org/model}title", json!("clark")),
        ]);
        let mut diags = Vec::new();
        let out = qualify(doc, &reg, &mut diags);

        // '{' sorts after 'e'
        assert_eq!(out[&QName::new(EXAMPLE, "title")], json!("prefixed"));
        assert_eq!(
            diags[0].kind,
            DiagnosticKind::DuplicateProperty { kept: "example:title".into() }
        );
    }
}
