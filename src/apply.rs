//! Delta Applier.
//!
//! The only stage with side effects. Runs inside the caller's transaction:
//! derives tags from taggable string properties, writes the remaining
//! properties, clears stale aspect properties when asked to, and finally
//! activates any aspect the new properties need.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dictionary::Dictionary;
use crate::directives::ControlDirectives;
use crate::model::{ContentObject, PropertyMap, QName, Value};
use crate::policy::PropertyDelta;
use crate::storage::{ContentStore, TaggingService};
use crate::Result;

/// What a committed run changed on the object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedChanges {
    /// Properties written.
    pub properties: Vec<QName>,
    /// Properties turned into tags instead of being written.
    pub tagged_properties: Vec<QName>,
    /// Tag tokens associated with the object.
    pub tags: Vec<String>,
    /// Aspects activated by this run.
    pub aspects_added: Vec<QName>,
    /// Aspect properties cleared because they were not carried over.
    pub properties_removed: Vec<QName>,
}

/// Collaborators the applier needs besides the store.
pub struct ApplyContext<'a, Tx> {
    pub dictionary: &'a dyn Dictionary,
    pub tagging: &'a dyn TaggingService<Tx>,
    pub directives: &'a ControlDirectives,
}

impl AppliedChanges {
    /// Nothing was written, tagged, removed or activated.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
            && self.tagged_properties.is_empty()
            && self.aspects_added.is_empty()
            && self.properties_removed.is_empty()
    }
}

/// Write `delta` to `target` inside `tx`.
pub async fn apply_delta<S: ContentStore>(
    store: &S,
    tx: &mut S::Tx,
    target: &ContentObject,
    delta: PropertyDelta,
    cx: &ApplyContext<'_, S::Tx>,
) -> Result<AppliedChanges> {
    let node = &target.node_ref;
    let mut changes = AppliedChanges::default();

    let delta_names: BTreeSet<QName> = delta.names().cloned().collect();

    let mut writes = PropertyMap::with_capacity(delta.len());
    for (name, value) in delta {
        let taggable = cx.directives.enable_string_tagging
            && cx.dictionary.property(&name).is_some_and(|def| def.taggable)
            && is_tag_source(&value);
        if !taggable {
            writes.insert(name, value);
            continue;
        }

        let mut tagged = false;
        for raw in value.strings() {
            for token in split_tags(raw, &cx.directives.string_tagging_separators) {
                cx.tagging.add_tag(tx, node, &token).await?;
                tagged = true;
                if !changes.tags.contains(&token) {
                    changes.tags.push(token);
                }
            }
        }
        if tagged {
            tracing::debug!(node = %node, property = %name, "string property applied as tags");
            changes.tagged_properties.push(name);
        } else {
            tracing::debug!(node = %node, property = %name, "no tag tokens in string property");
        }
    }

    // Tag-only properties are never written, so they activate no aspect.
    let mut required_aspects = BTreeSet::new();
    for name in writes.keys() {
        if let Some(aspect) = cx.dictionary.property(name).and_then(|def| def.container.aspect()) {
            required_aspects.insert(aspect.clone());
        }
    }

    changes.properties = writes.keys().cloned().collect();
    changes.properties.sort();
    if !writes.is_empty() {
        store.set_properties(tx, node, writes).await?;
    }

    if !cx.directives.carry_aspect_properties {
        for aspect in &required_aspects {
            for name in cx.dictionary.aspect_properties(aspect) {
                if target.properties.contains_key(&name) && !delta_names.contains(&name) {
                    store.remove_property(tx, node, &name).await?;
                    changes.properties_removed.push(name);
                }
            }
        }
    }

    for aspect in required_aspects {
        if !target.has_aspect(&aspect) {
            store.add_aspect(tx, node, &aspect).await?;
            changes.aspects_added.push(aspect);
        }
    }

    Ok(changes)
}

/// Only values made entirely of strings become tags.
fn is_tag_source(value: &Value) -> bool {
    match value {
        Value::String(_) => true,
        Value::List(items) => !items.is_empty() && items.iter().all(Value::is_string),
        _ => false,
    }
}

/// Split on each separator in turn, trimming every piece. Empty tokens are
/// dropped and repeats collapse to their first occurrence.
pub fn split_tags(value: &str, separators: &[String]) -> Vec<String> {
    let mut pieces = vec![value.trim().to_owned()];
    for sep in separators.iter().filter(|s| !s.is_empty()) {
        pieces = pieces
            .iter()
            .flat_map(|piece| piece.split(sep.as_str()))
            .map(|token| token.trim().to_owned())
            .collect();
    }

    let mut tokens: Vec<String> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        if !piece.is_empty() && !tokens.contains(&piece) {
            tokens.push(piece);
        }
    }
    tokens
}
