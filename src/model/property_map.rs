//! PropertyMap — the key-value store on content objects.

use std::collections::HashMap;
use super::{QName, Value};

/// A map of qualified property names to values.
pub type PropertyMap = HashMap<QName, Value>;

/// Convert (name, value) pairs into a PropertyMap.
pub fn properties<V>(pairs: impl IntoIterator<Item = (QName, V)>) -> PropertyMap
where
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k, v.into())).collect()
}
