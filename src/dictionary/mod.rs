//! # Dictionary
//!
//! The schema service: declared types of properties and the classes
//! (content types or aspects) that own them. Read-only to the pipeline.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::QName;

/// Declared value type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Text,
    MlText,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Date,
    DateTime,
    /// No conversion: the natural JSON mapping is kept.
    Any,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Text => "text",
            DataType::MlText => "mltext",
            DataType::Int => "int",
            DataType::Long => "long",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
            DataType::Any => "any",
        };
        f.write_str(name)
    }
}

/// The class a property is declared on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassRef {
    Type(QName),
    Aspect(QName),
}

impl ClassRef {
    pub fn aspect(&self) -> Option<&QName> {
        match self {
            ClassRef::Aspect(name) => Some(name),
            ClassRef::Type(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: QName,
    pub data_type: DataType,
    pub multi_valued: bool,
    pub container: ClassRef,
    /// String values feed tag derivation when string tagging is enabled.
    pub taggable: bool,
}

impl PropertyDefinition {
    pub fn new(name: QName, data_type: DataType, container: ClassRef) -> Self {
        Self { name, data_type, multi_valued: false, container, taggable: false }
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    pub fn taggable(mut self) -> Self {
        self.taggable = true;
        self
    }
}

/// Read-only schema lookup.
pub trait Dictionary: Send + Sync {
    fn property(&self, name: &QName) -> Option<&PropertyDefinition>;

    /// Names of all properties declared on an aspect.
    fn aspect_properties(&self, aspect: &QName) -> Vec<QName>;
}

// ============================================================================
// MemoryDictionary
// ============================================================================

/// In-memory dictionary, built up with `define`.
#[derive(Debug, Clone, Default)]
pub struct MemoryDictionary {
    properties: HashMap<QName, PropertyDefinition>,
}

impl MemoryDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(mut self, definition: PropertyDefinition) -> Self {
        self.properties.insert(definition.name.clone(), definition);
        self
    }
}

impl Dictionary for MemoryDictionary {
    fn property(&self, name: &QName) -> Option<&PropertyDefinition> {
        self.properties.get(name)
    }

    fn aspect_properties(&self, aspect: &QName) -> Vec<QName> {
        let mut names: Vec<QName> = self
            .properties
            .values()
            .filter(|def| def.container.aspect() == Some(aspect))
            .map(|def| def.name.clone())
            .collect();
        names.sort();
        names
    }
}
