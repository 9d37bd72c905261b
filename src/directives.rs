//! Directive Extractor.
//!
//! Pulls the reserved control keys out of a raw document and validates
//! them into a typed `ControlDirectives` record. This is a two-pass
//! transform: the input document is consumed and a new document holding
//! only the ordinary entries is returned alongside the directives.
//!
//! Any invalid directive is fatal to the whole run.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use smallvec::SmallVec;

use crate::diagnostic::{DiagnosticKind, PropertyDiagnostic};
use crate::document::RawMetadataDocument;
use crate::policy::OverwritePolicy;

pub const OVERWRITE_POLICY: &str = "overwritePolicy";
pub const ENABLE_STRING_TAGGING: &str = "enableStringTagging";
pub const CARRY_ASPECT_PROPERTIES: &str = "carryAspectProperties";
pub const STRING_TAGGING_SEPARATORS: &str = "stringTaggingSeparators";

/// Separators used when the document does not name its own.
pub const DEFAULT_SEPARATORS: [&str; 3] = [",", ";", "|"];

pub type Separators = SmallVec<[String; 4]>;

/// Resolved control directives for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDirectives {
    pub overwrite_policy: OverwritePolicy,
    pub enable_string_tagging: bool,
    pub carry_aspect_properties: bool,
    pub string_tagging_separators: Separators,
}

impl Default for ControlDirectives {
    fn default() -> Self {
        Self {
            overwrite_policy: OverwritePolicy::Eager,
            enable_string_tagging: false,
            carry_aspect_properties: true,
            string_tagging_separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A directive whose value could not be accepted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DirectiveError {
    #[error("{key}={value} is invalid. Must be EAGER or PRAGMATIC")]
    InvalidOverwritePolicy { key: String, value: JsonValue },

    #[error("{key}={value} is invalid. Must be \"true\" or \"false\"")]
    InvalidBoolean { key: String, value: JsonValue },

    #[error("{key}={value} is invalid. {reason}")]
    InvalidSeparators { key: String, value: JsonValue, reason: String },
}

impl DirectiveError {
    pub fn key(&self) -> &str {
        match self {
            DirectiveError::InvalidOverwritePolicy { key, .. }
            | DirectiveError::InvalidBoolean { key, .. }
            | DirectiveError::InvalidSeparators { key, .. } => key,
        }
    }
}

/// Output of a successful extraction.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub directives: ControlDirectives,
    /// The document without any reserved-prefix key.
    pub remainder: RawMetadataDocument,
    /// Reserved-prefix keys that named no directive.
    pub diagnostics: Vec<PropertyDiagnostic>,
}

// ============================================================================
// DirectiveExtractor
// ============================================================================

#[derive(Debug, Clone)]
pub struct DirectiveExtractor {
    reserved_prefix: String,
    default_separators: Separators,
}

impl Default for DirectiveExtractor {
    fn default() -> Self {
        Self::new("sys:", DEFAULT_SEPARATORS.iter().map(|s| s.to_string()))
    }
}

impl DirectiveExtractor {
    pub fn new(
        reserved_prefix: impl Into<String>,
        default_separators: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            reserved_prefix: reserved_prefix.into(),
            default_separators: default_separators.into_iter().collect(),
        }
    }

    /// Split `document` into directives and ordinary entries.
    pub fn extract(&self, document: RawMetadataDocument) -> Result<Extracted, DirectiveError> {
        let mut reserved = Vec::new();
        let mut remainder = RawMetadataDocument::new();
        for (key, value) in document {
            match key.strip_prefix(self.reserved_prefix.as_str()) {
                Some(name) => reserved.push((name.to_owned(), key, value)),
                None => remainder.insert(key, value),
            }
        }

        let mut directives = ControlDirectives {
            string_tagging_separators: self.default_separators.clone(),
            ..ControlDirectives::default()
        };
        let mut diagnostics = Vec::new();

        for (name, key, value) in reserved {
            // A null directive is the same as an absent one.
            if value.is_null() && is_directive(&name) {
                continue;
            }
            match name.as_str() {
                OVERWRITE_POLICY => directives.overwrite_policy = parse_policy(&key, value)?,
                ENABLE_STRING_TAGGING => directives.enable_string_tagging = parse_bool(&key, value)?,
                CARRY_ASPECT_PROPERTIES => {
                    directives.carry_aspect_properties = parse_bool(&key, value)?
                }
                STRING_TAGGING_SEPARATORS => {
                    directives.string_tagging_separators = parse_separators(&key, value)?
                }
                _ => {
                    tracing::debug!(key = %key, value = %value, "ignoring unknown directive");
                    diagnostics.push(PropertyDiagnostic::new(key, value, DiagnosticKind::UnknownDirective));
                }
            }
        }

        Ok(Extracted { directives, remainder, diagnostics })
    }
}

fn is_directive(name: &str) -> bool {
    matches!(
        name,
        OVERWRITE_POLICY | ENABLE_STRING_TAGGING | CARRY_ASPECT_PROPERTIES | STRING_TAGGING_SEPARATORS
    )
}

fn parse_policy(key: &str, value: JsonValue) -> Result<OverwritePolicy, DirectiveError> {
    match value.as_str().and_then(|s| s.parse().ok()) {
        Some(policy) => Ok(policy),
        None => Err(DirectiveError::InvalidOverwritePolicy { key: key.to_owned(), value }),
    }
}

/// Only the exact strings `"true"` and `"false"` are accepted.
fn parse_bool(key: &str, value: JsonValue) -> Result<bool, DirectiveError> {
    match value.as_str() {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        _ => Err(DirectiveError::InvalidBoolean { key: key.to_owned(), value }),
    }
}

/// The value must be exactly one RFC 4180 record.
fn parse_separators(key: &str, value: JsonValue) -> Result<Separators, DirectiveError> {
    let invalid = |value: &JsonValue, reason: &str| DirectiveError::InvalidSeparators {
        key: key.to_owned(),
        value: value.clone(),
        reason: reason.to_owned(),
    };

    let Some(text) = value.as_str() else {
        return Err(invalid(&value, "Must be a string"));
    };

    if let Err(reason) = check_quotes(text) {
        return Err(invalid(&value, reason));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    let record = match records.next() {
        Some(Ok(record)) => record,
        Some(Err(_)) | None => return Err(invalid(&value, "Must be a CSV record (RFC 4180)")),
    };
    if records.next().is_some() {
        return Err(invalid(&value, "Should only have one record"));
    }

    Ok(record.iter().filter_map(normalize_separator).collect())
}

#[derive(Clone, Copy)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// RFC 4180 quoting: a field either holds no `"` or is wrapped in `"` with
/// inner quotes doubled. The csv reader is lenient here, so check first.
fn check_quotes(text: &str) -> Result<(), &'static str> {
    let mut state = QuoteState::FieldStart;
    for c in text.chars() {
        state = match (state, c) {
            (QuoteState::FieldStart, '"') => QuoteState::Quoted,
            (QuoteState::FieldStart | QuoteState::Unquoted, ',' | '\r' | '\n') => QuoteState::FieldStart,
            (QuoteState::FieldStart | QuoteState::Unquoted, '"') => {
                return Err("Quote inside an unquoted field");
            }
            (QuoteState::FieldStart | QuoteState::Unquoted, _) => QuoteState::Unquoted,
            (QuoteState::Quoted, '"') => QuoteState::QuoteInQuoted,
            (QuoteState::Quoted, _) => QuoteState::Quoted,
            (QuoteState::QuoteInQuoted, '"') => QuoteState::Quoted,
            (QuoteState::QuoteInQuoted, ',' | '\r' | '\n') => QuoteState::FieldStart,
            (QuoteState::QuoteInQuoted, _) => return Err("Text after a closing quote"),
        };
    }
    match state {
        QuoteState::Quoted => Err("Unterminated quoted field"),
        _ => Ok(()),
    }
}

/// Trim surrounding whitespace unless the separator is nothing but whitespace.
fn normalize_separator(field: &str) -> Option<String> {
    if field.is_empty() {
        return None;
    }
    let trimmed = field.trim();
    Some(if trimmed.is_empty() { field } else { trimmed }.to_owned())
}
