//! # metadata-merge — Extracted Metadata into Content Properties
//!
//! Ingests a machine-produced metadata document (key/value pairs pulled
//! from a binary asset by an external analysis step) and merges it into
//! the properties of a content object under an explicit overwrite policy.
//! The object ends up either fully updated or untouched.
//!
//! ## Design Principles
//!
//! 1. **Validate before locking**: directives, keys and values are checked
//!    before any transaction begins
//! 2. **Two error channels**: a bad directive aborts the run (`Error`); a bad
//!    property is dropped and reported (`PropertyDiagnostic`)
//! 3. **Policies are pure**: `OverwritePolicy::apply` maps (incoming,
//!    existing) to a `PropertyDelta` with no side effects
//! 4. **Trait-first**: `ContentStore`, `TaggingService`, `NamespaceRegistry`
//!    and `Dictionary` are the seams to the outside world
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use metadata_merge::{
//!     ExecutionContext, MemoryNamespaceRegistry, MemoryDictionary, MetadataExtractor, NodeRef,
//! };
//!
//! # async fn example(node: NodeRef) -> metadata_merge::Result<()> {
//! let namespaces = MemoryNamespaceRegistry::new().with("example", "http://example.org/model");
//! let extractor = MetadataExtractor::in_memory(Arc::new(namespaces), Arc::new(MemoryDictionary::new()));
//!
//! let report = extractor
//!     .set_metadata(&ExecutionContext::system(), &node, br#"{"example:title": "Report"}"#)
//!     .await?;
//! println!("{:?}", report.outcome);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod namespace;
pub mod dictionary;
pub mod document;
pub mod diagnostic;
pub mod directives;
pub mod convert;
pub mod policy;
pub mod apply;
pub mod storage;
pub mod tx;
pub mod context;
pub mod config;
pub mod pipeline;
pub mod trigger;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{ContentObject, NodeRef, PropertyMap, QName, Value};

// ============================================================================
// Re-exports: Pipeline stages
// ============================================================================

pub use apply::AppliedChanges;
pub use diagnostic::{DiagnosticKind, PropertyDiagnostic};
pub use dictionary::{ClassRef, DataType, Dictionary, MemoryDictionary, PropertyDefinition};
pub use directives::{ControlDirectives, DirectiveError, DirectiveExtractor};
pub use document::RawMetadataDocument;
pub use namespace::{MemoryNamespaceRegistry, NamespaceRegistry};
pub use policy::{OverwritePolicy, PropertyDelta};

// ============================================================================
// Re-exports: Storage and transactions
// ============================================================================

pub use storage::{ContentStore, MemoryStore, TaggingService};
pub use tx::{RetryPolicy, Transaction, TxId, TxMode};

// ============================================================================
// Re-exports: Orchestration
// ============================================================================

pub use config::ExtractorConfig;
pub use context::{ExecutionContext, RunAs};
pub use pipeline::{ExtractionReport, MetadataExtractor, NoOpReason, Outcome};
pub use trigger::{ContentEvent, ExtractionResult, ExtractionWorker, MetadataSource};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed metadata document: {0}")]
    InvalidDocument(String),

    #[error("Invalid directive: {0}")]
    InvalidDirective(#[from] DirectiveError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Tagging error: {0}")]
    TaggingError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Extraction worker error: {0}")]
    Worker(String),
}

impl Error {
    /// Bad input: nothing was read from or written to the store.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidDocument(_) | Error::InvalidDirective(_))
    }

    /// Lost races with other writers, transiently or for good.
    pub fn is_contention(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::RetriesExhausted { .. })
    }

    /// Worth replaying the whole transaction for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
