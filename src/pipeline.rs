//! Pipeline Orchestrator.
//!
//! ```text
//! bytes → decode → directives → qualify → convert ─┐   (no transaction)
//!                                                  ▼
//!            ┌──── retried transaction ─────────────────────────┐
//!            │ read snapshot → overwrite policy → apply delta   │
//!            └──────────────────────────────────────────────────┘
//! ```
//!
//! Validation runs before any transaction, so malformed input never holds
//! a lock. A global failure or an empty incoming set ends the run without
//! touching the store.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::apply::{apply_delta, AppliedChanges, ApplyContext};
use crate::config::ExtractorConfig;
use crate::context::{ExecutionContext, RunAs};
use crate::convert::convert_properties;
use crate::diagnostic::PropertyDiagnostic;
use crate::dictionary::Dictionary;
use crate::directives::{ControlDirectives, DirectiveExtractor};
use crate::document::RawMetadataDocument;
use crate::model::{NodeRef, PropertyMap};
use crate::namespace::{qualify, NamespaceRegistry};
use crate::storage::{ContentStore, MemoryStore, TaggingService};
use crate::tx::{RetryingTransaction, TransactionalWork, TxMode};
use crate::{Error, Result};

/// Why a successful run wrote nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoOpReason {
    /// No property survived qualification and conversion.
    NoProperties,
    /// The overwrite policy produced an empty delta.
    NoChanges,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    NoOp(NoOpReason),
    Applied(AppliedChanges),
}

impl Outcome {
    pub fn is_no_op(&self) -> bool {
        matches!(self, Outcome::NoOp(_))
    }

    pub fn applied(&self) -> Option<&AppliedChanges> {
        match self {
            Outcome::Applied(changes) => Some(changes),
            Outcome::NoOp(_) => None,
        }
    }
}

/// Result of one successful run, with every per-property drop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub node: NodeRef,
    pub directives: ControlDirectives,
    pub outcome: Outcome,
    pub diagnostics: Vec<PropertyDiagnostic>,
}

// ============================================================================
// MetadataExtractor
// ============================================================================

/// The primary entry point: merges metadata documents into objects held
/// by a `ContentStore`.
pub struct MetadataExtractor<S: ContentStore> {
    store: Arc<S>,
    tagging: Arc<dyn TaggingService<S::Tx>>,
    namespaces: Arc<dyn NamespaceRegistry>,
    dictionary: Arc<dyn Dictionary>,
    directives: DirectiveExtractor,
    config: ExtractorConfig,
}

impl<S: ContentStore> MetadataExtractor<S> {
    /// Create an extractor whose store is also its tagging service.
    pub fn new(
        store: Arc<S>,
        namespaces: Arc<dyn NamespaceRegistry>,
        dictionary: Arc<dyn Dictionary>,
    ) -> Self
    where
        S: TaggingService<S::Tx>,
    {
        let tagging: Arc<dyn TaggingService<S::Tx>> = store.clone();
        Self::with_tagging(store, tagging, namespaces, dictionary)
    }

    pub fn with_tagging(
        store: Arc<S>,
        tagging: Arc<dyn TaggingService<S::Tx>>,
        namespaces: Arc<dyn NamespaceRegistry>,
        dictionary: Arc<dyn Dictionary>,
    ) -> Self {
        let config = ExtractorConfig::default();
        Self {
            store,
            tagging,
            namespaces,
            dictionary,
            directives: directive_extractor(&config),
            config,
        }
    }

    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.directives = directive_extractor(&config);
        self.config = config;
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run as the system identity with the configured retry policy.
    pub async fn set_metadata_as_system(&self, node: &NodeRef, bytes: &[u8]) -> Result<ExtractionReport> {
        let ctx = ExecutionContext::new(RunAs::System, self.config.retry.clone());
        self.set_metadata(&ctx, node, bytes).await
    }

    /// Decode, validate and merge one metadata document into `node`.
    ///
    /// Returns `Err` for a malformed document, an invalid directive, a
    /// missing object, or contention that outlasted the retry policy. In
    /// every error case nothing was written.
    pub async fn set_metadata(
        &self,
        ctx: &ExecutionContext,
        node: &NodeRef,
        bytes: &[u8],
    ) -> Result<ExtractionReport> {
        tracing::trace!(node = %node, run_as = %ctx.identity(), "update metadata");

        let document = RawMetadataDocument::from_slice(bytes).inspect_err(|e| {
            tracing::error!(node = %node, error = %e, "failed to read metadata document");
        })?;

        let extracted = self.directives.extract(document).map_err(|e| {
            tracing::error!(node = %node, key = %e.key(), error = %e, "invalid directive");
            Error::InvalidDirective(e)
        })?;
        let directives = extracted.directives;
        let mut diagnostics = extracted.diagnostics;

        let qualified = qualify(extracted.remainder, self.namespaces.as_ref(), &mut diagnostics);
        let incoming = convert_properties(qualified, self.dictionary.as_ref(), &mut diagnostics);

        for diagnostic in &diagnostics {
            tracing::warn!(node = %node, key = %diagnostic.key, "{diagnostic}");
        }

        let outcome = if incoming.is_empty() {
            Outcome::NoOp(NoOpReason::NoProperties)
        } else {
            let mut work = MergeWork { extractor: self, node, incoming: &incoming, directives: &directives };
            RetryingTransaction::new(ctx.retry(), TxMode::ReadWrite)
                .run(self.store.as_ref(), ctx, &mut work)
                .await
                .inspect_err(|e| tracing::error!(node = %node, error = %e, "metadata merge failed"))?
        };

        match &outcome {
            Outcome::Applied(changes) => tracing::debug!(
                node = %node,
                properties = changes.properties.len(),
                tags = changes.tags.len(),
                aspects = changes.aspects_added.len(),
                "extraction of metadata complete"
            ),
            Outcome::NoOp(reason) => tracing::debug!(node = %node, ?reason, "nothing to apply"),
        }

        Ok(ExtractionReport { node: node.clone(), directives, outcome, diagnostics })
    }
}

/// In-memory extractor for testing and embedding.
impl MetadataExtractor<MemoryStore> {
    pub fn in_memory(namespaces: Arc<dyn NamespaceRegistry>, dictionary: Arc<dyn Dictionary>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), namespaces, dictionary)
    }
}

fn directive_extractor(config: &ExtractorConfig) -> DirectiveExtractor {
    DirectiveExtractor::new(config.reserved_prefix.clone(), config.default_separators.iter().cloned())
}

// ============================================================================
// Transactional phase
// ============================================================================

/// Read the snapshot, compute the delta, apply it. Replayed whole on conflict.
struct MergeWork<'a, S: ContentStore> {
    extractor: &'a MetadataExtractor<S>,
    node: &'a NodeRef,
    incoming: &'a PropertyMap,
    directives: &'a ControlDirectives,
}

#[async_trait]
impl<'a, S: ContentStore> TransactionalWork<S> for MergeWork<'a, S> {
    type Output = Outcome;

    async fn run(&mut self, store: &S, tx: &mut S::Tx) -> Result<Outcome> {
        let target = store
            .get_node(tx, self.node)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Node {}", self.node)))?;

        let delta = self.directives.overwrite_policy.apply(self.incoming, &target.properties);
        if delta.is_empty() {
            return Ok(Outcome::NoOp(NoOpReason::NoChanges));
        }
        tracing::trace!(node = %self.node, policy = %self.directives.overwrite_policy, changed = delta.len(), "delta computed");

        let cx = ApplyContext {
            dictionary: self.extractor.dictionary.as_ref(),
            tagging: self.extractor.tagging.as_ref(),
            directives: self.directives,
        };
        let changes = apply_delta(store, tx, &target, delta, &cx).await?;
        if changes.is_empty() {
            return Ok(Outcome::NoOp(NoOpReason::NoChanges));
        }
        Ok(Outcome::Applied(changes))
    }
}
