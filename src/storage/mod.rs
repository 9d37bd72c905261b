//! # Content Store Traits
//!
//! The contract between the extraction pipeline and whatever persists
//! content objects. Tagging is a separate contract because it is usually
//! a separate service, but it joins the same transaction.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory, optimistic concurrency, for testing/embedding |

pub mod memory;

use async_trait::async_trait;

use crate::context::RunAs;
use crate::model::*;
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

pub use memory::{MemoryStore, MemoryTx};

// ============================================================================
// ContentStore Trait
// ============================================================================

/// Transactional access to content objects.
///
/// Writes become visible on `commit_tx`. A commit that loses a race with
/// another writer must fail with `Error::Conflict` so the caller can replay.
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// The transaction type for this store.
    type Tx: Transaction;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new transaction acting as `identity`.
    async fn begin_tx(&self, mode: TxMode, identity: &RunAs) -> Result<Self::Tx>;

    /// Commit a transaction.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction, discarding its writes.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Objects
    // ========================================================================

    /// Create an object of the given type with initial properties.
    async fn create_node(
        &self,
        tx: &mut Self::Tx,
        type_name: QName,
        props: PropertyMap,
    ) -> Result<NodeRef>;

    /// Get an object by reference. Returns None if not found.
    async fn get_node(&self, tx: &mut Self::Tx, node: &NodeRef) -> Result<Option<ContentObject>>;

    /// Current property snapshot of an object.
    async fn get_properties(&self, tx: &mut Self::Tx, node: &NodeRef) -> Result<PropertyMap> {
        self.get_node(tx, node)
            .await?
            .map(|obj| obj.properties)
            .ok_or_else(|| Error::NotFound(format!("Node {node}")))
    }

    /// Upsert properties. Properties not named are left alone.
    async fn set_properties(
        &self,
        tx: &mut Self::Tx,
        node: &NodeRef,
        props: PropertyMap,
    ) -> Result<()>;

    /// Remove a property.
    async fn remove_property(&self, tx: &mut Self::Tx, node: &NodeRef, key: &QName) -> Result<()>;

    // ========================================================================
    // Aspects
    // ========================================================================

    /// Activate an aspect. No-op if already present.
    async fn add_aspect(&self, tx: &mut Self::Tx, node: &NodeRef, aspect: &QName) -> Result<()>;

    async fn has_aspect(&self, tx: &mut Self::Tx, node: &NodeRef, aspect: &QName) -> Result<bool> {
        self.get_node(tx, node)
            .await?
            .map(|obj| obj.has_aspect(aspect))
            .ok_or_else(|| Error::NotFound(format!("Node {node}")))
    }
}

// ============================================================================
// TaggingService Trait
// ============================================================================

/// Turns string tokens into tag associations on an object.
#[async_trait]
pub trait TaggingService<Tx: Transaction>: Send + Sync {
    /// Ensure `tag` is associated with `node`. Idempotent.
    async fn add_tag(&self, tx: &mut Tx, node: &NodeRef, tag: &str) -> Result<()>;
}
