//! In-memory content store.
//!
//! This is the reference implementation of `ContentStore` and
//! `TaggingService`. Objects live in a HashMap protected by an RwLock.
//!
//! ## Transactions
//!
//! - Reads record the version of every object they see.
//! - Writes are staged on the transaction and invisible to others.
//! - Commit re-checks every recorded version under the write lock and
//!   fails with `Error::Conflict` if any object moved on; otherwise the
//!   staged objects are published with bumped versions.
//! - Rollback (or dropping the transaction) discards staged writes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::context::RunAs;
use crate::model::*;
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};
use super::{ContentStore, TaggingService};

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory content storage. Clones share the same objects.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    nodes: RwLock<HashMap<NodeRef, ContentObject>>,
    next_node_id: AtomicU64,
    next_tx_id: AtomicU64,
    commits: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed state of an object, outside any transaction.
    pub fn snapshot(&self, node: &NodeRef) -> Option<ContentObject> {
        self.inner.nodes.read().get(node).cloned()
    }

    /// Number of transactions ever begun.
    pub fn transactions_begun(&self) -> u64 {
        self.inner.next_tx_id.load(Ordering::Relaxed)
    }

    /// Number of commits that published at least one write.
    pub fn write_commits(&self) -> u64 {
        self.inner.commits.load(Ordering::Relaxed)
    }

    /// Load an object into the transaction's staging area for writing.
    fn staged<'t>(&self, tx: &'t mut MemoryTx, node: &NodeRef) -> Result<&'t mut ContentObject> {
        if tx.mode == TxMode::ReadOnly {
            return Err(Error::TxError(format!("{} is read-only", tx.id)));
        }
        if !tx.staged.contains_key(node) {
            let obj = self
                .inner
                .nodes
                .read()
                .get(node)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("Node {node}")))?;
            tx.read_versions.entry(node.clone()).or_insert(obj.version);
            tx.staged.insert(node.clone(), obj);
        }
        tx.staged
            .get_mut(node)
            .ok_or_else(|| Error::NotFound(format!("Node {node}")))
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// In-memory transaction: read versions plus staged objects.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    identity: RunAs,
    read_versions: HashMap<NodeRef, u64>,
    staged: HashMap<NodeRef, ContentObject>,
    created: HashSet<NodeRef>,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
    fn identity(&self) -> &RunAs { &self.identity }
}

// ============================================================================
// ContentStore impl
// ============================================================================

#[async_trait]
impl ContentStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin_tx(&self, mode: TxMode, identity: &RunAs) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed) + 1);
        Ok(MemoryTx {
            id,
            mode,
            identity: identity.clone(),
            read_versions: HashMap::new(),
            staged: HashMap::new(),
            created: HashSet::new(),
        })
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        if tx.staged.is_empty() {
            return Ok(());
        }

        let mut nodes = self.inner.nodes.write();
        for (node, seen) in &tx.read_versions {
            let current = nodes.get(node).map(|obj| obj.version);
            if current != Some(*seen) {
                return Err(Error::Conflict(format!(
                    "Node {node} changed since {} read it (version {seen}, now {})",
                    tx.id,
                    current.map_or_else(|| "deleted".to_owned(), |v| v.to_string()),
                )));
            }
        }
        for node in &tx.created {
            if nodes.contains_key(node) {
                return Err(Error::Conflict(format!("Node {node} already exists")));
            }
        }

        let modifier = tx.identity.name().to_owned();
        for (node, mut obj) in tx.staged {
            obj.version += 1;
            obj.modifier = Some(modifier.clone());
            nodes.insert(node, obj);
        }
        self.inner.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn rollback_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    // ========================================================================
    // Objects
    // ========================================================================

    async fn create_node(
        &self,
        tx: &mut MemoryTx,
        type_name: QName,
        props: PropertyMap,
    ) -> Result<NodeRef> {
        if tx.mode == TxMode::ReadOnly {
            return Err(Error::TxError(format!("{} is read-only", tx.id)));
        }
        let id = self.inner.next_node_id.fetch_add(1, Ordering::Relaxed) + 1;
        let node_ref = NodeRef::new(DEFAULT_STORE, format!("node-{id:08}"));
        let mut obj = ContentObject::new(node_ref.clone(), type_name);
        obj.properties = props;

        tx.created.insert(node_ref.clone());
        tx.staged.insert(node_ref.clone(), obj);
        Ok(node_ref)
    }

    async fn get_node(&self, tx: &mut MemoryTx, node: &NodeRef) -> Result<Option<ContentObject>> {
        if let Some(obj) = tx.staged.get(node) {
            return Ok(Some(obj.clone()));
        }
        let obj = self.inner.nodes.read().get(node).cloned();
        if let Some(obj) = &obj {
            tx.read_versions.entry(node.clone()).or_insert(obj.version);
        }
        Ok(obj)
    }

    async fn set_properties(
        &self,
        tx: &mut MemoryTx,
        node: &NodeRef,
        props: PropertyMap,
    ) -> Result<()> {
        self.staged(tx, node)?.properties.extend(props);
        Ok(())
    }

    async fn remove_property(&self, tx: &mut MemoryTx, node: &NodeRef, key: &QName) -> Result<()> {
        self.staged(tx, node)?.properties.remove(key);
        Ok(())
    }

    // ========================================================================
    // Aspects
    // ========================================================================

    async fn add_aspect(&self, tx: &mut MemoryTx, node: &NodeRef, aspect: &QName) -> Result<()> {
        self.staged(tx, node)?.aspects.insert(aspect.clone());
        Ok(())
    }
}

// ============================================================================
// TaggingService impl
// ============================================================================

#[async_trait]
impl TaggingService<MemoryTx> for MemoryStore {
    async fn add_tag(&self, tx: &mut MemoryTx, node: &NodeRef, tag: &str) -> Result<()> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::TaggingError(format!("empty tag for {node}")));
        }
        self.staged(tx, node)?.tags.insert(tag.to_owned());
        Ok(())
    }
}
