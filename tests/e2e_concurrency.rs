//! Optimistic concurrency: merges replay on conflict and give up cleanly.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use metadata_merge::model::properties;
use metadata_merge::storage::MemoryTx;
use metadata_merge::{
    ClassRef, ContentObject, ContentStore, DataType, Error, ExecutionContext, MemoryDictionary,
    MemoryNamespaceRegistry, MemoryStore, MetadataExtractor, NodeRef, PropertyDefinition,
    PropertyMap, QName, Result, RetryPolicy, RunAs, TaggingService, TxMode, Value,
};
use pretty_assertions::assert_eq;

const EXAMPLE: &str = "http://example.org/model";

fn q(local: &str) -> QName {
    QName::new(EXAMPLE, local)
}

// ============================================================================
// Helper: a store where another writer sneaks in before each commit.
// ============================================================================

/// Wraps `MemoryStore`. While `interference` is positive, every commit is
/// preceded by a competing commit touching `example:description` on the
/// target, so the wrapped commit conflicts.
struct ContendedStore {
    inner: MemoryStore,
    target: parking_lot::Mutex<Option<NodeRef>>,
    interference: AtomicU32,
    edits: AtomicU32,
}

impl ContendedStore {
    fn new(interference: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            target: parking_lot::Mutex::new(None),
            interference: AtomicU32::new(interference),
            edits: AtomicU32::new(0),
        }
    }

    async fn interfere(&self) -> Result<()> {
        let Some(target) = self.target.lock().clone() else {
            return Ok(());
        };
        let remaining = self.interference.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(());
        }
        self.interference.store(remaining - 1, Ordering::SeqCst);
        let n = self.edits.fetch_add(1, Ordering::SeqCst) + 1;

        let other = RunAs::User("other".into());
        let mut tx = self.inner.begin_tx(TxMode::ReadWrite, &other).await?;
        self.inner
            .set_properties(&mut tx, &target, properties([(q("description"), format!("edit {n}"))]))
            .await?;
        self.inner.commit_tx(tx).await
    }
}

#[async_trait]
impl ContentStore for ContendedStore {
    type Tx = MemoryTx;

    async fn begin_tx(&self, mode: TxMode, identity: &RunAs) -> Result<MemoryTx> {
        self.inner.begin_tx(mode, identity).await
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        self.interfere().await?;
        self.inner.commit_tx(tx).await
    }

    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        self.inner.rollback_tx(tx).await
    }

    async fn create_node(&self, tx: &mut MemoryTx, type_name: QName, props: PropertyMap) -> Result<NodeRef> {
        self.inner.create_node(tx, type_name, props).await
    }

    async fn get_node(&self, tx: &mut MemoryTx, node: &NodeRef) -> Result<Option<ContentObject>> {
        self.inner.get_node(tx, node).await
    }

    async fn set_properties(&self, tx: &mut MemoryTx, node: &NodeRef, props: PropertyMap) -> Result<()> {
        self.inner.set_properties(tx, node, props).await
    }

    async fn remove_property(&self, tx: &mut MemoryTx, node: &NodeRef, key: &QName) -> Result<()> {
        self.inner.remove_property(tx, node, key).await
    }

    async fn add_aspect(&self, tx: &mut MemoryTx, node: &NodeRef, aspect: &QName) -> Result<()> {
        self.inner.add_aspect(tx, node, aspect).await
    }
}

#[async_trait]
impl TaggingService<MemoryTx> for ContendedStore {
    async fn add_tag(&self, tx: &mut MemoryTx, node: &NodeRef, tag: &str) -> Result<()> {
        self.inner.add_tag(tx, node, tag).await
    }
}

async fn setup(interference: u32) -> (MetadataExtractor<ContendedStore>, NodeRef) {
    let store = ContendedStore::new(interference);
    let mut tx = store.inner.begin_tx(TxMode::ReadWrite, &RunAs::System).await.unwrap();
    let node = store
        .inner
        .create_node(&mut tx, q("document"), properties([(q("title"), "Draft")]))
        .await
        .unwrap();
    store.inner.commit_tx(tx).await.unwrap();
    *store.target.lock() = Some(node.clone());

    let namespaces = MemoryNamespaceRegistry::new().with("example", EXAMPLE);
    let dictionary = MemoryDictionary::new()
        .define(PropertyDefinition::new(q("title"), DataType::Text, ClassRef::Type(q("document"))))
        .define(PropertyDefinition::new(q("description"), DataType::Text, ClassRef::Type(q("document"))));
    let extractor = MetadataExtractor::new(Arc::new(store), Arc::new(namespaces), Arc::new(dictionary));
    (extractor, node)
}

const DOC: &[u8] = br#"{"example:title": "Final"}"#;

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_conflict_is_replayed_until_commit() {
    let (ex, node) = setup(2).await;
    let ctx = ExecutionContext::system().with_retry(RetryPolicy::immediate(5));

    let report = ex.set_metadata(&ctx, &node, DOC).await.unwrap();

    assert!(!report.outcome.is_no_op());
    let obj = ex.store().inner.snapshot(&node).unwrap();
    assert_eq!(obj.get(&q("title")), Some(&Value::from("Final")));
    // the competing writer's last edit survives the replay
    assert_eq!(obj.get(&q("description")), Some(&Value::from("edit 2")));
    assert_eq!(obj.modifier.as_deref(), Some("System"));
}

#[tokio::test]
async fn test_retries_exhausted_leaves_merge_unapplied() {
    let (ex, node) = setup(10).await;
    let ctx = ExecutionContext::system().with_retry(RetryPolicy::immediate(3));

    let err = ex.set_metadata(&ctx, &node, DOC).await.unwrap_err();

    match &err {
        Error::RetriesExhausted { attempts, last } => {
            assert_eq!(*attempts, 4);
            assert!(matches!(**last, Error::Conflict(_)));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert!(err.is_contention());
    assert!(!err.is_validation());

    let obj = ex.store().inner.snapshot(&node).unwrap();
    assert_eq!(obj.get(&q("title")), Some(&Value::from("Draft")));
    assert_eq!(obj.modifier.as_deref(), Some("other"));
}

#[tokio::test]
async fn test_no_changes_commits_nothing() {
    let (ex, node) = setup(0).await;
    let before = ex.store().inner.write_commits();

    let report = ex
        .set_metadata_as_system(&node, br#"{"example:title": "Draft"}"#)
        .await
        .unwrap();

    assert!(report.outcome.is_no_op());
    assert_eq!(ex.store().inner.write_commits(), before);
}

#[tokio::test]
async fn test_parallel_merges_on_one_object_all_land() {
    let store = Arc::new(MemoryStore::new());
    let mut tx = store.begin_tx(TxMode::ReadWrite, &RunAs::System).await.unwrap();
    let node = store.create_node(&mut tx, q("document"), PropertyMap::new()).await.unwrap();
    store.commit_tx(tx).await.unwrap();

    let namespaces = MemoryNamespaceRegistry::new().with("example", EXAMPLE);
    let ex = Arc::new(MetadataExtractor::new(
        store.clone(),
        Arc::new(namespaces),
        Arc::new(MemoryDictionary::new()),
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let ex = ex.clone();
        let node = node.clone();
        handles.push(tokio::spawn(async move {
            let ctx = ExecutionContext::system().with_retry(RetryPolicy::immediate(50));
            let doc = format!(r#"{{"example:field{i}": {i}}}"#);
            ex.set_metadata(&ctx, &node, doc.as_bytes()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let obj = store.snapshot(&node).unwrap();
    for i in 0..8 {
        assert_eq!(obj.get(&q(&format!("field{i}"))), Some(&Value::Int(i)));
    }
}
