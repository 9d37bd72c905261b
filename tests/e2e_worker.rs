//! Event-triggered extraction through the background worker.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use metadata_merge::{
    ContentEvent, ContentStore, Error, ExtractionResult, ExtractionWorker, MemoryDictionary,
    MemoryNamespaceRegistry, MemoryStore, MetadataExtractor, MetadataSource, NodeRef, PropertyMap,
    QName, Result, RunAs, TxMode, Value,
};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

const EXAMPLE: &str = "http://example.org/model";

fn q(local: &str) -> QName {
    QName::new(EXAMPLE, local)
}

/// Serves canned metadata documents per object.
struct CannedSource {
    documents: HashMap<NodeRef, &'static str>,
}

#[async_trait]
impl MetadataSource for CannedSource {
    async fn fetch(&self, node: &NodeRef) -> Result<Vec<u8>> {
        self.documents
            .get(node)
            .map(|doc| doc.as_bytes().to_vec())
            .ok_or_else(|| Error::NotFound(format!("No content for {node}")))
    }
}

async fn create_document(store: &MemoryStore) -> NodeRef {
    let mut tx = store.begin_tx(TxMode::ReadWrite, &RunAs::User("ada".into())).await.unwrap();
    let node = store.create_node(&mut tx, q("document"), PropertyMap::new()).await.unwrap();
    store.commit_tx(tx).await.unwrap();
    node
}

#[tokio::test]
async fn test_worker_extracts_once_per_committed_object() {
    let namespaces = MemoryNamespaceRegistry::new().with("example", EXAMPLE);
    let extractor = Arc::new(MetadataExtractor::in_memory(
        Arc::new(namespaces),
        Arc::new(MemoryDictionary::new()),
    ));
    let report_node = create_document(extractor.store()).await;
    let photo_node = create_document(extractor.store()).await;
    let untouched = create_document(extractor.store()).await;
    let missing = NodeRef::resolve("no-content").unwrap();

    let source = CannedSource {
        documents: HashMap::from([
            (report_node.clone(), r#"{"example:title": "Report"}"#),
            (photo_node.clone(), r#"{"example:title": "Photo", "example:width": 640}"#),
        ]),
    };
    let (tx, mut rx) = mpsc::channel::<ExtractionResult>(16);
    let worker = ExtractionWorker::spawn(extractor.clone(), Arc::new(source), tx);

    let queued = worker
        .on_commit([
            ContentEvent::ContentUpdated { node: report_node.clone(), new_content: true },
            ContentEvent::VersionCreated { node: report_node.clone() },
            ContentEvent::FormSaved { node: photo_node.clone(), content_field_present: true },
            ContentEvent::ContentUpdated { node: untouched.clone(), new_content: false },
            ContentEvent::VersionCreated { node: missing.clone() },
        ])
        .await
        .unwrap();
    assert_eq!(queued, 3);
    worker.shutdown().await.unwrap();

    let mut results = Vec::new();
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    let nodes: Vec<_> = results.iter().map(|r| r.node.clone()).collect();
    assert_eq!(nodes, vec![report_node.clone(), photo_node.clone(), missing.clone()]);
    assert!(results[0].result.is_ok());
    assert!(results[1].result.is_ok());
    assert!(matches!(results[2].result, Err(Error::NotFound(_))));

    let store = extractor.store();
    let report = store.snapshot(&report_node).unwrap();
    assert_eq!(report.get(&q("title")), Some(&Value::from("Report")));
    assert_eq!(report.modifier.as_deref(), Some("System"));
    let photo = store.snapshot(&photo_node).unwrap();
    assert_eq!(photo.get(&q("width")), Some(&Value::Int(640)));
    assert_eq!(store.snapshot(&untouched).unwrap().modifier.as_deref(), Some("ada"));
}

#[tokio::test]
async fn test_submit_after_results_dropped_still_runs() {
    let namespaces = MemoryNamespaceRegistry::new().with("example", EXAMPLE);
    let extractor = Arc::new(MetadataExtractor::in_memory(
        Arc::new(namespaces),
        Arc::new(MemoryDictionary::new()),
    ));
    let node = create_document(extractor.store()).await;
    let source = CannedSource { documents: HashMap::from([(node.clone(), r#"{"example:title": "T"}"#)]) };

    let (tx, rx) = mpsc::channel::<ExtractionResult>(1);
    drop(rx);
    let worker = ExtractionWorker::spawn(extractor.clone(), Arc::new(source), tx);
    worker.submit(node.clone()).await.unwrap();
    worker.shutdown().await.unwrap();

    assert_eq!(
        extractor.store().snapshot(&node).unwrap().get(&q("title")),
        Some(&Value::from("T"))
    );
}
