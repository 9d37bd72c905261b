//! Triggering extraction from content events.
//!
//! Events collected during one committing transaction are reduced to at
//! most one extraction per object and handed to an `ExtractionWorker`,
//! which runs the pipeline off the caller's path under the system
//! identity and reports each result on a channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::NodeRef;
use crate::pipeline::{ExtractionReport, MetadataExtractor};
use crate::storage::ContentStore;
use crate::{Error, Result};

/// A state transition of a content object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEvent {
    /// A new version was committed.
    VersionCreated { node: NodeRef },
    /// The content stream was written.
    ContentUpdated { node: NodeRef, new_content: bool },
    /// A form was saved against the object.
    FormSaved { node: NodeRef, content_field_present: bool },
}

impl ContentEvent {
    pub fn node(&self) -> &NodeRef {
        match self {
            ContentEvent::VersionCreated { node }
            | ContentEvent::ContentUpdated { node, .. }
            | ContentEvent::FormSaved { node, .. } => node,
        }
    }

    /// Whether the transition brought new content worth extracting.
    pub fn wants_extraction(&self) -> bool {
        match self {
            ContentEvent::VersionCreated { .. } => true,
            ContentEvent::ContentUpdated { new_content, .. } => *new_content,
            ContentEvent::FormSaved { content_field_present, .. } => *content_field_present,
        }
    }
}

/// Objects to extract for one transaction's events, first-seen order, each once.
pub fn events_to_extract(events: impl IntoIterator<Item = ContentEvent>) -> Vec<NodeRef> {
    let mut nodes: Vec<NodeRef> = Vec::new();
    for event in events {
        if !event.wants_extraction() {
            tracing::debug!(node = %event.node(), "skipping extraction: no content change");
            continue;
        }
        if !nodes.contains(event.node()) {
            nodes.push(event.node().clone());
        }
    }
    nodes
}

/// Supplies the metadata document produced for an object's content.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self, node: &NodeRef) -> Result<Vec<u8>>;
}

/// Outcome of one queued extraction.
#[derive(Debug)]
pub struct ExtractionResult {
    pub node: NodeRef,
    pub result: Result<ExtractionReport>,
}

// ============================================================================
// ExtractionWorker
// ============================================================================

/// Background task draining a bounded queue of extraction requests.
pub struct ExtractionWorker {
    queue: mpsc::Sender<NodeRef>,
    handle: JoinHandle<()>,
}

impl ExtractionWorker {
    /// Spawn the worker on the current tokio runtime. Queue capacity comes
    /// from the extractor's configuration.
    pub fn spawn<S: ContentStore>(
        extractor: Arc<MetadataExtractor<S>>,
        source: Arc<dyn MetadataSource>,
        results: mpsc::Sender<ExtractionResult>,
    ) -> Self {
        let (queue, mut requests) = mpsc::channel::<NodeRef>(extractor.config().queue_capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(node) = requests.recv().await {
                let result = match source.fetch(&node).await {
                    Ok(bytes) => extractor.set_metadata_as_system(&node, &bytes).await,
                    Err(e) => {
                        tracing::error!(node = %node, error = %e, "failed to fetch metadata");
                        Err(e)
                    }
                };
                if results.send(ExtractionResult { node, result }).await.is_err() {
                    tracing::warn!("extraction results receiver dropped");
                }
            }
            tracing::debug!("extraction worker stopped");
        });
        Self { queue, handle }
    }

    /// Queue one object for extraction.
    pub async fn submit(&self, node: NodeRef) -> Result<()> {
        self.queue
            .send(node)
            .await
            .map_err(|e| Error::Worker(format!("queue closed, dropped {}", e.0)))
    }

    /// Queue the extractions a committed transaction's events call for.
    /// Returns how many were queued.
    pub async fn on_commit(&self, events: impl IntoIterator<Item = ContentEvent>) -> Result<usize> {
        let nodes = events_to_extract(events);
        let count = nodes.len();
        for node in nodes {
            self.submit(node).await?;
        }
        Ok(count)
    }

    /// Stop accepting work and wait for queued extractions to finish.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.queue);
        self.handle.await.map_err(|e| Error::Worker(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeRef {
        NodeRef::resolve(id).unwrap()
    }

    #[test]
    fn test_events_collapse_per_node() {
        let events = vec![
            ContentEvent::ContentUpdated { node: node("a"), new_content: true },
            ContentEvent::VersionCreated { node: node("a") },
            ContentEvent::VersionCreated { node: node("b") },
        ];
        assert_eq!(events_to_extract(events), vec![node("a"), node("b")]);
    }

    #[test]
    fn test_events_without_new_content_are_skipped() {
        let events = vec![
            ContentEvent::ContentUpdated { node: node("a"), new_content: false },
            ContentEvent::FormSaved { node: node("b"), content_field_present: false },
            ContentEvent::FormSaved { node: node("c"), content_field_present: true },
        ];
        assert_eq!(events_to_extract(events), vec![node("c")]);
    }
}
