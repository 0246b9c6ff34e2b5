//! In-process source over a fixed document list.

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::{self, StreamExt};

use crate::core::identifier::canonical_id;
use crate::core::{DocumentStream, SourceReader};
use crate::error::Result;

/// Documents held in memory, served in ascending `_id` order.
pub struct MemorySource {
    collection: String,
    documents: Vec<Document>,
    estimate: Option<u64>,
}

impl MemorySource {
    pub fn new(collection: impl Into<String>, mut documents: Vec<Document>) -> Self {
        documents.sort_by_key(|d| d.get("_id").and_then(canonical_id));
        Self {
            collection: collection.into(),
            documents,
            estimate: None,
        }
    }

    /// Override the reported estimate, which otherwise equals the exact
    /// document count.
    pub fn with_estimate(mut self, estimate: u64) -> Self {
        self.estimate = Some(estimate);
        self
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn estimated_count(&self) -> Result<u64> {
        Ok(self.estimate.unwrap_or(self.documents.len() as u64))
    }

    async fn open_cursor(&self, _read_batch_size: u32) -> Result<DocumentStream> {
        Ok(stream::iter(self.documents.clone().into_iter().map(Ok)).boxed())
    }

    async fn embedded_count(&self, field: &str) -> Result<u64> {
        Ok(self
            .documents
            .iter()
            .map(|d| match d.get(field) {
                Some(Bson::Array(items)) => items.len() as u64,
                _ => 0,
            })
            .sum())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn close(&self) {}
}
