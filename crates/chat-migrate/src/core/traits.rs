//! Core traits for the store collaborators.
//!
//! - [`SourceReader`]: forward-only, id-ordered access to one source collection
//! - [`TargetWriter`]: idempotent batched inserts into destination relations
//!
//! The pipeline core never opens connections itself; it is handed
//! implementations of these traits. Every method that touches a store is
//! `async`, which makes cursor advance and flush the explicit suspension
//! points of the run.

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;

use crate::error::Result;

use super::schema::Relation;
use super::value::Row;

/// Forward-only stream of source documents in ascending `_id` order.
pub type DocumentStream = BoxStream<'static, Result<Document>>;

/// Read documents from one source collection.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Approximate number of documents (metadata based, not a snapshot).
    async fn estimated_count(&self) -> Result<u64>;

    /// Open a cursor sorted by `_id` ascending.
    ///
    /// `read_batch_size` is the number of documents fetched per round trip.
    async fn open_cursor(&self, read_batch_size: u32) -> Result<DocumentStream>;

    /// Total number of elements in the embedded array `field` across all
    /// documents (missing arrays count as zero).
    async fn embedded_count(&self, field: &str) -> Result<u64>;

    /// Liveness check.
    async fn ping(&self) -> Result<()>;

    /// Name of the collection being read.
    fn collection(&self) -> &str;

    /// Release the connection.
    async fn close(&self);
}

/// Rows destined for one relation within a single flush.
#[derive(Debug, Clone)]
pub struct RelationRows {
    pub relation: Relation,
    pub rows: Vec<Row>,
}

impl RelationRows {
    pub fn new(relation: Relation, rows: Vec<Row>) -> Self {
        Self { relation, rows }
    }
}

/// Write rows into a destination store.
///
/// # Idempotency
///
/// Inserting a row whose primary key already exists must succeed without
/// error, so a rerun after a crash can replay flushes that already landed.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Write one flush worth of rows, possibly spanning several relations.
    ///
    /// Implementations should apply the whole flush as one unit of work when
    /// the store supports it. Returns the number of rows submitted.
    async fn write_flush(&self, groups: Vec<RelationRows>) -> Result<u64>;

    /// Exact row count for a relation.
    async fn row_count(&self, relation: Relation) -> Result<u64>;

    /// Liveness check.
    async fn ping(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "postgres", "scylla").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}
