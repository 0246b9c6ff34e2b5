//! MongoDB source.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::options::FindOptions;
use mongodb::{Client, Collection, Database};
use tracing::{debug, info};

use crate::config::{redact_uri, SourceConfig};
use crate::core::{DocumentStream, SourceReader};
use crate::error::{MigrateError, Result};

/// Reader over one MongoDB collection.
pub struct MongoSource {
    db: Database,
    collection: Collection<Document>,
    name: String,
}

impl MongoSource {
    /// Connect and verify with a `ping` command.
    pub async fn connect(config: &SourceConfig, collection: &str) -> Result<Self> {
        let client = Client::with_uri_str(&config.uri)
            .await
            .map_err(|e| MigrateError::connection("mongodb", e))?;
        let db = client.database(&config.database);

        let source = Self {
            collection: db.collection::<Document>(collection),
            db,
            name: collection.to_string(),
        };
        source.ping().await?;

        info!(
            "Connected to MongoDB source: {} ({}.{})",
            redact_uri(&config.uri),
            config.database,
            collection
        );
        Ok(source)
    }
}

#[async_trait]
impl SourceReader for MongoSource {
    async fn estimated_count(&self) -> Result<u64> {
        self.collection
            .estimated_document_count(None)
            .await
            .map_err(MigrateError::source)
    }

    async fn open_cursor(&self, read_batch_size: u32) -> Result<DocumentStream> {
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .batch_size(read_batch_size)
            .build();
        let cursor = self
            .collection
            .find(None, options)
            .await
            .map_err(MigrateError::source)?;
        debug!(
            "Opened cursor on {} (batch size {})",
            self.name, read_batch_size
        );
        Ok(cursor.map_err(MigrateError::source).boxed())
    }

    async fn embedded_count(&self, field: &str) -> Result<u64> {
        let pipeline = vec![
            doc! { "$project": { "n": { "$size": { "$ifNull": [format!("${}", field), []] } } } },
            doc! { "$group": { "_id": Bson::Null, "total": { "$sum": "$n" } } },
        ];
        let mut cursor = self
            .collection
            .aggregate(pipeline, None)
            .await
            .map_err(MigrateError::source)?;

        let total = match cursor.try_next().await.map_err(MigrateError::source)? {
            Some(row) => match row.get("total") {
                Some(Bson::Int32(n)) => *n as i64,
                Some(Bson::Int64(n)) => *n,
                Some(Bson::Double(n)) => *n as i64,
                _ => 0,
            },
            None => 0,
        };
        Ok(total.max(0) as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| MigrateError::connection("mongodb", e))?;
        Ok(())
    }

    fn collection(&self) -> &str {
        &self.name
    }

    async fn close(&self) {
        debug!("Closing MongoDB reader for {}", self.name);
    }
}
