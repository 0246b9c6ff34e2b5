//! ScyllaDB target.
//!
//! CQL `INSERT` is an upsert, so replaying a flush rewrites identical cells
//! and is idempotent. Rows are sent as UNLOGGED batches of prepared
//! statements; there is no atomicity across batches or tables.

use std::collections::HashMap;

use async_trait::async_trait;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::batch::{Batch, BatchType};
use scylla::statement::prepared::PreparedStatement;
use scylla::value::{CqlTimestamp, CqlValue};
use tracing::{debug, error, info};

use crate::config::ScyllaConfig;
use crate::core::{Relation, RelationRows, Row, SqlValue, StoreKind, TargetWriter};
use crate::error::{MigrateError, Result};

/// ScyllaDB writer with one prepared INSERT per relation.
pub struct ScyllaTarget {
    session: Session,
    inserts: HashMap<Relation, PreparedStatement>,
    batch_rows: usize,
}

impl ScyllaTarget {
    /// Connect to the cluster, switch to the keyspace, and prepare inserts.
    pub async fn connect(config: &ScyllaConfig, batch_rows: usize) -> Result<Self> {
        let session = SessionBuilder::new()
            .known_nodes(&config.hosts)
            .use_keyspace(&config.keyspace, false)
            .build()
            .await
            .map_err(|e| MigrateError::connection("scylla", e))?;

        let mut inserts = HashMap::new();
        for relation in Relation::ALL {
            if relation.store() != StoreKind::WideColumn {
                continue;
            }
            let prepared = session
                .prepare(insert_cql(relation))
                .await
                .map_err(|e| MigrateError::connection("scylla", e))?;
            inserts.insert(relation, prepared);
        }

        info!(
            "Connected to ScyllaDB: {} (keyspace {})",
            config.hosts.join(","),
            config.keyspace
        );

        Ok(Self {
            session,
            inserts,
            batch_rows: batch_rows.max(1),
        })
    }

    fn prepared(&self, relation: Relation) -> Result<&PreparedStatement> {
        self.inserts.get(&relation).ok_or_else(|| {
            MigrateError::write(
                relation.table_name(),
                format!("{} is not a ScyllaDB relation", relation),
            )
        })
    }
}

#[async_trait]
impl TargetWriter for ScyllaTarget {
    async fn write_flush(&self, groups: Vec<RelationRows>) -> Result<u64> {
        let mut submitted = 0u64;

        for group in groups {
            let prepared = self.prepared(group.relation)?;
            let table = group.relation.table_name();

            for chunk in group.rows.chunks(self.batch_rows) {
                let mut batch = Batch::new(BatchType::Unlogged);
                let mut values = Vec::with_capacity(chunk.len());
                for row in chunk {
                    batch.append_statement(prepared.clone());
                    values.push(cql_row(row));
                }

                if let Err(e) = self.session.batch(&batch, values).await {
                    error!("Batch into {} failed ({} rows): {}", table, chunk.len(), e);
                    return Err(MigrateError::write(table, e));
                }
                submitted += chunk.len() as u64;
            }
            debug!("ScyllaDB {}: {} rows submitted", table, group.rows.len());
        }

        Ok(submitted)
    }

    async fn row_count(&self, relation: Relation) -> Result<u64> {
        let cql = format!("SELECT COUNT(*) FROM {}", relation.table_name());
        let result = self
            .session
            .query_unpaged(cql, ())
            .await
            .map_err(|e| MigrateError::connection("scylla", e))?;
        let (count,) = result
            .into_rows_result()
            .map_err(|e| MigrateError::connection("scylla", e))?
            .single_row::<(i64,)>()
            .map_err(|e| MigrateError::connection("scylla", e))?;
        Ok(count.max(0) as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.session
            .query_unpaged("SELECT release_version FROM system.local", ())
            .await
            .map_err(|e| MigrateError::connection("scylla", e))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "scylla"
    }

    async fn close(&self) {
        // Session connections are closed on drop
    }
}

fn insert_cql(relation: Relation) -> String {
    let columns = relation.columns();
    let markers = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        relation.table_name(),
        columns.join(", "),
        markers
    )
}

fn cql_value(value: &SqlValue) -> Option<CqlValue> {
    match value {
        SqlValue::Null(_) => None,
        SqlValue::Bool(b) => Some(CqlValue::Boolean(*b)),
        SqlValue::I32(n) => Some(CqlValue::Int(*n)),
        SqlValue::Text(s) | SqlValue::Json(s) => Some(CqlValue::Text(s.clone())),
        SqlValue::Uuid(u) => Some(CqlValue::Uuid(*u)),
        SqlValue::Timestamp(ts) => Some(CqlValue::Timestamp(CqlTimestamp(ts.timestamp_millis()))),
        SqlValue::TextSet(set) => Some(CqlValue::Set(
            set.iter().cloned().map(CqlValue::Text).collect(),
        )),
    }
}

fn cql_row(row: &Row) -> Vec<Option<CqlValue>> {
    row.iter().map(cql_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{translate, SqlNullType};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    #[test]
    fn test_insert_cql() {
        assert_eq!(
            insert_cql(Relation::ReadReceipts),
            "INSERT INTO read_receipts (conversation_id, user_id, last_read_at, last_read_msg) \
             VALUES (?, ?, ?, ?)"
        );
    }

    #[test]
    fn test_cql_values() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let set: BTreeSet<String> = ["b", "a"].iter().map(|s| s.to_string()).collect();
        let row = vec![
            translate("c").into(),
            SqlValue::Timestamp(at),
            SqlValue::Null(SqlNullType::Text),
            SqlValue::TextSet(set),
        ];

        let cql = cql_row(&row);
        assert_eq!(cql[0], Some(CqlValue::Uuid(translate("c"))));
        assert_eq!(
            cql[1],
            Some(CqlValue::Timestamp(CqlTimestamp(at.timestamp_millis())))
        );
        assert_eq!(cql[2], None);
        assert_eq!(
            cql[3],
            Some(CqlValue::Set(vec![
                CqlValue::Text("a".into()),
                CqlValue::Text("b".into())
            ]))
        );
    }
}
