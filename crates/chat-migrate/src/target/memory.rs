//! In-process target with insert-ignore semantics.
//!
//! Backs `--dry-run` and the test suite. Rows are keyed by their rendered
//! primary-key columns, so re-inserting an existing key is a no-op exactly as
//! in the real stores.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{Relation, RelationRows, Row, TargetWriter};
use crate::error::{MigrateError, Result};

type RowKey = Vec<Option<String>>;

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryTarget {
    tables: Mutex<HashMap<Relation, BTreeMap<RowKey, Row>>>,
    flushes: AtomicU64,
    fail_on_flush: Option<u64>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// A target whose `n`th flush (1-based) fails with a write error.
    pub fn failing_on_flush(n: u64) -> Self {
        Self {
            fail_on_flush: Some(n),
            ..Self::default()
        }
    }

    /// Number of `write_flush` calls received.
    pub fn flush_calls(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Stored rows for a relation, in key order.
    pub fn rows(&self, relation: Relation) -> Vec<Row> {
        self.lock()
            .map(|tables| {
                tables
                    .get(&relation)
                    .map(|t| t.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Relation, BTreeMap<RowKey, Row>>>> {
        self.tables
            .lock()
            .map_err(|_| MigrateError::write("memory", "target state poisoned"))
    }
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    async fn write_flush(&self, groups: Vec<RelationRows>) -> Result<u64> {
        let call = self.flushes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_flush == Some(call) {
            return Err(MigrateError::write("memory", format!("injected failure on flush {}", call)));
        }

        // Key columns must be set, as in the real stores; a bad row fails
        // the whole flush before anything is stored.
        let mut keyed = Vec::with_capacity(groups.len());
        for group in groups {
            let indices = group.relation.key_indices();
            let mut rows = Vec::with_capacity(group.rows.len());
            for row in group.rows {
                let key: RowKey = indices
                    .iter()
                    .map(|&i| row.get(i).and_then(|v| v.render()))
                    .collect();
                if key.iter().any(|part| part.as_deref().map_or(true, str::is_empty)) {
                    return Err(MigrateError::write(
                        group.relation.table_name(),
                        "primary key column is null or empty",
                    ));
                }
                rows.push((key, row));
            }
            keyed.push((group.relation, rows));
        }

        let mut tables = self.lock()?;
        let mut submitted = 0u64;
        for (relation, rows) in keyed {
            let table = tables.entry(relation).or_default();
            for (key, row) in rows {
                table.entry(key).or_insert(row);
                submitted += 1;
            }
        }
        Ok(submitted)
    }

    async fn row_count(&self, relation: Relation) -> Result<u64> {
        let tables = self.lock()?;
        Ok(tables.get(&relation).map(|t| t.len() as u64).unwrap_or(0))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{translate, SqlValue};

    fn receipt(user: &str, msg: &str) -> Row {
        vec![
            translate("c").into(),
            user.to_string().into(),
            SqlValue::Timestamp(chrono::Utc::now()),
            translate(msg).into(),
        ]
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_ignored() {
        let target = MemoryTarget::new();
        let rows = vec![receipt("u1", "m1"), receipt("u1", "m2"), receipt("u2", "m1")];

        target
            .write_flush(vec![RelationRows::new(Relation::ReadReceipts, rows.clone())])
            .await
            .unwrap();
        target
            .write_flush(vec![RelationRows::new(Relation::ReadReceipts, rows)])
            .await
            .unwrap();

        assert_eq!(target.row_count(Relation::ReadReceipts).await.unwrap(), 2);
        assert_eq!(target.flush_calls(), 2);
        // first insert wins
        assert_eq!(
            target.rows(Relation::ReadReceipts)[0][3],
            SqlValue::Uuid(translate("m1"))
        );
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let target = MemoryTarget::failing_on_flush(2);
        assert!(target.write_flush(vec![]).await.is_ok());
        assert!(target.write_flush(vec![]).await.is_err());
        assert!(target.write_flush(vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn test_unset_key_column_fails_flush() {
        let target = MemoryTarget::new();
        let mut unkeyed = receipt("", "m1");
        let rows = vec![receipt("u1", "m1"), unkeyed.clone()];

        let err = target
            .write_flush(vec![RelationRows::new(Relation::ReadReceipts, rows)])
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(target.row_count(Relation::ReadReceipts).await.unwrap(), 0);

        unkeyed[0] = SqlValue::Null(crate::core::SqlNullType::Uuid);
        unkeyed[1] = "u1".to_string().into();
        assert!(target
            .write_flush(vec![RelationRows::new(Relation::ReadReceipts, vec![unkeyed])])
            .await
            .is_err());
    }
}
