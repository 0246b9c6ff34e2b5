//! Per-relation buffering and threshold flushes.
//!
//! Only the primary relation's buffer is compared against the threshold;
//! secondary buffers ride along with the primary's flush cycle. One flush is
//! one unit of work per store. A flush spanning two stores is not atomic, and
//! neither is a ScyllaDB flush spanning several batches; idempotent inserts
//! make a rerun the recovery path.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error};

use crate::core::{Relation, RelationRows, Row, StoreKind};
use crate::error::Result;
use crate::mapper::Record;
use crate::target::TargetSet;

/// Counters accumulated by a [`BatchWriter`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriterStats {
    /// Number of non-empty flushes.
    pub flushes: u64,
    /// Rows submitted per relation (duplicates ignored by the store are
    /// still counted here).
    pub rows: BTreeMap<Relation, u64>,
    /// Time spent waiting on stores.
    #[serde(skip)]
    pub write_time: Duration,
}

impl WriterStats {
    pub fn total_rows(&self) -> u64 {
        self.rows.values().sum()
    }
}

/// Buffers records per relation and flushes them to the target set.
pub struct BatchWriter {
    targets: TargetSet,
    primary: Relation,
    threshold: usize,
    buffers: BTreeMap<Relation, Vec<Row>>,
    stats: WriterStats,
}

impl BatchWriter {
    /// `threshold` is the primary-relation buffer size that triggers a flush.
    pub fn new(targets: TargetSet, primary: Relation, threshold: usize) -> Self {
        Self {
            targets,
            primary,
            threshold: threshold.max(1),
            buffers: BTreeMap::new(),
            stats: WriterStats::default(),
        }
    }

    /// Append a record to its relation's buffer.
    pub fn enqueue(&mut self, record: Record) {
        let relation = record.relation();
        self.buffers
            .entry(relation)
            .or_default()
            .push(record.into_row());
    }

    /// Rows currently buffered for a relation.
    pub fn pending(&self, relation: Relation) -> usize {
        self.buffers.get(&relation).map(Vec::len).unwrap_or(0)
    }

    /// Whether the primary buffer reached the threshold.
    pub fn should_flush(&self) -> bool {
        self.pending(self.primary) >= self.threshold
    }

    /// Write every non-empty buffer and clear it.
    ///
    /// Returns `false` without touching any store when nothing is buffered.
    /// On error the taken rows are dropped; the caller aborts the run.
    pub async fn flush(&mut self) -> Result<bool> {
        let mut by_store: BTreeMap<StoreKind, Vec<RelationRows>> = BTreeMap::new();
        for (relation, rows) in std::mem::take(&mut self.buffers) {
            if rows.is_empty() {
                continue;
            }
            by_store
                .entry(relation.store())
                .or_default()
                .push(RelationRows::new(relation, rows));
        }
        if by_store.is_empty() {
            return Ok(false);
        }

        let started = Instant::now();
        for (kind, groups) in by_store {
            let counts: Vec<(Relation, u64)> = groups
                .iter()
                .map(|g| (g.relation, g.rows.len() as u64))
                .collect();
            let writer = match groups.first() {
                Some(g) => self.targets.for_relation(g.relation)?,
                None => continue,
            };

            if let Err(e) = writer.write_flush(groups).await {
                error!("Flush {} to {} failed: {}", self.stats.flushes + 1, kind, e);
                return Err(e);
            }
            for (relation, n) in counts {
                *self.stats.rows.entry(relation).or_insert(0) += n;
            }
        }
        self.stats.write_time += started.elapsed();
        self.stats.flushes += 1;

        debug!(
            "Flush {} complete: {} rows total",
            self.stats.flushes,
            self.stats.total_rows()
        );
        Ok(true)
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    pub fn into_stats(self) -> WriterStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{translate, TargetWriter};
    use crate::mapper::{ParticipantRecord, Record};
    use crate::target::MemoryTarget;
    use std::sync::Arc;

    fn participant(user: &str) -> Record {
        Record::Participant(ParticipantRecord {
            conversation_id: translate("c1"),
            user_id: user.into(),
            role: "member".into(),
            nickname: None,
            is_muted: false,
            muted_until: None,
            unread_count: 0,
            last_read_at: None,
            joined_at: None,
            left_at: None,
        })
    }

    #[tokio::test]
    async fn test_secondary_buffers_do_not_trigger_flush() {
        let target = Arc::new(MemoryTarget::new());
        let mut writer = BatchWriter::new(
            TargetSet::single(target.clone()),
            Relation::Conversations,
            2,
        );

        for i in 0..10 {
            writer.enqueue(participant(&format!("u{}", i)));
        }
        assert!(!writer.should_flush());
        assert_eq!(writer.pending(Relation::Participants), 10);

        assert!(writer.flush().await.unwrap());
        assert_eq!(writer.pending(Relation::Participants), 0);
        assert_eq!(target.row_count(Relation::Participants).await.unwrap(), 10);
        assert_eq!(writer.stats().flushes, 1);
        assert_eq!(writer.stats().rows[&Relation::Participants], 10);
    }

    #[tokio::test]
    async fn test_empty_flush_is_not_counted() {
        let target = Arc::new(MemoryTarget::new());
        let mut writer = BatchWriter::new(TargetSet::single(target.clone()), Relation::Messages, 5);

        assert!(!writer.flush().await.unwrap());
        assert_eq!(writer.stats().flushes, 0);
        assert_eq!(target.flush_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_flush_propagates() {
        let target = Arc::new(MemoryTarget::failing_on_flush(1));
        let mut writer = BatchWriter::new(TargetSet::single(target), Relation::Participants, 1);
        writer.enqueue(participant("u1"));

        let err = writer.flush().await.unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(writer.stats().flushes, 0);
    }
}
