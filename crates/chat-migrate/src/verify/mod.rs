//! Post-run count reconciliation.
//!
//! Compares an approximate source count with the exact destination count of
//! every relation a pipeline writes. The report is diagnostic only: nothing
//! is mutated, and neither a mismatch nor a failed count query is returned
//! as an error. Both are logged as warnings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{Relation, SourceReader};
use crate::error::Result;
use crate::pipeline::{PipelineKind, SourceCount};
use crate::target::TargetSet;

/// Outcome for one relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStatus {
    Match,
    Mismatch,
    /// No source-side count exists; destination reported for information.
    Unchecked,
    /// A count query failed.
    Unavailable,
}

/// Counts for one relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationCount {
    pub relation: Relation,
    pub source: Option<u64>,
    pub destination: Option<u64>,
    pub status: CountStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts for every relation of one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub pipeline: PipelineKind,
    pub relations: Vec<RelationCount>,
}

impl ReconciliationReport {
    pub fn get(&self, relation: Relation) -> Option<&RelationCount> {
        self.relations.iter().find(|r| r.relation == relation)
    }

    pub fn mismatches(&self) -> usize {
        self.relations
            .iter()
            .filter(|r| r.status == CountStatus::Mismatch)
            .count()
    }

    /// True when every checked relation matched.
    pub fn all_match(&self) -> bool {
        self.relations
            .iter()
            .all(|r| matches!(r.status, CountStatus::Match | CountStatus::Unchecked))
    }
}

/// Count comparison for one pipeline.
pub struct Reconciler {
    kind: PipelineKind,
    source: Arc<dyn SourceReader>,
    targets: TargetSet,
}

impl Reconciler {
    pub fn new(kind: PipelineKind, source: Arc<dyn SourceReader>, targets: TargetSet) -> Self {
        Self {
            kind,
            source,
            targets,
        }
    }

    /// Count every relation and log the comparison.
    pub async fn reconcile(&self) -> ReconciliationReport {
        info!("Reconciling {} counts", self.kind);

        let mut relations = Vec::with_capacity(self.kind.relations().len());
        for &relation in self.kind.relations() {
            let counted = self.count(relation).await;
            log_count(&counted);
            relations.push(counted);
        }

        let report = ReconciliationReport {
            pipeline: self.kind,
            relations,
        };
        if report.mismatches() > 0 {
            warn!(
                "{}: {} relation(s) with count mismatches",
                self.kind,
                report.mismatches()
            );
        }
        report
    }

    async fn count(&self, relation: Relation) -> RelationCount {
        let mut counted = RelationCount {
            relation,
            source: None,
            destination: None,
            status: CountStatus::Unavailable,
            error: None,
        };

        let source = match self.source_count(relation).await {
            Ok(n) => n,
            Err(e) => {
                counted.error = Some(e.to_string());
                return counted;
            }
        };
        counted.source = source;

        let destination = match self.targets.for_relation(relation) {
            Ok(writer) => writer.row_count(relation).await,
            Err(e) => Err(e),
        };
        match destination {
            Ok(n) => counted.destination = Some(n),
            Err(e) => {
                counted.error = Some(e.to_string());
                return counted;
            }
        }

        counted.status = match counted.source {
            None => CountStatus::Unchecked,
            Some(s) if Some(s) == counted.destination => CountStatus::Match,
            Some(_) => CountStatus::Mismatch,
        };
        counted
    }

    async fn source_count(&self, relation: Relation) -> Result<Option<u64>> {
        match self.kind.source_count(relation) {
            SourceCount::Documents => self.source.estimated_count().await.map(Some),
            SourceCount::Embedded(field) => self.source.embedded_count(field).await.map(Some),
            SourceCount::Unchecked => Ok(None),
        }
    }
}

fn log_count(c: &RelationCount) {
    let dest = c.destination.unwrap_or(0);
    match c.status {
        CountStatus::Match => info!("{}: {} rows (match)", c.relation, dest),
        CountStatus::Mismatch => warn!(
            "{}: source={} destination={} (MISMATCH)",
            c.relation,
            c.source.unwrap_or(0),
            dest
        ),
        CountStatus::Unchecked => info!("{}: {} rows (no source count)", c.relation, dest),
        CountStatus::Unavailable => warn!(
            "{}: count unavailable: {}",
            c.relation,
            c.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{translate, RelationRows, Row, SqlNullType, SqlValue, TargetWriter};
    use crate::source::MemorySource;
    use crate::target::MemoryTarget;
    use bson::doc;

    fn conversation_row(i: u32) -> Row {
        let mut row: Row = Relation::Conversations
            .columns()
            .iter()
            .map(|_| SqlValue::Null(SqlNullType::Text))
            .collect();
        row[0] = translate(&format!("c{}", i)).into();
        row
    }

    #[tokio::test]
    async fn test_mismatch_reports_both_counts_without_error() {
        let source = MemorySource::new("conversations", vec![doc! { "_id": "c0" }]).with_estimate(10);
        let target = Arc::new(MemoryTarget::new());
        target
            .write_flush(vec![RelationRows::new(
                Relation::Conversations,
                (0..9).map(conversation_row).collect(),
            )])
            .await
            .unwrap();

        let reconciler = Reconciler::new(
            PipelineKind::Conversations,
            Arc::new(source),
            TargetSet::single(target),
        );
        let report = reconciler.reconcile().await;

        let conv = report.get(Relation::Conversations).unwrap();
        assert_eq!(conv.source, Some(10));
        assert_eq!(conv.destination, Some(9));
        assert_eq!(conv.status, CountStatus::Mismatch);
        assert_eq!(report.mismatches(), 1);
        assert!(!report.all_match());

        let participants = report.get(Relation::Participants).unwrap();
        assert_eq!(participants.status, CountStatus::Match);
    }

    #[tokio::test]
    async fn test_missing_target_is_unavailable() {
        let source = MemorySource::new("messages", vec![]);
        let reconciler = Reconciler::new(PipelineKind::Messages, Arc::new(source), TargetSet::new());
        let report = reconciler.reconcile().await;

        assert_eq!(report.relations.len(), 5);
        assert!(report
            .relations
            .iter()
            .all(|r| r.status == CountStatus::Unavailable && r.error.is_some()));
    }

    #[tokio::test]
    async fn test_read_receipts_unchecked() {
        let source = MemorySource::new("messages", vec![]);
        let reconciler = Reconciler::new(
            PipelineKind::Messages,
            Arc::new(source),
            TargetSet::single(Arc::new(MemoryTarget::new())),
        );
        let report = reconciler.reconcile().await;

        let reads = report.get(Relation::ReadReceipts).unwrap();
        assert_eq!(reads.status, CountStatus::Unchecked);
        assert_eq!(reads.source, None);
        assert!(report.all_match());
    }
}
