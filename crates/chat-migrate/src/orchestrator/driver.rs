//! Single-pass pipeline driver.
//!
//! Pulls documents from the source cursor in `_id` order, maps them, routes
//! windowed records into the aggregation window and everything else into the
//! batch writer, and flushes when the primary relation crosses the
//! threshold. At stream end it flushes, drains the window as a last flush,
//! and optionally reconciles counts.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::{Relation, SourceReader};
use crate::error::{MigrateError, Result};
use crate::mapper::{ReadKey, ReadReceiptRecord, Record};
use crate::pipeline::PipelineKind;
use crate::target::TargetSet;
use crate::verify::{ReconciliationReport, Reconciler};
use crate::window::AggregationWindow;
use crate::writer::BatchWriter;

/// Driver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Streaming,
    DrainingWindow,
    Reconciling,
    Done,
    Failed,
}

impl Phase {
    /// Whether `self -> next` is a legal transition. Nothing re-enters
    /// `Streaming`.
    pub fn can_advance(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Init, Phase::Streaming)
                | (Phase::Streaming, Phase::DrainingWindow)
                | (Phase::Streaming, Phase::Failed)
                | (Phase::DrainingWindow, Phase::Reconciling)
                | (Phase::DrainingWindow, Phase::Done)
                | (Phase::DrainingWindow, Phase::Failed)
                | (Phase::Reconciling, Phase::Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Init => "INIT",
            Phase::Streaming => "STREAMING",
            Phase::DrainingWindow => "DRAINING_WINDOW",
            Phase::Reconciling => "RECONCILING",
            Phase::Done => "DONE",
            Phase::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Tunables consumed by the driver.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Primary-relation flush threshold.
    pub batch_size: usize,
    /// Source cursor read-ahead.
    pub read_batch_size: u32,
    /// Log progress every this many documents (0 disables).
    pub progress_interval: u64,
    /// Run the reconciler after the window drain.
    pub verify: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            read_batch_size: 1000,
            progress_interval: 500,
            verify: false,
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    pub pipeline: PipelineKind,

    /// Final status (`completed`).
    pub status: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,

    /// Source documents processed.
    pub documents_processed: u64,

    /// Source estimate taken when the cursor was opened.
    pub documents_estimated: u64,

    /// Non-empty flushes, window drain included.
    pub flushes: u64,

    /// Rows submitted per relation.
    pub rows: std::collections::BTreeMap<Relation, u64>,

    /// Read-position candidates offered to the window.
    pub window_candidates: u64,

    /// Average throughput (documents/second).
    pub documents_per_second: u64,

    /// Phases visited, in order.
    pub phases: Vec<Phase>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<ReconciliationReport>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn total_rows(&self) -> u64 {
        self.rows.values().sum()
    }
}

/// Drives one pipeline from `Init` to `Done` or `Failed`.
pub struct PipelineDriver {
    kind: PipelineKind,
    source: Arc<dyn SourceReader>,
    targets: TargetSet,
    options: DriverOptions,
    cancel: CancellationToken,
    phase: Phase,
    phases: Vec<Phase>,
}

impl PipelineDriver {
    pub fn new(
        kind: PipelineKind,
        source: Arc<dyn SourceReader>,
        targets: TargetSet,
        options: DriverOptions,
    ) -> Self {
        Self {
            kind,
            source,
            targets,
            options,
            cancel: CancellationToken::new(),
            phase: Phase::Init,
            phases: vec![Phase::Init],
        }
    }

    /// Observe an external cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn advance(&mut self, next: Phase) -> Result<()> {
        if !self.phase.can_advance(next) {
            return Err(MigrateError::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        debug!("{}: {} -> {}", self.kind, self.phase, next);
        self.phase = next;
        self.phases.push(next);
        Ok(())
    }

    /// Run the pipeline. Faults after streaming starts move the driver to
    /// `Failed` before the error is returned.
    pub async fn run(&mut self) -> Result<MigrationResult> {
        let outcome = self.execute().await;
        if let Err(e) = &outcome {
            if self.phase.can_advance(Phase::Failed) {
                self.advance(Phase::Failed)?;
            }
            match e {
                MigrateError::Cancelled { processed } => {
                    warn!("{}: interrupted after {} documents", self.kind, processed)
                }
                other => error!("{}: pipeline failed: {}", self.kind, other),
            }
        }
        outcome
    }

    async fn execute(&mut self) -> Result<MigrationResult> {
        let kind = self.kind;
        self.targets.require(kind.relations())?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let estimated = self.source.estimated_count().await?;
        let mut cursor = self.source.open_cursor(self.options.read_batch_size).await?;

        self.advance(Phase::Streaming)?;
        info!(
            "{}: streaming ~{} documents from {} (flush every {} {} rows)",
            kind,
            estimated,
            self.source.collection(),
            self.options.batch_size,
            kind.primary()
        );

        let mut writer = BatchWriter::new(self.targets.clone(), kind.primary(), self.options.batch_size);
        let mut window: AggregationWindow<ReadKey, Uuid> = AggregationWindow::new();
        let windowed = kind.windowed();
        let mut processed = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                return Err(MigrateError::Cancelled { processed });
            }
            let Some(doc) = cursor.try_next().await? else {
                break;
            };

            for (relation, records) in kind.map(&doc).into_groups() {
                for record in records {
                    match record {
                        Record::ReadReceipt(r) if Some(relation) == windowed => {
                            window.absorb(r.key(), r.last_read_at, r.last_read_msg);
                        }
                        other => writer.enqueue(other),
                    }
                }
            }
            processed += 1;

            if writer.should_flush() {
                writer.flush().await?;
            }
            if self.options.progress_interval > 0 && processed % self.options.progress_interval == 0 {
                info!("{}: progress {} / ~{} documents", kind, processed, estimated);
            }
        }

        writer.flush().await?;
        info!("{}: stream exhausted after {} documents", kind, processed);

        self.advance(Phase::DrainingWindow)?;
        let window_candidates = window.absorbed();
        if !window.is_empty() {
            info!("{}: writing {} read positions", kind, window.len());
            for ((conversation_id, user_id), at, message_id) in window.drain() {
                writer.enqueue(Record::ReadReceipt(ReadReceiptRecord {
                    conversation_id,
                    user_id,
                    last_read_at: at,
                    last_read_msg: message_id,
                }));
            }
            writer.flush().await?;
        }

        let reconciliation = if self.options.verify {
            self.advance(Phase::Reconciling)?;
            let reconciler = Reconciler::new(kind, self.source.clone(), self.targets.clone());
            Some(reconciler.reconcile().await)
        } else {
            None
        };

        self.advance(Phase::Done)?;

        let duration = clock.elapsed().as_secs_f64();
        let stats = writer.into_stats();
        let result = MigrationResult {
            pipeline: kind,
            status: "completed".to_string(),
            started_at,
            completed_at: Utc::now(),
            duration_seconds: duration,
            documents_processed: processed,
            documents_estimated: estimated,
            flushes: stats.flushes,
            rows: stats.rows,
            window_candidates,
            documents_per_second: if duration > 0.0 {
                (processed as f64 / duration) as u64
            } else {
                0
            },
            phases: self.phases.clone(),
            reconciliation,
        };

        info!(
            "{}: {} documents, {} rows, {} flushes in {:.1}s",
            kind,
            result.documents_processed,
            result.total_rows(),
            result.flushes,
            result.duration_seconds
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            Phase::Init,
            Phase::Streaming,
            Phase::DrainingWindow,
            Phase::Reconciling,
            Phase::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(Phase::DrainingWindow.can_advance(Phase::Done));
    }

    #[test]
    fn test_streaming_is_never_reentered() {
        for from in [
            Phase::Streaming,
            Phase::DrainingWindow,
            Phase::Reconciling,
            Phase::Done,
            Phase::Failed,
        ] {
            assert!(!from.can_advance(Phase::Streaming), "{} -> STREAMING", from);
        }
    }

    #[test]
    fn test_failed_only_from_streaming_or_draining() {
        assert!(Phase::Streaming.can_advance(Phase::Failed));
        assert!(Phase::DrainingWindow.can_advance(Phase::Failed));
        assert!(!Phase::Init.can_advance(Phase::Failed));
        assert!(!Phase::Reconciling.can_advance(Phase::Failed));
        assert!(!Phase::Done.can_advance(Phase::Failed));
    }

    #[test]
    fn test_terminal_phases() {
        assert!(Phase::Done.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::Reconciling.is_terminal());
        assert_eq!(Phase::DrainingWindow.to_string(), "DRAINING_WINDOW");
    }
}
