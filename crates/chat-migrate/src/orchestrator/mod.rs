//! Migration orchestrator - wires configuration, stores, and pipelines.

mod driver;
mod pools;

pub use driver::{DriverOptions, MigrationResult, Phase, PipelineDriver};
pub use pools::{
    health_check, open_source, open_target, open_targets, required_stores, HealthCheckResult,
    StoreHealth,
};

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::core::SourceReader;
use crate::error::{MigrateError, Result};
use crate::pipeline::PipelineKind;
use crate::target::TargetSet;
use crate::verify::{ReconciliationReport, Reconciler};

/// Runs one or more pipelines against the stores named in a [`Config`].
pub struct Orchestrator {
    config: Config,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between documents once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            batch_size: self.config.migration.batch_size,
            read_batch_size: self.config.source.read_batch_size,
            progress_interval: self.config.migration.progress_interval,
            verify: self.config.migration.verify,
        }
    }

    /// Run each pipeline in order. The first failure stops the run; results
    /// of pipelines that already finished are logged but not returned.
    pub async fn run(&self, kinds: &[PipelineKind], dry_run: bool) -> Result<Vec<MigrationResult>> {
        let targets = open_targets(&self.config, kinds, dry_run).await?;
        let config = &self.config;
        let outcome = self
            .run_pipelines(&targets, kinds, move |kind| open_source(config, kind))
            .await;
        targets.close().await;
        outcome
    }

    async fn run_pipelines<F, Fut>(
        &self,
        targets: &TargetSet,
        kinds: &[PipelineKind],
        mut open: F,
    ) -> Result<Vec<MigrationResult>>
    where
        F: FnMut(PipelineKind) -> Fut,
        Fut: Future<Output = Result<Arc<dyn SourceReader>>>,
    {
        let mut results = Vec::with_capacity(kinds.len());

        for &kind in kinds {
            if self.cancel.is_cancelled() {
                return Err(interrupted(&results, 0));
            }
            info!("Starting {} pipeline", kind);

            let source = match open(kind).await {
                Ok(source) => source,
                Err(e) => {
                    log_completed(&results);
                    return Err(e);
                }
            };
            let mut driver = PipelineDriver::new(kind, source.clone(), targets.clone(), self.driver_options())
                .with_cancel(self.cancel.clone());
            let outcome = driver.run().await;
            source.close().await;

            match outcome {
                Ok(result) => results.push(result),
                Err(MigrateError::Cancelled { processed }) => {
                    return Err(interrupted(&results, processed));
                }
                Err(e) => {
                    log_completed(&results);
                    return Err(e);
                }
            }
        }

        Ok(results)
    }

    /// Reconcile counts without migrating anything.
    pub async fn validate(&self, kinds: &[PipelineKind]) -> Result<Vec<ReconciliationReport>> {
        let targets = open_targets(&self.config, kinds, false).await?;
        let mut reports = Vec::with_capacity(kinds.len());

        for &kind in kinds {
            let source = open_source(&self.config, kind).await?;
            let report = Reconciler::new(kind, source.clone(), targets.clone())
                .reconcile()
                .await;
            source.close().await;
            reports.push(report);
        }

        targets.close().await;
        Ok(reports)
    }

    /// Ping every configured store.
    pub async fn health_check(&self) -> HealthCheckResult {
        health_check(&self.config).await
    }
}

/// Cancellation error counting every document mapped in this run.
fn interrupted(completed: &[MigrationResult], in_flight: u64) -> MigrateError {
    log_completed(completed);
    let processed = completed
        .iter()
        .map(|r| r.documents_processed)
        .sum::<u64>()
        + in_flight;
    MigrateError::Cancelled { processed }
}

fn log_completed(completed: &[MigrationResult]) {
    for result in completed {
        info!(
            "{}: completed before the run stopped ({} documents, {} rows)",
            result.pipeline,
            result.documents_processed,
            result.total_rows()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DocumentStream;
    use crate::source::MemorySource;
    use crate::target::MemoryTarget;
    use async_trait::async_trait;
    use bson::{doc, oid::ObjectId, Document};
    use futures::{stream, StreamExt};

    /// Source that fires `token` once its cursor is exhausted.
    struct CancelAtEnd {
        inner: MemorySource,
        token: CancellationToken,
    }

    #[async_trait]
    impl SourceReader for CancelAtEnd {
        async fn estimated_count(&self) -> Result<u64> {
            self.inner.estimated_count().await
        }

        async fn open_cursor(&self, read_batch_size: u32) -> Result<DocumentStream> {
            let token = self.token.clone();
            let tail = stream::once(async move { token.cancel() })
                .filter_map(|()| async { None::<Result<Document>> });
            Ok(self.inner.open_cursor(read_batch_size).await?.chain(tail).boxed())
        }

        async fn embedded_count(&self, field: &str) -> Result<u64> {
            self.inner.embedded_count(field).await
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        fn collection(&self) -> &str {
            self.inner.collection()
        }

        async fn close(&self) {}
    }

    fn orchestrator(token: CancellationToken) -> Orchestrator {
        let config = Config::from_yaml(
            "source:\n  uri: mongodb://localhost:27017\n  database: chat\n",
        )
        .unwrap();
        Orchestrator::new(config).with_cancel(token)
    }

    fn documents(n: usize) -> Vec<Document> {
        (0..n)
            .map(|_| doc! { "_id": ObjectId::new(), "sender_id": "u1", "participants": [{ "userId": "a" }] })
            .collect()
    }

    #[tokio::test]
    async fn test_runs_every_pipeline_in_order() {
        let orchestrator = orchestrator(CancellationToken::new());
        let targets = TargetSet::single(Arc::new(MemoryTarget::new()));
        let docs = documents(2);

        let results = orchestrator
            .run_pipelines(&targets, &PipelineKind::ALL, |kind| {
                let source: Arc<dyn SourceReader> =
                    Arc::new(MemorySource::new(kind.collection(), docs.clone()));
                async move { Ok(source) }
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].pipeline, PipelineKind::Conversations);
        assert_eq!(results[1].pipeline, PipelineKind::Messages);
        assert!(results.iter().all(|r| r.documents_processed == 2));
    }

    #[tokio::test]
    async fn test_cancel_between_pipelines_counts_completed_documents() {
        let token = CancellationToken::new();
        let orchestrator = orchestrator(token.clone());
        let targets = TargetSet::single(Arc::new(MemoryTarget::new()));
        let docs = documents(3);

        let err = orchestrator
            .run_pipelines(&targets, &PipelineKind::ALL, |kind| {
                let source: Arc<dyn SourceReader> = Arc::new(CancelAtEnd {
                    inner: MemorySource::new(kind.collection(), docs.clone()),
                    token: token.clone(),
                });
                async move { Ok(source) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MigrateError::Cancelled { processed: 3 }));
        assert_eq!(err.exit_code(), 130);
    }
}
