//! Connection bootstrap from configuration.
//!
//! Opens the MongoDB reader for a collection and the writers for whichever
//! stores the selected pipelines need. Connectivity failures surface here,
//! before any document is read.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::core::{SourceReader, StoreKind, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::pipeline::PipelineKind;
use crate::source::MongoSource;
use crate::target::{MemoryTarget, PgTarget, ScyllaTarget, TargetSet};

/// Open the source reader for a pipeline's collection.
pub async fn open_source(config: &Config, kind: PipelineKind) -> Result<Arc<dyn SourceReader>> {
    let source = MongoSource::connect(&config.source, kind.collection()).await?;
    Ok(Arc::new(source))
}

/// Store kinds the given pipelines write to.
pub fn required_stores(kinds: &[PipelineKind]) -> Vec<StoreKind> {
    let mut stores: Vec<StoreKind> = kinds.iter().map(|k| k.primary().store()).collect();
    stores.sort();
    stores.dedup();
    stores
}

/// Connect a writer for one store kind.
pub async fn open_target(config: &Config, kind: StoreKind) -> Result<Arc<dyn TargetWriter>> {
    match kind {
        StoreKind::Relational => {
            let pg = config.postgres.as_ref().ok_or_else(|| {
                MigrateError::Config("postgres section is required for conversations".into())
            })?;
            let target = PgTarget::connect(pg, config.migration.pg_statement_rows).await?;
            Ok(Arc::new(target))
        }
        StoreKind::WideColumn => {
            let scylla = config.scylla.as_ref().ok_or_else(|| {
                MigrateError::Config("scylla section is required for messages".into())
            })?;
            let target = ScyllaTarget::connect(scylla, config.migration.scylla_batch_rows).await?;
            Ok(Arc::new(target))
        }
    }
}

/// Writers for every store the pipelines need.
///
/// A dry run routes every store to one in-memory target instead.
pub async fn open_targets(config: &Config, kinds: &[PipelineKind], dry_run: bool) -> Result<TargetSet> {
    if dry_run {
        info!("Dry run: writing to an in-memory target");
        return Ok(TargetSet::single(Arc::new(MemoryTarget::new())));
    }

    let mut targets = TargetSet::new();
    for kind in required_stores(kinds) {
        targets = targets.with(kind, open_target(config, kind).await?);
    }
    Ok(targets)
}

/// Liveness of one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHealth {
    pub store: String,
    pub connected: bool,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub stores: Vec<StoreHealth>,
}

/// Connect to the source and every configured destination and ping each.
pub async fn health_check(config: &Config) -> HealthCheckResult {
    let mut stores = Vec::new();

    let started = Instant::now();
    let outcome = match MongoSource::connect(&config.source, PipelineKind::Conversations.collection()).await {
        Ok(source) => {
            let pinged = source.ping().await;
            source.close().await;
            pinged
        }
        Err(e) => Err(e),
    };
    stores.push(store_health("mongodb", started, outcome));

    let mut configured = Vec::new();
    if config.postgres.is_some() {
        configured.push(StoreKind::Relational);
    }
    if config.scylla.is_some() {
        configured.push(StoreKind::WideColumn);
    }
    for kind in configured {
        let started = Instant::now();
        let outcome = match open_target(config, kind).await {
            Ok(target) => {
                let pinged = target.ping().await;
                target.close().await;
                pinged
            }
            Err(e) => Err(e),
        };
        stores.push(store_health(&kind.to_string(), started, outcome));
    }

    HealthCheckResult {
        healthy: stores.iter().all(|s| s.connected),
        stores,
    }
}

fn store_health(store: &str, started: Instant, outcome: Result<()>) -> StoreHealth {
    let latency_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(()) => StoreHealth {
            store: store.to_string(),
            connected: true,
            latency_ms,
            error: None,
        },
        Err(e) => StoreHealth {
            store: store.to_string(),
            connected: false,
            latency_ms,
            error: Some(e.to_string()),
        },
    }
}
