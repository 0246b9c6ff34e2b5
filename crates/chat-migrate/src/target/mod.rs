//! Destination stores.
//!
//! Each relation lives in exactly one store ([`Relation::store`]). A
//! [`TargetSet`] maps store kinds to writer handles so the batch writer can
//! route one flush to every store it touches.

pub mod memory;
pub mod postgres;
pub mod scylla;
pub mod tls;

pub use memory::MemoryTarget;
pub use postgres::PgTarget;
pub use scylla::ScyllaTarget;
pub use tls::SslMode;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::{Relation, StoreKind, TargetWriter};
use crate::error::{MigrateError, Result};

/// Writer handles keyed by store kind.
#[derive(Clone, Default)]
pub struct TargetSet {
    writers: BTreeMap<StoreKind, Arc<dyn TargetWriter>>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the writer for a store kind.
    pub fn with(mut self, kind: StoreKind, writer: Arc<dyn TargetWriter>) -> Self {
        self.writers.insert(kind, writer);
        self
    }

    /// Route every store kind to the same writer (dry runs and tests).
    pub fn single(writer: Arc<dyn TargetWriter>) -> Self {
        Self::new()
            .with(StoreKind::Relational, writer.clone())
            .with(StoreKind::WideColumn, writer)
    }

    pub fn get(&self, kind: StoreKind) -> Option<&Arc<dyn TargetWriter>> {
        self.writers.get(&kind)
    }

    /// Writer holding a relation.
    pub fn for_relation(&self, relation: Relation) -> Result<&Arc<dyn TargetWriter>> {
        self.get(relation.store()).ok_or_else(|| {
            MigrateError::Config(format!(
                "No {} target configured for relation {}",
                relation.store(),
                relation
            ))
        })
    }

    /// Fail early when any relation in `relations` has no writer.
    pub fn require(&self, relations: &[Relation]) -> Result<()> {
        for relation in relations {
            self.for_relation(*relation)?;
        }
        Ok(())
    }

    /// Configured store kinds and their writers.
    pub fn iter(&self) -> impl Iterator<Item = (StoreKind, &Arc<dyn TargetWriter>)> {
        self.writers.iter().map(|(k, w)| (*k, w))
    }

    pub async fn close(&self) {
        for writer in self.writers.values() {
            writer.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_store_is_config_error() {
        let targets = TargetSet::new().with(StoreKind::Relational, Arc::new(MemoryTarget::new()));
        assert!(targets.for_relation(Relation::Participants).is_ok());

        let err = targets.require(&[Relation::Messages]).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_single_routes_both_stores() {
        let targets = TargetSet::single(Arc::new(MemoryTarget::new()));
        assert_eq!(targets.iter().count(), 2);
        assert_eq!(
            targets.for_relation(Relation::ReadReceipts).unwrap().db_type(),
            "memory"
        );
    }
}
