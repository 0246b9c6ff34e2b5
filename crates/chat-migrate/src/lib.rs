//! # chat-migrate
//!
//! One-shot migration of chat data from MongoDB into PostgreSQL and ScyllaDB.
//!
//! A single generalized pipeline handles both collections:
//!
//! - **conversations** -> PostgreSQL `conversations` + `participants`
//! - **messages** -> ScyllaDB `messages`, `messages_by_sender`,
//!   `message_reactions`, `delivery_receipts`, and `read_receipts`
//!
//! Source identifiers are translated to name-based UUIDs so both pipelines
//! agree on every cross-reference. Writes ignore existing primary keys,
//! so a failed run is recovered by running it again.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chat_migrate::{Config, Orchestrator, PipelineKind};
//!
//! #[tokio::main]
//! async fn main() -> chat_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config);
//!     for result in orchestrator.run(&PipelineKind::ALL, false).await? {
//!         println!("{}: {} documents", result.pipeline, result.documents_processed);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod mapper;
pub mod orchestrator;
pub mod pipeline;
pub mod source;
pub mod target;
pub mod verify;
pub mod window;
pub mod writer;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, PostgresConfig, ScyllaConfig, SourceConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    DriverOptions, HealthCheckResult, MigrationResult, Orchestrator, Phase, PipelineDriver,
};
pub use pipeline::PipelineKind;
pub use source::{MemorySource, MongoSource};
pub use target::{MemoryTarget, PgTarget, ScyllaTarget, TargetSet};
pub use verify::{CountStatus, ReconciliationReport, Reconciler};
pub use window::AggregationWindow;
pub use writer::BatchWriter;
