//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source document store (MongoDB).
    pub source: SourceConfig,

    /// Relational target. Required by the conversations pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresConfig>,

    /// Wide-column target. Required by the messages pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scylla: Option<ScyllaConfig>,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source store (MongoDB) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Connection URI, credentials included.
    pub uri: String,

    /// Database holding the `conversations` and `messages` collections.
    pub database: String,

    /// Cursor read-ahead (documents fetched per round trip).
    #[serde(default = "default_read_batch_size")]
    pub read_batch_size: u32,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("uri", &redact_uri(&self.uri))
            .field("database", &self.database)
            .field("read_batch_size", &self.read_batch_size)
            .finish()
    }
}

/// Relational target (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema holding the destination tables (default: "messaging").
    #[serde(default = "default_messaging_schema")]
    pub schema: String,

    /// SSL mode: disable, require, verify-full (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Wide-column target (ScyllaDB) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScyllaConfig {
    /// Contact points, `host:port`.
    pub hosts: Vec<String>,

    /// Keyspace holding the destination tables.
    pub keyspace: String,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Primary-relation rows buffered before a flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Documents between progress log lines.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Run the count reconciler after the migration.
    #[serde(default)]
    pub verify: bool,

    /// Rows per multi-row INSERT statement on PostgreSQL.
    #[serde(default = "default_pg_statement_rows")]
    pub pg_statement_rows: usize,

    /// Statements per UNLOGGED batch on ScyllaDB.
    #[serde(default = "default_scylla_batch_rows")]
    pub scylla_batch_rows: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            progress_interval: default_progress_interval(),
            verify: false,
            pg_statement_rows: default_pg_statement_rows(),
            scylla_batch_rows: default_scylla_batch_rows(),
        }
    }
}

/// Strip the `user:password@` part of a connection URI.
pub fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}[REDACTED]{}", &uri[..scheme_end + 3], &uri[at..])
        }
        _ => uri.to_string(),
    }
}

// Default value functions for serde
fn default_read_batch_size() -> u32 {
    1_000
}

fn default_pg_port() -> u16 {
    5432
}

fn default_messaging_schema() -> String {
    "messaging".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_batch_size() -> usize {
    500
}

fn default_progress_interval() -> u64 {
    500
}

fn default_pg_statement_rows() -> usize {
    100
}

fn default_scylla_batch_rows() -> usize {
    50
}
