//! PostgreSQL target.
//!
//! Rows are written with multi-row `INSERT ... ON CONFLICT (<pk>) DO NOTHING`
//! statements. Every value travels as a text parameter and is cast
//! server-side, so one statement shape covers every column type. All
//! statements of one flush share a transaction.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::types::ToSql;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, error, info};

use super::tls::SslMode;
use crate::config::PostgresConfig;
use crate::core::{Relation, RelationRows, Row, SqlNullType, StoreKind, TargetWriter};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// The pipeline is single-threaded; two connections leave room for a
/// reconciliation count while a pool connection is being recycled.
const POOL_MAX_SIZE: usize = 2;

/// Bind parameters one statement may carry; tokio-postgres encodes the
/// count as an `i16`.
pub const MAX_BIND_PARAMS: usize = i16::MAX as usize;

/// Largest `pg_statement_rows` that keeps every relational insert within
/// [`MAX_BIND_PARAMS`].
pub fn max_statement_rows() -> usize {
    let widest = Relation::ALL
        .iter()
        .filter(|r| r.store() == StoreKind::Relational)
        .map(|r| r.columns().len())
        .max()
        .unwrap_or(1);
    MAX_BIND_PARAMS / widest
}

/// PostgreSQL writer backed by a deadpool connection pool.
pub struct PgTarget {
    pool: Pool,
    schema: String,
    statement_rows: usize,
}

impl PgTarget {
    /// Connect and verify the connection with `SELECT 1`.
    pub async fn connect(config: &PostgresConfig, statement_rows: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match SslMode::parse(&config.ssl_mode)?.connector()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config),
        };
        let pool = Pool::builder(mgr)
            .max_size(POOL_MAX_SIZE)
            .build()
            .map_err(|e| MigrateError::connection("postgres", e))?;

        let target = Self {
            pool,
            schema: config.schema.clone(),
            statement_rows: statement_rows.clamp(1, max_statement_rows()),
        };
        target.ping().await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{} (schema {})",
            config.host, config.port, config.database, config.schema
        );
        Ok(target)
    }

    fn qualify(&self, relation: Relation) -> String {
        format!(
            "{}.{}",
            quote_ident(&self.schema),
            quote_ident(relation.table_name())
        )
    }
}

#[async_trait]
impl TargetWriter for PgTarget {
    async fn write_flush(&self, groups: Vec<RelationRows>) -> Result<u64> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::connection("postgres", e))?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| MigrateError::write("postgres", e))?;

        let mut submitted = 0u64;
        for group in &groups {
            let table = self.qualify(group.relation);
            for chunk in group.rows.chunks(self.statement_rows) {
                let sql = build_insert_ignore_sql(&table, group.relation, chunk);
                let params = text_params(chunk);
                let refs: Vec<&(dyn ToSql + Sync)> =
                    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

                if let Err(e) = tx.execute(sql.as_str(), &refs).await {
                    error!(
                        "Insert into {} failed ({} rows in statement): {}",
                        table,
                        chunk.len(),
                        e
                    );
                    return Err(MigrateError::write(group.relation.table_name(), e));
                }
                submitted += chunk.len() as u64;
            }
        }

        tx.commit()
            .await
            .map_err(|e| MigrateError::write("postgres", e))?;
        debug!("PostgreSQL flush committed: {} rows", submitted);
        Ok(submitted)
    }

    async fn row_count(&self, relation: Relation) -> Result<u64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::connection("postgres", e))?;
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualify(relation));
        let row = client
            .query_one(sql.as_str(), &[])
            .await
            .map_err(|e| MigrateError::connection("postgres", e))?;
        let count: i64 = row.get(0);
        Ok(count.max(0) as u64)
    }

    async fn ping(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::connection("postgres", e))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection("postgres", e))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Cast applied to a text parameter for a column of the given type.
fn cast_for(null_type: SqlNullType) -> &'static str {
    match null_type {
        SqlNullType::Bool => "::text::boolean",
        SqlNullType::I32 => "::text::integer",
        SqlNullType::Text => "::text",
        SqlNullType::Json => "::text::jsonb",
        SqlNullType::Uuid => "::text::uuid",
        SqlNullType::Timestamp => "::text::timestamptz",
        SqlNullType::TextSet => "::text::text[]",
    }
}

/// Build `INSERT ... VALUES (...), (...) ON CONFLICT (<pk>) DO NOTHING`.
fn build_insert_ignore_sql(table: &str, relation: Relation, rows: &[Row]) -> String {
    let col_list = relation
        .columns()
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let pk_list = relation
        .key_columns()
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut idx = 1;
    let values = rows
        .iter()
        .map(|row| {
            let placeholders: Vec<String> = row
                .iter()
                .map(|value| {
                    let p = format!("${}{}", idx, cast_for(value.null_type()));
                    idx += 1;
                    p
                })
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO NOTHING",
        table, col_list, values, pk_list
    )
}

fn text_params(rows: &[Row]) -> Vec<Option<String>> {
    rows.iter()
        .flat_map(|row| row.iter().map(|v| v.render()))
        .collect()
}
