//! Relational store for quote rows
//!
//! DuckDB is the storage engine. This module provides:
//!
//! - [`ConnectionPool`]: bounded pool with RAII checkout and a write lock
//! - [`ensure_schema`] / [`recreate_schema`]: table bootstrap
//! - [`upsert_rows`]: chunked, transactional insert-or-update keyed by
//!   `(stock_code, update_time)`

mod pool;
mod schema;
mod types;
mod upsert;

pub use pool::{ConnectionPool, PooledConnection};
pub use schema::{
    create_table_sql, ensure_schema, is_identifier, recreate_schema, row_count, COLUMNS,
    KEY_COLUMNS,
};
pub use types::{StoreConfig, DEFAULT_TABLE, IN_MEMORY};
pub use upsert::{upsert_rows, upsert_sql};

use crate::error::Result;
use std::time::Duration;
use tracing::{info, warn};

/// Bootstrap the quote table, retrying transient failures.
///
/// With `drop_existing` the table is dropped and recreated.
pub async fn bootstrap(
    pool: &ConnectionPool,
    table: &str,
    drop_existing: bool,
    attempts: u32,
    retry_delay: Duration,
) -> Result<()> {
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        let table_name = table.to_string();
        let result = pool
            .with_writer(move |conn| {
                if drop_existing {
                    recreate_schema(conn, &table_name)
                } else {
                    ensure_schema(conn, &table_name)
                }
            })
            .await;

        match result {
            Ok(()) => {
                info!(table, attempt, "Schema bootstrap complete");
                return Ok(());
            }
            Err(e) if attempt < attempts && !e.is_fatal() => {
                warn!(
                    attempt,
                    attempts,
                    error = %e,
                    "Schema bootstrap failed, retrying in {:?}",
                    retry_delay
                );
                tokio::time::sleep(retry_delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests;
