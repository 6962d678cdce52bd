//! Store types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Path that selects an in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// Default table for quote rows
pub const DEFAULT_TABLE: &str = "stock_data";

/// Store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// DuckDB file, or `:memory:`
    pub path: String,

    /// Table receiving quote rows
    pub table: String,

    /// Maximum connections handed out at once
    pub pool_size: usize,

    /// How long a checkout waits for a free connection
    pub checkout_timeout_secs: u64,

    /// Rows per upsert transaction
    pub upsert_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "quotes.duckdb".to_string(),
            table: DEFAULT_TABLE.to_string(),
            pool_size: 10,
            checkout_timeout_secs: 10,
            upsert_batch_size: 50,
        }
    }
}

impl StoreConfig {
    /// Settings for a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            path: IN_MEMORY.to_string(),
            ..Default::default()
        }
    }

    /// Set database path
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set table name
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set pool size
    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set checkout timeout
    #[must_use]
    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout_secs = timeout.as_secs();
        self
    }

    /// Set upsert chunk size
    #[must_use]
    pub fn with_upsert_batch_size(mut self, size: usize) -> Self {
        self.upsert_batch_size = size;
        self
    }

    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_secs(self.checkout_timeout_secs)
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY
    }
}
