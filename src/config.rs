//! Harvest configuration
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! `HARVEST_*` environment variables (a `.env` file is loaded first), and
//! finally command-line flags applied by the runner.
//!
//! ```yaml
//! source:
//!   base_url: https://push2.eastmoney.com/api/qt/clist/get
//!   page_size: 20
//! run:
//!   max_concurrent: 3
//!   max_failed_batches: 3
//! database:
//!   path: quotes.duckdb
//!   table: stock_data
//! ```

use crate::error::{Error, Result, ResultExt};
use crate::fetch::{SourceConfig, MAX_CACHE_CAPACITY};
use crate::pagination::{DriverConfig, EndOfDataPolicy, Jitter};
use crate::store::{is_identifier, StoreConfig};
use crate::types::{LogLevel, OptionStringExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete harvest configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Listing endpoint settings
    pub source: SourceConfig,

    /// Pagination driver settings
    pub run: RunConfig,

    /// Store settings
    pub database: StoreConfig,

    /// Log level when `RUST_LOG` is unset
    pub log_level: LogLevel,
}

// ============================================================================
// Run Config
// ============================================================================

/// Driver parameters as they appear in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub start_page: u32,
    pub max_concurrent: u32,
    pub max_failed_batches: u32,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    pub end_of_data: EndOfDataPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_page: 1,
            max_concurrent: 3,
            max_failed_batches: 3,
            jitter_min_ms: 1000,
            jitter_max_ms: 3000,
            max_pages: None,
            end_of_data: EndOfDataPolicy::Stop,
        }
    }
}

impl RunConfig {
    /// Driver configuration for these settings
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig::new()
            .with_start_page(self.start_page)
            .with_max_concurrent(self.max_concurrent)
            .with_max_failed_batches(self.max_failed_batches)
            .with_jitter(Jitter::from_millis(self.jitter_min_ms, self.jitter_max_ms))
            .with_max_pages(self.max_pages)
            .with_end_of_data(self.end_of_data)
    }
}

// ============================================================================
// Loading
// ============================================================================

impl HarvestConfig {
    /// Parse from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Defaults or `path`, then `.env` and process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(env_file) = dotenv::dotenv() {
            debug!(path = %env_file.display(), "Loaded environment file");
        }
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `HARVEST_*` variables from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay `HARVEST_*` variables read through `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).none_if_empty();

        if let Some(v) = get("HARVEST_BASE_URL") {
            self.source.base_url = v;
        }
        if let Some(v) = get("HARVEST_DB_PATH") {
            self.database.path = v;
        }
        if let Some(v) = get("HARVEST_DB_TABLE") {
            self.database.table = v;
        }
        if let Some(v) = get("HARVEST_POOL_SIZE") {
            self.database.pool_size = parse_env("HARVEST_POOL_SIZE", &v)?;
        }
        if let Some(v) = get("HARVEST_START_PAGE") {
            self.run.start_page = parse_env("HARVEST_START_PAGE", &v)?;
        }
        if let Some(v) = get("HARVEST_MAX_CONCURRENT") {
            self.run.max_concurrent = parse_env("HARVEST_MAX_CONCURRENT", &v)?;
        }
        if let Some(v) = get("HARVEST_MAX_FAILED_BATCHES") {
            self.run.max_failed_batches = parse_env("HARVEST_MAX_FAILED_BATCHES", &v)?;
        }
        if let Some(v) = get("HARVEST_MAX_PAGES") {
            self.run.max_pages = Some(parse_env("HARVEST_MAX_PAGES", &v)?);
        }
        if let Some(v) = get("HARVEST_JITTER_MIN_MS") {
            self.run.jitter_min_ms = parse_env("HARVEST_JITTER_MIN_MS", &v)?;
        }
        if let Some(v) = get("HARVEST_JITTER_MAX_MS") {
            self.run.jitter_max_ms = parse_env("HARVEST_JITTER_MAX_MS", &v)?;
        }
        if let Some(v) = get("HARVEST_LOG_LEVEL") {
            self.log_level = serde_yaml::from_str(&v.to_lowercase())
                .map_err(|_| Error::invalid_value("HARVEST_LOG_LEVEL", format!("'{v}'")))?;
        }
        Ok(())
    }

    /// Reject settings a run cannot work with
    pub fn validate(&self) -> Result<()> {
        let run = &self.run;
        if run.start_page == 0 {
            return Err(Error::invalid_value("run.start_page", "must be at least 1"));
        }
        if run.max_concurrent == 0 {
            return Err(Error::invalid_value("run.max_concurrent", "must be at least 1"));
        }
        if run.max_failed_batches == 0 {
            return Err(Error::invalid_value(
                "run.max_failed_batches",
                "must be at least 1",
            ));
        }
        if run.jitter_min_ms > run.jitter_max_ms {
            return Err(Error::invalid_value(
                "run.jitter_min_ms",
                format!(
                    "{} exceeds jitter_max_ms {}",
                    run.jitter_min_ms, run.jitter_max_ms
                ),
            ));
        }
        if run.max_pages == Some(0) {
            return Err(Error::invalid_value("run.max_pages", "must be at least 1"));
        }
        if self.source.base_url.trim().is_empty() {
            return Err(Error::missing_field("source.base_url"));
        }
        url::Url::parse(&self.source.base_url)?;
        if self.source.page_size == 0 {
            return Err(Error::invalid_value("source.page_size", "must be at least 1"));
        }
        if self.source.cache_capacity > MAX_CACHE_CAPACITY {
            return Err(Error::invalid_value(
                "source.cache_capacity",
                format!(
                    "{} exceeds the maximum of {MAX_CACHE_CAPACITY}",
                    self.source.cache_capacity
                ),
            ));
        }
        if self.database.pool_size < run.max_concurrent as usize {
            return Err(Error::invalid_value(
                "database.pool_size",
                format!(
                    "{} is smaller than run.max_concurrent {}",
                    self.database.pool_size, run.max_concurrent
                ),
            ));
        }
        if !is_identifier(&self.database.table) {
            return Err(Error::invalid_value(
                "database.table",
                format!("'{}' is not a valid table name", self.database.table),
            ));
        }
        if self.database.upsert_batch_size == 0 {
            return Err(Error::invalid_value(
                "database.upsert_batch_size",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_value(key, format!("cannot parse '{value}'")))
}
