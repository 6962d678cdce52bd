//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, RunArgs};
use crate::config::{HarvestConfig, RunConfig};
use crate::error::Result;
use crate::fetch::{HarvestFetcher, ListingSource, PageReport};
use crate::pagination::{EndOfDataPolicy, PaginationDriver, RunSummary};
use crate::store::{bootstrap, ConnectionPool, StoreConfig};
use crate::types::LogLevel;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Effective configuration: file, environment, then flags
    pub fn load_config(&self) -> Result<HarvestConfig> {
        let mut config = HarvestConfig::load(self.cli.config.as_deref())?;

        if let Some(db) = &self.cli.db {
            config.database.path.clone_from(db);
        }
        if let Commands::Run(args) = &self.cli.command {
            apply_run_args(&mut config.run, args);
        }

        config.validate()?;
        Ok(config)
    }

    /// Log level for the subscriber when `RUST_LOG` is unset
    pub fn log_level(&self, config: &HarvestConfig) -> LogLevel {
        if self.cli.verbose {
            LogLevel::Debug
        } else {
            config.log_level
        }
    }

    /// Run the CLI command
    pub async fn run(&self, config: HarvestConfig) -> Result<()> {
        match &self.cli.command {
            Commands::Init {
                drop_existing,
                attempts,
                retry_delay_secs,
            } => {
                let pool = ConnectionPool::open(&config.database)?;
                bootstrap(
                    &pool,
                    &config.database.table,
                    *drop_existing,
                    *attempts,
                    Duration::from_secs(*retry_delay_secs),
                )
                .await?;
                println!("Table {} is ready", config.database.table);
                Ok(())
            }
            Commands::Run(args) => {
                let token = CancellationToken::new();
                watch_interrupt(token.clone());
                let summary = harvest(&config, token).await?;
                println!("{summary}");
                Ok(())
            }
            Commands::Page { page } => self.page(&config, *page).await,
            Commands::Config => {
                print!("{}", config.to_yaml()?);
                Ok(())
            }
        }
    }

    async fn page(&self, config: &HarvestConfig, page: u32) -> Result<()> {
        let pool = open_store(&config.database).await?;
        let source = ListingSource::new(config.source.clone())?;
        let fetcher = HarvestFetcher::new(source, pool, &config.database);

        match fetcher.harvest_page(page).await? {
            PageReport::EndOfData => println!("Page {page}: no data"),
            PageReport::Stored { records, rows } => {
                println!("Page {page}: {records} records, {rows} rows stored");
            }
        }
        Ok(())
    }
}

/// Apply `run` flags over configured driver settings
pub fn apply_run_args(run: &mut RunConfig, args: &RunArgs) {
    if let Some(page) = args.start_page {
        run.start_page = page;
    }
    if let Some(max) = args.max_concurrent {
        run.max_concurrent = max;
    }
    if let Some(max) = args.max_failed_batches {
        run.max_failed_batches = max;
    }
    if let Some(max) = args.max_pages {
        run.max_pages = Some(max);
    }
    if let Some(ms) = args.jitter_min_ms {
        run.jitter_min_ms = ms;
    }
    if let Some(ms) = args.jitter_max_ms {
        run.jitter_max_ms = ms;
    }
    if args.legacy_empty_pages {
        run.end_of_data = EndOfDataPolicy::TreatAsFailure;
    }
}

/// Open the database and make sure the quote table exists
pub async fn open_store(store: &StoreConfig) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(store)?;
    bootstrap(&pool, &store.table, false, 1, Duration::ZERO).await?;
    Ok(pool)
}

/// Harvest the listing with the configured driver
pub async fn harvest(config: &HarvestConfig, cancel: CancellationToken) -> Result<RunSummary> {
    let pool = open_store(&config.database).await?;
    let source = ListingSource::new(config.source.clone())?;
    let fetcher = Arc::new(HarvestFetcher::new(source, pool, &config.database));
    let driver = PaginationDriver::new(config.run.driver_config()).with_cancellation(cancel);

    info!(
        start_page = config.run.start_page,
        max_concurrent = config.run.max_concurrent,
        table = %config.database.table,
        "Starting harvest"
    );
    let summary = driver.run(Arc::clone(&fetcher)).await?;

    let (hits, misses) = fetcher.source().cache().stats();
    debug!(hits, misses, "Page cache usage");

    if summary.budget_exhausted() {
        error!(
            last_page = summary.last_page_attempted,
            "Harvest gave up after {} failed batches", summary.consecutive_failed_batches
        );
    } else {
        info!(%summary, "Harvest finished");
    }
    Ok(summary)
}

/// Cancel `token` on Ctrl-C
fn watch_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current batch");
            token.cancel();
        }
    });
}
