//! quote-harvest CLI
//!
//! Command-line interface for harvesting the quote listing

use clap::Parser;
use quote_harvest::cli::{Cli, Runner};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let runner = Runner::new(cli);

    let config = match runner.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    // RUST_LOG wins over the configured level
    let level: tracing::Level = runner.log_level(&config).into();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = runner.run(config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
