//! Listing-Harvester main entry point
//!
//! This is the command-line interface for the listing harvester.

use anyhow::Context;
use clap::Parser;
use listing_harvester::config::{load_config_with_hash, Config};
use listing_harvester::crawler::{Harvester, PageDescriptor};
use listing_harvester::output::{load_statistics, print_statistics};
use listing_harvester::storage::SqliteStorage;
use listing_harvester::HarvestError;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Listing-Harvester: a paced listing crawler
///
/// Crawls announcement boards and classified searches page by page,
/// normalizes every listing, extracts its contact channels and stores each
/// listing once.
#[derive(Parser, Debug)]
#[command(name = "listing-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A paced listing crawler with deduplicated storage", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl only this source (repeatable)
    #[arg(short, long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Override the configured page limit per source segment
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Validate config and show the first page of every segment without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli.sources)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, &config_hash, &cli.sources, cli.max_pages).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvester=info,warn"),
            1 => EnvFilter::new("listing_harvester=debug,info"),
            2 => EnvFilter::new("listing_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, names: &[String]) -> anyhow::Result<()> {
    println!("=== Listing-Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max pages per segment: {}", config.crawler.max_pages);
    println!(
        "  Page delay: {}-{}ms",
        config.crawler.page_delay_min_ms, config.crawler.page_delay_max_ms
    );
    println!(
        "  Request budget: {} (cooldown {}ms)",
        config.crawler.request_budget, config.crawler.budget_cooldown_ms
    );
    println!("  Parallel sources: {}", config.crawler.parallel_sources);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Diagnostics: {}", config.output.diagnostics_dir);

    let sources: Vec<_> = if names.is_empty() {
        config.sources.iter().collect()
    } else {
        names
            .iter()
            .map(|name| {
                config
                    .source(name)
                    .ok_or_else(|| HarvestError::UnknownSource(name.clone()))
            })
            .collect::<Result<_, _>>()?
    };

    println!("\nSources ({}):", sources.len());
    for source in sources {
        println!("  - {} ({:?})", source.name, source.kind);
        for query in listing_harvester::crawler::segments(source) {
            let page = PageDescriptor::new(source, query.as_ref(), 1)?;
            println!("    * {}", page.url);
        }
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    names: &[String],
    max_pages: Option<u32>,
) -> anyhow::Result<()> {
    let max_pages = max_pages.unwrap_or(config.crawler.max_pages);
    let harvester = Harvester::open(config, config_hash)?;
    let sources = harvester.select_sources(names)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            on_signal.cancel();
        }
    });

    let summary = harvester.run_crawl(&sources, max_pages, cancel).await?;

    if summary.cancelled {
        tracing::warn!("Crawl interrupted; results so far were kept");
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
