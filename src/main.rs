//! Tidemark main entry point
//!
//! This is the command-line interface for the Tidemark incremental harvester.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tidemark::config::{load_config_with_hash, Config};
use tidemark::crawler::run_crawl;
use tidemark::output::print_statistics;
use tidemark::storage::{JsonWatermarkStore, WatermarkStore};
use tracing_subscriber::EnvFilter;

/// Tidemark: an incremental classifieds harvester
///
/// Tidemark walks a classifieds site's category and location tree, pages each
/// leaf listing until it reaches listings harvested by the previous run, and
/// stores every new item. Per-leaf watermarks are persisted between runs.
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(version = "1.0.0")]
#[command(about = "An incremental classifieds harvester", long_about = None)]
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

    /// Ignore the persisted watermark and page every leaf to its end
    #[arg(long, conflicts_with_all = ["dry_run", "show_watermarks"])]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "show_watermarks")]
    dry_run: bool,

    /// Print the persisted watermark map and exit
    #[arg(long, conflicts_with = "dry_run")]
    show_watermarks: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.show_watermarks {
        handle_show_watermarks(&config);
    } else {
        handle_crawl(config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tidemark=info,warn"),
            1 => EnvFilter::new("tidemark=debug,info"),
            2 => EnvFilter::new("tidemark=trace,debug"),
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
fn handle_dry_run(config: &Config) {
    println!("=== Tidemark Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Name: {}", config.crawler.name);
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!("  Stop policy: {:?}", config.crawler.stop_policy);

    println!("\nFetch:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!(
        "  Retries: {} ({}ms apart)",
        config.fetch.retry_times, config.fetch.retry_delay_ms
    );
    println!("  User agent: {}", config.fetch.user_agent);

    println!("\nSite:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Item URL base: {}", config.site.item_url_base);
    println!("  Category zone: {}", config.site.category_zone);
    println!("  Location zone: {}", config.site.location_zone);

    println!("\nOutput:");
    println!("  Watermark directory: {}", config.output.watermark_dir);
    println!("  Items database: {}", config.output.items_path);

    println!("\nProxies ({}):", config.proxies.len());
    for proxy in &config.proxies {
        match &proxy.username {
            Some(username) => println!("  - {} (as {})", proxy.address, username),
            None => println!("  - {}", proxy.address),
        }
    }

    println!("\nStart URLs ({}):", config.crawler.start_urls.len());
    for url in &config.crawler.start_urls {
        println!("  * {}", url);
    }

    let store = JsonWatermarkStore::new(&config.output.watermark_dir);
    let watermark = store.load(&config.crawler.name);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl '{}' with {} persisted leaf watermarks",
        config.crawler.name,
        watermark.len()
    );
}

/// Handles the --show-watermarks mode: prints the persisted watermark map
fn handle_show_watermarks(config: &Config) {
    let store = JsonWatermarkStore::new(&config.output.watermark_dir);
    let path = store.path_for(&config.crawler.name);
    let watermark = store.load(&config.crawler.name);

    println!("Watermark file: {}\n", path.display());

    if watermark.is_empty() {
        println!("No leaf watermarks recorded");
        return;
    }

    for (leaf, timestamp) in watermark.iter() {
        let when = chrono::DateTime::<chrono::Utc>::from_timestamp(timestamp, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "invalid timestamp".to_string());
        println!("  {}  {}  ({})", timestamp, leaf, when);
    }
    println!("\n{} leaves", watermark.len());
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring persisted watermark)");
    } else {
        tracing::info!("Starting incremental crawl");
    }

    tracing::info!(
        "Start URLs: {}, Proxies: {}",
        config.crawler.start_urls.len(),
        config.proxies.len()
    );

    let started = Instant::now();
    let name = config.crawler.name.clone();
    let stats = run_crawl(config, fresh)
        .await
        .with_context(|| format!("Crawl '{}' failed", name))?;

    tracing::info!("Crawl completed successfully");
    print_statistics(&stats, started.elapsed());
    Ok(())
}
