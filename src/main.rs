//! feedsync main entry point
//!
//! This is the command-line interface for the feedsync listing harvester.

use clap::Parser;
use feedsync::config::{load_config_with_hash, Config, SourceConfig};
use feedsync::crawler::{CrawlEngine, HttpFetcher, RunOptions, SourceScheduler};
use feedsync::model::{CrawlMode, ScrapingResult};
use feedsync::storage::{open_storage, ReconciliationStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// feedsync: incremental listing-feed harvester
///
/// feedsync pages through listing feeds such as Hacker News, extracts one
/// record per item and keeps a SQLite database in sync with the feed.
#[derive(Parser, Debug)]
#[command(name = "feedsync")]
#[command(version)]
#[command(about = "Incremental listing-feed harvester", long_about = None)]
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

    /// Crawl only this source (default: every enabled source)
    #[arg(short, long)]
    source: Option<String>,

    /// Crawl mode overriding the configured one (latest, since_last, full, until_existing)
    #[arg(short, long)]
    mode: Option<CrawlMode>,

    /// Page limit overriding the configured one
    #[arg(long)]
    max_pages: Option<u32>,

    /// List configured sources and exit
    #[arg(long, conflicts_with_all = ["history", "watch"])]
    list: bool,

    /// Show the most recent runs and exit
    #[arg(long, value_name = "N", conflicts_with_all = ["list", "watch"])]
    history: Option<u32>,

    /// Keep enabled sources in sync on their intervals until Ctrl-C
    #[arg(long, conflicts_with_all = ["list", "history"])]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.list {
        handle_list(&config);
    } else if let Some(limit) = cli.history {
        handle_history(&config, limit)?;
    } else if cli.watch {
        handle_watch(config).await?;
    } else {
        handle_crawl(&config, &cli).await?;
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
            0 => EnvFilter::new("feedsync=info,warn"),
            1 => EnvFilter::new("feedsync=debug,info"),
            2 => EnvFilter::new("feedsync=trace,debug"),
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

fn build_engine(config: &Config) -> feedsync::Result<CrawlEngine> {
    let store = open_storage(Path::new(&config.store.database_path))?;
    let fetcher = HttpFetcher::new(&config.http)?;
    Ok(CrawlEngine::new(Arc::new(fetcher), Arc::new(store)))
}

/// Handles --list: prints the configured sources
fn handle_list(config: &Config) {
    println!("Database: {}\n", config.store.database_path);
    println!("Sources ({}):", config.sources.len());
    for source in &config.sources {
        println!(
            "  - {} [{}] {}",
            source.name,
            if source.enabled { "enabled" } else { "disabled" },
            source.url
        );
        println!(
            "    mode: {}, every {}s, up to {} pages",
            source.mode, source.interval_secs, source.max_pages
        );
    }
}

/// Handles --history: prints recent run journal entries
fn handle_history(config: &Config, limit: u32) -> feedsync::Result<()> {
    let storage = open_storage(Path::new(&config.store.database_path))?;
    let runs = storage.run_history(limit)?;

    if runs.is_empty() {
        println!("No runs recorded yet");
        return Ok(());
    }

    for run in runs {
        let mode = run.mode.map(|m| m.to_string()).unwrap_or_else(|| "?".to_string());
        println!(
            "#{} {} {} {} started {} ({} records)",
            run.id,
            run.source,
            mode,
            run.status.to_db_string(),
            run.started_at,
            run.records_scraped
        );
        if let Some(error) = run.error_message {
            println!("    {}", error);
        }
    }

    Ok(())
}

/// Handles the default mode: one crawl per selected source
async fn handle_crawl(config: &Config, cli: &Cli) -> feedsync::Result<()> {
    let sources: Vec<&SourceConfig> = match &cli.source {
        Some(name) => vec![config
            .source(name)
            .ok_or_else(|| feedsync::SchedulerError::UnknownSource(name.clone()))?],
        None => config.enabled_sources().collect(),
    };

    if sources.is_empty() {
        tracing::warn!("No enabled sources to crawl");
        return Ok(());
    }

    let engine = build_engine(config)?;

    for source in sources {
        let mut options = RunOptions::for_source(source);
        if let Some(mode) = cli.mode {
            options.mode = mode;
        }
        if let Some(max_pages) = cli.max_pages {
            options.max_pages = max_pages.max(1);
        }

        let result = engine.run(source, &options).await;
        print_result(&source.name, &result);
    }

    Ok(())
}

/// Handles --watch: schedules every enabled source until Ctrl-C
async fn handle_watch(config: Config) -> feedsync::Result<()> {
    let engine = build_engine(&config)?;
    let names: Vec<String> = config.enabled_sources().map(|s| s.name.clone()).collect();
    let scheduler = SourceScheduler::new(engine, config.sources);

    for name in &names {
        scheduler.start(name)?;
    }
    tracing::info!("Watching {} sources, press Ctrl-C to stop", names.len());

    tokio::signal::ctrl_c().await?;

    let stopped = scheduler.stop_all();
    tracing::info!("Stopped: {}", stopped.join(", "));
    Ok(())
}

fn print_result(source: &str, result: &ScrapingResult) {
    println!("=== {} ({}) ===", source, result.mode);
    println!("  Pages scraped:   {}", result.pages_scraped);
    println!("  Posts stored:    {}", result.posts_scraped);
    println!("  New:             {}", result.new_posts);
    println!("  Updated:         {}", result.updated_posts);
    println!("  Last known id:   {}", result.last_known_id);
    println!("  Highest id seen: {}", result.highest_id_seen);
    if let Some(reason) = result.stop_reason {
        println!("  Stopped:         {}", reason);
    }
    println!("  Duration:        {:.2}s", result.duration.as_secs_f64());
    for error in &result.errors {
        println!("  ! {}", error);
    }
}
