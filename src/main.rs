//! Nifty-Sentry main entry point
//!
//! This is the command-line interface for the Nifty-Sentry news watcher.

use clap::Parser;
use nifty_sentry::config::{load_config_with_hash, Config};
use nifty_sentry::matcher::Matcher;
use nifty_sentry::output::{print_checkpoints, print_report};
use nifty_sentry::run_once;
use nifty_sentry::sources::RedditCredentials;
use nifty_sentry::storage::{CheckpointLoad, CheckpointStore, JsonCheckpointStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Nifty-Sentry: incremental market news watcher
///
/// Nifty-Sentry polls RSS feeds and Reddit communities for headlines that
/// mention NIFTY-50 companies, archives the linked articles, and remembers
/// where each source left off so the next run only sees new items.
#[derive(Parser, Debug)]
#[command(name = "nifty-sentry")]
#[command(version)]
#[command(about = "Incremental market news watcher", long_about = None)]
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

    /// Ignore stored checkpoints and treat every source as a first run
    #[arg(long, conflicts_with_all = ["dry_run", "checkpoints"])]
    fresh: bool,

    /// Validate config and show what would be polled without fetching anything
    #[arg(long, conflicts_with = "checkpoints")]
    dry_run: bool,

    /// Show the stored checkpoints and exit
    #[arg(long, conflicts_with = "dry_run")]
    checkpoints: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Credentials may live in a local .env file
    dotenvy::dotenv().ok();

    setup_logging(cli.verbose, cli.quiet);

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

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.checkpoints {
        handle_checkpoints(&config);
    } else {
        handle_run(&config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("nifty_sentry=info,warn"),
            1 => EnvFilter::new("nifty_sentry=debug,info"),
            2 => EnvFilter::new("nifty_sentry=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be polled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Nifty-Sentry Dry Run ===\n");

    println!("Run:");
    println!("  Checkpoints: {}", config.run.checkpoint_path);
    println!("  Archive: {}", config.run.archive_path);
    println!(
        "  On resolution failure: {:?}",
        config.run.on_resolution_failure
    );
    if let Some(secs) = config.run.source_timeout_secs {
        println!("  Source timeout: {}s", secs);
    }

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Request timeout: {}s", config.http.request_timeout_secs);
    println!("  Resolve timeout: {}s", config.http.resolve_timeout_secs);

    let authenticated = RedditCredentials::from_env().is_some();
    println!("\nListing:");
    println!("  Page size: {}", config.listing.page_size);
    println!(
        "  Access: {}",
        if authenticated {
            "authenticated (credentials found)"
        } else {
            "public"
        }
    );

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!("  - {} [{}] {}", source.id, source.kind, source.endpoint);
    }

    let matcher = Matcher::from_config(&config.entities)?;
    println!("\nEntities ({}):", matcher.entity_count());
    for name in matcher.entity_names() {
        println!("  - {}", name);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would poll {} sources", config.sources.len());

    Ok(())
}

/// Handles the --checkpoints mode: shows the stored checkpoint state
fn handle_checkpoints(config: &Config) {
    let store = JsonCheckpointStore::new(&config.run.checkpoint_path);
    println!("Checkpoint file: {}\n", store.path().display());

    match store.load() {
        CheckpointLoad::Loaded(map) => print_checkpoints(&map),
        CheckpointLoad::Missing => println!("No checkpoint file yet; the next run is a first run."),
        CheckpointLoad::Corrupt { reason } => {
            println!("Checkpoint file is corrupt ({}); the next run starts fresh.", reason)
        }
    }
}

/// Handles the main ingestion run
async fn handle_run(config: &Config, fresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh run (ignoring stored checkpoints)");
    }

    match run_once(config, fresh).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
