//! Kura-Harvest main entry point
//!
//! This is the command-line interface for the Kura-Harvest catalog harvester.

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser};
use kura_harvest::config::{load_config_with_hash, Config};
use kura_harvest::output::{print_audit_report, print_summary, ResultSink, RunStats};
use kura_harvest::{Harvester, ItemOutcome};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Kura-Harvest: a polite catalog harvester
///
/// Kura-Harvest mirrors a sequentially-numbered catalog into one directory
/// per item, under a global rate limit and concurrency cap. Items whose
/// directory already exists are skipped.
#[derive(Parser, Debug)]
#[command(name = "kura-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite catalog harvester", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["ids", "all", "random", "highest_id", "audit", "dry_run"])
))]
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

    /// Scrape these IDs; ranges such as 100-120 are inclusive
    #[arg(long, value_name = "ID|FROM-TO", num_args = 1.., value_parser = parse_id_range)]
    ids: Vec<RangeInclusive<u64>>,

    /// Scrape every ID from 1 to the highest one in the catalog
    #[arg(long)]
    all: bool,

    /// Scrape N random IDs (the whole range, shuffled, when N is omitted)
    #[arg(long, value_name = "N", num_args = 0..=1)]
    random: Option<Option<u64>>,

    /// Lowest ID picked by --random (defaults to 1)
    #[arg(long, requires = "random")]
    min_id: Option<u64>,

    /// Highest ID picked by --random (defaults to the highest ID in the catalog)
    #[arg(long, requires = "random")]
    max_id: Option<u64>,

    /// Print the highest ID in the catalog and exit
    #[arg(long)]
    highest_id: bool,

    /// Check the save directory for incomplete items and exit
    #[arg(long)]
    audit: bool,

    /// Validate config and show what would be used without fetching anything
    #[arg(long)]
    dry_run: bool,
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

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let harvester = Harvester::new(&config).context("Failed to set up the harvester")?;

    if cli.audit {
        let report = harvester
            .audit()
            .context("Failed to audit the save directory")?;
        print_audit_report(&report);
    } else if cli.highest_id {
        match harvester.find_highest_id().await {
            Some(id) => println!("{}", id),
            None => bail!("Failed to determine the highest ID"),
        }
    } else {
        handle_harvest(&cli, &harvester).await?;
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
            0 => EnvFilter::new("kura_harvest=info,warn"),
            1 => EnvFilter::new("kura_harvest=debug,info"),
            2 => EnvFilter::new("kura_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the effective settings
fn handle_dry_run(config: &Config) {
    let harvester = &config.harvester;

    println!("=== Kura-Harvest Dry Run ===\n");

    println!("Harvester Configuration:");
    println!("  Save directory: {}", harvester.save_dir);
    println!(
        "  Max concurrent requests: {}",
        harvester.max_concurrent_requests
    );
    match harvester.effective_rate() {
        Some(rate) => println!("  Max requests per second: {}", rate),
        None => println!("  Max requests per second: unlimited"),
    }
    println!("  Timeout: {}s", harvester.timeout_secs);
    println!("  Attempts per URL: {}", harvester.retries);
    println!("  Batch size: {}", harvester.effective_batch_size());
    println!(
        "  Pause between batches: {}-{}ms",
        harvester.batch_pause_min_ms, harvester.batch_pause_max_ms
    );

    println!("\nUser Agent:");
    match &config.user_agent.list_path {
        Some(path) => println!("  List: {}", path),
        None => println!("  List: none"),
    }
    println!("  Fallback: {}", config.user_agent.fallback);

    println!("\nCatalog:");
    println!("  Gallery URL: {}", config.catalog.gallery_url);
    match &config.catalog.latest_search_url {
        Some(url) => println!("  Latest search URL: {}", url),
        None => println!("  Latest search URL: none (binary search only)"),
    }
    println!("  Probe upper bound: {}", config.catalog.probe_upper_bound);
    println!("  Metadata file: {}", config.catalog.meta_file_name);

    println!("\n✓ Configuration is valid");
}

/// Handles the scraping modes: --ids, --all and --random
async fn handle_harvest(cli: &Cli, harvester: &Harvester) -> anyhow::Result<()> {
    let stats = RunStats::new();

    if !cli.ids.is_empty() {
        if let [range] = cli.ids.as_slice() {
            if range.start() == range.end() {
                let outcome = harvester.scrape_single(*range.start()).await;
                report_single(&outcome);
                stats.on_item(&outcome);
                print_summary(&stats.summary());
                return Ok(());
            }
        }

        let ids: Vec<u64> = cli.ids.iter().cloned().flatten().collect();
        harvester.scrape_many(ids, &stats).await;
    } else if cli.all {
        if harvester.scrape_all(&stats).await.is_none() {
            bail!("Failed to determine the highest ID");
        }
    } else if let Some(n) = cli.random {
        if harvester
            .scrape_random(n, cli.min_id.unwrap_or(1), cli.max_id, &stats)
            .await
            .is_none()
        {
            bail!("Could not choose random IDs");
        }
    }

    print_summary(&stats.summary());
    Ok(())
}

fn report_single(outcome: &ItemOutcome) {
    match outcome {
        ItemOutcome::Done { id, dir, .. } => println!("#{} -> {}", id, dir.display()),
        ItemOutcome::Skipped { id, dir } => println!("#{} already present at {}", id, dir.display()),
        ItemOutcome::Failed { id, reason, .. } => println!("#{} failed: {}", id, reason),
    }
}

/// Parses `42` or `100-120` into an inclusive range
fn parse_id_range(value: &str) -> Result<RangeInclusive<u64>, String> {
    let parse = |s: &str| {
        s.trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid ID '{}': {}", s.trim(), e))
    };

    let (start, end) = match value.split_once('-') {
        Some((start, end)) => (parse(start)?, parse(end)?),
        None => {
            let id = parse(value)?;
            (id, id)
        }
    };

    if start == 0 || end < start {
        return Err(format!("invalid ID range '{}'", value));
    }
    Ok(start..=end)
}
