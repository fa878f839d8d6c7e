//! Vessel Proximity CLI
//!
//! Scans position reports for vessels sharing a spatial bucket within a time
//! window.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vessel_proximity::{
    collector::FileCollector,
    config::Config,
    core::{run_scan, summarize_distances, FingerprintMode},
    stats::{create_shared_log_with_persistence, ScanLog},
    ErrorPolicy, VERSION,
};

/// File the scan statistics are persisted to, under the data path.
const STATS_FILE: &str = "scan_stats.json";

#[derive(Parser)]
#[command(name = "vessel-proximity")]
#[command(version = VERSION)]
#[command(about = "Find vessels reported close together in space and time", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a file of position reports for interactions
    Scan {
        /// Delimited input file with a header row
        input: PathBuf,

        /// Output file for interactions (defaults to the export directory)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Window width in seconds
        #[arg(long)]
        width: Option<u64>,

        /// Slide step in seconds
        #[arg(long)]
        step: Option<u64>,

        /// What to do with malformed records (skip or abort)
        #[arg(long)]
        policy: Option<String>,

        /// Use order-independent pair fingerprints
        #[arg(long)]
        canonical: bool,

        /// IANA time zone the input timestamps are written in
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Show configuration and the last scan's statistics
    Status,

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            input,
            output,
            width,
            step,
            policy,
            canonical,
            timezone,
        } => {
            let mut config = load_config();
            if let Some(secs) = width {
                config.window_width = std::time::Duration::from_secs(secs);
            }
            if let Some(secs) = step {
                config.slide_step = std::time::Duration::from_secs(secs);
            }
            if let Some(name) = policy {
                config.error_policy = match ErrorPolicy::from_name(&name) {
                    Some(policy) => policy,
                    None => bail!("unknown error policy {name:?} (expected skip or abort)"),
                };
            }
            if canonical {
                config.fingerprint = FingerprintMode::Canonical;
            }
            if let Some(zone) = timezone {
                config.timestamp.timezone = zone;
            }
            cmd_scan(&input, output, &config)
        }
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load configuration, using defaults: {e}");
            Config::default()
        }
    }
}

fn cmd_scan(input: &Path, output: Option<PathBuf>, config: &Config) -> Result<()> {
    config.validate().context("invalid configuration")?;

    println!("Vessel Proximity v{VERSION}");
    println!();

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Scanning {input:?}");
    println!("  Window width: {}s", config.window_width.as_secs());
    println!("  Slide step: {}s", config.slide_step.as_secs());
    println!("  Time zone: {}", config.timestamp.timezone);
    println!("  Error policy: {:?}", config.error_policy);
    println!("  Fingerprint: {:?}", config.fingerprint);
    println!();
    println!("Press Ctrl+C to stop early");
    println!();

    let log = create_shared_log_with_persistence(config.data_path.join(STATS_FILE));

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let mut collector =
        FileCollector::open(input).with_context(|| format!("cannot read {input:?}"))?;
    let interactions = run_scan(&mut collector, config, log.clone(), &running)
        .with_context(|| format!("scan of {input:?} failed"))?;

    if !running.load(Ordering::SeqCst) {
        println!("Scan interrupted; saving what was found so far.");
    }

    let output = output.unwrap_or_else(|| {
        config.export_path.join(format!(
            "interactions_{}.csv",
            Utc::now().format("%Y%m%d_%H%M%S")
        ))
    });

    let report = interactions
        .save(&output, config.error_policy)
        .with_context(|| format!("cannot write {output:?}"))?;
    println!("Wrote {} interactions to {:?}", report.written, output);
    if !report.skipped.is_empty() {
        println!(
            "Left out {} interactions with unreadable coordinates",
            report.skipped.len()
        );
    }

    let rows: Vec<_> = interactions.emit().into_iter().filter_map(|r| r.ok()).collect();
    if let Some(summary) = summarize_distances(&rows) {
        println!();
        println!("Distances (nm):");
        println!(
            "  min {:.1} / median {:.1} / max {:.1}",
            summary.min_nm, summary.median_nm, summary.max_nm
        );
        println!("  mean {:.2}, std dev {:.2}", summary.mean_nm, summary.std_dev_nm);

        let summary_path = output.with_extension("summary.json");
        if let Err(e) = summary.save(&summary_path) {
            eprintln!("Warning: Could not save distance summary: {e}");
        }
    }

    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save scan statistics: {e}");
    }

    println!();
    println!("{}", log.summary());
    Ok(())
}

fn cmd_status() {
    let config = load_config();

    println!("Vessel Proximity Status");
    println!("=======================");
    println!();

    println!("Configuration:");
    println!("  Window width: {}s", config.window_width.as_secs());
    println!("  Slide step: {}s", config.slide_step.as_secs());
    println!(
        "  Fields: {}, {}, {}, {}, {}",
        config.fields.entity_id,
        config.fields.timestamp,
        config.fields.latitude,
        config.fields.longitude,
        config.fields.geokey
    );
    println!("  Error policy: {:?}", config.error_policy);
    println!("  Export path: {:?}", config.export_path);
    println!();

    match ScanLog::load_last(&config.data_path.join(STATS_FILE)) {
        Ok(Some(last)) => {
            let stats = last.stats;
            println!("Last Scan ({}):", stats.session_id);
            println!("  Started: {}", stats.session_start.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("  Records read: {}", stats.records_read);
            println!("  Records rejected: {}", stats.records_rejected);
            println!("  Records behind the window: {}", stats.records_out_of_window);
            println!("  Window slides: {}", stats.slides);
            println!("  Interactions retained: {}", stats.interactions_retained);
        }
        Ok(None) => println!("No previous scan data found."),
        Err(e) => eprintln!("Warning: Could not read scan statistics: {e}"),
    }
}

fn cmd_config() -> Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("cannot serialize configuration")?
    );
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("cannot set Ctrl+C handler")
}
