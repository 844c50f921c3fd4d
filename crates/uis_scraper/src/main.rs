//! Command-line entry point: crawl statistics, snapshot and compare form
//! baselines, or serve the persisted statistics over HTTP.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use uis_scraper::config::{CrawlerConfig, Credentials};
use uis_scraper::crawler::{CrawlOptions, Crawler, HttpNavigator};
use uis_scraper::db::StatsDb;
use uis_scraper::drift::{compare_baselines, load_baseline, take_baseline, write_baseline, Severity};
use uis_scraper::server::{create_router, AppState};

/// Scraper and ETL for the MENDELU university information system
#[derive(Parser, Debug)]
#[command(name = "uis_scraper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON config file; defaults are used for anything it leaves out
    #[arg(short, long, global = true, env = "UIS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk the success-rate statistics into the database
    Crawl {
        /// Only this faculty (id or name)
        #[arg(long)]
        faculty: Option<String>,

        /// Skip courses whose statistics are already stored
        #[arg(long)]
        resume: bool,

        /// Stop after this many newly scraped courses
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Capture the form structure of the monitored pages as a new baseline
    Snapshot,

    /// Diff two baseline files; exits non-zero on critical changes
    Compare { old: PathBuf, new: PathBuf },

    /// Serve stored statistics over HTTP
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = CrawlerConfig::load_or_default(cli.config.as_deref())
        .with_context(|| format!("loading config {:?}", cli.config))?;

    match cli.command {
        Commands::Crawl { faculty, resume, limit } => crawl(config, CrawlOptions { faculty, resume, limit }).await,
        Commands::Snapshot => snapshot(config).await,
        Commands::Compare { old, new } => compare(old, new),
        Commands::Serve { port } => serve(config, port).await,
    }
}

async fn crawl(config: CrawlerConfig, options: CrawlOptions) -> Result<()> {
    let Some(credentials) = Credentials::from_env() else {
        bail!("UIS_USER and UIS_PASS must be set to crawl statistics");
    };

    let navigator = HttpNavigator::new(config.clone())?;
    navigator.login(&credentials).await?;

    let db = Arc::new(StatsDb::open(&config.db_path).with_context(|| format!("opening {:?}", config.db_path))?);
    let crawler = Crawler::new(navigator, db.clone(), config);
    let result = crawler.run(&options).await;
    drop(crawler);

    // Close even when the run failed
    if let Ok(db) = Arc::try_unwrap(db) {
        db.close()?;
    }

    let report = result?;
    println!(
        "Scraped {} course(s), resumed {}, {} structural warning(s), {} failure(s)",
        report.newly_scraped, report.resumed, report.structural_warnings, report.failures
    );
    Ok(())
}

async fn snapshot(config: CrawlerConfig) -> Result<()> {
    let navigator = HttpNavigator::new(config.clone())?;
    match Credentials::from_env() {
        Some(credentials) => navigator.login(&credentials).await?,
        None => warn!("No credentials (UIS_USER/UIS_PASS), scanning public pages only"),
    }

    let baseline = take_baseline(&navigator, &config.monitored_urls).await;
    let (stamped, latest) = write_baseline(&config.baseline_dir, &baseline)?;

    println!("Baseline saved to:\n  {}\n  {}", stamped.display(), latest.display());
    Ok(())
}

fn compare(old: PathBuf, new: PathBuf) -> Result<()> {
    let report = compare_baselines(&load_baseline(&old)?, &load_baseline(&new)?);

    if report.is_empty() {
        println!("No changes detected between baselines.");
        return Ok(());
    }

    println!("Found {} change(s):", report.changes.len());
    for severity in [Severity::Critical, Severity::Warning, Severity::Info] {
        for change in report.with_severity(severity) {
            match change.form_index {
                Some(i) => println!("  [{severity}] {} [Form {i}]: {}", change.url, change.message),
                None => println!("  [{severity}] {}", change.message),
            }
        }
    }

    if report.has_critical() {
        std::process::exit(1);
    }
    Ok(())
}

async fn serve(config: CrawlerConfig, port: u16) -> Result<()> {
    let db = Arc::new(StatsDb::open(&config.db_path).with_context(|| format!("opening {:?}", config.db_path))?);
    let router = create_router(Arc::new(AppState { db }));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "Serving success rates");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
