//! pacerd - The budget-pacer service
//!
//! Wires together:
//! - Configuration loading and brand/campaign seeding
//! - Store initialization
//! - The reconciliation jobs and their schedule
//! - One-shot maintenance commands

mod dispatch;
mod service;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pacer_config::{Settings, load_config};
use pacer_core::{EngineOptions, JobKind, Reconciler, apply_seeds, parse_amount, status_overview};
use pacer_store::{SqliteStore, Store};
use pacer_util::{CampaignId, PACER_DATA_DIR_ENV, default_config_path};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::dispatch::Dispatcher;
use crate::service::Service;

/// pacerd - Budget and dayparting admission control for ad campaigns
#[derive(Parser, Debug)]
#[command(name = "pacerd")]
#[command(about = "Budget and dayparting admission control for ad campaigns", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/pacer/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set PACER_DATA_DIR env var)
    #[arg(short, long, env = PACER_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level (overrides the config file)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the service until signalled (default)
    Run,
    /// Reset spend counters now, including monthly ones on the first of the month
    ResetBudgets,
    /// Run the budget and dayparting checks once
    Check,
    /// Re-derive brand counters from the spend ledger and repair drift
    VerifyCounters,
    /// Print every brand and campaign as JSON
    Status,
    /// Record a spend against a campaign
    RecordSpend {
        campaign_id: i64,
        /// Amount with at most two decimal places
        amount: String,
        #[arg(short = 'm', long)]
        description: Option<String>,
    },
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Load settings, falling back to defaults when the file does not exist
fn load_settings(args: &Args) -> Result<(Settings, bool)> {
    if !args.config.exists() {
        return Ok((Settings::default(), false));
    }

    let settings = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    Ok((settings, true))
}

fn open_store(settings: &Settings) -> Result<Arc<dyn Store>> {
    std::fs::create_dir_all(&settings.service.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {:?}",
            settings.service.data_dir
        )
    })?;

    let db_path = settings.database_path();
    let store = SqliteStore::open_with_timeout(&db_path, settings.service.busy_timeout)
        .with_context(|| format!("Failed to open database {:?}", db_path))?;
    if !store.is_healthy() {
        bail!("Database {:?} is not responding", db_path);
    }

    info!(db_path = %db_path.display(), "Store opened");
    Ok(Arc::new(store))
}

/// Run one job synchronously and report the outcome
fn run_once(reconciler: &Reconciler, kind: JobKind) -> Result<()> {
    let run = reconciler.run(kind, pacer_util::now());
    println!("{}", run.report);

    if run.report.is_partial() {
        bail!("{} finished with {} failure(s)", kind, run.report.failures().len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut settings, config_found) = load_settings(&args)?;
    if let Some(dir) = &args.data_dir {
        settings.service.data_dir = dir.clone();
    }

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| settings.service.log_level.clone());
    init_logging(&level, args.json_logs);

    info!(version = env!("CARGO_PKG_VERSION"), "pacerd starting");
    if config_found {
        info!(
            config_path = %args.config.display(),
            brand_count = settings.brands.len(),
            "Configuration loaded"
        );
    } else {
        warn!(config_path = %args.config.display(), "Config file not found, using defaults");
    }
    if pacer_util::is_mock_time_active() {
        warn!(now = %pacer_util::now(), "Mock time is active");
    }

    let store = open_store(&settings)?;
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        EngineOptions::from(&settings.service),
    ));

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let seeded = apply_seeds(store.as_ref(), &settings.brands, pacer_util::now())
                .context("Failed to apply configured brands")?;
            info!(
                brands_created = seeded.brands_created,
                brands_updated = seeded.brands_updated,
                campaigns_created = seeded.campaigns_created,
                campaigns_updated = seeded.campaigns_updated,
                "Configured brands applied"
            );

            let service = Service::new(
                store,
                Dispatcher::new(reconciler),
                settings.jobs.clone(),
                settings.service.timezone,
            );
            service.run().await
        }
        Command::ResetBudgets => run_once(&reconciler, JobKind::ResetSpends),
        Command::Check => run_once(&reconciler, JobKind::CheckAndUpdateStatus),
        Command::VerifyCounters => run_once(&reconciler, JobKind::VerifyCounters),
        Command::Status => {
            let overview = status_overview(reconciler.accumulator(), pacer_util::now())?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
            Ok(())
        }
        Command::RecordSpend {
            campaign_id,
            amount,
            description,
        } => {
            let amount = parse_amount(&amount)?;
            let id = reconciler.accumulator().record_spend(
                CampaignId::new(campaign_id),
                amount,
                description.as_deref(),
                pacer_util::now(),
            )?;
            println!("Recorded spend {} of {} for campaign {}", id, amount, campaign_id);
            Ok(())
        }
    }
}
