use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use herald_client::ReqwestRemoteApi;
use herald_core::env::{export_env, job_manifest};
use herald_core::scan::{CycleReport, WatchStatus};
use herald_core::traits::{ResultStore, ResultStoreFactory};
use herald_core::watch::{generate_uid, is_valid_uid};
use herald_core::{HeraldConfig, RemoteJobWatch, ScanService, ServerRegistry};
use herald_store::FileStoreFactory;

/// Exit code when a remote broke its response contract.
const EXIT_CONTRACT_VIOLATION: u8 = 2;

#[derive(Parser)]
#[command(name = "herald", version, about = "Trigger on remote build results")]
struct Cli {
    /// Path to herald.toml
    #[arg(short, long, global = true, env = "HERALD_CONFIG", default_value = "herald.toml")]
    config: PathBuf,

    /// Directory holding per-owner state (overrides `state_dir`)
    #[arg(long, global = true, env = "HERALD_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// HTTP timeout in seconds (overrides `timeout_secs`)
    #[arg(long, global = true, env = "HERALD_HTTP_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one polling cycle
    Check {
        /// Only scan this owner (default: all owners)
        #[arg(short, long)]
        owner: Option<String>,
    },

    /// Run polling cycles until interrupted
    Watch {
        /// Only scan this owner (default: all owners)
        #[arg(short, long)]
        owner: Option<String>,

        /// Seconds between cycles
        #[arg(short, long, env = "HERALD_INTERVAL_SECS", default_value_t = 300)]
        interval_secs: u64,
    },

    /// Print the environment exported for an owner
    Env {
        #[arg(short, long)]
        owner: String,

        #[arg(short, long, value_enum, default_value_t = EnvFormat::Shell)]
        format: EnvFormat,
    },

    /// List the remote jobs recorded for an owner
    Jobs {
        #[arg(short, long)]
        owner: String,
    },

    /// Show the persisted records of an owner
    Records {
        #[arg(short, long)]
        owner: String,
    },

    /// Generate a watch uid, or validate one
    Uid {
        /// Uid to validate instead of generating a new one
        #[arg(long)]
        check: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EnvFormat {
    Shell,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("herald=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { ref owner } => {
            let config = load_config(&cli)?;
            let runner = CycleRunner::new(&cli, &config)?;
            let owners = select_owners(&config, owner.as_deref())?;
            let violation = runner.run_all(&owners).await?;
            if violation {
                return Ok(ExitCode::from(EXIT_CONTRACT_VIOLATION));
            }
        }
        Commands::Watch {
            ref owner,
            interval_secs,
        } => {
            let config = load_config(&cli)?;
            let runner = CycleRunner::new(&cli, &config)?;
            let owners = select_owners(&config, owner.as_deref())?;
            if interval_secs == 0 {
                bail!("--interval-secs must be at least 1");
            }
            cmd_watch(runner, owners, Duration::from_secs(interval_secs)).await?;
        }
        Commands::Env { ref owner, format } => {
            let stores = open_stores(&cli)?;
            cmd_env(&stores, owner, format).await?;
        }
        Commands::Jobs { ref owner } => {
            let stores = open_stores(&cli)?;
            let records = list_records(&stores, owner).await?;
            println!("{}", serde_json::to_string_pretty(&job_manifest(&records))?);
        }
        Commands::Records { ref owner } => {
            let stores = open_stores(&cli)?;
            let records = list_records(&stores, owner).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Uid {
            check: Some(ref uid),
        } => {
            if uid.is_empty() || !is_valid_uid(uid) {
                bail!("'{uid}' is not a valid uid: only letters, digits, '_' and '-' are allowed");
            }
            println!("{uid}");
        }
        Commands::Uid { check: None } => println!("{}", generate_uid()),
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(cli: &Cli) -> Result<HeraldConfig> {
    HeraldConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))
}

fn state_dir(cli: &Cli, config: Option<&HeraldConfig>) -> PathBuf {
    cli.state_dir
        .clone()
        .or_else(|| config.map(|c| c.state_dir.clone()))
        .unwrap_or_else(|| PathBuf::from(herald_core::config::DEFAULT_STATE_DIR))
}

/// Store factory for read-only commands; a config file is optional here.
fn open_stores(cli: &Cli) -> Result<FileStoreFactory> {
    let config = if cli.state_dir.is_some() && !cli.config.exists() {
        None
    } else {
        Some(load_config(cli)?)
    };
    Ok(FileStoreFactory::new(state_dir(cli, config.as_ref())))
}

async fn list_records(
    stores: &FileStoreFactory,
    owner: &str,
) -> Result<Vec<herald_core::JobResultRecord>> {
    let store = stores.open(owner).map_err(|e| anyhow::anyhow!(e))?;
    store
        .list()
        .await
        .with_context(|| format!("Failed to read records of owner '{owner}'"))
}

fn select_owners(config: &HeraldConfig, owner: Option<&str>) -> Result<Vec<String>> {
    match owner {
        Some(id) => {
            config.owner(id).map_err(|e| anyhow::anyhow!(e))?;
            Ok(vec![id.to_string()])
        }
        None if config.owners.is_empty() => bail!("No owners configured in herald.toml"),
        None => Ok(config.owners.iter().map(|o| o.id.clone()).collect()),
    }
}

/// Everything needed to run cycles, shared by concurrent owner tasks.
#[derive(Clone)]
struct CycleRunner {
    service: ScanService<ReqwestRemoteApi, FileStoreFactory>,
    registry: Arc<ServerRegistry>,
    config: Arc<HeraldConfig>,
}

impl CycleRunner {
    fn new(cli: &Cli, config: &HeraldConfig) -> Result<Self> {
        let timeout = Duration::from_secs(cli.timeout_secs.unwrap_or(config.timeout_secs));
        if timeout.is_zero() {
            bail!("HTTP timeout must be at least 1 second");
        }
        let api = ReqwestRemoteApi::with_timeout(timeout).context("Failed to create HTTP client")?;
        let stores = FileStoreFactory::new(state_dir(cli, Some(config)));
        let registry = config.registry().context("Invalid server configuration")?;

        tracing::info!(
            state_dir = %stores.root().display(),
            servers = registry.len(),
            timeout_secs = timeout.as_secs(),
            "Herald ready"
        );

        Ok(Self {
            service: ScanService::new(api, stores),
            registry: Arc::new(registry),
            config: Arc::new(config.clone()),
        })
    }

    fn watches(&self, owner: &str) -> Result<Vec<RemoteJobWatch>> {
        self.config
            .watches_for(owner)
            .with_context(|| format!("Invalid watches for owner '{owner}'"))
    }

    /// Run one cycle for every owner concurrently. Returns true if any remote
    /// broke its contract.
    async fn run_all(&self, owners: &[String]) -> Result<bool> {
        let mut tasks = JoinSet::new();
        for owner in owners {
            let runner = self.clone();
            let owner = owner.clone();
            tasks.spawn(async move {
                let watches = runner.watches(&owner)?;
                let report = runner
                    .service
                    .run_cycle(&owner, &runner.registry, &watches)
                    .await
                    .with_context(|| format!("Cycle failed for owner '{owner}'"))?;
                anyhow::Ok(report)
            });
        }

        let mut violation = false;
        let mut failed = None;
        while let Some(joined) = tasks.join_next().await {
            match joined.context("Owner task panicked")? {
                Ok(report) => {
                    print_report(&report);
                    violation |= report.contract_violation().is_some();
                }
                Err(e) => {
                    tracing::error!(error = %format!("{e:#}"), "Owner cycle failed");
                    if failed.is_none() {
                        failed = Some(e);
                    }
                }
            }
        }

        match failed {
            Some(e) => Err(e),
            None => Ok(violation),
        }
    }
}

async fn cmd_watch(runner: CycleRunner, owners: Vec<String>, interval: Duration) -> Result<()> {
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, finishing current cycle...");
            signal_token.cancel();
        }
    });

    tracing::info!(
        owners = owners.len(),
        interval_secs = interval.as_secs(),
        "Watching remote builds"
    );

    loop {
        // A cycle in progress always completes so state stays consistent.
        match runner.run_all(&owners).await {
            Ok(true) => tracing::error!("A remote server returned a malformed response"),
            Ok(false) => {}
            Err(e) => tracing::error!(error = %format!("{e:#}"), "Cycle failed"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!("Stopped");
    Ok(())
}

async fn cmd_env(stores: &FileStoreFactory, owner: &str, format: EnvFormat) -> Result<()> {
    let records = list_records(stores, owner).await?;
    let envs = export_env(&records);
    match format {
        EnvFormat::Json => println!("{}", serde_json::to_string_pretty(&envs)?),
        EnvFormat::Shell => {
            for (key, value) in &envs {
                println!("{key}={}", shell_quote(value));
            }
        }
    }
    Ok(())
}

/// Single-quote `value` for POSIX shells.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn print_report(report: &CycleReport) {
    println!(
        "[{}] {} ({} watches, {} pruned)",
        report.owner_id,
        if report.changed { "CHANGED" } else { "unchanged" },
        report.watches.len(),
        report.pruned,
    );
    for watch in &report.watches {
        let detail = match &watch.status {
            WatchStatus::Fired { number } => format!("fired on #{number}"),
            WatchStatus::Deferred { number } => format!("#{number} still running"),
            other => match other.error() {
                Some(e) => format!("{}: {e}", other.as_str()),
                None => other.as_str().to_string(),
            },
        };
        println!("  {} {}: {}", watch.uid, watch.job, detail);
    }
}
