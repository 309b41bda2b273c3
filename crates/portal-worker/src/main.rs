//! Portal Worker binary.
//!
//! Runs the task poller by default; also carries operator commands for
//! credentials and the screenshot cache.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use portal_automation::{
    create_default_registry, ChromiumLauncher, Credentials, Dispatcher, LifecycleEngine,
    SelectorRegistry, Services, TaskStore,
};
use portal_worker::artifacts::{BlobClient, ScreenshotCache, ScreenshotStore};
use portal_worker::crypto::Encryptor;
use portal_worker::db::{create_pool, PgAuditLog, PgTaskStore};
use portal_worker::{CredentialVault, DatabaseConfig, Poller, StorageConfig, WorkerConfig};

/// How often the screenshot cache is purged while the worker runs.
const RETENTION_SWEEP: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Parser)]
#[command(name = "portal-worker")]
#[command(version, about = "Portal automation worker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the task queue and run automations (default)
    Run,

    /// Delete cached screenshots older than the retention window
    PurgeScreenshots {
        /// Override WORKER_SCREENSHOT_RETENTION_DAYS
        #[arg(long)]
        days: Option<u32>,
    },

    /// Manage stored portal credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialCommands,
    },

    /// Encrypt a value with the vault key and print it
    Encrypt {
        /// Value to encrypt; read from stdin when omitted
        value: Option<String>,
    },
}

#[derive(Subcommand)]
enum CredentialCommands {
    /// Store or replace credentials for a tenant and service
    Put {
        #[arg(long)]
        tenant: Uuid,

        #[arg(long, default_value = "partner_portal")]
        service: String,

        #[arg(long)]
        username: String,

        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,

        #[arg(long)]
        api_key: Option<String>,

        /// Extra JSON stored encrypted alongside the login
        #[arg(long, value_name = "JSON")]
        additional_data: Option<String>,
    },

    /// Delete credentials for a tenant and service
    Delete {
        #[arg(long)]
        tenant: Uuid,

        #[arg(long, default_value = "partner_portal")]
        service: String,
    },
}

/// Initialize tracing/logging.
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,portal_worker=debug,portal_automation=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Route panics through tracing before the default hook prints them.
///
/// Panics inside an automation are contained by the engine; any other
/// panic unwinds out of `main` and the process exits non-zero.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "Panic");
        default_hook(info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = WorkerConfig::from_env().context("Failed to load WORKER_ configuration")?;

    init_tracing(config.json_logs());
    install_panic_hook();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::PurgeScreenshots { days } => {
            let max_age = match days {
                Some(days) => Duration::from_secs(u64::from(days) * 24 * 60 * 60),
                None => config.retention(),
            };
            let report = ScreenshotCache::new(&config.screenshot_dir)
                .purge_older_than(max_age)
                .await?;
            println!(
                "Removed {} file(s) and {} director(ies); {} entr(ies) skipped",
                report.files_removed, report.dirs_removed, report.failures
            );
            Ok(())
        }
        Commands::Credentials { action } => credentials(config, action).await,
        Commands::Encrypt { value } => {
            let value = match value {
                Some(value) => value,
                None => read_stdin_line()?,
            };
            let encryptor = Encryptor::new(&config.encryption_key)?;
            println!("{}", encryptor.encrypt(&value)?);
            Ok(())
        }
    }
}

async fn run(config: WorkerConfig) -> Result<()> {
    tracing::info!(config = ?config, "Starting portal worker");

    let db_config = DatabaseConfig::from_env().context("Failed to load POSTGRES_ configuration")?;
    let storage_config = StorageConfig::from_env().context("Failed to load STORAGE_ configuration")?;

    let pool = create_pool(&db_config).await?;
    let vault = CredentialVault::new(pool.clone(), &config.encryption_key)?;

    let cache = ScreenshotCache::new(&config.screenshot_dir);
    let blob = BlobClient::from_config(&storage_config);
    if blob.is_none() {
        tracing::warn!("STORAGE_URL not set; screenshots are kept in the local cache only");
    }

    let selectors = match &config.selectors_path {
        Some(path) => SelectorRegistry::from_yaml_file(path)?,
        None => SelectorRegistry::new(),
    };
    let registry = create_default_registry(config.portal(), selectors)?;

    let tasks: Arc<dyn TaskStore> = Arc::new(PgTaskStore::new(pool.clone()));
    let services = Services {
        tasks: tasks.clone(),
        audit: Arc::new(PgAuditLog::new(pool.clone())),
        artifacts: Arc::new(ScreenshotStore::new(cache.clone(), blob)),
        credentials: Arc::new(vault),
        launcher: Arc::new(ChromiumLauncher::new(config.chromium())),
    };
    let engine = LifecycleEngine::new(services, config.browser_timeouts());
    let poller = Poller::new(tasks, Dispatcher::new(registry, engine), config.poll_interval());

    let mut retention = tokio::spawn(retention_loop(cache, config.retention()));

    tokio::select! {
        _ = poller.run() => {}
        joined = &mut retention => {
            joined.context("Screenshot retention task stopped")?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutting down worker");
        }
    }

    retention.abort();
    pool.close().await;
    tracing::info!("Worker stopped");
    Ok(())
}

/// Purge the screenshot cache now and then once per sweep interval.
async fn retention_loop(cache: ScreenshotCache, max_age: Duration) {
    let mut ticker = tokio::time::interval(RETENTION_SWEEP);
    loop {
        ticker.tick().await;
        if let Err(e) = cache.purge_older_than(max_age).await {
            tracing::warn!(dir = %cache.dir().display(), error = %e, "Screenshot purge failed");
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}

async fn credentials(config: WorkerConfig, action: CredentialCommands) -> Result<()> {
    let db_config = DatabaseConfig::from_env().context("Failed to load POSTGRES_ configuration")?;
    let pool = create_pool(&db_config).await?;
    let vault = CredentialVault::new(pool.clone(), &config.encryption_key)?;

    match action {
        CredentialCommands::Put {
            tenant,
            service,
            username,
            password,
            api_key,
            additional_data,
        } => {
            let password = match password {
                Some(password) => password,
                None => read_stdin_line()?,
            };
            let additional_data = additional_data
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .context("--additional-data is not valid JSON")?;

            let id = vault
                .store_credentials(
                    tenant,
                    &service,
                    &Credentials {
                        username,
                        password,
                        api_key,
                        additional_data,
                    },
                )
                .await?;
            println!("Stored credentials {} for {} (tenant {})", id, service, tenant);
        }
        CredentialCommands::Delete { tenant, service } => {
            if vault.delete_credentials(tenant, &service).await? {
                println!("Deleted credentials for {} (tenant {})", service, tenant);
            } else {
                println!("No credentials for {} (tenant {})", service, tenant);
            }
        }
    }

    pool.close().await;
    Ok(())
}

fn read_stdin_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
