use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

mod config;
mod db;
mod jobs;
mod models;
mod notify;
mod observability;
mod report;
mod services;
mod upstream;

use crate::{
    config::ZquotaConfig,
    db::DbPool,
    notify::TelegramClient,
    services::{NO_DATA_MESSAGE, UsageReportService},
    upstream::{ApiTimezone, UsageFetcher},
};

const DEFAULT_CONFIG_PATH: &str = "zquota.toml";

/// CLI arguments for zquota
#[derive(Parser, Debug)]
#[command(version, about = "Z.ai / Zhipu usage monitor with Telegram reports", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the periodic report worker and the /usage listener (default)
    Serve,
    /// Fetch and store one snapshot, then print the stored report
    Collect,
    /// Fetch usage and print a report without touching the database
    Fetch,
    /// Print the latest stored report
    Report,
    /// Run database migrations and exit
    Migrate,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Starting point written by `zquota init`.
fn default_config_toml() -> &'static str {
    r#"# zquota configuration
# ${VAR} references are read from the environment (or a .env file).

[upstream]
base_url = "${ANTHROPIC_BASE_URL}"
auth_token = "${ANTHROPIC_AUTH_TOKEN}"
timeout_secs = 30
# Skip detection and pin the API clock offset (hours from UTC)
# timezone_offset_hours = 8

[telegram]
bot_token = "${TELEGRAM_BOT_TOKEN}"
chat_id = "${CHAT_ID}"
# "stored" answers /usage from the database, "live" fetches fresh data
command_source = "stored"

[scheduler]
enabled = true
interval_secs = 60

[database]
type = "sqlite"
path = "zquota.db"

[observability.logging]
level = "info"
format = "compact"
"#
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    match args.command {
        Some(Command::Init { force }) => run_init(&args.config, force),
        Some(Command::Migrate) => run_migrate(&args.config).await,
        Some(Command::Collect) => run_collect(&args.config).await,
        Some(Command::Fetch) => run_fetch(&args.config).await,
        Some(Command::Report) => run_report(&args.config).await,
        Some(Command::Serve) | None => run_server(&args.config).await,
    }
}

/// Load the config file and set up logging, or exit.
fn load_config(path: &Path) -> ZquotaConfig {
    let config = match ZquotaConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            if !path.exists() {
                eprintln!("Create one with: zquota init");
            }
            std::process::exit(1);
        }
    };

    if let Err(e) = observability::init_tracing(&config.observability.logging) {
        eprintln!("Warning: {e}");
    }

    config
}

fn build_fetcher(config: &ZquotaConfig) -> UsageFetcher {
    match UsageFetcher::from_config(&config.upstream) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Connect to the configured database, migrating first when enabled.
async fn connect_database(config: &ZquotaConfig) -> Arc<DbPool> {
    if config.database.is_none() {
        eprintln!("Error: Database is not configured. Add a [database] section.");
        std::process::exit(1);
    }

    let pool = match DbPool::from_config(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Error: Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = pool.health_check().await {
        tracing::error!(error = %e, "Database health check failed");
        eprintln!("Error: Database health check failed: {e}");
        std::process::exit(1);
    }

    if config.database.run_migrations()
        && let Err(e) = pool.run_migrations().await
    {
        tracing::error!(error = %e, "Database migrations failed");
        eprintln!("Error: Database migrations failed: {e}");
        std::process::exit(1);
    }

    Arc::new(pool)
}

/// Without a configured offset the service infers one from its first fetch.
fn build_service(config: &ZquotaConfig, db: Option<Arc<DbPool>>) -> UsageReportService {
    let timezone = config
        .upstream
        .timezone_offset_hours
        .and_then(ApiTimezone::from_hours);
    if let Some(tz) = timezone {
        tracing::info!(timezone = %tz, "Using configured API timezone");
    }
    UsageReportService::new(build_fetcher(config), timezone, db)
}

async fn run_server(config_path: &Path) {
    let config = load_config(config_path);

    tracing::info!(
        config_file = %config_path.display(),
        "Starting zquota"
    );

    let db = if config.database.is_none() {
        tracing::warn!("No database configured, only live /usage replies are available");
        None
    } else {
        Some(connect_database(&config).await)
    };

    let service = Arc::new(build_service(&config, db));

    let telegram = match TelegramClient::from_config(&config.telegram) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Error: Failed to create Telegram client: {e}");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();

    if config.scheduler.enabled {
        tracker.spawn(jobs::start_usage_report_worker(
            service.clone(),
            telegram.clone(),
            config.telegram.chat_id.clone(),
            config.scheduler.clone(),
            cancel.clone(),
        ));
    } else {
        tracing::info!("Periodic reports disabled by configuration");
    }

    if config.telegram.commands_enabled {
        tracker.spawn(jobs::start_command_listener(
            service.clone(),
            telegram.clone(),
            config.telegram.command_source,
            cancel.clone(),
        ));
    } else {
        tracing::info!("Chat commands disabled by configuration");
    }

    tracker.close();

    tokio::select! {
        _ = shutdown_signal() => {},
        _ = tracker.wait() => {
            tracing::warn!("All background tasks exited, nothing left to run");
        }
    }

    cancel.cancel();

    match tokio::time::timeout(Duration::from_secs(30), tracker.wait()).await {
        Ok(()) => tracing::info!("Shutdown complete"),
        Err(_) => tracing::warn!("Timeout waiting for background tasks, some may not have completed"),
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping background tasks...");
}

async fn run_collect(config_path: &Path) {
    let config = load_config(config_path);
    let db = connect_database(&config).await;
    let service = build_service(&config, Some(db));

    if let Err(e) = service.collect().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    print_stored_report(&service).await;
}

async fn run_fetch(config_path: &Path) {
    let config = load_config(config_path);
    let service = build_service(&config, None);

    match service.live_report().await {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_report(config_path: &Path) {
    let config = load_config(config_path);
    let db = connect_database(&config).await;
    let service = build_service(&config, Some(db));

    print_stored_report(&service).await;
}

async fn print_stored_report(service: &UsageReportService) {
    match service.stored_report().await {
        Ok(Some(text)) => println!("{text}"),
        Ok(None) => println!("{NO_DATA_MESSAGE}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_migrate(config_path: &Path) {
    let config = load_config(config_path);

    tracing::info!(
        config_file = %config_path.display(),
        "Running database migrations"
    );

    if config.database.is_none() {
        eprintln!("Error: Database is not configured. Nothing to migrate.");
        std::process::exit(1);
    }

    let pool = match DbPool::from_config(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Error: Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    match pool.run_migrations().await {
        Ok(()) => tracing::info!("Database migrations completed successfully"),
        Err(e) => {
            tracing::error!(error = %e, "Database migrations failed");
            eprintln!("Error: Database migrations failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Create a default configuration file.
fn run_init(output_path: &Path, force: bool) {
    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(output_path, default_config_toml()) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("Set ANTHROPIC_BASE_URL, ANTHROPIC_AUTH_TOKEN, TELEGRAM_BOT_TOKEN and CHAT_ID");
    println!("(or put them in a .env file), then run:");
    println!("  zquota serve");
}
