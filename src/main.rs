// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use tokio::sync::watch;

use manifest_sync::app_config::{self, Config};
use manifest_sync::database::{DatabaseConnection, Repository};
use manifest_sync::pipeline::{Scheduler, StatusStateMachine};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile all hosted apps periodically until interrupted
    Run,

    /// Reconcile once, either every eligible app or only the given ones
    Sync {
        /// App id to reconcile (repeatable)
        #[arg(long = "app", value_name = "ID")]
        apps: Vec<i64>,
    },

    /// Recompute and print an app's release status
    Status {
        /// App id
        #[arg(value_name = "ID")]
        app_id: i64,
    },

    /// Print the review queue as JSON
    Queue,

    /// Print database statistics
    Stats,

    /// Generate shell completions for manifest-sync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// manifest-sync - Manifest reconciliation for an app marketplace
///
/// Re-fetches each hosted app's manifest, applies validated changes to the
/// catalog, recomputes release status and escalates persistent failures.
#[derive(Parser, Debug)]
#[command(name = "manifest-sync")]
#[command(version)]
#[command(about = "Manifest reconciliation pipeline for an app marketplace")]
#[command(long_about = "manifest-sync keeps the catalog in line with the manifests developers host.

EXAMPLES:
    manifest-sync run                           # Reconcile periodically until Ctrl-C
    manifest-sync sync                          # One pass over every eligible app
    manifest-sync sync --app 42 --app 43        # Reconcile two apps now
    manifest-sync status 42                     # Recompute the status of app 42
    manifest-sync queue                         # List apps waiting for a reviewer
    manifest-sync completions bash > manifest-sync.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Color escape for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace lets set_max_level raise the level after the config is read
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "manifest-sync", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(cli_level) = &cli.log_level {
        log::set_max_level(level_filter(&cli_level.clone().into()));
    }

    let config = load_config(&cli.config_path, cli.log_level.clone())?;
    if cli.log_level.is_none() {
        log::set_max_level(level_filter(&config.log_level));
    }

    let db = match &config.database_path {
        Some(path) => DatabaseConnection::new(path)?,
        None => DatabaseConnection::new_default()?,
    };
    info!("Using database at {}", db.path().display());
    let repo = Repository::new(db);

    match cli.command {
        Commands::Run => run_scheduler(&config, repo).await,
        Commands::Sync { apps } => run_sync(&config, repo, apps).await,
        Commands::Status { app_id } => print_status(repo, app_id).await,
        Commands::Queue => print_queue(repo).await,
        Commands::Stats => print_stats(repo),
        Commands::Completions { .. } => Ok(()),
    }
}

/// Load the configuration file, creating it with defaults if it does not exist
fn load_config(config_path: &str, cli_log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;

        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;

        config
    };

    if let Some(log_level) = cli_log_level {
        config.log_level = log_level.into();
    }

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

async fn run_scheduler(config: &Config, repo: Repository) -> Result<()> {
    let scheduler = Scheduler::from_config(config, repo)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, finishing in-flight cycles");
            let _ = shutdown_tx.send(true);
        }
    });

    scheduler.run(shutdown_rx).await
}

async fn run_sync(config: &Config, repo: Repository, apps: Vec<i64>) -> Result<()> {
    let scheduler = Scheduler::from_config(config, repo)?;

    let report = if apps.is_empty() {
        scheduler.run_once().await?
    } else {
        scheduler.run_batch(apps).await
    };

    info!(
        "Processed {} app(s): {} unchanged, {} applied, {} fetch failure(s), {} validation failure(s), {} error(s)",
        report.processed,
        report.unchanged,
        report.applied,
        report.fetch_failures,
        report.validation_failures,
        report.errors
    );

    if report.retries_scheduled > 0 {
        info!(
            "{} retr(ies) stored; they run once due while `manifest-sync run` is active",
            report.retries_scheduled
        );
    }

    if report.errors > 0 {
        return Err(anyhow!("{} cycle(s) aborted, see the log for details", report.errors));
    }

    Ok(())
}

async fn print_status(repo: Repository, app_id: i64) -> Result<()> {
    let change = StatusStateMachine::new(repo.clone()).recompute(app_id).await?;
    let retry = repo.get_retry_state(app_id).await?;
    let flagged = repo.has_review_entry(app_id).await?;

    let summary = serde_json::json!({
        "appId": app_id,
        "previousStatus": change.previous.to_string(),
        "status": change.current.to_string(),
        "failureCount": retry.failure_count,
        "flagged": flagged,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn print_queue(repo: Repository) -> Result<()> {
    let entries = repo.pending_review_entries().await?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

fn print_stats(repo: Repository) -> Result<()> {
    let stats = repo.connection().stats()?;
    println!("{}", stats);
    Ok(())
}
