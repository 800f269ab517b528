use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use jockey::config::{format_config, Config};
use jockey::detect::MountDetector;
use jockey::engine::{Engine, EngineSnapshot};
use jockey::logging::{init_logging, LogConfig, Verbosity};
use jockey::scheduler::{PollingInterval, ReconciliationScheduler};
use jockey::share::{Share, ShareId};
use jockey::store::SqliteStore;

#[derive(Parser)]
#[command(name = "jockey")]
#[command(version)]
#[command(about = "Keep network shares mounted")]
#[command(
    long_about = "Watches configured SMB shares, notices when they drop, and remounts them with the system mount utility or Finder automation."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<String>,

    /// Use this config file instead of ~/.config/jockey/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile shares on the polling interval until interrupted
    Run,
    /// Add a share to keep mounted
    Add {
        /// Display name, also the default mount directory name
        name: String,

        /// Share locator, e.g. smb://user@nas.local/Media
        url: Url,

        /// Mount point (default: <mount root>/<name>)
        #[arg(long)]
        mount_point: Option<PathBuf>,
    },
    /// Remove a share by ID or name
    Remove { share: String },
    /// List configured shares
    List,
    /// Show the reconnection log, newest first
    Logs {
        /// Delete all log entries
        #[arg(long)]
        clear: bool,
    },
    /// Show or set the polling interval in seconds (5-300)
    Interval { secs: Option<f64> },
    /// Show or set the root for default mount points
    MountRoot { path: Option<PathBuf> },
    /// Mount a share now
    Mount { share: String },
    /// Unmount a connected share
    Unmount { share: String },
    /// Run one detection pass and print the result
    Check,
    /// List network shares currently mounted on this machine
    Discover,
    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().context("Failed to load config"),
    }
}

fn open_engine(config: &Config) -> Result<Engine> {
    let db_path = config.effective_db_path();
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open state database {}", db_path.display()))?;
    let detector = MountDetector::new(Arc::new(config.system_host()));

    Ok(Engine::with_recheck_delays(
        Arc::new(store),
        detector,
        config.orchestrator(),
        config.effective_recheck_delays(),
    ))
}

/// Find a share by full ID or exact (case-insensitive) name.
fn resolve_share(snapshot: &EngineSnapshot, key: &str) -> Result<ShareId> {
    if let Ok(id) = key.parse::<ShareId>() {
        if snapshot.shares.iter().any(|s| s.id == id) {
            return Ok(id);
        }
    }

    snapshot
        .shares
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(key))
        .map(|s| s.id)
        .with_context(|| format!("No share matches '{}'", key))
}

fn print_shares(shares: &[Share]) {
    if shares.is_empty() {
        println!("No shares configured. Add one with `jockey add <name> <url>`.");
        return;
    }

    let now = Utc::now();
    println!(
        "{:<36}  {:<16}  {:<12}  {:<10}  {:<16}  {}",
        "ID", "NAME", "STATUS", "FOR", "LAST CHECKED", "URL"
    );
    for share in shares {
        let status = if share.is_connected {
            "connected"
        } else {
            "disconnected"
        };
        println!(
            "{:<36}  {:<16}  {:<12}  {:<10}  {:<16}  {}",
            share.id,
            share.name,
            status,
            share.formatted_connection_time(now),
            share.formatted_last_checked(now),
            share.remote_address
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbosity = match (&cli.command, cli.verbose) {
        (Commands::Run, 0) => Verbosity::Normal,
        (_, count) => Verbosity::from(count),
    };
    let _log_guard = init_logging(&LogConfig {
        verbosity,
        log_file: cli.log_file.clone(),
    });

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => println!("{}", format_config(&config)),
            ConfigAction::Path => match &cli.config {
                Some(path) => println!("{}", path.display()),
                None => println!("{}", Config::config_path()?.display()),
            },
        },
        Commands::Run => {
            let engine = open_engine(&config)?;
            let mut scheduler = ReconciliationScheduler::new(engine.clone());
            scheduler.start(scheduler.interval());

            let snapshot = engine.snapshot();
            println!(
                "Watching {} shares every {}. Press Ctrl-C to stop.",
                snapshot.shares.len(),
                snapshot.polling_interval
            );

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            scheduler.stop();
            println!("Stopped.");
        }
        Commands::Add {
            name,
            url,
            mount_point,
        } => {
            let engine = open_engine(&config)?;
            let share = engine.add_share(name, url, mount_point).await?;
            println!("Added share {} ({})", share.name, share.id);
            if let Some(path) = &share.mount_point {
                println!("  mount point: {}", path.display());
            }
        }
        Commands::Remove { share } => {
            let engine = open_engine(&config)?;
            let id = resolve_share(&engine.snapshot(), &share)?;
            engine.remove_share(id).await;
            println!("Removed share {}", id);
        }
        Commands::List => {
            let engine = open_engine(&config)?;
            print_shares(&engine.snapshot().shares);
        }
        Commands::Logs { clear } => {
            let engine = open_engine(&config)?;
            if clear {
                engine.clear_logs().await;
                println!("Reconnection log cleared.");
                return Ok(());
            }

            let mut logs = engine.snapshot().logs;
            if logs.is_empty() {
                println!("No reconnection attempts logged.");
                return Ok(());
            }
            logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            for entry in &logs {
                println!(
                    "{}  {:<7}  {:<16}  {}  -> {}\n    {}",
                    entry.formatted_timestamp(),
                    entry.status_label(),
                    entry.share_name,
                    entry.remote_address,
                    entry.mount_point_path,
                    entry.message
                );
            }
        }
        Commands::Interval { secs } => {
            let engine = open_engine(&config)?;
            match secs {
                Some(secs) => {
                    let interval = PollingInterval::clamped(secs);
                    engine.set_polling_interval(interval).await?;
                    if interval.as_secs_f64() != secs {
                        println!("Polling interval set to {} (clamped from {})", interval, secs);
                    } else {
                        println!("Polling interval set to {}", interval);
                    }
                }
                None => println!("{}", engine.snapshot().polling_interval),
            }
        }
        Commands::MountRoot { path } => {
            let engine = open_engine(&config)?;
            match path {
                Some(path) => {
                    engine.set_default_mount_path(&path).await?;
                    println!("Default mount root set to {}", path.display());
                }
                None => println!("{}", engine.snapshot().mount_root.display()),
            }
        }
        Commands::Mount { share } => {
            let engine = open_engine(&config)?;
            let id = resolve_share(&engine.snapshot(), &share)?;
            let outcome = engine.mount_share(id).await?;
            println!(
                "{}: {}",
                outcome.entry.status_label(),
                outcome.entry.message
            );
            if !outcome.success() {
                anyhow::bail!("Could not mount {}", share);
            }
        }
        Commands::Unmount { share } => {
            let engine = open_engine(&config)?;
            let id = resolve_share(&engine.snapshot(), &share)?;
            if engine.unmount_share(id).await? {
                println!("Unmounted {}", share);
            } else {
                println!("{} is not mounted", share);
            }
        }
        Commands::Check => {
            let engine = open_engine(&config)?;
            let shares = engine.detect_pass().await;
            print_shares(&shares);
        }
        Commands::Discover => {
            let engine = open_engine(&config)?;
            let system = engine.discover_system_shares().await;
            if system.is_empty() {
                println!("No network shares are mounted.");
                return Ok(());
            }

            let snapshot = engine.snapshot();
            for (name, url) in &system {
                let managed = snapshot
                    .shares
                    .iter()
                    .any(|s| s.remote_address.as_str() == url.as_str());
                let mount_point = engine
                    .locate_mount_point(name)
                    .await
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                println!(
                    "{:<20}  {:<40}  {:<24}  {}",
                    name,
                    url,
                    mount_point,
                    if managed { "managed" } else { "" }
                );
            }
        }
    }

    Ok(())
}
