//! # pulsed: Pulse Telemetry Daemon
//!
//! Composition root for the sync engine. Owns the lifecycle of the record
//! store and the sync agent; everything else is dependency-injected from
//! here.
//!
//! ## Startup Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Parse CLI args                                                      │
//! │  2. Init tracing (RUST_LOG-aware)                                       │
//! │  3. Load sync config (TOML file + PULSE_* env overrides)                │
//! │  4. Open the record store (creates file + runs migrations)              │
//! │  5. Start the sync agent (spawns all engine tasks)                      │
//! │  6. Log status on an interval until ctrl-c                              │
//! │  7. Graceful shutdown (store is left intact for the next run)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use directories::ProjectDirs;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pulse_db::{Database, DbConfig};
use pulse_sync::{SyncAgent, SyncConfig};

/// Pulse telemetry daemon: buffers sensor readings durably and syncs them
/// to the ingestion service.
#[derive(Debug, Parser)]
#[command(name = "pulsed", version, about)]
struct Args {
    /// Path to the sync config TOML (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the SQLite record store (defaults to the platform data dir).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Seconds between status log lines (0 disables).
    #[arg(long, default_value_t = 60)]
    status_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_tracing();
    info!("Starting pulsed");

    // Configuration: file + environment overrides.
    let config = SyncConfig::load(args.config.clone())?;

    // Record store.
    let db_path = resolve_db_path(args.db_path.clone())?;
    info!(path = %db_path.display(), "Opening record store");
    let db = Database::new(DbConfig::new(db_path)).await?;

    // Sync engine.
    let agent = SyncAgent::start(config, db.clone()).await?;

    // Status heartbeat for operators.
    if args.status_interval > 0 {
        let interval = std::time::Duration::from_secs(args.status_interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // skip the immediate first tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match agent.status().await {
                        Ok(status) => info!(
                            state = %status.connection_state,
                            unsynced = status.total_unsynced(),
                            pending_acks = status.pending_acks,
                            "Sync status"
                        ),
                        Err(e) => error!(error = %e, "Failed to read sync status"),
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    } else {
        tokio::signal::ctrl_c().await?;
    }

    info!("Shutting down");
    agent.shutdown().await;
    db.close().await;
    info!("Goodbye");

    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - show debug messages
/// - `RUST_LOG=pulse_sync=trace` - trace the sync engine only
/// - Default: INFO, with sqlx quieted down
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Determines the record store path.
///
/// ## Resolution Order
/// 1. `--db-path` flag
/// 2. `PULSE_DB_PATH` environment variable
/// 3. Platform data directory (e.g. `~/.local/share/pulse/pulse.db`)
fn resolve_db_path(flag: Option<PathBuf>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = flag {
        return Ok(path);
    }

    if let Ok(path) = std::env::var("PULSE_DB_PATH") {
        return Ok(PathBuf::from(path));
    }

    let dirs = ProjectDirs::from("io", "pulse", "telemetry")
        .ok_or("could not determine platform data directory")?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;

    Ok(data_dir.join("pulse.db"))
}
