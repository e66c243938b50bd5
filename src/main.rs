/// ClutchHub Live — Live-Match Engine
///
/// Co dělá:
///   1. Každých ~30s sweep: provider live pool × registered rosters
///   2. Correlated matches → BroadcastHub (global / per-team / per-player)
///   3. Každých ~5min úklid opponent snapshotů po retention window
///   4. WS fan-out pro připojené klienty
///
/// Bez FACEIT_API_KEY běží engine nad simulovanými daty (stejný tvar).
///
/// Spuštění:
///   cargo run --bin live-engine

use anyhow::{Context, Result};
use broadcast_hub::BroadcastHub;
use dotenv::dotenv;
use logger::{now_iso, EngineHeartbeatEvent, EventLogger};
use match_correlator::MatchCorrelator;
use match_provider::MatchDataProvider;
use poll_scheduler::PollingScheduler;
use roster_store::SqliteRosterStore;
use std::env;
use std::fs::File;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod ws_fanout;

fn env_secs(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("=== ClutchHub Live Engine ===");
    info!("Logs: ./logs/");

    // Single instance lock
    let lock_file_path = env::temp_dir().join("clutchhub_live_engine.lock");
    let lock_file = match File::create(&lock_file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to create lock file at {:?}: {}", lock_file_path, e);
            return Ok(());
        }
    };

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => {
            info!("Acquired single-instance lock.");
            guard
        }
        Err(_) => {
            warn!("Another instance of live-engine is already running! Exiting.");
            return Ok(());
        }
    };

    let sweep_interval_secs = env_secs("LIVE_SWEEP_INTERVAL_SECS", 30);
    let cleanup_interval_secs = env_secs("CLEANUP_INTERVAL_SECS", 300);
    let retention_secs = env_secs("OPPONENT_RETENTION_SECS", 300);
    info!("sweep: {sweep_interval_secs}s, cleanup: {cleanup_interval_secs}s, retention: {retention_secs}s");

    let roster_db = env::var("ROSTER_DB_PATH").unwrap_or_else(|_| "data/roster.db".to_string());
    SqliteRosterStore::init_schema(Path::new(&roster_db)).context("roster db init")?;
    info!("roster db: {roster_db}");

    let provider = Arc::new(MatchDataProvider::from_env("logs"));
    info!("match provider backend: {}", provider.backend_name());

    let hub = Arc::new(BroadcastHub::new());
    let correlator = Arc::new(
        MatchCorrelator::new(
            Arc::clone(&provider),
            Arc::new(SqliteRosterStore::new(&roster_db)),
            Arc::clone(&hub),
            Duration::from_secs(retention_secs),
        )
        .with_logger("logs"),
    );

    // WS fan-out for the real-time clients
    let ws_connections = Arc::new(AtomicUsize::new(0));
    {
        let bind = env::var("FANOUT_WS_BIND").unwrap_or_else(|_| "0.0.0.0:8085".to_string());
        let addr: SocketAddr = bind.parse().context("Invalid FANOUT_WS_BIND")?;
        let hub = Arc::clone(&hub);
        let ws_connections = Arc::clone(&ws_connections);
        tokio::spawn(async move {
            if let Err(e) = ws_fanout::run_ws_fanout(hub, addr, ws_connections).await {
                warn!("ws fan-out stopped: {e:#}");
            }
        });
    }

    let scheduler = PollingScheduler::new();

    {
        let correlator = Arc::clone(&correlator);
        scheduler.start(
            "live-sweep",
            Duration::from_secs(sweep_interval_secs),
            move || {
                let correlator = Arc::clone(&correlator);
                async move { correlator.run_sweep().await }
            },
        );
    }

    {
        let correlator = Arc::clone(&correlator);
        scheduler.start(
            "temp-cleanup",
            Duration::from_secs(cleanup_interval_secs),
            move || {
                let correlator = Arc::clone(&correlator);
                async move {
                    correlator.cleanup_temporary_opponent_data();
                    Ok(())
                }
            },
        );
    }

    // Heartbeat summary
    {
        let logger = EventLogger::new("logs");
        let ws_connections = Arc::clone(&ws_connections);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                let connections = ws_connections.load(Ordering::SeqCst);
                let _ = logger.log(&EngineHeartbeatEvent {
                    ts: now_iso(),
                    event: "ENGINE_HEARTBEAT",
                    ws_connections: connections,
                    sweep_interval_secs,
                    cleanup_interval_secs,
                });
                info!("HB: ws_conns={connections} (see logs/*.jsonl)");
            }
        });
    }

    tokio::signal::ctrl_c().await.context("ctrl-c handler")?;
    info!("shutdown requested, stopping scheduled tasks");
    scheduler.stop_all();

    Ok(())
}
