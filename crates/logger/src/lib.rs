/// ClutchHub Live — Logger
/// JSONL operational event stream (one dated file per day under log_dir)

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event typy ────────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct SweepCompletedEvent {
    pub ts:               String,
    pub event:            &'static str,   // "SWEEP_COMPLETED"
    pub live_pool:        usize,          // matches in provider live pool
    pub registered_teams: usize,
    pub correlated:       usize,          // CorrelatedMatch entries emitted
    pub published_events: usize,
}

#[derive(Serialize, Debug)]
pub struct ProviderStatusEvent {
    pub ts:       String,
    pub event:    &'static str,   // "PROVIDER_STATUS"
    pub backend:  String,         // "faceit" | "simulated"
    pub method:   String,
    pub ok:       bool,
    pub fallback: bool,           // true when a real-call failure was answered synthetically
    pub message:  String,
}

#[derive(Serialize, Debug)]
pub struct TempCleanupEvent {
    pub ts:       String,
    pub event:    &'static str,   // "TEMP_CLEANUP"
    pub removed:  usize,
    pub retained: usize,
}

#[derive(Serialize, Debug)]
pub struct EngineHeartbeatEvent {
    pub ts:                  String,
    pub event:               &'static str,   // "ENGINE_HEARTBEAT"
    pub ws_connections:      usize,
    pub sweep_interval_secs: u64,
    pub cleanup_interval_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_jsonl_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let logger = EventLogger::new(dir.path());

        let ev = TempCleanupEvent {
            ts: now_iso(),
            event: "TEMP_CLEANUP",
            removed: 2,
            retained: 1,
        };
        logger.log(&ev).unwrap();
        logger.log(&ev).unwrap();

        let date = Utc::now().format("%Y-%m-%d").to_string();
        let content = fs::read_to_string(dir.path().join(format!("{date}.jsonl"))).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["event"], "TEMP_CLEANUP");
        assert_eq!(parsed["removed"], 2);
    }
}
