//! ClutchHub Live — Polling Scheduler
//!
//! Named periodic tasks. One live handle per name: a second `start` for a
//! running name is a no-op, `stop` on an unknown name is a no-op. A tick
//! handler runs to completion before the next tick fires, so a given task
//! never overlaps itself; a failed tick is logged and the schedule keeps
//! going.

use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct PollingScheduler {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl PollingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `task` under `name`, running once immediately and then every
    /// `interval`. Idempotent per name while the task is alive.
    pub fn start<F, Fut>(&self, name: &str, interval: Duration, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap();

        if let Some(handle) = tasks.get(name) {
            if !handle.is_finished() {
                debug!("scheduler: task '{name}' already running, start ignored");
                return;
            }
        }

        info!("scheduler: starting task '{name}' every {:?}", interval);
        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = task().await {
                    warn!("scheduler: task '{task_name}' tick failed: {e:#}");
                }
            }
        });

        tasks.insert(name.to_string(), handle);
    }

    pub fn stop(&self, name: &str) {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(handle) = tasks.remove(name) {
            handle.abort();
            info!("scheduler: task '{name}' stopped");
        }
    }

    pub fn stop_all(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for (name, handle) in tasks.drain() {
            handle.abort();
            info!("scheduler: task '{name}' stopped");
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        let tasks = self.tasks.lock().unwrap();
        tasks.get(name).is_some_and(|h| !h.is_finished())
    }

    pub fn running_tasks(&self) -> Vec<String> {
        let tasks = self.tasks.lock().unwrap();
        tasks
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for (_, handle) in tasks.drain() {
                handle.abort();
            }
        }
    }
}
