//! ClutchHub Live — Response Cache
//!
//! TTL cache sitting in front of the match-data provider. Dvě pravidla:
//! - expiry is lazy (an entry is absent the instant its deadline passes, no
//!   background sweep, no LRU — the key space is small and bounded)
//! - at most one in-flight fetch per key: concurrent `get_or_fetch` callers
//!   for the same missing/expired key await the first caller's result
//!   instead of issuing duplicate upstream calls.
//!
//! A failed fetch is never papered over with a stale entry; the caller gets
//! the error and decides what to do with it.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};
use tracing::debug;

struct CacheEntry<T> {
    value: T,
    expires_at: Instant,
}

struct CacheState<T> {
    entries: HashMap<String, CacheEntry<T>>,
    // one broadcast sender per key currently being fetched
    inflight: HashMap<String, broadcast::Sender<Result<T, String>>>,
}

pub struct ResponseCache<T> {
    name: &'static str,
    state: Mutex<CacheState<T>>,
}

enum Role<T> {
    Hit(T),
    Waiter(broadcast::Receiver<Result<T, String>>),
    Leader(broadcast::Sender<Result<T, String>>),
}

/// Releases an in-flight registration if the leader's future is dropped
/// before the fetch completes (task aborted mid-fetch). Removing the key
/// also drops the map's sender clone, so waiters see the channel close
/// instead of parking on it forever, and the next caller becomes leader.
struct InflightGuard<'a, T> {
    state: &'a Mutex<CacheState<T>>,
    key: &'a str,
    armed: bool,
}

impl<T> Drop for InflightGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            if let Ok(mut state) = self.state.lock() {
                state.inflight.remove(self.key);
            }
        }
    }
}

impl<T: Clone + Send + 'static> ResponseCache<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                inflight: HashMap::new(),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let state = self.state.lock().unwrap();
        state
            .entries
            .get(key)
            .filter(|e| Instant::now() < e.expires_at)
            .map(|e| e.value.clone())
    }

    pub fn insert(&self, key: &str, value: T, ttl: Duration) {
        let mut state = self.state.lock().unwrap();
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Return the cached value for `key`, or run `fetch` and cache its
    /// result for `ttl`. Callers that arrive while a fetch for the same key
    /// is pending share that fetch's outcome, success or failure.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let role = {
            let mut state = self.state.lock().unwrap();

            let fresh = state
                .entries
                .get(key)
                .filter(|e| Instant::now() < e.expires_at)
                .map(|e| e.value.clone());

            if let Some(value) = fresh {
                Role::Hit(value)
            } else if let Some(tx) = state.inflight.get(key) {
                Role::Waiter(tx.subscribe())
            } else {
                // capacity 1 — exactly one message ever travels per fetch
                let (tx, _) = broadcast::channel(1);
                state.inflight.insert(key.to_string(), tx.clone());
                Role::Leader(tx)
            }
        };

        match role {
            Role::Hit(value) => Ok(value),

            Role::Waiter(mut rx) => {
                debug!("cache {}: joining in-flight fetch for {key}", self.name);
                match rx.recv().await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(msg)) => Err(anyhow!("{msg}")),
                    Err(_) => Err(anyhow!(
                        "cache {}: in-flight fetch for {key} was dropped",
                        self.name
                    )),
                }
            }

            Role::Leader(tx) => {
                let mut guard = InflightGuard {
                    state: &self.state,
                    key,
                    armed: true,
                };
                let result = fetch().await;
                guard.armed = false;

                let mut state = self.state.lock().unwrap();
                state.inflight.remove(key);
                match &result {
                    Ok(value) => {
                        state.entries.insert(
                            key.to_string(),
                            CacheEntry {
                                value: value.clone(),
                                expires_at: Instant::now() + ttl,
                            },
                        );
                        let _ = tx.send(Ok(value.clone()));
                    }
                    Err(e) => {
                        // drop any expired leftover so waiters and later
                        // callers see the same miss we saw
                        state.entries.remove(key);
                        let _ = tx.send(Err(format!("{e:#}")));
                    }
                }
                result
            }
        }
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap();
        let now = Instant::now();
        state
            .entries
            .values()
            .filter(|e| now < e.expires_at)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
