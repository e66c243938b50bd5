//! ClutchHub Live — Broadcast Hub
//!
//! Typed events on named topics, fanned out over `tokio::sync::broadcast`.
//! Publishing is fire-and-forget: a topic nobody has subscribed to drops the
//! event without buffering and without erroring, which is what makes the hub
//! safe to call before the real-time transport is wired up.
//!
//! Ordering within one topic follows send order; nothing is promised across
//! topics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

const TOPIC_CAPACITY: usize = 256;

/// Topic names used by the live engine.
pub mod topics {
    /// global feed of correlated live matches
    pub const LIVE_MATCHES: &str = "live-matches";
    /// global announcements of newly registered teams
    pub const TEAM_REGISTERED: &str = "team-registered";

    pub fn team(team_id: &str) -> String {
        format!("team:{team_id}")
    }

    pub fn player(player_id: &str) -> String {
        format!("player:{player_id}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

pub struct BroadcastHub {
    topics: RwLock<HashMap<String, broadcast::Sender<BroadcastEvent>>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Publish `data` on `topic`. Returns how many subscribers received the
    /// event; 0 means it was dropped (no channel, or all receivers gone).
    pub fn publish(&self, topic: &str, event_type: &str, data: Value) -> usize {
        let event = BroadcastEvent {
            event_type: event_type.to_string(),
            data,
            timestamp: Utc::now(),
        };

        let topics = self.topics.read().unwrap();
        match topics.get(topic) {
            Some(tx) => {
                let delivered = tx.send(event).unwrap_or(0);
                debug!("publish {topic}/{event_type} -> {delivered} subscriber(s)");
                delivered
            }
            None => 0,
        }
    }

    /// Subscribe to `topic`, creating its channel on first use.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<BroadcastEvent> {
        let mut topics = self.topics.write().unwrap();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Platform hook: announce a freshly registered team on the global
    /// registration topic (REST controllers call this after the insert).
    pub fn announce_team_registered(&self, team_id: &str, name: &str) -> usize {
        self.publish(
            topics::TEAM_REGISTERED,
            "team_registered",
            serde_json::json!({ "team_id": team_id, "name": name }),
        )
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.read().unwrap();
        topics.get(topic).map_or(0, |tx| tx.receiver_count())
    }

    pub fn topic_count(&self) -> usize {
        self.topics.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.publish("nobody-home", "ping", json!({})), 0);

        // subscribing later does not replay anything
        let mut rx = hub.subscribe("nobody-home");
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let hub = BroadcastHub::new();
        let mut rx = hub.subscribe(topics::LIVE_MATCHES);

        hub.publish(topics::LIVE_MATCHES, "a", json!({"n": 1}));
        hub.publish(topics::LIVE_MATCHES, "b", json!({"n": 2}));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.event_type, "a");
        assert_eq!(second.event_type, "b");
        assert_eq!(second.data["n"], 2);
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let hub = BroadcastHub::new();
        let mut team_rx = hub.subscribe(&topics::team("t1"));
        let mut other_rx = hub.subscribe(&topics::team("t2"));

        let delivered = hub.publish(&topics::team("t1"), "team_live_match", json!({}));
        assert_eq!(delivered, 1);

        assert!(team_rx.recv().await.is_ok());
        assert!(matches!(
            other_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn team_registration_announcement_reaches_global_topic() {
        let hub = BroadcastHub::new();
        let mut rx = hub.subscribe(topics::TEAM_REGISTERED);

        hub.announce_team_registered("t42", "Velvet Aces");
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.event_type, "team_registered");
        assert_eq!(ev.data["team_id"], "t42");
        assert_eq!(ev.data["name"], "Velvet Aces");
    }

    #[tokio::test]
    async fn event_carries_type_data_timestamp() {
        let hub = BroadcastHub::new();
        let mut rx = hub.subscribe(topics::TEAM_REGISTERED);

        hub.publish(
            topics::TEAM_REGISTERED,
            "team_registered",
            json!({"team_id": "t9"}),
        );
        let ev = rx.recv().await.unwrap();

        let raw = serde_json::to_value(&ev).unwrap();
        assert_eq!(raw["type"], "team_registered");
        assert_eq!(raw["data"]["team_id"], "t9");
        assert!(raw["timestamp"].is_string());
    }
}
