//! ClutchHub Live — Match Correlator
//!
//! The sweep core: pulls the provider's live-match pool, cross-references
//! every faction roster against the registered-team roster (fetched fresh
//! each sweep, nikdy cached), and emits one `CorrelatedMatch` per
//! (match, registered team) pair. A match whose both factions belong to
//! registered teams yields two entries, each side seeing the other as the
//! opponent.
//!
//! For a non-registered opponent we snapshot its faction identity once and
//! keep serving that snapshot while the match stays live, so repeated sweeps
//! report a stable opponent instead of re-deriving it from a slightly
//! different provider payload each time. The snapshots are reaped only by
//! `cleanup_temporary_opponent_data`, and never while the match still shows
//! up in the live pool.

use anyhow::{Context, Result};
use broadcast_hub::{topics, BroadcastHub};
use chrono::{DateTime, Utc};
use logger::{now_iso, EventLogger, SweepCompletedEvent, TempCleanupEvent};
use match_provider::{MatchDataProvider, MatchFaction, ProviderMatch};
use roster_store::{RegisteredTeam, RosterDirectory};
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_OPPONENT_RETENTION: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempOpponentData {
    pub faction_name: String,
    pub avg_skill_level: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpponentInfo {
    pub registered: bool,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_data: Option<TempOpponentData>,
}

/// Derived per sweep, never persisted. Only the opponent snapshot inside
/// outlives the sweep (see module docs).
#[derive(Debug, Clone, Serialize)]
pub struct CorrelatedMatch {
    pub match_info: ProviderMatch,
    pub team: RegisteredTeam,
    /// roster players of `team` actually playing in this match
    pub matched_player_ids: Vec<String>,
    pub opponent: OpponentInfo,
}

struct TempEntry {
    data: TempOpponentData,
    last_seen_live: DateTime<Utc>,
}

#[derive(Default)]
struct SweepState {
    temp: HashMap<String, TempEntry>,
    /// match ids present in the most recent live pool
    live_now: HashSet<String>,
}

pub struct MatchCorrelator {
    provider: Arc<MatchDataProvider>,
    roster: Arc<dyn RosterDirectory>,
    hub: Arc<BroadcastHub>,
    logger: Option<EventLogger>,
    retention: Duration,
    state: Mutex<SweepState>,
}

fn avg_skill(faction: &MatchFaction) -> Option<f64> {
    let levels: Vec<u8> = faction.roster.iter().filter_map(|p| p.skill_level).collect();
    if levels.is_empty() {
        None
    } else {
        Some(levels.iter().map(|&l| l as f64).sum::<f64>() / levels.len() as f64)
    }
}

impl MatchCorrelator {
    pub fn new(
        provider: Arc<MatchDataProvider>,
        roster: Arc<dyn RosterDirectory>,
        hub: Arc<BroadcastHub>,
        retention: Duration,
    ) -> Self {
        Self {
            provider,
            roster,
            hub,
            logger: None,
            retention,
            state: Mutex::new(SweepState::default()),
        }
    }

    pub fn with_logger(mut self, log_dir: impl Into<std::path::PathBuf>) -> Self {
        self.logger = Some(EventLogger::new(log_dir));
        self
    }

    /// Correlate the current live pool against the registered rosters.
    /// Both snapshots are taken inside this call; nothing partial escapes.
    pub async fn get_filtered_live_matches(&self) -> Result<Vec<CorrelatedMatch>> {
        let (correlated, _, _) = self.correlate().await?;
        Ok(correlated)
    }

    async fn correlate(&self) -> Result<(Vec<CorrelatedMatch>, usize, usize)> {
        // roster first, always fresh — never correlate against yesterday's team
        let teams = self
            .roster
            .list_registered_teams()
            .await
            .context("roster fetch failed")?;
        let pool = self
            .provider
            .get_popular_live_matches()
            .await
            .context("live pool fetch failed")?;

        let now = Utc::now();
        let mut out = Vec::new();

        let mut state = self.state.lock().unwrap();
        state.live_now = pool
            .iter()
            .filter(|m| m.is_live())
            .map(|m| m.match_id.clone())
            .collect();

        for m in pool.iter().filter(|m| m.is_live()) {
            for (idx, faction) in m.factions.iter().enumerate() {
                let opposing = &m.factions[1 - idx];

                for team in &teams {
                    let matched: Vec<String> = faction
                        .roster
                        .iter()
                        .filter(|p| team.player_ids.contains(&p.player_id))
                        .map(|p| p.player_id.clone())
                        .collect();
                    if matched.is_empty() {
                        continue;
                    }

                    let opposing_team = teams.iter().find(|t| {
                        opposing
                            .roster
                            .iter()
                            .any(|p| t.player_ids.contains(&p.player_id))
                    });

                    let opponent = match opposing_team {
                        Some(t) => OpponentInfo {
                            registered: true,
                            display_name: t.name.clone(),
                            temp_data: None,
                        },
                        None => {
                            // first sweep snapshots the opponent; later sweeps
                            // of the same live match reuse it unchanged
                            let entry = state
                                .temp
                                .entry(m.match_id.clone())
                                .or_insert_with(|| TempEntry {
                                    data: TempOpponentData {
                                        faction_name: opposing.name.clone(),
                                        avg_skill_level: avg_skill(opposing),
                                        captured_at: now,
                                    },
                                    last_seen_live: now,
                                });
                            entry.last_seen_live = now;
                            OpponentInfo {
                                registered: false,
                                display_name: entry.data.faction_name.clone(),
                                temp_data: Some(entry.data.clone()),
                            }
                        }
                    };

                    out.push(CorrelatedMatch {
                        match_info: m.clone(),
                        team: team.clone(),
                        matched_player_ids: matched,
                        opponent,
                    });
                }
            }
        }

        debug!(
            "correlated {} of {} live matches against {} teams",
            out.len(),
            pool.len(),
            teams.len()
        );
        Ok((out, pool.len(), teams.len()))
    }

    /// One scheduler tick: correlate, then fan out. Publishes nothing when
    /// the correlation step fails — the cycle's output is all-or-nothing.
    pub async fn run_sweep(&self) -> Result<()> {
        let (correlated, pool_len, team_count) = self.correlate().await?;

        let mut published = 0usize;
        if !correlated.is_empty() {
            self.hub.publish(
                topics::LIVE_MATCHES,
                "live_matches_update",
                json!({ "registered_only": true, "matches": correlated }),
            );
            published += 1;

            for cm in &correlated {
                self.hub.publish(
                    &topics::team(&cm.team.team_id),
                    "team_live_match",
                    json!({ "registered_only": true, "match": cm }),
                );
                published += 1;

                for player_id in &cm.matched_player_ids {
                    self.hub.publish(
                        &topics::player(player_id),
                        "player_live_match",
                        json!({ "registered_only": true, "match": cm }),
                    );
                    published += 1;
                }
            }
        }

        if let Some(logger) = &self.logger {
            let _ = logger.log(&SweepCompletedEvent {
                ts: now_iso(),
                event: "SWEEP_COMPLETED",
                live_pool: pool_len,
                registered_teams: team_count,
                correlated: correlated.len(),
                published_events: published,
            });
        }

        info!(
            "sweep done: pool={pool_len} teams={team_count} correlated={} events={published}",
            correlated.len()
        );
        Ok(())
    }

    /// Reap opponent snapshots for matches not seen live for longer than the
    /// retention window. A match still present in the last live pool is kept
    /// no matter how old its snapshot is.
    pub fn cleanup_temporary_opponent_data(&self) -> usize {
        let retention = chrono::Duration::from_std(self.retention)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let now = Utc::now();

        let mut state = self.state.lock().unwrap();
        let live_now = std::mem::take(&mut state.live_now);
        let before = state.temp.len();
        state
            .temp
            .retain(|id, e| live_now.contains(id) || now - e.last_seen_live <= retention);
        let removed = before - state.temp.len();
        let retained = state.temp.len();
        state.live_now = live_now;
        drop(state);

        if removed > 0 {
            info!("temp cleanup: removed {removed}, retained {retained}");
        }
        if let Some(logger) = &self.logger {
            let _ = logger.log(&TempCleanupEvent {
                ts: now_iso(),
                event: "TEMP_CLEANUP",
                removed,
                retained,
            });
        }
        removed
    }

    pub fn temp_entry_count(&self) -> usize {
        self.state.lock().unwrap().temp.len()
    }

    #[cfg(test)]
    fn backdate_temp(&self, match_id: &str, secs: i64) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.temp.get_mut(match_id) {
            entry.last_seen_live = entry.last_seen_live - chrono::Duration::seconds(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use match_provider::{
        FactionPlayer, MatchHistoryPage, MatchStatus, PlayerProfile, PlayerStats,
        ProviderBackend,
    };
    use roster_store::StaticRoster;

    fn faction(name: &str, players: &[&str]) -> MatchFaction {
        MatchFaction {
            name: name.to_string(),
            roster: players
                .iter()
                .map(|p| FactionPlayer {
                    player_id: p.to_string(),
                    nickname: format!("nick-{p}"),
                    skill_level: Some(7),
                })
                .collect(),
            score: Some(0),
        }
    }

    fn live_match(id: &str, f1: MatchFaction, f2: MatchFaction) -> ProviderMatch {
        ProviderMatch {
            match_id: id.to_string(),
            status: MatchStatus::Live,
            factions: [f1, f2],
            map: Some("de_mirage".to_string()),
            started_at: Some(Utc::now()),
            finished_at: None,
            simulated: false,
        }
    }

    struct FixedPool {
        pool: Mutex<Vec<ProviderMatch>>,
    }

    impl FixedPool {
        fn new(pool: Vec<ProviderMatch>) -> Arc<Self> {
            Arc::new(Self {
                pool: Mutex::new(pool),
            })
        }

        fn set_pool(&self, pool: Vec<ProviderMatch>) {
            *self.pool.lock().unwrap() = pool;
        }
    }

    #[async_trait]
    impl ProviderBackend for FixedPool {
        async fn player_profile(&self, _: &str) -> Result<PlayerProfile> {
            unreachable!("not used by correlation")
        }
        async fn player_stats(&self, _: &str) -> Result<PlayerStats> {
            unreachable!("not used by correlation")
        }
        async fn match_history(&self, _: &str, _: u32, _: u32) -> Result<MatchHistoryPage> {
            unreachable!("not used by correlation")
        }
        async fn player_live_matches(&self, _: &str) -> Result<Vec<ProviderMatch>> {
            Ok(self.pool.lock().unwrap().clone())
        }
        async fn popular_live_matches(&self) -> Result<Vec<ProviderMatch>> {
            Ok(self.pool.lock().unwrap().clone())
        }
        async fn nickname_exists(&self, _: &str) -> Result<bool> {
            Ok(true)
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct BrokenPool;

    #[async_trait]
    impl ProviderBackend for BrokenPool {
        async fn player_profile(&self, _: &str) -> Result<PlayerProfile> {
            Err(anyhow!("down"))
        }
        async fn player_stats(&self, _: &str) -> Result<PlayerStats> {
            Err(anyhow!("down"))
        }
        async fn match_history(&self, _: &str, _: u32, _: u32) -> Result<MatchHistoryPage> {
            Err(anyhow!("down"))
        }
        async fn player_live_matches(&self, _: &str) -> Result<Vec<ProviderMatch>> {
            Err(anyhow!("down"))
        }
        async fn popular_live_matches(&self) -> Result<Vec<ProviderMatch>> {
            Err(anyhow!("down"))
        }
        async fn nickname_exists(&self, _: &str) -> Result<bool> {
            Err(anyhow!("down"))
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn correlator_with(
        backend: Arc<dyn ProviderBackend>,
        teams: Vec<RegisteredTeam>,
    ) -> (MatchCorrelator, Arc<BroadcastHub>) {
        let provider = Arc::new(MatchDataProvider::with_backend(backend, None));
        let hub = Arc::new(BroadcastHub::new());
        let correlator = MatchCorrelator::new(
            provider,
            Arc::new(StaticRoster::new(teams)),
            Arc::clone(&hub),
            Duration::from_secs(300),
        );
        (correlator, hub)
    }

    #[tokio::test]
    async fn one_registered_faction_yields_one_entry() {
        let backend = FixedPool::new(vec![live_match(
            "m1",
            faction("Team Alpha", &["p1", "p2"]),
            faction("Baltic Storm", &["x1", "x2"]),
        )]);
        let (correlator, _) = correlator_with(
            backend,
            vec![StaticRoster::team("t1", "Team Alpha", &["p1", "p9"])],
        );

        let result = correlator.get_filtered_live_matches().await.unwrap();
        assert_eq!(result.len(), 1);

        let cm = &result[0];
        assert_eq!(cm.match_info.match_id, "m1");
        assert_eq!(cm.team.team_id, "t1");
        assert_eq!(cm.matched_player_ids, vec!["p1".to_string()]);
        assert!(!cm.opponent.registered);
        assert_eq!(cm.opponent.display_name, "Baltic Storm");
        assert_eq!(
            cm.opponent.temp_data.as_ref().unwrap().avg_skill_level,
            Some(7.0)
        );
    }

    #[tokio::test]
    async fn both_sides_registered_yields_two_mirrored_entries() {
        let backend = FixedPool::new(vec![live_match(
            "m1",
            faction("A", &["p1"]),
            faction("B", &["p2"]),
        )]);
        let (correlator, _) = correlator_with(
            backend,
            vec![
                StaticRoster::team("t1", "Team One", &["p1"]),
                StaticRoster::team("t2", "Team Two", &["p2"]),
            ],
        );

        let mut result = correlator.get_filtered_live_matches().await.unwrap();
        assert_eq!(result.len(), 2);
        result.sort_by(|a, b| a.team.team_id.cmp(&b.team.team_id));

        assert!(result[0].opponent.registered);
        assert_eq!(result[0].opponent.display_name, "Team Two");
        assert!(result[1].opponent.registered);
        assert_eq!(result[1].opponent.display_name, "Team One");
        // no temp snapshot is retained when both sides are registered
        assert_eq!(correlator.temp_entry_count(), 0);
    }

    #[tokio::test]
    async fn non_live_matches_are_ignored() {
        let mut finished = live_match("m1", faction("A", &["p1"]), faction("B", &["x1"]));
        finished.status = MatchStatus::Finished;
        let backend = FixedPool::new(vec![finished]);
        let (correlator, _) =
            correlator_with(backend, vec![StaticRoster::team("t1", "Team One", &["p1"])]);

        assert!(correlator.get_filtered_live_matches().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn opponent_identity_is_stable_across_sweeps() {
        let backend = FixedPool::new(vec![live_match(
            "m1",
            faction("A", &["p1"]),
            faction("Baltic Storm", &["x1"]),
        )]);
        let (correlator, _) = correlator_with(
            backend.clone(),
            vec![StaticRoster::team("t1", "Team One", &["p1"])],
        );

        let first = correlator.get_filtered_live_matches().await.unwrap();
        assert_eq!(first[0].opponent.display_name, "Baltic Storm");

        // the provider renames the faction mid-match; our snapshot holds
        backend.set_pool(vec![live_match(
            "m1",
            faction("A", &["p1"]),
            faction("Baltic Storm Reborn", &["x1"]),
        )]);
        tokio::time::advance(Duration::from_secs(25)).await; // past the live TTL

        let second = correlator.get_filtered_live_matches().await.unwrap();
        assert_eq!(second[0].opponent.display_name, "Baltic Storm");
        assert_eq!(
            first[0].opponent.temp_data.as_ref().unwrap().captured_at,
            second[0].opponent.temp_data.as_ref().unwrap().captured_at,
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_reaps_departed_matches_only_after_retention() {
        let backend = FixedPool::new(vec![live_match(
            "m1",
            faction("A", &["p1"]),
            faction("B", &["x1"]),
        )]);
        let (correlator, _) = correlator_with(
            backend.clone(),
            vec![StaticRoster::team("t1", "Team One", &["p1"])],
        );

        correlator.get_filtered_live_matches().await.unwrap();
        assert_eq!(correlator.temp_entry_count(), 1);

        // match vanishes from the live pool
        backend.set_pool(vec![]);
        tokio::time::advance(Duration::from_secs(25)).await;
        correlator.get_filtered_live_matches().await.unwrap();

        // inside the retention window: snapshot survives
        assert_eq!(correlator.cleanup_temporary_opponent_data(), 0);
        assert_eq!(correlator.temp_entry_count(), 1);

        // past the window: reaped
        correlator.backdate_temp("m1", 600);
        assert_eq!(correlator.cleanup_temporary_opponent_data(), 1);
        assert_eq!(correlator.temp_entry_count(), 0);
    }

    #[tokio::test]
    async fn cleanup_never_touches_a_still_live_match() {
        let backend = FixedPool::new(vec![live_match(
            "m1",
            faction("A", &["p1"]),
            faction("B", &["x1"]),
        )]);
        let (correlator, _) =
            correlator_with(backend, vec![StaticRoster::team("t1", "Team One", &["p1"])]);

        correlator.get_filtered_live_matches().await.unwrap();
        // even an absurdly old snapshot stays while the match is live
        correlator.backdate_temp("m1", 86_400);
        assert_eq!(correlator.cleanup_temporary_opponent_data(), 0);
        assert_eq!(correlator.temp_entry_count(), 1);
    }

    #[tokio::test]
    async fn sweep_publishes_on_global_team_and_player_topics() {
        let backend = FixedPool::new(vec![live_match(
            "m1",
            faction("A", &["p1"]),
            faction("Baltic Storm", &["x1"]),
        )]);
        let (correlator, hub) = correlator_with(
            backend,
            vec![StaticRoster::team("t1", "Team One", &["p1"])],
        );

        let mut global_rx = hub.subscribe(topics::LIVE_MATCHES);
        let mut team_rx = hub.subscribe(&topics::team("t1"));
        let mut player_rx = hub.subscribe(&topics::player("p1"));

        correlator.run_sweep().await.unwrap();

        let global = global_rx.recv().await.unwrap();
        assert_eq!(global.event_type, "live_matches_update");
        assert_eq!(global.data["registered_only"], true);
        assert_eq!(global.data["matches"][0]["team"]["team_id"], "t1");
        assert_eq!(
            global.data["matches"][0]["opponent"]["display_name"],
            "Baltic Storm"
        );

        let team_ev = team_rx.recv().await.unwrap();
        assert_eq!(team_ev.event_type, "team_live_match");
        assert_eq!(team_ev.data["registered_only"], true);

        let player_ev = player_rx.recv().await.unwrap();
        assert_eq!(player_ev.event_type, "player_live_match");
        assert_eq!(player_ev.data["match"]["match_info"]["match_id"], "m1");
    }

    #[tokio::test]
    async fn failed_sweep_publishes_nothing() {
        let (correlator, hub) = correlator_with(
            Arc::new(BrokenPool),
            vec![StaticRoster::team("t1", "Team One", &["p1"])],
        );
        let mut global_rx = hub.subscribe(topics::LIVE_MATCHES);

        assert!(correlator.run_sweep().await.is_err());
        assert!(matches!(
            global_rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }
}
