//! ClutchHub Live — Match Data Provider
//!
//! Client abstraction over the third-party match-data API (FACEIT Data API
//! v4 shape). Backend is picked once at construction:
//! - `FaceitClient` when `FACEIT_API_KEY` is configured
//! - `SimulatedClient` otherwise — deterministic synthetic data with the
//!   same shape, so downstream code never special-cases "provider down"
//!
//! Every call goes through a `ResponseCache` with a method-specific TTL;
//! the cache's single-flight guarantee is what keeps us inside the
//! provider's rate limits. A runtime upstream failure on the real backend
//! degrades to the generator for that call and is tagged in the result
//! (`simulated: true`) and in the PROVIDER_STATUS log stream.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use logger::{now_iso, EventLogger, ProviderStatusEvent};
use response_cache::ResponseCache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const PROFILE_TTL: Duration = Duration::from_secs(300);
pub const STATS_TTL: Duration = Duration::from_secs(300);
pub const HISTORY_TTL: Duration = Duration::from_secs(180);
pub const LIVE_TTL: Duration = Duration::from_secs(20);
pub const NICKNAME_TTL: Duration = Duration::from_secs(600);

const DEFAULT_API_BASE: &str = "https://open.faceit.com/data/v4";

// ====================================================================
// Domain types (immutable snapshots, never persisted by this crate)
// ====================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAccount {
    pub game: String,
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player_id: String,
    pub nickname: String,
    pub country: String,
    pub skill_level: u8,
    pub elo: u32,
    pub game_accounts: Vec<GameAccount>,
    #[serde(default)]
    pub simulated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player_id: String,
    pub matches_played: u32,
    pub win_rate_pct: f64,
    pub avg_kd: f64,
    /// most recent first, 1 = win
    pub recent_results: Vec<u8>,
    #[serde(default)]
    pub simulated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: String,
    pub game: String,
    pub teams: [String; 2],
    pub score: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchHistoryPage {
    pub items: Vec<MatchSummary>,
    pub offset: u32,
    pub limit: u32,
    #[serde(default)]
    pub simulated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionPlayer {
    pub player_id: String,
    pub nickname: String,
    pub skill_level: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFaction {
    pub name: String,
    pub roster: Vec<FactionPlayer>,
    pub score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMatch {
    pub match_id: String,
    pub status: MatchStatus,
    pub factions: [MatchFaction; 2],
    pub map: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub simulated: bool,
}

impl ProviderMatch {
    pub fn is_live(&self) -> bool {
        self.status == MatchStatus::Live
    }
}

// ====================================================================
// Backend trait — real vs. simulated, selected once at construction
// ====================================================================

#[async_trait]
pub trait ProviderBackend: Send + Sync {
    async fn player_profile(&self, nickname: &str) -> Result<PlayerProfile>;
    async fn player_stats(&self, player_id: &str) -> Result<PlayerStats>;
    async fn match_history(&self, player_id: &str, limit: u32, offset: u32)
        -> Result<MatchHistoryPage>;
    async fn player_live_matches(&self, player_id: &str) -> Result<Vec<ProviderMatch>>;
    async fn popular_live_matches(&self) -> Result<Vec<ProviderMatch>>;
    /// Ok(false) for an unknown nickname; Err only on transport/auth trouble
    async fn nickname_exists(&self, nickname: &str) -> Result<bool>;
    fn name(&self) -> &'static str;
}

// ====================================================================
// Real HTTP backend
// ====================================================================

/// First 120 chars of an upstream error body, cut on char boundaries so a
/// multi-byte payload cannot panic the error path.
fn body_snippet(body: &str) -> String {
    body.chars().take(120).collect()
}

pub struct FaceitClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl FaceitClient {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent("ClutchHubLive/1.0")
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.api_base, path);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .with_context(|| format!("provider request failed: {path}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "provider HTTP {status} on {path}: {}",
                body_snippet(&body)
            ));
        }
        resp.json().await.context("provider JSON decode failed")
    }

    fn parse_ts(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
        value
            .and_then(|v| v.as_i64())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    fn parse_faction(value: Option<&serde_json::Value>) -> MatchFaction {
        let name = value
            .and_then(|v| v.pointer("/name"))
            .and_then(|v| v.as_str())
            .unwrap_or("?")
            .to_string();
        let score = value
            .and_then(|v| v.pointer("/score"))
            .and_then(|v| v.as_u64())
            .map(|s| s as u32);

        let mut roster = Vec::new();
        if let Some(players) = value
            .and_then(|v| v.pointer("/roster"))
            .and_then(|v| v.as_array())
        {
            for p in players {
                let player_id = p.pointer("/player_id").and_then(|v| v.as_str());
                let nickname = p.pointer("/nickname").and_then(|v| v.as_str());
                if let (Some(id), Some(nick)) = (player_id, nickname) {
                    roster.push(FactionPlayer {
                        player_id: id.to_string(),
                        nickname: nick.to_string(),
                        skill_level: p
                            .pointer("/game_skill_level")
                            .and_then(|v| v.as_u64())
                            .map(|l| l as u8),
                    });
                }
            }
        }

        MatchFaction { name, roster, score }
    }

    fn parse_match(value: &serde_json::Value) -> Option<ProviderMatch> {
        let match_id = value.pointer("/match_id").and_then(|v| v.as_str())?;
        let status = match value
            .pointer("/status")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_ascii_uppercase()
            .as_str()
        {
            "ONGOING" | "LIVE" => MatchStatus::Live,
            "FINISHED" => MatchStatus::Finished,
            _ => MatchStatus::Scheduled,
        };

        Some(ProviderMatch {
            match_id: match_id.to_string(),
            status,
            factions: [
                Self::parse_faction(value.pointer("/teams/faction1")),
                Self::parse_faction(value.pointer("/teams/faction2")),
            ],
            map: value
                .pointer("/voting/map/pick/0")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            started_at: Self::parse_ts(value.pointer("/started_at")),
            finished_at: Self::parse_ts(value.pointer("/finished_at")),
            simulated: false,
        })
    }

    fn parse_match_list(value: &serde_json::Value) -> Vec<ProviderMatch> {
        value
            .pointer("/items")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(Self::parse_match).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProviderBackend for FaceitClient {
    async fn player_profile(&self, nickname: &str) -> Result<PlayerProfile> {
        let body = self.get_json(&format!("/players?nickname={nickname}")).await?;

        let player_id = body
            .pointer("/player_id")
            .and_then(|v| v.as_str())
            .context("provider profile missing player_id")?;

        let mut game_accounts = Vec::new();
        if let Some(games) = body.pointer("/games").and_then(|v| v.as_object()) {
            for (game, info) in games {
                if let Some(acc) = info.pointer("/game_player_id").and_then(|v| v.as_str()) {
                    game_accounts.push(GameAccount {
                        game: game.clone(),
                        account_id: acc.to_string(),
                    });
                }
            }
        }

        Ok(PlayerProfile {
            player_id: player_id.to_string(),
            nickname: body
                .pointer("/nickname")
                .and_then(|v| v.as_str())
                .unwrap_or(nickname)
                .to_string(),
            country: body
                .pointer("/country")
                .and_then(|v| v.as_str())
                .unwrap_or("?")
                .to_string(),
            skill_level: body
                .pointer("/games/cs2/skill_level")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u8,
            elo: body
                .pointer("/games/cs2/faceit_elo")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            game_accounts,
            simulated: false,
        })
    }

    async fn player_stats(&self, player_id: &str) -> Result<PlayerStats> {
        let body = self
            .get_json(&format!("/players/{player_id}/stats/cs2"))
            .await?;
        let lifetime = body.pointer("/lifetime");

        let str_stat = |key: &str| -> Option<String> {
            lifetime
                .and_then(|l| l.pointer(&format!("/{key}")))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Ok(PlayerStats {
            player_id: player_id.to_string(),
            matches_played: str_stat("Matches")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            win_rate_pct: str_stat("Win Rate %")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
            avg_kd: str_stat("Average K/D Ratio")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
            recent_results: lifetime
                .and_then(|l| l.pointer("/Recent Results"))
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str())
                        .filter_map(|s| s.parse().ok())
                        .collect()
                })
                .unwrap_or_default(),
            simulated: false,
        })
    }

    async fn match_history(
        &self,
        player_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<MatchHistoryPage> {
        let body = self
            .get_json(&format!(
                "/players/{player_id}/history?game=cs2&offset={offset}&limit={limit}"
            ))
            .await?;

        let mut items = Vec::new();
        if let Some(arr) = body.pointer("/items").and_then(|v| v.as_array()) {
            for it in arr {
                let match_id = it.pointer("/match_id").and_then(|v| v.as_str());
                if let Some(id) = match_id {
                    items.push(MatchSummary {
                        match_id: id.to_string(),
                        game: it
                            .pointer("/game_id")
                            .and_then(|v| v.as_str())
                            .unwrap_or("cs2")
                            .to_string(),
                        teams: [
                            it.pointer("/teams/faction1/nickname")
                                .and_then(|v| v.as_str())
                                .unwrap_or("?")
                                .to_string(),
                            it.pointer("/teams/faction2/nickname")
                                .and_then(|v| v.as_str())
                                .unwrap_or("?")
                                .to_string(),
                        ],
                        score: it
                            .pointer("/results/score")
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        started_at: Self::parse_ts(it.pointer("/started_at")),
                        finished_at: Self::parse_ts(it.pointer("/finished_at")),
                    });
                }
            }
        }

        Ok(MatchHistoryPage {
            items,
            offset,
            limit,
            simulated: false,
        })
    }

    async fn player_live_matches(&self, player_id: &str) -> Result<Vec<ProviderMatch>> {
        let body = self
            .get_json(&format!("/players/{player_id}/matches?state=ONGOING"))
            .await?;
        Ok(Self::parse_match_list(&body))
    }

    async fn popular_live_matches(&self) -> Result<Vec<ProviderMatch>> {
        let body = self.get_json("/matches/live?game=cs2&limit=50").await?;
        Ok(Self::parse_match_list(&body))
    }

    async fn nickname_exists(&self, nickname: &str) -> Result<bool> {
        let url = format!("{}/players?nickname={nickname}", self.api_base);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("provider nickname lookup failed")?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            s => Err(anyhow!("provider HTTP {s} on nickname lookup")),
        }
    }

    fn name(&self) -> &'static str {
        "faceit"
    }
}

// ====================================================================
// Simulated backend — deterministic synthetic data
// ====================================================================

const SIM_COUNTRIES: [&str; 8] = ["cz", "de", "se", "fr", "pl", "dk", "fi", "ua"];
const SIM_TEAM_POOL: [&str; 6] = [
    "Prague Wolves",
    "Nordic Five",
    "Iron Curtain",
    "Baltic Storm",
    "Velvet Aces",
    "Danube Kings",
];
const SIM_MAP_POOL: [&str; 4] = ["de_mirage", "de_inferno", "de_ancient", "de_nuke"];

/// FNV-1a; stable across runs so the same input always yields the same data
fn stable_hash(input: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in input.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

#[derive(Default)]
pub struct SimulatedClient;

impl SimulatedClient {
    pub fn new() -> Self {
        Self
    }

    fn sim_faction(team_name: &str) -> MatchFaction {
        let team_slug = slug(team_name);
        let h = stable_hash(team_name);
        MatchFaction {
            name: team_name.to_string(),
            roster: (1u64..=5)
                .map(|n| FactionPlayer {
                    player_id: format!("sim-{team_slug}-p{n}"),
                    nickname: format!("{team_name} #{n}"),
                    skill_level: Some((1 + (h.wrapping_add(n) % 10)) as u8),
                })
                .collect(),
            score: Some((h % 13) as u32),
        }
    }

    fn sim_match(match_id: &str, team_a: &str, team_b: &str) -> ProviderMatch {
        let h = stable_hash(match_id);
        ProviderMatch {
            match_id: match_id.to_string(),
            status: MatchStatus::Live,
            factions: [Self::sim_faction(team_a), Self::sim_faction(team_b)],
            map: Some(SIM_MAP_POOL[(h % 4) as usize].to_string()),
            started_at: Some(Utc::now() - ChronoDuration::minutes((5 + h % 30) as i64)),
            finished_at: None,
            simulated: true,
        }
    }
}

#[async_trait]
impl ProviderBackend for SimulatedClient {
    async fn player_profile(&self, nickname: &str) -> Result<PlayerProfile> {
        let h = stable_hash(nickname);
        Ok(PlayerProfile {
            player_id: format!("sim-{:016x}", h),
            nickname: nickname.to_string(),
            country: SIM_COUNTRIES[(h % 8) as usize].to_string(),
            skill_level: (1 + h % 10) as u8,
            elo: (801 + h % 2000) as u32,
            game_accounts: vec![GameAccount {
                game: "cs2".to_string(),
                account_id: format!("sim-steam-{:x}", h >> 16),
            }],
            simulated: true,
        })
    }

    async fn player_stats(&self, player_id: &str) -> Result<PlayerStats> {
        let h = stable_hash(player_id);
        Ok(PlayerStats {
            player_id: player_id.to_string(),
            matches_played: (50 + h % 950) as u32,
            win_rate_pct: 40.0 + (h % 2000) as f64 / 100.0,
            avg_kd: 0.85 + (h % 60) as f64 / 100.0,
            recent_results: (0..5).map(|i| ((h >> i) & 1) as u8).collect(),
            simulated: true,
        })
    }

    async fn match_history(
        &self,
        player_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<MatchHistoryPage> {
        let h = stable_hash(player_id);
        let items = (0..limit)
            .map(|i| {
                let n = offset + i;
                let a = SIM_TEAM_POOL[((h.wrapping_add(n as u64)) % 6) as usize];
                let b = SIM_TEAM_POOL[((h.wrapping_add(n as u64 + 3)) % 6) as usize];
                MatchSummary {
                    match_id: format!("sim-hist-{player_id}-{n}"),
                    game: "cs2".to_string(),
                    teams: [a.to_string(), b.to_string()],
                    score: format!("{} / {}", 16, (h.wrapping_add(n as u64)) % 15),
                    started_at: Some(Utc::now() - ChronoDuration::days(n as i64 + 1)),
                    finished_at: Some(Utc::now() - ChronoDuration::days(n as i64)),
                }
            })
            .collect();

        Ok(MatchHistoryPage {
            items,
            offset,
            limit,
            simulated: true,
        })
    }

    async fn player_live_matches(&self, player_id: &str) -> Result<Vec<ProviderMatch>> {
        let mut m = Self::sim_match(
            &format!("sim-live-{player_id}"),
            SIM_TEAM_POOL[0],
            SIM_TEAM_POOL[1],
        );
        // the asked-about player plays in faction1
        m.factions[0].roster[0] = FactionPlayer {
            player_id: player_id.to_string(),
            nickname: format!("sim-{player_id}"),
            skill_level: Some((1 + stable_hash(player_id) % 10) as u8),
        };
        Ok(vec![m])
    }

    async fn popular_live_matches(&self) -> Result<Vec<ProviderMatch>> {
        Ok(vec![
            Self::sim_match("sim-match-1", SIM_TEAM_POOL[0], SIM_TEAM_POOL[1]),
            Self::sim_match("sim-match-2", SIM_TEAM_POOL[2], SIM_TEAM_POOL[3]),
            Self::sim_match("sim-match-3", SIM_TEAM_POOL[4], SIM_TEAM_POOL[5]),
        ])
    }

    async fn nickname_exists(&self, nickname: &str) -> Result<bool> {
        Ok(!nickname.trim().is_empty())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

// ====================================================================
// Public provider — caching + fallback wiring
// ====================================================================

pub struct MatchDataProvider {
    primary: Arc<dyn ProviderBackend>,
    /// present only when the primary is a real client
    fallback: Option<SimulatedClient>,
    logger: Option<EventLogger>,

    profile_cache: ResponseCache<PlayerProfile>,
    stats_cache: ResponseCache<PlayerStats>,
    history_cache: ResponseCache<MatchHistoryPage>,
    live_cache: ResponseCache<Vec<ProviderMatch>>,
    nickname_cache: ResponseCache<bool>,
}

impl MatchDataProvider {
    /// Backend selection happens here, once: a configured `FACEIT_API_KEY`
    /// means the real client, anything else means the generator. An absent
    /// key is an expected configuration state, not an error.
    pub fn from_env(log_dir: impl Into<std::path::PathBuf>) -> Self {
        let api_key = std::env::var("FACEIT_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let api_base = std::env::var("FACEIT_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        match api_key {
            Some(key) => {
                debug!("match provider: real backend (base {api_base})");
                Self::build(
                    Arc::new(FaceitClient::new(key, api_base)),
                    Some(SimulatedClient::new()),
                    Some(EventLogger::new(log_dir)),
                )
            }
            None => {
                warn!("FACEIT_API_KEY not set — serving simulated match data");
                Self::build(
                    Arc::new(SimulatedClient::new()),
                    None,
                    Some(EventLogger::new(log_dir)),
                )
            }
        }
    }

    /// Direct backend injection (tests, probes).
    pub fn with_backend(
        primary: Arc<dyn ProviderBackend>,
        fallback: Option<SimulatedClient>,
    ) -> Self {
        Self::build(primary, fallback, None)
    }

    pub fn simulated() -> Self {
        Self::build(Arc::new(SimulatedClient::new()), None, None)
    }

    fn build(
        primary: Arc<dyn ProviderBackend>,
        fallback: Option<SimulatedClient>,
        logger: Option<EventLogger>,
    ) -> Self {
        Self {
            primary,
            fallback,
            logger,
            profile_cache: ResponseCache::new("profile"),
            stats_cache: ResponseCache::new("stats"),
            history_cache: ResponseCache::new("history"),
            live_cache: ResponseCache::new("live"),
            nickname_cache: ResponseCache::new("nickname"),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.primary.name()
    }

    fn log_status(&self, method: &str, ok: bool, fallback: bool, message: &str) {
        if let Some(logger) = &self.logger {
            let _ = logger.log(&ProviderStatusEvent {
                ts: now_iso(),
                event: "PROVIDER_STATUS",
                backend: self.primary.name().to_string(),
                method: method.to_string(),
                ok,
                fallback,
                message: message.to_string(),
            });
        }
    }

    pub async fn get_player_profile(&self, nickname: &str) -> Result<PlayerProfile> {
        let key = format!("profile:{nickname}");
        self.profile_cache
            .get_or_fetch(&key, PROFILE_TTL, || async {
                match self.primary.player_profile(nickname).await {
                    Ok(p) => {
                        self.log_status("player_profile", true, false, "ok");
                        Ok(p)
                    }
                    Err(e) => match &self.fallback {
                        Some(sim) => {
                            warn!("player_profile({nickname}) failed, serving simulated: {e:#}");
                            self.log_status("player_profile", false, true, &format!("{e:#}"));
                            sim.player_profile(nickname).await
                        }
                        None => Err(e),
                    },
                }
            })
            .await
    }

    pub async fn get_player_stats(&self, player_id: &str) -> Result<PlayerStats> {
        let key = format!("stats:{player_id}");
        self.stats_cache
            .get_or_fetch(&key, STATS_TTL, || async {
                match self.primary.player_stats(player_id).await {
                    Ok(s) => {
                        self.log_status("player_stats", true, false, "ok");
                        Ok(s)
                    }
                    Err(e) => match &self.fallback {
                        Some(sim) => {
                            warn!("player_stats({player_id}) failed, serving simulated: {e:#}");
                            self.log_status("player_stats", false, true, &format!("{e:#}"));
                            sim.player_stats(player_id).await
                        }
                        None => Err(e),
                    },
                }
            })
            .await
    }

    pub async fn get_player_match_history(
        &self,
        player_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<MatchHistoryPage> {
        let key = format!("history:{player_id}:{limit}:{offset}");
        self.history_cache
            .get_or_fetch(&key, HISTORY_TTL, || async {
                match self.primary.match_history(player_id, limit, offset).await {
                    Ok(h) => {
                        self.log_status("match_history", true, false, "ok");
                        Ok(h)
                    }
                    Err(e) => match &self.fallback {
                        Some(sim) => {
                            warn!("match_history({player_id}) failed, serving simulated: {e:#}");
                            self.log_status("match_history", false, true, &format!("{e:#}"));
                            sim.match_history(player_id, limit, offset).await
                        }
                        None => Err(e),
                    },
                }
            })
            .await
    }

    pub async fn get_player_live_matches(&self, player_id: &str) -> Result<Vec<ProviderMatch>> {
        let key = format!("live:player:{player_id}");
        self.live_cache
            .get_or_fetch(&key, LIVE_TTL, || async {
                match self.primary.player_live_matches(player_id).await {
                    Ok(m) => {
                        self.log_status("player_live_matches", true, false, "ok");
                        Ok(m)
                    }
                    Err(e) => match &self.fallback {
                        Some(sim) => {
                            warn!("player_live_matches({player_id}) failed, serving simulated: {e:#}");
                            self.log_status("player_live_matches", false, true, &format!("{e:#}"));
                            sim.player_live_matches(player_id).await
                        }
                        None => Err(e),
                    },
                }
            })
            .await
    }

    pub async fn get_popular_live_matches(&self) -> Result<Vec<ProviderMatch>> {
        self.live_cache
            .get_or_fetch("live:popular", LIVE_TTL, || async {
                match self.primary.popular_live_matches().await {
                    Ok(m) => {
                        self.log_status("popular_live_matches", true, false, "ok");
                        Ok(m)
                    }
                    Err(e) => match &self.fallback {
                        Some(sim) => {
                            warn!("popular_live_matches failed, serving simulated: {e:#}");
                            self.log_status("popular_live_matches", false, true, &format!("{e:#}"));
                            sim.popular_live_matches().await
                        }
                        None => Err(e),
                    },
                }
            })
            .await
    }

    /// Unknown nickname is `Ok(false)`, not an error. Transport/auth
    /// failures are the one place this provider does not fall back.
    pub async fn validate_nickname(&self, nickname: &str) -> Result<bool> {
        let key = format!("nickname:{nickname}");
        self.nickname_cache
            .get_or_fetch(&key, NICKNAME_TTL, || async {
                let result = self.primary.nickname_exists(nickname).await;
                match &result {
                    Ok(found) => self.log_status(
                        "validate_nickname",
                        true,
                        false,
                        if *found { "found" } else { "not_found" },
                    ),
                    Err(e) => self.log_status("validate_nickname", false, false, &format!("{e:#}")),
                }
                result
            })
            .await
    }
}
