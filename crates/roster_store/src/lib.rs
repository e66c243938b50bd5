//! ClutchHub Live — Roster Store
//!
//! Read-only projection of registered teams and their players' provider-side
//! identities. Deliberately uncached: the correlator asks fresh every sweep
//! so a player removed from a team stops correlating on the very next cycle.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredTeam {
    pub team_id: String,
    pub name: String,
    /// provider-side player ids; correlation is a membership test on this set
    pub player_ids: HashSet<String>,
}

#[async_trait]
pub trait RosterDirectory: Send + Sync {
    async fn list_registered_teams(&self) -> Result<Vec<RegisteredTeam>>;
}

// ====================================================================
// Sqlite-backed projection (the platform DB side)
// ====================================================================

pub struct SqliteRosterStore {
    path: PathBuf,
}

impl SqliteRosterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Schema used by the platform's registration flow and the roster-seed
    /// helper. Safe to call on an existing database.
    pub fn init_schema(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path).context("open roster db")?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                team_id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS team_players (
                team_id TEXT NOT NULL REFERENCES teams(team_id),
                player_external_id TEXT NOT NULL,
                PRIMARY KEY (team_id, player_external_id)
            );

            CREATE INDEX IF NOT EXISTS idx_team_players_player
                ON team_players(player_external_id);
            "#,
        )
        .context("init roster schema")?;
        Ok(())
    }

    pub fn add_team(path: &Path, team_id: &str, name: &str, player_ids: &[&str]) -> Result<()> {
        let conn = Connection::open(path).context("open roster db")?;
        conn.execute(
            "INSERT OR REPLACE INTO teams(team_id, name) VALUES (?1, ?2)",
            rusqlite::params![team_id, name],
        )?;
        for pid in player_ids {
            conn.execute(
                "INSERT OR IGNORE INTO team_players(team_id, player_external_id) VALUES (?1, ?2)",
                rusqlite::params![team_id, pid],
            )?;
        }
        Ok(())
    }

    fn query_teams(path: &Path) -> Result<Vec<RegisteredTeam>> {
        let conn = Connection::open(path).context("open roster db")?;

        let mut by_id: HashMap<String, RegisteredTeam> = HashMap::new();
        {
            let mut stmt = conn.prepare("SELECT team_id, name FROM teams")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (team_id, name) = row?;
                by_id.insert(
                    team_id.clone(),
                    RegisteredTeam {
                        team_id,
                        name,
                        player_ids: HashSet::new(),
                    },
                );
            }
        }

        {
            let mut stmt =
                conn.prepare("SELECT team_id, player_external_id FROM team_players")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (team_id, player_id) = row?;
                if let Some(team) = by_id.get_mut(&team_id) {
                    team.player_ids.insert(player_id);
                }
            }
        }

        let mut teams: Vec<_> = by_id.into_values().collect();
        teams.sort_by(|a, b| a.team_id.cmp(&b.team_id));
        Ok(teams)
    }
}

#[async_trait]
impl RosterDirectory for SqliteRosterStore {
    async fn list_registered_teams(&self) -> Result<Vec<RegisteredTeam>> {
        let path = self.path.clone();
        // rusqlite is synchronous; keep the sweep's executor free
        tokio::task::spawn_blocking(move || Self::query_teams(&path))
            .await
            .context("roster query task failed")?
    }
}

// ====================================================================
// In-memory roster (tests, demos)
// ====================================================================

#[derive(Default)]
pub struct StaticRoster {
    teams: Vec<RegisteredTeam>,
}

impl StaticRoster {
    pub fn new(teams: Vec<RegisteredTeam>) -> Self {
        Self { teams }
    }

    pub fn team(team_id: &str, name: &str, player_ids: &[&str]) -> RegisteredTeam {
        RegisteredTeam {
            team_id: team_id.to_string(),
            name: name.to_string(),
            player_ids: player_ids.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl RosterDirectory for StaticRoster {
    async fn list_registered_teams(&self) -> Result<Vec<RegisteredTeam>> {
        Ok(self.teams.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("roster.db");

        SqliteRosterStore::init_schema(&db).unwrap();
        SqliteRosterStore::add_team(&db, "t1", "Prague Wolves", &["p1", "p2"]).unwrap();
        SqliteRosterStore::add_team(&db, "t2", "Nordic Five", &["p9"]).unwrap();

        let store = SqliteRosterStore::new(&db);
        let teams = store.list_registered_teams().await.unwrap();

        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].team_id, "t1");
        assert!(teams[0].player_ids.contains("p1"));
        assert!(teams[0].player_ids.contains("p2"));
        assert_eq!(teams[1].name, "Nordic Five");
    }

    #[tokio::test]
    async fn reads_are_fresh_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("roster.db");

        SqliteRosterStore::init_schema(&db).unwrap();
        let store = SqliteRosterStore::new(&db);
        assert!(store.list_registered_teams().await.unwrap().is_empty());

        // a registration that lands between sweeps is visible on the next read
        SqliteRosterStore::add_team(&db, "t1", "Iron Curtain", &["p5"]).unwrap();
        let teams = store.list_registered_teams().await.unwrap();
        assert_eq!(teams.len(), 1);
    }

    #[tokio::test]
    async fn static_roster_returns_configured_teams() {
        let roster = StaticRoster::new(vec![StaticRoster::team("t1", "Velvet Aces", &["p1"])]);
        let teams = roster.list_registered_teams().await.unwrap();
        assert_eq!(teams[0].name, "Velvet Aces");
    }
}
