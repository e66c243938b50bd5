/// ClutchHub Live — Roster Seed
///
/// Vytvoří lokální roster projekci a nasype do ní demo týmy, aby šel
/// live-engine vyzkoušet bez platformové DB. Player ids odpovídají
/// simulovanému live poolu (sim-<team-slug>-pN), takže sweep hned koreluje.
///
/// Spuštění:
///   cargo run --bin roster-seed

use anyhow::{Context, Result};
use roster_store::{RosterDirectory, SqliteRosterStore};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let db = std::env::var("ROSTER_DB_PATH").unwrap_or_else(|_| "data/roster.db".to_string());
    let path = Path::new(&db);

    SqliteRosterStore::init_schema(path).context("init roster schema")?;
    SqliteRosterStore::add_team(
        path,
        "demo-wolves",
        "Prague Wolves",
        &[
            "sim-prague-wolves-p1",
            "sim-prague-wolves-p2",
            "sim-prague-wolves-p3",
        ],
    )?;
    SqliteRosterStore::add_team(
        path,
        "demo-storm",
        "Baltic Storm",
        &["sim-baltic-storm-p1", "sim-baltic-storm-p2"],
    )?;

    let store = SqliteRosterStore::new(path);
    let teams = store.list_registered_teams().await?;
    println!("seeded {} team(s) into {db}:", teams.len());
    for t in &teams {
        println!("  {} ({}) — {} player(s)", t.name, t.team_id, t.player_ids.len());
    }

    Ok(())
}
