/// ClutchHub Live — Provider Probe
///
/// One-shot smoke check of the match-data provider. Without FACEIT_API_KEY
/// it exercises the simulated backend, which is also useful for eyeballing
/// the synthetic shapes.
///
/// Spuštění:
///   cargo run --bin provider-probe -- <nickname>

use anyhow::Result;
use dotenv::dotenv;
use match_provider::MatchDataProvider;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let nickname = std::env::args().nth(1).unwrap_or_else(|| "s1mple".to_string());
    let provider = MatchDataProvider::from_env("logs");
    info!("probe backend: {}", provider.backend_name());

    let valid = provider.validate_nickname(&nickname).await?;
    info!("validate_nickname({nickname}) = {valid}");

    let profile = provider.get_player_profile(&nickname).await?;
    println!("{}", serde_json::to_string_pretty(&profile)?);

    let stats = provider.get_player_stats(&profile.player_id).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    let history = provider
        .get_player_match_history(&profile.player_id, 5, 0)
        .await?;
    info!("history: {} item(s)", history.items.len());

    let pool = provider.get_popular_live_matches().await?;
    info!("popular live pool: {} match(es)", pool.len());
    for m in &pool {
        info!(
            "  {} | {} vs {} | map {:?}{}",
            m.match_id,
            m.factions[0].name,
            m.factions[1].name,
            m.map,
            if m.simulated { " [simulated]" } else { "" },
        );
    }

    Ok(())
}
