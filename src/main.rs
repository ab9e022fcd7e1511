use papertrader::types::TradingPreferences;
use papertrader::{EngineConfig, TradingSystem};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_USER: &str = "default";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "papertrader=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    info!(
        "Starting paper trader: budget ${:.2}, floor ${:.2}, {} risk, {:?} market data",
        config.default_budget,
        config.default_floor,
        config.default_risk_profile,
        config.market_data_mode
    );

    let system = TradingSystem::new(&config)?;

    // Stored preferences win over defaults
    let mut prefs = match system.load_preferences(DEFAULT_USER) {
        Ok(Some(prefs)) => prefs,
        Ok(None) => TradingPreferences::default_for(DEFAULT_USER),
        Err(e) => {
            warn!("Failed to load stored preferences: {}, using defaults", e);
            TradingPreferences::default_for(DEFAULT_USER)
        }
    };
    prefs.auto_trade = true;
    system.set_preferences(prefs)?;

    let mut events = system.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => info!("Event: {}", json),
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
        }
    });

    system.start_auto_trading().await?;
    info!("Auto-trading running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    let status = system.stop_auto_trading().await?;
    info!("Auto-trader: {}", serde_json::to_string_pretty(&status)?);
    let portfolio = system.status().await;
    info!("Portfolio: {}", serde_json::to_string_pretty(&portfolio)?);

    Ok(())
}
