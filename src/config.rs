use crate::types::RiskLevel;
use std::env;

/// Where market data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataMode {
    /// Seeded in-process random walk only.
    Synthetic,
    /// Binance first, synthetic on failure.
    Live,
}

/// Binance connection settings.
#[derive(Debug, Clone, Default)]
pub struct BinanceConfig {
    /// API key (optional, public endpoints work without).
    pub api_key: Option<String>,
    /// Use the Binance testnet endpoint.
    pub testnet: bool,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Starting cash for the portfolio.
    pub default_budget: f64,
    /// Absolute value below which trading stops.
    pub default_floor: f64,
    /// Risk profile for the portfolio.
    pub default_risk_profile: RiskLevel,
    /// Market data mode.
    pub market_data_mode: MarketDataMode,
    /// Binance settings (used in live mode).
    pub binance: BinanceConfig,
    /// SQLite database path; `None` disables persistence.
    pub database_path: Option<String>,
    /// Seed for synthetic prices and candles.
    pub synthetic_seed: u64,
    /// Synthetic price jitter as a fraction of price.
    pub synthetic_jitter_pct: f64,
    /// Decisions retained by the auto-trader.
    pub decision_log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_budget: 10.0,
            default_floor: 7.0,
            default_risk_profile: RiskLevel::Conservative,
            market_data_mode: MarketDataMode::Synthetic,
            binance: BinanceConfig::default(),
            database_path: Some("trading.db".to_string()),
            synthetic_seed: 42,
            synthetic_jitter_pct: 0.001,
            decision_log_capacity: 50,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let binance_api_key = lookup("BINANCE_API_KEY").filter(|k| !k.is_empty());
        let live_requested = lookup("MARKET_DATA_MODE")
            .map(|m| m.eq_ignore_ascii_case("live"))
            .unwrap_or(false);
        let market_data_mode = if live_requested || binance_api_key.is_some() {
            MarketDataMode::Live
        } else {
            MarketDataMode::Synthetic
        };

        // Empty path disables persistence
        let database_path = match lookup("TRADING_DB_PATH") {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(path),
            None => defaults.database_path.clone(),
        };

        Self {
            default_budget: lookup("TRADING_BUDGET")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_budget),
            default_floor: lookup("TRADING_FLOOR")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_floor),
            default_risk_profile: lookup("TRADING_RISK_PROFILE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_risk_profile),
            market_data_mode,
            binance: BinanceConfig {
                api_key: binance_api_key,
                testnet: lookup("BINANCE_TESTNET")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            },
            database_path,
            synthetic_seed: lookup("SYNTHETIC_SEED")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.synthetic_seed),
            synthetic_jitter_pct: lookup("SYNTHETIC_JITTER_PCT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.synthetic_jitter_pct),
            decision_log_capacity: lookup("DECISION_LOG_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.decision_log_capacity),
        }
    }
}
