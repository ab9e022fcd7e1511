use super::trading::{ParseNameError, RiskLevel};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// How often and how eagerly the autonomous loop trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingStyle {
    DayTrading,
    Swing,
    Hold,
    Hft,
}

impl TradingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingStyle::DayTrading => "day_trading",
            TradingStyle::Swing => "swing",
            TradingStyle::Hold => "hold",
            TradingStyle::Hft => "hft",
        }
    }

    /// Loop interval for this style.
    pub fn interval(&self) -> Duration {
        match self {
            TradingStyle::Hft => Duration::from_secs(10),
            TradingStyle::DayTrading => Duration::from_secs(30),
            TradingStyle::Hold => Duration::from_secs(300),
            TradingStyle::Swing => Duration::from_secs(60),
        }
    }
}

impl std::fmt::Display for TradingStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingStyle {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day_trading" => Ok(TradingStyle::DayTrading),
            "swing" => Ok(TradingStyle::Swing),
            "hold" => Ok(TradingStyle::Hold),
            "hft" => Ok(TradingStyle::Hft),
            other => Err(ParseNameError::Style(other.to_string())),
        }
    }
}

/// Preference validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreferencesError {
    #[error("user_id is required")]
    MissingUser,

    #[error("at least one asset must be specified")]
    NoAssets,

    #[error("profit_target must be between 0 and 1 (e.g., 0.10 for 10%)")]
    ProfitTargetOutOfRange(f64),

    #[error("max_loss_percent must be between 0 and 0.5 (e.g., 0.05 for 5%)")]
    MaxLossOutOfRange(f64),

    #[error(transparent)]
    Parse(#[from] ParseNameError),
}

/// User trading preferences driving the autonomous loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingPreferences {
    pub user_id: String,
    /// Watched symbols, processed in order
    pub assets: Vec<String>,
    pub style: TradingStyle,
    pub risk_profile: RiskLevel,
    /// Fraction of initial budget; reaching it emits an event
    pub profit_target: f64,
    pub max_loss_percent: f64,
    pub auto_trade: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TradingPreferences {
    /// Defaults for a new user. Auto-trade starts disabled.
    pub fn default_for(user_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            user_id: user_id.into(),
            assets: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            style: TradingStyle::Swing,
            risk_profile: RiskLevel::Moderate,
            profit_target: 0.10,
            max_loss_percent: 0.05,
            auto_trade: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), PreferencesError> {
        if self.user_id.trim().is_empty() {
            return Err(PreferencesError::MissingUser);
        }
        if self.assets.is_empty() {
            return Err(PreferencesError::NoAssets);
        }
        if !(self.profit_target > 0.0 && self.profit_target <= 1.0) {
            return Err(PreferencesError::ProfitTargetOutOfRange(self.profit_target));
        }
        if !(self.max_loss_percent > 0.0 && self.max_loss_percent <= 0.5) {
            return Err(PreferencesError::MaxLossOutOfRange(self.max_loss_percent));
        }
        Ok(())
    }

    /// Mark as modified now.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}
