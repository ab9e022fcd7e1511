//! Trading Types
//!
//! Types for the paper trading ledger: positions, closed trades, risk profiles
//! and the read-only status snapshots handed to callers.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// Enums
// =============================================================================

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a name that is not a known enum value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseNameError {
    #[error("invalid side: {0} (must be long or short)")]
    Side(String),

    #[error("unknown risk profile: {0} (must be conservative, moderate, or aggressive)")]
    RiskProfile(String),

    #[error("invalid style: {0} (must be day_trading, swing, hold, or hft)")]
    Style(String),
}

impl FromStr for Side {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" => Ok(Side::Long),
            "short" => Ok(Side::Short),
            other => Err(ParseNameError::Side(other.to_string())),
        }
    }
}

/// Named risk level selecting one of the canonical risk profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Conservative => "conservative",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Aggressive => "aggressive",
        }
    }

    /// The predefined profile for this level.
    pub fn profile(&self) -> RiskProfile {
        match self {
            RiskLevel::Conservative => RiskProfile::CONSERVATIVE,
            RiskLevel::Moderate => RiskProfile::MODERATE,
            RiskLevel::Aggressive => RiskProfile::AGGRESSIVE,
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Conservative
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(RiskLevel::Conservative),
            "moderate" => Ok(RiskLevel::Moderate),
            "aggressive" => Ok(RiskLevel::Aggressive),
            other => Err(ParseNameError::RiskProfile(other.to_string())),
        }
    }
}

/// Portfolio health, derived from the distance between total value and floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioHealth {
    /// Comfortably above the floor
    Active,
    /// Less than 10% of the initial budget above the floor
    Warning,
    /// At or below the floor; no new positions
    Stopped,
}

impl PortfolioHealth {
    /// Distance to floor below which the portfolio is in warning, as a
    /// percentage of the initial budget.
    pub const WARNING_FLOOR_PCT: f64 = 10.0;

    pub fn evaluate(total_value: f64, floor: f64, initial_budget: f64) -> Self {
        if total_value <= floor {
            return PortfolioHealth::Stopped;
        }
        let floor_pct = (total_value - floor) / initial_budget * 100.0;
        if floor_pct < Self::WARNING_FLOOR_PCT {
            PortfolioHealth::Warning
        } else {
            PortfolioHealth::Active
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PortfolioHealth::Active => "active",
            PortfolioHealth::Warning => "WARNING - Near floor",
            PortfolioHealth::Stopped => "STOPPED - Floor reached",
        }
    }
}

// =============================================================================
// Risk Profiles
// =============================================================================

/// Position sizing and exit defaults. Immutable once attached to a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskProfile {
    pub level: RiskLevel,
    /// Max fraction of the initial budget per trade
    pub max_position_pct: f64,
    /// Max fraction lost before trading should stop
    pub max_drawdown_pct: f64,
    /// Default stop-loss distance from entry
    pub stop_loss_pct: f64,
    /// Default take-profit distance from entry
    pub take_profit_pct: f64,
}

impl RiskProfile {
    pub const CONSERVATIVE: RiskProfile = RiskProfile {
        level: RiskLevel::Conservative,
        max_position_pct: 0.10,
        max_drawdown_pct: 0.10,
        stop_loss_pct: 0.02,
        take_profit_pct: 0.04, // 2:1 reward to risk
    };

    pub const MODERATE: RiskProfile = RiskProfile {
        level: RiskLevel::Moderate,
        max_position_pct: 0.20,
        max_drawdown_pct: 0.20,
        stop_loss_pct: 0.05,
        take_profit_pct: 0.10,
    };

    pub const AGGRESSIVE: RiskProfile = RiskProfile {
        level: RiskLevel::Aggressive,
        max_position_pct: 0.40,
        max_drawdown_pct: 0.30,
        stop_loss_pct: 0.10,
        take_profit_pct: 0.20,
    };

    /// Display name ("Conservative", "Moderate", "Aggressive").
    pub fn name(&self) -> &'static str {
        match self.level {
            RiskLevel::Conservative => "Conservative",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::Aggressive => "Aggressive",
        }
    }

    /// Stop-loss and take-profit prices for an entry, mirrored by side.
    pub fn exit_levels(&self, side: Side, entry_price: f64) -> (f64, f64) {
        match side {
            Side::Long => (
                entry_price * (1.0 - self.stop_loss_pct),
                entry_price * (1.0 + self.take_profit_pct),
            ),
            Side::Short => (
                entry_price * (1.0 + self.stop_loss_pct),
                entry_price * (1.0 - self.take_profit_pct),
            ),
        }
    }
}

impl FromStr for RiskProfile {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<RiskLevel>().map(|level| level.profile())
    }
}

// =============================================================================
// Position & Trade
// =============================================================================

/// An open exposure to one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub quantity: f64,
    /// When the position was opened (ms)
    pub opened_at: i64,
    pub stop_loss: f64,
    /// Informational only; nothing closes a position on take-profit
    pub take_profit: f64,
}

impl Position {
    /// Notional committed at entry.
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.quantity
    }

    /// Signed P&L at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => (price - self.entry_price) * self.quantity,
            Side::Short => (self.entry_price - price) * self.quantity,
        }
    }

    /// Mark-to-market contribution to portfolio value at `price`.
    pub fn market_value(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => self.quantity * price,
            Side::Short => self.entry_value() + self.unrealized_pnl(price),
        }
    }

    /// Whether `price` has crossed the stop in the adverse direction.
    pub fn stop_triggered(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price <= self.stop_loss,
            Side::Short => price >= self.stop_loss,
        }
    }
}

/// Immutable record of a closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Same id as the position it closed
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub opened_at: i64,
    pub closed_at: i64,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

// =============================================================================
// Status Snapshots
// =============================================================================

/// One open position as seen by a status read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionStatus {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub current_price: f64,
    pub quantity: f64,
    pub unrealized_pnl: f64,
    pub pnl_percent: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Read-only view of the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStatus {
    pub health: PortfolioHealth,
    pub message: String,
    pub initial_budget: f64,
    pub stop_loss_floor: f64,
    pub current_cash: f64,
    pub total_value: f64,
    pub total_pnl: f64,
    pub pnl_percent: f64,
    pub distance_to_floor: f64,
    pub floor_percent: f64,
    pub risk_profile: RiskProfile,
    pub can_trade: bool,
    pub open_positions: usize,
    pub positions: Vec<PositionStatus>,
    pub trades_count: usize,
    pub win_count: u32,
    pub loss_count: u32,
    /// Percentage of closed trades that were winners
    pub win_rate: f64,
}

/// Point-in-time portfolio figures written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub total_value: f64,
    pub cash: f64,
    pub total_pnl: f64,
    pub open_positions: usize,
    pub risk_profile: RiskLevel,
}

impl From<&PortfolioStatus> for PortfolioSnapshot {
    fn from(status: &PortfolioStatus) -> Self {
        Self {
            total_value: status.total_value,
            cash: status.current_cash,
            total_pnl: status.total_pnl,
            open_positions: status.open_positions,
            risk_profile: status.risk_profile.level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(side: Side) -> Position {
        Position {
            id: "pos_1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side,
            entry_price: 100.0,
            quantity: 2.0,
            opened_at: 0,
            stop_loss: if side == Side::Long { 98.0 } else { 102.0 },
            take_profit: if side == Side::Long { 104.0 } else { 96.0 },
        }
    }

    #[test]
    fn test_side_parse() {
        assert_eq!("long".parse::<Side>().unwrap(), Side::Long);
        assert_eq!(" SHORT ".parse::<Side>().unwrap(), Side::Short);
        assert!("sideways".parse::<Side>().is_err());
    }

    #[test]
    fn test_risk_level_parse_unknown() {
        let err = "yolo".parse::<RiskLevel>().unwrap_err();
        assert!(err.to_string().contains("unknown risk profile"));
    }

    #[test]
    fn test_risk_profile_constants() {
        assert_eq!(RiskProfile::CONSERVATIVE.max_position_pct, 0.10);
        assert_eq!(RiskProfile::MODERATE.stop_loss_pct, 0.05);
        assert_eq!(RiskProfile::AGGRESSIVE.take_profit_pct, 0.20);
        assert_eq!("moderate".parse::<RiskProfile>().unwrap(), RiskProfile::MODERATE);
    }

    #[test]
    fn test_exit_levels_mirror_by_side() {
        let profile = RiskProfile::CONSERVATIVE;
        let (sl, tp) = profile.exit_levels(Side::Long, 100.0);
        assert!((sl - 98.0).abs() < 1e-9);
        assert!((tp - 104.0).abs() < 1e-9);

        let (sl, tp) = profile.exit_levels(Side::Short, 100.0);
        assert!((sl - 102.0).abs() < 1e-9);
        assert!((tp - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_long_position_valuation() {
        let pos = position(Side::Long);
        assert_eq!(pos.market_value(110.0), 220.0);
        assert_eq!(pos.unrealized_pnl(110.0), 20.0);
    }

    #[test]
    fn test_short_position_valuation() {
        let pos = position(Side::Short);
        // Entry notional 200, price fell 10 -> +20
        assert_eq!(pos.unrealized_pnl(90.0), 20.0);
        assert_eq!(pos.market_value(90.0), 220.0);
    }

    #[test]
    fn test_stop_triggered_direction() {
        let long = position(Side::Long);
        assert!(long.stop_triggered(98.0));
        assert!(!long.stop_triggered(98.5));

        let short = position(Side::Short);
        assert!(short.stop_triggered(102.0));
        assert!(!short.stop_triggered(101.0));
    }

    #[test]
    fn test_health_thresholds() {
        assert_eq!(PortfolioHealth::evaluate(7.0, 7.0, 10.0), PortfolioHealth::Stopped);
        assert_eq!(PortfolioHealth::evaluate(7.5, 7.0, 10.0), PortfolioHealth::Warning);
        assert_eq!(PortfolioHealth::evaluate(10.0, 7.0, 10.0), PortfolioHealth::Active);
    }

    #[test]
    fn test_side_serialization() {
        assert_eq!(serde_json::to_string(&Side::Long).unwrap(), "\"long\"");
        assert_eq!(serde_json::to_string(&RiskLevel::Aggressive).unwrap(), "\"aggressive\"");
    }
}
