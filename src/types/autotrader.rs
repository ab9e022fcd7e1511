//! Autonomous Trading Types
//!
//! Per-iteration records produced by the decision loop and the status it
//! reports to callers.

use super::market::{BollingerBands, MacdValue};
use super::trading::{Side, Trade};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Analysis
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Bullish => write!(f, "bullish"),
            Trend::Bearish => write!(f, "bearish"),
            Trend::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strength::Strong => write!(f, "strong"),
            Strength::Moderate => write!(f, "moderate"),
            Strength::Weak => write!(f, "weak"),
        }
    }
}

/// Technical read of one symbol at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub symbol: String,
    pub timestamp: i64,
    pub price: f64,
    pub rsi: f64,
    pub sma20: f64,
    pub macd: MacdValue,
    pub bollinger: BollingerBands,
    pub trend: Trend,
    pub strength: Strength,
}

// =============================================================================
// Signals & Decisions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "buy"),
            SignalAction::Sell => write!(f, "sell"),
            SignalAction::Hold => write!(f, "hold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
    None,
}

/// Trading recommendation derived from an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSignal {
    pub symbol: String,
    pub action: SignalAction,
    /// None when holding
    pub side: Option<Side>,
    pub confidence: Confidence,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Fraction of available cash to commit
    pub position_size: f64,
    pub reasoning: String,
}

impl TradeSignal {
    /// Whether the loop should try to execute this signal.
    pub fn is_actionable(&self) -> bool {
        self.action != SignalAction::Hold
            && !matches!(self.confidence, Confidence::Low | Confidence::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Buy,
    Sell,
    Hold,
    Close,
}

impl From<SignalAction> for DecisionAction {
    fn from(action: SignalAction) -> Self {
        match action {
            SignalAction::Buy => DecisionAction::Buy,
            SignalAction::Sell => DecisionAction::Sell,
            SignalAction::Hold => DecisionAction::Hold,
        }
    }
}

/// One entry in the decision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingDecision {
    pub timestamp: i64,
    pub symbol: String,
    pub action: DecisionAction,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<TradeSignal>,
    pub executed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

// =============================================================================
// Status & Events
// =============================================================================

/// Snapshot of the autonomous loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoTraderStatus {
    pub running: bool,
    pub started_at: Option<i64>,
    pub interval_secs: u64,
    pub loop_count: u64,
    pub assets_monitored: Vec<String>,
    pub last_loop_at: Option<i64>,
    pub current_analysis: HashMap<String, AnalysisResult>,
    /// Newest last, at most 10
    pub recent_decisions: Vec<TradingDecision>,
    pub open_positions: usize,
    pub total_pnl: f64,
    pub message: String,
}

/// Notifications broadcast by the decision loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TradingEvent {
    TradeOpened {
        symbol: String,
        side: Side,
        amount: f64,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
    },
    TradeClosed {
        trade: Trade,
        reason: String,
    },
    ProfitTargetReached {
        current_pnl: f64,
        profit_pct: f64,
        target_pct: f64,
        current_cash: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(action: SignalAction, confidence: Confidence) -> TradeSignal {
        TradeSignal {
            symbol: "BTCUSDT".to_string(),
            action,
            side: None,
            confidence,
            entry_price: 100.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            position_size: 0.0,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_actionable_signals() {
        assert!(signal(SignalAction::Buy, Confidence::High).is_actionable());
        assert!(signal(SignalAction::Sell, Confidence::Medium).is_actionable());
        assert!(!signal(SignalAction::Buy, Confidence::Low).is_actionable());
        assert!(!signal(SignalAction::Hold, Confidence::None).is_actionable());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = TradingEvent::ProfitTargetReached {
            current_pnl: 1.0,
            profit_pct: 10.0,
            target_pct: 10.0,
            current_cash: 11.0,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"profit_target_reached\""));
    }

    #[test]
    fn test_trend_display() {
        assert_eq!(Trend::Bullish.to_string(), "bullish");
        assert_eq!(Strength::Moderate.to_string(), "moderate");
    }
}
