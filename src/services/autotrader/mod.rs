//! Autonomous Trading
//!
//! Indicator-driven decision loop that trades a [`Portfolio`] according to the
//! user's [`TradingPreferences`].
//!
//! [`Portfolio`]: crate::services::Portfolio
//! [`TradingPreferences`]: crate::types::TradingPreferences

pub mod decision;
pub mod decision_log;
pub mod runner;

pub use decision::{analyze, analyze_asset, evaluate_signal, signal_thresholds};
pub use decision_log::DecisionLog;
pub use runner::AutoTrader;

use crate::services::portfolio::TradingError;
use thiserror::Error;

/// Auto-trader lifecycle and execution errors.
#[derive(Debug, Error)]
pub enum AutoTraderError {
    #[error("auto-trading is already running")]
    AlreadyRunning,

    #[error("auto-trading is not running")]
    NotRunning,

    #[error("trading preferences not set - set trading preferences first")]
    PreferencesNotSet,

    #[error("auto-trade is disabled in preferences - enable it first")]
    AutoTradeDisabled,

    #[error("signal has no side")]
    MissingSide,

    #[error("risk check failed: {0}")]
    RiskCheck(#[source] TradingError),

    #[error("failed to open position: {0}")]
    Execution(#[source] TradingError),
}
