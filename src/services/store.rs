//! Persistence contract for the trading engine.
//!
//! Writes are best-effort: callers log failures and carry on, the in-memory
//! ledger stays authoritative.

use crate::types::{PortfolioSnapshot, Position, Trade};
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

/// Sink for position, trade and snapshot records.
pub trait TradeStore: Send + Sync {
    /// Record a newly opened position.
    fn save_position(&self, position: &Position) -> Result<(), StoreError>;

    /// Mark the record for `trade.id` as closed.
    fn close_trade(&self, trade: &Trade) -> Result<(), StoreError>;

    /// Append a portfolio snapshot.
    fn save_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), StoreError>;
}
