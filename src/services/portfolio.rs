//! Portfolio
//!
//! The paper trading ledger: cash, open positions and realized P&L, guarded by
//! a budget and an absolute stop-loss floor.
//!
//! Invariants:
//! - `total_value = cash + sum(mark-to-market of open positions)`
//! - no new position may take total value below the floor
//! - every mutation holds the write lock for its full duration, including the
//!   price fetch

use crate::services::market_data::{MarketDataError, MarketDataSource};
use crate::services::store::{StoreError, TradeStore};
use crate::types::{
    PortfolioHealth, PortfolioSnapshot, PortfolioStatus, Position, PositionStatus, RiskLevel,
    RiskProfile, Side, Trade,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Trading errors. Validation variants carry the message shown to callers.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("Invalid trade amount: {0}")]
    InvalidAmount(f64),

    #[error("Portfolio at stop-loss floor (${floor:.2}). No trading allowed.")]
    FloorReached { floor: f64 },

    #[error("Trade too large. Max allowed: ${max_allowed:.2} to maintain floor.")]
    BreachesFloor { max_allowed: f64 },

    #[error("Trade exceeds max position size (${max:.2} for {profile} profile).")]
    ExceedsMaxPosition { max: f64, profile: &'static str },

    #[error("Insufficient cash. Available: ${available:.2}")]
    InsufficientCash { available: f64 },

    #[error("position not found: {0}")]
    PositionNotFound(String),

    #[error("Invalid portfolio configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid side: {0}")]
    InvalidSide(String),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),
}

/// Mutable state, only reachable through the portfolio lock.
#[derive(Debug, Default)]
struct Ledger {
    cash: f64,
    positions: HashMap<String, Position>,
    trades: Vec<Trade>,
    total_pnl: f64,
    win_count: u32,
    loss_count: u32,
}

impl Ledger {
    /// Open positions, oldest first.
    fn sorted_positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.id.cmp(&b.id)));
        positions
    }
}

/// Paper trading portfolio with hard risk limits.
pub struct Portfolio {
    initial_budget: f64,
    floor: f64,
    risk_profile: RiskProfile,
    market: Arc<dyn MarketDataSource>,
    store: Option<Arc<dyn TradeStore>>,
    ledger: RwLock<Ledger>,
}

impl Portfolio {
    /// Create a portfolio holding `initial_budget` in cash.
    ///
    /// Fails unless `0 <= floor < initial_budget`.
    pub fn new(
        initial_budget: f64,
        floor: f64,
        risk_level: RiskLevel,
        market: Arc<dyn MarketDataSource>,
        store: Option<Arc<dyn TradeStore>>,
    ) -> Result<Self, TradingError> {
        if !initial_budget.is_finite() || initial_budget <= 0.0 {
            return Err(TradingError::InvalidConfig(format!(
                "budget must be positive, got {}",
                initial_budget
            )));
        }
        if !floor.is_finite() || floor < 0.0 || floor >= initial_budget {
            return Err(TradingError::InvalidConfig(format!(
                "floor must be between 0 and the budget (${:.2}), got {}",
                initial_budget, floor
            )));
        }

        info!(
            "Portfolio configured: budget ${:.2}, floor ${:.2}, {} profile",
            initial_budget,
            floor,
            risk_level.as_str()
        );

        Ok(Self {
            initial_budget,
            floor,
            risk_profile: risk_level.profile(),
            market,
            store,
            ledger: RwLock::new(Ledger {
                cash: initial_budget,
                ..Ledger::default()
            }),
        })
    }

    pub fn initial_budget(&self) -> f64 {
        self.initial_budget
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn risk_profile(&self) -> RiskProfile {
        self.risk_profile
    }

    pub fn market(&self) -> &Arc<dyn MarketDataSource> {
        &self.market
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn cash(&self) -> f64 {
        self.ledger.read().await.cash
    }

    /// Realized P&L across closed trades.
    pub async fn total_pnl(&self) -> f64 {
        self.ledger.read().await.total_pnl
    }

    /// Open positions, oldest first.
    pub async fn positions(&self) -> Vec<Position> {
        self.ledger.read().await.sorted_positions()
    }

    pub async fn open_position_count(&self) -> usize {
        self.ledger.read().await.positions.len()
    }

    /// Closed trades in close order.
    pub async fn trade_history(&self) -> Vec<Trade> {
        self.ledger.read().await.trades.clone()
    }

    /// Cash plus the mark-to-market value of every open position.
    pub async fn total_value(&self) -> f64 {
        let ledger = self.ledger.read().await;
        self.value_of(&ledger).await
    }

    pub async fn health(&self) -> PortfolioHealth {
        let total = self.total_value().await;
        PortfolioHealth::evaluate(total, self.floor, self.initial_budget)
    }

    /// Check whether a trade of `amount` would be accepted right now.
    pub async fn can_trade(&self, amount: f64) -> Result<(), TradingError> {
        let ledger = self.ledger.read().await;
        let total = self.value_of(&ledger).await;
        self.check_trade(&ledger, total, amount)
    }

    /// Snapshot of the portfolio for display.
    pub async fn status(&self) -> PortfolioStatus {
        let ledger = self.ledger.read().await;

        let mut cash_total = ledger.cash;
        let mut positions = Vec::with_capacity(ledger.positions.len());
        for pos in ledger.sorted_positions() {
            let current_price = self.mark_price(&pos).await;
            cash_total += pos.market_value(current_price);

            let unrealized_pnl = pos.unrealized_pnl(current_price);
            let entry_value = pos.entry_value();
            positions.push(PositionStatus {
                pnl_percent: if entry_value > 0.0 {
                    unrealized_pnl / entry_value * 100.0
                } else {
                    0.0
                },
                id: pos.id,
                symbol: pos.symbol,
                side: pos.side,
                entry_price: pos.entry_price,
                current_price,
                quantity: pos.quantity,
                unrealized_pnl,
                stop_loss: pos.stop_loss,
                take_profit: pos.take_profit,
            });
        }

        let total_value = cash_total;
        let distance_to_floor = total_value - self.floor;
        let closed = ledger.win_count + ledger.loss_count;
        let health = PortfolioHealth::evaluate(total_value, self.floor, self.initial_budget);

        PortfolioStatus {
            health,
            message: health.message().to_string(),
            initial_budget: self.initial_budget,
            stop_loss_floor: self.floor,
            current_cash: ledger.cash,
            total_value,
            total_pnl: ledger.total_pnl,
            pnl_percent: (total_value - self.initial_budget) / self.initial_budget * 100.0,
            distance_to_floor,
            floor_percent: distance_to_floor / self.initial_budget * 100.0,
            risk_profile: self.risk_profile,
            can_trade: health != PortfolioHealth::Stopped,
            open_positions: positions.len(),
            positions,
            trades_count: ledger.trades.len(),
            win_count: ledger.win_count,
            loss_count: ledger.loss_count,
            win_rate: if closed > 0 {
                ledger.win_count as f64 / closed as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    /// Figures for the persistence snapshot.
    pub async fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot::from(&self.status().await)
    }

    /// Write a snapshot to the store, if one is attached.
    pub async fn record_snapshot(&self) {
        if self.store.is_none() {
            return;
        }
        let snapshot = self.snapshot().await;
        self.persist("snapshot", |store| store.save_snapshot(&snapshot));
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Open a position worth `amount` at the current price.
    pub async fn open_position(
        &self,
        symbol: &str,
        side: Side,
        amount: f64,
    ) -> Result<Position, TradingError> {
        let mut ledger = self.ledger.write().await;

        let total = self.value_of(&ledger).await;
        self.check_trade(&ledger, total, amount)?;

        let price = self.market.price(symbol).await?;
        if !price.is_finite() || price <= 0.0 {
            return Err(TradingError::MarketData(MarketDataError::Parse(format!(
                "non-positive price {} for {}",
                price, symbol
            ))));
        }

        let (stop_loss, take_profit) = self.risk_profile.exit_levels(side, price);
        let position = Position {
            id: format!("pos_{}", Uuid::new_v4().simple()),
            symbol: symbol.to_string(),
            side,
            entry_price: price,
            quantity: amount / price,
            opened_at: chrono::Utc::now().timestamp_millis(),
            stop_loss,
            take_profit,
        };

        ledger.cash -= amount;
        ledger.positions.insert(position.id.clone(), position.clone());
        drop(ledger);

        info!(
            "Opened {} {} position {}: ${:.2} at {:.4} (SL {:.4}, TP {:.4})",
            side, symbol, position.id, amount, price, stop_loss, take_profit
        );

        self.persist("position", |store| store.save_position(&position));
        Ok(position)
    }

    /// Close a position at the current price.
    pub async fn close_position(&self, position_id: &str) -> Result<Trade, TradingError> {
        let mut ledger = self.ledger.write().await;

        let symbol = ledger
            .positions
            .get(position_id)
            .map(|p| p.symbol.clone())
            .ok_or_else(|| TradingError::PositionNotFound(position_id.to_string()))?;

        let price = self.market.price(&symbol).await?;
        let trade = Self::close_locked(&mut ledger, position_id, price)
            .ok_or_else(|| TradingError::PositionNotFound(position_id.to_string()))?;
        drop(ledger);

        self.after_close(&trade);
        Ok(trade)
    }

    /// Close every position whose price crossed its stop in the adverse
    /// direction. Take-profit levels are never acted on.
    pub async fn check_stop_loss(&self) -> Vec<Trade> {
        let mut ledger = self.ledger.write().await;
        let mut closed = Vec::new();

        for pos in ledger.sorted_positions() {
            let price = match self.market.price(&pos.symbol).await {
                Ok(price) => price,
                Err(e) => {
                    warn!("Stop-loss check skipped for {}: {}", pos.id, e);
                    continue;
                }
            };

            if pos.stop_triggered(price) {
                debug!(
                    "Stop-loss hit on {} {}: price {:.4}, stop {:.4}",
                    pos.symbol, pos.id, price, pos.stop_loss
                );
                if let Some(trade) = Self::close_locked(&mut ledger, &pos.id, price) {
                    closed.push(trade);
                }
            }
        }
        drop(ledger);

        for trade in &closed {
            self.after_close(trade);
        }
        closed
    }

    /// Close every open position. Positions whose price cannot be fetched stay
    /// open.
    pub async fn emergency_liquidate(&self) -> Vec<Trade> {
        let mut ledger = self.ledger.write().await;
        let mut closed = Vec::new();

        for pos in ledger.sorted_positions() {
            match self.market.price(&pos.symbol).await {
                Ok(price) => {
                    if let Some(trade) = Self::close_locked(&mut ledger, &pos.id, price) {
                        closed.push(trade);
                    }
                }
                Err(e) => warn!("Could not liquidate {}: {}", pos.id, e),
            }
        }
        drop(ledger);

        if !closed.is_empty() {
            warn!("Emergency liquidation closed {} positions", closed.len());
        }
        for trade in &closed {
            self.after_close(trade);
        }
        closed
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_trade(&self, ledger: &Ledger, total: f64, amount: f64) -> Result<(), TradingError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(TradingError::InvalidAmount(amount));
        }

        if total <= self.floor {
            return Err(TradingError::FloorReached { floor: self.floor });
        }

        if total - amount < self.floor {
            return Err(TradingError::BreachesFloor {
                max_allowed: total - self.floor,
            });
        }

        let max_position = self.initial_budget * self.risk_profile.max_position_pct;
        if amount > max_position {
            return Err(TradingError::ExceedsMaxPosition {
                max: max_position,
                profile: self.risk_profile.name(),
            });
        }

        if amount > ledger.cash {
            return Err(TradingError::InsufficientCash {
                available: ledger.cash,
            });
        }

        Ok(())
    }

    async fn value_of(&self, ledger: &Ledger) -> f64 {
        let mut total = ledger.cash;
        for pos in ledger.positions.values() {
            total += pos.market_value(self.mark_price(pos).await);
        }
        total
    }

    /// Current price for valuation, or the entry price if unavailable.
    async fn mark_price(&self, pos: &Position) -> f64 {
        match self.market.price(&pos.symbol).await {
            Ok(price) => price,
            Err(e) => {
                warn!(
                    "No price for {} ({}), valuing {} at entry",
                    pos.symbol, e, pos.id
                );
                pos.entry_price
            }
        }
    }

    /// Settle a position at `price`. Cash is credited `quantity * price`.
    fn close_locked(ledger: &mut Ledger, position_id: &str, price: f64) -> Option<Trade> {
        let pos = ledger.positions.remove(position_id)?;
        let pnl = pos.unrealized_pnl(price);

        let trade = Trade {
            id: pos.id,
            symbol: pos.symbol,
            side: pos.side,
            entry_price: pos.entry_price,
            exit_price: price,
            quantity: pos.quantity,
            pnl,
            opened_at: pos.opened_at,
            closed_at: chrono::Utc::now().timestamp_millis(),
        };

        ledger.cash += pos.quantity * price;
        ledger.total_pnl += pnl;
        if pnl > 0.0 {
            ledger.win_count += 1;
        } else {
            ledger.loss_count += 1;
        }
        ledger.trades.push(trade.clone());

        Some(trade)
    }

    fn after_close(&self, trade: &Trade) {
        info!(
            "Closed {} {} position {}: exit {:.4}, P&L ${:.4}",
            trade.side, trade.symbol, trade.id, trade.exit_price, trade.pnl
        );
        self.persist("trade close", |store| store.close_trade(trade));
    }

    fn persist<F>(&self, what: &str, write: F)
    where
        F: FnOnce(&dyn TradeStore) -> Result<(), StoreError>,
    {
        if let Some(ref store) = self.store {
            if let Err(e) = write(store.as_ref()) {
                warn!("Failed to persist {}: {}", what, e);
            }
        }
    }
}
