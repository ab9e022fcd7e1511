//! SQLite persistence layer for trades, portfolio snapshots and trading
//! preferences.
//!
//! Tables:
//! - `trades`: one row per position, `status` flips from `open` to `closed`
//! - `portfolio_snapshots`: append-only value history
//! - `trading_preferences`: one row per user, assets stored as a JSON array

use crate::services::store::{StoreError, TradeStore};
use crate::types::{
    PortfolioSnapshot, Position, RiskLevel, Side, Trade, TradingPreferences, TradingStyle,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Aggregate statistics over closed trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlSummary {
    pub total_trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    /// Percentage of closed trades with positive P&L
    pub win_rate: f64,
}

/// SQLite store for persistent trading data.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL,
                quantity REAL NOT NULL,
                pnl REAL DEFAULT 0,
                open_time INTEGER NOT NULL,
                close_time INTEGER,
                status TEXT NOT NULL DEFAULT 'open',
                stop_loss REAL,
                take_profit REAL
            );

            CREATE TABLE IF NOT EXISTS portfolio_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                total_value REAL NOT NULL,
                cash REAL NOT NULL,
                total_pnl REAL NOT NULL,
                open_positions INTEGER NOT NULL,
                risk_profile TEXT NOT NULL,
                snapshot_time INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS trading_preferences (
                user_id TEXT PRIMARY KEY,
                assets TEXT NOT NULL,
                style TEXT NOT NULL,
                risk_profile TEXT NOT NULL,
                profit_target REAL NOT NULL,
                max_loss_percent REAL NOT NULL,
                auto_trade INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_trades_symbol ON trades(symbol);
            CREATE INDEX IF NOT EXISTS idx_trades_status ON trades(status);
            CREATE INDEX IF NOT EXISTS idx_trades_open_time ON trades(open_time);
            CREATE INDEX IF NOT EXISTS idx_snapshots_time ON portfolio_snapshots(snapshot_time);",
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    // ========== Trade Methods ==========

    /// Positions still marked open.
    pub fn open_positions(&self) -> Result<Vec<Position>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, symbol, side, entry_price, quantity, open_time, stop_loss, take_profit
             FROM trades WHERE status = 'open' ORDER BY open_time",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<f64>>(6)?,
                row.get::<_, Option<f64>>(7)?,
            ))
        })?;

        let mut positions = Vec::new();
        for row in rows {
            let (id, symbol, side, entry_price, quantity, opened_at, stop_loss, take_profit) = row?;
            positions.push(Position {
                id,
                symbol,
                side: parse_side(&side)?,
                entry_price,
                quantity,
                opened_at,
                stop_loss: stop_loss.unwrap_or_default(),
                take_profit: take_profit.unwrap_or_default(),
            });
        }
        Ok(positions)
    }

    /// Closed trades, most recently closed first.
    pub fn trade_history(&self, limit: usize) -> Result<Vec<Trade>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, symbol, side, entry_price, exit_price, quantity, pnl, open_time, close_time
             FROM trades WHERE status = 'closed'
             ORDER BY close_time DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], trade_columns)?;

        let mut trades = Vec::new();
        for row in rows {
            let (id, symbol, side, entry_price, exit_price, quantity, pnl, opened_at, closed_at) = row?;
            trades.push(Trade {
                id,
                symbol,
                side: parse_side(&side)?,
                entry_price,
                exit_price: exit_price.unwrap_or_default(),
                quantity,
                pnl: pnl.unwrap_or_default(),
                opened_at,
                closed_at: closed_at.unwrap_or_default(),
            });
        }
        Ok(trades)
    }

    /// P&L statistics over all closed trades.
    pub fn pnl_summary(&self) -> Result<PnlSummary, StoreError> {
        let conn = self.conn();
        let summary = conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN pnl > 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN pnl < 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(pnl), 0),
                COALESCE(AVG(pnl), 0),
                COALESCE(MAX(pnl), 0),
                COALESCE(MIN(pnl), 0)
             FROM trades WHERE status = 'closed'",
            [],
            |row| {
                let total_trades: u32 = row.get(0)?;
                let wins: u32 = row.get(1)?;
                Ok(PnlSummary {
                    total_trades,
                    wins,
                    losses: row.get(2)?,
                    total_pnl: row.get(3)?,
                    avg_pnl: row.get(4)?,
                    best_trade: row.get(5)?,
                    worst_trade: row.get(6)?,
                    win_rate: if total_trades > 0 {
                        wins as f64 / total_trades as f64 * 100.0
                    } else {
                        0.0
                    },
                })
            },
        )?;
        Ok(summary)
    }

    // ========== Snapshot Methods ==========

    /// Most recent snapshots, newest first.
    pub fn recent_snapshots(&self, limit: usize) -> Result<Vec<PortfolioSnapshot>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT total_value, cash, total_pnl, open_positions, risk_profile
             FROM portfolio_snapshots ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, f64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut snapshots = Vec::new();
        for row in rows {
            let (total_value, cash, total_pnl, open_positions, risk_profile) = row?;
            snapshots.push(PortfolioSnapshot {
                total_value,
                cash,
                total_pnl,
                open_positions: open_positions.max(0) as usize,
                risk_profile: risk_profile
                    .parse::<RiskLevel>()
                    .map_err(|e| StoreError::InvalidValue(e.to_string()))?,
            });
        }
        Ok(snapshots)
    }

    // ========== Preferences Methods ==========

    /// Insert or replace a user's trading preferences.
    pub fn save_preferences(&self, prefs: &TradingPreferences) -> Result<(), StoreError> {
        let assets = serde_json::to_string(&prefs.assets)?;
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO trading_preferences
             (user_id, assets, style, risk_profile, profit_target, max_loss_percent, auto_trade, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                prefs.user_id,
                assets,
                prefs.style.as_str(),
                prefs.risk_profile.as_str(),
                prefs.profit_target,
                prefs.max_loss_percent,
                prefs.auto_trade,
                prefs.created_at,
                prefs.updated_at,
            ],
        )?;
        debug!("Saved trading preferences for {}", prefs.user_id);
        Ok(())
    }

    /// Load a user's trading preferences.
    pub fn get_preferences(&self, user_id: &str) -> Result<Option<TradingPreferences>, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT user_id, assets, style, risk_profile, profit_target, max_loss_percent,
                        auto_trade, created_at, updated_at
                 FROM trading_preferences WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, bool>(6)?,
                        row.get::<_, i64>(7)?,
                        row.get::<_, i64>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, assets, style, risk_profile, profit_target, max_loss_percent, auto_trade, created_at, updated_at)) = row
        else {
            return Ok(None);
        };

        Ok(Some(TradingPreferences {
            user_id,
            assets: serde_json::from_str(&assets)?,
            style: style
                .parse::<TradingStyle>()
                .map_err(|e| StoreError::InvalidValue(e.to_string()))?,
            risk_profile: risk_profile
                .parse::<RiskLevel>()
                .map_err(|e| StoreError::InvalidValue(e.to_string()))?,
            profit_target,
            max_loss_percent,
            auto_trade,
            created_at,
            updated_at,
        }))
    }
}

type TradeRow = (String, String, String, f64, Option<f64>, f64, Option<f64>, i64, Option<i64>);

fn trade_columns(row: &Row<'_>) -> rusqlite::Result<TradeRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn parse_side(raw: &str) -> Result<Side, StoreError> {
    raw.parse::<Side>()
        .map_err(|e| StoreError::InvalidValue(e.to_string()))
}

impl TradeStore for SqliteStore {
    fn save_position(&self, position: &Position) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO trades
             (id, symbol, side, entry_price, quantity, open_time, status, stop_loss, take_profit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'open', ?7, ?8)",
            params![
                position.id,
                position.symbol,
                position.side.as_str(),
                position.entry_price,
                position.quantity,
                position.opened_at,
                position.stop_loss,
                position.take_profit,
            ],
        )?;
        Ok(())
    }

    fn close_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE trades
             SET exit_price = ?1, pnl = ?2, close_time = ?3, status = 'closed'
             WHERE id = ?4",
            params![trade.exit_price, trade.pnl, trade.closed_at, trade.id],
        )?;

        // Position was never recorded (e.g. store attached after open)
        if updated == 0 {
            conn.execute(
                "INSERT INTO trades
                 (id, symbol, side, entry_price, exit_price, quantity, pnl, open_time, close_time, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'closed')",
                params![
                    trade.id,
                    trade.symbol,
                    trade.side.as_str(),
                    trade.entry_price,
                    trade.exit_price,
                    trade.quantity,
                    trade.pnl,
                    trade.opened_at,
                    trade.closed_at,
                ],
            )?;
        }
        Ok(())
    }

    fn save_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO portfolio_snapshots
             (total_value, cash, total_pnl, open_positions, risk_profile, snapshot_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.total_value,
                snapshot.cash,
                snapshot.total_pnl,
                snapshot.open_positions as i64,
                snapshot.risk_profile.as_str(),
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }
}
