pub mod autotrader;
pub mod indicators;
pub mod market_data;
pub mod portfolio;
pub mod sqlite_store;
pub mod store;
pub mod trading_system;

pub use autotrader::{AutoTrader, AutoTraderError, DecisionLog};
pub use market_data::{FallbackSource, MarketDataError, MarketDataSource, MarketFuture};
pub use portfolio::{Portfolio, TradingError};
pub use sqlite_store::{PnlSummary, SqliteStore};
pub use store::{StoreError, TradeStore};
pub use trading_system::TradingSystem;
