//! Trading System
//!
//! Wires a market source, an optional store, the portfolio and its
//! auto-trader together and exposes the operations callers use.

use crate::config::{EngineConfig, MarketDataMode};
use crate::error::Result;
use crate::services::autotrader::AutoTrader;
use crate::services::market_data::{FallbackSource, MarketDataSource};
use crate::services::portfolio::Portfolio;
use crate::services::sqlite_store::SqliteStore;
use crate::services::store::TradeStore;
use crate::sources::{BinanceSource, SyntheticMarket};
use crate::types::{
    AutoTraderStatus, PortfolioStatus, Position, RiskLevel, Side, Trade, TradingEvent,
    TradingPreferences,
};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Facade over one portfolio and its autonomous trader.
pub struct TradingSystem {
    market: Arc<dyn MarketDataSource>,
    store: Option<Arc<SqliteStore>>,
    decision_log_capacity: usize,
    event_tx: broadcast::Sender<TradingEvent>,
    /// Swapped wholesale when the portfolio is reconfigured
    trader: RwLock<Arc<AutoTrader>>,
}

impl TradingSystem {
    /// Build a system from configuration.
    ///
    /// A store that fails to open is logged and skipped.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let synthetic: Arc<dyn MarketDataSource> = Arc::new(SyntheticMarket::new(
            config.synthetic_seed,
            config.synthetic_jitter_pct,
        ));

        let market: Arc<dyn MarketDataSource> = match config.market_data_mode {
            MarketDataMode::Synthetic => synthetic,
            MarketDataMode::Live => {
                let binance = Arc::new(BinanceSource::new(
                    config.binance.api_key.clone(),
                    config.binance.testnet,
                ));
                info!(
                    "Using live Binance market data ({}) with synthetic fallback",
                    binance.base_url()
                );
                Arc::new(FallbackSource::new(binance, synthetic))
            }
        };

        let store = match config.database_path.as_deref() {
            Some(path) => match SqliteStore::new(path) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    warn!("Failed to open trading database {}: {}, running in memory", path, e);
                    None
                }
            },
            None => None,
        };

        Self::from_parts(
            market,
            store,
            config.default_budget,
            config.default_floor,
            config.default_risk_profile,
            config.decision_log_capacity,
        )
    }

    /// Build a system from explicit components.
    pub fn from_parts(
        market: Arc<dyn MarketDataSource>,
        store: Option<Arc<SqliteStore>>,
        budget: f64,
        floor: f64,
        risk_level: RiskLevel,
        decision_log_capacity: usize,
    ) -> Result<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let portfolio = Self::build_portfolio(&market, &store, budget, floor, risk_level)?;
        let trader = AutoTrader::with_event_sender(portfolio, decision_log_capacity, event_tx.clone());

        Ok(Self {
            market,
            store,
            decision_log_capacity,
            event_tx,
            trader: RwLock::new(Arc::new(trader)),
        })
    }

    fn build_portfolio(
        market: &Arc<dyn MarketDataSource>,
        store: &Option<Arc<SqliteStore>>,
        budget: f64,
        floor: f64,
        risk_level: RiskLevel,
    ) -> Result<Arc<Portfolio>> {
        let store = store.clone().map(|s| s as Arc<dyn TradeStore>);
        Ok(Arc::new(Portfolio::new(
            budget,
            floor,
            risk_level,
            Arc::clone(market),
            store,
        )?))
    }

    fn trader(&self) -> Arc<AutoTrader> {
        Arc::clone(&self.trader.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn portfolio(&self) -> Arc<Portfolio> {
        Arc::clone(self.trader().portfolio())
    }

    pub fn market(&self) -> &Arc<dyn MarketDataSource> {
        &self.market
    }

    pub fn store(&self) -> Option<&Arc<SqliteStore>> {
        self.store.as_ref()
    }

    /// Subscribe to auto-trader events. Survives portfolio reconfiguration.
    pub fn subscribe(&self) -> broadcast::Receiver<TradingEvent> {
        self.event_tx.subscribe()
    }

    // =========================================================================
    // Portfolio
    // =========================================================================

    /// Replace the portfolio with a fresh one. A running auto-trader is
    /// stopped; preferences carry over.
    pub async fn configure_portfolio(
        &self,
        budget: f64,
        floor: f64,
        risk_profile: &str,
    ) -> Result<PortfolioStatus> {
        let risk_level: RiskLevel = risk_profile.parse()?;
        let portfolio = Self::build_portfolio(&self.market, &self.store, budget, floor, risk_level)?;

        let old = self.trader();
        if old.is_running() {
            old.stop()?;
        }
        let open = old.portfolio().open_position_count().await;
        if open > 0 {
            warn!("Reconfiguring portfolio, discarding {} open positions", open);
        }

        let trader = AutoTrader::with_event_sender(
            Arc::clone(&portfolio),
            self.decision_log_capacity,
            self.event_tx.clone(),
        );
        if let Some(prefs) = old.preferences() {
            trader.set_preferences(prefs);
        }

        *self.trader.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(trader);
        Ok(portfolio.status().await)
    }

    pub async fn status(&self) -> PortfolioStatus {
        self.portfolio().status().await
    }

    /// Open a position manually. `side` is `long` or `short`.
    pub async fn open_position(&self, symbol: &str, side: &str, amount: f64) -> Result<Position> {
        let side: Side = side.parse()?;
        Ok(self.portfolio().open_position(symbol, side, amount).await?)
    }

    pub async fn close_position(&self, position_id: &str) -> Result<Trade> {
        Ok(self.portfolio().close_position(position_id).await?)
    }

    /// Close every open position at current prices.
    pub async fn close_all_positions(&self) -> Vec<Trade> {
        self.portfolio().emergency_liquidate().await
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    /// Validate and apply preferences, persisting them best-effort.
    pub fn set_preferences(&self, mut prefs: TradingPreferences) -> Result<TradingPreferences> {
        prefs.validate()?;
        prefs.touch();

        if let Some(ref store) = self.store {
            if let Err(e) = store.save_preferences(&prefs) {
                warn!("Failed to persist preferences for {}: {}", prefs.user_id, e);
            }
        }

        self.trader().set_preferences(prefs.clone());
        info!(
            "Trading preferences set for {}: {:?}, {} style, {} risk, auto-trade {}",
            prefs.user_id, prefs.assets, prefs.style, prefs.risk_profile, prefs.auto_trade
        );
        Ok(prefs)
    }

    pub fn preferences(&self) -> Option<TradingPreferences> {
        self.trader().preferences()
    }

    /// Apply a user's stored preferences, if any.
    pub fn load_preferences(&self, user_id: &str) -> Result<Option<TradingPreferences>> {
        let Some(ref store) = self.store else {
            return Ok(None);
        };
        let prefs = store.get_preferences(user_id)?;
        if let Some(ref prefs) = prefs {
            prefs.validate()?;
            self.trader().set_preferences(prefs.clone());
        }
        Ok(prefs)
    }

    // =========================================================================
    // Auto-trading
    // =========================================================================

    pub async fn start_auto_trading(&self) -> Result<AutoTraderStatus> {
        let trader = self.trader();
        trader.start()?;
        Ok(trader.status().await)
    }

    pub async fn stop_auto_trading(&self) -> Result<AutoTraderStatus> {
        let trader = self.trader();
        trader.stop()?;
        Ok(trader.status().await)
    }

    pub async fn auto_trading_status(&self) -> AutoTraderStatus {
        self.trader().status().await
    }

    /// Run one auto-trader iteration inline.
    pub async fn run_auto_trading_once(&self) {
        self.trader().run_once().await
    }

    pub fn is_auto_trading(&self) -> bool {
        self.trader().is_running()
    }
}
