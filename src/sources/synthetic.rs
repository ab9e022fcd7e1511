//! Synthetic market data.
//!
//! Seeded random-walk prices and candle history for development, tests and as
//! the fallback layer behind a live source.

use crate::services::market_data::{MarketDataError, MarketDataSource, MarketFuture};
use crate::types::Candle;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Symbols seeded at construction with their base prices.
pub const BASE_PRICES: &[(&str, f64)] = &[
    ("BTCUSDT", 42500.00),
    ("ETHUSDT", 2250.00),
    ("XAUUSD", 2050.00),
    ("EURUSD", 1.0850),
];

/// Candles generated per symbol.
pub const HISTORY_LEN: usize = 100;
/// Default price jitter as a fraction of price.
pub const DEFAULT_JITTER_PCT: f64 = 0.001;

const HOUR_MS: i64 = 3_600_000;

/// In-process market with seeded prices and hourly candle history.
pub struct SyntheticMarket {
    prices: DashMap<String, f64>,
    history: DashMap<String, Vec<Candle>>,
    rng: Mutex<StdRng>,
    jitter_pct: f64,
}

impl SyntheticMarket {
    /// Create a market seeded with [`BASE_PRICES`].
    ///
    /// `jitter_pct` of 0 makes `price()` return the stored price exactly.
    pub fn new(seed: u64, jitter_pct: f64) -> Self {
        let market = Self {
            prices: DashMap::new(),
            history: DashMap::new(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            jitter_pct,
        };
        for (symbol, price) in BASE_PRICES {
            market.add_symbol(symbol, *price);
        }
        market
    }

    /// Add (or reset) a symbol with a freshly generated history.
    pub fn with_symbol(self, symbol: &str, base_price: f64) -> Self {
        self.add_symbol(symbol, base_price);
        self
    }

    fn add_symbol(&self, symbol: &str, base_price: f64) {
        let candles = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            generate_candles(&mut rng, base_price, HISTORY_LEN, chrono::Utc::now().timestamp_millis())
        };
        self.prices.insert(symbol.to_string(), base_price);
        self.history.insert(symbol.to_string(), candles);
    }

    /// Overwrite the current price of a known or new symbol.
    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.insert(symbol.to_string(), price);
    }

    /// Replace the candle history of a symbol.
    pub fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.history.insert(symbol.to_string(), candles);
    }

    /// Move a symbol's price by `percent_change` percent (e.g. `-5.0`).
    /// Unknown symbols are ignored.
    pub fn simulate_price_move(&self, symbol: &str, percent_change: f64) {
        if let Some(mut price) = self.prices.get_mut(symbol) {
            *price *= 1.0 + percent_change / 100.0;
            debug!("Simulated {:+.2}% move on {}: {:.4}", percent_change, symbol, *price);
        }
    }

    /// Stored price without jitter.
    pub fn base_price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).map(|p| *p)
    }

    fn jittered(&self, price: f64) -> f64 {
        if self.jitter_pct == 0.0 {
            return price;
        }
        let r: f64 = self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen();
        price + (r - 0.5) * self.jitter_pct * price
    }
}

impl Default for SyntheticMarket {
    fn default() -> Self {
        Self::new(42, DEFAULT_JITTER_PCT)
    }
}

/// Random walk ending near `base_price`: starts at 95% of it, each step moves
/// by `(r - 0.48) * 2%` with wicks up to 0.5%.
fn generate_candles(rng: &mut StdRng, base_price: f64, count: usize, now_ms: i64) -> Vec<Candle> {
    let mut price = base_price * 0.95;
    let mut candles = Vec::with_capacity(count);

    for i in 0..count {
        let change = (rng.gen::<f64>() - 0.48) * (price * 0.02);
        let open = price;
        let close = price + change;
        let high = open.max(close) + rng.gen::<f64>() * (price * 0.005);
        let low = open.min(close) - rng.gen::<f64>() * (price * 0.005);
        let volume = 1000.0 + rng.gen::<f64>() * 10000.0;

        candles.push(Candle {
            time: now_ms - (count - i) as i64 * HOUR_MS,
            open,
            high,
            low,
            close,
            volume,
        });

        price = close;
    }

    candles
}

impl MarketDataSource for SyntheticMarket {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn price<'a>(&'a self, symbol: &'a str) -> MarketFuture<'a, f64> {
        Box::pin(async move {
            let price = self
                .base_price(symbol)
                .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))?;
            Ok(self.jittered(price))
        })
    }

    fn candles<'a>(&'a self, symbol: &'a str, count: usize) -> MarketFuture<'a, Vec<Candle>> {
        Box::pin(async move {
            let history = self
                .history
                .get(symbol)
                .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))?;
            let start = history.len().saturating_sub(count);
            Ok(history[start..].to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_symbols_available() {
        let market = SyntheticMarket::new(7, 0.0);
        assert_eq!(market.price("BTCUSDT").await.unwrap(), 42500.0);
        assert_eq!(market.price("EURUSD").await.unwrap(), 1.0850);
        assert_eq!(market.candles("ETHUSDT", 500).await.unwrap().len(), HISTORY_LEN);
    }

    #[tokio::test]
    async fn test_unknown_symbol_errors() {
        let market = SyntheticMarket::new(7, 0.0);
        assert!(matches!(
            market.price("DOGEUSDT").await,
            Err(MarketDataError::UnknownSymbol(_))
        ));
        assert!(market.candles("DOGEUSDT", 10).await.is_err());
    }

    #[tokio::test]
    async fn test_jitter_stays_within_band() {
        let market = SyntheticMarket::new(7, 0.001);
        for _ in 0..50 {
            let price = market.price("BTCUSDT").await.unwrap();
            assert!((price - 42500.0).abs() <= 42500.0 * 0.0005 + 1e-9);
        }
    }

    #[tokio::test]
    async fn test_candles_most_recent_ordered() {
        let market = SyntheticMarket::new(7, 0.0);
        let all = market.candles("BTCUSDT", HISTORY_LEN).await.unwrap();
        let last = market.candles("BTCUSDT", 10).await.unwrap();
        assert_eq!(last.as_slice(), &all[HISTORY_LEN - 10..]);
        assert!(last.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_candle_walk_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let candles = generate_candles(&mut rng, 100.0, 100, 0);
        assert!((candles[0].open - 95.0).abs() < 1e-9);
        for c in &candles {
            assert!(c.high >= c.open.max(c.close));
            assert!(c.low <= c.open.min(c.close));
        }
        for w in candles.windows(2) {
            assert_eq!(w[0].close, w[1].open);
        }
    }

    #[tokio::test]
    async fn test_simulate_price_move() {
        let market = SyntheticMarket::new(7, 0.0).with_symbol("TEST", 100.0);
        market.simulate_price_move("TEST", -5.0);
        assert!((market.price("TEST").await.unwrap() - 95.0).abs() < 1e-9);
        market.simulate_price_move("MISSING", 10.0);
        assert!(market.base_price("MISSING").is_none());
    }

    #[test]
    fn test_same_seed_same_history() {
        let a = SyntheticMarket::new(99, 0.0);
        let b = SyntheticMarket::new(99, 0.0);
        let ha = a.history.get("BTCUSDT").unwrap().clone();
        let hb = b.history.get("BTCUSDT").unwrap().clone();
        let closes_a: Vec<f64> = ha.iter().map(|c| c.close).collect();
        let closes_b: Vec<f64> = hb.iter().map(|c| c.close).collect();
        assert_eq!(closes_a, closes_b);
    }
}
