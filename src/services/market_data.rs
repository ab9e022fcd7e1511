//! Market Data
//!
//! The contract the engine uses to read prices and candle history, plus a
//! fallback decorator that degrades from a live source to a synthetic one.

use crate::types::Candle;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Market data errors.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("no data returned for {0}")]
    EmptyResponse(String),

    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Boxed future returned by market data sources.
pub type MarketFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, MarketDataError>> + Send + 'a>>;

/// A source of current prices and historical OHLCV candles.
pub trait MarketDataSource: Send + Sync {
    /// Source name used in logs
    fn name(&self) -> &str;

    /// Current price for a symbol
    fn price<'a>(&'a self, symbol: &'a str) -> MarketFuture<'a, f64>;

    /// Most recent `count` candles, oldest first
    fn candles<'a>(&'a self, symbol: &'a str, count: usize) -> MarketFuture<'a, Vec<Candle>>;
}

/// Tries `primary` first and delegates to `fallback` on any error or an empty
/// candle set. Fails only if both fail.
pub struct FallbackSource {
    primary: Arc<dyn MarketDataSource>,
    fallback: Arc<dyn MarketDataSource>,
}

impl FallbackSource {
    pub fn new(primary: Arc<dyn MarketDataSource>, fallback: Arc<dyn MarketDataSource>) -> Self {
        Self { primary, fallback }
    }
}

impl MarketDataSource for FallbackSource {
    fn name(&self) -> &str {
        "fallback"
    }

    fn price<'a>(&'a self, symbol: &'a str) -> MarketFuture<'a, f64> {
        Box::pin(async move {
            match self.primary.price(symbol).await {
                Ok(price) => Ok(price),
                Err(e) => {
                    warn!(
                        "{} price fetch failed for {}: {}, using {}",
                        self.primary.name(),
                        symbol,
                        e,
                        self.fallback.name()
                    );
                    self.fallback.price(symbol).await
                }
            }
        })
    }

    fn candles<'a>(&'a self, symbol: &'a str, count: usize) -> MarketFuture<'a, Vec<Candle>> {
        Box::pin(async move {
            match self.primary.candles(symbol, count).await {
                Ok(candles) if !candles.is_empty() => Ok(candles),
                Ok(_) => {
                    warn!(
                        "{} returned no candles for {}, using {}",
                        self.primary.name(),
                        symbol,
                        self.fallback.name()
                    );
                    self.fallback.candles(symbol, count).await
                }
                Err(e) => {
                    warn!(
                        "{} candles fetch failed for {}: {}, using {}",
                        self.primary.name(),
                        symbol,
                        e,
                        self.fallback.name()
                    );
                    self.fallback.candles(symbol, count).await
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource {
        price: Option<f64>,
        candles: Vec<Candle>,
    }

    impl MarketDataSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn price<'a>(&'a self, symbol: &'a str) -> MarketFuture<'a, f64> {
            Box::pin(async move {
                self.price
                    .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))
            })
        }

        fn candles<'a>(&'a self, _symbol: &'a str, count: usize) -> MarketFuture<'a, Vec<Candle>> {
            Box::pin(async move { Ok(self.candles.iter().take(count).copied().collect()) })
        }
    }

    fn candle(close: f64) -> Candle {
        Candle {
            time: 0,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    #[tokio::test]
    async fn test_primary_success_is_used() {
        let source = FallbackSource::new(
            Arc::new(FixedSource { price: Some(1.0), candles: vec![candle(1.0)] }),
            Arc::new(FixedSource { price: Some(2.0), candles: vec![candle(2.0)] }),
        );
        assert_eq!(source.price("X").await.unwrap(), 1.0);
        assert_eq!(source.candles("X", 5).await.unwrap()[0].close, 1.0);
    }

    #[tokio::test]
    async fn test_falls_back_on_error_and_empty_candles() {
        let source = FallbackSource::new(
            Arc::new(FixedSource { price: None, candles: vec![] }),
            Arc::new(FixedSource { price: Some(2.0), candles: vec![candle(2.0)] }),
        );
        assert_eq!(source.price("X").await.unwrap(), 2.0);
        assert_eq!(source.candles("X", 5).await.unwrap()[0].close, 2.0);
    }

    #[tokio::test]
    async fn test_fails_when_both_fail() {
        let source = FallbackSource::new(
            Arc::new(FixedSource { price: None, candles: vec![] }),
            Arc::new(FixedSource { price: None, candles: vec![] }),
        );
        assert!(matches!(
            source.price("X").await,
            Err(MarketDataError::UnknownSymbol(_))
        ));
    }
}
