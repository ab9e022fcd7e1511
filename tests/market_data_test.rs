//! Market data sources and fallback wiring

use papertrader::services::autotrader::analyze_asset;
use papertrader::services::{FallbackSource, MarketDataError, MarketDataSource};
use papertrader::sources::{BinanceSource, SyntheticMarket};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn unreachable_binance() -> Arc<BinanceSource> {
    Arc::new(BinanceSource::new(None, false).with_base_url("http://127.0.0.1:9"))
}

/// Serve every request with a 500 whose body is not plain ASCII.
async fn failing_server(body: String) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 500 Internal Server Error\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

// =============================================================================
// Fallback Tests
// =============================================================================

mod fallback_tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_live_source_degrades_to_synthetic() {
        let market = FallbackSource::new(unreachable_binance(), Arc::new(SyntheticMarket::new(3, 0.0)));

        assert_eq!(market.price("BTCUSDT").await.unwrap(), 42500.0);
        assert_eq!(market.candles("ETHUSDT", 50).await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_multibyte_error_body_degrades_to_synthetic() {
        let body = format!("{}é tail {}", "a".repeat(199), "ü".repeat(100));
        let addr = failing_server(body).await;
        let live = Arc::new(BinanceSource::new(None, false).with_base_url(format!("http://{}", addr)));

        match live.price("BTCUSDT").await {
            Err(MarketDataError::Upstream { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body.chars().count(), 200);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let market = FallbackSource::new(live, Arc::new(SyntheticMarket::new(3, 0.0)));
        assert_eq!(market.price("BTCUSDT").await.unwrap(), 42500.0);
        assert_eq!(market.candles("BTCUSDT", 20).await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_analysis_runs_over_fallback() {
        let market = FallbackSource::new(unreachable_binance(), Arc::new(SyntheticMarket::new(3, 0.0)));

        let analysis = analyze_asset(&market, "BTCUSDT").await.unwrap();
        assert_eq!(analysis.symbol, "BTCUSDT");
        assert_eq!(analysis.price, 42500.0);
        assert!((0.0..=100.0).contains(&analysis.rsi));
        assert!(analysis.sma20 > 0.0);
        assert!(analysis.bollinger.upper >= analysis.bollinger.middle);
        assert!(analysis.bollinger.middle >= analysis.bollinger.lower);
    }

    #[tokio::test]
    async fn test_unknown_symbol_fails_on_both_layers() {
        let market = FallbackSource::new(unreachable_binance(), Arc::new(SyntheticMarket::new(3, 0.0)));
        assert!(matches!(
            market.price("NOPE").await,
            Err(MarketDataError::UnknownSymbol(_))
        ));
    }
}

// =============================================================================
// Synthetic Market Tests
// =============================================================================

mod synthetic_tests {
    use super::*;

    #[tokio::test]
    async fn test_candle_history_trends_toward_base() {
        let market = SyntheticMarket::new(8, 0.0);
        let candles = market.candles("XAUUSD", 100).await.unwrap();
        assert!((candles[0].open - 2050.0 * 0.95).abs() < 1e-9);
        assert!(candles.iter().all(|c| c.volume >= 1000.0 && c.volume <= 11000.0));
    }

    #[tokio::test]
    async fn test_price_moves_compound() {
        let market = SyntheticMarket::new(8, 0.0).with_symbol("TEST", 200.0);
        market.simulate_price_move("TEST", 10.0);
        market.simulate_price_move("TEST", -10.0);
        assert!((market.price("TEST").await.unwrap() - 198.0).abs() < 1e-9);
    }
}
