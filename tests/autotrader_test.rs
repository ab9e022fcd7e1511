//! Auto-trader loop behavior
//!
//! Tests cover:
//! - Single iterations driven by controlled candle history
//! - Stop-loss exits and profit-target events
//! - Background loop lifecycle and cancellation

use papertrader::services::{AutoTrader, AutoTraderError, Portfolio};
use papertrader::sources::SyntheticMarket;
use papertrader::types::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

fn candles(closes: impl IntoIterator<Item = f64>) -> Vec<Candle> {
    closes
        .into_iter()
        .enumerate()
        .map(|(i, close)| Candle {
            time: i as i64 * 3_600_000,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Steady decline: RSI 0.
fn oversold() -> Vec<Candle> {
    candles((0..50).map(|i| 150.0 - i as f64))
}

/// Alternating closes: RSI 50.
fn neutral() -> Vec<Candle> {
    candles((0..50).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }))
}

fn prefs(assets: &[&str], style: TradingStyle) -> TradingPreferences {
    let mut prefs = TradingPreferences::default_for("tester");
    prefs.assets = assets.iter().map(|s| s.to_string()).collect();
    prefs.style = style;
    prefs.risk_profile = RiskLevel::Conservative;
    prefs.auto_trade = true;
    prefs
}

fn setup(budget: f64, floor: f64, level: RiskLevel) -> (Arc<SyntheticMarket>, Arc<AutoTrader>) {
    let market = Arc::new(SyntheticMarket::new(5, 0.0).with_symbol("TEST", 100.0));
    market.set_candles("TEST", neutral());
    let portfolio = Arc::new(Portfolio::new(budget, floor, level, market.clone(), None).unwrap());
    (market, Arc::new(AutoTrader::new(portfolio, 50)))
}

// =============================================================================
// Iteration Tests
// =============================================================================

mod iteration_tests {
    use super::*;

    #[tokio::test]
    async fn test_oversold_buy_then_stop_loss_exit() {
        let (market, trader) = setup(10.0, 7.0, RiskLevel::Conservative);
        let mut events = trader.subscribe();
        trader.set_preferences(prefs(&["TEST"], TradingStyle::Swing));

        market.set_candles("TEST", oversold());
        trader.run_once().await;

        let portfolio = trader.portfolio();
        let positions = portfolio.positions().await;
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].side, Side::Long);
        assert!((positions[0].entry_value() - 1.0).abs() < 1e-9);
        assert!((positions[0].stop_loss - 98.0).abs() < 1e-9);

        match events.try_recv().unwrap() {
            TradingEvent::TradeOpened { symbol, side, amount, .. } => {
                assert_eq!(symbol, "TEST");
                assert_eq!(side, Side::Long);
                assert!((amount - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        market.set_candles("TEST", neutral());
        market.simulate_price_move("TEST", -5.0);
        trader.run_once().await;

        assert_eq!(portfolio.open_position_count().await, 0);
        assert!((portfolio.total_pnl().await + 0.05).abs() < 1e-9);

        match events.try_recv().unwrap() {
            TradingEvent::TradeClosed { trade, reason } => {
                assert_eq!(trade.symbol, "TEST");
                assert_eq!(reason, "Stop-loss triggered");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let actions: Vec<(DecisionAction, bool)> = trader
            .decisions()
            .iter()
            .map(|d| (d.action, d.executed))
            .collect();
        assert_eq!(
            actions,
            vec![
                (DecisionAction::Buy, true),
                (DecisionAction::Hold, false),
                (DecisionAction::Close, true),
            ]
        );
    }

    #[tokio::test]
    async fn test_overbought_opens_short() {
        let (market, trader) = setup(10.0, 7.0, RiskLevel::Conservative);
        trader.set_preferences(prefs(&["TEST"], TradingStyle::Swing));

        market.set_candles("TEST", candles((0..50).map(|i| 50.0 + i as f64)));
        trader.run_once().await;

        let positions = trader.portfolio().positions().await;
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].side, Side::Short);
        assert!((positions[0].stop_loss - 102.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rejected_trade_recorded_with_reason() {
        // Floor leaves $0.50 of headroom, below the $1 sizing
        let (market, trader) = setup(10.0, 9.5, RiskLevel::Conservative);
        trader.set_preferences(prefs(&["TEST"], TradingStyle::Swing));
        market.set_candles("TEST", oversold());

        trader.run_once().await;

        let decisions = trader.decisions();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].action, DecisionAction::Buy);
        assert!(!decisions[0].executed);
        let reason = decisions[0].error_reason.as_deref().unwrap();
        assert_eq!(
            reason,
            "risk check failed: Trade too large. Max allowed: $0.50 to maintain floor."
        );
        assert_eq!(trader.portfolio().open_position_count().await, 0);
    }

    #[tokio::test]
    async fn test_analysis_failure_recorded_as_hold() {
        let (_market, trader) = setup(10.0, 7.0, RiskLevel::Conservative);
        trader.set_preferences(prefs(&["NOPE", "TEST"], TradingStyle::Swing));

        trader.run_once().await;

        let decisions = trader.decisions();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].symbol, "NOPE");
        assert_eq!(decisions[0].action, DecisionAction::Hold);
        assert_eq!(decisions[0].reasoning, "Analysis failed");
        assert!(decisions[0].error_reason.is_some());
        assert!(decisions[0].analysis.is_none());

        assert_eq!(decisions[1].symbol, "TEST");
        assert!(decisions[1].analysis.is_some());
        assert!(decisions[1].error_reason.is_none());
    }

    #[tokio::test]
    async fn test_stopped_portfolio_skips_iteration() {
        let (market, trader) = setup(10.0, 9.0, RiskLevel::Aggressive);
        trader.set_preferences(prefs(&["TEST"], TradingStyle::Swing));
        trader
            .portfolio()
            .open_position("TEST", Side::Long, 1.0)
            .await
            .unwrap();
        market.set_price("TEST", 0.0);

        trader.run_once().await;

        let status = trader.status().await;
        assert_eq!(status.loop_count, 1);
        assert!(status.recent_decisions.is_empty());
        assert!(status.current_analysis.is_empty());
    }

    #[tokio::test]
    async fn test_profit_target_event_on_realized_gain() {
        let (market, trader) = setup(10.0, 7.0, RiskLevel::Conservative);
        let mut events = trader.subscribe();
        trader.set_preferences(prefs(&["TEST"], TradingStyle::Swing));

        let portfolio = trader.portfolio();
        let pos = portfolio.open_position("TEST", Side::Long, 1.0).await.unwrap();
        market.set_price("TEST", 300.0);
        portfolio.close_position(&pos.id).await.unwrap();

        trader.run_once().await;

        match events.try_recv().unwrap() {
            TradingEvent::ProfitTargetReached {
                current_pnl,
                profit_pct,
                target_pct,
                ..
            } => {
                assert!((current_pnl - 2.0).abs() < 1e-9);
                assert!((profit_pct - 20.0).abs() < 1e-6);
                assert!((target_pct - 10.0).abs() < 1e-9);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_reports_latest_analysis() {
        let (_market, trader) = setup(10.0, 7.0, RiskLevel::Conservative);
        trader.set_preferences(prefs(&["TEST"], TradingStyle::DayTrading));

        trader.run_once().await;

        let status = trader.status().await;
        assert!(!status.running);
        assert_eq!(status.interval_secs, 30);
        assert_eq!(status.assets_monitored, vec!["TEST".to_string()]);
        let analysis = status.current_analysis.get("TEST").unwrap();
        assert_eq!(analysis.rsi, 50.0);
        assert_eq!(status.recent_decisions.len(), 1);
        assert!(status.last_loop_at.is_some());
    }
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_start_runs_first_iteration_immediately() {
        let (_market, trader) = setup(10.0, 7.0, RiskLevel::Conservative);
        trader.set_preferences(prefs(&["TEST"], TradingStyle::Hft));

        trader.start().unwrap();
        assert!(trader.is_running());
        assert!(matches!(trader.start(), Err(AutoTraderError::AlreadyRunning)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let status = trader.status().await;
        assert!(status.running);
        assert_eq!(status.loop_count, 1);
        assert!(status.started_at.is_some());
        assert_eq!(
            status.message,
            "Auto-trading running. Loop #1, monitoring 1 assets."
        );

        let before = trader.decisions();
        assert_eq!(before.len(), 1);

        trader.stop().unwrap();
        assert!(!trader.is_running());
        assert!(matches!(trader.stop(), Err(AutoTraderError::NotRunning)));
        assert_eq!(trader.status().await.message, "Auto-trading is stopped.");

        // Stopping records nothing
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(trader.decisions(), before);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (_market, trader) = setup(10.0, 7.0, RiskLevel::Conservative);
        trader.set_preferences(prefs(&["TEST"], TradingStyle::Hft));

        trader.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        trader.stop().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        trader.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(trader.is_running());
        // Loop count restarts with each run
        assert_eq!(trader.status().await.loop_count, 1);
        trader.stop().unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_marks_stopped() {
        let (_market, trader) = setup(10.0, 7.0, RiskLevel::Conservative);
        trader.set_preferences(prefs(&["TEST"], TradingStyle::Hft));

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        trader
            .start_with_cancellation(async move {
                let _ = cancel_rx.await;
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(trader.is_running());

        cancel_tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!trader.is_running());
        assert!(matches!(trader.stop(), Err(AutoTraderError::NotRunning)));
    }

    #[tokio::test]
    async fn test_preference_change_updates_interval_while_running() {
        let (_market, trader) = setup(10.0, 7.0, RiskLevel::Conservative);
        trader.set_preferences(prefs(&["TEST"], TradingStyle::Hft));
        trader.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        trader.set_preferences(prefs(&["TEST", "BTCUSDT"], TradingStyle::Hold));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let status = trader.status().await;
        assert!(status.running);
        assert_eq!(status.interval_secs, 300);
        assert_eq!(status.assets_monitored.len(), 2);
        // The rebuilt interval does not fire early
        assert_eq!(status.loop_count, 1);
        trader.stop().unwrap();
    }
}
