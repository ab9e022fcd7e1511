//! Market analysis and signal evaluation.
//!
//! `analyze` and `evaluate_signal` are pure; `analyze_asset` fetches the
//! inputs from a market source.

use crate::services::indicators::{self, BOLLINGER_MULTIPLIER, RSI_PERIOD, SMA_PERIOD};
use crate::services::market_data::{MarketDataError, MarketDataSource};
use crate::types::{
    AnalysisResult, Candle, Confidence, RiskLevel, Side, SignalAction, Strength, TradeSignal,
    TradingPreferences, TradingStyle, Trend,
};

/// Candles fetched per analysis.
pub const ANALYSIS_CANDLES: usize = 50;

/// Fetch price and candle history for `symbol` and analyze them.
pub async fn analyze_asset(
    market: &dyn MarketDataSource,
    symbol: &str,
) -> Result<AnalysisResult, MarketDataError> {
    let price = market.price(symbol).await?;
    let candles = market.candles(symbol, ANALYSIS_CANDLES).await?;
    Ok(analyze(
        symbol,
        price,
        &Candle::closes(&candles),
        chrono::Utc::now().timestamp_millis(),
    ))
}

/// Compute indicators and score the trend.
///
/// Bullish points: RSI < 30 (+2) or < 40 (+1), price above SMA20, positive
/// MACD histogram. Bearish mirrors it. A side wins the trend when it leads by
/// more than one point; strength comes from the larger count.
pub fn analyze(symbol: &str, price: f64, closes: &[f64], timestamp: i64) -> AnalysisResult {
    let rsi = indicators::rsi(closes, RSI_PERIOD);
    let sma20 = indicators::sma(closes, SMA_PERIOD);
    let macd = indicators::macd(closes);
    let bollinger = indicators::bollinger_bands(closes, SMA_PERIOD, BOLLINGER_MULTIPLIER);

    let mut bullish = 0u32;
    let mut bearish = 0u32;

    if rsi < 30.0 {
        bullish += 2;
    } else if rsi < 40.0 {
        bullish += 1;
    } else if rsi > 70.0 {
        bearish += 2;
    } else if rsi > 60.0 {
        bearish += 1;
    }

    if price > sma20 {
        bullish += 1;
    } else {
        bearish += 1;
    }

    if macd.histogram > 0.0 {
        bullish += 1;
    } else {
        bearish += 1;
    }

    let trend = if bullish > bearish + 1 {
        Trend::Bullish
    } else if bearish > bullish + 1 {
        Trend::Bearish
    } else {
        Trend::Neutral
    };

    let strength = match bullish.max(bearish) {
        n if n >= 4 => Strength::Strong,
        n if n >= 2 => Strength::Moderate,
        _ => Strength::Weak,
    };

    AnalysisResult {
        symbol: symbol.to_string(),
        timestamp,
        price,
        rsi,
        sma20,
        macd,
        bollinger,
        trend,
        strength,
    }
}

/// RSI (buy, sell) thresholds for the preferences.
pub fn signal_thresholds(prefs: &TradingPreferences) -> (f64, f64) {
    if prefs.style == TradingStyle::Hft || prefs.risk_profile == RiskLevel::Aggressive {
        (48.0, 52.0)
    } else if prefs.style == TradingStyle::DayTrading {
        (40.0, 60.0)
    } else {
        (35.0, 65.0)
    }
}

/// Turn an analysis into a trade signal under the given preferences.
pub fn evaluate_signal(analysis: &AnalysisResult, prefs: &TradingPreferences) -> TradeSignal {
    let (buy_threshold, sell_threshold) = signal_thresholds(prefs);
    let hft = prefs.style == TradingStyle::Hft;
    let rsi = analysis.rsi;

    let mut action = SignalAction::Hold;
    let mut side = None;
    let mut confidence = Confidence::None;
    let mut reasons: Vec<String> = Vec::new();

    if rsi < buy_threshold {
        if rsi < buy_threshold - 10.0 {
            action = SignalAction::Buy;
            confidence = Confidence::High;
            reasons.push(format!("RSI extremely oversold at {:.1}", rsi));
        } else if analysis.price > analysis.sma20 || analysis.macd.histogram > 0.0 {
            action = SignalAction::Buy;
            confidence = Confidence::Medium;
            reasons.push(format!("RSI oversold at {:.1} with trend confirmation", rsi));
        } else if hft {
            action = SignalAction::Buy;
            confidence = Confidence::Medium;
            reasons.push(format!("HFT Mode: Buy on RSI {:.1} dip", rsi));
        } else {
            confidence = Confidence::Low;
            reasons.push(format!("RSI oversold at {:.1} but no confirmation", rsi));
        }
        if action == SignalAction::Buy {
            side = Some(Side::Long);
        }
    }

    if action == SignalAction::Hold && rsi > sell_threshold {
        if rsi > sell_threshold + 10.0 {
            action = SignalAction::Sell;
            confidence = Confidence::High;
            reasons.push(format!("RSI extremely overbought at {:.1}", rsi));
        } else if analysis.price < analysis.sma20 || analysis.macd.histogram < 0.0 {
            action = SignalAction::Sell;
            confidence = Confidence::Medium;
            reasons.push(format!("RSI overbought at {:.1} with trend confirmation", rsi));
        } else if hft {
            action = SignalAction::Sell;
            confidence = Confidence::Medium;
            reasons.push(format!("HFT Mode: Sell on RSI {:.1} spike", rsi));
        } else {
            confidence = Confidence::Low;
            reasons.push(format!("RSI overbought at {:.1} but no confirmation", rsi));
        }
        if action == SignalAction::Sell {
            side = Some(Side::Short);
        }
    }

    // An unconfirmed read still ends as a hold
    if action == SignalAction::Hold {
        reasons.push(format!("RSI at {:.1} is neutral, waiting for better entry", rsi));
        confidence = Confidence::None;
    }

    let (stop_loss, take_profit, position_size) = match side {
        Some(side) => {
            let profile = prefs.risk_profile.profile();
            let (sl, tp) = profile.exit_levels(side, analysis.price);
            (sl, tp, profile.max_position_pct)
        }
        None => (0.0, 0.0, 0.0),
    };

    TradeSignal {
        symbol: analysis.symbol.clone(),
        action,
        side,
        confidence,
        entry_price: analysis.price,
        stop_loss,
        take_profit,
        position_size,
        reasoning: format!(
            "{} | Trend: {} ({})",
            join_reasons(&reasons),
            analysis.trend,
            analysis.strength
        ),
    }
}

fn join_reasons(reasons: &[String]) -> String {
    if reasons.is_empty() {
        "No specific reason".to_string()
    } else {
        reasons.join("; ")
    }
}
