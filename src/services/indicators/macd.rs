//! MACD (Moving Average Convergence Divergence) indicator.

use super::ema;
use crate::types::MacdValue;

pub const FAST_PERIOD: usize = 12;
pub const SLOW_PERIOD: usize = 26;
/// The signal line is approximated as a fixed fraction of the MACD line
/// rather than an EMA of its history.
pub const SIGNAL_FACTOR: f64 = 0.9;

/// MACD line = EMA(12) - EMA(26).
///
/// Signal = 0.9 x MACD, histogram = MACD - signal. All zero below 26 samples.
pub fn macd(prices: &[f64]) -> MacdValue {
    if prices.len() < SLOW_PERIOD {
        return MacdValue::default();
    }

    let macd = ema(prices, FAST_PERIOD) - ema(prices, SLOW_PERIOD);
    let signal = macd * SIGNAL_FACTOR;

    MacdValue {
        macd,
        signal,
        histogram: macd - signal,
    }
}
