//! Exponential Moving Average (EMA) indicator.

use super::sma;

/// EMA of the whole series, seeded with the SMA of the first `period` closes.
///
/// Smoothing factor is `2 / (period + 1)`. Returns 0 below the window.
pub fn ema(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return 0.0;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = sma(&prices[..period], period);

    prices[period..]
        .iter()
        .fold(seed, |ema, price| (price - ema) * multiplier + ema)
}
