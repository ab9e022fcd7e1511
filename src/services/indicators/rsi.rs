//! Relative Strength Index (RSI) indicator.

/// RSI over the last `period` price changes.
///
/// Gains and losses are summed over the window (no Wilder smoothing):
/// - fewer than `period + 1` samples: 50 (neutral)
/// - no losses in the window: 100
/// - otherwise `100 - 100 / (1 + avg_gain / avg_loss)`
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return 50.0;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;

    for window in prices[prices.len() - period - 1..].windows(2) {
        let change = window[1] - window[0];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    if losses == 0.0 {
        return 100.0;
    }

    let rs = (gains / period as f64) / (losses / period as f64);
    100.0 - (100.0 / (1.0 + rs))
}
