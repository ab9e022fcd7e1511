//! Bollinger Bands indicator.

use super::sma;
use crate::types::BollingerBands;

/// SMA(period) +/- `multiplier` population standard deviations over the same
/// window. Zero bands below `period` samples.
pub fn bollinger_bands(prices: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    if period == 0 || prices.len() < period {
        return BollingerBands::default();
    }

    let middle = sma(prices, period);
    let variance = prices[prices.len() - period..]
        .iter()
        .map(|p| (p - middle).powi(2))
        .sum::<f64>()
        / period as f64;
    let std_dev = variance.sqrt();

    BollingerBands {
        upper: middle + std_dev * multiplier,
        middle,
        lower: middle - std_dev * multiplier,
    }
}
