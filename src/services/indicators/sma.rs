//! Simple Moving Average (SMA) indicator.

/// Mean of the last `period` closes.
///
/// Returns 0 when fewer than `period` samples are available or `period` is 0.
pub fn sma(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return 0.0;
    }

    prices[prices.len() - period..].iter().sum::<f64>() / period as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_last_window() {
        let prices = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&prices, 3), 4.0);
        assert_eq!(sma(&prices, 5), 3.0);
    }

    #[test]
    fn test_sma_sums_oldest_first() {
        let prices = [0.1, 0.2, 0.3];
        let mut forward = 0.0;
        for p in prices {
            forward += p;
        }
        let expected = forward / 3.0;

        assert_eq!(sma(&prices, 3).to_bits(), expected.to_bits());
        assert_eq!(sma(&prices, 3), 0.20000000000000004);
    }

    #[test]
    fn test_sma_insufficient_data() {
        assert_eq!(sma(&[1.0, 2.0], 3), 0.0);
        assert_eq!(sma(&[1.0, 2.0], 0), 0.0);
        assert_eq!(sma(&[], 1), 0.0);
    }
}
