//! Technical indicator implementations.
//!
//! Pure functions over closing prices ordered oldest to newest. Every
//! indicator returns a neutral or zero value when the series is shorter than
//! its window.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::bollinger_bands;
pub use ema::ema;
pub use macd::macd;
pub use rsi::rsi;
pub use sma::sma;

/// Default RSI lookback.
pub const RSI_PERIOD: usize = 14;
/// Default SMA / Bollinger window.
pub const SMA_PERIOD: usize = 20;
/// Default Bollinger width in standard deviations.
pub const BOLLINGER_MULTIPLIER: f64 = 2.0;
