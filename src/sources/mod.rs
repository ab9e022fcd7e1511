pub mod binance;
pub mod synthetic;

pub use binance::BinanceSource;
pub use synthetic::SyntheticMarket;
