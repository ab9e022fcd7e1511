//! Papertrader - paper trading engine with an indicator-driven auto-trader

pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

pub use config::EngineConfig;
pub use error::{AppError, Result};
pub use services::TradingSystem;
