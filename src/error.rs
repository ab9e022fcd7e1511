use crate::services::autotrader::AutoTraderError;
use crate::services::market_data::MarketDataError;
use crate::services::portfolio::TradingError;
use crate::services::store::StoreError;
use crate::types::{ParseNameError, PreferencesError};
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Trading(#[from] TradingError),

    #[error(transparent)]
    AutoTrader(#[from] AutoTraderError),

    #[error(transparent)]
    Preferences(#[from] PreferencesError),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Parse(#[from] ParseNameError),
}

pub type Result<T> = std::result::Result<T, AppError>;
