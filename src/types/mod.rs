pub mod autotrader;
pub mod market;
pub mod preferences;
pub mod trading;

pub use autotrader::*;
pub use market::*;
pub use preferences::*;
pub use trading::*;
