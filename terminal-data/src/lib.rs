//! Market-data source over the terminal connector: a lazy history-candle
//! replay and a live-candle subscription. These are the only two entry
//! points of market data into the core engine.

pub mod error;
pub mod source;

pub use error::DataError;
pub use source::{ConnectorSource, Continuer, MarketDataSource, SecurityRef};
