//! Broker facade over the terminal connector: client-key routing, security
//! symbol encoding, and order submission/position queries.

pub mod broker;
pub mod error;
pub mod security;
pub mod types;

pub use broker::{Broker, BrokerFacade, ConnectorBroker};
pub use error::BrokerError;
pub use security::encode_security;
pub use types::{Order, PortfolioId, PortfolioLimits, Security, FUTURES_CLASS_CODE};
