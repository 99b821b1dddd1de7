use crate::portfolio::error::PortfolioError;
use crate::strategy::error::StrategyError;
use terminal_execution::BrokerError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("failed to build struct due to incomplete attributes provided")]
    BuilderIncomplete(),

    #[error("broker error during engine init: {0}")]
    Broker(#[from] BrokerError),

    #[error("portfolio error during engine init: {0}")]
    Portfolio(#[from] PortfolioError),

    #[error("strategy error during engine init: {0}")]
    Strategy(#[from] StrategyError),
}
