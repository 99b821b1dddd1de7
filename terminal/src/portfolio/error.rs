use terminal_execution::BrokerError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PortfolioError {
    #[error("failed to build struct due to incomplete attributes provided")]
    BuilderIncomplete(),

    #[error("broker error while servicing portfolio: {0}")]
    Broker(#[from] BrokerError),
}
