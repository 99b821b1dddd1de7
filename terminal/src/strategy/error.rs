use terminal_execution::BrokerError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum StrategyError {
    #[error("failed to build struct due to incomplete attributes provided")]
    BuilderIncomplete(),

    #[error("position check failed: planned {planned} != broker {broker}")]
    PositionMismatch { planned: i64, broker: i64 },

    #[error("broker error while servicing strategy: {0}")]
    Broker(#[from] BrokerError),
}
