use terminal_integration::SocketError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    #[error("no connector registered for client key '{0}'")]
    RouteUnknown(String),

    #[error("unsupported class code '{0}'")]
    UnsupportedClassCode(String),

    #[error("portfolio not found for {0:?}")]
    PortfolioNotFound(crate::types::PortfolioId),

    #[error("invalid security name '{0}': {1}")]
    InvalidSecurityName(String, String),

    #[error("terminal transport error: {0}")]
    Transport(#[from] SocketError),

    #[error("close failed for one or more brokers: {0}")]
    CloseJoined(String),

    #[error("failed to build struct due to incomplete attributes provided")]
    BuilderIncomplete(),
}
