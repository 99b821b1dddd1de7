use terminal_integration::SocketError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DataError {
    #[error("failed to build struct due to incomplete attributes provided")]
    BuilderIncomplete(),

    #[error("market data source unreachable: {0}")]
    Transport(#[from] SocketError),
}
