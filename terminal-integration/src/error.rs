use thiserror::Error;

/// Errors surfaced by the terminal [`Connector`](crate::protocol::Connector).
///
/// Transport-level failures (dial, read, decode) are fatal for the connection;
/// [`SocketError::LuaError`] and [`SocketError::Cancelled`] are per-request and
/// leave the connector running.
#[derive(Error, Debug, Clone)]
pub enum SocketError {
    #[error("failed to dial terminal at {0}: {1}")]
    Dial(String, String),

    #[error("read failed on socket: {0}")]
    Read(String),

    #[error("write failed on socket: {0}")]
    Write(String),

    #[error("failed to decode frame: {0}")]
    Decode(String),

    #[error("remote lua error: {0}")]
    LuaError(String),

    #[error("request cancelled before a reply arrived")]
    Cancelled,

    #[error("connection terminated, request abandoned")]
    ConnectionLost,

    #[error("response id {0} has no waiting caller")]
    UnmatchedId(i64),

    #[error("failed to build struct due to incomplete attributes provided")]
    BuilderIncomplete(),
}
