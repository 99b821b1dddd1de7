//! Low-level duplex TCP connector for a locally running trading terminal.
//!
//! A [`connector::Connector`] owns two sockets: a synchronous request/response
//! stream on port `P`, multiplexed by request id, and an asynchronous
//! callback stream on `P+1` that must be continuously drained. Both carry
//! line-delimited JSON encoded in a legacy single-byte Cyrillic codepage;
//! [`codec`] is the only place that encoding is visible.

pub mod candle;
pub mod cancel;
pub mod codec;
pub mod connector;
pub mod error;
pub mod protocol;
pub mod tz;

pub use candle::{HistoryCandle, LiveCandle};
pub use cancel::CancelToken;
pub use connector::Connector;
pub use error::SocketError;
