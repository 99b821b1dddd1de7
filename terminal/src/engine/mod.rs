pub mod command_source;
pub mod error;
pub mod trader;

use terminal_integration::LiveCandle;

/// Operator command, sourced from stdin in the reference deployment but
/// deliberately decoupled from it (see [`command_source`]) so another
/// front-end could enqueue the same commands.
#[derive(Debug, Clone)]
pub enum Command {
    Status,
    Exit,
    CloseAll { client: Option<String> },
    /// Accepted by the core (mirrors the original system's domain type) but
    /// unreachable from the stdin command source: no token maps to it there.
    Rebalance { client: Option<String> },
    InitLimits { client: Option<String> },
}

/// Everything that can arrive on a [`trader::Trader`]'s inbox.
#[derive(Debug, Clone)]
pub enum InboxMessage {
    Candle(LiveCandle),
    Command(Command),
}

pub use error::EngineError;
pub use trader::{Trader, TraderBuilder};
