use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request frame written on socket `P`. Every outgoing line is one of these,
/// cp1251-encoded by [`crate::codec`].
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub id: i64,
    pub cmd: String,
    pub t: i64,
    pub data: Value,
}

/// Response frame read back on socket `P`, correlated to a [`Request`] by `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub id: i64,
    #[allow(dead_code)]
    pub cmd: String,
    #[serde(default)]
    pub t: f64,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub lua_error: String,
}

/// Unsolicited frame read on socket `P+1`. Carries no `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct Callback {
    pub cmd: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub t: f64,
    #[serde(default)]
    pub data: Value,
}

/// Known high-volume or structurally interesting callback commands. Anything
/// else is drained and dropped at the connector boundary without decoding.
pub mod cmd {
    pub const ON_CONNECTED: &str = "OnConnected";
    pub const ON_DISCONNECTED: &str = "OnDisconnected";
    pub const ON_TRADE: &str = "OnTrade";
    pub const NEW_CANDLE: &str = "NewCandle";
    pub const ON_PARAM: &str = "OnParam";
    pub const ON_FUTURES_LIMIT_CHANGE: &str = "OnFuturesLimitChange";
    pub const ON_FUTURES_CLIENT_HOLDING: &str = "OnFuturesClientHolding";
}

/// Request-side commands understood by the terminal. Kept as plain strings
/// rather than an enum since the terminal's command set is open-ended and
/// only a handful are consumed by this core.
pub mod req {
    pub const IS_CONNECTED: &str = "isConnected";
    pub const GET_PORTFOLIO_INFO: &str = "GetPortfolioInfo";
    pub const GET_FUTURES_HOLDING: &str = "getFuturesHolding";
    pub const SEND_TRANSACTION: &str = "sendTransaction";
    pub const GET_CANDLES: &str = "getCandles";
    pub const SUBSCRIBE_CANDLES: &str = "SubscribeCandles";
}

/// Portfolio limits snapshot, as returned by `GetPortfolioInfo`. A `None`
/// response from the terminal (no such portfolio) must be surfaced as
/// [`Option::None`], never masked as zeros.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PortfolioLimits {
    pub start_limit_open_pos: f64,
    pub used_lim_open_pos: f64,
    #[serde(rename = "varmargin")]
    pub var_margin: f64,
    #[serde(rename = "fut_accured_int")]
    pub acc_var_margin: f64,
}

/// Net futures position for one (firm, account, security, pos-type) tuple.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FuturesHolding {
    pub totalnet: f64,
}

/// Buy/sell side of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "B")]
    Buy,
    #[serde(rename = "S")]
    Sell,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Buy => "B",
            Operation::Sell => "S",
        }
    }

    pub fn from_volume(volume: i64) -> Self {
        if volume >= 0 {
            Operation::Buy
        } else {
            Operation::Sell
        }
    }
}

/// Fields the terminal requires for `NEW_ORDER`, before `TRANS_ID` and
/// `CLIENT_CODE` are assigned by the connector.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub account: String,
    pub classcode: String,
    pub seccode: String,
    pub quantity: u32,
    pub operation: Operation,
    pub price: String,
}

/// Acknowledgement of a submitted transaction, carrying the id the connector
/// assigned so the caller can correlate later callbacks if needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransactionAck {
    pub trans_id: i64,
}
