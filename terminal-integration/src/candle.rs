use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar produced by historical replay. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct HistoryCandle {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A live bar delivered on the callback stream. Carries the security and
/// interval it was subscribed under, unlike [`HistoryCandle`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LiveCandle {
    pub security_code: String,
    pub interval: u32,
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl LiveCandle {
    pub fn history(&self) -> HistoryCandle {
        HistoryCandle {
            datetime: self.datetime,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}
