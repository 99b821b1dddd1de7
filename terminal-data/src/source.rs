use crate::error::DataError;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use terminal_integration::{Connector, HistoryCandle, LiveCandle};
use tokio::sync::broadcast;
use tracing::debug;

/// Identifies which instrument/interval a history or subscription request
/// targets. Plain data, not the richer `Security` the broker facade works
/// with — the source only needs enough to address the terminal's wire API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityRef {
    pub class_code: String,
    pub security_code: String,
    pub interval: u32,
}

/// The only entry points of market data into the core: a lazy,
/// fault-propagating sequence of historical candles, and a subscription
/// whose deliveries arrive asynchronously (on the engine inbox, in the
/// concrete deployment).
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn history_candles(
        &self,
        security: &SecurityRef,
        count: u32,
    ) -> Result<Vec<HistoryCandle>, DataError>;

    async fn subscribe(&self, security: &SecurityRef) -> Result<(), DataError>;

    fn live_candles(&self) -> broadcast::Receiver<LiveCandle>;
}

/// Whether a data handler should keep being polled. Mirrors the historic
/// replay/live split: a historical source exhausts itself, a live one never
/// does on its own.
pub trait Continuer {
    fn should_continue(&self) -> bool;
}

/// The reference deployment's [`MarketDataSource`]: the same [`Connector`]
/// used for broker operations, since the terminal multiplexes both over one
/// connection pair.
pub struct ConnectorSource {
    connector: Arc<Connector>,
}

impl ConnectorSource {
    pub fn new(connector: Arc<Connector>) -> Self {
        Self { connector }
    }
}

impl Continuer for ConnectorSource {
    fn should_continue(&self) -> bool {
        !self.connector.is_terminated()
    }
}

#[async_trait]
impl MarketDataSource for ConnectorSource {
    async fn history_candles(
        &self,
        security: &SecurityRef,
        count: u32,
    ) -> Result<Vec<HistoryCandle>, DataError> {
        let candles = self
            .connector
            .last_candles(
                &security.class_code,
                &security.security_code,
                security.interval,
                count,
            )
            .await?;
        let candles = trim_incomplete_today_bar(candles);
        debug!(security = security.security_code, count = candles.len(), "history candles fetched");
        Ok(candles)
    }

    async fn subscribe(&self, security: &SecurityRef) -> Result<(), DataError> {
        self.connector
            .subscribe_candles(&security.class_code, &security.security_code, security.interval)
            .await?;
        debug!(security = security.security_code, interval = security.interval, "subscribed to live candles");
        Ok(())
    }

    fn live_candles(&self) -> broadcast::Receiver<LiveCandle> {
        self.connector.live_candles()
    }
}

/// The last history candle of the current trading day is potentially
/// incomplete and must be dropped before replay. Invariant 8: replay drops
/// the final candle iff its date is today, where "today" is the trading
/// day in the terminal's Europe/Moscow timezone, not UTC.
pub fn trim_incomplete_today_bar(mut candles: Vec<HistoryCandle>) -> Vec<HistoryCandle> {
    if let Some(last) = candles.last() {
        let tz = terminal_integration::tz::trading_tz();
        let today = Utc::now().with_timezone(&tz).date_naive();
        if last.datetime.with_timezone(&tz).date_naive() == today {
            candles.pop();
        }
    }
    candles
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn candle_at(datetime: chrono::DateTime<Utc>) -> HistoryCandle {
        HistoryCandle {
            datetime,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        }
    }

    #[test]
    fn drops_last_bar_only_if_dated_today() {
        let yesterday = Utc::now() - Duration::days(1);
        let candles = vec![candle_at(yesterday), candle_at(Utc::now())];

        let trimmed = trim_incomplete_today_bar(candles);

        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed[0].datetime.date_naive(), yesterday.date_naive());
    }

    #[test]
    fn keeps_all_bars_when_last_is_not_today() {
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let candles = vec![candle_at(old), candle_at(old + Duration::hours(1))];

        let trimmed = trim_incomplete_today_bar(candles);

        assert_eq!(trimmed.len(), 2);
    }
}
