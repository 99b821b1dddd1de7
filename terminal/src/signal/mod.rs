use crate::system::SizeConfig;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use terminal_data::{DataError, MarketDataSource, SecurityRef};
use terminal_integration::{HistoryCandle, LiveCandle};
use tracing::{debug, info, warn};

/// Online estimator driving a [`SignalService`]. Opaque by design: the
/// predictor algorithm itself is an external collaborator, not part of the
/// core. `add` returns whether the indicator is warmed up enough to produce
/// a usable [`Indicator::value`].
pub trait Indicator: Send {
    fn add(&mut self, time: DateTime<Utc>, value: f64) -> bool;
    fn value(&self) -> f64;
}

/// An advisory position target derived from one candle.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub name: String,
    pub security_code: String,
    pub datetime: DateTime<Utc>,
    pub price: f64,
    pub prediction: f64,
    /// Unset until a base candle anchors the conversion from prediction to
    /// lots; a signal with this unset must never produce an order.
    pub contracts_per_amount: Option<f64>,
    /// Unset (alongside `contracts_per_amount`) before the base candle;
    /// an unset or passed deadline must never produce an order.
    pub deadline: Option<DateTime<Utc>>,
}

/// `sized(prediction) = weight * clamp(prediction * lever(prediction), ±max_lever)`.
/// Zero iff `prediction` is zero.
pub fn sized_position(prediction: f64, config: &SizeConfig) -> f64 {
    let leveraged = if prediction > 0.0 {
        prediction * config.long_lever
    } else {
        prediction * config.short_lever
    };
    config.weight * leveraged.clamp(-config.max_lever, config.max_lever)
}

/// The largest history-candle count a seed request will ask for (§11).
const HISTORY_CANDLE_COUNT: u32 = 5_000;

/// Per-(security, timeframe) indicator state, converting candles into
/// [`Signal`]s carrying a normalized position target.
pub struct SignalService {
    name: String,
    security: SecurityRef,
    security_name: String,
    lever: f64,
    data_source: Arc<dyn MarketDataSource>,
    indicator: Box<dyn Indicator>,
    size_config: SizeConfig,
    start: DateTime<Utc>,
    base_candle: Option<HistoryCandle>,
    last_signal: Option<Signal>,
}

impl SignalService {
    pub fn new(
        name: impl Into<String>,
        security: SecurityRef,
        security_name: impl Into<String>,
        lever: f64,
        data_source: Arc<dyn MarketDataSource>,
        indicator: Box<dyn Indicator>,
        size_config: SizeConfig,
    ) -> Self {
        Self {
            name: name.into(),
            security,
            security_name: security_name.into(),
            lever,
            data_source,
            indicator,
            size_config,
            // A small back-dated start lets the seed's own final bar still
            // count as the "first fresh" candle if it arrives again live.
            start: Utc::now() - Duration::minutes(10),
            base_candle: None,
            last_signal: None,
        }
    }

    /// Replays history, then subscribes to live candles from a background
    /// task so N services can subscribe without serializing on connector
    /// latency.
    pub async fn init(&mut self) -> Result<(), DataError> {
        let candles = self
            .data_source
            .history_candles(&self.security, HISTORY_CANDLE_COUNT)
            .await?;
        self.seed(candles);

        let data_source = self.data_source.clone();
        let security = self.security.clone();
        tokio::spawn(async move {
            if let Err(err) = data_source.subscribe(&security).await {
                warn!(%err, "subscribe to live candles failed");
            }
        });

        Ok(())
    }

    fn seed(&mut self, candles: Vec<HistoryCandle>) {
        let mut first: Option<HistoryCandle> = None;
        let mut last: Option<HistoryCandle> = None;
        let mut size = 0usize;

        for candle in candles {
            if !self.indicator.add(candle.datetime, candle.close) {
                continue;
            }
            if first.is_none() {
                first = Some(candle);
            }
            size += 1;
            last = Some(candle);
        }

        if size == 0 {
            warn!(name = self.name, security = self.security_name, "History candles empty");
            return;
        }

        let last = last.expect("size > 0 implies last is set");
        self.last_signal = Some(self.make_signal(last.datetime, last.close));
        debug!(?first, ?last, size, "history candles replayed");
        info!(
            name = self.name,
            security = self.security_name,
            datetime = %last.datetime,
            price = last.close,
            "init signal",
        );
    }

    pub fn status_line(&self) -> String {
        match &self.last_signal {
            Some(signal) => format!(
                "{:10} {:10} {:16} {:8} {:.4}",
                self.name,
                self.security_name,
                signal.datetime.format("%Y-%m-%d %H:%M"),
                signal.price,
                signal.prediction,
            ),
            None => format!("{:10} {:10} <no signal yet>", self.name, self.security_name),
        }
    }

    /// Matches the resolved Open Question: live candles are filtered by both
    /// security code and interval, not security alone.
    pub fn on_candle(&mut self, candle: &LiveCandle) -> Option<Signal> {
        if candle.security_code != self.security.security_code || candle.interval != self.security.interval {
            return None;
        }
        if !self.indicator.add(candle.datetime, candle.close) {
            return None;
        }

        let fresh = candle.datetime > self.start;
        if self.base_candle.is_none() && fresh {
            let history = candle.history();
            debug!(datetime = %history.datetime, price = history.close, "init base price");
            self.base_candle = Some(history);
        }

        let signal = self.make_signal(candle.datetime, candle.close);
        self.last_signal = Some(signal.clone());
        if fresh {
            debug!(?signal, "new signal");
        }
        Some(signal)
    }

    fn make_signal(&self, datetime: DateTime<Utc>, price: f64) -> Signal {
        let prediction = self.indicator.value();
        let mut signal = Signal {
            name: self.name.clone(),
            security_code: self.security.security_code.clone(),
            datetime,
            price,
            prediction,
            contracts_per_amount: None,
            deadline: None,
        };

        if let Some(base) = &self.base_candle {
            let position = sized_position(prediction, &self.size_config);
            signal.contracts_per_amount = Some(position / (base.close * self.lever));
            signal.deadline = Some(datetime + Duration::minutes(9));
        }

        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedIndicator(f64);
    impl Indicator for FixedIndicator {
        fn add(&mut self, _time: DateTime<Utc>, _value: f64) -> bool {
            true
        }
        fn value(&self) -> f64 {
            self.0
        }
    }

    #[test]
    fn sizing_clamps_to_max_lever() {
        let config = SizeConfig {
            long_lever: 5.0,
            short_lever: 5.0,
            max_lever: 5.0,
            weight: 1.0,
        };
        assert_eq!(sized_position(0.6, &config), 3.0);
        assert_eq!(sized_position(2.0, &config), 5.0);
        assert_eq!(sized_position(0.0, &config), 0.0);
    }

    #[test]
    fn no_contracts_per_amount_before_base_candle() {
        let security = SecurityRef {
            class_code: "SPBFUT".into(),
            security_code: "SiM0".into(),
            interval: 5,
        };
        struct NoopSource;
        #[async_trait::async_trait]
        impl MarketDataSource for NoopSource {
            async fn history_candles(&self, _: &SecurityRef, _: u32) -> Result<Vec<HistoryCandle>, DataError> {
                Ok(vec![])
            }
            async fn subscribe(&self, _: &SecurityRef) -> Result<(), DataError> {
                Ok(())
            }
            fn live_candles(&self) -> tokio::sync::broadcast::Receiver<LiveCandle> {
                let (tx, rx) = tokio::sync::broadcast::channel(1);
                std::mem::forget(tx);
                rx
            }
        }

        let mut service = SignalService::new(
            "momentum",
            security.clone(),
            "Si-6.20",
            1.0,
            Arc::new(NoopSource),
            Box::new(FixedIndicator(0.6)),
            SizeConfig {
                long_lever: 5.0,
                short_lever: 5.0,
                max_lever: 5.0,
                weight: 1.0,
            },
        );

        // Older than `start` (now - 10min), so this candle is not "fresh" and
        // must not anchor a base candle yet.
        let candle = LiveCandle {
            security_code: security.security_code.clone(),
            interval: security.interval,
            datetime: Utc::now() - Duration::minutes(20),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        };
        let signal = service.on_candle(&candle).expect("matches security+interval");
        assert!(signal.contracts_per_amount.is_none());
    }
}
