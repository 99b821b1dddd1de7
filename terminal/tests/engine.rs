//! Wires a whole trader (signal -> portfolio -> strategy -> engine) against
//! fake broker/data-source collaborators and drives one live candle through
//! it end to end, verifying an order is registered with the expected volume.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use terminal::engine::Trader;
use terminal::portfolio::{Portfolio, PortfolioService};
use terminal::signal::{Indicator, SignalService};
use terminal::strategy::StrategyService;
use terminal::system::{PortfolioConfig, SizeConfig};
use terminal_data::{DataError, MarketDataSource, SecurityRef};
use terminal_execution::{Broker, BrokerError, BrokerFacade, Order, PortfolioId, PortfolioLimits, Security};
use terminal_integration::{HistoryCandle, LiveCandle};
use tokio::sync::broadcast;

struct FakeBroker {
    orders: Arc<Mutex<Vec<Order>>>,
}

#[async_trait]
impl Broker for FakeBroker {
    async fn init(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn portfolio_limits(&self, _: &PortfolioId) -> Result<PortfolioLimits, BrokerError> {
        Ok(PortfolioLimits {
            start_limit_open_pos: 1000.0,
            used_lim_open_pos: 0.0,
            var_margin: 0.0,
            acc_var_margin: 0.0,
        })
    }

    async fn position(&self, _: &PortfolioId, _: &Security) -> Result<f64, BrokerError> {
        Ok(0.0)
    }

    async fn register_order(&self, order: &Order) -> Result<(), BrokerError> {
        self.orders.lock().unwrap().push(order.clone());
        Ok(())
    }

    fn status_line(&self) -> String {
        "fake".to_string()
    }
}

struct FakeSource {
    tx: broadcast::Sender<LiveCandle>,
}

#[async_trait]
impl MarketDataSource for FakeSource {
    async fn history_candles(&self, _: &SecurityRef, _: u32) -> Result<Vec<HistoryCandle>, DataError> {
        Ok(vec![])
    }

    async fn subscribe(&self, _: &SecurityRef) -> Result<(), DataError> {
        Ok(())
    }

    fn live_candles(&self) -> broadcast::Receiver<LiveCandle> {
        self.tx.subscribe()
    }
}

struct ConstantIndicator;
impl Indicator for ConstantIndicator {
    fn add(&mut self, _time: DateTime<Utc>, _value: f64) -> bool {
        true
    }
    fn value(&self) -> f64 {
        1.0
    }
}

#[tokio::test]
async fn candle_flows_through_to_a_registered_order() {
    let orders = Arc::new(Mutex::new(Vec::new()));
    let mut brokers = std::collections::HashMap::new();
    brokers.insert(
        "acme".to_string(),
        Arc::new(FakeBroker { orders: orders.clone() }) as Arc<dyn Broker>,
    );
    let broker_facade = Arc::new(BrokerFacade::new(brokers));

    let (candle_tx, _) = broadcast::channel(16);
    let source: Arc<dyn MarketDataSource> = Arc::new(FakeSource { tx: candle_tx.clone() });

    let security_ref = SecurityRef {
        class_code: "SPBFUT".into(),
        security_code: "SiM4".into(),
        interval: 5,
    };
    let security = Security::builder()
        .name("Si-6.24")
        .internal_code("SiM4")
        .class_code("SPBFUT")
        .price_precision(0)
        .price_step(1.0)
        .price_step_cost(1.0)
        .lever(1.0)
        .build()
        .unwrap();

    let portfolio_id = PortfolioId::new("acme", "firm1", "acct1");
    let portfolio = Portfolio::new(portfolio_id.clone());
    let portfolio_service = PortfolioService::new(
        broker_facade.clone(),
        portfolio.clone(),
        PortfolioConfig {
            weight: 0.0,
            max_amount: 0.0,
        },
    );

    let signal_service = SignalService::new(
        "momentum",
        security_ref.clone(),
        "Si-6.24",
        1.0,
        source.clone(),
        Box::new(ConstantIndicator),
        SizeConfig {
            long_lever: 5.0,
            short_lever: 5.0,
            max_lever: 5.0,
            weight: 1.0,
        },
    );

    let strategy_service = StrategyService::new(
        broker_facade.clone(),
        portfolio.clone(),
        security,
        "momentum",
    );

    let mut trader = Trader::builder()
        .broker(broker_facade)
        .data_source(source)
        .portfolio(portfolio_service)
        .signal(signal_service)
        .strategy(strategy_service)
        .build()
        .unwrap();

    trader.init().await.unwrap();

    let handle = tokio::spawn(trader.run());

    // `trader.run()` spawns its candle forwarder (which subscribes via
    // `source.live_candles()`) asynchronously; under the current-thread test
    // runtime that spawn doesn't get polled until this task yields. Wait for
    // the subscription to actually exist before sending, or the candle has no
    // receiver and is silently (or, with `.unwrap()`, not so silently) lost.
    while candle_tx.receiver_count() == 0 {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    candle_tx
        .send(LiveCandle {
            security_code: "SiM4".into(),
            interval: 5,
            datetime: Utc::now(),
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
            volume: 1.0,
        })
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    handle.abort();

    let registered = orders.lock().unwrap();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].volume, 50);
}
