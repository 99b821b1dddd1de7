use crate::engine::error::EngineError;
use crate::engine::{Command, InboxMessage};
use crate::portfolio::PortfolioService;
use crate::signal::SignalService;
use crate::strategy::StrategyService;
use std::sync::Arc;
use std::time::Duration;
use terminal_data::MarketDataSource;
use terminal_execution::BrokerFacade;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{info, warn};

/// Delay before the first reconciliation status check after startup.
const INITIAL_STATUS_DELAY: Duration = Duration::from_secs(1);
/// Delay before the next status check once any order has been registered
/// during a candle fan-out, giving the broker time to settle the fill.
const POST_ORDER_STATUS_DELAY: Duration = Duration::from_secs(10);

/// Owns every [`SignalService`], [`PortfolioService`] and [`StrategyService`]
/// for one terminal session and runs the single-threaded event loop that
/// drives them. All mutation happens on this loop; nothing here is shared
/// across threads except via the inbox channel and the broker facade.
pub struct Trader {
    inbox_tx: mpsc::Sender<InboxMessage>,
    inbox_rx: mpsc::Receiver<InboxMessage>,
    broker: Arc<BrokerFacade>,
    data_sources: Vec<Arc<dyn MarketDataSource>>,
    portfolios: Vec<PortfolioService>,
    signals: Vec<SignalService>,
    strategies: Vec<StrategyService>,
    read_commands_from_stdin: bool,
}

impl Trader {
    pub fn builder() -> TraderBuilder {
        TraderBuilder::new()
    }

    /// `broker -> portfolios -> strategies -> signals`, matching the
    /// dependency order: strategies read broker positions at init, signals
    /// only need a market data subscription which is independent of the
    /// others and safe to start last.
    pub async fn init(&mut self) -> Result<(), EngineError> {
        self.broker.init().await?;

        for portfolio in &self.portfolios {
            portfolio.init().await?;
        }

        for strategy in &mut self.strategies {
            strategy.init().await?;
        }

        for signal in &mut self.signals {
            if let Err(err) = signal.init().await {
                warn!(%err, "signal init failed");
            }
        }

        Ok(())
    }

    pub async fn run(mut self) {
        for source in self.data_sources.iter().cloned() {
            let inbox_tx = self.inbox_tx.clone();
            tokio::spawn(async move {
                let mut live = source.live_candles();
                loop {
                    match live.recv().await {
                        Ok(candle) => {
                            if inbox_tx.send(InboxMessage::Candle(candle)).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "candle forwarder lagged, dropping candles");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }

        if self.read_commands_from_stdin {
            let inbox_tx = self.inbox_tx.clone();
            tokio::spawn(async move {
                let stdin = tokio::io::BufReader::new(tokio::io::stdin());
                crate::engine::command_source::run(stdin, inbox_tx).await;
            });
        }

        self.event_loop().await;
    }

    async fn event_loop(&mut self) {
        let mut next_status_check = Some(Instant::now() + INITIAL_STATUS_DELAY);

        loop {
            let sleep = async {
                match next_status_check {
                    Some(deadline) => time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = sleep => {
                    self.check_status().await;
                    next_status_check = None;
                }
                message = self.inbox_rx.recv() => {
                    match message {
                        Some(InboxMessage::Candle(candle)) => {
                            if self.on_candle(&candle).await {
                                next_status_check = Some(Instant::now() + POST_ORDER_STATUS_DELAY);
                            }
                        }
                        Some(InboxMessage::Command(Command::Status)) => {
                            self.check_status().await;
                        }
                        Some(InboxMessage::Command(Command::Exit)) => {
                            info!("exit command received, stopping trader");
                            break;
                        }
                        Some(InboxMessage::Command(Command::CloseAll { client })) => {
                            warn!(?client, "closeall command received but not wired to any strategy action");
                        }
                        Some(InboxMessage::Command(Command::Rebalance { client })) => {
                            warn!(?client, "rebalance command received but not wired to any strategy action");
                        }
                        Some(InboxMessage::Command(Command::InitLimits { client })) => {
                            warn!(?client, "initlimits command received but not wired to any portfolio action");
                        }
                        None => {
                            info!("inbox closed, stopping trader");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Returns whether any strategy registered an order, so the caller can
    /// reschedule the reconciliation status check sooner.
    async fn on_candle(&mut self, candle: &terminal_integration::LiveCandle) -> bool {
        let mut any_order = false;
        for signal_service in &mut self.signals {
            let Some(signal) = signal_service.on_candle(candle) else {
                continue;
            };
            for strategy in &mut self.strategies {
                if strategy.on_signal(&signal).await {
                    any_order = true;
                }
            }
        }
        any_order
    }

    async fn check_status(&self) {
        println!("{}", self.broker.status_report());

        for signal in &self.signals {
            println!("{}", signal.status_line());
        }
        println!("Total signals: {}", self.signals.len());

        for portfolio in &self.portfolios {
            println!("{}", portfolio.status_line().await);
        }
        println!("Total portfolios: {}", self.portfolios.len());

        for strategy in &self.strategies {
            println!("{}", strategy.status_line().await);
        }
        println!("Total strategies: {}", self.strategies.len());
    }
}

/// Builder to construct [`Trader`] instances.
#[derive(Default)]
pub struct TraderBuilder {
    broker: Option<Arc<BrokerFacade>>,
    data_sources: Vec<Arc<dyn MarketDataSource>>,
    portfolios: Vec<PortfolioService>,
    signals: Vec<SignalService>,
    strategies: Vec<StrategyService>,
    read_commands_from_stdin: bool,
}

impl TraderBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn broker(mut self, value: Arc<BrokerFacade>) -> Self {
        self.broker = Some(value);
        self
    }

    pub fn data_source(mut self, value: Arc<dyn MarketDataSource>) -> Self {
        self.data_sources.push(value);
        self
    }

    pub fn portfolio(mut self, value: PortfolioService) -> Self {
        self.portfolios.push(value);
        self
    }

    pub fn signal(mut self, value: SignalService) -> Self {
        self.signals.push(value);
        self
    }

    pub fn strategy(mut self, value: StrategyService) -> Self {
        self.strategies.push(value);
        self
    }

    pub fn read_commands_from_stdin(mut self, value: bool) -> Self {
        self.read_commands_from_stdin = value;
        self
    }

    pub fn build(self) -> Result<Trader, EngineError> {
        let broker = self.broker.ok_or(EngineError::BuilderIncomplete())?;
        let (inbox_tx, inbox_rx) = mpsc::channel(1024);

        Ok(Trader {
            inbox_tx,
            inbox_rx,
            broker,
            data_sources: self.data_sources,
            portfolios: self.portfolios,
            signals: self.signals,
            strategies: self.strategies,
            read_commands_from_stdin: self.read_commands_from_stdin,
        })
    }
}
