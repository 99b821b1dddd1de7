pub mod error;

use crate::system::PortfolioConfig;
use error::PortfolioError;
use std::sync::{Arc, OnceLock};
use terminal_execution::{BrokerFacade, PortfolioId};
use tracing::info;

/// Runtime state shared by handle between the [`PortfolioService`] that
/// produces `amount_available` and the [`crate::strategy::StrategyService`]s
/// that read it. Written exactly once at init; `OnceLock` makes that
/// invariant structural rather than merely documented.
pub struct Portfolio {
    pub id: PortfolioId,
    amount_available: OnceLock<f64>,
}

impl Portfolio {
    pub fn new(id: PortfolioId) -> Arc<Self> {
        Arc::new(Self {
            id,
            amount_available: OnceLock::new(),
        })
    }

    pub fn amount_available(&self) -> Option<f64> {
        self.amount_available.get().copied()
    }

    fn set_amount_available(&self, value: f64) {
        // Init runs exactly once per portfolio; a second call is a logic
        // error upstream, not something to silently overwrite.
        let _ = self.amount_available.set(value);
    }
}

/// Computes and caches a portfolio's available capital from broker limits
/// and configured weight/cap, once per session.
pub struct PortfolioService {
    broker: Arc<BrokerFacade>,
    portfolio: Arc<Portfolio>,
    config: PortfolioConfig,
}

impl PortfolioService {
    pub fn new(broker: Arc<BrokerFacade>, portfolio: Arc<Portfolio>, config: PortfolioConfig) -> Self {
        Self {
            broker,
            portfolio,
            config,
        }
    }

    pub async fn init(&self) -> Result<(), PortfolioError> {
        let limits = self.broker.portfolio_limits(&self.portfolio.id).await?;

        let mut available = limits.start_limit_open_pos;
        if self.config.weight != 0.0 {
            available *= self.config.weight;
        }
        if self.config.max_amount != 0.0 {
            available = available.min(self.config.max_amount);
        }

        info!(
            client = self.portfolio.id.client_key,
            portfolio = self.portfolio.id.account_id,
            amount = limits.start_limit_open_pos,
            available_amount = available,
            "init portfolio",
        );
        self.portfolio.set_amount_available(available);
        Ok(())
    }

    pub async fn status_line(&self) -> String {
        match self.broker.portfolio_limits(&self.portfolio.id).await {
            Ok(limits) => {
                let var_margin = limits.acc_var_margin + limits.var_margin;
                let var_margin_ratio = var_margin / limits.start_limit_open_pos;
                let used_ratio = limits.used_lim_open_pos / limits.start_limit_open_pos;
                format!(
                    "{:10} {:10} start: {:10.0} available: {:10.0} varmargin: {:10.0} varmargin%: {:.1} used%: {:.1}",
                    self.portfolio.id.client_key,
                    self.portfolio.id.account_id,
                    limits.start_limit_open_pos,
                    self.portfolio.amount_available().unwrap_or(0.0),
                    var_margin,
                    var_margin_ratio * 100.0,
                    used_ratio * 100.0,
                )
            }
            Err(e) => format!("{}: status unavailable: {e}", self.portfolio.id.client_key),
        }
    }
}
