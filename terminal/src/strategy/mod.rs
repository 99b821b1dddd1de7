pub mod error;

use crate::portfolio::Portfolio;
use crate::signal::Signal;
use chrono::Utc;
use error::StrategyError;
use std::sync::Arc;
use terminal_execution::{BrokerFacade, Order, Security};
use tracing::warn;

const SLIPPAGE: f64 = 0.001;

fn price_with_slippage(price: f64, volume: i64) -> f64 {
    if volume > 0 {
        price * (1.0 + SLIPPAGE)
    } else {
        price * (1.0 - SLIPPAGE)
    }
}

/// Per-(portfolio, security, signal) decision unit. Consumes signals,
/// translates them to lot deltas, reconciles against the broker, and issues
/// orders. `planned_position` is owned exclusively by the single-threaded
/// event loop and needs no lock.
pub struct StrategyService {
    broker: Arc<BrokerFacade>,
    portfolio: Arc<Portfolio>,
    security: Security,
    signal_name: String,
    planned_position: Option<i64>,
}

impl StrategyService {
    pub fn new(
        broker: Arc<BrokerFacade>,
        portfolio: Arc<Portfolio>,
        security: Security,
        signal_name: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            portfolio,
            security,
            signal_name: signal_name.into(),
            planned_position: None,
        }
    }

    async fn broker_position(&self) -> Result<f64, StrategyError> {
        Ok(self.broker.position(&self.portfolio.id, &self.security).await?)
    }

    pub async fn init(&mut self) -> Result<(), StrategyError> {
        let broker_pos = self.broker_position().await?;
        self.planned_position = Some(broker_pos.round() as i64);
        tracing::info!(
            client = self.portfolio.id.client_key,
            portfolio = self.portfolio.id.account_id,
            security = self.security.name,
            signal = self.signal_name,
            position = self.planned_position,
            "init strategy",
        );
        Ok(())
    }

    pub async fn status_line(&self) -> String {
        let broker_pos = match self.broker_position().await {
            Ok(pos) => pos,
            Err(_) => return format!("{}: status unavailable", self.portfolio.id.client_key),
        };
        let status = match self.planned_position {
            Some(p) if p == broker_pos.round() as i64 => "+",
            _ => "!",
        };
        format!(
            "{:10} {:10} {:10} planned: {:6} broker: {:6} {status}",
            self.portfolio.id.client_key,
            self.portfolio.id.account_id,
            self.security.name,
            self.planned_position.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
            broker_pos.round() as i64,
        )
    }

    /// Returns whether an order was registered, so the caller can schedule a
    /// reconciliation status check. Failures are logged here and never
    /// propagated: the next signal gets a fresh attempt.
    pub async fn on_signal(&mut self, signal: &Signal) -> bool {
        match self.on_signal_inner(signal).await {
            Ok(registered) => registered,
            Err(err) => {
                warn!(
                    client = self.portfolio.id.client_key,
                    security = self.security.name,
                    signal = self.signal_name,
                    %err,
                    "OnSignal failed",
                );
                false
            }
        }
    }

    async fn on_signal_inner(&mut self, signal: &Signal) -> Result<bool, StrategyError> {
        if signal.security_code != self.security.internal_code || signal.name != self.signal_name {
            return Ok(false);
        }

        match signal.deadline {
            Some(deadline) if deadline > Utc::now() => {}
            _ => return Ok(false),
        }

        let Some(available) = self.portfolio.amount_available() else {
            return Ok(false);
        };
        let Some(contracts_per_amount) = signal.contracts_per_amount else {
            return Ok(false);
        };
        let Some(planned) = self.planned_position else {
            return Ok(false);
        };

        let ideal = contracts_per_amount * available;
        let volume = (ideal - planned as f64).trunc() as i64;
        if volume == 0 {
            return Ok(false);
        }

        let broker_pos = self.broker_position().await?;
        if planned != broker_pos.round() as i64 {
            return Err(StrategyError::PositionMismatch {
                planned,
                broker: broker_pos.round() as i64,
            });
        }

        let order = Order {
            portfolio: self.portfolio.id.clone(),
            security: self.security.clone(),
            volume,
            price: price_with_slippage(signal.price, volume),
        };
        self.broker.register_order(&order).await?;

        self.planned_position = Some(planned + volume);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slippage_direction_follows_volume_sign() {
        let buy = price_with_slippage(72_345.37, 1);
        let sell = price_with_slippage(72_345.37, -1);
        assert!(buy > 72_345.37);
        assert!(sell < 72_345.37);
    }
}
