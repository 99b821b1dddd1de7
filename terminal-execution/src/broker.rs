use crate::error::BrokerError;
use crate::types::{Order, PortfolioId, PortfolioLimits, Security, FUTURES_CLASS_CODE};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use terminal_integration::protocol::{Operation, TransactionRequest};
use terminal_integration::Connector;
use tracing::{info, warn};

/// Uniform operations over one underlying connector: limits, position,
/// order. One per client key; the [`BrokerFacade`] picks among them.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn init(&self) -> Result<(), BrokerError>;
    async fn close(&self) -> Result<(), BrokerError>;
    async fn portfolio_limits(&self, portfolio: &PortfolioId) -> Result<PortfolioLimits, BrokerError>;
    async fn position(&self, portfolio: &PortfolioId, security: &Security) -> Result<f64, BrokerError>;
    async fn register_order(&self, order: &Order) -> Result<(), BrokerError>;
    /// Fixed-width status line for the operator-facing report (§10.1).
    fn status_line(&self) -> String;
}

/// The reference deployment's [`Broker`]: the terminal [`Connector`] itself,
/// since limits/position/order all live on the same socket pair as market
/// data.
pub struct ConnectorBroker {
    name: String,
    connector: Arc<Connector>,
}

impl ConnectorBroker {
    pub fn new(name: impl Into<String>, connector: Arc<Connector>) -> Self {
        Self {
            name: name.into(),
            connector,
        }
    }
}

#[async_trait]
impl Broker for ConnectorBroker {
    async fn init(&self) -> Result<(), BrokerError> {
        if !self.connector.is_connected().await? {
            return Err(BrokerError::Transport(
                terminal_integration::SocketError::ConnectionLost,
            ));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn portfolio_limits(&self, portfolio: &PortfolioId) -> Result<PortfolioLimits, BrokerError> {
        let limits = self
            .connector
            .portfolio_info(&portfolio.firm_id, &portfolio.account_id, 0)
            .await?
            .ok_or_else(|| BrokerError::PortfolioNotFound(portfolio.clone()))?;
        Ok(limits.into())
    }

    async fn position(&self, portfolio: &PortfolioId, security: &Security) -> Result<f64, BrokerError> {
        if security.class_code != FUTURES_CLASS_CODE {
            return Err(BrokerError::UnsupportedClassCode(security.class_code.clone()));
        }

        let holding = self
            .connector
            .futures_holding(&portfolio.firm_id, &portfolio.account_id, &security.internal_code, 0)
            .await?;

        match holding {
            Some(h) => Ok(h.totalnet),
            None => {
                warn!(
                    client = portfolio.client_key,
                    security = security.name,
                    "empty position"
                );
                Ok(0.0)
            }
        }
    }

    async fn register_order(&self, order: &Order) -> Result<(), BrokerError> {
        let price = order.security.quantize_price(order.price);
        info!(
            client = order.portfolio.client_key,
            security = order.security.name,
            volume = order.volume,
            price,
            "registering order"
        );

        self.connector
            .send_transaction(TransactionRequest {
                account: order.portfolio.account_id.clone(),
                classcode: order.security.class_code.clone(),
                seccode: order.security.internal_code.clone(),
                quantity: order.volume.unsigned_abs() as u32,
                operation: Operation::from_volume(order.volume),
                price,
            })
            .await?;

        Ok(())
    }

    fn status_line(&self) -> String {
        format!("{:10} {:10}", self.name, "quik")
    }
}

/// Routes incoming operations to the underlying [`Broker`] selected by
/// `client_key`. Unknown keys fail with a routing error; init fans out and
/// aborts on first error; close fans out and joins all errors.
pub struct BrokerFacade {
    brokers: HashMap<String, Arc<dyn Broker>>,
}

impl BrokerFacade {
    pub fn new(brokers: HashMap<String, Arc<dyn Broker>>) -> Self {
        Self { brokers }
    }

    fn route(&self, client_key: &str) -> Result<&Arc<dyn Broker>, BrokerError> {
        self.brokers
            .get(client_key)
            .ok_or_else(|| BrokerError::RouteUnknown(client_key.to_string()))
    }

    pub async fn init(&self) -> Result<(), BrokerError> {
        for broker in self.brokers.values() {
            broker.init().await?;
        }
        Ok(())
    }

    pub async fn close(&self) -> Result<(), BrokerError> {
        let mut errors = Vec::new();
        for (key, broker) in &self.brokers {
            if let Err(e) = broker.close().await {
                errors.push(format!("{key}: {e}"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BrokerError::CloseJoined(errors.join("; ")))
        }
    }

    pub async fn portfolio_limits(&self, portfolio: &PortfolioId) -> Result<PortfolioLimits, BrokerError> {
        self.route(&portfolio.client_key)?
            .portfolio_limits(portfolio)
            .await
    }

    pub async fn position(&self, portfolio: &PortfolioId, security: &Security) -> Result<f64, BrokerError> {
        self.route(&portfolio.client_key)?
            .position(portfolio, security)
            .await
    }

    pub async fn register_order(&self, order: &Order) -> Result<(), BrokerError> {
        self.route(&order.portfolio.client_key)?
            .register_order(order)
            .await
    }

    pub fn status_report(&self) -> String {
        self.brokers
            .values()
            .map(|b| b.status_line())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBroker {
        fail_init: bool,
        fail_close: bool,
    }

    #[async_trait]
    impl Broker for FakeBroker {
        async fn init(&self) -> Result<(), BrokerError> {
            if self.fail_init {
                Err(BrokerError::RouteUnknown("fake".into()))
            } else {
                Ok(())
            }
        }

        async fn close(&self) -> Result<(), BrokerError> {
            if self.fail_close {
                Err(BrokerError::RouteUnknown("fake".into()))
            } else {
                Ok(())
            }
        }

        async fn portfolio_limits(&self, _: &PortfolioId) -> Result<PortfolioLimits, BrokerError> {
            unimplemented!()
        }

        async fn position(&self, _: &PortfolioId, _: &Security) -> Result<f64, BrokerError> {
            unimplemented!()
        }

        async fn register_order(&self, _: &Order) -> Result<(), BrokerError> {
            unimplemented!()
        }

        fn status_line(&self) -> String {
            "fake".to_string()
        }
    }

    #[tokio::test]
    async fn unknown_client_key_fails_routing() {
        let facade = BrokerFacade::new(HashMap::new());
        let portfolio = PortfolioId::new("missing", "firm", "acct");
        let result = facade.portfolio_limits(&portfolio).await;
        assert!(matches!(result, Err(BrokerError::RouteUnknown(_))));
    }

    #[tokio::test]
    async fn close_joins_all_errors() {
        let mut brokers: HashMap<String, Arc<dyn Broker>> = HashMap::new();
        brokers.insert(
            "a".to_string(),
            Arc::new(FakeBroker {
                fail_init: false,
                fail_close: true,
            }),
        );
        brokers.insert(
            "b".to_string(),
            Arc::new(FakeBroker {
                fail_init: false,
                fail_close: true,
            }),
        );
        let facade = BrokerFacade::new(brokers);

        let result = facade.close().await;
        match result {
            Err(BrokerError::CloseJoined(msg)) => {
                assert!(msg.contains('a') || msg.contains('b'));
            }
            other => panic!("expected CloseJoined, got {other:?}"),
        }
    }
}
