use crate::error::BrokerError;

/// The class code identifying futures instruments. Position operations
/// branch on this; any other class code is rejected without contacting the
/// broker.
pub const FUTURES_CLASS_CODE: &str = "SPBFUT";

/// Routes a trading pair to a connector (by `client_key`) and addresses a
/// portfolio inside that terminal (by `firm_id` + `account_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortfolioId {
    pub client_key: String,
    pub firm_id: String,
    pub account_id: String,
}

impl PortfolioId {
    pub fn new(
        client_key: impl Into<String>,
        firm_id: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            client_key: client_key.into(),
            firm_id: firm_id.into(),
            account_id: account_id.into(),
        }
    }
}

/// Tradeable instrument. `price_step` must be > 0 and `price_precision` must
/// be consistent with it: prices are rounded to the nearest multiple of
/// `price_step`, then formatted with `price_precision` decimal digits.
#[derive(Debug, Clone, PartialEq)]
pub struct Security {
    pub name: String,
    pub internal_code: String,
    pub class_code: String,
    pub price_precision: u32,
    pub price_step: f64,
    pub price_step_cost: f64,
    pub lever: f64,
}

impl Security {
    pub fn builder() -> SecurityBuilder {
        SecurityBuilder::default()
    }

    /// Rounds `price` to the nearest multiple of `price_step` and formats it
    /// to `price_precision` decimal digits. Idempotent under re-parse+format.
    pub fn quantize_price(&self, price: f64) -> String {
        let rounded = if self.price_step != 0.0 {
            (price / self.price_step).round() * self.price_step
        } else {
            price
        };
        format!("{:.*}", self.price_precision as usize, rounded)
    }
}

#[derive(Debug, Default)]
pub struct SecurityBuilder {
    name: Option<String>,
    internal_code: Option<String>,
    class_code: Option<String>,
    price_precision: Option<u32>,
    price_step: Option<f64>,
    price_step_cost: Option<f64>,
    lever: Option<f64>,
}

impl SecurityBuilder {
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = Some(value.into());
        self
    }

    pub fn internal_code(mut self, value: impl Into<String>) -> Self {
        self.internal_code = Some(value.into());
        self
    }

    pub fn class_code(mut self, value: impl Into<String>) -> Self {
        self.class_code = Some(value.into());
        self
    }

    pub fn price_precision(mut self, value: u32) -> Self {
        self.price_precision = Some(value);
        self
    }

    pub fn price_step(mut self, value: f64) -> Self {
        self.price_step = Some(value);
        self
    }

    pub fn price_step_cost(mut self, value: f64) -> Self {
        self.price_step_cost = Some(value);
        self
    }

    pub fn lever(mut self, value: f64) -> Self {
        self.lever = Some(value);
        self
    }

    pub fn build(self) -> Result<Security, BrokerError> {
        let price_step = self.price_step.ok_or(BrokerError::BuilderIncomplete())?;
        if price_step <= 0.0 {
            return Err(BrokerError::InvalidSecurityName(
                self.name.unwrap_or_default(),
                "price_step must be > 0".to_string(),
            ));
        }

        Ok(Security {
            name: self.name.ok_or(BrokerError::BuilderIncomplete())?,
            internal_code: self.internal_code.ok_or(BrokerError::BuilderIncomplete())?,
            class_code: self.class_code.ok_or(BrokerError::BuilderIncomplete())?,
            price_precision: self.price_precision.ok_or(BrokerError::BuilderIncomplete())?,
            price_step,
            price_step_cost: self
                .price_step_cost
                .ok_or(BrokerError::BuilderIncomplete())?,
            lever: self.lever.ok_or(BrokerError::BuilderIncomplete())?,
        })
    }
}

/// Snapshot of broker-side limits for one portfolio. Produced only by the
/// broker facade; consumers never mutate it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioLimits {
    pub start_limit_open_pos: f64,
    pub used_lim_open_pos: f64,
    pub var_margin: f64,
    pub acc_var_margin: f64,
}

impl From<terminal_integration::protocol::PortfolioLimits> for PortfolioLimits {
    fn from(wire: terminal_integration::protocol::PortfolioLimits) -> Self {
        Self {
            start_limit_open_pos: wire.start_limit_open_pos,
            used_lim_open_pos: wire.used_lim_open_pos,
            var_margin: wire.var_margin,
            acc_var_margin: wire.acc_var_margin,
        }
    }
}

/// An instruction to move a portfolio's net position by a signed volume.
/// Positive volume buys, negative sells. Volume = 0 is not a legal order.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub portfolio: PortfolioId,
    pub security: Security,
    pub volume: i64,
    pub price: f64,
}
