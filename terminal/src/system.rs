//! Typed construction points for callers (the excluded CLI/XML loader) to
//! hand validated configuration to the core. No file parsing lives here,
//! only the shapes an external loader would populate.

use std::net::IpAddr;

/// Host/port of one terminal connector. `port` is `P`; the callback socket
/// is always `P + 1`.
#[derive(Debug, Clone, Copy)]
pub struct ConnectorConfig {
    pub host: IpAddr,
    pub port: u16,
}

/// Scales a raw prediction into a sized position. All four fields are
/// non-negative by invariant; `sized(prediction)` is zero iff `prediction`
/// is zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeConfig {
    pub long_lever: f64,
    pub short_lever: f64,
    pub max_lever: f64,
    pub weight: f64,
}

/// `weight == 0.0` and `max_amount == 0.0` are sentinels meaning "disabled":
/// the corresponding scaling/capping step is skipped entirely rather than
/// collapsing available capital to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioConfig {
    pub weight: f64,
    pub max_amount: f64,
}
