//! Drives a terminal [`terminal_integration::Connector`] with signal
//! estimators and portfolio/strategy bookkeeping to bridge a brokerage
//! terminal with external signal sources.
//!
//! The **main components** are **Signal**, **Portfolio**, **Strategy** &
//! **Engine**. Signal services turn candles into sized position targets,
//! portfolio services compute available capital per account, strategy
//! services reconcile targets against broker state and register orders, and
//! the engine's [`engine::Trader`] ties them together on one event loop.

/// Converts candles into sized [`signal::Signal`]s via a pluggable
/// [`signal::Indicator`].
pub mod signal;

/// Computes and caches available capital per brokerage account.
pub mod portfolio;

/// Reconciles signal targets against broker state and registers orders.
pub mod strategy;

/// Ties signal, portfolio, strategy and broker services together on one
/// event loop, with an operator command source layered on top.
pub mod engine;

/// Typed construction points for configuration supplied by an external
/// loader.
pub mod system;

/// Structured logging setup.
pub mod logging;
