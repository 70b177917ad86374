//! Core types and algorithms for mirroring liquidity from one or more
//! source order books onto a target account, as a continuously adjusted
//! resting book rather than a one-shot copy.
//!
//! ## Modules
//! - [`core`]: identifiers, the `Side`/`Order` data model, and the error
//!   taxonomy every other module reports through.
//! - [`orderbook`]: book aggregation, volume capping, and the open-order
//!   cache a target book is diffed against.
//! - [`scheduler`]: the diff algorithm that turns current vs. desired book
//!   state into the minimal create/cancel sequence.
//! - [`adapter`]: the exchange-facing trait every venue integration
//!   implements; the core never talks to a venue directly.
//! - [`execution`]: per-account FIFO dispatch queues, rate limiting, and
//!   open-order reconciliation.
//! - [`config`]: the runtime JSON configuration document.
//! - [`monitoring`]: Prometheus metrics and the scrape HTTP server.
//! - [`resilience`]: retry policy for transient exchange failures.
//! - [`risk`]: rate limiting for exchange-facing order traffic.
//! - [`strategy`]: the trait object contract strategy crates implement.
//! - [`reactor`]: owns accounts/markets/strategies and drives periodic ticks.
//! - [`utils`]: logging setup.

pub mod adapter;
pub mod config;
pub mod core;
pub mod execution;
pub mod monitoring;
pub mod orderbook;
pub mod plugins;
pub mod reactor;
pub mod resilience;
pub mod risk;
pub mod scheduler;
pub mod strategy;
pub mod utils;

pub use anyhow::{Error, Result};

/// Convenience re-exports for the types most call sites need.
pub mod prelude {
    pub use crate::adapter::{AdapterError, AdapterErrorKind, Balance, ExchangeAdapter, MarketConfig, StreamSink};
    pub use crate::core::{
        AccountId, ConfigurationError, ExecutionError, MarketId, Order, OrderType, PricePoint,
        PrivateTrade, PublicTrade, Side, StrategyId,
    };
    pub use crate::execution::{Executor, ReconciliationReport};
    pub use crate::orderbook::{AggregatedOrderbook, OpenOrders, Orderbook};
    pub use crate::plugins::{BalanceLimitPlugin, SideLimits};
    pub use crate::reactor::{Reactor, ReactorSink};
    pub use crate::scheduler::{Action, PriceLevels, Scheduler, SchedulerOptions, SideCaps};
    pub use crate::strategy::{DesiredBook, Strategy};
}
