//! The runtime configuration document: accounts, markets, and the strategy
//! instances that mirror liquidity between them.
//!
//! Unlike the rest of this crate's ambient stack, this layer deliberately
//! does not follow compile-time Cargo-feature configuration: a single
//! process must be able to run an arbitrary number of accounts, markets,
//! and strategy instances side by side, decided at deploy time, not at
//! `cargo build` time. `serde_json` documents fill the role Cargo features
//! play elsewhere.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub accounts: Vec<AccountConfig>,
    pub markets: Vec<MarketEntry>,
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    pub adapter: String,
    #[serde(default)]
    pub credentials_env_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEntry {
    pub id: String,
    pub account_id: String,
    pub base: String,
    pub quote: String,
}

/// One (account, market) pair — used both as a strategy's target and as one
/// of its sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub account_id: String,
    pub market_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub id: String,
    pub target: Endpoint,
    pub sources: Vec<Endpoint>,
    /// Tick period, in seconds.
    pub period_secs: u64,
    /// Upper bound of a uniform random delay added to each tick, to keep
    /// multiple strategies from waking in lockstep.
    #[serde(default)]
    pub period_random_delay_secs: u64,
    /// Fixed delay before the very first tick.
    #[serde(default)]
    pub delay_secs: u64,
    /// Skips exactly the one scheduled tick that would otherwise fire
    /// immediately after `delay_secs` elapses; normal cadence resumes from
    /// the next tick onward. Independent of `delay_secs`.
    #[serde(default)]
    pub delay_the_first_execute: bool,
    /// Another strategy id that must have completed a successful tick
    /// before this one is allowed to run — gates order-back instances that
    /// hedge onto a market another strategy is mirroring out of.
    #[serde(default)]
    pub linked_strategy: Option<String>,
    pub params: OrderbackParams,
    #[serde(default)]
    pub fx: Option<FxConfig>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "shape")]
pub enum PricePointSpacing {
    Constant { step: Decimal, count: u32 },
    Linear { start_step: Decimal, step_growth: Decimal, count: u32 },
    Exponential { start_step: Decimal, factor: Decimal, count: u32 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderbackSide {
    Asks,
    Bids,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbackParams {
    pub bid_spacing: PricePointSpacing,
    pub ask_spacing: PricePointSpacing,
    #[serde(default)]
    pub spread_bid_bps: Decimal,
    #[serde(default)]
    pub spread_ask_bps: Decimal,
    #[serde(default)]
    pub min_amount: Decimal,
    #[serde(default)]
    pub max_amount_per_order: Option<Decimal>,
    #[serde(default)]
    pub balance_limit_plugin: Option<BalanceLimitPluginConfig>,
    #[serde(default = "default_orderback_side")]
    pub side: OrderbackSide,
    #[serde(default)]
    pub enable_orderback: bool,
    #[serde(default)]
    pub min_order_back_amount: Decimal,
    /// Grace window, in milliseconds, that order-back batches fills over
    /// before hedging them as one combined order.
    #[serde(default = "default_grace_window_ms")]
    pub grace_window_ms: u64,
    #[serde(default)]
    pub orderback_type: crate::core::OrderType,
    #[serde(default)]
    pub apply_safe_limits_on_source: bool,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_orderback_side() -> OrderbackSide {
    OrderbackSide::Both
}

fn default_grace_window_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BalanceLimitPluginConfig {
    FullBalance { currency: String },
    FractionalBalance { currency: String, fraction: Decimal },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FxConfig {
    Fixed { rate: Decimal },
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { log_level: default_log_level(), json_logs: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enable_prometheus: bool,
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
}

fn default_metrics_addr() -> String {
    "127.0.0.1:9090".to_string()
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self { enable_prometheus: false, metrics_addr: default_metrics_addr() }
    }
}
