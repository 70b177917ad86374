//! The exchange adapter contract.
//!
//! Concrete adapters (REST/WS clients to named venues) are out of scope for
//! the core — every trait method here is implemented by an external
//! collaborator. The core only ever depends on this trait object.

use crate::core::{MarketId, Order, PrivateTrade, PublicTrade};
use crate::orderbook::Orderbook;
use async_trait::async_trait;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub base: String,
    pub quote: String,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub min_amount: Decimal,
    pub amount_precision: u32,
    pub price_precision: u32,
}

#[derive(Debug, Clone)]
pub struct Balance {
    pub currency: String,
    pub free: Decimal,
    pub locked: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorKind {
    Transient,
    Permanent,
}

#[derive(Debug, Clone)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub message: String,
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}
impl std::error::Error for AdapterError {}

/// A bidirectional channel to one exchange account: snapshot order book,
/// stream trades, stream private fills, create/cancel orders, query balances
/// and open orders.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn markets(&self) -> Vec<MarketId>;
    fn market_config(&self, market_id: MarketId) -> Option<MarketConfig>;

    async fn fetch_orderbook(&self, market_id: MarketId, depth: u32) -> Result<Orderbook, AdapterError>;
    async fn create_order(&self, order: Order) -> Result<String, AdapterError>;
    async fn cancel_order(&self, market_id: MarketId, order_id: &str) -> Result<bool, AdapterError>;
    async fn fetch_openorders(&self, market_id: MarketId) -> Result<Vec<Order>, AdapterError>;
    async fn fetch_balances(&self) -> Result<Vec<Balance>, AdapterError>;

    /// Whether this adapter can stream public trades for gating/order-back
    /// purposes.
    fn supports_public_trades(&self) -> bool {
        false
    }
    fn supports_private_ws(&self) -> bool {
        false
    }
}

/// Callbacks an adapter drives as stream events arrive. The reactor wires
/// these to the relevant strategies; the adapter itself never calls a
/// strategy directly.
pub trait StreamSink: Send + Sync {
    fn on_public_trade(&self, trade: PublicTrade);
    fn on_private_trade(&self, trade: PrivateTrade);
}
