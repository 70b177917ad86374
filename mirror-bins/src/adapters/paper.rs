//! A paper-trading exchange adapter: orders rest in memory, nothing is
//! sent to a real venue. Lets the reactor binary run end-to-end against a
//! configuration document without a live exchange integration.
//!
//! Grounded on the simulated executor a real deployment would swap out for
//! a venue-specific adapter — this one never fills an order itself; it only
//! remembers what's resting so the reactor's own reconciliation pass has
//! something truthful to diff against.

use async_trait::async_trait;
use mirror_core::adapter::{AdapterError, AdapterErrorKind, Balance, ExchangeAdapter, MarketConfig};
use mirror_core::core::{MarketId, Order};
use mirror_core::orderbook::Orderbook;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct PaperAdapter {
    markets: Mutex<HashMap<MarketId, MarketConfig>>,
    books: Mutex<HashMap<MarketId, Orderbook>>,
    orders: Mutex<HashMap<MarketId, HashMap<String, Order>>>,
    balances: Mutex<Vec<Balance>>,
    next_order_id: AtomicU64,
}

impl PaperAdapter {
    pub fn new(starting_balances: Vec<(String, Decimal)>) -> Self {
        let balances = starting_balances
            .into_iter()
            .map(|(currency, free)| Balance { currency, free, locked: Decimal::ZERO, total: free })
            .collect();
        Self {
            markets: Mutex::new(HashMap::new()),
            books: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            balances: Mutex::new(balances),
            next_order_id: AtomicU64::new(1),
        }
    }

    /// Registers a market this adapter will answer for, with a flat
    /// synthetic book centered on an arbitrary mid price. Called once the
    /// reactor has assigned the market its integer handle.
    pub fn bind_market(&self, market_id: MarketId, config: MarketConfig) {
        let midpoint = (config.min_price + config.max_price) / Decimal::from(2);
        let mid = if midpoint.is_zero() { Decimal::ONE_HUNDRED } else { midpoint };
        let book = Orderbook::from_levels([(mid - Decimal::ONE, Decimal::TEN)], [(mid + Decimal::ONE, Decimal::TEN)])
            .unwrap_or_default();
        self.books.lock().insert(market_id, book);
        self.orders.lock().entry(market_id).or_default();
        self.markets.lock().insert(market_id, config);
    }
}

#[async_trait]
impl ExchangeAdapter for PaperAdapter {
    fn markets(&self) -> Vec<MarketId> {
        self.markets.lock().keys().copied().collect()
    }

    fn market_config(&self, market_id: MarketId) -> Option<MarketConfig> {
        self.markets.lock().get(&market_id).cloned()
    }

    async fn fetch_orderbook(&self, market_id: MarketId, _depth: u32) -> Result<Orderbook, AdapterError> {
        self.books.lock().get(&market_id).cloned().ok_or_else(|| AdapterError {
            kind: AdapterErrorKind::Permanent,
            message: format!("no paper market bound for {}", market_id),
        })
    }

    async fn create_order(&self, order: Order) -> Result<String, AdapterError> {
        let mut orders = self.orders.lock();
        let book = orders.entry(order.market_id).or_default();
        let id = format!("paper-{}", self.next_order_id.fetch_add(1, Ordering::Relaxed));
        book.insert(id.clone(), order.with_id(id.clone()));
        Ok(id)
    }

    async fn cancel_order(&self, market_id: MarketId, order_id: &str) -> Result<bool, AdapterError> {
        let mut orders = self.orders.lock();
        Ok(orders.entry(market_id).or_default().remove(order_id).is_some())
    }

    async fn fetch_openorders(&self, market_id: MarketId) -> Result<Vec<Order>, AdapterError> {
        Ok(self.orders.lock().entry(market_id).or_default().values().cloned().collect())
    }

    async fn fetch_balances(&self) -> Result<Vec<Balance>, AdapterError> {
        Ok(self.balances.lock().clone())
    }
}
