//! Cache of the target market's resting orders.
//!
//! This is a cache, not a source of truth: once an action has been pushed to
//! the executor, the exchange owns the order's real state and
//! [`crate::execution::Executor::fetch_openorders`] is the only thing allowed
//! to reconcile it back into agreement.

use crate::core::{Order, Side};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct OpenOrders {
    by_price: HashMap<Side, BTreeMap<Decimal, Vec<Order>>>,
    by_id: HashMap<Side, HashMap<String, Order>>,
}

impl OpenOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, order: Order) {
        if let Some(id) = order.id.clone() {
            self.by_id
                .entry(order.side)
                .or_default()
                .insert(id, order.clone());
        }
        self.by_price
            .entry(order.side)
            .or_default()
            .entry(order.price)
            .or_default()
            .push(order);
    }

    pub fn remove_by_id(&mut self, side: Side, order_id: &str) -> Option<Order> {
        let removed = self.by_id.get_mut(&side).and_then(|m| m.remove(order_id));
        if let Some(order) = &removed {
            if let Some(bucket) = self
                .by_price
                .get_mut(&side)
                .and_then(|m| m.get_mut(&order.price))
            {
                bucket.retain(|o| o.id.as_deref() != Some(order_id));
                if bucket.is_empty() {
                    self.by_price.get_mut(&side).unwrap().remove(&order.price);
                }
            }
        }
        removed
    }

    pub fn get_by_id(&self, side: Side, order_id: &str) -> Option<&Order> {
        self.by_id.get(&side).and_then(|m| m.get(order_id))
    }

    /// Looks up an order id on both sides — used by `notify_private_trade`
    /// to detect the "resting order on both sides" invariant violation.
    pub fn find_side(&self, order_id: &str) -> Vec<Side> {
        [Side::Buy, Side::Sell]
            .into_iter()
            .filter(|side| self.get_by_id(*side, order_id).is_some())
            .collect()
    }

    pub fn orders_at(&self, side: Side, price: Decimal) -> &[Order] {
        self.by_price
            .get(&side)
            .and_then(|m| m.get(&price))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn prices(&self, side: Side) -> Vec<Decimal> {
        self.by_price
            .get(&side)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn all(&self, side: Side) -> impl Iterator<Item = &Order> {
        self.by_price
            .get(&side)
            .into_iter()
            .flat_map(|m| m.values())
            .flatten()
    }

    /// Collapses duplicate orders resting at the same (side, price) slot by
    /// keeping the most recently inserted one and returning the ids of the
    /// older ones to cancel — a single slot may transiently hold multiple
    /// orders mid-diff-cycle.
    pub fn collapse_duplicates(&self, side: Side) -> Vec<String> {
        let mut to_cancel = Vec::new();
        if let Some(by_price) = self.by_price.get(&side) {
            for orders in by_price.values() {
                if orders.len() > 1 {
                    for stale in &orders[..orders.len() - 1] {
                        if let Some(id) = &stale.id {
                            to_cancel.push(id.clone());
                        }
                    }
                }
            }
        }
        to_cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MarketId;
    use rust_decimal_macros::dec;

    fn order(id: &str, side: Side, price: Decimal, amount: Decimal) -> Order {
        Order::new(MarketId(1), price, amount, side).with_id(id)
    }

    #[test]
    fn insert_and_lookup_by_id() {
        let mut oo = OpenOrders::new();
        oo.insert(order("a", Side::Buy, dec!(100), dec!(1)));
        assert!(oo.get_by_id(Side::Buy, "a").is_some());
        assert_eq!(oo.orders_at(Side::Buy, dec!(100)).len(), 1);
    }

    #[test]
    fn remove_by_id_clears_both_indices() {
        let mut oo = OpenOrders::new();
        oo.insert(order("a", Side::Buy, dec!(100), dec!(1)));
        oo.remove_by_id(Side::Buy, "a");
        assert!(oo.get_by_id(Side::Buy, "a").is_none());
        assert!(oo.orders_at(Side::Buy, dec!(100)).is_empty());
    }

    #[test]
    fn collapse_duplicates_keeps_newest() {
        let mut oo = OpenOrders::new();
        oo.insert(order("old", Side::Buy, dec!(100), dec!(1)));
        oo.insert(order("new", Side::Buy, dec!(100), dec!(1)));
        assert_eq!(oo.collapse_duplicates(Side::Buy), vec!["old".to_string()]);
    }

    #[test]
    fn find_side_detects_both_sides() {
        let mut oo = OpenOrders::new();
        oo.insert(order("dup", Side::Buy, dec!(100), dec!(1)));
        oo.insert(order("dup", Side::Sell, dec!(101), dec!(1)));
        let sides = oo.find_side("dup");
        assert_eq!(sides.len(), 2);
    }
}
