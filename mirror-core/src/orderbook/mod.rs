//! The order book value type and its algebra.
//!
//! An [`Orderbook`] is a pair of side-indexed ordered maps from price to
//! aggregated amount. Every transform — `spread`, `adjust_volume_simple`,
//! `aggregate` — returns a new book; none of them mutate in place, so a
//! strategy tick reads as a pipeline:
//!
//! ```text
//! source.aggregate(points, min_amount)
//!       .to_ob()
//!       .adjust_volume_simple(limits)
//!       .spread(bid_bps, ask_bps)
//! ```

pub mod aggregated;
pub mod open_orders;

pub use aggregated::AggregatedOrderbook;
pub use open_orders::OpenOrders;

use crate::core::{InvariantViolation, Side};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Side-indexed ordered map from price to amount. Bids iterate
/// highest-price-first, asks lowest-price-first; both are stored in a plain
/// ascending `BTreeMap` and the bid side is walked in reverse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Orderbook {
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
}

impl Orderbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_levels(
        bids: impl IntoIterator<Item = (Decimal, Decimal)>,
        asks: impl IntoIterator<Item = (Decimal, Decimal)>,
    ) -> Result<Self, InvariantViolation> {
        let mut ob = Self::new();
        for (p, a) in bids {
            ob.update(Side::Buy, p, a)?;
        }
        for (p, a) in asks {
            ob.update(Side::Sell, p, a)?;
        }
        Ok(ob)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn side_map(&self, side: Side) -> &BTreeMap<Decimal, Decimal> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Inserts or replaces the (side, price) level. `amount <= 0` removes the
    /// level. Negative amounts above the removal threshold are rejected.
    pub fn update(
        &mut self,
        side: Side,
        price: Decimal,
        amount: Decimal,
    ) -> Result<(), InvariantViolation> {
        if amount < Decimal::ZERO {
            return Err(InvariantViolation::NegativeAmount {
                price: price.to_string(),
                amount: amount.to_string(),
            });
        }
        let map = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if amount.is_zero() {
            map.remove(&price);
        } else {
            map.insert(price, amount);
        }
        Ok(())
    }

    /// Idempotent removal of a (side, price) level.
    pub fn delete(&mut self, side: Side, price: Decimal) {
        match side {
            Side::Buy => self.bids.remove(&price),
            Side::Sell => self.asks.remove(&price),
        };
    }

    /// Highest bid / lowest ask, or `None` if that side is empty.
    pub fn best(&self, side: Side) -> Option<(Decimal, Decimal)> {
        match side {
            Side::Buy => self.bids.iter().next_back().map(|(p, a)| (*p, *a)),
            Side::Sell => self.asks.iter().next().map(|(p, a)| (*p, *a)),
        }
    }

    /// Bids highest-first, asks lowest-first — the "best-first" walk order
    /// used throughout aggregation and scheduling.
    pub fn levels(&self, side: Side) -> Vec<(Decimal, Decimal)> {
        match side {
            Side::Buy => self.bids.iter().rev().map(|(p, a)| (*p, *a)).collect(),
            Side::Sell => self.asks.iter().map(|(p, a)| (*p, *a)).collect(),
        }
    }

    pub fn is_crossed(&self) -> bool {
        match (self.best(Side::Buy), self.best(Side::Sell)) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    pub fn validate_not_crossed(&self) -> Result<(), InvariantViolation> {
        if let (Some((bid, _)), Some((ask, _))) = (self.best(Side::Buy), self.best(Side::Sell)) {
            if bid >= ask {
                return Err(InvariantViolation::CrossedBook {
                    market: String::new(),
                    best_bid: bid.to_string(),
                    best_ask: ask.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Returns a new book with every bid price multiplied by `(1 - bid_bps)`
    /// and every ask price multiplied by `(1 + ask_bps)`. `*_bps` are
    /// non-negative fractions (`0.01` = 1%), applied multiplicatively.
    pub fn spread(&self, bid_bps: Decimal, ask_bps: Decimal) -> Orderbook {
        let bid_factor = Decimal::ONE - bid_bps;
        let ask_factor = Decimal::ONE + ask_bps;
        let bids = self
            .bids
            .iter()
            .map(|(p, a)| (*p * bid_factor, *a))
            .collect();
        let asks = self
            .asks
            .iter()
            .map(|(p, a)| (*p * ask_factor, *a))
            .collect();
        Orderbook { bids, asks }
    }

    /// Removes a previously applied multiplicative spread, recovering the
    /// pre-spread price. Used by order-back to de-spread a filled order's
    /// price back to a hedge price on the source.
    pub fn remove_spread_price(price: Decimal, bps: Decimal, side: Side) -> Decimal {
        match side {
            Side::Sell => price / (Decimal::ONE + bps),
            Side::Buy => price / (Decimal::ONE - bps),
        }
    }

    /// Walks asks ascending, capping cumulative base volume at
    /// `asks_base_limit`; walks bids descending, capping cumulative quote
    /// volume (Σ price·amount) at `bids_quote_limit`. `None` means
    /// unlimited. When `side_swap` is true the measurement bases swap: the
    /// ask limit is read in quote, the bid limit in base.
    pub fn adjust_volume_simple(
        &self,
        asks_base_limit: Option<Decimal>,
        bids_quote_limit: Option<Decimal>,
        side_swap: bool,
    ) -> Orderbook {
        let ask_measure_is_quote = side_swap;
        let bid_measure_is_quote = !side_swap;

        let asks = cap_cumulative(
            self.asks.iter().map(|(p, a)| (*p, *a)),
            asks_base_limit,
            ask_measure_is_quote,
        );
        let bids = cap_cumulative(
            self.bids.iter().rev().map(|(p, a)| (*p, *a)),
            bids_quote_limit,
            bid_measure_is_quote,
        );

        Orderbook {
            bids: bids.into_iter().collect(),
            asks: asks.into_iter().collect(),
        }
    }

    /// Total base volume and total levels on a side — used for metrics and
    /// side-cap bookkeeping in the scheduler.
    pub fn side_base_volume(&self, side: Side) -> Decimal {
        self.side_map(side).values().copied().sum()
    }

    pub fn side_quote_volume(&self, side: Side) -> Decimal {
        self.side_map(side)
            .iter()
            .map(|(p, a)| *p * *a)
            .sum()
    }
}

fn cap_cumulative(
    levels: impl Iterator<Item = (Decimal, Decimal)>,
    limit: Option<Decimal>,
    measure_is_quote: bool,
) -> Vec<(Decimal, Decimal)> {
    let Some(limit) = limit else {
        return levels.collect();
    };
    let mut used = Decimal::ZERO;
    let mut out = Vec::new();
    for (price, amount) in levels {
        let remaining = limit - used;
        if remaining <= Decimal::ZERO {
            break;
        }
        let full_measure = if measure_is_quote {
            price * amount
        } else {
            amount
        };
        if full_measure <= remaining {
            used += full_measure;
            out.push((price, amount));
        } else {
            let truncated_amount = if measure_is_quote {
                remaining / price
            } else {
                remaining
            };
            if truncated_amount > Decimal::ZERO {
                out.push((price, truncated_amount));
            }
            break;
        }
    }
    out
}
