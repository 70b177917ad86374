//! The "Smart" action scheduler: diffs a current resting order set against
//! a desired order book and produces the minimal ordered sequence of
//! create/cancel actions needed to converge, subject to rate and size
//! constraints.

use crate::core::{MarketId, Order, OrderType, Side};
use crate::orderbook::{OpenOrders, Orderbook};
use rust_decimal::Decimal;

/// An intent the executor will turn into an exchange request.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    OrderCreate(Order),
    OrderCancel { market_id: MarketId, side: Side, order_id: String },
    OrderStop { market_id: MarketId, order_id: String },
    OrderStopAll { market_id: MarketId },
}

/// Per-side volume caps applied while diffing. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct SideCaps {
    pub limit_asks_base: Option<Decimal>,
    pub limit_bids_quote: Option<Decimal>,
}

/// Price grids, keyed by side, that creates must snap onto. Supplied by the
/// strategy alongside its desired book.
#[derive(Debug, Clone, Default)]
pub struct PriceLevels {
    pub asks: Vec<Decimal>,
    pub bids: Vec<Decimal>,
}

impl PriceLevels {
    fn side(&self, side: Side) -> &[Decimal] {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Nearest grid point to `price`, or `None` if this side has no grid
    /// (price alignment is then skipped entirely for that side).
    fn snap(&self, side: Side, price: Decimal) -> Option<Decimal> {
        self.side(side)
            .iter()
            .copied()
            .min_by_key(|p| (*p - price).abs())
    }

    fn contains(&self, side: Side, price: Decimal) -> bool {
        self.side(side).iter().any(|p| *p == price)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub price_levels: Option<PriceLevels>,
    pub max_amount_per_order: Option<Decimal>,
    pub caps: SideCaps,
    pub source_caps: Option<SideCaps>,
    pub order_type: OrderType,
    pub amount_precision: u32,
    pub price_precision: u32,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            price_levels: None,
            max_amount_per_order: None,
            caps: SideCaps::default(),
            source_caps: None,
            order_type: OrderType::Limit,
            amount_precision: 8,
            price_precision: 8,
        }
    }
}

/// The Smart scheduler. Stateless: every call to [`Scheduler::schedule`]
/// takes the current and desired state explicitly.
pub struct Scheduler {
    market_id: MarketId,
    options: SchedulerOptions,
}

impl Scheduler {
    pub fn new(market_id: MarketId, options: SchedulerOptions) -> Self {
        Self { market_id, options }
    }

    /// Produces the ordered action list that drives `current` toward
    /// `desired`. Ordering rule: cancel asks, cancel bids, create best-first
    /// asks, create best-first bids.
    pub fn schedule(&self, current: &OpenOrders, desired: &Orderbook) -> Vec<Action> {
        let mut cancel_asks = self.cancels_for_side(current, desired, Side::Sell);
        let mut cancel_bids = self.cancels_for_side(current, desired, Side::Buy);

        // Collapse transient duplicate orders at the same slot first; these
        // are always stale and must go regardless of the desired book.
        cancel_asks.extend(current.collapse_duplicates(Side::Sell).into_iter().map(|id| {
            Action::OrderCancel { market_id: self.market_id, side: Side::Sell, order_id: id }
        }));
        cancel_bids.extend(current.collapse_duplicates(Side::Buy).into_iter().map(|id| {
            Action::OrderCancel { market_id: self.market_id, side: Side::Buy, order_id: id }
        }));

        let create_asks = self.creates_for_side(current, desired, Side::Sell);
        let create_bids = self.creates_for_side(current, desired, Side::Buy);

        let mut actions = Vec::with_capacity(
            cancel_asks.len() + cancel_bids.len() + create_asks.len() + create_bids.len(),
        );
        actions.extend(cancel_asks);
        actions.extend(cancel_bids);
        actions.extend(create_asks);
        actions.extend(create_bids);
        actions
    }

    fn desired_price_for(&self, side: Side, price: Decimal) -> Decimal {
        match &self.options.price_levels {
            Some(grid) => grid.snap(side, price).unwrap_or(price),
            None => price,
        }
    }

    /// Cancel any resting order whose price is not in `desired[side]`, or
    /// whose amount diverges beyond amount precision, or whose price is not
    /// on the supplied grid.
    fn cancels_for_side(&self, current: &OpenOrders, desired: &Orderbook, side: Side) -> Vec<Action> {
        let desired_map = desired.side_map(side);
        let mut actions = Vec::new();
        for price in current.prices(side) {
            let grid_divergent = self
                .options
                .price_levels
                .as_ref()
                .map(|g| !g.contains(side, price))
                .unwrap_or(false);

            let desired_amount = desired_map.get(&price).copied();
            let amount_divergent = match desired_amount {
                None => false,
                Some(wanted) => current
                    .orders_at(side, price)
                    .iter()
                    .map(|o| o.amount)
                    .sum::<Decimal>()
                    .round_dp(self.options.amount_precision)
                    != wanted.round_dp(self.options.amount_precision),
            };

            if desired_amount.is_none() || grid_divergent || amount_divergent {
                for order in current.orders_at(side, price) {
                    if let Some(id) = &order.id {
                        actions.push(Action::OrderCancel {
                            market_id: self.market_id,
                            side,
                            order_id: id.clone(),
                        });
                    }
                }
            }
        }
        actions
    }

    /// Create orders for every desired (price, amount) not already covered
    /// by a live resting order at the same slot with a matching amount,
    /// split into `max_amount_per_order` chunks and truncated by side caps.
    fn creates_for_side(&self, current: &OpenOrders, desired: &Orderbook, side: Side) -> Vec<Action> {
        let levels = desired.levels(side); // best-first
        let mut used_capacity = Decimal::ZERO;
        let cap = match side {
            Side::Sell => self.options.caps.limit_asks_base,
            Side::Buy => self.options.caps.limit_bids_quote,
        };
        let measure_is_quote = side == Side::Buy;

        let mut actions = Vec::new();
        for (price, amount) in levels {
            let snapped = self.desired_price_for(side, price);
            let covered = current
                .orders_at(side, snapped)
                .iter()
                .map(|o| o.amount)
                .sum::<Decimal>()
                .round_dp(self.options.amount_precision)
                == amount.round_dp(self.options.amount_precision);
            if covered {
                let full_measure = if measure_is_quote { snapped * amount } else { amount };
                used_capacity += full_measure;
                continue;
            }

            let full_measure = if measure_is_quote { snapped * amount } else { amount };
            if let Some(cap) = cap {
                let remaining = cap - used_capacity;
                if remaining <= Decimal::ZERO {
                    continue;
                }
                if full_measure > remaining {
                    let capped_amount = if measure_is_quote {
                        remaining / snapped
                    } else {
                        remaining
                    };
                    used_capacity = cap;
                    self.push_chunks(&mut actions, side, snapped, capped_amount);
                    continue;
                }
            }
            used_capacity += full_measure;
            self.push_chunks(&mut actions, side, snapped, amount);
        }
        actions
    }

    fn push_chunks(&self, actions: &mut Vec<Action>, side: Side, price: Decimal, amount: Decimal) {
        if amount <= Decimal::ZERO {
            return;
        }
        let max = self.options.max_amount_per_order.unwrap_or(amount);
        let mut remaining = amount;
        while remaining > Decimal::ZERO {
            let chunk = remaining.min(max);
            let mut order = Order::new(self.market_id, price, chunk, side).with_type(self.options.order_type);
            order.freeze_price_s(self.options.price_precision);
            actions.push(Action::OrderCreate(order));
            remaining -= chunk;
        }
    }
}
