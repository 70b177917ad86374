//! The strategy contract the reactor drives every tick.
//!
//! The core depends only on this trait, never on a concrete strategy; every
//! strategy implementation (order-back mirroring, and whatever is added
//! later) lives in a separate crate and is handed to the reactor as a
//! trait object.

use crate::adapter::Balance;
use crate::core::{Order, PricePoint, PrivateTrade, StrategyError};
use crate::orderbook::{OpenOrders, Orderbook};
use crate::plugins::SideLimits;

/// A strategy's tick output: the book it wants resting on the target market,
/// together with the spread-adjusted price-point grid the scheduler aligns
/// resting orders onto, and the balance-limit plugin's output for that
/// same tick so the scheduler can cap cumulative live+pending creates
/// against the same numbers the book itself was built from.
#[derive(Debug)]
pub struct DesiredBook {
    pub orderbook: Orderbook,
    pub bid_levels: Vec<PricePoint>,
    pub ask_levels: Vec<PricePoint>,
    pub target_limits: SideLimits,
}

pub trait Strategy: Send + Sync {
    /// Computes this tick's desired book, or `None` if nothing should
    /// change (e.g. a source with no resting liquidity at all).
    fn call(&self) -> Result<Option<DesiredBook>, StrategyError>;

    /// Reacts to a private fill on the target market.
    fn notify_private_trade(&self, trade: PrivateTrade, trust: bool);

    /// Refreshes the target market's book/balance snapshot the next `call()`
    /// reads from.
    fn update_target(&self, book: Orderbook, balances: Vec<Balance>);

    /// Refreshes the snapshot for the source market at `index` (strategies
    /// that only mirror one source ignore any index but 0).
    fn update_source(&self, index: usize, book: Orderbook, balances: Vec<Balance>);

    /// Replaces the cached view of the target's resting orders, consulted
    /// when a private fill needs to be matched back to a side.
    fn update_resting(&self, resting: OpenOrders);

    /// Whether a grace-window hedge buffer has been armed long enough to
    /// drain. Strategies that never hedge leave this `false` always.
    fn grace_elapsed(&self) -> bool {
        false
    }

    /// Drains whatever hedge buffer is armed into concrete orders destined
    /// for the source market, and disarms the timer. Called by the reactor
    /// only after [`Strategy::grace_elapsed`] returns `true`.
    fn drain_hedges(&self) -> Vec<Order> {
        Vec::new()
    }

    /// Retries any hedge postponed earlier (e.g. waiting on an FX rate).
    fn retry_delayed_hedges(&self) {}
}
