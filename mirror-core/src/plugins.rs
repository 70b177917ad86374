//! Balance-limit plugins: pure functions mapping `(orderbook, balances)` to
//! the per-side amount an order-back pass is allowed to quote.
//!
//! These are the only risk gate a strategy consults before `adjust_volume`
//! — everything downstream (the scheduler, the executor) trusts the limits
//! it's handed.

use crate::adapter::Balance;
use crate::core::Side;
use crate::orderbook::Orderbook;
use rust_decimal::Decimal;

/// Output of a balance-limit plugin: top-of-book context plus the amount
/// each side may be quoted up to.
#[derive(Debug, Clone, Copy, Default)]
pub struct SideLimits {
    pub top_bid_price: Option<Decimal>,
    pub top_ask_price: Option<Decimal>,
    /// Maximum ask volume, denominated in the base currency.
    pub limit_in_base: Decimal,
    /// Maximum bid volume, denominated in the quote currency.
    pub limit_in_quote: Decimal,
}

fn free_balance(balances: &[Balance], currency: &str) -> Decimal {
    balances
        .iter()
        .find(|b| b.currency == currency)
        .map(|b| b.free)
        .unwrap_or(Decimal::ZERO)
}

fn top_of_book(book: &Orderbook) -> (Option<Decimal>, Option<Decimal>) {
    (
        book.best(Side::Buy).map(|(p, _)| p),
        book.best(Side::Sell).map(|(p, _)| p),
    )
}

pub trait BalanceLimitPlugin: Send + Sync {
    fn limits(&self, book: &Orderbook, balances: &[Balance], base: &str, quote: &str) -> SideLimits;
}

/// Quotes the account's entire free balance of the relevant currency on
/// each side: base for asks, quote for bids.
pub struct FullBalanceLimit;

impl BalanceLimitPlugin for FullBalanceLimit {
    fn limits(&self, book: &Orderbook, balances: &[Balance], base: &str, quote: &str) -> SideLimits {
        let (top_bid_price, top_ask_price) = top_of_book(book);
        SideLimits {
            top_bid_price,
            top_ask_price,
            limit_in_base: free_balance(balances, base),
            limit_in_quote: free_balance(balances, quote),
        }
    }
}

/// Quotes a fixed fraction of the account's free balance on each side, for
/// operators who want to reserve capital rather than risk the whole book.
pub struct FractionalBalanceLimit {
    pub fraction: Decimal,
}

impl BalanceLimitPlugin for FractionalBalanceLimit {
    fn limits(&self, book: &Orderbook, balances: &[Balance], base: &str, quote: &str) -> SideLimits {
        let (top_bid_price, top_ask_price) = top_of_book(book);
        SideLimits {
            top_bid_price,
            top_ask_price,
            limit_in_base: free_balance(balances, base) * self.fraction,
            limit_in_quote: free_balance(balances, quote) * self.fraction,
        }
    }
}

/// Builds the configured plugin, or [`FullBalanceLimit`] when a strategy
/// declares none.
pub fn from_config(config: Option<&crate::config::BalanceLimitPluginConfig>) -> Box<dyn BalanceLimitPlugin> {
    use crate::config::BalanceLimitPluginConfig;
    match config {
        None => Box::new(FullBalanceLimit),
        Some(BalanceLimitPluginConfig::FullBalance { .. }) => Box::new(FullBalanceLimit),
        Some(BalanceLimitPluginConfig::FractionalBalance { fraction, .. }) => {
            Box::new(FractionalBalanceLimit { fraction: *fraction })
        }
    }
}
