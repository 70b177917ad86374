//! Currency conversion applied to a desired book before it's scheduled,
//! for strategies whose target and source markets are quoted in different
//! currencies.

use mirror_core::core::PricePoint;
use mirror_core::orderbook::Orderbook;
use rust_decimal::Decimal;

/// A rate source. `rate()` returns `None` until the first quote arrives,
/// the window [`crate::orderback::Orderback::order_back`] reschedules a
/// hedge across.
pub trait Fx: Send + Sync {
    fn rate(&self) -> Option<Decimal>;

    /// Rescales every price in `book` and `levels` by the current rate.
    /// Callers must check [`Fx::rate`] is `Some` first; `apply` is a no-op
    /// pass-through when it isn't.
    fn apply(&self, book: &Orderbook, levels: &[PricePoint]) -> (Orderbook, Vec<PricePoint>) {
        let Some(rate) = self.rate() else {
            return (book.clone(), levels.to_vec());
        };
        (rescale_book(book, rate), levels.iter().map(|p| PricePoint::new(p.price * rate)).collect())
    }
}

fn rescale_book(book: &Orderbook, rate: Decimal) -> Orderbook {
    use mirror_core::core::Side;
    let bids = book.levels(Side::Buy).into_iter().map(|(p, a)| (p * rate, a));
    let asks = book.levels(Side::Sell).into_iter().map(|(p, a)| (p * rate, a));
    Orderbook::from_levels(bids, asks).unwrap_or_default()
}

/// A constant, always-ready rate — the default when a strategy configures
/// a fixed FX rate rather than a live feed.
pub struct FixedFx {
    pub rate: Decimal,
}

impl Fx for FixedFx {
    fn rate(&self) -> Option<Decimal> {
        Some(self.rate)
    }
}

/// A rate source that never becomes ready. Grounds the `FxUnavailable` /
/// reschedule path in tests; production adapters will eventually provide a
/// real live-quote implementation outside this crate.
pub struct PendingFx;

impl Fx for PendingFx {
    fn rate(&self) -> Option<Decimal> {
        None
    }
}

pub fn from_config(config: Option<&mirror_core::config::FxConfig>) -> Option<Box<dyn Fx>> {
    use mirror_core::config::FxConfig;
    match config {
        None => None,
        Some(FxConfig::Fixed { rate }) => Some(Box::new(FixedFx { rate: *rate })),
        Some(FxConfig::Pending) => Some(Box::new(PendingFx)),
    }
}
