//! Quantisation of a source [`Orderbook`](super::Orderbook) onto externally
//! supplied price grids, preserving enough provenance for order-back to
//! recover the average source price a hedge should target.

use super::Orderbook;
use crate::core::{PricePoint, Side};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// One source level that contributed to an aggregated bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProvenanceEntry {
    pub source_price: Decimal,
    pub source_amount: Decimal,
}

/// The aggregated total for one (side, price-point) bucket, plus the source
/// levels that were folded into it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bucket {
    pub total_amount: Decimal,
    pub provenance: Vec<ProvenanceEntry>,
}

impl Bucket {
    /// Volume-weighted average of the contributing source prices, or `None`
    /// for an empty bucket. This is the "average source price" order-back
    /// uses to decide the hedge price when trusting the resting order instead
    /// of the raw trade payload.
    pub fn average_source_price(&self) -> Option<Decimal> {
        if self.provenance.is_empty() {
            return None;
        }
        let total_weight: Decimal = self.provenance.iter().map(|p| p.source_amount).sum();
        if total_weight.is_zero() {
            return None;
        }
        let weighted: Decimal = self
            .provenance
            .iter()
            .map(|p| p.source_price * p.source_amount)
            .sum();
        Some(weighted / total_weight)
    }
}

/// Bids/asks keyed by [`PricePoint`] price rather than raw source price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedOrderbook {
    pub(crate) bids: BTreeMap<Decimal, Bucket>,
    pub(crate) asks: BTreeMap<Decimal, Bucket>,
}

impl AggregatedOrderbook {
    pub fn side(&self, side: Side) -> &BTreeMap<Decimal, Bucket> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub fn bucket(&self, side: Side, price: Decimal) -> Option<&Bucket> {
        self.side(side).get(&price)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Projects the aggregated totals back down to a plain [`Orderbook`],
    /// dropping provenance. Paired with [`Orderbook::aggregate`] this is a
    /// bijection modulo empty levels: re-aggregating the projection onto the
    /// same grid reproduces the same totals.
    pub fn to_ob(&self) -> Orderbook {
        let mut ob = Orderbook::new();
        for (price, bucket) in &self.bids {
            let _ = ob.update(Side::Buy, *price, bucket.total_amount);
        }
        for (price, bucket) in &self.asks {
            let _ = ob.update(Side::Sell, *price, bucket.total_amount);
        }
        ob
    }
}

impl Orderbook {
    /// Quantises this book onto `bid_points`/`ask_points`.
    ///
    /// Source levels are walked best-first and assigned to the nearest
    /// price point that is not better than the source price (highest point
    /// `<= ` source for bids, lowest point `>= ` source for asks). Because
    /// walking both the (sorted) points and the (sorted) source levels is
    /// monotonic, the point cursor only ever advances — a source level whose
    /// price is deeper than every supplied point is folded entirely onto the
    /// worst (last) point rather than being dropped, which is how "…until
    /// exhausted or price points run out" is realised here: a single,
    /// exact-price source level always has exactly one nearest-but-not-better
    /// point, so there is nothing left over to split across buckets once
    /// that point is chosen.
    ///
    /// Points whose aggregated amount is below `min_amount` are dropped from
    /// the result; a point with zero contributing volume is retained up to
    /// that filter so duplicate-free empty buckets round-trip predictably.
    pub fn aggregate(
        &self,
        bid_points: &[PricePoint],
        ask_points: &[PricePoint],
        min_amount: Decimal,
    ) -> AggregatedOrderbook {
        AggregatedOrderbook {
            bids: aggregate_side(self.levels(Side::Buy), bid_points, min_amount, Side::Buy),
            asks: aggregate_side(self.levels(Side::Sell), ask_points, min_amount, Side::Sell),
        }
    }

    /// Treats this book's own levels as a price-point grid with trivial
    /// self-provenance — the inverse direction of [`AggregatedOrderbook::to_ob`].
    pub fn to_agg(&self) -> AggregatedOrderbook {
        let mut bids = BTreeMap::new();
        for (price, amount) in self.levels(Side::Buy) {
            bids.insert(
                price,
                Bucket {
                    total_amount: amount,
                    provenance: vec![ProvenanceEntry {
                        source_price: price,
                        source_amount: amount,
                    }],
                },
            );
        }
        let mut asks = BTreeMap::new();
        for (price, amount) in self.levels(Side::Sell) {
            asks.insert(
                price,
                Bucket {
                    total_amount: amount,
                    provenance: vec![ProvenanceEntry {
                        source_price: price,
                        source_amount: amount,
                    }],
                },
            );
        }
        AggregatedOrderbook { bids, asks }
    }
}

fn ordered_points(points: &[PricePoint], side: Side) -> Vec<Decimal> {
    let mut prices: Vec<Decimal> = points.iter().map(|p| p.price).collect();
    prices.sort();
    prices.dedup();
    if side == Side::Buy {
        prices.reverse();
    }
    prices
}

/// For bids, a point is "too good" (better than the source, disallowed) when
/// it is strictly higher than the source price; for asks, when it is
/// strictly lower.
fn point_too_good(point: Decimal, source: Decimal, side: Side) -> bool {
    match side {
        Side::Buy => point > source,
        Side::Sell => point < source,
    }
}

fn aggregate_side(
    levels: Vec<(Decimal, Decimal)>,
    points: &[PricePoint],
    min_amount: Decimal,
    side: Side,
) -> BTreeMap<Decimal, Bucket> {
    let ordered = ordered_points(points, side);
    let mut buckets: BTreeMap<Decimal, Bucket> = BTreeMap::new();
    if ordered.is_empty() {
        return buckets;
    }
    for price in &ordered {
        buckets.insert(*price, Bucket::default());
    }

    let mut cursor = 0usize;
    for (source_price, source_amount) in levels {
        while cursor + 1 < ordered.len() && point_too_good(ordered[cursor], source_price, side) {
            cursor += 1;
        }
        let point_price = ordered[cursor];
        let bucket = buckets.get_mut(&point_price).expect("point inserted above");
        bucket.total_amount += source_amount;
        bucket.provenance.push(ProvenanceEntry {
            source_price,
            source_amount,
        });
    }

    buckets.retain(|_, bucket| bucket.total_amount >= min_amount);
    buckets
}
