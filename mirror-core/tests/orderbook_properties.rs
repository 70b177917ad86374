//! Property tests for the orderbook algebra's documented invariants:
//! aggregation is idempotent once projected back onto its own grid, a
//! zero-bps spread is the identity transform, and `adjust_volume_simple`
//! never increases a side's total volume past the configured cap.

use mirror_core::core::{PricePoint, Side};
use mirror_core::orderbook::Orderbook;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn arb_levels(max_levels: usize, base: i64) -> impl Strategy<Value = Vec<(Decimal, Decimal)>> {
    prop::collection::vec((1i64..=1000, 1i64..=1000), 1..=max_levels).prop_map(move |pairs| {
        pairs
            .into_iter()
            .enumerate()
            .map(|(i, (price_cents, amount_cents))| {
                let price = Decimal::new(base + i as i64 * 100 + price_cents, 2);
                let amount = Decimal::new(amount_cents, 2);
                (price, amount)
            })
            .collect()
    })
}

fn arb_book() -> impl Strategy<Value = Orderbook> {
    (arb_levels(8, 9000), arb_levels(8, 10100)).prop_map(|(bids, asks)| {
        let mut ob = Orderbook::new();
        for (p, a) in bids {
            let _ = ob.update(Side::Buy, p, a);
        }
        for (p, a) in asks {
            let _ = ob.update(Side::Sell, p, a);
        }
        ob
    })
}

proptest! {
    #[test]
    fn zero_spread_is_identity(ob in arb_book()) {
        let spread = ob.spread(Decimal::ZERO, Decimal::ZERO);
        prop_assert_eq!(ob, spread);
    }

    #[test]
    fn aggregation_onto_its_own_levels_is_idempotent(ob in arb_book()) {
        let bid_points: Vec<PricePoint> = ob.levels(Side::Buy).into_iter().map(|(p, _)| PricePoint::new(p)).collect();
        let ask_points: Vec<PricePoint> = ob.levels(Side::Sell).into_iter().map(|(p, _)| PricePoint::new(p)).collect();

        let once = ob.aggregate(&bid_points, &ask_points, Decimal::ZERO);
        let twice = once.to_ob().aggregate(&bid_points, &ask_points, Decimal::ZERO);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn adjust_volume_simple_never_exceeds_the_cap(ob in arb_book(), cap_cents in 0i64..5000) {
        let cap = Decimal::new(cap_cents, 2);
        let adjusted = ob.adjust_volume_simple(Some(cap), None, false);
        prop_assert!(adjusted.side_base_volume(Side::Sell) <= cap);
    }

    #[test]
    fn adjust_volume_simple_unlimited_is_identity(ob in arb_book()) {
        let adjusted = ob.adjust_volume_simple(None, None, false);
        prop_assert_eq!(ob, adjusted);
    }
}
