//! Scheduler diffing benchmarks.
//!
//! `Scheduler::schedule` runs once per strategy tick against whatever is
//! currently resting; these benchmarks track its cost as the resting set and
//! the desired book both grow, since a reactor process ticks every
//! registered strategy on its own timer regardless of how large its book is.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mirror_core::core::{MarketId, Order, Side};
use mirror_core::orderbook::{OpenOrders, Orderbook};
use mirror_core::scheduler::{Scheduler, SchedulerOptions};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn resting_orders(levels: usize) -> OpenOrders {
    let mut open = OpenOrders::new();
    for i in 0..levels {
        let price = dec!(100) - Decimal::from(i);
        open.insert(Order::new(MarketId(1), price, dec!(1), Side::Buy).with_id(format!("bid-{i}")));
    }
    for i in 0..levels {
        let price = dec!(101) + Decimal::from(i);
        open.insert(Order::new(MarketId(1), price, dec!(1), Side::Sell).with_id(format!("ask-{i}")));
    }
    open
}

fn desired_book(levels: usize) -> Orderbook {
    let bids = (0..levels).map(|i| (dec!(100) - Decimal::from(i), dec!(1)));
    let asks = (0..levels).map(|i| (dec!(101) + Decimal::from(i), dec!(1)));
    Orderbook::from_levels(bids, asks).unwrap()
}

fn aligned_book_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/no_op_when_aligned");
    for levels in [10usize, 100, 1000] {
        let current = resting_orders(levels);
        let desired = desired_book(levels);
        let scheduler = Scheduler::new(MarketId(1), SchedulerOptions::default());
        group.bench_function(format!("levels_{levels}"), |b| {
            b.iter(|| black_box(scheduler.schedule(&current, &desired)));
        });
    }
    group.finish();
}

fn full_churn_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/full_churn");
    for levels in [10usize, 100, 1000] {
        let current = resting_orders(levels);
        // Desired book shifted by one tick: every resting price diverges,
        // forcing a full cancel/create pass.
        let desired = Orderbook::from_levels(
            (0..levels).map(|i| (dec!(100) - Decimal::from(i) + dec!(0.5), dec!(1))),
            (0..levels).map(|i| (dec!(101) + Decimal::from(i) + dec!(0.5), dec!(1))),
        )
        .unwrap();
        let scheduler = Scheduler::new(MarketId(1), SchedulerOptions::default());
        group.bench_function(format!("levels_{levels}"), |b| {
            b.iter(|| black_box(scheduler.schedule(&current, &desired)));
        });
    }
    group.finish();
}

criterion_group!(benches, aligned_book_bench, full_churn_bench);
criterion_main!(benches);
