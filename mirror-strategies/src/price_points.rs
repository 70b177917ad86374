//! Price-point grid construction: turns a market's top-of-book into the
//! ladder of canonical prices a desired book is aggregated onto.

use mirror_core::config::PricePointSpacing;
use mirror_core::core::{round_to_precision, PricePoint};
use rust_decimal::Decimal;

/// Builds the ask-side (`ascending`) or bid-side (`descending`) grid around
/// `top_price`, rounded to `price_precision` and deduplicated.
///
/// - `constant`: `top_price ± (i * step)` for `i` in `[0, count)`.
/// - `linear`: the per-level gap itself grows linearly (`start_step +
///   i * step_growth`); the offset is the running sum of those gaps.
/// - `exponential`: the per-level gap starts at `start_step` and compounds
///   by `factor` each subsequent level; the offset again accumulates.
pub fn build_grid(top_price: Decimal, spacing: &PricePointSpacing, ask: bool, price_precision: u32) -> Vec<PricePoint> {
    let sign = if ask { Decimal::ONE } else { -Decimal::ONE };
    let raw: Vec<Decimal> = match spacing {
        PricePointSpacing::Constant { step, count } => (0..*count)
            .map(|i| top_price + sign * *step * Decimal::from(i))
            .collect(),
        PricePointSpacing::Linear { start_step, step_growth, count } => {
            let mut offset = Decimal::ZERO;
            let mut out = Vec::with_capacity(*count as usize);
            for i in 0..*count {
                offset += *start_step + Decimal::from(i) * *step_growth;
                out.push(top_price + sign * offset);
            }
            out
        }
        PricePointSpacing::Exponential { start_step, factor, count } => {
            let mut level = Decimal::ZERO;
            let mut out = Vec::with_capacity(*count as usize);
            for i in 0..*count {
                if i == 1 {
                    level = *start_step;
                } else if i > 1 {
                    level *= Decimal::ONE + *factor;
                }
                out.push(top_price * (Decimal::ONE + sign * level));
            }
            out
        }
    };

    let mut rounded: Vec<Decimal> = raw.into_iter().map(|p| round_to_precision(p, price_precision)).collect();
    rounded.sort();
    rounded.dedup();
    rounded.into_iter().map(PricePoint::new).collect()
}
