//! Rate limiting for exchange-facing order traffic.
//!
//! The executor is the only risk layer this crate carries: every other
//! guard against over-trading (balance limits, volume caps) lives in the
//! orderbook algebra and the strategy's plugin list, not here.

pub mod rate_limiter;

pub use rate_limiter::{RateLimiter, RateLimiterConfig};
