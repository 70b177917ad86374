//! Strategy implementations for the mirroring engine.
//!
//! The `Strategy` trait and `DesiredBook` contract themselves live in
//! `mirror_core::strategy`; this crate only provides implementations.
//!
//! ## Modules
//! - [`orderback`]: mirrors a source market's book onto a target account and
//!   hedges fills back onto the source once batched over a grace window.
//! - [`price_points`]: builds the price-point grid a desired book is
//!   aggregated onto.
//! - [`fx`]: currency conversion applied when target and source are quoted
//!   in different currencies.

pub mod fx;
pub mod orderback;
pub mod price_points;

pub use fx::{FixedFx, Fx, PendingFx};
pub use orderback::Orderback;
