//! Core value types shared by every other module: identifiers, the
//! [`Side`]/[`Order`] data model, and the [`errors`] taxonomy.

pub mod errors;
pub mod types;

pub use errors::{
    ConfigurationError, ExecutionError, FatalReactorError, FxUnavailable, InvariantViolation,
    PermanentExchangeError, StrategyError, TransientExchangeError,
};
pub use types::{
    round_to_precision, AccountId, MarketId, Order, OrderType, PricePoint, PrivateTrade,
    PublicTrade, Side, StrategyId,
};
