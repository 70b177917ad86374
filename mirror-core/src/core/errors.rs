//! Error taxonomy for the market-making core.
//!
//! Every error the core can raise belongs to one of the variants below; there
//! is no string-typed error path left in the hot loop. See the module docs on
//! [`crate::reactor`] and [`crate::execution`] for how each variant is
//! recovered or propagated.

use thiserror::Error;

/// Errors raised while validating strategy or reactor configuration.
///
/// Fatal at startup. A mid-run config reload that produces one of these
/// disables the offending strategy rather than the whole reactor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("strategy '{strategy}' has invalid levels_count {count} (must be >= 1)")]
    InvalidLevelsCount { strategy: String, count: i64 },

    #[error("strategy '{strategy}' has negative spread_{side} {value}")]
    NegativeSpread { strategy: String, side: &'static str, value: String },

    #[error("strategy '{strategy}' references unknown orderback_type '{value}'")]
    UnknownOrderbackType { strategy: String, value: String },

    #[error("unknown strategy kind '{kind}'")]
    UnknownStrategy { kind: String },

    #[error("account '{account}' is missing currency '{currency}' required by strategy '{strategy}'")]
    MissingCurrency {
        strategy: String,
        account: String,
        currency: String,
    },

    #[error("strategy '{strategy}' configures more than one source market")]
    MultipleSources { strategy: String },
}

/// Network, timeout, or rate-limit failures from an exchange adapter.
///
/// Recovered locally: the executor retries with backoff; if retries are
/// exhausted the action is dropped and the next tick replans.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransientExchangeError {
    #[error("network error on {account}: {message}")]
    Network { account: String, message: String },

    #[error("request to {account} timed out after {deadline_ms}ms")]
    Timeout { account: String, deadline_ms: u64 },

    #[error("rate limited by {account}")]
    RateLimited { account: String },
}

/// Authentication, malformed request, insufficient funds, or market-closed
/// failures. Never retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermanentExchangeError {
    #[error("authentication failed on {account}")]
    Authentication { account: String },

    #[error("malformed request to {account}: {message}")]
    MalformedRequest { account: String, message: String },

    #[error("insufficient funds on {account} for {currency}")]
    InsufficientFunds { account: String, currency: String },

    #[error("market {market} is closed")]
    MarketClosed { market: String },
}

/// An invariant of the data model was violated. The responsible action is
/// suppressed and the strategy/market that detected it keeps running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("crossed book on market {market}: best_bid {best_bid} >= best_ask {best_ask}")]
    CrossedBook {
        market: String,
        best_bid: String,
        best_ask: String,
    },

    #[error("order {order_id} present on both sides of open orders for market {market}")]
    OrderOnBothSides { market: String, order_id: String },

    #[error("negative amount {amount} rejected for price {price}")]
    NegativeAmount { price: String, amount: String },
}

/// The FX rate required to complete an order-back hedge is not yet available.
/// Recovered by rescheduling the dependent hedge one second later.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("fx rate not yet available")]
pub struct FxUnavailable;

/// An uncaught error in a strategy's periodic scheduling stack. The strategy
/// is stopped; other strategies continue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("strategy '{strategy}' failed fatally: {message}")]
pub struct FatalReactorError {
    pub strategy: String,
    pub message: String,
}

/// Top-level error returned by `Strategy::call`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Classification used by the executor to decide whether to retry an action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error(transparent)]
    Transient(#[from] TransientExchangeError),

    #[error(transparent)]
    Permanent(#[from] PermanentExchangeError),
}

impl ExecutionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecutionError::Transient(_))
    }
}
