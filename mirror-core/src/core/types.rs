//! Core identifiers and value types shared across the crate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side. `ask` is aliased to `sell`, `bid` to `buy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub const fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// An externally supplied ordinate around which the desired book is built.
/// Spread-adjusted price-point grids are handed back to the scheduler so
/// resting orders can be snapped onto them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PricePoint {
    pub price: Decimal,
}

impl PricePoint {
    pub const fn new(price: Decimal) -> Self {
        Self { price }
    }
}

impl From<Decimal> for PricePoint {
    fn from(price: Decimal) -> Self {
        Self { price }
    }
}

/// Integer handle for a configured account, assigned by the reactor at
/// startup. Callbacks pass this id, never an owning reference to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub u32);

/// Integer handle for a configured market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketId(pub u32);

/// Integer handle for a configured strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrategyId(pub u32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account#{}", self.0)
    }
}
impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "market#{}", self.0)
    }
}
impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "strategy#{}", self.0)
    }
}

/// The order type requested on an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Limit,
    Market,
}

impl Default for OrderType {
    fn default() -> Self {
        OrderType::Limit
    }
}

/// An order intent or resting order: `{market_id, price, amount, side, type,
/// id?, price_s?}`. `price_s` is the canonical wire rendering; once set it is
/// immutable and is the identity used for compare-and-cancel decisions, since
/// `Decimal` equality can diverge from what two different rounding paths
/// produced for "the same" price.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub market_id: MarketId,
    pub price: Decimal,
    pub amount: Decimal,
    pub side: Side,
    pub order_type: OrderType,
    pub id: Option<String>,
    price_s: Option<String>,
}

impl Order {
    pub fn new(market_id: MarketId, price: Decimal, amount: Decimal, side: Side) -> Self {
        Self {
            market_id,
            price,
            amount,
            side,
            order_type: OrderType::Limit,
            id: None,
            price_s: None,
        }
    }

    pub fn with_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Freezes the canonical wire price, if not already frozen. Subsequent
    /// calls are no-ops: `price_s` is immutable once set.
    pub fn freeze_price_s(&mut self, precision: u32) {
        if self.price_s.is_none() {
            self.price_s = Some(round_to_precision(self.price, precision).normalize().to_string());
        }
    }

    pub fn price_s(&self) -> Option<&str> {
        self.price_s.as_deref()
    }
}

pub fn round_to_precision(value: Decimal, precision: u32) -> Decimal {
    value.round_dp(precision)
}

/// A public trade observed on a source market.
///
/// `total` is always `price * amount`; `amount` is the filled base
/// quantity, there is no separate `volume` field to disagree with it.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicTrade {
    pub market_id: MarketId,
    pub price: Decimal,
    pub amount: Decimal,
    pub side: Side,
    pub total: Decimal,
}

impl PublicTrade {
    pub fn new(market_id: MarketId, price: Decimal, amount: Decimal, side: Side) -> Self {
        Self {
            market_id,
            price,
            amount,
            side,
            total: price * amount,
        }
    }
}

/// A private fill notification delivered to `Strategy::notify_private_trade`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivateTrade {
    pub market_id: MarketId,
    pub order_id: String,
    pub trade_id: String,
    pub price: Decimal,
    pub amount: Decimal,
    pub side: Side,
    pub fee: Option<Decimal>,
    pub fee_currency: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn side_opposite_roundtrips() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn price_s_freezes_on_first_call() {
        let mut order = Order::new(MarketId(1), dec!(100.005), dec!(1), Side::Buy);
        order.freeze_price_s(2);
        assert_eq!(order.price_s(), Some("100"));
        order.price = dec!(999);
        order.freeze_price_s(2);
        assert_eq!(order.price_s(), Some("100"));
    }

    #[test]
    fn public_trade_total_is_price_times_amount() {
        let t = PublicTrade::new(MarketId(1), dec!(100), dec!(2.5), Side::Sell);
        assert_eq!(t.total, dec!(250.0));
    }
}
