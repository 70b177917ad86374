//! The order-back strategy: mirrors one source market's liquidity onto a
//! target account as a spread-adjusted book, and hedges fills back onto the
//! source once they've been batched over a grace window.

use crate::fx::Fx;
use crate::price_points::build_grid;
use mirror_core::adapter::{Balance, MarketConfig};
use mirror_core::config::{OrderbackParams, OrderbackSide, StrategyConfig};
use mirror_core::core::{round_to_precision, ConfigurationError, MarketId, Order, PricePoint, PrivateTrade, Side, StrategyError};
use mirror_core::orderbook::{OpenOrders, Orderbook};
use mirror_core::plugins::BalanceLimitPlugin;
use mirror_core::strategy::{DesiredBook, Strategy};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{error, warn};

struct MarketSnapshot {
    book: Orderbook,
    balances: Vec<Balance>,
}

impl Default for MarketSnapshot {
    fn default() -> Self {
        Self { book: Orderbook::new(), balances: Vec::new() }
    }
}

#[derive(Clone, Copy)]
struct PendingHedge {
    side: Side,
    price: Decimal,
    amount: Decimal,
}

/// A hedge order-back couldn't place because its FX rate wasn't ready yet;
/// retried after one second.
struct DelayedHedge {
    ready_at: Instant,
    trade_id: String,
    order_id: String,
    order_side: Side,
    order_price: Decimal,
    amount: Decimal,
}

pub struct Orderback {
    pub strategy_id: String,
    pub target_market: MarketId,
    pub source_market: MarketId,
    target_config: MarketConfig,
    source_config: MarketConfig,
    params: OrderbackParams,
    plugin: Box<dyn BalanceLimitPlugin>,
    fx: Option<Box<dyn Fx>>,

    target: RwLock<MarketSnapshot>,
    source: RwLock<MarketSnapshot>,
    resting: RwLock<OpenOrders>,

    pending: Mutex<HashMap<(String, String), PendingHedge>>,
    armed_since: Mutex<Option<Instant>>,
    delayed: Mutex<Vec<DelayedHedge>>,
}

impl Orderback {
    pub fn new(
        config: &StrategyConfig,
        target_config: MarketConfig,
        source_config: MarketConfig,
        plugin: Box<dyn BalanceLimitPlugin>,
        fx: Option<Box<dyn Fx>>,
        target_market: MarketId,
        source_market: MarketId,
    ) -> Result<Self, ConfigurationError> {
        if config.sources.len() != 1 {
            return Err(ConfigurationError::MultipleSources { strategy: config.id.clone() });
        }
        Ok(Self {
            strategy_id: config.id.clone(),
            target_market,
            source_market,
            target_config,
            source_config,
            params: config.params.clone(),
            plugin,
            fx,
            target: RwLock::new(MarketSnapshot::default()),
            source: RwLock::new(MarketSnapshot::default()),
            resting: RwLock::new(OpenOrders::new()),
            pending: Mutex::new(HashMap::new()),
            armed_since: Mutex::new(None),
            delayed: Mutex::new(Vec::new()),
        })
    }

    fn has_currency(balances: &[Balance], currency: &str) -> bool {
        balances.iter().any(|b| b.currency == currency)
    }

    /// Whether the grace-window timer has been armed long enough to drain.
    pub fn grace_elapsed(&self) -> bool {
        let grace = Duration::from_millis(self.params.grace_window_ms);
        self.armed_since.lock().map(|since| since.elapsed() >= grace).unwrap_or(false)
    }

    /// Groups the pending buffer by `(price, side)`, summing amounts,
    /// discards groups at or below `min_order_back_amount`, and returns the
    /// create-order actions to push on the source account. Clears the
    /// buffer and disarms the timer unconditionally.
    pub fn drain_hedges(&self) -> Vec<Order> {
        let pending = std::mem::take(&mut *self.pending.lock());
        *self.armed_since.lock() = None;

        let mut grouped: HashMap<(Decimal, Side), Decimal> = HashMap::new();
        for hedge in pending.into_values() {
            *grouped.entry((hedge.price, hedge.side)).or_insert(Decimal::ZERO) += hedge.amount;
        }

        grouped
            .into_iter()
            .filter(|(_, amount)| *amount > self.params.min_order_back_amount)
            .map(|((price, side), amount)| {
                let rounded_price = round_to_precision(price, self.source_config.price_precision);
                let rounded_amount = round_to_precision(amount, self.source_config.amount_precision);
                Order::new(self.source_market, rounded_price, rounded_amount, side)
                    .with_type(self.params.orderback_type)
            })
            .collect()
    }

    /// Retries any hedge that was postponed waiting on an FX rate and is
    /// now due.
    pub fn retry_delayed_hedges(&self) {
        let now = Instant::now();
        let due: Vec<DelayedHedge> = {
            let mut delayed = self.delayed.lock();
            let (due, remaining): (Vec<_>, Vec<_>) = delayed.drain(..).partition(|d| d.ready_at <= now);
            *delayed = remaining;
            due
        };
        for hedge in due {
            self.order_back(&hedge.trade_id, &hedge.order_id, hedge.order_side, hedge.order_price, hedge.amount);
        }
    }

    /// The hedge side is the opposite of the filled order's side.
    /// `order_price` is the filled order's resting price (or the trade
    /// price in `trust` mode); it is de-spread here, then converted through
    /// the fx rate if one is configured. A rate that isn't ready yet
    /// postpones the hedge rather than dropping it.
    fn order_back(&self, trade_id: &str, order_id: &str, order_side: Side, order_price: Decimal, amount: Decimal) {
        let hedge_side = order_side.opposite();
        let despread_price = match order_side {
            Side::Sell => order_price / (Decimal::ONE + self.params.spread_ask_bps),
            Side::Buy => order_price / (Decimal::ONE - self.params.spread_bid_bps),
        };

        let price = match &self.fx {
            Some(fx) => match fx.rate() {
                Some(rate) if !rate.is_zero() => despread_price / rate,
                _ => {
                    self.delayed.lock().push(DelayedHedge {
                        ready_at: Instant::now() + Duration::from_secs(1),
                        trade_id: trade_id.to_string(),
                        order_id: order_id.to_string(),
                        order_side,
                        order_price,
                        amount,
                    });
                    return;
                }
            },
            None => despread_price,
        };

        self.insert_pending(trade_id, order_id, PendingHedge { side: hedge_side, price, amount });
    }

    fn insert_pending(&self, trade_id: &str, order_id: &str, hedge: PendingHedge) {
        self.pending.lock().insert((trade_id.to_string(), order_id.to_string()), hedge);
        let mut armed = self.armed_since.lock();
        if armed.is_none() {
            *armed = Some(Instant::now());
        }
    }

}

impl Strategy for Orderback {
    fn update_target(&self, book: Orderbook, balances: Vec<Balance>) {
        *self.target.write() = MarketSnapshot { book, balances };
    }

    fn update_source(&self, _index: usize, book: Orderbook, balances: Vec<Balance>) {
        *self.source.write() = MarketSnapshot { book, balances };
    }

    fn update_resting(&self, resting: OpenOrders) {
        *self.resting.write() = resting;
    }

    fn call(&self) -> Result<Option<DesiredBook>, StrategyError> {
        let target = self.target.read();
        let source = self.source.read();

        if !Self::has_currency(&target.balances, &self.target_config.base)
            || !Self::has_currency(&target.balances, &self.target_config.quote)
        {
            return Err(StrategyError::Configuration(ConfigurationError::MissingCurrency {
                strategy: self.strategy_id.clone(),
                account: "target".to_string(),
                currency: self.target_config.base.clone(),
            }));
        }
        if !Self::has_currency(&source.balances, &self.source_config.base)
            || !Self::has_currency(&source.balances, &self.source_config.quote)
        {
            return Err(StrategyError::Configuration(ConfigurationError::MissingCurrency {
                strategy: self.strategy_id.clone(),
                account: "source".to_string(),
                currency: self.source_config.base.clone(),
            }));
        }

        let target_limit = self.plugin.limits(&target.book, &target.balances, &self.target_config.base, &self.target_config.quote);
        let source_limit = self.plugin.limits(&source.book, &source.balances, &self.source_config.base, &self.source_config.quote);

        let top_bid = target_limit.top_bid_price.or_else(|| source.book.best(Side::Buy).map(|(p, _)| p));
        let top_ask = target_limit.top_ask_price.or_else(|| source.book.best(Side::Sell).map(|(p, _)| p));

        let (Some(top_bid), Some(top_ask)) = (top_bid, top_ask) else {
            return Ok(None);
        };

        let bid_grid = build_grid(top_bid, &self.params.bid_spacing, false, self.target_config.price_precision);
        let ask_grid = build_grid(top_ask, &self.params.ask_spacing, true, self.target_config.price_precision);

        let aggregated = source.book.aggregate(&bid_grid, &ask_grid, self.params.min_amount);
        let mut book = aggregated.to_ob();

        book = book.adjust_volume_simple(Some(target_limit.limit_in_base), Some(target_limit.limit_in_quote), false);
        if self.params.apply_safe_limits_on_source {
            book = book.adjust_volume_simple(Some(source_limit.limit_in_base), Some(source_limit.limit_in_quote), false);
        }

        book = book.spread(self.params.spread_bid_bps, self.params.spread_ask_bps);

        let mut bid_levels: Vec<PricePoint> = bid_grid
            .iter()
            .map(|p| PricePoint::new(p.price * (Decimal::ONE - self.params.spread_bid_bps)))
            .collect();
        let mut ask_levels: Vec<PricePoint> = ask_grid
            .iter()
            .map(|p| PricePoint::new(p.price * (Decimal::ONE + self.params.spread_ask_bps)))
            .collect();

        match self.params.side {
            OrderbackSide::Asks => {
                bid_levels.clear();
                book = book.adjust_volume_simple(None, Some(Decimal::ZERO), false);
            }
            OrderbackSide::Bids => {
                ask_levels.clear();
                book = book.adjust_volume_simple(Some(Decimal::ZERO), None, false);
            }
            OrderbackSide::Both => {}
        }

        if let Some(fx) = &self.fx {
            let mut levels: Vec<PricePoint> = bid_levels.iter().chain(ask_levels.iter()).copied().collect();
            let split = bid_levels.len();
            let (rescaled_book, rescaled_levels) = fx.apply(&book, &levels);
            book = rescaled_book;
            levels = rescaled_levels;
            bid_levels = levels[..split].to_vec();
            ask_levels = levels[split..].to_vec();
        }

        Ok(Some(DesiredBook { orderbook: book, bid_levels, ask_levels, target_limits: target_limit }))
    }

    fn notify_private_trade(&self, trade: PrivateTrade, trust: bool) {
        if !self.params.enable_orderback || trade.market_id != self.target_market {
            return;
        }

        if trust {
            self.order_back(&trade.trade_id, &trade.order_id, trade.side, trade.price, trade.amount);
            return;
        }

        let resting = self.resting.read();
        let sides = resting.find_side(&trade.order_id);
        if sides.len() > 1 {
            error!(
                "order {} present on both sides of open orders while hedging trade {}",
                trade.order_id, trade.trade_id
            );
            return;
        }
        let Some(side) = sides.first().copied() else {
            warn!("no resting order {} found for trade {}, dropping hedge", trade.order_id, trade.trade_id);
            return;
        };
        let order_price = resting
            .get_by_id(side, &trade.order_id)
            .map(|o| o.price)
            .unwrap_or(trade.price);
        drop(resting);

        self.order_back(&trade.trade_id, &trade.order_id, side, order_price, trade.amount);
    }

    fn grace_elapsed(&self) -> bool {
        self.grace_elapsed()
    }

    fn drain_hedges(&self) -> Vec<Order> {
        self.drain_hedges()
    }

    fn retry_delayed_hedges(&self) {
        self.retry_delayed_hedges()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::{FixedFx, PendingFx};
    use mirror_core::config::{BalanceLimitPluginConfig, Endpoint, OrderbackParams, PricePointSpacing};
    use mirror_core::plugins::FullBalanceLimit;
    use rust_decimal_macros::dec;

    fn market_config() -> MarketConfig {
        MarketConfig {
            base: "BTC".into(),
            quote: "USD".into(),
            min_price: dec!(0),
            max_price: dec!(1000000),
            min_amount: dec!(0),
            amount_precision: 8,
            price_precision: 2,
        }
    }

    fn params() -> OrderbackParams {
        OrderbackParams {
            bid_spacing: PricePointSpacing::Constant { step: dec!(1), count: 3 },
            ask_spacing: PricePointSpacing::Constant { step: dec!(1), count: 3 },
            spread_bid_bps: dec!(0.01),
            spread_ask_bps: dec!(0.01),
            min_amount: dec!(0),
            max_amount_per_order: None,
            balance_limit_plugin: Some(BalanceLimitPluginConfig::FullBalance { currency: "BTC".into() }),
            side: OrderbackSide::Both,
            enable_orderback: true,
            min_order_back_amount: dec!(0.05),
            grace_window_ms: 1000,
            orderback_type: mirror_core::core::OrderType::Limit,
            apply_safe_limits_on_source: false,
            dry_run: false,
        }
    }

    fn strategy_config() -> StrategyConfig {
        StrategyConfig {
            id: "s1".into(),
            target: Endpoint { account_id: "target".into(), market_id: "BTC-USD".into() },
            sources: vec![Endpoint { account_id: "source".into(), market_id: "BTC-USD".into() }],
            period_secs: 5,
            period_random_delay_secs: 0,
            delay_secs: 0,
            delay_the_first_execute: false,
            linked_strategy: None,
            params: params(),
            fx: None,
        }
    }

    fn strategy() -> Orderback {
        Orderback::new(
            &strategy_config(),
            market_config(),
            market_config(),
            Box::new(FullBalanceLimit),
            None,
            MarketId(1),
            MarketId(2),
        )
        .unwrap()
    }

    #[test]
    fn rejects_more_than_one_source() {
        let mut cfg = strategy_config();
        cfg.sources.push(Endpoint { account_id: "source2".into(), market_id: "ETH-USD".into() });
        let err = Orderback::new(&cfg, market_config(), market_config(), Box::new(FullBalanceLimit), None, MarketId(1), MarketId(2));
        assert!(err.is_err());
    }

    #[test]
    fn call_fails_without_target_balances() {
        let strat = strategy();
        strat.update_source(
            0,
            Orderbook::from_levels([(dec!(99), dec!(1))], [(dec!(101), dec!(1))]).unwrap(),
            vec![Balance { currency: "BTC".into(), free: dec!(1), locked: dec!(0), total: dec!(1) }, Balance { currency: "USD".into(), free: dec!(1000), locked: dec!(0), total: dec!(1000) }],
        );
        let err = strat.call().unwrap_err();
        assert!(matches!(err, StrategyError::Configuration(ConfigurationError::MissingCurrency { .. })));
    }

    #[test]
    fn call_builds_spread_adjusted_book() {
        let strat = strategy();
        let balances = vec![
            Balance { currency: "BTC".into(), free: dec!(10), locked: dec!(0), total: dec!(10) },
            Balance { currency: "USD".into(), free: dec!(100000), locked: dec!(0), total: dec!(100000) },
        ];
        strat.update_target(Orderbook::from_levels([(dec!(99), dec!(1))], [(dec!(101), dec!(1))]).unwrap(), balances.clone());
        strat.update_source(0, Orderbook::from_levels([(dec!(99), dec!(2))], [(dec!(101), dec!(2))]).unwrap(), balances);

        let desired = strat.call().unwrap().unwrap();
        assert!(!desired.orderbook.is_empty());
        assert_eq!(desired.bid_levels.len(), 3);
        assert_eq!(desired.ask_levels.len(), 3);
    }

    #[test]
    fn order_back_groups_by_price_and_side_after_grace() {
        let strat = strategy();
        let trade1 = PrivateTrade {
            market_id: MarketId(1),
            order_id: "order-1".into(),
            trade_id: "trade-1".into(),
            price: dec!(101),
            amount: dec!(0.5),
            side: Side::Sell,
            fee: None,
            fee_currency: None,
        };
        let trade2 = PrivateTrade {
            market_id: MarketId(1),
            order_id: "order-1".into(),
            trade_id: "trade-2".into(),
            price: dec!(101),
            amount: dec!(0.3),
            side: Side::Sell,
            fee: None,
            fee_currency: None,
        };
        strat.notify_private_trade(trade1, true);
        strat.notify_private_trade(trade2, true);

        let hedges = strat.drain_hedges();
        assert_eq!(hedges.len(), 1);
        assert_eq!(hedges[0].side, Side::Buy);
        assert_eq!(hedges[0].amount, dec!(0.8));
    }

    #[test]
    fn order_back_discards_groups_at_or_below_minimum() {
        let strat = strategy();
        let trade = PrivateTrade {
            market_id: MarketId(1),
            order_id: "order-2".into(),
            trade_id: "trade-3".into(),
            price: dec!(101),
            amount: dec!(0.01),
            side: Side::Sell,
            fee: None,
            fee_currency: None,
        };
        strat.notify_private_trade(trade, true);
        assert!(strat.drain_hedges().is_empty());
    }

    #[test]
    fn disabled_orderback_ignores_trades() {
        let mut cfg = strategy_config();
        cfg.params.enable_orderback = false;
        let strat = Orderback::new(&cfg, market_config(), market_config(), Box::new(FullBalanceLimit), None, MarketId(1), MarketId(2)).unwrap();
        let trade = PrivateTrade {
            market_id: MarketId(1),
            order_id: "order-1".into(),
            trade_id: "trade-1".into(),
            price: dec!(101),
            amount: dec!(1),
            side: Side::Sell,
            fee: None,
            fee_currency: None,
        };
        strat.notify_private_trade(trade, true);
        assert!(strat.drain_hedges().is_empty());
    }

    #[test]
    fn pending_fx_delays_the_hedge_instead_of_dropping_it() {
        let mut cfg = strategy_config();
        cfg.fx = None;
        let strat = Orderback::new(&cfg, market_config(), market_config(), Box::new(FullBalanceLimit), Some(Box::new(PendingFx)), MarketId(1), MarketId(2)).unwrap();
        let trade = PrivateTrade {
            market_id: MarketId(1),
            order_id: "order-1".into(),
            trade_id: "trade-1".into(),
            price: dec!(101),
            amount: dec!(1),
            side: Side::Sell,
            fee: None,
            fee_currency: None,
        };
        strat.notify_private_trade(trade, true);
        assert!(strat.drain_hedges().is_empty());
        assert_eq!(strat.delayed.lock().len(), 1);
    }

    #[test]
    fn fixed_fx_divides_the_hedge_price() {
        let mut cfg = strategy_config();
        cfg.fx = None;
        let strat = Orderback::new(&cfg, market_config(), market_config(), Box::new(FullBalanceLimit), Some(Box::new(FixedFx { rate: dec!(2) })), MarketId(1), MarketId(2)).unwrap();
        let trade = PrivateTrade {
            market_id: MarketId(1),
            order_id: "order-1".into(),
            trade_id: "trade-1".into(),
            price: dec!(101),
            amount: dec!(1),
            side: Side::Sell,
            fee: None,
            fee_currency: None,
        };
        strat.notify_private_trade(trade, true);
        let hedges = strat.drain_hedges();
        assert_eq!(hedges.len(), 1);
        // de-spread: 101 / 1.01 = 100, then / fx rate 2 = 50
        assert_eq!(hedges[0].price, dec!(50));
    }
}
