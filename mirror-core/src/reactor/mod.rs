//! Owns every account, market, and strategy instance and drives them
//! through one cooperative async event loop.
//!
//! The reactor never talks to a venue directly — it only ever sees
//! [`crate::adapter::ExchangeAdapter`] and [`crate::strategy::Strategy`]
//! trait objects, handed to it at registration time and addressed from then
//! on only by the integer handles ([`AccountId`]/[`MarketId`]/[`StrategyId`])
//! it assigns. That indirection is what lets a strategy mirror a market
//! owned by a different account without the two holding references to each
//! other.

use crate::adapter::{Balance, ExchangeAdapter, MarketConfig, StreamSink};
use crate::core::{AccountId, FatalReactorError, MarketId, PrivateTrade, PublicTrade, StrategyId};
use crate::execution::Executor;
use crate::monitoring::MetricsRegistry;
use crate::orderbook::{OpenOrders, Orderbook};
use crate::risk::RateLimiterConfig;
use crate::scheduler::{PriceLevels, Scheduler, SchedulerOptions, SideCaps};
use crate::strategy::Strategy;
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const BALANCE_REFRESH_INTERVAL: Duration = Duration::from_secs(23);
const RECONCILIATION_INTERVAL: Duration = Duration::from_secs(600);
const GAUGE_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const RECONCILIATION_GRACE: Duration = Duration::from_secs(5);
const HEDGE_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct AccountEntry {
    name: String,
    adapter: Arc<dyn ExchangeAdapter>,
    connected: AtomicBool,
    balances: RwLock<Vec<Balance>>,
}

struct MarketEntry {
    name: String,
    account_id: AccountId,
    config: MarketConfig,
    fetch_orderbook: bool,
    book: RwLock<Orderbook>,
    resting: RwLock<OpenOrders>,
}

struct StrategyEntry {
    name: String,
    target_account: AccountId,
    target_market: MarketId,
    source_account: AccountId,
    source_market: MarketId,
    linked_strategy: Option<StrategyId>,
    period: Duration,
    period_random_delay: Duration,
    delay: Duration,
    delay_the_first_execute: bool,
    dry_run: bool,
    strategy: Arc<dyn Strategy>,
}

/// Owns `{accounts, markets, strategies}` and drives every strategy's
/// periodic tick, balance refresh, and open-order reconciliation.
pub struct Reactor {
    next_account_id: AtomicU32,
    next_market_id: AtomicU32,
    next_strategy_id: AtomicU32,
    accounts: DashMap<AccountId, AccountEntry>,
    account_names: DashMap<String, AccountId>,
    markets: DashMap<MarketId, MarketEntry>,
    market_names: DashMap<String, MarketId>,
    strategies: DashMap<StrategyId, StrategyEntry>,
    strategy_names: DashMap<String, StrategyId>,
    executor: Arc<Executor>,
    metrics: Arc<MetricsRegistry>,
    shutdown: Arc<AtomicBool>,
}

impl Reactor {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Arc<Self> {
        Arc::new(Self {
            next_account_id: AtomicU32::new(1),
            next_market_id: AtomicU32::new(1),
            next_strategy_id: AtomicU32::new(1),
            accounts: DashMap::new(),
            account_names: DashMap::new(),
            markets: DashMap::new(),
            market_names: DashMap::new(),
            strategies: DashMap::new(),
            strategy_names: DashMap::new(),
            executor: Arc::new(Executor::new(Arc::clone(&metrics))),
            metrics,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn account_id(&self, name: &str) -> Option<AccountId> {
        self.account_names.get(name).map(|e| *e)
    }

    pub fn market_id(&self, name: &str) -> Option<MarketId> {
        self.market_names.get(name).map(|e| *e)
    }

    pub fn strategy_id(&self, name: &str) -> Option<StrategyId> {
        self.strategy_names.get(name).map(|e| *e)
    }

    pub fn register_account(
        &self,
        name: impl Into<String>,
        adapter: Arc<dyn ExchangeAdapter>,
        limiter_config: RateLimiterConfig,
    ) -> AccountId {
        let name = name.into();
        let id = AccountId(self.next_account_id.fetch_add(1, Ordering::Relaxed));
        self.executor.register_account(id, Arc::clone(&adapter), limiter_config);
        self.accounts.insert(
            id,
            AccountEntry {
                name: name.clone(),
                adapter,
                connected: AtomicBool::new(false),
                balances: RwLock::new(Vec::new()),
            },
        );
        self.account_names.insert(name, id);
        id
    }

    pub fn register_market(
        &self,
        name: impl Into<String>,
        account_id: AccountId,
        config: MarketConfig,
        fetch_orderbook: bool,
    ) -> MarketId {
        let name = name.into();
        let id = MarketId(self.next_market_id.fetch_add(1, Ordering::Relaxed));
        self.markets.insert(
            id,
            MarketEntry {
                name: name.clone(),
                account_id,
                config,
                fetch_orderbook,
                book: RwLock::new(Orderbook::new()),
                resting: RwLock::new(OpenOrders::new()),
            },
        );
        self.market_names.insert(name, id);
        id
    }

    #[allow(clippy::too_many_arguments)]
    pub fn register_strategy(
        &self,
        name: impl Into<String>,
        target_account: AccountId,
        target_market: MarketId,
        source_account: AccountId,
        source_market: MarketId,
        linked_strategy: Option<StrategyId>,
        period: Duration,
        period_random_delay: Duration,
        delay: Duration,
        delay_the_first_execute: bool,
        dry_run: bool,
        strategy: Arc<dyn Strategy>,
    ) -> StrategyId {
        let name = name.into();
        let id = StrategyId(self.next_strategy_id.fetch_add(1, Ordering::Relaxed));
        self.executor.create_queue(target_account, id);
        self.executor.create_queue(source_account, id);
        self.strategies.insert(
            id,
            StrategyEntry {
                name: name.clone(),
                target_account,
                target_market,
                source_account,
                source_market,
                linked_strategy,
                period,
                period_random_delay,
                delay,
                delay_the_first_execute,
                dry_run,
                strategy,
            },
        );
        self.strategy_names.insert(name, id);
        id
    }

    pub fn set_account_connected(&self, account_id: AccountId, connected: bool) {
        if let Some(entry) = self.accounts.get(&account_id) {
            entry.connected.store(connected, Ordering::Relaxed);
            self.metrics
                .ws_connected
                .with_label_values(&[&entry.name])
                .set(connected as i64);
        }
    }

    pub fn is_account_connected(&self, account_id: AccountId) -> bool {
        self.accounts.get(&account_id).map(|e| e.connected.load(Ordering::Relaxed)).unwrap_or(false)
    }

    pub fn update_market_book(&self, market_id: MarketId, book: Orderbook) {
        if let Some(entry) = self.markets.get(&market_id) {
            *entry.book.write() = book;
        }
    }

    /// Refreshes every account's balance snapshot and pushes the relevant
    /// view into each strategy that targets or sources that account's
    /// markets. Errors are logged and skipped; a stale balance snapshot is
    /// safer than blocking every other account on one adapter's outage.
    pub async fn update_balances(&self) {
        let account_ids: Vec<AccountId> = self.accounts.iter().map(|e| *e.key()).collect();
        for account_id in account_ids {
            let Some(adapter) = self.accounts.get(&account_id).map(|e| e.adapter.clone()) else { continue };
            match adapter.fetch_balances().await {
                Ok(balances) => {
                    if let Some(account_name) = self.accounts.get(&account_id).map(|e| e.name.clone()) {
                        for balance in &balances {
                            self.metrics
                                .account_balance
                                .with_label_values(&[&account_name, "free", &balance.currency])
                                .set(balance.free.to_f64().unwrap_or(0.0));
                            self.metrics
                                .account_balance
                                .with_label_values(&[&account_name, "locked", &balance.currency])
                                .set(balance.locked.to_f64().unwrap_or(0.0));
                            self.metrics
                                .account_balance
                                .with_label_values(&[&account_name, "total", &balance.currency])
                                .set(balance.total.to_f64().unwrap_or(0.0));
                        }
                    }
                    if let Some(entry) = self.accounts.get(&account_id) {
                        *entry.balances.write() = balances;
                    }
                }
                Err(e) => warn!("failed to refresh balances for {}: {}", account_id, e),
            }
        }
        self.refresh_strategy_snapshots();
    }

    fn refresh_strategy_snapshots(&self) {
        for entry in self.strategies.iter() {
            let Some(target) = self.markets.get(&entry.target_market) else { continue };
            let Some(source) = self.markets.get(&entry.source_market) else { continue };
            let Some(target_balances) = self.accounts.get(&entry.target_account).map(|a| a.balances.read().clone()) else { continue };
            let Some(source_balances) = self.accounts.get(&entry.source_account).map(|a| a.balances.read().clone()) else { continue };
            entry.strategy.update_target(target.book.read().clone(), target_balances);
            entry.strategy.update_source(0, source.book.read().clone(), source_balances);
            entry.strategy.update_resting(target.resting.read().clone());
        }
    }

    /// Pulls fresh orderbooks for every market flagged `fetch_orderbook` and
    /// feeds them to every strategy sourcing or targeting that market.
    async fn refresh_market_books(&self) {
        let market_ids: Vec<MarketId> = self.markets.iter().filter(|e| e.fetch_orderbook).map(|e| *e.key()).collect();
        for market_id in market_ids {
            let Some(adapter) = self
                .markets
                .get(&market_id)
                .and_then(|m| self.accounts.get(&m.account_id).map(|a| a.adapter.clone()))
            else {
                continue;
            };
            match adapter.fetch_orderbook(market_id, 50).await {
                Ok(book) => self.update_market_book(market_id, book),
                Err(e) => warn!("failed to refresh orderbook for {}: {}", market_id, e),
            }
        }
    }

    /// Starts every background loop: balance refresh, reconciliation,
    /// resting-order gauges, and one tick loop per registered strategy. The
    /// executor's per-account dispatchers are started first so a strategy's
    /// very first tick has somewhere to push actions. Returns once
    /// [`Reactor::stop`] is called.
    pub async fn run(self: Arc<Self>) {
        info!("reactor starting with {} accounts, {} markets, {} strategies",
            self.accounts.len(), self.markets.len(), self.strategies.len());

        self.executor.start();

        {
            let reactor = Arc::clone(&self);
            tokio::spawn(async move { reactor.balance_refresh_loop().await });
        }
        {
            let reactor = Arc::clone(&self);
            tokio::spawn(async move { reactor.reconciliation_loop().await });
        }
        {
            let reactor = Arc::clone(&self);
            tokio::spawn(async move { reactor.gauge_loop().await });
        }
        {
            let reactor = Arc::clone(&self);
            tokio::spawn(async move { reactor.hedge_loop().await });
        }

        let strategy_ids: Vec<StrategyId> = self.strategies.iter().map(|e| *e.key()).collect();
        for strategy_id in strategy_ids {
            let reactor = Arc::clone(&self);
            tokio::spawn(async move { reactor.tick_loop(strategy_id).await });
        }

        while !self.shutdown.load(Ordering::Relaxed) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        info!("reactor stopped");
    }

    /// Requests a clean shutdown. Background loops observe this on their
    /// next wakeup and exit; signal wiring (SIGINT/SIGTERM) lives in the
    /// binary crate, not here, since this crate carries no signal-handling
    /// dependency.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn balance_refresh_loop(&self) {
        self.update_balances().await;
        while !self.shutdown.load(Ordering::Relaxed) {
            tokio::time::sleep(BALANCE_REFRESH_INTERVAL).await;
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            self.update_balances().await;
        }
    }

    async fn reconciliation_loop(&self) {
        while !self.shutdown.load(Ordering::Relaxed) {
            tokio::time::sleep(RECONCILIATION_INTERVAL).await;
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            let market_ids: Vec<MarketId> = self.markets.iter().map(|e| *e.key()).collect();
            for market_id in market_ids {
                let Some(account_id) = self.markets.get(&market_id).map(|m| m.account_id) else { continue };
                let mut local_snapshot = match self.markets.get(&market_id) {
                    Some(market) => market.resting.read().clone(),
                    None => continue,
                };
                match self.executor.fetch_openorders(account_id, market_id, &mut local_snapshot, RECONCILIATION_GRACE).await {
                    Ok(report) => {
                        if !report.added.is_empty() || !report.removed.is_empty() || !report.updated.is_empty() {
                            debug!("reconciled {}: {:?}", market_id, report);
                        }
                        if let Some(market) = self.markets.get(&market_id) {
                            *market.resting.write() = local_snapshot;
                        }
                    }
                    Err(e) => warn!("reconciliation failed for {}: {}", market_id, e),
                }
            }
            self.refresh_strategy_snapshots();
        }
    }

    async fn gauge_loop(&self) {
        while !self.shutdown.load(Ordering::Relaxed) {
            tokio::time::sleep(GAUGE_REFRESH_INTERVAL).await;
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            for entry in self.markets.iter() {
                let market_id = *entry.key();
                let resting = entry.resting.read();
                let bids = resting.all(crate::core::Side::Buy).count();
                let asks = resting.all(crate::core::Side::Sell).count();
                self.metrics.order_count.with_label_values(&["buy", &market_id.to_string()]).set(bids as i64);
                self.metrics.order_count.with_label_values(&["sell", &market_id.to_string()]).set(asks as i64);
            }
        }
    }

    /// Polls every strategy's grace-window hedge buffer. Draining happens
    /// here rather than inside `tick` since a hedge buffer's timer is armed
    /// by a private fill, not by the tick schedule, and must drain on its
    /// own clock even between ticks.
    async fn hedge_loop(&self) {
        while !self.shutdown.load(Ordering::Relaxed) {
            tokio::time::sleep(HEDGE_POLL_INTERVAL).await;
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            for entry in self.strategies.iter() {
                let strategy_id = *entry.key();
                entry.strategy.retry_delayed_hedges();
                if !entry.strategy.grace_elapsed() {
                    continue;
                }
                let hedges = entry.strategy.drain_hedges();
                if hedges.is_empty() {
                    continue;
                }
                let actions: Vec<crate::scheduler::Action> =
                    hedges.into_iter().map(crate::scheduler::Action::OrderCreate).collect();
                debug!("{} draining {} hedge order(s) onto {}", entry.name, actions.len(), entry.source_market);
                self.executor.append(entry.source_account, strategy_id, actions);
            }
        }
    }

    async fn tick_loop(&self, strategy_id: StrategyId) {
        let Some((delay, period, period_random_delay, mut skip_next_tick)) = self
            .strategies
            .get(&strategy_id)
            .map(|s| (s.delay, s.period, s.period_random_delay, s.delay_the_first_execute))
        else {
            return;
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        while !self.shutdown.load(Ordering::Relaxed) {
            let jitter = if period_random_delay.is_zero() {
                Duration::ZERO
            } else {
                Duration::from_millis(rand::thread_rng().gen_range(0..=period_random_delay.as_millis() as u64))
            };
            tokio::time::sleep(period + jitter).await;
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            if skip_next_tick {
                skip_next_tick = false;
                continue;
            }
            self.tick(strategy_id).await;
        }
    }

    /// Runs one strategy's tick: refresh what it needs, compute a desired
    /// book, diff it against the target's resting orders, and push the
    /// result to the executor. Any error here is logged and the strategy
    /// lives to try again next period — a single bad tick never takes down
    /// the reactor.
    pub async fn tick(&self, strategy_id: StrategyId) {
        let Some(entry_data) = self.strategy_snapshot(strategy_id) else { return };

        if !self.is_account_connected(entry_data.target_account) {
            debug!("skipping tick for {}: target account not connected", entry_data.name);
            return;
        }
        if let Some(linked) = entry_data.linked_strategy {
            let linked_target_connected = self
                .strategies
                .get(&linked)
                .map(|s| self.is_account_connected(s.target_account))
                .unwrap_or(false);
            if !linked_target_connected {
                debug!("skipping tick for {}: linked strategy's target not connected", entry_data.name);
                return;
            }
        }

        self.refresh_market_books().await;
        self.refresh_strategy_snapshots();

        let desired = match entry_data.strategy.call() {
            Ok(Some(desired)) => desired,
            Ok(None) => return,
            Err(e) => {
                error!("{}", FatalReactorError { strategy: entry_data.name.clone(), message: e.to_string() });
                return;
            }
        };

        if entry_data.dry_run {
            debug!("dry run: {} computed a desired book but will not schedule it", entry_data.name);
            return;
        }

        let Some(target_market) = self.markets.get(&entry_data.target_market) else { return };
        let price_levels = PriceLevels {
            asks: desired.ask_levels.iter().map(|p| p.price).collect(),
            bids: desired.bid_levels.iter().map(|p| p.price).collect(),
        };
        let caps = SideCaps {
            limit_asks_base: Some(desired.target_limits.limit_in_base),
            limit_bids_quote: Some(desired.target_limits.limit_in_quote),
        };
        let options = SchedulerOptions {
            price_levels: Some(price_levels),
            max_amount_per_order: None,
            caps,
            source_caps: None,
            order_type: crate::core::OrderType::Limit,
            amount_precision: target_market.config.amount_precision,
            price_precision: target_market.config.price_precision,
        };
        let scheduler = Scheduler::new(entry_data.target_market, options);
        let actions = {
            let resting = target_market.resting.read();
            scheduler.schedule(&resting, &desired.orderbook)
        };

        if !actions.is_empty() {
            debug!("{} scheduling {} actions", entry_data.name, actions.len());
        }
        self.executor.push(entry_data.target_account, strategy_id, actions);
    }

    fn strategy_snapshot(&self, strategy_id: StrategyId) -> Option<StrategySnapshot> {
        self.strategies.get(&strategy_id).map(|e| StrategySnapshot {
            name: e.name.clone(),
            target_account: e.target_account,
            target_market: e.target_market,
            linked_strategy: e.linked_strategy,
            dry_run: e.dry_run,
            strategy: Arc::clone(&e.strategy),
        })
    }

    /// Whether `account_id`'s adapter has reported its resting-order cache
    /// as unreliable (no private websocket confirming fills land in it). A
    /// strategy hedges off the raw trade price rather than the cache when
    /// this is true, since there is no resting order to cross-reference.
    pub fn trusts_raw_fill_price(&self, account_id: AccountId) -> bool {
        self.accounts.get(&account_id).map(|e| !e.adapter.supports_private_ws()).unwrap_or(true)
    }
}

struct StrategySnapshot {
    name: String,
    target_account: AccountId,
    target_market: MarketId,
    linked_strategy: Option<StrategyId>,
    dry_run: bool,
    strategy: Arc<dyn Strategy>,
}

/// Routes adapter stream callbacks to the strategies that target the
/// affected market. One sink is shared by every account's websocket client.
pub struct ReactorSink {
    reactor: Arc<Reactor>,
}

impl ReactorSink {
    pub fn new(reactor: Arc<Reactor>) -> Self {
        Self { reactor }
    }
}

impl StreamSink for ReactorSink {
    fn on_public_trade(&self, trade: PublicTrade) {
        let _ = trade;
    }

    fn on_private_trade(&self, trade: PrivateTrade) {
        for entry in self.reactor.strategies.iter() {
            if entry.target_market != trade.market_id {
                continue;
            }
            let trust = self.reactor.trusts_raw_fill_price(entry.target_account);
            entry.strategy.notify_private_trade(trade.clone(), trust);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterError;
    use crate::core::{Order, PrivateTrade, Side, StrategyError};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    struct StubAdapter {
        private_ws: bool,
    }

    #[async_trait]
    impl ExchangeAdapter for StubAdapter {
        fn markets(&self) -> Vec<MarketId> {
            vec![MarketId(1)]
        }
        fn market_config(&self, _market_id: MarketId) -> Option<MarketConfig> {
            None
        }
        async fn fetch_orderbook(&self, _market_id: MarketId, _depth: u32) -> Result<Orderbook, AdapterError> {
            Ok(Orderbook::new())
        }
        async fn create_order(&self, _order: Order) -> Result<String, AdapterError> {
            Ok("id".to_string())
        }
        async fn cancel_order(&self, _market_id: MarketId, _order_id: &str) -> Result<bool, AdapterError> {
            Ok(true)
        }
        async fn fetch_openorders(&self, _market_id: MarketId) -> Result<Vec<Order>, AdapterError> {
            Ok(vec![])
        }
        async fn fetch_balances(&self) -> Result<Vec<Balance>, AdapterError> {
            Ok(vec![Balance { currency: "USD".into(), free: dec!(100), locked: dec!(0), total: dec!(100) }])
        }
        fn supports_private_ws(&self) -> bool {
            self.private_ws
        }
    }

    struct CountingStrategy {
        calls: AtomicUsize,
        trades: parking_lot::Mutex<Vec<(PrivateTrade, bool)>>,
    }

    impl Strategy for CountingStrategy {
        fn call(&self) -> Result<Option<crate::strategy::DesiredBook>, StrategyError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(None)
        }
        fn notify_private_trade(&self, trade: PrivateTrade, trust: bool) {
            self.trades.lock().push((trade, trust));
        }
        fn update_target(&self, _book: Orderbook, _balances: Vec<Balance>) {}
        fn update_source(&self, _index: usize, _book: Orderbook, _balances: Vec<Balance>) {}
        fn update_resting(&self, _resting: OpenOrders) {}
    }

    fn metrics() -> Arc<MetricsRegistry> {
        Arc::new(MetricsRegistry::new().unwrap())
    }

    #[test]
    fn registration_assigns_increasing_handles_and_name_lookup() {
        let reactor = Reactor::new(metrics());
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(StubAdapter { private_ws: true });
        let a1 = reactor.register_account("main", Arc::clone(&adapter), RateLimiterConfig::standard());
        let a2 = reactor.register_account("secondary", adapter, RateLimiterConfig::standard());
        assert_ne!(a1, a2);
        assert_eq!(reactor.account_id("main"), Some(a1));
        assert_eq!(reactor.account_id("secondary"), Some(a2));
    }

    #[tokio::test]
    async fn tick_skips_when_target_account_not_connected() {
        let reactor = Reactor::new(metrics());
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(StubAdapter { private_ws: true });
        let account = reactor.register_account("main", adapter, RateLimiterConfig::standard());
        let market = reactor.register_market(
            "BTC-USD",
            account,
            MarketConfig {
                base: "BTC".into(),
                quote: "USD".into(),
                min_price: dec!(0),
                max_price: dec!(1_000_000),
                min_amount: dec!(0),
                amount_precision: 8,
                price_precision: 2,
            },
            false,
        );
        let strategy = Arc::new(CountingStrategy { calls: AtomicUsize::new(0), trades: parking_lot::Mutex::new(vec![]) });
        let strategy_id = reactor.register_strategy(
            "s1", account, market, account, market, None,
            Duration::from_secs(1), Duration::ZERO, Duration::ZERO, false, false,
            strategy.clone(),
        );

        reactor.tick(strategy_id).await;
        assert_eq!(strategy.calls.load(Ordering::Relaxed), 0);

        reactor.set_account_connected(account, true);
        reactor.tick(strategy_id).await;
        assert_eq!(strategy.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn tick_loop_skips_exactly_the_first_scheduled_tick() {
        let reactor = Reactor::new(metrics());
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(StubAdapter { private_ws: true });
        let account = reactor.register_account("main", adapter, RateLimiterConfig::standard());
        let market = reactor.register_market(
            "BTC-USD",
            account,
            MarketConfig {
                base: "BTC".into(),
                quote: "USD".into(),
                min_price: dec!(0),
                max_price: dec!(1_000_000),
                min_amount: dec!(0),
                amount_precision: 8,
                price_precision: 2,
            },
            false,
        );
        reactor.set_account_connected(account, true);
        let strategy = Arc::new(CountingStrategy { calls: AtomicUsize::new(0), trades: parking_lot::Mutex::new(vec![]) });
        let strategy_id = reactor.register_strategy(
            "s1", account, market, account, market, None,
            Duration::from_millis(15), Duration::ZERO, Duration::ZERO, true, false,
            strategy.clone(),
        );

        let driven = Arc::clone(&reactor);
        let handle = tokio::spawn(async move { driven.tick_loop(strategy_id).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(strategy.calls.load(Ordering::Relaxed), 0, "first scheduled tick must be skipped");

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(strategy.calls.load(Ordering::Relaxed) >= 1, "normal cadence resumes after the skipped tick");

        reactor.stop();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn private_trade_is_routed_to_the_strategy_targeting_that_market() {
        let reactor = Reactor::new(metrics());
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(StubAdapter { private_ws: false });
        let account = reactor.register_account("main", adapter, RateLimiterConfig::standard());
        let market = reactor.register_market(
            "BTC-USD",
            account,
            MarketConfig {
                base: "BTC".into(),
                quote: "USD".into(),
                min_price: dec!(0),
                max_price: dec!(1_000_000),
                min_amount: dec!(0),
                amount_precision: 8,
                price_precision: 2,
            },
            false,
        );
        let strategy = Arc::new(CountingStrategy { calls: AtomicUsize::new(0), trades: parking_lot::Mutex::new(vec![]) });
        reactor.register_strategy(
            "s1", account, market, account, market, None,
            Duration::from_secs(1), Duration::ZERO, Duration::ZERO, false, false,
            strategy.clone(),
        );

        let sink = ReactorSink::new(Arc::clone(&reactor));
        sink.on_private_trade(PrivateTrade {
            market_id: market,
            order_id: "o1".into(),
            trade_id: "t1".into(),
            price: dec!(100),
            amount: dec!(1),
            side: Side::Buy,
            fee: None,
            fee_currency: None,
        });

        let trades = strategy.trades.lock();
        assert_eq!(trades.len(), 1);
        assert!(trades[0].1, "no private ws means the raw fill price should be trusted");
    }
}
