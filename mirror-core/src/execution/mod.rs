//! The executor: one FIFO action queue per (account, strategy), drained by
//! a rate-limited dispatcher loop per account, plus the reconciliation pass
//! that pulls an account's true open orders back in sync with the cache the
//! scheduler diffed against.
//!
//! Queues are purged on every push rather than appended to: a strategy's
//! new tick always supersedes whatever the previous tick still had queued,
//! since the previous diff was computed against a desired book that is now
//! stale.

use crate::adapter::{AdapterError, AdapterErrorKind, ExchangeAdapter};
use crate::core::{AccountId, MarketId, Side, StrategyId};
use crate::monitoring::MetricsRegistry;
use crate::orderbook::OpenOrders;
use crate::resilience::{BackoffConfig, ExponentialBackoff};
use crate::risk::{RateLimiter, RateLimiterConfig};
use crate::scheduler::Action;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const MAX_DISPATCH_ATTEMPTS: usize = 5;

struct AccountHandle {
    adapter: Arc<dyn ExchangeAdapter>,
    limiter: RateLimiter,
}

/// What changed between the cached open-order state and exchange truth
/// during a [`Executor::fetch_openorders`] pass.
#[derive(Debug, Default)]
pub struct ReconciliationReport {
    pub added: Vec<crate::core::Order>,
    pub removed: Vec<String>,
    /// Ids present on both sides whose amount diverged; the local copy now
    /// carries the exchange's value.
    pub updated: Vec<String>,
}

pub struct Executor {
    accounts: DashMap<AccountId, AccountHandle>,
    queues: DashMap<(AccountId, StrategyId), Mutex<VecDeque<Action>>>,
    /// Order ids this executor confirmed a create for, with the confirmation
    /// time. Consulted by reconciliation so a freshly created order doesn't
    /// look "lost" just because the fetch outran propagation.
    recent_creates: DashMap<String, Instant>,
    metrics: Arc<MetricsRegistry>,
}

impl Executor {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            accounts: DashMap::new(),
            queues: DashMap::new(),
            recent_creates: DashMap::new(),
            metrics,
        }
    }

    pub fn register_account(
        &self,
        account_id: AccountId,
        adapter: Arc<dyn ExchangeAdapter>,
        limiter_config: RateLimiterConfig,
    ) {
        self.accounts.insert(
            account_id,
            AccountHandle { adapter, limiter: RateLimiter::new(limiter_config) },
        );
    }

    pub fn create_queue(&self, account_id: AccountId, strategy_id: StrategyId) {
        self.queues
            .entry((account_id, strategy_id))
            .or_insert_with(|| Mutex::new(VecDeque::new()));
    }

    /// Replaces the strategy's pending action queue wholesale.
    pub fn push(&self, account_id: AccountId, strategy_id: StrategyId, actions: Vec<Action>) {
        let entry = self
            .queues
            .entry((account_id, strategy_id))
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut queue = entry.lock();
        *queue = actions.into_iter().collect();
    }

    /// Appends to a strategy's pending action queue rather than replacing
    /// it. Used for grace-window hedge orders, which must not clobber
    /// whatever the strategy's regular tick already queued for the same
    /// account.
    pub fn append(&self, account_id: AccountId, strategy_id: StrategyId, actions: Vec<Action>) {
        if actions.is_empty() {
            return;
        }
        let entry = self
            .queues
            .entry((account_id, strategy_id))
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        entry.lock().extend(actions);
    }

    pub fn queue_len(&self, account_id: AccountId, strategy_id: StrategyId) -> usize {
        self.queues
            .get(&(account_id, strategy_id))
            .map(|q| q.lock().len())
            .unwrap_or(0)
    }

    /// Spawns one dispatcher task per registered account. Each task
    /// round-robins the account's strategy queues, honoring the account's
    /// rate limiter and retrying transient failures with backoff.
    pub fn start(self: &Arc<Self>) {
        for entry in self.accounts.iter() {
            let account_id = *entry.key();
            let executor = Arc::clone(self);
            tokio::spawn(async move {
                executor.run_account_dispatcher(account_id).await;
            });
        }
    }

    async fn run_account_dispatcher(&self, account_id: AccountId) {
        loop {
            let strategy_ids: Vec<StrategyId> = self
                .queues
                .iter()
                .filter(|e| e.key().0 == account_id)
                .map(|e| e.key().1)
                .collect();

            let mut dispatched_any = false;
            for strategy_id in strategy_ids {
                let Some(action) = self.pop_front(account_id, strategy_id) else { continue };
                dispatched_any = true;
                self.dispatch_with_retry(account_id, strategy_id, action).await;
            }

            if !dispatched_any {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }

    fn pop_front(&self, account_id: AccountId, strategy_id: StrategyId) -> Option<Action> {
        self.queues.get(&(account_id, strategy_id)).and_then(|q| q.lock().pop_front())
    }

    async fn dispatch_with_retry(&self, account_id: AccountId, strategy_id: StrategyId, action: Action) {
        let Some((adapter, limiter)) = self
            .accounts
            .get(&account_id)
            .map(|h| (h.adapter.clone(), h.limiter.clone()))
        else {
            warn!("no adapter registered for {}", account_id);
            return;
        };

        let mut backoff = ExponentialBackoff::with_config(BackoffConfig {
            max_retries: Some(MAX_DISPATCH_ATTEMPTS),
            ..BackoffConfig::default()
        });

        loop {
            while !limiter.allow() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }

            match self.dispatch_once(&adapter, &action).await {
                Ok(()) => return,
                Err(e) => match backoff.next_delay_for(e.kind) {
                    Some(delay) => {
                        debug!(
                            "transient error on {} for {}: {} (retry {})",
                            account_id,
                            strategy_id,
                            e,
                            backoff.attempt_number()
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None if e.kind == AdapterErrorKind::Transient => {
                        error!("giving up on action for {} after repeated transient errors: {}", strategy_id, e);
                        return;
                    }
                    None => {
                        warn!("permanent error dispatching action for {}: {}", strategy_id, e);
                        return;
                    }
                },
            }
        }
    }

    async fn dispatch_once(&self, adapter: &Arc<dyn ExchangeAdapter>, action: &Action) -> Result<(), AdapterError> {
        match action {
            Action::OrderCreate(order) => {
                let id = adapter.create_order(order.clone()).await?;
                self.recent_creates.insert(id, Instant::now());
                self.metrics
                    .order_count
                    .with_label_values(&[&order.side.to_string(), &order.market_id.to_string()])
                    .inc();
                Ok(())
            }
            Action::OrderCancel { market_id, side, order_id } => {
                adapter.cancel_order(*market_id, order_id).await?;
                self.metrics
                    .order_count
                    .with_label_values(&[&side.to_string(), &market_id.to_string()])
                    .dec();
                Ok(())
            }
            Action::OrderStop { market_id, order_id } => {
                adapter.cancel_order(*market_id, order_id).await.map(|_| ())
            }
            Action::OrderStopAll { market_id } => {
                let open = adapter.fetch_openorders(*market_id).await?;
                for order in open {
                    if let Some(id) = &order.id {
                        let _ = adapter.cancel_order(*market_id, id).await;
                    }
                }
                Ok(())
            }
        }
    }

    /// Pulls the account's true open orders for `market_id` and diffs them
    /// against `local`, applying the result in place. Orders present only
    /// locally and younger than `grace` are left alone: the exchange likely
    /// just hasn't caught up to a create this executor dispatched a moment
    /// ago.
    pub async fn fetch_openorders(
        &self,
        account_id: AccountId,
        market_id: MarketId,
        local: &mut OpenOrders,
        grace: Duration,
    ) -> Result<ReconciliationReport, AdapterError> {
        let adapter = self.accounts.get(&account_id).map(|h| h.adapter.clone()).ok_or_else(|| AdapterError {
            kind: AdapterErrorKind::Permanent,
            message: format!("no adapter registered for {}", account_id),
        })?;

        let truth = adapter.fetch_openorders(market_id).await?;
        let truth_ids: HashSet<&str> = truth.iter().filter_map(|o| o.id.as_deref()).collect();

        let mut report = ReconciliationReport::default();

        for side in [Side::Buy, Side::Sell] {
            let local_ids: Vec<String> = local.all(side).filter_map(|o| o.id.clone()).collect();
            for id in local_ids {
                if truth_ids.contains(id.as_str()) {
                    continue;
                }
                let recently_created =
                    self.recent_creates.get(&id).map(|t| t.elapsed() < grace).unwrap_or(false);
                if recently_created {
                    continue;
                }
                local.remove_by_id(side, &id);
                report.removed.push(id);
            }
        }

        for order in truth {
            let Some(id) = &order.id else { continue };
            match local.get_by_id(order.side, id) {
                None => {
                    local.insert(order.clone());
                    report.added.push(order);
                }
                Some(existing) if existing.amount != order.amount => {
                    local.remove_by_id(order.side, id);
                    local.insert(order.clone());
                    report.updated.push(id.clone());
                }
                Some(_) => {}
            }
        }

        let total_corrections = report.added.len() + report.removed.len() + report.updated.len();
        if total_corrections > 0 {
            info!(
                "reconciled {}: +{} -{} ~{}",
                market_id,
                report.added.len(),
                report.removed.len(),
                report.updated.len()
            );
            self.metrics
                .reconciliation_corrections_total
                .with_label_values(&[&market_id.to_string()])
                .inc_by(total_corrections as u64);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Order, OrderType};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct StubAdapter {
        open_orders: Vec<Order>,
    }

    #[async_trait]
    impl ExchangeAdapter for StubAdapter {
        fn markets(&self) -> Vec<MarketId> {
            vec![MarketId(1)]
        }
        fn market_config(&self, _market_id: MarketId) -> Option<crate::adapter::MarketConfig> {
            None
        }
        async fn fetch_orderbook(
            &self,
            _market_id: MarketId,
            _depth: u32,
        ) -> Result<crate::orderbook::Orderbook, AdapterError> {
            Ok(crate::orderbook::Orderbook::new())
        }
        async fn create_order(&self, _order: Order) -> Result<String, AdapterError> {
            Ok("new-id".to_string())
        }
        async fn cancel_order(&self, _market_id: MarketId, _order_id: &str) -> Result<bool, AdapterError> {
            Ok(true)
        }
        async fn fetch_openorders(&self, _market_id: MarketId) -> Result<Vec<Order>, AdapterError> {
            Ok(self.open_orders.clone())
        }
        async fn fetch_balances(&self) -> Result<Vec<crate::adapter::Balance>, AdapterError> {
            Ok(vec![])
        }
    }

    fn metrics() -> Arc<MetricsRegistry> {
        Arc::new(MetricsRegistry::new().unwrap())
    }

    #[test]
    fn push_replaces_rather_than_appends() {
        let executor = Executor::new(metrics());
        let account = AccountId(1);
        let strategy = StrategyId(1);
        executor.create_queue(account, strategy);

        let order = Order::new(MarketId(1), dec!(100), dec!(1), Side::Buy).with_type(OrderType::Limit);
        executor.push(account, strategy, vec![Action::OrderCreate(order)]);
        assert_eq!(executor.queue_len(account, strategy), 1);

        executor.push(account, strategy, vec![]);
        assert_eq!(executor.queue_len(account, strategy), 0);
    }

    #[test]
    fn append_adds_to_whatever_push_already_queued() {
        let executor = Executor::new(metrics());
        let account = AccountId(1);
        let strategy = StrategyId(1);

        let first = Order::new(MarketId(1), dec!(100), dec!(1), Side::Buy).with_type(OrderType::Limit);
        executor.push(account, strategy, vec![Action::OrderCreate(first)]);

        let hedge = Order::new(MarketId(1), dec!(101), dec!(1), Side::Sell).with_type(OrderType::Limit);
        executor.append(account, strategy, vec![Action::OrderCreate(hedge)]);

        assert_eq!(executor.queue_len(account, strategy), 2);
    }

    #[tokio::test]
    async fn fetch_openorders_adds_and_removes_to_match_truth() {
        let truth_order = Order::new(MarketId(1), dec!(101), dec!(2), Side::Sell).with_id("remote-only");
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(StubAdapter { open_orders: vec![truth_order] });

        let executor = Executor::new(metrics());
        executor.register_account(AccountId(1), adapter, RateLimiterConfig::standard());

        let mut local = OpenOrders::new();
        local.insert(Order::new(MarketId(1), dec!(99), Decimal::ONE, Side::Buy).with_id("local-only"));

        let report = executor
            .fetch_openorders(AccountId(1), MarketId(1), &mut local, Duration::from_secs(0))
            .await
            .unwrap();

        assert_eq!(report.removed, vec!["local-only".to_string()]);
        assert_eq!(report.added.len(), 1);
        assert!(local.get_by_id(Side::Buy, "local-only").is_none());
        assert!(local.get_by_id(Side::Sell, "remote-only").is_some());
    }

    #[tokio::test]
    async fn fetch_openorders_skips_local_only_within_grace_window() {
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(StubAdapter { open_orders: vec![] });
        let executor = Executor::new(metrics());
        executor.register_account(AccountId(1), adapter, RateLimiterConfig::standard());
        executor.recent_creates.insert("fresh".to_string(), Instant::now());

        let mut local = OpenOrders::new();
        local.insert(Order::new(MarketId(1), dec!(99), Decimal::ONE, Side::Buy).with_id("fresh"));

        let report = executor
            .fetch_openorders(AccountId(1), MarketId(1), &mut local, Duration::from_secs(30))
            .await
            .unwrap();

        assert!(report.removed.is_empty());
        assert!(local.get_by_id(Side::Buy, "fresh").is_some());
    }

    #[tokio::test]
    async fn fetch_openorders_adopts_exchange_amount_on_mismatch() {
        let truth_order = Order::new(MarketId(1), dec!(99), dec!(3), Side::Buy).with_id("partial-fill");
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(StubAdapter { open_orders: vec![truth_order] });

        let executor = Executor::new(metrics());
        executor.register_account(AccountId(1), adapter, RateLimiterConfig::standard());

        let mut local = OpenOrders::new();
        local.insert(Order::new(MarketId(1), dec!(99), dec!(5), Side::Buy).with_id("partial-fill"));

        let report = executor
            .fetch_openorders(AccountId(1), MarketId(1), &mut local, Duration::from_secs(0))
            .await
            .unwrap();

        assert_eq!(report.updated, vec!["partial-fill".to_string()]);
        assert_eq!(local.get_by_id(Side::Buy, "partial-fill").unwrap().amount, dec!(3));
    }
}
