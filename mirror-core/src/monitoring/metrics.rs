//! Prometheus metric families the reactor updates on its gauge-refresh tick
//! and the executor/scheduler update as orders are created and cancelled.

use prometheus::{IntGauge, IntGaugeVec, Opts, Registry};
use std::sync::Arc;
use tracing::info;

/// Central registry for every metric this crate exports.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    /// Resting order count, labelled by side and market.
    pub order_count: IntGaugeVec,
    /// Account balance snapshot, labelled by account name, balance type
    /// (free/locked/total), and currency.
    pub account_balance: prometheus::GaugeVec,
    /// 24h trade volume per market, in quote currency.
    pub market_volume_24h: prometheus::GaugeVec,
    /// Public websocket connectivity, labelled by account.
    pub ws_connected: IntGaugeVec,
    /// Count of reconciliation corrections applied per market.
    pub reconciliation_corrections_total: prometheus::IntCounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let order_count = IntGaugeVec::new(
            Opts::new("order_count", "Resting order count").namespace("mirror"),
            &["side", "market"],
        )?;
        registry.register(Box::new(order_count.clone()))?;

        let account_balance = prometheus::GaugeVec::new(
            Opts::new("account_balance", "Account balance snapshot").namespace("mirror"),
            &["name", "type", "currency"],
        )?;
        registry.register(Box::new(account_balance.clone()))?;

        let market_volume_24h = prometheus::GaugeVec::new(
            Opts::new("market_volume_24h", "24h trade volume per market").namespace("mirror"),
            &["market"],
        )?;
        registry.register(Box::new(market_volume_24h.clone()))?;

        let ws_connected = IntGaugeVec::new(
            Opts::new("ws_connected", "Websocket connectivity (1=connected)").namespace("mirror"),
            &["account"],
        )?;
        registry.register(Box::new(ws_connected.clone()))?;

        let reconciliation_corrections_total = prometheus::IntCounterVec::new(
            Opts::new(
                "reconciliation_corrections_total",
                "Corrections applied while reconciling open orders against the exchange",
            )
            .namespace("mirror"),
            &["market"],
        )?;
        registry.register(Box::new(reconciliation_corrections_total.clone()))?;

        info!("metrics registry initialized");

        Ok(Self {
            registry,
            order_count,
            account_balance,
            market_volume_24h,
            ws_connected,
            reconciliation_corrections_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::error!("failed to create metrics registry: {}", e);
            panic!("cannot create metrics registry")
        })
    }
}

/// A process-wide uptime/health gauge, exported separately from the
/// per-market metrics above since it has no labels.
pub struct ProcessMetrics {
    pub uptime_seconds: IntGauge,
}

impl ProcessMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let uptime_seconds = IntGauge::with_opts(
            Opts::new("uptime_seconds", "Process uptime in seconds").namespace("mirror"),
        )?;
        registry.register(Box::new(uptime_seconds.clone()))?;
        Ok(Self { uptime_seconds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_registers_every_metric_family() {
        let registry = MetricsRegistry::new().unwrap();
        registry.order_count.with_label_values(&["buy", "BTC-USD"]).set(3);
        registry
            .account_balance
            .with_label_values(&["main", "free", "USD"])
            .set(1000.0);
        registry.market_volume_24h.with_label_values(&["BTC-USD"]).set(50_000.0);
        registry.ws_connected.with_label_values(&["main"]).set(1);

        let families = registry.registry().gather();
        assert!(!families.is_empty());
    }

    #[test]
    fn process_metrics_register_under_same_registry() {
        let bundle = MetricsRegistry::new().unwrap();
        let process = ProcessMetrics::new(bundle.registry()).unwrap();
        process.uptime_seconds.set(42);
        assert_eq!(process.uptime_seconds.get(), 42);
    }
}
