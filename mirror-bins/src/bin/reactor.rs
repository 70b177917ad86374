//! Runs a reactor process from a configuration document: connects every
//! configured account through a paper-trading adapter, wires up the
//! order-back strategies it declares, and drives them until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use mirror_bins::adapters::paper::PaperAdapter;
use mirror_bins::common::{init_logging, CommonArgs};
use mirror_core::adapter::MarketConfig;
use mirror_core::config::{Config, Endpoint};
use mirror_core::core::{ConfigurationError, StrategyId};
use mirror_core::monitoring::{spawn_metrics_thread, MetricsRegistry, MetricsServerConfig};
use mirror_core::plugins;
use mirror_core::reactor::Reactor;
use mirror_core::risk::RateLimiterConfig;
use mirror_core::strategy::Strategy;
use mirror_strategies::fx;
use mirror_strategies::orderback::Orderback;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// `EX_CONFIG` from sysexits.h — the exit code a configuration error at
/// startup maps to, distinct from any other fatal startup failure.
const EX_CONFIG: u8 = 78;

/// Every market known to a config document gets the same generous, loose
/// trading envelope: this binary talks to a paper adapter, not a venue that
/// publishes its own precision and limits.
fn default_market_config() -> MarketConfig {
    MarketConfig {
        base: String::new(),
        quote: String::new(),
        min_price: dec!(0),
        max_price: dec!(1_000_000),
        min_amount: dec!(0),
        amount_precision: 8,
        price_precision: 8,
    }
}

fn endpoint_market_id(reactor: &Arc<Reactor>, endpoint: &Endpoint) -> Result<mirror_core::core::MarketId> {
    reactor
        .market_id(&endpoint.market_id)
        .with_context(|| format!("market '{}' was not registered", endpoint.market_id))
}

fn endpoint_account_id(reactor: &Arc<Reactor>, endpoint: &Endpoint) -> Result<mirror_core::core::AccountId> {
    reactor
        .account_id(&endpoint.account_id)
        .with_context(|| format!("account '{}' was not registered", endpoint.account_id))
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.downcast_ref::<ConfigurationError>().is_some() {
                eprintln!("configuration error: {:#}", e);
                ExitCode::from(EX_CONFIG)
            } else {
                eprintln!("fatal error: {:#}", e);
                ExitCode::FAILURE
            }
        }
    }
}

async fn run() -> Result<()> {
    let args = CommonArgs::parse();
    let config = Config::load(&args.config).context("loading configuration")?;

    let log_level = args.log_level.clone().unwrap_or_else(|| config.metrics.log_level.clone());
    init_logging(&log_level, config.metrics.json_logs)?;

    let metrics = Arc::new(MetricsRegistry::new().context("building metrics registry")?);
    if config.monitoring.enable_prometheus {
        let listen_addr = config
            .monitoring
            .metrics_addr
            .parse()
            .with_context(|| format!("invalid metrics_addr '{}'", config.monitoring.metrics_addr))?;
        spawn_metrics_thread(
            MetricsServerConfig { listen_addr, metrics_path: "/metrics".to_string(), dry_run: args.dry_run },
            Arc::clone(&metrics),
        );
    }

    let reactor = Reactor::new(Arc::clone(&metrics));

    let mut account_currencies: HashMap<&str, HashSet<&str>> = HashMap::new();
    for market in &config.markets {
        let currencies = account_currencies.entry(market.account_id.as_str()).or_default();
        currencies.insert(market.base.as_str());
        currencies.insert(market.quote.as_str());
    }

    let mut adapters: HashMap<String, Arc<PaperAdapter>> = HashMap::new();
    for account in &config.accounts {
        if account.adapter != "paper" {
            return Err(ConfigurationError::UnknownStrategy {
                kind: format!("adapter '{}' for account '{}' (only 'paper' is built in)", account.adapter, account.id),
            }
            .into());
        }
        let starting_balances = account_currencies
            .get(account.id.as_str())
            .into_iter()
            .flatten()
            .map(|currency| (currency.to_string(), dec!(1_000_000)))
            .collect();
        let adapter = Arc::new(PaperAdapter::new(starting_balances));
        reactor.register_account(account.id.clone(), adapter.clone(), RateLimiterConfig::standard());
        reactor.set_account_connected(reactor.account_id(&account.id).unwrap(), true);
        adapters.insert(account.id.clone(), adapter);
    }

    let mut market_configs: HashMap<String, MarketConfig> = HashMap::new();
    for market in &config.markets {
        let account_id = reactor
            .account_id(&market.account_id)
            .with_context(|| format!("market '{}' references unknown account '{}'", market.id, market.account_id))?;
        let market_config =
            MarketConfig { base: market.base.clone(), quote: market.quote.clone(), ..default_market_config() };
        let market_id = reactor.register_market(market.id.clone(), account_id, market_config.clone(), true);
        if let Some(adapter) = adapters.get(&market.account_id) {
            adapter.bind_market(market_id, market_config.clone());
        }
        market_configs.insert(market.id.clone(), market_config);
    }

    // Strategy ids are assigned in registration order starting at 1, same
    // as the reactor's own counter, so linked strategies can be resolved
    // even when they're declared later in the document.
    let name_to_id: HashMap<&str, StrategyId> =
        config.strategies.iter().enumerate().map(|(i, s)| (s.id.as_str(), StrategyId((i + 1) as u32))).collect();

    for strategy_config in &config.strategies {
        let target_market_id = endpoint_market_id(&reactor, &strategy_config.target)?;
        let target_account_id = endpoint_account_id(&reactor, &strategy_config.target)?;
        let source = strategy_config
            .sources
            .first()
            .context("strategy declares no source endpoint")?;
        let source_market_id = endpoint_market_id(&reactor, source)?;
        let source_account_id = endpoint_account_id(&reactor, source)?;

        let target_config = market_configs
            .get(&strategy_config.target.market_id)
            .cloned()
            .context("target market config missing")?;
        let source_config = market_configs.get(&source.market_id).cloned().context("source market config missing")?;

        let plugin = plugins::from_config(strategy_config.params.balance_limit_plugin.as_ref());
        let fx = fx::from_config(strategy_config.fx.as_ref());

        let orderback = Orderback::new(
            strategy_config,
            target_config,
            source_config,
            plugin,
            fx,
            target_market_id,
            source_market_id,
        )
        .with_context(|| format!("building strategy '{}'", strategy_config.id))?;
        let strategy: Arc<dyn Strategy> = Arc::new(orderback);

        let linked_strategy = strategy_config.linked_strategy.as_deref().and_then(|name| name_to_id.get(name).copied());

        reactor.register_strategy(
            strategy_config.id.clone(),
            target_account_id,
            target_market_id,
            source_account_id,
            source_market_id,
            linked_strategy,
            std::time::Duration::from_secs(strategy_config.period_secs),
            std::time::Duration::from_secs(strategy_config.period_random_delay_secs),
            std::time::Duration::from_secs(strategy_config.delay_secs),
            strategy_config.delay_the_first_execute,
            strategy_config.params.dry_run || args.dry_run,
            strategy,
        );
    }

    info!("configuration loaded from {}", args.config.display());

    let shutdown_reactor = Arc::clone(&reactor);
    ctrlc::set_handler(move || {
        tracing::warn!("received shutdown signal, stopping reactor");
        shutdown_reactor.stop();
    })
    .context("installing signal handler")?;

    reactor.run().await;
    Ok(())
}
