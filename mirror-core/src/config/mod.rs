//! Loading and validating the runtime configuration document.
//!
//! A deployment is one JSON file: the accounts to authenticate, the markets
//! those accounts trade, and the strategy instances mirroring liquidity
//! between them. There is no compile-time tier — every value here can
//! differ between two processes built from the same binary.

pub mod types;

pub use types::*;

use crate::core::ConfigurationError;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-references strategies against declared accounts/markets and
    /// checks every invariant that isn't already encoded in the type system
    /// (non-negative spread, known orderback shape, no duplicate ids).
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let account_ids: HashSet<&str> = self.accounts.iter().map(|a| a.id.as_str()).collect();
        let market_ids: HashSet<&str> = self.markets.iter().map(|m| m.id.as_str()).collect();

        let mut seen_strategy_ids = HashSet::new();
        for strategy in &self.strategies {
            if !seen_strategy_ids.insert(strategy.id.as_str()) {
                return Err(ConfigurationError::MultipleSources { strategy: strategy.id.clone() });
            }

            for endpoint in std::iter::once(&strategy.target).chain(strategy.sources.iter()) {
                if !account_ids.contains(endpoint.account_id.as_str()) {
                    return Err(ConfigurationError::MissingCurrency {
                        strategy: strategy.id.clone(),
                        account: endpoint.account_id.clone(),
                        currency: String::new(),
                    });
                }
                if !market_ids.contains(endpoint.market_id.as_str()) {
                    return Err(ConfigurationError::UnknownStrategy {
                        kind: format!("market '{}' referenced by strategy '{}'", endpoint.market_id, strategy.id),
                    });
                }
            }

            if strategy.params.spread_bid_bps.is_sign_negative() {
                return Err(ConfigurationError::NegativeSpread {
                    strategy: strategy.id.clone(),
                    side: "bid",
                    value: strategy.params.spread_bid_bps.to_string(),
                });
            }
            if strategy.params.spread_ask_bps.is_sign_negative() {
                return Err(ConfigurationError::NegativeSpread {
                    strategy: strategy.id.clone(),
                    side: "ask",
                    value: strategy.params.spread_ask_bps.to_string(),
                });
            }

            for spacing in [&strategy.params.bid_spacing, &strategy.params.ask_spacing] {
                let count = match spacing {
                    PricePointSpacing::Constant { count, .. }
                    | PricePointSpacing::Linear { count, .. }
                    | PricePointSpacing::Exponential { count, .. } => *count,
                };
                if count == 0 {
                    return Err(ConfigurationError::InvalidLevelsCount {
                        strategy: strategy.id.clone(),
                        count: count as i64,
                    });
                }
            }

            if let Some(linked) = &strategy.linked_strategy {
                if !self.strategies.iter().any(|s| &s.id == linked) {
                    return Err(ConfigurationError::UnknownStrategy {
                        kind: format!("linked strategy '{}' referenced by '{}'", linked, strategy.id),
                    });
                }
            }
        }

        Ok(())
    }
}
