//! Static descriptions of the built-in strategies and parameter validation.

use crate::arbitrage::ArbitrageParams;
use crate::dca::DcaParams;
use crate::grid::GridParams;
use crate::market_making::MarketMakingParams;
use crate::mean_reversion::MeanReversionParams;
use crate::trend_following::TrendFollowingParams;
use autotrade_core::{EngineError, StrategyDescriptor, StrategyKind, StrategyParameters};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub kind: StrategyKind,
    pub name: String,
    pub description: String,
    /// Parameter names the variant requires.
    pub required_parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    fn failed(error: &EngineError) -> Self {
        let message = match error {
            EngineError::Configuration(m)
            | EngineError::Strategy(m)
            | EngineError::RiskLimit(m)
            | EngineError::Execution(m) => m.clone(),
            EngineError::Storage(e) => e.to_string(),
        };
        Self {
            valid: false,
            errors: vec![message],
        }
    }
}

#[must_use]
pub fn list_available_strategies() -> Vec<StrategyInfo> {
    StrategyKind::ALL.into_iter().map(describe).collect()
}

#[must_use]
pub fn describe(kind: StrategyKind) -> StrategyInfo {
    let (name, description, required): (&str, &str, &[&str]) = match kind {
        StrategyKind::Grid => (
            "Grid Trading",
            "Alternating buy/sell ladder between a lower and upper price, re-centred on large drift",
            &["upperPrice", "lowerPrice", "gridLevels", "amountPerGrid"],
        ),
        StrategyKind::Dca => (
            "Dollar-Cost Averaging",
            "Splits a budget into equal orders at price targets spread around a target price",
            &["totalAmount", "orderCount", "targetPrice"],
        ),
        StrategyKind::Arbitrage => (
            "Cross-Exchange Arbitrage",
            "Buys on the cheapest account and sells on the richest when the spread beats fees",
            &["exchanges", "minProfit", "maxSlippage", "orderAmount"],
        ),
        StrategyKind::TrendFollowing => (
            "Trend Following",
            "EMA crossover entries with optional rule confirmation and stop-loss/take-profit exits",
            &[],
        ),
        StrategyKind::MeanReversion => (
            "Mean Reversion",
            "Bollinger band extremes confirmed by RSI",
            &[],
        ),
        StrategyKind::MarketMaking => (
            "Market Making",
            "Two-sided limit quotes around mid, skewed by inventory",
            &["spread", "orderAmount"],
        ),
    };

    StrategyInfo {
        kind,
        name: name.to_string(),
        description: description.to_string(),
        required_parameters: required.iter().map(|p| (*p).to_string()).collect(),
    }
}

/// Example parameter set for `kind`, valid as-is.
#[must_use]
pub fn default_config(kind: StrategyKind) -> Value {
    match kind {
        StrategyKind::Grid => json!({
            "upperPrice": 50000,
            "lowerPrice": 40000,
            "gridLevels": 10,
            "amountPerGrid": "0.001",
            "rebalanceThreshold": 0.1,
            "minRebalanceIntervalSecs": 3600,
            "tolerance": 0.1
        }),
        StrategyKind::Dca => json!({
            "totalAmount": 10000,
            "orderCount": 5,
            "targetPrice": 45000,
            "priceDeviation": 0.05,
            "minIntervalSecs": 3600
        }),
        StrategyKind::Arbitrage => json!({
            "exchanges": ["binance", "kraken"],
            "minProfit": 0.5,
            "maxSlippage": 0.2,
            "orderAmount": "0.01",
            "feeRate": 0.001,
            "scanIntervalSecs": 5,
            "positionTimeoutSecs": 300
        }),
        StrategyKind::TrendFollowing => json!({ "fastPeriod": 12, "slowPeriod": 26 }),
        StrategyKind::MeanReversion => json!({
            "period": 20,
            "stdDev": 2.0,
            "rsiPeriod": 14,
            "oversold": 30,
            "overbought": 70
        }),
        StrategyKind::MarketMaking => json!({
            "spread": 0.002,
            "orderAmount": "0.01",
            "targetInventory": 0.5,
            "refreshThreshold": 0.001
        }),
    }
}

/// Validates a strategy type and parameter set without instantiating a strategy.
#[must_use]
pub fn validate_strategy_config(strategy_type: &str, parameters: &StrategyParameters) -> ValidationReport {
    let descriptor = StrategyDescriptor {
        strategy_type: strategy_type.to_string(),
        parameters: parameters.clone(),
        indicators: Vec::new(),
        conditions: None,
    };
    match validate_descriptor(&descriptor) {
        Ok(()) => ValidationReport::ok(),
        Err(e) => ValidationReport::failed(&e),
    }
}

/// Validates a full descriptor, including indicator references in its condition tree.
///
/// # Errors
///
/// Returns `EngineError::Configuration` for an unknown type and `EngineError::Strategy`
/// for invalid parameters.
pub fn validate_descriptor(descriptor: &StrategyDescriptor) -> Result<(), EngineError> {
    let kind: StrategyKind = descriptor.strategy_type.parse()?;
    match kind {
        StrategyKind::Grid => GridParams::from_descriptor(descriptor).map(drop),
        StrategyKind::Dca => DcaParams::from_descriptor(descriptor).map(drop),
        StrategyKind::Arbitrage => ArbitrageParams::from_descriptor(descriptor).map(drop),
        StrategyKind::TrendFollowing => TrendFollowingParams::from_descriptor(descriptor).map(drop),
        StrategyKind::MeanReversion => MeanReversionParams::from_descriptor(descriptor).map(drop),
        StrategyKind::MarketMaking => MarketMakingParams::from_descriptor(descriptor).map(drop),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> StrategyParameters {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        for kind in StrategyKind::ALL {
            let report = validate_strategy_config(kind.as_str(), &params(default_config(kind)));
            assert!(report.valid, "{kind}: {:?}", report.errors);
        }
    }

    #[test]
    fn catalog_lists_every_kind() {
        let listed = list_available_strategies();
        assert_eq!(listed.len(), StrategyKind::ALL.len());
        assert!(describe(StrategyKind::Grid)
            .required_parameters
            .contains(&"gridLevels".to_string()));
    }

    #[test]
    fn unknown_type_is_reported() {
        let report = validate_strategy_config("sentiment", &StrategyParameters::new());
        assert!(!report.valid);
        assert!(report.errors[0].contains("Unsupported strategy type"));
    }

    #[test]
    fn invalid_grid_reports_reason() {
        let report = validate_strategy_config(
            "grid",
            &params(json!({ "upperPrice": 1, "lowerPrice": 2, "gridLevels": 3, "amountPerGrid": 1 })),
        );
        assert!(!report.valid);
        assert!(report.errors[0].contains("upperPrice"));
    }
}
