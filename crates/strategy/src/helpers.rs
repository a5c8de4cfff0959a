//! Building blocks shared by the strategy variants.

use autotrade_core::position_sizing::risk_bounded_quantity;
use autotrade_core::{BotContext, EngineError, OrderSide, Position, StrategyDescriptor, StrategyKind};
use autotrade_signals::{conditions, IndicatorRegistry};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

/// Deserializes a variant's typed parameters from the descriptor's parameter map.
///
/// # Errors
///
/// Returns `EngineError::Strategy` when a parameter is missing or has the wrong type.
pub fn parse_params<T: DeserializeOwned>(
    kind: StrategyKind,
    descriptor: &StrategyDescriptor,
) -> Result<T, EngineError> {
    serde_json::from_value(serde_json::Value::Object(descriptor.parameters.clone()))
        .map_err(|e| EngineError::strategy(format!("Invalid {kind} parameters: {e}")))
}

/// Computes the descriptor's indicators over the context candles.
#[must_use]
pub fn indicators(ctx: &BotContext) -> IndicatorRegistry {
    IndicatorRegistry::compute(&ctx.config.strategy.indicators, &ctx.candles)
}

/// Evaluates the descriptor's condition tree. No tree means no extra constraint.
///
/// # Errors
///
/// Returns `EngineError::Strategy` if the tree references an unknown indicator.
pub fn conditions_met(ctx: &BotContext, registry: &IndicatorRegistry) -> Result<bool, EngineError> {
    match &ctx.config.strategy.conditions {
        Some(node) => conditions::evaluate(node, registry).map_err(|e| EngineError::strategy(e.to_string())),
        None => Ok(true),
    }
}

/// Checks that the condition tree only references declared indicators.
///
/// # Errors
///
/// Returns `EngineError::Strategy` naming the unknown indicator.
pub fn validate_conditions(descriptor: &StrategyDescriptor) -> Result<(), EngineError> {
    let Some(node) = &descriptor.conditions else {
        return Ok(());
    };
    let known = |name: &str| {
        name == "price"
            || descriptor.indicators.iter().any(|indicator| {
                name == indicator.name
                    || name
                        .strip_prefix(indicator.name.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            })
    };
    conditions::check_references(node, &known).map_err(|e| EngineError::strategy(e.to_string()))
}

/// Quote balance × risk-per-trade ÷ price, capped at the configured max position size.
///
/// # Errors
///
/// Returns `EngineError::RiskLimit` when the price is not positive.
pub fn risk_bounded_size(ctx: &BotContext) -> Result<Decimal, EngineError> {
    let risk = &ctx.config.risk;
    risk_bounded_quantity(
        ctx.quote_balance(),
        risk.risk_per_trade,
        ctx.current_price,
        risk.max_position_size,
    )
}

fn pct(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

/// Whether the position has lost `stop_loss_pct` relative to its entry.
#[must_use]
pub fn is_stop_loss_hit(position: &Position, price: Decimal, stop_loss_pct: f64) -> bool {
    if stop_loss_pct <= 0.0 || position.quantity == Decimal::ZERO {
        return false;
    }
    let distance = position.avg_price * pct(stop_loss_pct);
    match position.side() {
        OrderSide::Buy => price <= position.avg_price - distance,
        OrderSide::Sell => price >= position.avg_price + distance,
    }
}

/// Whether the position has gained `take_profit_pct` relative to its entry.
#[must_use]
pub fn is_take_profit_hit(position: &Position, price: Decimal, take_profit_pct: f64) -> bool {
    if take_profit_pct <= 0.0 || position.quantity == Decimal::ZERO {
        return false;
    }
    let distance = position.avg_price * pct(take_profit_pct);
    match position.side() {
        OrderSide::Buy => price >= position.avg_price + distance,
        OrderSide::Sell => price <= position.avg_price - distance,
    }
}

/// `true` when no previous event exists or at least `secs` have passed since it.
#[must_use]
pub fn interval_elapsed(last: Option<DateTime<Utc>>, now: DateTime<Utc>, secs: u64) -> bool {
    last.map_or(true, |last| {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        (now - last).num_seconds() >= secs
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context;
    use autotrade_core::{IndicatorConfig, IndicatorKind};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn long(avg: Decimal) -> Position {
        Position {
            symbol: "BTC/USDT".to_string(),
            quantity: dec!(1),
            avg_price: avg,
        }
    }

    #[test]
    fn stop_and_take_profit_for_long() {
        let position = long(dec!(100));
        assert!(is_stop_loss_hit(&position, dec!(95), 0.05));
        assert!(!is_stop_loss_hit(&position, dec!(96), 0.05));
        assert!(is_take_profit_hit(&position, dec!(110), 0.10));
        assert!(!is_take_profit_hit(&position, dec!(109), 0.10));
    }

    #[test]
    fn stop_and_take_profit_for_short() {
        let mut position = long(dec!(100));
        position.quantity = dec!(-1);
        assert!(is_stop_loss_hit(&position, dec!(105), 0.05));
        assert!(is_take_profit_hit(&position, dec!(90), 0.10));
        assert!(!is_take_profit_hit(&position, dec!(95), 0.10));
    }

    #[test]
    fn risk_bounded_size_uses_quote_balance() {
        let ctx = context("grid", dec!(100), dec!(1000), Decimal::ZERO);
        // 1000 * 0.02 / 100
        assert_eq!(risk_bounded_size(&ctx).unwrap(), dec!(0.2));
    }

    #[test]
    fn interval_tracking() {
        let now = Utc::now();
        assert!(interval_elapsed(None, now, 60));
        assert!(!interval_elapsed(Some(now - Duration::seconds(30)), now, 60));
        assert!(interval_elapsed(Some(now - Duration::seconds(60)), now, 60));
    }

    #[test]
    fn condition_references_checked_against_indicators() {
        let mut descriptor = context("trend_following", dec!(1), dec!(1), dec!(1)).config.strategy;
        descriptor.indicators = vec![IndicatorConfig {
            name: "bb".to_string(),
            indicator: IndicatorKind::BollingerBands {
                period: 20,
                std_dev: 2.0,
            },
        }];
        descriptor.conditions = Some(
            serde_json::from_value(serde_json::json!({
                "type": "COMPARE",
                "left": { "type": "PRICE" },
                "operator": "LESS_THAN",
                "right": { "type": "INDICATOR", "name": "bb.lower" }
            }))
            .unwrap(),
        );
        assert!(validate_conditions(&descriptor).is_ok());

        descriptor.indicators.clear();
        assert!(validate_conditions(&descriptor).is_err());
    }
}
