use crate::helpers::{conditions_met, indicators, is_stop_loss_hit, is_take_profit_hit, parse_params, validate_conditions};
use crate::traits::Strategy;
use async_trait::async_trait;
use autotrade_core::{
    BotContext, EngineError, OrderSide, Signal, StrategyDescriptor, StrategyKind, TradeSignal,
};
use autotrade_signals::indicators::ema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendFollowingParams {
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,
}

const fn default_fast_period() -> usize {
    12
}

const fn default_slow_period() -> usize {
    26
}

impl TrendFollowingParams {
    pub(crate) fn from_descriptor(config: &StrategyDescriptor) -> Result<Self, EngineError> {
        let params: Self = parse_params(StrategyKind::TrendFollowing, config)?;
        if params.fast_period == 0 || params.fast_period >= params.slow_period {
            return Err(EngineError::strategy(
                "Trend following requires 0 < fastPeriod < slowPeriod",
            ));
        }
        validate_conditions(config)?;
        Ok(params)
    }
}

/// EMA crossover with optional rule confirmation and stop-loss/take-profit exits.
#[derive(Debug, Default)]
pub struct TrendFollowingStrategy {
    params: Option<TrendFollowingParams>,
    last_trend: Option<Ordering>,
}

impl TrendFollowingStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Strategy for TrendFollowingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TrendFollowing
    }

    async fn initialize(&mut self, config: &StrategyDescriptor) -> Result<(), EngineError> {
        let params = TrendFollowingParams::from_descriptor(config)?;
        self.params = Some(params);
        self.last_trend = None;
        Ok(())
    }

    async fn execute(&mut self, ctx: &BotContext) -> Result<Signal, EngineError> {
        let Some(params) = self.params.clone() else {
            return Err(EngineError::strategy("Trend following strategy not initialized"));
        };
        let price = ctx.current_price;
        let risk = &ctx.config.risk;

        if let Some(position) = ctx.position().filter(|p| p.side() == OrderSide::Buy) {
            if is_stop_loss_hit(position, price, risk.stop_loss_pct) {
                let signal = TradeSignal::new(1.0, 1.0, format!("Stop loss hit at {price}"))
                    .with_price(price)
                    .with_amount(position.quantity);
                return Ok(Signal::sell(signal));
            }
            if is_take_profit_hit(position, price, risk.take_profit_pct) {
                let signal = TradeSignal::new(1.0, 1.0, format!("Take profit hit at {price}"))
                    .with_price(price)
                    .with_amount(position.quantity);
                return Ok(Signal::sell(signal));
            }
        }

        let closes = ctx.closes();
        if closes.len() <= params.slow_period {
            return Ok(Signal::hold(format!(
                "Insufficient data: {} candles, need {}",
                closes.len(),
                params.slow_period + 1
            )));
        }

        let (Some(fast), Some(slow)) = (
            ema(&closes, params.fast_period).last().copied().flatten(),
            ema(&closes, params.slow_period).last().copied().flatten(),
        ) else {
            return Ok(Signal::hold("Indicators warming up"));
        };

        let trend = fast.partial_cmp(&slow).unwrap_or(Ordering::Equal);
        let previous = self.last_trend.replace(trend);

        // Only act on a change of direction.
        if previous == Some(trend) || trend == Ordering::Equal {
            return Ok(Signal::hold(format!("No crossover (fast {fast:.2}, slow {slow:.2})")));
        }

        let strength = ((fast - slow).abs() / slow * 100.0).min(1.0);
        match trend {
            Ordering::Greater => {
                let registry = indicators(ctx);
                if !conditions_met(ctx, &registry)? {
                    return Ok(Signal::hold("Bullish crossover not confirmed by conditions"));
                }
                let reason = format!("Fast EMA {fast:.2} crossed above slow EMA {slow:.2}");
                Ok(Signal::buy(TradeSignal::new(strength, 0.7, reason).with_price(price)))
            }
            _ => {
                let held = ctx.base_balance();
                if held <= rust_decimal::Decimal::ZERO {
                    return Ok(Signal::hold("Bearish crossover with nothing to sell"));
                }
                let reason = format!("Fast EMA {fast:.2} crossed below slow EMA {slow:.2}");
                Ok(Signal::sell(
                    TradeSignal::new(strength, 0.7, reason)
                        .with_price(price)
                        .with_amount(held),
                ))
            }
        }
    }

    async fn cleanup(&mut self) -> Result<(), EngineError> {
        self.last_trend = None;
        Ok(())
    }
}
