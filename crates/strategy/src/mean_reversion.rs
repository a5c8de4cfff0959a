//! Buys oversold dips below the lower Bollinger band and sells overbought spikes above the upper band.

use crate::helpers::{is_stop_loss_hit, is_take_profit_hit, parse_params};
use crate::traits::Strategy;
use async_trait::async_trait;
use autotrade_core::{
    BotContext, EngineError, OrderSide, Signal, StrategyDescriptor, StrategyKind, TradeSignal,
};
use autotrade_signals::indicators::{bollinger, last, rsi};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeanReversionParams {
    #[serde(default = "default_period")]
    pub period: usize,
    #[serde(default = "default_std_dev")]
    pub std_dev: f64,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_oversold")]
    pub oversold: f64,
    #[serde(default = "default_overbought")]
    pub overbought: f64,
}

const fn default_period() -> usize {
    20
}

const fn default_std_dev() -> f64 {
    2.0
}

const fn default_rsi_period() -> usize {
    14
}

const fn default_oversold() -> f64 {
    30.0
}

const fn default_overbought() -> f64 {
    70.0
}

impl MeanReversionParams {
    pub(crate) fn from_descriptor(config: &StrategyDescriptor) -> Result<Self, EngineError> {
        let params: Self = parse_params(StrategyKind::MeanReversion, config)?;
        if params.period < 2 || params.rsi_period == 0 {
            return Err(EngineError::strategy(
                "Mean reversion requires period >= 2 and rsiPeriod >= 1",
            ));
        }
        if params.std_dev <= 0.0 {
            return Err(EngineError::strategy("Mean reversion stdDev must be positive"));
        }
        if !(0.0..=100.0).contains(&params.oversold)
            || !(0.0..=100.0).contains(&params.overbought)
            || params.oversold >= params.overbought
        {
            return Err(EngineError::strategy(
                "Mean reversion requires 0 <= oversold < overbought <= 100",
            ));
        }
        Ok(params)
    }
}

#[derive(Debug, Default)]
pub struct MeanReversionStrategy {
    params: Option<MeanReversionParams>,
}

impl MeanReversionStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Strategy for MeanReversionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    async fn initialize(&mut self, config: &StrategyDescriptor) -> Result<(), EngineError> {
        let params = MeanReversionParams::from_descriptor(config)?;
        self.params = Some(params);
        Ok(())
    }

    async fn execute(&mut self, ctx: &BotContext) -> Result<Signal, EngineError> {
        let Some(params) = self.params.clone() else {
            return Err(EngineError::strategy("Mean reversion strategy not initialized"));
        };
        let price = ctx.current_price;
        let risk = &ctx.config.risk;

        if let Some(position) = ctx.position().filter(|p| p.side() == OrderSide::Buy) {
            if is_stop_loss_hit(position, price, risk.stop_loss_pct)
                || is_take_profit_hit(position, price, risk.take_profit_pct)
            {
                let signal = TradeSignal::new(1.0, 1.0, format!("Exit at {price}"))
                    .with_price(price)
                    .with_amount(position.quantity);
                return Ok(Signal::sell(signal));
            }
        }

        let closes = ctx.closes();
        let needed = params.period.max(params.rsi_period + 1);
        if closes.len() < needed {
            return Ok(Signal::hold(format!(
                "Insufficient data: {} candles, need {needed}",
                closes.len()
            )));
        }

        let bands = bollinger(&closes, params.period, params.std_dev);
        let (Some(upper), Some(lower), Some(rsi_value)) = (
            last(&bands.upper),
            last(&bands.lower),
            last(&rsi(&closes, params.rsi_period)),
        ) else {
            return Ok(Signal::hold("Indicators warming up"));
        };
        let price_f = price.to_f64().unwrap_or(0.0);

        if price_f <= lower && rsi_value < params.oversold {
            let strength = ((params.oversold - rsi_value) / params.oversold).clamp(0.1, 1.0);
            let reason = format!("Price {price} below lower band {lower:.2}, RSI {rsi_value:.1}");
            return Ok(Signal::buy(TradeSignal::new(strength, 0.6, reason).with_price(price)));
        }

        if price_f >= upper && rsi_value > params.overbought {
            let held = ctx.base_balance();
            if held <= Decimal::ZERO {
                return Ok(Signal::hold("Overbought with nothing to sell"));
            }
            let strength =
                ((rsi_value - params.overbought) / (100.0 - params.overbought)).clamp(0.1, 1.0);
            let reason = format!("Price {price} above upper band {upper:.2}, RSI {rsi_value:.1}");
            return Ok(Signal::sell(
                TradeSignal::new(strength, 0.6, reason)
                    .with_price(price)
                    .with_amount(held),
            ));
        }

        Ok(Signal::hold(format!(
            "Price {price} inside bands [{lower:.2}, {upper:.2}]"
        )))
    }

    async fn cleanup(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}
