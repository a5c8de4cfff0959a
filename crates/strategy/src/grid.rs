//! Grid trading: a ladder of alternating BUY/SELL levels across a price range.

use crate::helpers::{interval_elapsed, parse_params};
use crate::traits::Strategy;
use async_trait::async_trait;
use autotrade_core::{
    BotContext, EngineError, OrderSide, Signal, StrategyDescriptor, StrategyKind, TradeSignal,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridParams {
    pub upper_price: Decimal,
    pub lower_price: Decimal,
    pub grid_levels: usize,
    /// Base-asset amount per filled level.
    pub amount_per_grid: Decimal,
    /// Drift from the grid centre, as a fraction of the centre, that triggers a rebalance.
    #[serde(default = "default_rebalance_threshold")]
    pub rebalance_threshold: f64,
    #[serde(default = "default_min_rebalance_interval_secs")]
    pub min_rebalance_interval_secs: u64,
    /// Match window around a level, as a fraction of the grid step.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

const fn default_rebalance_threshold() -> f64 {
    0.1
}

const fn default_min_rebalance_interval_secs() -> u64 {
    3600
}

const fn default_tolerance() -> f64 {
    0.1
}

impl GridParams {
    pub(crate) fn from_descriptor(config: &StrategyDescriptor) -> Result<Self, EngineError> {
        let params: Self = parse_params(StrategyKind::Grid, config)?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.lower_price <= Decimal::ZERO {
            return Err(EngineError::strategy("Grid lowerPrice must be positive"));
        }
        if self.upper_price <= self.lower_price {
            return Err(EngineError::strategy(
                "Grid upperPrice must be greater than lowerPrice",
            ));
        }
        if self.grid_levels < 2 {
            return Err(EngineError::strategy("Grid requires at least 2 levels"));
        }
        if self.amount_per_grid <= Decimal::ZERO {
            return Err(EngineError::strategy("Grid amountPerGrid must be positive"));
        }
        if self.rebalance_threshold <= 0.0 {
            return Err(EngineError::strategy(
                "Grid rebalanceThreshold must be positive",
            ));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 0.5) {
            return Err(EngineError::strategy(
                "Grid tolerance must be in (0, 0.5) of the grid step",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLevel {
    pub price: Decimal,
    pub side: OrderSide,
    pub filled: bool,
}

#[derive(Debug, Default)]
pub struct GridStrategy {
    params: Option<GridParams>,
    levels: Vec<GridLevel>,
    lower: Decimal,
    upper: Decimal,
    last_price: Option<Decimal>,
    last_rebalance: Option<DateTime<Utc>>,
}

impl GridStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    #[must_use]
    pub fn center(&self) -> Decimal {
        (self.lower + self.upper) / Decimal::TWO
    }

    fn step(&self) -> Decimal {
        let gaps = self.levels.len().saturating_sub(1).max(1);
        (self.upper - self.lower) / Decimal::from(gaps)
    }

    fn build_ladder(&mut self, lower: Decimal, upper: Decimal, count: usize) {
        let step = (upper - lower) / Decimal::from(count - 1);
        self.lower = lower;
        self.upper = upper;
        self.levels = (0..count)
            .map(|i| GridLevel {
                price: if i == count - 1 {
                    upper
                } else {
                    lower + step * Decimal::from(i)
                },
                side: if i % 2 == 0 { OrderSide::Buy } else { OrderSide::Sell },
                filled: false,
            })
            .collect();
    }

    fn should_rebalance(&self, params: &GridParams, price: Decimal, now: DateTime<Utc>) -> bool {
        let center = self.center();
        if center <= Decimal::ZERO {
            return false;
        }
        let threshold = Decimal::try_from(params.rebalance_threshold).unwrap_or(Decimal::MAX);
        ((price - center).abs() / center) > threshold
            && interval_elapsed(self.last_rebalance, now, params.min_rebalance_interval_secs)
    }

    /// Re-centres the ladder on `price` keeping its width. Returns `false` when the
    /// re-centred range would drop to zero or below.
    fn rebalance(&mut self, price: Decimal, now: DateTime<Utc>) -> bool {
        let half_width = (self.upper - self.lower) / Decimal::TWO;
        let lower = price - half_width;
        if lower <= Decimal::ZERO {
            return false;
        }
        let count = self.levels.len();
        self.build_ladder(lower, price + half_width, count);
        self.last_rebalance = Some(now);
        true
    }
}

#[async_trait]
impl Strategy for GridStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Grid
    }

    async fn initialize(&mut self, config: &StrategyDescriptor) -> Result<(), EngineError> {
        let params = GridParams::from_descriptor(config)?;

        self.build_ladder(params.lower_price, params.upper_price, params.grid_levels);
        self.last_price = None;
        self.last_rebalance = Some(Utc::now());
        info!(
            lower = %params.lower_price,
            upper = %params.upper_price,
            levels = params.grid_levels,
            "Grid initialized"
        );
        self.params = Some(params);
        Ok(())
    }

    async fn execute(&mut self, ctx: &BotContext) -> Result<Signal, EngineError> {
        let Some(params) = self.params.clone() else {
            return Err(EngineError::strategy("Grid strategy not initialized"));
        };
        if !ctx.has_price() {
            return Ok(Signal::hold("No market price available"));
        }

        let price = ctx.current_price;
        let previous = self.last_price.replace(price);

        if self.should_rebalance(&params, price, ctx.timestamp) && self.rebalance(price, ctx.timestamp) {
            info!(center = %price, "Grid rebalanced");
            return Ok(Signal::hold(format!("Grid rebalanced around {price}")));
        }

        if price < self.lower || price > self.upper {
            return Ok(Signal::hold(format!(
                "Price {price} outside grid range [{}, {}]",
                self.lower, self.upper
            )));
        }

        // Flat counts as both directions.
        let rising = previous.map_or(true, |prev| price >= prev);
        let falling = previous.map_or(true, |prev| price <= prev);
        let tolerance = self.step() * Decimal::try_from(params.tolerance).unwrap_or(Decimal::ZERO);

        let hit = self.levels.iter_mut().enumerate().find(|(_, level)| {
            let direction_ok = match level.side {
                OrderSide::Buy => rising,
                OrderSide::Sell => falling,
            };
            !level.filled && direction_ok && (price - level.price).abs() <= tolerance
        });

        let Some((index, level)) = hit else {
            return Ok(Signal::hold(format!("No grid level near {price}")));
        };
        level.filled = true;
        debug!(index, level = %level.price, side = %level.side, "Grid level filled");

        let reason = format!("Grid {} level {index} at {}", level.side, level.price);
        let signal = TradeSignal::new(0.8, 0.9, reason)
            .with_price(level.price)
            .with_amount(params.amount_per_grid);

        Ok(match level.side {
            OrderSide::Buy => Signal::buy(signal),
            OrderSide::Sell => Signal::sell(signal),
        })
    }

    async fn cleanup(&mut self) -> Result<(), EngineError> {
        // Grid fills go through the pipeline as market orders, so nothing rests on the book.
        self.levels.clear();
        self.last_price = None;
        Ok(())
    }
}
