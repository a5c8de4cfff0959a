//! Dollar-cost averaging: a fixed budget split across a queue of price targets.

use crate::helpers::{interval_elapsed, parse_params};
use crate::traits::Strategy;
use async_trait::async_trait;
use autotrade_core::position_sizing::round_down;
use autotrade_core::{
    BotContext, EngineError, OrderResult, Signal, StrategyDescriptor, StrategyKind, TradeSignal,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcaParams {
    /// Quote-asset budget.
    pub total_amount: Decimal,
    pub order_count: usize,
    pub target_price: Decimal,
    /// Spacing between entry targets as a fraction of `target_price`.
    #[serde(default = "default_price_deviation")]
    pub price_deviation: f64,
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,
}

const fn default_price_deviation() -> f64 {
    0.05
}

const fn default_min_interval_secs() -> u64 {
    3600
}

impl DcaParams {
    pub(crate) fn from_descriptor(config: &StrategyDescriptor) -> Result<Self, EngineError> {
        let params: Self = parse_params(StrategyKind::Dca, config)?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.total_amount <= Decimal::ZERO {
            return Err(EngineError::strategy("DCA totalAmount must be positive"));
        }
        if self.order_count == 0 {
            return Err(EngineError::strategy("DCA orderCount must be at least 1"));
        }
        if self.target_price <= Decimal::ZERO {
            return Err(EngineError::strategy("DCA targetPrice must be positive"));
        }
        if !(0.0..1.0).contains(&self.price_deviation) {
            return Err(EngineError::strategy("DCA priceDeviation must be in [0, 1)"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcaEntry {
    pub target_price: Decimal,
    /// Quote-asset budget for this entry.
    pub amount: Decimal,
    pub executed: bool,
    pub executed_price: Option<Decimal>,
    /// Base amount actually filled.
    pub filled_amount: Decimal,
}

/// Entry whose BUY is waiting for the exchange's answer.
#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    index: usize,
    at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct DcaStrategy {
    params: Option<DcaParams>,
    entries: Vec<DcaEntry>,
    pending: Option<PendingEntry>,
    last_execution: Option<DateTime<Utc>>,
    total_invested: Decimal,
    total_acquired: Decimal,
}

impl DcaStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[DcaEntry] {
        &self.entries
    }

    #[must_use]
    pub const fn total_invested(&self) -> Decimal {
        self.total_invested
    }

    #[must_use]
    pub const fn total_acquired(&self) -> Decimal {
        self.total_acquired
    }

    #[must_use]
    pub fn average_price(&self) -> Option<Decimal> {
        (self.total_acquired > Decimal::ZERO).then(|| self.total_invested / self.total_acquired)
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.executed)
    }

    fn build_queue(params: &DcaParams) -> Result<Vec<DcaEntry>, EngineError> {
        let count = Decimal::from(params.order_count);
        let amount = round_down(params.total_amount / count);
        let deviation = Decimal::try_from(params.price_deviation)
            .map_err(|e| EngineError::strategy(format!("Invalid priceDeviation: {e}")))?;
        let middle = (count - Decimal::ONE) / Decimal::TWO;

        let mut entries: Vec<DcaEntry> = (0..params.order_count)
            .map(|i| {
                let offset = (Decimal::from(i) - middle) * deviation;
                DcaEntry {
                    target_price: params.target_price * (Decimal::ONE + offset),
                    amount,
                    executed: false,
                    executed_price: None,
                    filled_amount: Decimal::ZERO,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.target_price.cmp(&b.target_price));

        if entries.iter().any(|e| e.target_price <= Decimal::ZERO) {
            return Err(EngineError::strategy(
                "DCA priceDeviation too large: entry targets would be non-positive",
            ));
        }
        Ok(entries)
    }
}

#[async_trait]
impl Strategy for DcaStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Dca
    }

    async fn initialize(&mut self, config: &StrategyDescriptor) -> Result<(), EngineError> {
        let params = DcaParams::from_descriptor(config)?;

        self.entries = Self::build_queue(&params)?;
        self.pending = None;
        self.last_execution = None;
        self.total_invested = Decimal::ZERO;
        self.total_acquired = Decimal::ZERO;
        info!(
            orders = params.order_count,
            target = %params.target_price,
            budget = %params.total_amount,
            "DCA plan initialized"
        );
        self.params = Some(params);
        Ok(())
    }

    async fn execute(&mut self, ctx: &BotContext) -> Result<Signal, EngineError> {
        let Some(params) = self.params.clone() else {
            return Err(EngineError::strategy("DCA strategy not initialized"));
        };
        // An unanswered BUY from an earlier tick never reached a fill.
        if let Some(stale) = self.pending.take() {
            debug!(index = stale.index, "Discarding unanswered DCA entry");
        }
        if self.is_completed() {
            return Ok(Signal::hold("DCA plan completed"));
        }
        if !ctx.has_price() {
            return Ok(Signal::hold("No market price available"));
        }
        if !interval_elapsed(self.last_execution, ctx.timestamp, params.min_interval_secs) {
            return Ok(Signal::hold("DCA spacing interval not elapsed"));
        }

        let price = ctx.current_price;
        let target = params.target_price;
        let Some((index, entry)) = self.entries.iter().enumerate().find(|(_, entry)| {
            !entry.executed
                && if entry.target_price > target {
                    price <= entry.target_price
                } else {
                    price >= entry.target_price
                }
        }) else {
            return Ok(Signal::hold(format!("No DCA entry triggered at {price}")));
        };

        let remaining = self.entries.iter().filter(|e| !e.executed).count() - 1;
        let signal = TradeSignal::new(
            0.6,
            0.8,
            format!(
                "DCA entry {index} (target {}) at {price}, {remaining} remaining",
                entry.target_price
            ),
        )
        .with_price(price)
        .with_amount(round_down(entry.amount / price));

        self.pending = Some(PendingEntry {
            index,
            at: ctx.timestamp,
        });
        Ok(Signal::buy(signal))
    }

    async fn on_order_result(&mut self, order: &OrderResult) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let Some(entry) = self.entries.get_mut(pending.index) else {
            return;
        };

        entry.executed = true;
        entry.executed_price = order.average_price;
        entry.filled_amount = order.filled_amount;
        if let Some(price) = order.average_price.filter(|_| order.filled_amount > Decimal::ZERO) {
            self.total_invested += order.filled_amount * price;
            self.total_acquired += order.filled_amount;
        }
        self.last_execution = Some(pending.at);
        debug!(
            index = pending.index,
            filled = %order.filled_amount,
            price = ?order.average_price,
            "DCA entry executed"
        );
    }

    async fn on_order_rejected(&mut self, reason: &str) {
        if let Some(pending) = self.pending.take() {
            warn!(index = pending.index, reason, "DCA entry not executed, keeping it queued");
        }
    }

    async fn cleanup(&mut self) -> Result<(), EngineError> {
        self.entries.clear();
        Ok(())
    }
}
