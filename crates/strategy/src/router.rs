//! Submission path for orders a strategy places on its own, such as arbitrage
//! legs and market-making quotes.
//!
//! Every order is capped at the bot's `max_position_size` and goes through the
//! execution pipeline, so it is retried and recorded like a tick-driven order.

use autotrade_core::position_sizing::round_down;
use autotrade_core::{BotConfig, EngineError, OrderRequest, OrderResult, OrderSide, Signal, TradeSignal};
use autotrade_execution::ExecutionPipeline;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

pub struct OrderRouter {
    pipeline: Arc<ExecutionPipeline>,
    bot_id: String,
    retry_attempts: u32,
    max_order_size: Decimal,
}

impl OrderRouter {
    #[must_use]
    pub fn new(pipeline: Arc<ExecutionPipeline>, config: &BotConfig) -> Self {
        Self {
            pipeline,
            bot_id: config.id.clone(),
            retry_attempts: config.execution.retry_attempts,
            max_order_size: config.risk.max_position_size,
        }
    }

    #[must_use]
    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    /// Largest base amount a single order may carry.
    #[must_use]
    pub const fn max_order_size(&self) -> Decimal {
        self.max_order_size
    }

    /// Caps `request` and submits it on `account_id`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::RiskLimit` when the capped amount rounds to zero, and
    /// `EngineError::Execution` once the pipeline's retries are exhausted. Both
    /// cases leave a FAILED TRADE record.
    pub async fn submit(
        &self,
        account_id: &str,
        reason: &str,
        mut request: OrderRequest,
    ) -> Result<OrderResult, EngineError> {
        let mut trade = TradeSignal::new(1.0, 1.0, reason);
        if let Some(price) = request.price {
            trade = trade.with_price(price);
        }
        let signal = match request.side {
            OrderSide::Buy => Signal::buy(trade),
            OrderSide::Sell => Signal::sell(trade),
        };

        let amount = round_down(request.amount.min(self.max_order_size));
        if amount <= Decimal::ZERO {
            let error = EngineError::risk_limit(format!(
                "{} {} amount {} rounds to zero",
                request.symbol, request.side, request.amount
            ));
            self.pipeline
                .reject(&self.bot_id, &signal, &request, &error)
                .await;
            return Err(error);
        }
        if amount < request.amount {
            debug!(
                bot_id = %self.bot_id,
                requested = %request.amount,
                capped = %amount,
                "Order capped at max position size"
            );
            request.amount = amount;
        }

        self.pipeline
            .execute(&self.bot_id, account_id, self.retry_attempts, &signal, &request)
            .await
    }
}
