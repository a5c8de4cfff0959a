//! Two-sided quoting around mid with inventory skew.

use crate::helpers::parse_params;
use crate::traits::{Strategy, StrategyDeps};
use async_trait::async_trait;
use autotrade_core::position_sizing::round_down;
use autotrade_core::{
    BotContext, EngineError, OrderRequest, OrderSide, Signal, StrategyDescriptor, StrategyKind,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketMakingParams {
    /// Total bid/ask distance as a fraction of mid.
    pub spread: f64,
    /// Base-asset amount per quote.
    pub order_amount: Decimal,
    /// Desired share of portfolio value held in the base asset.
    #[serde(default = "default_target_inventory")]
    pub target_inventory: f64,
    /// Requote when the desired price moves by more than this fraction.
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold: f64,
}

const fn default_target_inventory() -> f64 {
    0.5
}

const fn default_refresh_threshold() -> f64 {
    0.001
}

impl MarketMakingParams {
    pub(crate) fn from_descriptor(config: &StrategyDescriptor) -> Result<Self, EngineError> {
        let params: Self = parse_params(StrategyKind::MarketMaking, config)?;
        if !(params.spread > 0.0 && params.spread < 1.0) {
            return Err(EngineError::strategy("Market making spread must be in (0, 1)"));
        }
        if params.order_amount <= Decimal::ZERO {
            return Err(EngineError::strategy(
                "Market making orderAmount must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&params.target_inventory) {
            return Err(EngineError::strategy(
                "Market making targetInventory must be in [0, 1]",
            ));
        }
        if params.refresh_threshold < 0.0 {
            return Err(EngineError::strategy(
                "Market making refreshThreshold cannot be negative",
            ));
        }
        Ok(params)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub order_id: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
}

pub struct MarketMakingStrategy {
    deps: StrategyDeps,
    params: Option<MarketMakingParams>,
    bid: Option<Quote>,
    ask: Option<Quote>,
}

impl MarketMakingStrategy {
    #[must_use]
    pub const fn new(deps: StrategyDeps) -> Self {
        Self {
            deps,
            params: None,
            bid: None,
            ask: None,
        }
    }

    #[must_use]
    pub const fn bid(&self) -> Option<&Quote> {
        self.bid.as_ref()
    }

    #[must_use]
    pub const fn ask(&self) -> Option<&Quote> {
        self.ask.as_ref()
    }

    /// Desired bid and ask. Holding more base than targeted shifts both quotes down.
    fn desired_prices(params: &MarketMakingParams, ctx: &BotContext) -> (Decimal, Decimal) {
        let mid = ctx.current_price;
        let spread = Decimal::try_from(params.spread).unwrap_or(Decimal::ZERO);
        let base_value = ctx.base_balance() * mid;
        let total = base_value + ctx.quote_balance();
        let share = if total > Decimal::ZERO {
            base_value / total
        } else {
            Decimal::ZERO
        };
        let target = Decimal::try_from(params.target_inventory).unwrap_or(Decimal::ZERO);
        let skew = (share - target) * spread;
        let half = spread / Decimal::TWO;

        (
            (mid * (Decimal::ONE - half - skew)).round_dp(8),
            (mid * (Decimal::ONE + half - skew)).round_dp(8),
        )
    }

    async fn cancel(&self, quote: &Quote) {
        if let Err(e) = self
            .deps
            .exchange
            .cancel_order(&self.deps.account_id, &self.deps.symbol, &quote.order_id)
            .await
        {
            warn!(order_id = %quote.order_id, error = %e, "Quote cancel failed");
        }
    }

    /// Keeps one quote on `side` near `desired`. Returns a short status for the hold reason.
    async fn maintain(
        &mut self,
        side: OrderSide,
        desired: Decimal,
        amount: Decimal,
        ctx: &BotContext,
        threshold: Decimal,
    ) -> String {
        let current = match side {
            OrderSide::Buy => self.bid.take(),
            OrderSide::Sell => self.ask.take(),
        };

        if let Some(quote) = current {
            let resting = ctx.open_orders.iter().any(|o| o.order_id == quote.order_id);
            let drift = if desired > Decimal::ZERO {
                (quote.price - desired).abs() / desired
            } else {
                Decimal::ZERO
            };
            if resting && drift <= threshold {
                let status = format!("{side} {} kept", quote.price);
                self.store(side, quote);
                return status;
            }
            if resting {
                debug!(order_id = %quote.order_id, "Refreshing stale quote");
                self.cancel(&quote).await;
            }
        }

        if amount <= Decimal::ZERO {
            return format!("{side} skipped (no balance)");
        }

        let request = OrderRequest::limit(&self.deps.symbol, side, amount, desired);
        let reason = format!("Market making {side} quote at {desired}");
        match self
            .deps
            .orders
            .submit(&self.deps.account_id, &reason, request)
            .await
        {
            Ok(order) => {
                self.store(
                    side,
                    Quote {
                        order_id: order.order_id,
                        side,
                        price: desired,
                        amount,
                    },
                );
                format!("{side} {desired} placed")
            }
            Err(e) => {
                warn!(side = %side, error = %e, "Quote placement failed");
                format!("{side} failed: {e}")
            }
        }
    }

    fn store(&mut self, side: OrderSide, quote: Quote) {
        match side {
            OrderSide::Buy => self.bid = Some(quote),
            OrderSide::Sell => self.ask = Some(quote),
        }
    }
}

#[async_trait]
impl Strategy for MarketMakingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MarketMaking
    }

    async fn initialize(&mut self, config: &StrategyDescriptor) -> Result<(), EngineError> {
        let params = MarketMakingParams::from_descriptor(config)?;
        self.params = Some(params);
        Ok(())
    }

    async fn execute(&mut self, ctx: &BotContext) -> Result<Signal, EngineError> {
        let Some(params) = self.params.clone() else {
            return Err(EngineError::strategy("Market making strategy not initialized"));
        };
        if !ctx.has_price() {
            return Ok(Signal::hold("No market price available"));
        }

        let (bid_price, ask_price) = Self::desired_prices(&params, ctx);
        if bid_price <= Decimal::ZERO || ask_price <= Decimal::ZERO {
            return Ok(Signal::hold(format!(
                "Quote prices {bid_price}/{ask_price} not positive at mid {}",
                ctx.current_price
            )));
        }
        let threshold = Decimal::try_from(params.refresh_threshold).unwrap_or(Decimal::ZERO);
        let max_amount = params.order_amount.min(self.deps.orders.max_order_size());
        let bid_amount = round_down(max_amount.min(ctx.quote_balance() / bid_price));
        let ask_amount = round_down(max_amount.min(ctx.base_balance()));

        let bid_status = self
            .maintain(OrderSide::Buy, bid_price, bid_amount, ctx, threshold)
            .await;
        let ask_status = self
            .maintain(OrderSide::Sell, ask_price, ask_amount, ctx, threshold)
            .await;

        Ok(Signal::hold(format!("Quotes: {bid_status}; {ask_status}")))
    }

    async fn cleanup(&mut self) -> Result<(), EngineError> {
        if let Some(quote) = self.bid.take() {
            self.cancel(&quote).await;
        }
        if let Some(quote) = self.ask.take() {
            self.cancel(&quote).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{config, context, deps};
    use autotrade_core::{ExchangeConnector, ExecutionStatus};
    use autotrade_execution::PaperExchange;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Arc;

    async fn setup() -> (Arc<PaperExchange>, MarketMakingStrategy) {
        let exchange = Arc::new(PaperExchange::new(Decimal::ZERO));
        exchange.set_balance("paper", "USDT", dec!(10000));
        exchange.set_balance("paper", "BTC", dec!(1));
        exchange.set_quote("paper", "BTC/USDT", dec!(99), dec!(101));

        let bot = config(
            "market_making",
            json!({ "spread": 0.02, "orderAmount": "0.5", "refreshThreshold": 0.001 }),
        );
        let (deps, _store) = deps(exchange.clone(), "paper", &bot);
        let mut strategy = MarketMakingStrategy::new(deps);
        strategy.initialize(&bot.strategy).await.unwrap();
        (exchange, strategy)
    }

    async fn context_from(exchange: &PaperExchange, price: Decimal) -> BotContext {
        let mut ctx = context("market_making", price, Decimal::ZERO, Decimal::ZERO);
        ctx.balances = exchange.get_balances("paper").await.unwrap();
        ctx.open_orders = exchange.get_open_orders("paper", "BTC/USDT").await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn places_both_quotes_then_keeps_them() {
        let (exchange, mut strategy) = setup().await;
        let ctx = context_from(&exchange, dec!(100)).await;
        let signal = strategy.execute(&ctx).await.unwrap();
        assert!(signal.is_hold());

        let bid = strategy.bid().unwrap().clone();
        let ask = strategy.ask().unwrap().clone();
        assert!(bid.price < dec!(100));
        assert!(ask.price > dec!(100));
        assert_eq!(exchange.submitted_orders(), 2);

        let ctx = context_from(&exchange, dec!(100)).await;
        strategy.execute(&ctx).await.unwrap();
        assert_eq!(exchange.submitted_orders(), 2);
        assert_eq!(strategy.bid(), Some(&bid));
    }

    #[tokio::test]
    async fn heavy_inventory_skews_quotes_down() {
        let (exchange, mut strategy) = setup().await;
        exchange.set_balance("paper", "BTC", dec!(1000));
        let ctx = context_from(&exchange, dec!(100)).await;
        strategy.execute(&ctx).await.unwrap();

        // Mostly base: ask sits below mid + half spread.
        assert!(strategy.ask().unwrap().price < dec!(101));
    }

    #[tokio::test]
    async fn requotes_after_price_move_and_cleanup_cancels() {
        let (exchange, mut strategy) = setup().await;
        let ctx = context_from(&exchange, dec!(100)).await;
        strategy.execute(&ctx).await.unwrap();
        let first_bid = strategy.bid().unwrap().order_id.clone();

        exchange.set_quote("paper", "BTC/USDT", dec!(102), dec!(104));
        let ctx = context_from(&exchange, dec!(103)).await;
        strategy.execute(&ctx).await.unwrap();
        assert_ne!(strategy.bid().unwrap().order_id, first_bid);
        assert_eq!(exchange.open_order_ids("paper").len(), 2);

        strategy.cleanup().await.unwrap();
        assert!(exchange.open_order_ids("paper").is_empty());
        assert!(strategy.bid().is_none());
    }

    #[tokio::test]
    async fn quotes_are_capped_and_recorded() {
        let exchange = Arc::new(PaperExchange::new(Decimal::ZERO));
        exchange.set_balance("paper", "USDT", dec!(100000));
        exchange.set_balance("paper", "BTC", dec!(10));
        exchange.set_quote("paper", "BTC/USDT", dec!(99), dec!(101));
        let mut bot = config("market_making", json!({ "spread": 0.02, "orderAmount": "5" }));
        bot.risk.max_position_size = dec!(0.2);
        let (deps, store) = deps(exchange.clone(), "paper", &bot);
        let mut strategy = MarketMakingStrategy::new(deps);
        strategy.initialize(&bot.strategy).await.unwrap();

        let ctx = context_from(&exchange, dec!(100)).await;
        strategy.execute(&ctx).await.unwrap();
        assert_eq!(strategy.bid().unwrap().amount, dec!(0.2));
        assert_eq!(strategy.ask().unwrap().amount, dec!(0.2));

        let executions = store.executions().await;
        assert_eq!(executions.len(), 2);
        assert!(executions.iter().all(|e| e.status == ExecutionStatus::Success));
        // Resting quotes are not fills.
        assert!(store.trades().await.is_empty());
    }

    #[tokio::test]
    async fn degenerate_price_holds_without_quoting() {
        let (exchange, mut strategy) = setup().await;
        let ctx = context_from(&exchange, dec!(0.000000001)).await;

        let signal = strategy.execute(&ctx).await.unwrap();
        assert!(signal.reason().contains("not positive"));
        assert_eq!(exchange.submitted_orders(), 0);
    }
}
