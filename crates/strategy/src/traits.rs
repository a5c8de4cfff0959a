use crate::router::OrderRouter;
use autotrade_core::{
    BotContext, EngineError, ExchangeConnector, OrderResult, Signal, StrategyDescriptor,
    StrategyKind,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Decision logic for one bot.
///
/// Each instance owns its state; the registry never shares an instance between bots.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Validates the parameter set and builds initial state.
    async fn initialize(&mut self, config: &StrategyDescriptor) -> Result<(), EngineError>;

    /// Produces the signal for one tick. Recoverable conditions yield `Signal::Hold`.
    async fn execute(&mut self, ctx: &BotContext) -> Result<Signal, EngineError>;

    /// Called with the exchange's answer to the order built from the last BUY/SELL.
    async fn on_order_result(&mut self, _order: &OrderResult) {}

    /// Called when the last BUY/SELL was rejected or its submission failed.
    async fn on_order_rejected(&mut self, _reason: &str) {}

    /// Releases exchange-side resources owned by the strategy.
    async fn cleanup(&mut self) -> Result<(), EngineError>;
}

/// Collaborators handed to every strategy at construction.
#[derive(Clone)]
pub struct StrategyDeps {
    /// Read access and cancels. New orders go through `orders`.
    pub exchange: Arc<dyn ExchangeConnector>,
    pub orders: Arc<OrderRouter>,
    /// Account the bot trades on.
    pub account_id: String,
    pub symbol: String,
}

impl StrategyDeps {
    pub fn new(
        exchange: Arc<dyn ExchangeConnector>,
        orders: Arc<OrderRouter>,
        account_id: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            exchange,
            orders,
            account_id: account_id.into(),
            symbol: symbol.into(),
        }
    }
}
