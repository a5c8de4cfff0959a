//! Order submission with retry and execution logging.

use crate::retry::RetryPolicy;
use autotrade_core::{
    BotExecutionRecord, BotStore, EngineError, ExchangeConnector, ExecutionAction, OrderRequest,
    OrderResult, Signal, TradeRecord,
};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct ExecutionPipeline {
    exchange: Arc<dyn ExchangeConnector>,
    store: Arc<dyn BotStore>,
    base_delay: Duration,
}

impl ExecutionPipeline {
    #[must_use]
    pub fn new(
        exchange: Arc<dyn ExchangeConnector>,
        store: Arc<dyn BotStore>,
        base_delay: Duration,
    ) -> Self {
        Self {
            exchange,
            store,
            base_delay,
        }
    }

    /// Submits `request` on `account_id` with up to `attempts` tries.
    ///
    /// Records a SUCCESS TRADE execution and a trade record on success, or a
    /// FAILED TRADE execution once retries are exhausted.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Execution` carrying the last exchange error.
    pub async fn execute(
        &self,
        bot_id: &str,
        account_id: &str,
        attempts: u32,
        signal: &Signal,
        request: &OrderRequest,
    ) -> Result<OrderResult, EngineError> {
        let policy = RetryPolicy::new(attempts, self.base_delay);
        let made = AtomicU32::new(0);

        let outcome = policy
            .run(|attempt| {
                made.store(attempt, Ordering::Relaxed);
                self.exchange.create_order(account_id, request)
            })
            .await;
        let made = made.load(Ordering::Relaxed);

        match outcome {
            Ok(order) => {
                info!(
                    bot_id,
                    order_id = %order.order_id,
                    side = %request.side,
                    amount = %request.amount,
                    attempts = made,
                    "Order submitted"
                );
                let details = json!({
                    "signal": signal.label(),
                    "reason": signal.reason(),
                    "order": order,
                    "amount": request.amount,
                    "price": request.price,
                    "attempts": made,
                });
                self.record(BotExecutionRecord::success(bot_id, ExecutionAction::Trade, details))
                    .await;

                let fallback = request
                    .price
                    .or_else(|| signal.trade().and_then(|(_, s)| s.price))
                    .unwrap_or_default();
                if let Some(trade) = TradeRecord::from_fill(bot_id, &order, fallback) {
                    if let Err(e) = self.store.record_trade(&trade).await {
                        warn!(bot_id, error = %e, "Failed to persist trade");
                    }
                }
                Ok(order)
            }
            Err(e) => {
                let message = format!("Order failed after {made} attempts: {e:#}");
                error!(bot_id, error = %message, "Order submission failed");
                let details = json!({
                    "signal": signal.label(),
                    "reason": signal.reason(),
                    "request": request,
                    "attempts": made,
                });
                self.record(BotExecutionRecord::failed(
                    bot_id,
                    ExecutionAction::Trade,
                    details,
                    message.clone(),
                ))
                .await;
                Err(EngineError::execution(message))
            }
        }
    }

    /// Records a FAILED TRADE for `request` without contacting the exchange.
    pub async fn reject(
        &self,
        bot_id: &str,
        signal: &Signal,
        request: &OrderRequest,
        error: &EngineError,
    ) {
        warn!(bot_id, error = %error, "Order rejected before submission");
        let details = json!({
            "stage": "risk",
            "kind": error.kind(),
            "signal": signal.label(),
            "reason": signal.reason(),
            "request": request,
        });
        self.record(BotExecutionRecord::failed(
            bot_id,
            ExecutionAction::Trade,
            details,
            error.to_string(),
        ))
        .await;
    }

    async fn record(&self, record: BotExecutionRecord) {
        if let Err(e) = self.store.append_execution(&record).await {
            warn!(bot_id = %record.bot_id, error = %e, "Failed to append execution record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::PaperExchange;
    use anyhow::Result;
    use async_trait::async_trait;
    use autotrade_core::{
        BotConfig, BotLifecycleState, ExecutionStatus, OrderSide, StoredBot, TradeSignal,
    };
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        executions: Mutex<Vec<BotExecutionRecord>>,
        trades: Mutex<Vec<TradeRecord>>,
    }

    #[async_trait]
    impl BotStore for RecordingStore {
        async fn load_bot(&self, _bot_id: &str) -> Result<Option<StoredBot>> {
            Ok(None)
        }

        async fn save_bot(&self, _config: &BotConfig) -> Result<()> {
            Ok(())
        }

        async fn list_bots(&self) -> Result<Vec<StoredBot>> {
            Ok(Vec::new())
        }

        async fn update_status(
            &self,
            _bot_id: &str,
            _status: BotLifecycleState,
            _at: DateTime<Utc>,
        ) -> Result<()> {
            Ok(())
        }

        async fn append_execution(&self, record: &BotExecutionRecord) -> Result<()> {
            self.executions.lock().await.push(record.clone());
            Ok(())
        }

        async fn list_executions(
            &self,
            _bot_id: &str,
            _limit: Option<usize>,
        ) -> Result<Vec<BotExecutionRecord>> {
            Ok(self.executions.lock().await.clone())
        }

        async fn record_trade(&self, trade: &TradeRecord) -> Result<()> {
            self.trades.lock().await.push(trade.clone());
            Ok(())
        }

        async fn list_trades(&self, _bot_id: &str) -> Result<Vec<TradeRecord>> {
            Ok(self.trades.lock().await.clone())
        }
    }

    fn setup() -> (Arc<PaperExchange>, Arc<RecordingStore>, ExecutionPipeline) {
        let exchange = Arc::new(PaperExchange::new(dec!(0.001)));
        exchange.set_balance("acct", "USDT", dec!(10000));
        exchange.set_price("BTC/USDT", dec!(100));
        let store = Arc::new(RecordingStore::default());
        let pipeline = ExecutionPipeline::new(exchange.clone(), store.clone(), Duration::from_millis(1));
        (exchange, store, pipeline)
    }

    fn buy_signal() -> Signal {
        Signal::buy(TradeSignal::new(1.0, 1.0, "test entry"))
    }

    fn request() -> OrderRequest {
        OrderRequest::market("BTC/USDT", OrderSide::Buy, dec!(1))
    }

    #[tokio::test]
    async fn success_after_transient_failures() {
        let (exchange, store, pipeline) = setup();
        exchange.fail_next_orders(2);

        let order = pipeline
            .execute("bot", "acct", 3, &buy_signal(), &request())
            .await
            .unwrap();
        assert!(order.is_filled());
        assert_eq!(exchange.submitted_orders(), 3);

        let executions = store.executions.lock().await;
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].action, ExecutionAction::Trade);
        assert_eq!(executions[0].status, ExecutionStatus::Success);
        assert_eq!(executions[0].details["attempts"], 3);

        let trades = store.trades.lock().await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(100));
    }

    #[tokio::test]
    async fn exhausted_retries_record_failure() {
        let (exchange, store, pipeline) = setup();
        exchange.fail_next_orders(10);

        let result = pipeline
            .execute("bot", "acct", 3, &buy_signal(), &request())
            .await;
        assert!(matches!(result, Err(EngineError::Execution(_))));
        assert_eq!(exchange.submitted_orders(), 3);

        let executions = store.executions.lock().await;
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Failed);
        assert!(executions[0]
            .error
            .as_deref()
            .unwrap()
            .contains("Injected order failure"));
        assert!(store.trades.lock().await.is_empty());
    }

    #[tokio::test]
    async fn rejection_is_recorded_without_submission() {
        let (exchange, store, pipeline) = setup();
        let error = EngineError::risk_limit("too small");

        pipeline.reject("bot", &buy_signal(), &request(), &error).await;
        assert_eq!(exchange.submitted_orders(), 0);

        let executions = store.executions.lock().await;
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Failed);
        assert_eq!(executions[0].details["kind"], "risk_limit");
    }

    #[tokio::test]
    async fn resting_limit_order_records_no_trade() {
        let (_exchange, store, pipeline) = setup();
        let limit = OrderRequest::limit("BTC/USDT", OrderSide::Buy, dec!(1), dec!(90));

        pipeline
            .execute("bot", "acct", 1, &buy_signal(), &limit)
            .await
            .unwrap();
        assert_eq!(store.executions.lock().await.len(), 1);
        assert!(store.trades.lock().await.is_empty());
    }
}
