//! Fixtures for strategy unit tests.

use crate::router::OrderRouter;
use crate::traits::StrategyDeps;
use anyhow::Result;
use async_trait::async_trait;
use autotrade_core::{
    BotConfig, BotContext, BotExecutionRecord, BotLifecycleState, BotStore, Candle, StoredBot,
    StrategyDescriptor, TradeRecord,
};
use autotrade_execution::{ExecutionPipeline, PaperExchange};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub fn config(strategy_type: &str, parameters: Value) -> BotConfig {
    serde_json::from_value(json!({
        "id": "bot-test",
        "name": "test bot",
        "strategy": { "strategy_type": strategy_type, "parameters": parameters },
        "market": { "symbol": "BTC/USDT", "exchange_account_id": "paper" }
    }))
    .unwrap()
}

pub fn descriptor(strategy_type: &str, parameters: Value) -> StrategyDescriptor {
    config(strategy_type, parameters).strategy
}

pub fn context(strategy_type: &str, price: Decimal, quote: Decimal, base: Decimal) -> BotContext {
    let mut balances = HashMap::new();
    balances.insert("USDT".to_string(), quote);
    balances.insert("BTC".to_string(), base);
    BotContext {
        config: config(strategy_type, json!({})),
        candles: Vec::new(),
        current_price: price,
        balances,
        positions: Vec::new(),
        open_orders: Vec::new(),
        recent_trades: Vec::new(),
        timestamp: Utc::now(),
    }
}

/// Hourly candles ending now, one per close.
pub fn candles(closes: &[f64]) -> Vec<Candle> {
    let start = Utc::now() - Duration::hours(i64::try_from(closes.len()).unwrap());
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let price = Decimal::try_from(*close).unwrap();
            Candle::flat(
                start + Duration::hours(i64::try_from(i).unwrap()),
                price,
                Decimal::ONE,
            )
        })
        .collect()
}

/// Store that keeps execution and trade records in memory.
#[derive(Default)]
pub struct RecordingStore {
    executions: Mutex<Vec<BotExecutionRecord>>,
    trades: Mutex<Vec<TradeRecord>>,
}

impl RecordingStore {
    pub async fn executions(&self) -> Vec<BotExecutionRecord> {
        self.executions.lock().await.clone()
    }

    pub async fn trades(&self) -> Vec<TradeRecord> {
        self.trades.lock().await.clone()
    }
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
        Ok(self.executions().await)
    }

    async fn record_trade(&self, trade: &TradeRecord) -> Result<()> {
        self.trades.lock().await.push(trade.clone());
        Ok(())
    }

    async fn list_trades(&self, _bot_id: &str) -> Result<Vec<TradeRecord>> {
        Ok(self.trades().await)
    }
}

/// Deps for a bot on `account` whose own orders go through a recording pipeline.
pub fn deps(
    exchange: Arc<PaperExchange>,
    account: &str,
    bot: &BotConfig,
) -> (StrategyDeps, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::default());
    let pipeline = Arc::new(ExecutionPipeline::new(
        exchange.clone(),
        store.clone(),
        std::time::Duration::from_millis(1),
    ));
    let router = Arc::new(OrderRouter::new(pipeline, bot));
    (StrategyDeps::new(exchange, router, account, "BTC/USDT"), store)
}
