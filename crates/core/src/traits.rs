use crate::bot_config::BotConfig;
use crate::execution_record::BotExecutionRecord;
use crate::lifecycle::{BotLifecycleState, StoredBot};
use crate::market::{Candle, Ticker};
use crate::orders::{OpenOrder, OrderRequest, OrderResult, TradeRecord};
use crate::risk_analytics::{SizingRequest, SizingResult, StopLossDecision, StopLossRequest};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Exchange connectivity, addressed by exchange account.
#[async_trait]
pub trait ExchangeConnector: Send + Sync {
    async fn get_candles(
        &self,
        account_id: &str,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>>;

    /// Asset -> free amount.
    async fn get_balances(&self, account_id: &str) -> Result<HashMap<String, Decimal>>;

    async fn get_ticker(&self, account_id: &str, symbol: &str) -> Result<Ticker>;

    async fn get_open_orders(&self, account_id: &str, symbol: &str) -> Result<Vec<OpenOrder>>;

    async fn create_order(&self, account_id: &str, request: &OrderRequest) -> Result<OrderResult>;

    async fn cancel_order(&self, account_id: &str, symbol: &str, order_id: &str) -> Result<()>;

    async fn test_connection(&self, account_id: &str) -> Result<bool>;
}

/// Persistence of bot configuration, status, and history.
#[async_trait]
pub trait BotStore: Send + Sync {
    async fn load_bot(&self, bot_id: &str) -> Result<Option<StoredBot>>;

    /// Inserts or replaces the configuration, keeping status fields.
    async fn save_bot(&self, config: &BotConfig) -> Result<()>;

    async fn list_bots(&self) -> Result<Vec<StoredBot>>;

    /// Sets the status; `at` becomes `started_at` for `Running` and `stopped_at` for `Stopped`.
    async fn update_status(
        &self,
        bot_id: &str,
        status: BotLifecycleState,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn append_execution(&self, record: &BotExecutionRecord) -> Result<()>;

    /// Oldest first. `limit` keeps the most recent entries.
    async fn list_executions(
        &self,
        bot_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<BotExecutionRecord>>;

    async fn record_trade(&self, trade: &TradeRecord) -> Result<()>;

    /// Oldest first.
    async fn list_trades(&self, bot_id: &str) -> Result<Vec<TradeRecord>>;
}

/// Advanced sizing and stop decisions.
pub trait RiskAnalytics: Send + Sync {
    fn size_position(&self, request: &SizingRequest) -> SizingResult;

    fn stop_loss(&self, request: &StopLossRequest) -> StopLossDecision;
}
