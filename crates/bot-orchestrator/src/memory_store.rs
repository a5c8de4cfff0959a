use anyhow::{bail, Result};
use async_trait::async_trait;
use autotrade_core::{
    BotConfig, BotExecutionRecord, BotLifecycleState, BotStore, StoredBot, TradeRecord,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// `BotStore` kept entirely in memory. Used by tests and the paper-trading CLI.
#[derive(Default)]
pub struct MemoryBotStore {
    bots: RwLock<HashMap<String, StoredBot>>,
    executions: RwLock<Vec<BotExecutionRecord>>,
    trades: RwLock<Vec<TradeRecord>>,
}

impl MemoryBotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BotStore for MemoryBotStore {
    async fn load_bot(&self, bot_id: &str) -> Result<Option<StoredBot>> {
        Ok(self.bots.read().await.get(bot_id).cloned())
    }

    async fn save_bot(&self, config: &BotConfig) -> Result<()> {
        let mut bots = self.bots.write().await;
        bots.entry(config.id.clone())
            .and_modify(|stored| stored.config = config.clone())
            .or_insert_with(|| StoredBot::new(config.clone()));
        Ok(())
    }

    async fn list_bots(&self) -> Result<Vec<StoredBot>> {
        let mut bots: Vec<StoredBot> = self.bots.read().await.values().cloned().collect();
        bots.sort_by(|a, b| a.config.id.cmp(&b.config.id));
        Ok(bots)
    }

    async fn update_status(
        &self,
        bot_id: &str,
        status: BotLifecycleState,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut bots = self.bots.write().await;
        let Some(stored) = bots.get_mut(bot_id) else {
            bail!("Bot {bot_id} not found");
        };
        stored.status = status;
        match status {
            BotLifecycleState::Running => stored.started_at = Some(at),
            BotLifecycleState::Stopped => stored.stopped_at = Some(at),
            BotLifecycleState::Paused => {}
        }
        Ok(())
    }

    async fn append_execution(&self, record: &BotExecutionRecord) -> Result<()> {
        self.executions.write().await.push(record.clone());
        Ok(())
    }

    async fn list_executions(
        &self,
        bot_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<BotExecutionRecord>> {
        let executions = self.executions.read().await;
        let matching: Vec<_> = executions
            .iter()
            .filter(|record| record.bot_id == bot_id)
            .cloned()
            .collect();
        let skip = limit.map_or(0, |limit| matching.len().saturating_sub(limit));
        Ok(matching.into_iter().skip(skip).collect())
    }

    async fn record_trade(&self, trade: &TradeRecord) -> Result<()> {
        self.trades.write().await.push(trade.clone());
        Ok(())
    }

    async fn list_trades(&self, bot_id: &str) -> Result<Vec<TradeRecord>> {
        Ok(self
            .trades
            .read()
            .await
            .iter()
            .filter(|trade| trade.bot_id == bot_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autotrade_core::{ExecutionAction, MarketDescriptor, StrategyDescriptor};

    fn config(id: &str) -> BotConfig {
        BotConfig {
            id: id.to_string(),
            name: format!("{id} bot"),
            enabled: true,
            strategy: StrategyDescriptor {
                strategy_type: "grid".to_string(),
                parameters: serde_json::Map::new(),
                indicators: Vec::new(),
                conditions: None,
            },
            market: MarketDescriptor {
                symbol: "BTC/USDT".to_string(),
                exchange_account_id: "paper".to_string(),
            },
            risk: Default::default(),
            execution: Default::default(),
        }
    }

    #[tokio::test]
    async fn save_keeps_status_fields() {
        let store = MemoryBotStore::new();
        store.save_bot(&config("a")).await.unwrap();
        store
            .update_status("a", BotLifecycleState::Running, Utc::now())
            .await
            .unwrap();

        let mut renamed = config("a");
        renamed.name = "renamed".to_string();
        store.save_bot(&renamed).await.unwrap();

        let stored = store.load_bot("a").await.unwrap().unwrap();
        assert_eq!(stored.config.name, "renamed");
        assert_eq!(stored.status, BotLifecycleState::Running);
        assert!(stored.started_at.is_some());
        assert!(stored.stopped_at.is_none());
    }

    #[tokio::test]
    async fn update_status_of_unknown_bot_fails() {
        let store = MemoryBotStore::new();
        assert!(store
            .update_status("ghost", BotLifecycleState::Stopped, Utc::now())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn executions_filter_by_bot_and_keep_most_recent() {
        let store = MemoryBotStore::new();
        for action in [
            ExecutionAction::Start,
            ExecutionAction::Pause,
            ExecutionAction::Resume,
            ExecutionAction::Stop,
        ] {
            store
                .append_execution(&BotExecutionRecord::success("a", action, serde_json::json!({})))
                .await
                .unwrap();
        }
        store
            .append_execution(&BotExecutionRecord::success(
                "b",
                ExecutionAction::Start,
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        let all = store.list_executions("a", None).await.unwrap();
        assert_eq!(all.len(), 4);

        let last_two = store.list_executions("a", Some(2)).await.unwrap();
        let actions: Vec<_> = last_two.iter().map(|r| r.action).collect();
        assert_eq!(actions, vec![ExecutionAction::Resume, ExecutionAction::Stop]);
    }
}
