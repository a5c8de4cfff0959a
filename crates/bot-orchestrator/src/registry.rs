use crate::bot_actor::TickEngine;
use crate::bot_handle::BotHandle;
use crate::events::BotEvent;
use crate::status::{BotStatus, ConfigUpdate, ShutdownReport, TickOutcome};
use autotrade_core::{
    BotConfig, BotConfigPatch, BotExecutionRecord, BotLifecycleState, BotStore, EngineError,
    EngineSettings, ExchangeConnector, ExecutionAction, PerformanceMetrics,
};
use autotrade_strategy::{RiskGate, StrategyDeps, StrategyFactory};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

type BotMap = HashMap<String, BotHandle>;

/// Owns every bot's runtime entry and serializes lifecycle changes.
///
/// Each lifecycle method holds the registry lock for its whole duration, so a
/// start can never interleave with a stop of the same bot and a bot never has
/// more than one timer.
pub struct BotRegistry {
    bots: Mutex<BotMap>,
    engine: Arc<TickEngine>,
    factory: StrategyFactory,
}

impl BotRegistry {
    /// Creates a registry with the built-in strategies and a plain risk gate.
    #[must_use]
    pub fn new(
        exchange: Arc<dyn ExchangeConnector>,
        store: Arc<dyn BotStore>,
        settings: EngineSettings,
    ) -> Self {
        Self::with_components(
            exchange,
            store,
            settings,
            StrategyFactory::with_builtin(),
            RiskGate::new(),
        )
    }

    #[must_use]
    pub fn with_components(
        exchange: Arc<dyn ExchangeConnector>,
        store: Arc<dyn BotStore>,
        settings: EngineSettings,
        factory: StrategyFactory,
        risk_gate: RiskGate,
    ) -> Self {
        Self {
            bots: Mutex::new(HashMap::new()),
            engine: Arc::new(TickEngine::new(exchange, store, risk_gate, settings)),
            factory,
        }
    }

    /// Validates and persists a new or replaced bot definition without starting it.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` for an invalid config, or a storage error.
    pub async fn add_bot(&self, config: &BotConfig) -> Result<(), EngineError> {
        config.validate()?;
        self.engine.store.save_bot(config).await?;
        info!(bot_id = %config.id, strategy = %config.strategy.strategy_type, "Bot saved");
        Ok(())
    }

    /// Starts a stopped bot.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` when the bot is unknown, already has a
    /// runtime entry, is paused, or fails validation or strategy initialization.
    pub async fn start(&self, bot_id: &str) -> Result<(), EngineError> {
        let mut bots = self.bots.lock().await;
        self.start_locked(&mut bots, bot_id).await
    }

    /// Stops a running or paused bot, waiting for an in-flight tick first.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` when the bot is neither running nor paused.
    pub async fn stop(&self, bot_id: &str) -> Result<(), EngineError> {
        let mut bots = self.bots.lock().await;
        self.stop_locked(&mut bots, bot_id).await
    }

    /// Stops the timer of a running bot, keeping its strategy state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` when the bot is not running.
    pub async fn pause(&self, bot_id: &str) -> Result<(), EngineError> {
        let mut bots = self.bots.lock().await;
        let Some(handle) = bots.get_mut(bot_id).filter(|handle| handle.is_running()) else {
            return Err(EngineError::configuration(format!(
                "Bot {bot_id} is not running"
            )));
        };

        handle.stop_timer().await;
        self.engine
            .store
            .update_status(bot_id, BotLifecycleState::Paused, Utc::now())
            .await?;
        self.engine
            .record(BotExecutionRecord::success(
                bot_id,
                ExecutionAction::Pause,
                json!({}),
            ))
            .await;
        self.engine
            .emit(BotEvent::state_changed(bot_id, BotLifecycleState::Paused));
        info!(bot_id, "Bot paused");
        Ok(())
    }

    /// Restarts the timer of a paused bot.
    ///
    /// A paused bot whose runtime entry was evicted (config update while paused, or a
    /// process restart) is rebuilt from its stored config.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` when the bot is not paused or cannot be rebuilt.
    pub async fn resume(&self, bot_id: &str) -> Result<(), EngineError> {
        let mut bots = self.bots.lock().await;
        let now = Utc::now();

        match bots.get_mut(bot_id) {
            Some(handle) if handle.is_running() => {
                return Err(EngineError::configuration(format!(
                    "Bot {bot_id} is already running"
                )));
            }
            Some(handle) => handle.start_timer(self.engine.clone(), now),
            None => {
                let stored = self.engine.store.load_bot(bot_id).await?;
                let Some(stored) = stored.filter(|s| s.status == BotLifecycleState::Paused)
                else {
                    return Err(EngineError::configuration(format!(
                        "Bot {bot_id} is not paused"
                    )));
                };
                let mut handle = self.build_handle(stored.config).await?;
                handle.start_timer(self.engine.clone(), now);
                bots.insert(bot_id.to_string(), handle);
                info!(bot_id, "Rebuilt paused bot from stored config");
            }
        }

        self.engine
            .store
            .update_status(bot_id, BotLifecycleState::Running, now)
            .await?;
        self.engine
            .record(BotExecutionRecord::success(
                bot_id,
                ExecutionAction::Resume,
                json!({}),
            ))
            .await;
        self.engine
            .emit(BotEvent::state_changed(bot_id, BotLifecycleState::Running));
        info!(bot_id, "Bot resumed");
        Ok(())
    }

    /// Merges `patch` into the stored config and applies it.
    ///
    /// A running bot is stopped and started again without releasing the registry
    /// lock; the time it spent unregistered is returned. A paused bot loses its
    /// runtime entry so that `resume` rebuilds it from the new config.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` when the bot is unknown or the merged
    /// config is invalid. Nothing is persisted in that case.
    pub async fn update_config(
        &self,
        bot_id: &str,
        patch: BotConfigPatch,
    ) -> Result<ConfigUpdate, EngineError> {
        let mut bots = self.bots.lock().await;

        let stored = self
            .engine
            .store
            .load_bot(bot_id)
            .await?
            .ok_or_else(|| EngineError::configuration(format!("Bot {bot_id} not found")))?;
        let mut merged = stored.config;
        merged.apply_patch(patch);
        merged.validate()?;
        self.engine.store.save_bot(&merged).await?;

        let update = match bots.get(bot_id).map(BotHandle::is_running) {
            Some(true) => {
                let began = Instant::now();
                self.stop_locked(&mut bots, bot_id).await?;
                self.start_locked(&mut bots, bot_id).await?;
                let gap = began.elapsed();
                info!(bot_id, gap = ?gap, "Restarted bot with new config");
                ConfigUpdate {
                    restarted: true,
                    gap: Some(gap),
                }
            }
            Some(false) => {
                if let Some(handle) = bots.remove(bot_id) {
                    Self::cleanup(bot_id, &handle).await;
                }
                info!(bot_id, "Evicted paused bot; resume will use the new config");
                ConfigUpdate {
                    restarted: false,
                    gap: None,
                }
            }
            None => ConfigUpdate {
                restarted: false,
                gap: None,
            },
        };

        self.engine.emit(BotEvent::ConfigUpdated {
            bot_id: bot_id.to_string(),
            restarted: update.restarted,
            timestamp: Utc::now(),
        });
        Ok(update)
    }

    /// Stops every registered bot. Failures are collected, not propagated.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut bots = self.bots.lock().await;
        let mut ids: Vec<String> = bots.keys().cloned().collect();
        ids.sort();

        let mut report = ShutdownReport::default();
        for bot_id in ids {
            match self.stop_locked(&mut bots, &bot_id).await {
                Ok(()) => report.stopped.push(bot_id),
                Err(e) => {
                    warn!(bot_id = %bot_id, error = %e, "Bot failed to stop during shutdown");
                    report.failures.push((bot_id, e));
                }
            }
        }
        info!(
            stopped = report.stopped.len(),
            failed = report.failures.len(),
            "Registry shut down"
        );
        report
    }

    /// Starts every enabled bot the store still records as running.
    ///
    /// Returns the ids that were started; failures are logged.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the bot list cannot be read.
    pub async fn restore(&self) -> Result<Vec<String>, EngineError> {
        let stored = self.engine.store.list_bots().await?;
        let mut bots = self.bots.lock().await;
        let mut restored = Vec::new();

        for bot in stored
            .into_iter()
            .filter(|bot| bot.config.enabled && bot.status == BotLifecycleState::Running)
        {
            let bot_id = bot.config.id;
            match self.start_locked(&mut bots, &bot_id).await {
                Ok(()) => restored.push(bot_id),
                Err(e) => warn!(bot_id = %bot_id, error = %e, "Failed to restore bot"),
            }
        }
        Ok(restored)
    }

    /// Runs one tick for a running bot through the same guarded path as its timer.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` when the bot is not running.
    pub async fn trigger_tick(&self, bot_id: &str) -> Result<TickOutcome, EngineError> {
        let actor = {
            let bots = self.bots.lock().await;
            bots.get(bot_id)
                .filter(|handle| handle.is_running())
                .map(|handle| handle.actor(self.engine.clone()))
        };
        let actor = actor
            .ok_or_else(|| EngineError::configuration(format!("Bot {bot_id} is not running")))?;
        Ok(actor.tick().await)
    }

    /// # Errors
    ///
    /// Returns `EngineError::Configuration` for an unknown bot.
    pub async fn get_status(&self, bot_id: &str) -> Result<BotStatus, EngineError> {
        if let Some(handle) = self.bots.lock().await.get(bot_id) {
            return Ok(handle.status());
        }
        self.engine
            .store
            .load_bot(bot_id)
            .await?
            .map(|stored| BotStatus::from_stored(&stored))
            .ok_or_else(|| EngineError::configuration(format!("Bot {bot_id} not found")))
    }

    /// Metrics replayed from the bot's recorded trades.
    ///
    /// # Errors
    ///
    /// Returns a storage error when trades cannot be read.
    pub async fn get_performance(&self, bot_id: &str) -> Result<PerformanceMetrics, EngineError> {
        let trades = self.engine.store.list_trades(bot_id).await?;
        Ok(PerformanceMetrics::from_trades(&trades))
    }

    /// # Errors
    ///
    /// Returns a storage error when the execution log cannot be read.
    pub async fn get_executions(
        &self,
        bot_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<BotExecutionRecord>, EngineError> {
        Ok(self.engine.store.list_executions(bot_id, limit).await?)
    }

    /// Ids of bots with an active timer, sorted.
    pub async fn list_running(&self) -> Vec<String> {
        let bots = self.bots.lock().await;
        let mut running: Vec<String> = bots
            .iter()
            .filter(|(_, handle)| handle.is_running())
            .map(|(id, _)| id.clone())
            .collect();
        running.sort();
        running
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.engine.subscribe()
    }

    async fn start_locked(&self, bots: &mut BotMap, bot_id: &str) -> Result<(), EngineError> {
        let stored = self
            .engine
            .store
            .load_bot(bot_id)
            .await?
            .ok_or_else(|| EngineError::configuration(format!("Bot {bot_id} not found")))?;

        if let Some(handle) = bots.get(bot_id) {
            let message = if handle.is_running() {
                format!("Bot {bot_id} is already running")
            } else {
                format!("Bot {bot_id} is paused; use resume")
            };
            return Err(EngineError::configuration(message));
        }
        if stored.status == BotLifecycleState::Paused {
            return Err(EngineError::configuration(format!(
                "Bot {bot_id} is paused; use resume"
            )));
        }

        let mut handle = match self.build_handle(stored.config).await {
            Ok(handle) => handle,
            Err(e) => {
                self.engine
                    .record(BotExecutionRecord::failed(
                        bot_id,
                        ExecutionAction::Start,
                        json!({ "kind": e.kind() }),
                        e.to_string(),
                    ))
                    .await;
                return Err(e);
            }
        };

        let now = Utc::now();
        if let Err(e) = self
            .engine
            .store
            .update_status(bot_id, BotLifecycleState::Running, now)
            .await
        {
            Self::cleanup(bot_id, &handle).await;
            return Err(e.into());
        }
        handle.start_timer(self.engine.clone(), now);

        let details = json!({
            "strategy": handle.config().strategy.strategy_type,
            "symbol": handle.config().market.symbol,
            "cooldownSecs": handle.config().execution.cooldown_secs,
        });
        bots.insert(bot_id.to_string(), handle);

        self.engine
            .record(BotExecutionRecord::success(
                bot_id,
                ExecutionAction::Start,
                details,
            ))
            .await;
        self.engine
            .emit(BotEvent::state_changed(bot_id, BotLifecycleState::Running));
        info!(bot_id, "Bot started");
        Ok(())
    }

    async fn stop_locked(&self, bots: &mut BotMap, bot_id: &str) -> Result<(), EngineError> {
        match bots.remove(bot_id) {
            Some(mut handle) => {
                handle.stop_timer().await;
                Self::cleanup(bot_id, &handle).await;
            }
            None => {
                // A paused bot evicted from memory can still be stopped.
                let stored = self.engine.store.load_bot(bot_id).await?;
                if !stored.is_some_and(|s| s.status == BotLifecycleState::Paused) {
                    return Err(EngineError::configuration(format!(
                        "Bot {bot_id} is not running"
                    )));
                }
            }
        }

        self.engine
            .store
            .update_status(bot_id, BotLifecycleState::Stopped, Utc::now())
            .await?;
        self.engine
            .record(BotExecutionRecord::success(
                bot_id,
                ExecutionAction::Stop,
                json!({}),
            ))
            .await;
        self.engine
            .emit(BotEvent::state_changed(bot_id, BotLifecycleState::Stopped));
        info!(bot_id, "Bot stopped");
        Ok(())
    }

    /// Validates `config` and returns a handle around an initialized strategy.
    async fn build_handle(&self, config: BotConfig) -> Result<BotHandle, EngineError> {
        let kind = config.validate()?;
        let deps = StrategyDeps::new(
            self.engine.exchange.clone(),
            self.engine.order_router(&config),
            config.market.exchange_account_id.clone(),
            config.market.symbol.clone(),
        );
        let mut strategy = self.factory.create(kind, deps)?;
        strategy.initialize(&config.strategy).await.map_err(|e| {
            EngineError::configuration(format!("Strategy initialization failed: {e}"))
        })?;
        Ok(BotHandle::new(config, strategy))
    }

    async fn cleanup(bot_id: &str, handle: &BotHandle) {
        if let Err(e) = handle.cleanup().await {
            warn!(bot_id, error = %e, "Strategy cleanup failed");
        }
    }
}
