use crate::bot_actor::{BotActor, SharedStrategy, TickEngine, TickTimer};
use crate::status::BotStatus;
use autotrade_core::{BotConfig, BotLifecycleState, EngineError};
use autotrade_strategy::Strategy;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Runtime entry for a bot that is running, or paused with its strategy in memory.
///
/// The timer is `Some` exactly while the bot is running.
pub struct BotHandle {
    config: Arc<BotConfig>,
    strategy: SharedStrategy,
    tick_guard: Arc<Mutex<()>>,
    timer: Option<TickTimer>,
    status: Arc<watch::Sender<BotStatus>>,
}

impl BotHandle {
    /// Wraps an initialized strategy. The bot starts out without a timer.
    #[must_use]
    pub fn new(config: BotConfig, strategy: Box<dyn Strategy>) -> Self {
        let (status, _) = watch::channel(BotStatus::new(&config.id, BotLifecycleState::Paused));
        Self {
            config: Arc::new(config),
            strategy: Arc::new(Mutex::new(strategy)),
            tick_guard: Arc::new(Mutex::new(())),
            timer: None,
            status: Arc::new(status),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    #[must_use]
    pub const fn state(&self) -> BotLifecycleState {
        if self.is_running() {
            BotLifecycleState::Running
        } else {
            BotLifecycleState::Paused
        }
    }

    #[must_use]
    pub fn status(&self) -> BotStatus {
        let mut status = self.status.borrow().clone();
        status.state = self.state();
        status
    }

    /// Receiver that observes every status change, tick counters included.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<BotStatus> {
        self.status.subscribe()
    }

    pub(crate) fn actor(&self, engine: Arc<TickEngine>) -> BotActor {
        BotActor::new(
            engine,
            self.config.clone(),
            self.strategy.clone(),
            self.tick_guard.clone(),
            self.status.clone(),
        )
    }

    /// Spawns the tick worker. No-op when one is already running.
    pub(crate) fn start_timer(&mut self, engine: Arc<TickEngine>, at: DateTime<Utc>) {
        if self.timer.is_none() {
            self.timer = Some(self.actor(engine).spawn());
        }
        self.status.send_modify(|status| {
            status.state = BotLifecycleState::Running;
            status.started_at = Some(at);
        });
    }

    /// Stops the tick worker and waits for any in-flight tick, timer-driven or
    /// operator-triggered, to finish.
    pub(crate) async fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop().await;
        }
        self.status
            .send_modify(|status| status.state = BotLifecycleState::Paused);
        let _drained = self.tick_guard.lock().await;
    }

    pub(crate) async fn cleanup(&self) -> Result<(), EngineError> {
        self.strategy.lock().await.cleanup().await
    }
}
