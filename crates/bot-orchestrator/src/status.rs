use autotrade_core::{BotLifecycleState, EngineError, OrderResult, StoredBot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Point-in-time view of one bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotStatus {
    pub bot_id: String,
    pub state: BotLifecycleState,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Ticks that ran to completion since the bot was registered.
    pub ticks: u64,
    pub last_signal: Option<String>,
    pub last_error: Option<String>,
}

impl BotStatus {
    #[must_use]
    pub fn new(bot_id: &str, state: BotLifecycleState) -> Self {
        Self {
            bot_id: bot_id.to_string(),
            state,
            started_at: None,
            stopped_at: None,
            last_tick_at: None,
            ticks: 0,
            last_signal: None,
            last_error: None,
        }
    }

    /// Status of a bot with no runtime entry.
    #[must_use]
    pub fn from_stored(stored: &StoredBot) -> Self {
        Self {
            started_at: stored.started_at,
            stopped_at: stored.stopped_at,
            ..Self::new(&stored.config.id, stored.status)
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Another tick for the same bot was still in flight.
    Skipped,
    Hold(String),
    Executed(OrderResult),
    /// The signal never reached the exchange (context, strategy or risk failure).
    Rejected(String),
    /// The exchange refused the order after all retries.
    Failed(String),
}

impl TickOutcome {
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Result of `BotRegistry::update_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigUpdate {
    /// The bot was running and has been restarted with the new config.
    pub restarted: bool,
    /// Time the bot spent without a runtime entry during the restart.
    pub gap: Option<Duration>,
}

/// Result of `BotRegistry::shutdown`.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub stopped: Vec<String>,
    pub failures: Vec<(String, EngineError)>,
}

impl ShutdownReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
