use autotrade_core::{BotLifecycleState, OrderResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notifications broadcast by the registry to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BotEvent {
    /// Lifecycle transition completed
    StateChanged {
        bot_id: String,
        state: BotLifecycleState,
        timestamp: DateTime<Utc>,
    },

    /// Configuration replaced; `restarted` when a running bot was cycled
    ConfigUpdated {
        bot_id: String,
        restarted: bool,
        timestamp: DateTime<Utc>,
    },

    /// Strategy produced a BUY or SELL
    SignalGenerated {
        bot_id: String,
        signal: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Order accepted by the exchange
    OrderPlaced { bot_id: String, order: OrderResult },

    /// Tick ended with a recorded failure
    TickFailed {
        bot_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl BotEvent {
    #[must_use]
    pub fn bot_id(&self) -> &str {
        match self {
            Self::StateChanged { bot_id, .. }
            | Self::ConfigUpdated { bot_id, .. }
            | Self::SignalGenerated { bot_id, .. }
            | Self::OrderPlaced { bot_id, .. }
            | Self::TickFailed { bot_id, .. } => bot_id,
        }
    }

    pub(crate) fn state_changed(bot_id: &str, state: BotLifecycleState) -> Self {
        Self::StateChanged {
            bot_id: bot_id.to_string(),
            state,
            timestamp: Utc::now(),
        }
    }
}
