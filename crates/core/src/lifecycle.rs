use crate::bot_config::BotConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `Stopped -> Running -> Paused -> Running -> Stopped`. Only `Running` has a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BotLifecycleState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl BotLifecycleState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        [Self::Stopped, Self::Running, Self::Paused]
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for BotLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bot as the persistence collaborator knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBot {
    pub config: BotConfig,
    pub status: BotLifecycleState,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl StoredBot {
    #[must_use]
    pub const fn new(config: BotConfig) -> Self {
        Self {
            config,
            status: BotLifecycleState::Stopped,
            started_at: None,
            stopped_at: None,
        }
    }
}
