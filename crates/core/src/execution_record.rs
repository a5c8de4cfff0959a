//! Append-only audit log of lifecycle transitions and trade attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionAction {
    Start,
    Stop,
    Pause,
    Resume,
    Trade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Pending,
}

impl ExecutionAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Pause => "PAUSE",
            Self::Resume => "RESUME",
            Self::Trade => "TRADE",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        [Self::Start, Self::Stop, Self::Pause, Self::Resume, Self::Trade]
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(value))
    }
}

impl ExecutionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Pending => "PENDING",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        [Self::Success, Self::Failed, Self::Pending]
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for ExecutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotExecutionRecord {
    pub id: String,
    pub bot_id: String,
    pub action: ExecutionAction,
    pub status: ExecutionStatus,
    pub details: serde_json::Value,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BotExecutionRecord {
    #[must_use]
    pub fn success(bot_id: &str, action: ExecutionAction, details: serde_json::Value) -> Self {
        Self::new(bot_id, action, ExecutionStatus::Success, details, None)
    }

    #[must_use]
    pub fn failed(
        bot_id: &str,
        action: ExecutionAction,
        details: serde_json::Value,
        error: impl Into<String>,
    ) -> Self {
        Self::new(
            bot_id,
            action,
            ExecutionStatus::Failed,
            details,
            Some(error.into()),
        )
    }

    fn new(
        bot_id: &str,
        action: ExecutionAction,
        status: ExecutionStatus,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            bot_id: bot_id.to_string(),
            action,
            status,
            details,
            error,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_status_and_error() {
        let ok = BotExecutionRecord::success("b", ExecutionAction::Start, serde_json::json!({}));
        assert_eq!(ok.status, ExecutionStatus::Success);
        assert!(ok.error.is_none());

        let failed = BotExecutionRecord::failed(
            "b",
            ExecutionAction::Trade,
            serde_json::Value::Null,
            "boom",
        );
        assert_eq!(failed.status, ExecutionStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_ne!(ok.id, failed.id);
    }

    #[test]
    fn labels_parse_back() {
        assert_eq!(ExecutionAction::parse("resume"), Some(ExecutionAction::Resume));
        assert_eq!(ExecutionStatus::parse("FAILED"), Some(ExecutionStatus::Failed));
        assert_eq!(ExecutionAction::parse("bogus"), None);
    }
}
