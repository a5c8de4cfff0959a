//! Engine error taxonomy.
//!
//! Lifecycle operations surface these to the caller. Inside a tick they are
//! logged and recorded as failed executions instead.

use thiserror::Error;

/// Errors produced by the bot engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad or missing bot/strategy configuration, or an invalid lifecycle transition.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Strategy parameter or precondition violation.
    #[error("Strategy error: {0}")]
    Strategy(String),

    /// Position sizing produced a non-positive or out-of-policy amount.
    #[error("Risk limit error: {0}")]
    RiskLimit(String),

    /// Exchange call failed after exhausting retries.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Persistence collaborator failure.
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn strategy(message: impl Into<String>) -> Self {
        Self::Strategy(message.into())
    }

    pub fn risk_limit(message: impl Into<String>) -> Self {
        Self::RiskLimit(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Short machine-readable label, used in execution records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Strategy(_) => "strategy",
            Self::RiskLimit(_) => "risk_limit",
            Self::Execution(_) => "execution",
            Self::Storage(_) => "storage",
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
