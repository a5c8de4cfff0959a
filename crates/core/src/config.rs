use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub engine: EngineSettings,
    pub paper: PaperSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite::memory:` keeps everything in-process.
    pub url: String,
    pub max_connections: u32,
}

/// Tunables shared by every bot the engine runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub candle_interval: String,
    pub candle_limit: usize,
    pub market_data_ttl_secs: u64,
    pub retry_base_delay_ms: u64,
    pub trade_history_limit: usize,
    pub event_buffer: usize,
}

/// Seed state for the in-memory paper exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperSettings {
    pub fee_rate: rust_decimal::Decimal,
    pub quote_balance: rust_decimal::Decimal,
    pub base_balance: rust_decimal::Decimal,
}

impl EngineSettings {
    #[must_use]
    pub const fn market_data_ttl(&self) -> Duration {
        Duration::from_secs(self.market_data_ttl_secs)
    }

    #[must_use]
    pub const fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://autotrade.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            candle_interval: "1h".to_string(),
            candle_limit: 100,
            market_data_ttl_secs: 60,
            retry_base_delay_ms: 1000,
            trade_history_limit: 50,
            event_buffer: 1000,
        }
    }
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            fee_rate: rust_decimal::Decimal::new(1, 3),
            quote_balance: rust_decimal::Decimal::from(10_000),
            base_balance: rust_decimal::Decimal::ZERO,
        }
    }
}
