pub mod bots;
pub mod run;
pub mod strategies;

pub use bots::{
    run_add_bot, run_executions, run_list_bots, run_performance, AddBotArgs, ExecutionsArgs,
    PerformanceArgs,
};
pub use run::{run_engine, RunArgs};
pub use strategies::{run_strategies, run_validate, StrategiesArgs, ValidateArgs};

use anyhow::{Context, Result};
use autotrade_bot_orchestrator::SqliteBotStore;
use autotrade_core::{AppConfig, BotConfig};

/// Opens the configured bot database.
pub(crate) async fn open_store(config: &AppConfig) -> Result<SqliteBotStore> {
    let db = &config.database;
    tracing::debug!("Opening bot database at {}", db.url);

    if let Some(file_path) = db.url.strip_prefix("sqlite://") {
        if let Some(parent) = std::path::Path::new(file_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }
    }

    SqliteBotStore::connect(&db.url, db.max_connections).await
}

/// Reads a bot definition from a JSON file.
pub(crate) fn read_bot_config(path: &str) -> Result<BotConfig> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid bot definition in {path}"))
}
