//! Bot definition and history commands. These work on the database directly and
//! do not need a running engine.

use anyhow::{anyhow, Result};
use autotrade_core::{AppConfig, BotStore, MetricsFormatter, PerformanceMetrics};
use autotrade_strategy::validate_descriptor;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct AddBotArgs {
    /// Bot definition JSON file
    #[arg(short, long)]
    pub file: String,
}

#[derive(Args, Debug, Clone)]
pub struct ExecutionsArgs {
    /// Bot id
    #[arg(short, long)]
    pub bot: String,

    /// Only show the most recent entries
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct PerformanceArgs {
    /// Bot id
    #[arg(short, long)]
    pub bot: String,
}

/// # Errors
/// Returns an error if the definition is invalid or cannot be stored.
pub async fn run_add_bot(config: &AppConfig, args: AddBotArgs) -> Result<()> {
    let bot = super::read_bot_config(&args.file)?;
    bot.validate()?;
    validate_descriptor(&bot.strategy)?;

    let store = super::open_store(config).await?;
    store.save_bot(&bot).await?;
    tracing::info!("Stored bot {} ({})", bot.id, bot.strategy.strategy_type);
    println!("✓ Bot {} saved", bot.id);
    Ok(())
}

/// # Errors
/// Returns an error if the database cannot be read.
pub async fn run_list_bots(config: &AppConfig) -> Result<()> {
    let store = super::open_store(config).await?;
    let bots = store.list_bots().await?;
    if bots.is_empty() {
        println!("No bots stored");
        return Ok(());
    }

    println!(
        "{:<20} {:<16} {:<12} {:<8} STARTED",
        "ID", "STRATEGY", "SYMBOL", "STATE"
    );
    for bot in bots {
        let started = bot
            .started_at
            .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M:%S").to_string());
        println!(
            "{:<20} {:<16} {:<12} {:<8} {}",
            bot.config.id,
            bot.config.strategy.strategy_type,
            bot.config.market.symbol,
            bot.status.as_str(),
            started
        );
    }
    Ok(())
}

/// # Errors
/// Returns an error if the bot is unknown or the database cannot be read.
pub async fn run_executions(config: &AppConfig, args: ExecutionsArgs) -> Result<()> {
    let store = super::open_store(config).await?;
    if store.load_bot(&args.bot).await?.is_none() {
        return Err(anyhow!("Bot {} not found", args.bot));
    }

    for record in store.list_executions(&args.bot, args.limit).await? {
        let error = record.error.as_deref().unwrap_or("");
        println!(
            "{} {:<6} {:<7} {} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.action.as_str(),
            record.status.as_str(),
            record.details,
            error
        );
    }
    Ok(())
}

/// # Errors
/// Returns an error if the bot is unknown or the database cannot be read.
pub async fn run_performance(config: &AppConfig, args: PerformanceArgs) -> Result<()> {
    let store = super::open_store(config).await?;
    if store.load_bot(&args.bot).await?.is_none() {
        return Err(anyhow!("Bot {} not found", args.bot));
    }

    let trades = store.list_trades(&args.bot).await?;
    let metrics = PerformanceMetrics::from_trades(&trades);
    println!("{}", MetricsFormatter::format(&args.bot, &metrics));
    Ok(())
}
