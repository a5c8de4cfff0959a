//! Engine daemon: restores bots left running, starts requested ones, and stops
//! everything on Ctrl-C.

use anyhow::{anyhow, Result};
use autotrade_bot_orchestrator::{BotEvent, BotRegistry};
use autotrade_core::{split_symbol, AppConfig, BotStore, KellyRiskAnalytics};
use autotrade_execution::PaperExchange;
use autotrade_strategy::{RiskGate, StrategyFactory};
use clap::Args;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Bot ids to start in addition to those restored from the database
    #[arg(long = "start")]
    pub start: Vec<String>,

    /// Seed a paper price, e.g. --price BTC/USDT=50000
    #[arg(long = "price", value_parser = parse_price)]
    pub prices: Vec<(String, Decimal)>,
}

fn parse_price(raw: &str) -> Result<(String, Decimal)> {
    let (symbol, price) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected SYMBOL=PRICE, got {raw}"))?;
    let price = Decimal::from_str(price.trim())?;
    if price <= Decimal::ZERO {
        return Err(anyhow!("Price for {symbol} must be positive"));
    }
    Ok((symbol.trim().to_string(), price))
}

/// # Errors
/// Returns an error if the database cannot be opened or Ctrl-C cannot be awaited.
pub async fn run_engine(config: &AppConfig, args: RunArgs) -> Result<()> {
    tracing::info!("Starting engine with database {}", config.database.url);

    let store = Arc::new(super::open_store(config).await?);
    let exchange = Arc::new(PaperExchange::new(config.paper.fee_rate));

    for bot in store.list_bots().await? {
        let market = &bot.config.market;
        if let Some((base, quote)) = split_symbol(&market.symbol) {
            exchange.set_balance(&market.exchange_account_id, &quote, config.paper.quote_balance);
            exchange.set_balance(&market.exchange_account_id, &base, config.paper.base_balance);
        }
    }
    for (symbol, price) in &args.prices {
        exchange.set_price(symbol, *price);
    }

    // Bots opt into Kelly sizing with `advanced_sizing`; others use the plain gate rules.
    let registry = BotRegistry::with_components(
        exchange,
        store,
        config.engine.clone(),
        StrategyFactory::with_builtin(),
        RiskGate::with_analytics(Arc::new(KellyRiskAnalytics::default())),
    );

    let restored = registry.restore().await?;
    if restored.is_empty() {
        tracing::info!("No bots to restore from database");
    } else {
        tracing::info!("Restored {} bot(s): {:?}", restored.len(), restored);
    }
    for bot_id in &args.start {
        if let Err(e) = registry.start(bot_id).await {
            tracing::error!("Failed to start bot {}: {}", bot_id, e);
        }
    }

    let events = registry.subscribe();
    let event_log = tokio::spawn(log_events(events));

    tracing::info!(
        "Engine running with {} bot(s); press Ctrl-C to stop",
        registry.list_running().await.len()
    );
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    let report = registry.shutdown().await;
    for (bot_id, e) in &report.failures {
        tracing::error!("Bot {} did not stop cleanly: {}", bot_id, e);
    }
    event_log.abort();
    Ok(())
}

/// Logs bot events until the registry goes away. Returns how many were logged.
async fn log_events(mut events: broadcast::Receiver<BotEvent>) -> usize {
    let mut logged = 0;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!("Event log fell behind, skipped {} event(s)", missed);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match &event {
            BotEvent::OrderPlaced { bot_id, order } => tracing::info!(
                "Bot {} order {} {} {} @ {:?}",
                bot_id,
                order.order_id,
                order.side,
                order.filled_amount,
                order.average_price
            ),
            BotEvent::TickFailed { bot_id, message, .. } => {
                tracing::warn!("Bot {} tick failed: {}", bot_id, message);
            }
            other => tracing::debug!("{:?}", other),
        }
        logged += 1;
    }
    logged
}
