//! Per-bot tick worker.
//!
//! A running bot owns one worker task driven by a `tokio::time::interval` at the
//! bot's cooldown. Timer ticks and operator-triggered ticks share the same path and
//! the same per-bot guard, so at most one tick per bot is ever in flight.

use crate::events::BotEvent;
use crate::status::{BotStatus, TickOutcome};
use autotrade_core::{
    BotConfig, BotContext, BotExecutionRecord, BotLifecycleState, BotStore, EngineError,
    EngineSettings, ExchangeConnector, ExecutionAction, OrderRequest, OrderSide, OrderType,
    PositionTracker, Signal, TradeSignal,
};
use autotrade_execution::{ExecutionPipeline, MarketDataCache};
use autotrade_strategy::{OrderRouter, RiskGate, Strategy};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub type SharedStrategy = Arc<Mutex<Box<dyn Strategy>>>;

/// Collaborators shared by every bot's ticks.
pub struct TickEngine {
    pub(crate) exchange: Arc<dyn ExchangeConnector>,
    pub(crate) store: Arc<dyn BotStore>,
    cache: MarketDataCache,
    pipeline: Arc<ExecutionPipeline>,
    risk_gate: RiskGate,
    events: broadcast::Sender<BotEvent>,
    settings: EngineSettings,
}

impl TickEngine {
    #[must_use]
    pub fn new(
        exchange: Arc<dyn ExchangeConnector>,
        store: Arc<dyn BotStore>,
        risk_gate: RiskGate,
        settings: EngineSettings,
    ) -> Self {
        let cache = MarketDataCache::new(exchange.clone(), settings.market_data_ttl());
        let pipeline = Arc::new(ExecutionPipeline::new(
            exchange.clone(),
            store.clone(),
            settings.retry_base_delay(),
        ));
        let (events, _) = broadcast::channel(settings.event_buffer.max(1));
        Self {
            exchange,
            store,
            cache,
            pipeline,
            risk_gate,
            events,
            settings,
        }
    }

    /// Router for orders the bot's strategy submits itself.
    pub(crate) fn order_router(&self, config: &BotConfig) -> Arc<OrderRouter> {
        Arc::new(OrderRouter::new(self.pipeline.clone(), config))
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.events.subscribe()
    }

    /// Broadcasts `event`. Having no subscribers is not an error.
    pub(crate) fn emit(&self, event: BotEvent) {
        let _ = self.events.send(event);
    }

    /// Appends an execution record, logging instead of failing.
    pub(crate) async fn record(&self, record: BotExecutionRecord) {
        if let Err(e) = self.store.append_execution(&record).await {
            error!(
                bot_id = %record.bot_id,
                action = %record.action,
                error = %e,
                "Failed to append execution record"
            );
        }
    }
}

/// Everything one bot's ticks need. Cheap to clone.
#[derive(Clone)]
pub struct BotActor {
    engine: Arc<TickEngine>,
    config: Arc<BotConfig>,
    strategy: SharedStrategy,
    tick_guard: Arc<Mutex<()>>,
    status: Arc<watch::Sender<BotStatus>>,
}

/// Handle on a spawned worker. `stop` waits for any in-flight tick.
pub struct TickTimer {
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl TickTimer {
    pub async fn stop(self) {
        // The worker may already have exited; the send then has no receiver.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "Tick worker ended abnormally");
        }
    }
}

impl BotActor {
    pub(crate) fn new(
        engine: Arc<TickEngine>,
        config: Arc<BotConfig>,
        strategy: SharedStrategy,
        tick_guard: Arc<Mutex<()>>,
        status: Arc<watch::Sender<BotStatus>>,
    ) -> Self {
        Self {
            engine,
            config,
            strategy,
            tick_guard,
            status,
        }
    }

    /// Starts the worker task. The first tick fires one cooldown after the call.
    #[must_use]
    pub fn spawn(self) -> TickTimer {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(self.run(shutdown_rx));
        TickTimer { shutdown, worker }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.execution.cooldown();
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            bot_id = %self.config.id,
            cooldown_secs = self.config.execution.cooldown_secs,
            "Tick worker started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let outcome = self.tick().await;
                    debug!(bot_id = %self.config.id, ?outcome, "Timer tick finished");
                }
            }
        }

        info!(bot_id = %self.config.id, "Tick worker stopped");
    }

    /// Runs one tick unless another is in flight for this bot.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            debug!(bot_id = %self.config.id, "Tick already in flight, skipping");
            return TickOutcome::Skipped;
        };
        // A tick that waited out a stop must not trade on the stopped bot.
        if self.status.borrow().state != BotLifecycleState::Running {
            debug!(bot_id = %self.config.id, "Bot no longer running, skipping tick");
            return TickOutcome::Skipped;
        }

        let outcome = self.execute_iteration().await;
        self.status.send_modify(|status| {
            status.ticks += 1;
            status.last_tick_at = Some(Utc::now());
            match &outcome {
                TickOutcome::Hold(_) => status.last_signal = Some("HOLD".to_string()),
                TickOutcome::Executed(order) => status.last_signal = Some(order.side.to_string()),
                TickOutcome::Rejected(message) | TickOutcome::Failed(message) => {
                    status.last_error = Some(message.clone());
                }
                TickOutcome::Skipped => {}
            }
        });
        outcome
    }

    async fn execute_iteration(&self) -> TickOutcome {
        let bot_id = self.config.id.as_str();

        let ctx = match self.build_context().await {
            Ok(ctx) => ctx,
            Err(e) => return self.reject("context", None, &e).await,
        };

        let signal = match self.strategy.lock().await.execute(&ctx).await {
            Ok(signal) => signal,
            Err(e) => return self.reject("strategy", None, &e).await,
        };

        let Some((side, trade)) = signal.trade() else {
            debug!(bot_id, reason = signal.reason(), "Strategy held");
            return TickOutcome::Hold(signal.reason().to_string());
        };

        info!(
            bot_id,
            signal = signal.label(),
            strength = trade.strength,
            reason = %trade.reason,
            "Signal generated"
        );
        self.engine.emit(BotEvent::SignalGenerated {
            bot_id: bot_id.to_string(),
            signal: signal.label().to_string(),
            reason: trade.reason.clone(),
            timestamp: Utc::now(),
        });

        let amount = match self.engine.risk_gate.size_order(side, trade, &ctx) {
            Ok(amount) => amount,
            Err(e) => {
                self.strategy.lock().await.on_order_rejected(&e.to_string()).await;
                return self.reject("risk", Some(&signal), &e).await;
            }
        };

        let request = self.order_request(side, trade, amount, ctx.current_price);
        let policy = &self.config.execution;
        match self
            .engine
            .pipeline
            .execute(
                bot_id,
                &self.config.market.exchange_account_id,
                policy.retry_attempts,
                &signal,
                &request,
            )
            .await
        {
            Ok(order) => {
                self.strategy.lock().await.on_order_result(&order).await;
                self.engine.emit(BotEvent::OrderPlaced {
                    bot_id: bot_id.to_string(),
                    order: order.clone(),
                });
                TickOutcome::Executed(order)
            }
            Err(e) => {
                let message = e.to_string();
                self.strategy.lock().await.on_order_rejected(&message).await;
                self.engine.emit(BotEvent::TickFailed {
                    bot_id: bot_id.to_string(),
                    message: message.clone(),
                    timestamp: Utc::now(),
                });
                TickOutcome::Failed(message)
            }
        }
    }

    async fn build_context(&self) -> Result<BotContext, EngineError> {
        let bot_id = self.config.id.as_str();
        let account = self.config.market.exchange_account_id.as_str();
        let symbol = self.config.market.symbol.as_str();
        let settings = &self.engine.settings;
        let exchange = &self.engine.exchange;

        let candles = self
            .engine
            .cache
            .get_candles(account, symbol, &settings.candle_interval, settings.candle_limit)
            .await;

        let balances = exchange
            .get_balances(account)
            .await
            .map_err(|e| EngineError::execution(format!("Failed to fetch balances: {e:#}")))?;
        let ticker = exchange
            .get_ticker(account, symbol)
            .await
            .map_err(|e| EngineError::execution(format!("Failed to fetch ticker: {e:#}")))?;
        let open_orders = exchange
            .get_open_orders(account, symbol)
            .await
            .map_err(|e| EngineError::execution(format!("Failed to fetch open orders: {e:#}")))?;

        let trades = self.engine.store.list_trades(bot_id).await?;
        let positions = PositionTracker::from_trades(&trades).open_positions();
        let skip = trades.len().saturating_sub(settings.trade_history_limit);
        let recent_trades = trades.into_iter().skip(skip).collect();

        let current_price = if ticker.last > Decimal::ZERO {
            ticker.last
        } else {
            candles.last().map_or(Decimal::ZERO, |candle| candle.close)
        };

        Ok(BotContext {
            config: (*self.config).clone(),
            candles,
            current_price,
            balances,
            positions,
            open_orders,
            recent_trades,
            timestamp: Utc::now(),
        })
    }

    fn order_request(
        &self,
        side: OrderSide,
        trade: &TradeSignal,
        amount: Decimal,
        current_price: Decimal,
    ) -> OrderRequest {
        let symbol = self.config.market.symbol.clone();
        let policy = &self.config.execution;
        match policy.order_type {
            OrderType::Market => OrderRequest::market(symbol, side, amount),
            OrderType::Limit => {
                let price = trade.price.unwrap_or(current_price);
                let mut request = OrderRequest::limit(symbol, side, amount, price);
                request.time_in_force = policy.time_in_force;
                request
            }
        }
    }

    /// Records a tick that ended before anything reached the exchange.
    async fn reject(&self, stage: &str, signal: Option<&Signal>, e: &EngineError) -> TickOutcome {
        let bot_id = self.config.id.as_str();
        let message = e.to_string();
        match e {
            EngineError::RiskLimit(_) => warn!(bot_id, stage, error = %message, "Tick rejected"),
            _ => error!(bot_id, stage, error = %message, "Tick failed"),
        }

        let details = json!({
            "stage": stage,
            "kind": e.kind(),
            "signal": signal.map(Signal::label),
            "reason": signal.map(Signal::reason),
        });
        self.engine
            .record(BotExecutionRecord::failed(
                bot_id,
                ExecutionAction::Trade,
                details,
                message.clone(),
            ))
            .await;
        self.engine.emit(BotEvent::TickFailed {
            bot_id: bot_id.to_string(),
            message: message.clone(),
            timestamp: Utc::now(),
        });
        TickOutcome::Rejected(message)
    }
}
