//! Cross-exchange arbitrage.
//!
//! A scan worker owned by the strategy wakes every `scanIntervalSecs`, prices
//! every account pair, and executes the best spread as a market buy on one
//! account and a market sell on another. Each bot tick polls the resulting
//! positions until both legs leave the open-order book or time out. Legs go
//! through the bot's order router, so `execute` always yields `Hold`.

use crate::helpers::{interval_elapsed, parse_params};
use crate::traits::{Strategy, StrategyDeps};
use async_trait::async_trait;
use autotrade_core::position_sizing::round_down;
use autotrade_core::{
    split_symbol, BotContext, EngineError, ExchangeConnector, OrderRequest, OrderSide, Signal,
    StrategyDescriptor, StrategyKind, Ticker,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How long FILLED, CANCELLED and FAILED positions stay visible.
const TERMINAL_RETENTION_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageParams {
    /// Exchange account ids to scan.
    pub exchanges: Vec<String>,
    /// Minimum net spread, in percent.
    pub min_profit: f64,
    /// Maximum own-book bid/ask spread, in percent, for an account to be tradable.
    pub max_slippage: f64,
    /// Base-asset amount per opportunity.
    pub order_amount: Decimal,
    /// Taker fee per leg as a fraction.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_position_timeout_secs")]
    pub position_timeout_secs: u64,
}

const fn default_fee_rate() -> f64 {
    0.001
}

const fn default_scan_interval_secs() -> u64 {
    5
}

const fn default_position_timeout_secs() -> u64 {
    300
}

impl ArbitrageParams {
    pub(crate) fn from_descriptor(config: &StrategyDescriptor) -> Result<Self, EngineError> {
        let params: Self = parse_params(StrategyKind::Arbitrage, config)?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.exchanges.len() < 2 {
            return Err(EngineError::strategy(
                "Arbitrage requires at least 2 exchanges",
            ));
        }
        if self.min_profit <= 0.0 {
            return Err(EngineError::strategy("Arbitrage minProfit must be positive"));
        }
        if self.max_slippage <= 0.0 {
            return Err(EngineError::strategy(
                "Arbitrage maxSlippage must be positive",
            ));
        }
        if self.order_amount <= Decimal::ZERO {
            return Err(EngineError::strategy(
                "Arbitrage orderAmount must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(EngineError::strategy("Arbitrage feeRate must be in [0, 1)"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArbitrageState {
    Pending,
    PartiallyFilled,
    Filled,
    Failed,
    Cancelled,
}

impl ArbitrageState {
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::PartiallyFilled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitragePosition {
    pub id: String,
    pub buy_exchange: String,
    pub sell_exchange: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub buy_order_id: Option<String>,
    pub sell_order_id: Option<String>,
    pub amount: Decimal,
    pub state: ArbitrageState,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A priced opportunity between two accounts.
#[derive(Debug, Clone, PartialEq)]
pub struct Opportunity {
    pub buy_exchange: String,
    pub sell_exchange: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// Spread after fees, in percent.
    pub net_spread_pct: Decimal,
    pub volume: Decimal,
    pub net_profit: Decimal,
}

#[derive(Debug, Default)]
struct Book {
    positions: Vec<ArbitragePosition>,
    last_scan: Option<String>,
}

/// Scan and position logic shared by the strategy and its scan worker.
#[derive(Clone)]
struct Desk {
    deps: StrategyDeps,
    params: ArbitrageParams,
    book: Arc<Mutex<Book>>,
}

impl Desk {
    fn quote_asset(&self) -> String {
        split_symbol(&self.deps.symbol).map_or_else(String::new, |(_, quote)| quote)
    }

    /// Evaluates every ordered account pair and returns the most profitable opportunity.
    async fn find_opportunity(&self) -> Option<Opportunity> {
        let params = &self.params;
        let exchange = &self.deps.exchange;
        let symbol = &self.deps.symbol;
        let max_book_spread = Decimal::try_from(params.max_slippage).unwrap_or(Decimal::ZERO);

        let mut tickers: HashMap<&str, Ticker> = HashMap::new();
        for account in &params.exchanges {
            match exchange.get_ticker(account, symbol).await {
                Ok(ticker) if ticker.bid > Decimal::ZERO && ticker.ask > Decimal::ZERO => {
                    let book_spread = (ticker.ask - ticker.bid) / ticker.bid * Decimal::ONE_HUNDRED;
                    if book_spread > max_book_spread {
                        warn!(account = %account, spread = %book_spread, "Book too wide, skipping account");
                        continue;
                    }
                    tickers.insert(account.as_str(), ticker);
                }
                Ok(_) => warn!(account = %account, "Ticker has no usable quotes"),
                Err(e) => warn!(account = %account, error = %e, "Ticker fetch failed"),
            }
        }

        let fee_pct = Decimal::try_from(params.fee_rate).unwrap_or(Decimal::ZERO) * Decimal::ONE_HUNDRED;
        let min_profit = Decimal::try_from(params.min_profit).unwrap_or(Decimal::MAX);
        let max_order = params.order_amount.min(self.deps.orders.max_order_size());
        let quote = self.quote_asset();
        let mut best: Option<Opportunity> = None;

        for buy_account in &params.exchanges {
            let Some(buy) = tickers.get(buy_account.as_str()) else { continue };
            for sell_account in &params.exchanges {
                if sell_account == buy_account {
                    continue;
                }
                let Some(sell) = tickers.get(sell_account.as_str()) else { continue };

                let spread_pct = (sell.bid - buy.ask) / buy.ask * Decimal::ONE_HUNDRED;
                let net_spread_pct = spread_pct - fee_pct * Decimal::TWO;
                if net_spread_pct <= min_profit {
                    continue;
                }

                let available = match exchange.get_balances(buy_account).await {
                    Ok(balances) => balances.get(&quote).copied().unwrap_or(Decimal::ZERO),
                    Err(e) => {
                        warn!(account = %buy_account, error = %e, "Balance fetch failed");
                        continue;
                    }
                };
                let volume = round_down(max_order.min(available / buy.ask));
                if volume <= Decimal::ZERO {
                    continue;
                }
                let net_profit = volume * buy.ask * net_spread_pct / Decimal::ONE_HUNDRED;
                if net_profit <= Decimal::ZERO {
                    continue;
                }

                let candidate = Opportunity {
                    buy_exchange: buy_account.clone(),
                    sell_exchange: sell_account.clone(),
                    buy_price: buy.ask,
                    sell_price: sell.bid,
                    net_spread_pct,
                    volume,
                    net_profit,
                };
                if best.as_ref().map_or(true, |b| candidate.net_profit > b.net_profit) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    async fn open_position(&self, opportunity: Opportunity, now: DateTime<Utc>) -> String {
        let orders = &self.deps.orders;
        let symbol = &self.deps.symbol;
        let mut position = ArbitragePosition {
            id: uuid::Uuid::new_v4().to_string(),
            buy_exchange: opportunity.buy_exchange.clone(),
            sell_exchange: opportunity.sell_exchange.clone(),
            buy_price: opportunity.buy_price,
            sell_price: opportunity.sell_price,
            buy_order_id: None,
            sell_order_id: None,
            amount: opportunity.volume,
            state: ArbitrageState::Pending,
            opened_at: now,
            updated_at: now,
        };

        let reason = format!(
            "Arbitrage {} buy leg on {} at {}",
            position.id, opportunity.buy_exchange, opportunity.buy_price
        );
        let buy = OrderRequest::market(symbol, OrderSide::Buy, opportunity.volume);
        match orders.submit(&opportunity.buy_exchange, &reason, buy).await {
            Ok(order) => position.buy_order_id = Some(order.order_id),
            Err(e) => {
                warn!(position = %position.id, error = %e, "Arbitrage buy leg failed");
                position.state = ArbitrageState::Failed;
                let reason = format!("Arbitrage buy leg on {} failed: {e}", opportunity.buy_exchange);
                self.book.lock().await.positions.push(position);
                return reason;
            }
        }

        let reason = format!(
            "Arbitrage {} sell leg on {} at {}",
            position.id, opportunity.sell_exchange, opportunity.sell_price
        );
        let sell = OrderRequest::market(symbol, OrderSide::Sell, opportunity.volume);
        match orders.submit(&opportunity.sell_exchange, &reason, sell).await {
            Ok(order) => {
                position.sell_order_id = Some(order.order_id);
                position.state = ArbitrageState::PartiallyFilled;
            }
            Err(e) => {
                warn!(position = %position.id, error = %e, "Arbitrage sell leg failed");
                position.state = ArbitrageState::Failed;
                let reason = format!("Arbitrage sell leg on {} failed: {e}", opportunity.sell_exchange);
                self.book.lock().await.positions.push(position);
                return reason;
            }
        }

        info!(
            position = %position.id,
            buy = %opportunity.buy_exchange,
            sell = %opportunity.sell_exchange,
            volume = %opportunity.volume,
            net_pct = %opportunity.net_spread_pct,
            "Arbitrage position opened"
        );
        let reason = format!(
            "Opened arbitrage {}: buy {} on {} at {}, sell on {} at {} (net {:.4}%)",
            position.id,
            opportunity.volume,
            opportunity.buy_exchange,
            opportunity.buy_price,
            opportunity.sell_exchange,
            opportunity.sell_price,
            opportunity.net_spread_pct
        );
        self.book.lock().await.positions.push(position);
        reason
    }

    async fn scan_once(&self, now: DateTime<Utc>) -> String {
        let reason = match self.find_opportunity().await {
            Some(opportunity) => self.open_position(opportunity, now).await,
            None => format!("No arbitrage opportunity above {}%", self.params.min_profit),
        };
        self.book.lock().await.last_scan = Some(reason.clone());
        reason
    }

    /// Advances every active position and drops expired terminal ones.
    /// Returns how many changed state.
    async fn poll_positions(&self, now: DateTime<Utc>) -> usize {
        let exchange = &self.deps.exchange;
        let symbol = &self.deps.symbol;
        let timeout_secs = self.params.position_timeout_secs;
        let mut book = self.book.lock().await;
        let mut changed = 0;

        for position in book.positions.iter_mut().filter(|p| p.state.is_active()) {
            let buy_open = match leg_open(exchange, &position.buy_exchange, symbol, position.buy_order_id.as_deref()).await {
                Ok(open) => open,
                Err(e) => {
                    warn!(position = %position.id, error = %e, "Arbitrage poll failed");
                    position.state = ArbitrageState::Failed;
                    position.updated_at = now;
                    changed += 1;
                    continue;
                }
            };
            let sell_open = match leg_open(exchange, &position.sell_exchange, symbol, position.sell_order_id.as_deref()).await {
                Ok(open) => open,
                Err(e) => {
                    warn!(position = %position.id, error = %e, "Arbitrage poll failed");
                    position.state = ArbitrageState::Failed;
                    position.updated_at = now;
                    changed += 1;
                    continue;
                }
            };

            if !buy_open && !sell_open {
                position.state = ArbitrageState::Filled;
                position.updated_at = now;
                changed += 1;
                info!(position = %position.id, "Arbitrage position filled");
            } else if !interval_elapsed(Some(position.opened_at), now, timeout_secs) {
                position.state = ArbitrageState::PartiallyFilled;
            } else {
                for (open, account, order_id) in [
                    (buy_open, &position.buy_exchange, &position.buy_order_id),
                    (sell_open, &position.sell_exchange, &position.sell_order_id),
                ] {
                    if let (true, Some(order_id)) = (open, order_id) {
                        if let Err(e) = exchange.cancel_order(account, symbol, order_id).await {
                            warn!(position = %position.id, order_id = %order_id, error = %e, "Cancel failed");
                        }
                    }
                }
                position.state = ArbitrageState::Cancelled;
                position.updated_at = now;
                changed += 1;
                warn!(position = %position.id, "Arbitrage position timed out");
            }
        }

        let before = book.positions.len();
        book.positions.retain(|p| {
            p.state.is_active() || !interval_elapsed(Some(p.updated_at), now, TERMINAL_RETENTION_SECS)
        });
        let pruned = before - book.positions.len();
        if pruned > 0 {
            debug!(pruned, "Dropped expired arbitrage positions");
        }

        changed
    }

    async fn cancel_active(&self) {
        let exchange = &self.deps.exchange;
        let symbol = &self.deps.symbol;
        let mut book = self.book.lock().await;
        for position in book.positions.iter_mut().filter(|p| p.state.is_active()) {
            for (account, order_id) in [
                (&position.buy_exchange, &position.buy_order_id),
                (&position.sell_exchange, &position.sell_order_id),
            ] {
                if let Some(order_id) = order_id {
                    if let Err(e) = exchange.cancel_order(account, symbol, order_id).await {
                        warn!(position = %position.id, error = %e, "Cleanup cancel failed");
                    }
                }
            }
            position.state = ArbitrageState::Cancelled;
            position.updated_at = Utc::now();
        }
    }

    /// Scans every `scanIntervalSecs` until `shutdown` flips or its sender is dropped.
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.params.scan_interval_secs.max(1));
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let reason = self.scan_once(Utc::now()).await;
                    debug!(reason = %reason, "Arbitrage scan finished");
                }
            }
        }
    }
}

struct ScanWorker {
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl ScanWorker {
    fn spawn(desk: Desk) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(desk.run(shutdown_rx));
        Self { shutdown, worker }
    }

    /// Waits for an in-flight scan to finish.
    async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "Arbitrage scan worker ended abnormally");
        }
    }
}

pub struct ArbitrageStrategy {
    deps: StrategyDeps,
    book: Arc<Mutex<Book>>,
    desk: Option<Desk>,
    scanner: Option<ScanWorker>,
}

impl ArbitrageStrategy {
    #[must_use]
    pub fn new(deps: StrategyDeps) -> Self {
        Self {
            deps,
            book: Arc::new(Mutex::new(Book::default())),
            desk: None,
            scanner: None,
        }
    }

    /// Snapshot of tracked positions, oldest first.
    pub async fn positions(&self) -> Vec<ArbitragePosition> {
        self.book.lock().await.positions.clone()
    }

    /// Runs one scan immediately, outside the scan worker's schedule.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Strategy` before `initialize`.
    pub async fn scan_now(&self) -> Result<String, EngineError> {
        let desk = self.desk()?;
        Ok(desk.scan_once(Utc::now()).await)
    }

    fn desk(&self) -> Result<&Desk, EngineError> {
        self.desk
            .as_ref()
            .ok_or_else(|| EngineError::strategy("Arbitrage strategy not initialized"))
    }

    async fn stop_scanner(&mut self) {
        if let Some(scanner) = self.scanner.take() {
            scanner.stop().await;
        }
    }
}

async fn leg_open(
    exchange: &Arc<dyn ExchangeConnector>,
    account: &str,
    symbol: &str,
    order_id: Option<&str>,
) -> anyhow::Result<bool> {
    let Some(order_id) = order_id else {
        return Ok(false);
    };
    let open = exchange.get_open_orders(account, symbol).await?;
    Ok(open.iter().any(|o| o.order_id == order_id))
}

#[async_trait]
impl Strategy for ArbitrageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Arbitrage
    }

    async fn initialize(&mut self, config: &StrategyDescriptor) -> Result<(), EngineError> {
        let params = ArbitrageParams::from_descriptor(config)?;
        self.stop_scanner().await;
        *self.book.lock().await = Book::default();

        info!(
            exchanges = ?params.exchanges,
            min_profit = params.min_profit,
            scan_interval_secs = params.scan_interval_secs,
            "Arbitrage initialized"
        );
        let desk = Desk {
            deps: self.deps.clone(),
            params,
            book: self.book.clone(),
        };
        self.scanner = Some(ScanWorker::spawn(desk.clone()));
        self.desk = Some(desk);
        Ok(())
    }

    async fn execute(&mut self, ctx: &BotContext) -> Result<Signal, EngineError> {
        let desk = self.desk()?;
        let changed = desk.poll_positions(ctx.timestamp).await;

        let book = self.book.lock().await;
        let active = book.positions.iter().filter(|p| p.state.is_active()).count();
        let last_scan = book.last_scan.as_deref().unwrap_or("no scan yet");
        Ok(Signal::hold(format!(
            "{active} active arbitrage positions, {changed} updated; last scan: {last_scan}"
        )))
    }

    async fn cleanup(&mut self) -> Result<(), EngineError> {
        self.stop_scanner().await;
        if let Some(desk) = &self.desk {
            desk.cancel_active().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{config, context, deps, RecordingStore};
    use autotrade_core::{BotConfig, ExecutionStatus};
    use autotrade_execution::PaperExchange;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    fn exchange() -> Arc<PaperExchange> {
        let exchange = Arc::new(PaperExchange::new(dec!(0.001)));
        exchange.set_balance("a", "USDT", dec!(100000));
        exchange.set_balance("b", "BTC", dec!(10));
        exchange.set_balance("b", "USDT", dec!(100000));
        exchange.set_balance("a", "BTC", dec!(10));
        exchange.set_quote("a", "BTC/USDT", dec!(49990), dec!(50000));
        exchange.set_quote("b", "BTC/USDT", dec!(50600), dec!(50610));
        exchange
    }

    fn params(scan_interval_secs: u64) -> Value {
        json!({
            "exchanges": ["a", "b"],
            "minProfit": 0.5,
            "maxSlippage": 1.0,
            "orderAmount": "0.5",
            "scanIntervalSecs": scan_interval_secs
        })
    }

    async fn strategy_with(
        exchange: Arc<PaperExchange>,
        bot: &BotConfig,
    ) -> (ArbitrageStrategy, Arc<RecordingStore>) {
        let (deps, store) = deps(exchange, "a", bot);
        let mut strategy = ArbitrageStrategy::new(deps);
        strategy.initialize(&bot.strategy).await.unwrap();
        (strategy, store)
    }

    /// A strategy whose scan worker stays idle for the test's duration.
    async fn strategy(exchange: Arc<PaperExchange>) -> (ArbitrageStrategy, Arc<RecordingStore>) {
        strategy_with(exchange, &config("arbitrage", params(3600))).await
    }

    #[tokio::test]
    async fn opens_best_opportunity_and_marks_filled() {
        let exchange = exchange();
        let (mut strategy, _store) = strategy(exchange.clone()).await;

        let reason = strategy.scan_now().await.unwrap();
        assert!(reason.starts_with("Opened arbitrage"));

        let position = strategy.positions().await[0].clone();
        assert_eq!(position.buy_exchange, "a");
        assert_eq!(position.sell_exchange, "b");
        assert_eq!(position.amount, dec!(0.5));
        assert_eq!(position.state, ArbitrageState::PartiallyFilled);
        assert_eq!(exchange.submitted_orders(), 2);

        // Market legs fill immediately, so the next poll completes the position.
        let ctx = context("arbitrage", dec!(50000), dec!(100000), Decimal::ZERO);
        let signal = strategy.execute(&ctx).await.unwrap();
        assert!(signal.is_hold());
        assert!(signal.reason().contains("last scan: Opened arbitrage"));
        assert_eq!(strategy.positions().await[0].state, ArbitrageState::Filled);
    }

    #[tokio::test]
    async fn legs_are_recorded_as_trades() {
        let exchange = exchange();
        let (strategy, store) = strategy(exchange).await;
        strategy.scan_now().await.unwrap();

        let executions = store.executions().await;
        assert_eq!(executions.len(), 2);
        assert!(executions.iter().all(|e| e.status == ExecutionStatus::Success));
        let trades = store.trades().await;
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, OrderSide::Buy);
        assert_eq!(trades[1].side, OrderSide::Sell);
    }

    #[tokio::test]
    async fn volume_capped_by_max_position_size() {
        let exchange = exchange();
        let mut bot = config("arbitrage", params(3600));
        bot.risk.max_position_size = dec!(0.01);
        let (strategy, _store) = strategy_with(exchange.clone(), &bot).await;

        strategy.scan_now().await.unwrap();
        assert_eq!(strategy.positions().await[0].amount, dec!(0.01));
        let bought = exchange.balance("a", "BTC") - dec!(10);
        assert!(bought > Decimal::ZERO && bought <= dec!(0.01));
    }

    #[tokio::test]
    async fn spread_below_fees_is_ignored() {
        let exchange = exchange();
        // 0.6% gross minus 0.2% fees is below the 0.5% minimum.
        exchange.set_quote("b", "BTC/USDT", dec!(50300), dec!(50310));
        let (strategy, _store) = strategy(exchange.clone()).await;

        let reason = strategy.scan_now().await.unwrap();
        assert!(reason.starts_with("No arbitrage opportunity"));
        assert!(strategy.positions().await.is_empty());
        assert_eq!(exchange.submitted_orders(), 0);
    }

    #[tokio::test]
    async fn volume_limited_by_quote_balance() {
        let exchange = exchange();
        exchange.set_balance("a", "USDT", dec!(5000));
        let (strategy, _store) = strategy(exchange).await;

        strategy.scan_now().await.unwrap();
        assert_eq!(strategy.positions().await[0].amount, dec!(0.1));
    }

    #[tokio::test]
    async fn resting_leg_times_out_and_is_cancelled() {
        let exchange = exchange();
        let (mut strategy, _store) = strategy(exchange.clone()).await;
        strategy.scan_now().await.unwrap();

        // Simulate a leg still resting on the book.
        let sell_id = strategy.positions().await[0].sell_order_id.clone().unwrap();
        exchange.mark_open("b", "BTC/USDT", &sell_id);

        let mut later = context("arbitrage", dec!(50000), dec!(100000), Decimal::ZERO);
        later.timestamp += ChronoDuration::seconds(10);
        strategy.execute(&later).await.unwrap();
        assert_eq!(strategy.positions().await[0].state, ArbitrageState::PartiallyFilled);

        later.timestamp += ChronoDuration::seconds(400);
        strategy.execute(&later).await.unwrap();
        assert_eq!(strategy.positions().await[0].state, ArbitrageState::Cancelled);
        assert!(exchange.open_order_ids("b").is_empty());
    }

    #[tokio::test]
    async fn terminal_positions_expire() {
        let exchange = exchange();
        let (mut strategy, _store) = strategy(exchange).await;
        strategy.scan_now().await.unwrap();

        let mut ctx = context("arbitrage", dec!(50000), dec!(100000), Decimal::ZERO);
        strategy.execute(&ctx).await.unwrap();
        assert_eq!(strategy.positions().await[0].state, ArbitrageState::Filled);

        ctx.timestamp += ChronoDuration::minutes(30);
        strategy.execute(&ctx).await.unwrap();
        assert_eq!(strategy.positions().await.len(), 1);

        ctx.timestamp += ChronoDuration::minutes(31);
        strategy.execute(&ctx).await.unwrap();
        assert!(strategy.positions().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn scan_worker_runs_between_ticks() {
        let exchange = exchange();
        let (mut strategy, _store) =
            strategy_with(exchange.clone(), &config("arbitrage", params(5))).await;

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(exchange.submitted_orders(), 0);

        // Scans at 5s and 10s, with no tick in between.
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(strategy.positions().await.len(), 2);
        assert_eq!(exchange.submitted_orders(), 4);

        strategy.cleanup().await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(exchange.submitted_orders(), 4);
    }

    #[tokio::test]
    async fn requires_two_exchanges() {
        let bot = config("arbitrage", json!({}));
        let (deps, _store) = deps(exchange(), "a", &bot);
        let mut strategy = ArbitrageStrategy::new(deps);
        let single = descriptor_for(json!({
            "exchanges": ["a"], "minProfit": 0.5, "maxSlippage": 1.0, "orderAmount": 1
        }));
        assert!(matches!(
            strategy.initialize(&single).await,
            Err(EngineError::Strategy(_))
        ));
    }

    fn descriptor_for(parameters: Value) -> StrategyDescriptor {
        crate::test_support::descriptor("arbitrage", parameters)
    }
}
