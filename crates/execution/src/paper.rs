//! In-memory exchange for paper trading and tests.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use autotrade_core::{
    split_symbol, Candle, ExchangeConnector, OpenOrder, OrderRequest, OrderResult, OrderSide,
    OrderStatus, OrderType, Ticker,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Ticker key used when no account-specific quote exists.
const ANY_ACCOUNT: &str = "*";

#[derive(Default)]
struct PaperState {
    /// account -> asset -> free amount
    balances: HashMap<String, HashMap<String, Decimal>>,
    /// (account, symbol) -> ticker
    tickers: HashMap<(String, String), Ticker>,
    /// symbol -> candles, oldest first
    candles: HashMap<String, Vec<Candle>>,
    /// account -> resting orders
    open_orders: HashMap<String, Vec<OpenOrder>>,
    failing_orders: u32,
    failing_market_data: bool,
    submitted: usize,
    next_order_id: u64,
}

/// Exchange simulator: market orders fill at the touch, limit orders rest until
/// marketable or filled explicitly.
pub struct PaperExchange {
    fee_rate: Decimal,
    latency: Mutex<Duration>,
    state: Mutex<PaperState>,
}

impl PaperExchange {
    #[must_use]
    pub fn new(fee_rate: Decimal) -> Self {
        Self {
            fee_rate,
            latency: Mutex::new(Duration::ZERO),
            state: Mutex::new(PaperState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_balance(&self, account: &str, asset: &str, amount: Decimal) {
        self.state()
            .balances
            .entry(account.to_string())
            .or_default()
            .insert(asset.to_ascii_uppercase(), amount);
    }

    #[must_use]
    pub fn balance(&self, account: &str, asset: &str) -> Decimal {
        self.state()
            .balances
            .get(account)
            .and_then(|b| b.get(&asset.to_ascii_uppercase()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Sets the bid/ask for one account.
    pub fn set_quote(&self, account: &str, symbol: &str, bid: Decimal, ask: Decimal) {
        let ticker = Ticker {
            symbol: symbol.to_string(),
            bid,
            ask,
            last: (bid + ask) / Decimal::TWO,
            volume: Decimal::ZERO,
            timestamp: Utc::now(),
        };
        self.state()
            .tickers
            .insert((account.to_string(), symbol.to_string()), ticker);
    }

    /// Sets a zero-spread price seen by every account without its own quote.
    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.set_quote(ANY_ACCOUNT, symbol, price, price);
    }

    pub fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.state().candles.insert(symbol.to_string(), candles);
    }

    /// The next `count` order submissions fail.
    pub fn fail_next_orders(&self, count: u32) {
        self.state().failing_orders = count;
    }

    /// Makes candle, ticker, and balance queries fail until reset.
    pub fn fail_market_data(&self, failing: bool) {
        self.state().failing_market_data = failing;
    }

    /// Delay applied to every order submission.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Order submissions received, including failed ones.
    #[must_use]
    pub fn submitted_orders(&self) -> usize {
        self.state().submitted
    }

    #[must_use]
    pub fn open_order_ids(&self, account: &str) -> Vec<String> {
        self.state()
            .open_orders
            .get(account)
            .map(|orders| orders.iter().map(|o| o.order_id.clone()).collect())
            .unwrap_or_default()
    }

    /// Puts an order id back on the book as if it were still resting.
    pub fn mark_open(&self, account: &str, symbol: &str, order_id: &str) {
        let order = OpenOrder {
            order_id: order_id.to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            price: None,
            amount: Decimal::ZERO,
            filled_amount: Decimal::ZERO,
            created_at: Utc::now(),
        };
        self.state()
            .open_orders
            .entry(account.to_string())
            .or_default()
            .push(order);
    }

    /// Fills a resting limit order at its limit price.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is unknown or the balance is insufficient.
    pub fn fill_order(&self, account: &str, order_id: &str) -> Result<OrderResult> {
        let mut state = self.state();
        let orders = state.open_orders.entry(account.to_string()).or_default();
        let index = orders
            .iter()
            .position(|o| o.order_id == order_id)
            .ok_or_else(|| anyhow!("Order {order_id} not found"))?;
        let order = orders.remove(index);
        let price = order.price.context("Resting order has no price")?;
        self.settle(
            &mut state,
            account,
            &order.symbol,
            order.side,
            order.amount,
            price,
            order.order_id,
        )
    }

    fn ticker_for(state: &PaperState, account: &str, symbol: &str) -> Option<Ticker> {
        state
            .tickers
            .get(&(account.to_string(), symbol.to_string()))
            .or_else(|| state.tickers.get(&(ANY_ACCOUNT.to_string(), symbol.to_string())))
            .cloned()
    }

    #[allow(clippy::too_many_arguments)]
    fn settle(
        &self,
        state: &mut PaperState,
        account: &str,
        symbol: &str,
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
        order_id: String,
    ) -> Result<OrderResult> {
        let (base, quote) =
            split_symbol(symbol).ok_or_else(|| anyhow!("Cannot split symbol {symbol}"))?;
        let balances = state.balances.entry(account.to_string()).or_default();
        let notional = amount * price;
        let fee = notional * self.fee_rate;

        match side {
            OrderSide::Buy => {
                let available = balances.get(&quote).copied().unwrap_or(Decimal::ZERO);
                if available < notional + fee {
                    bail!("Insufficient {quote} balance: need {}, have {available}", notional + fee);
                }
                balances.insert(quote, available - notional - fee);
                *balances.entry(base).or_default() += amount;
            }
            OrderSide::Sell => {
                let available = balances.get(&base).copied().unwrap_or(Decimal::ZERO);
                if available < amount {
                    bail!("Insufficient {base} balance: need {amount}, have {available}");
                }
                balances.insert(base, available - amount);
                *balances.entry(quote).or_default() += notional - fee;
            }
        }

        Ok(OrderResult {
            order_id,
            symbol: symbol.to_string(),
            side,
            status: OrderStatus::Filled,
            amount,
            filled_amount: amount,
            average_price: Some(price),
            fee,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl ExchangeConnector for PaperExchange {
    async fn get_candles(
        &self,
        _account_id: &str,
        symbol: &str,
        _interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let state = self.state();
        if state.failing_market_data {
            bail!("Market data unavailable");
        }
        let candles = state.candles.get(symbol).cloned().unwrap_or_default();
        let skip = candles.len().saturating_sub(limit);
        Ok(candles.into_iter().skip(skip).collect())
    }

    async fn get_balances(&self, account_id: &str) -> Result<HashMap<String, Decimal>> {
        let state = self.state();
        if state.failing_market_data {
            bail!("Balance service unavailable");
        }
        Ok(state.balances.get(account_id).cloned().unwrap_or_default())
    }

    async fn get_ticker(&self, account_id: &str, symbol: &str) -> Result<Ticker> {
        let state = self.state();
        if state.failing_market_data {
            bail!("Market data unavailable");
        }
        Self::ticker_for(&state, account_id, symbol)
            .ok_or_else(|| anyhow!("No ticker for {symbol} on {account_id}"))
    }

    async fn get_open_orders(&self, account_id: &str, symbol: &str) -> Result<Vec<OpenOrder>> {
        Ok(self
            .state()
            .open_orders
            .get(account_id)
            .map(|orders| orders.iter().filter(|o| o.symbol == symbol).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_order(&self, account_id: &str, request: &OrderRequest) -> Result<OrderResult> {
        {
            let mut state = self.state();
            state.submitted += 1;
            if state.failing_orders > 0 {
                state.failing_orders -= 1;
                bail!("Injected order failure");
            }
        }

        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if request.amount <= Decimal::ZERO {
            bail!("Order amount must be positive");
        }

        let mut state = self.state();
        state.next_order_id += 1;
        let order_id = format!("paper-{}", state.next_order_id);
        let ticker = Self::ticker_for(&state, account_id, &request.symbol)
            .ok_or_else(|| anyhow!("No ticker for {} on {account_id}", request.symbol))?;
        let touch = match request.side {
            OrderSide::Buy => ticker.ask,
            OrderSide::Sell => ticker.bid,
        };

        let marketable = match (request.order_type, request.price) {
            (OrderType::Market, _) => true,
            (OrderType::Limit, Some(limit)) => match request.side {
                OrderSide::Buy => limit >= touch,
                OrderSide::Sell => limit <= touch,
            },
            (OrderType::Limit, None) => bail!("Limit order requires a price"),
        };

        if marketable {
            debug!(account = account_id, order_id = %order_id, side = %request.side, amount = %request.amount, price = %touch, "Paper fill");
            return self.settle(
                &mut state,
                account_id,
                &request.symbol,
                request.side,
                request.amount,
                touch,
                order_id,
            );
        }

        let price = request.price.unwrap_or(touch);
        let now = Utc::now();
        state
            .open_orders
            .entry(account_id.to_string())
            .or_default()
            .push(OpenOrder {
                order_id: order_id.clone(),
                symbol: request.symbol.clone(),
                side: request.side,
                price: Some(price),
                amount: request.amount,
                filled_amount: Decimal::ZERO,
                created_at: now,
            });

        Ok(OrderResult {
            order_id,
            symbol: request.symbol.clone(),
            side: request.side,
            status: OrderStatus::New,
            amount: request.amount,
            filled_amount: Decimal::ZERO,
            average_price: None,
            fee: Decimal::ZERO,
            timestamp: now,
        })
    }

    async fn cancel_order(&self, account_id: &str, _symbol: &str, order_id: &str) -> Result<()> {
        let mut state = self.state();
        let orders = state.open_orders.entry(account_id.to_string()).or_default();
        let before = orders.len();
        orders.retain(|o| o.order_id != order_id);
        if orders.len() == before {
            bail!("Order {order_id} not found on {account_id}");
        }
        Ok(())
    }

    async fn test_connection(&self, _account_id: &str) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn exchange() -> PaperExchange {
        let exchange = PaperExchange::new(dec!(0.001));
        exchange.set_balance("acct", "USDT", dec!(10000));
        exchange.set_price("BTC/USDT", dec!(100));
        exchange
    }

    #[tokio::test]
    async fn market_buy_moves_balances() {
        let exchange = exchange();
        let order = exchange
            .create_order("acct", &OrderRequest::market("BTC/USDT", OrderSide::Buy, dec!(2)))
            .await
            .unwrap();
        assert!(order.is_filled());
        assert_eq!(order.fee, dec!(0.2));
        assert_eq!(exchange.balance("acct", "BTC"), dec!(2));
        assert_eq!(exchange.balance("acct", "USDT"), dec!(9799.8));
    }

    #[tokio::test]
    async fn insufficient_balance_fails() {
        let exchange = exchange();
        let result = exchange
            .create_order("acct", &OrderRequest::market("BTC/USDT", OrderSide::Sell, dec!(1)))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn limit_rests_until_filled() {
        let exchange = exchange();
        let order = exchange
            .create_order(
                "acct",
                &OrderRequest::limit("BTC/USDT", OrderSide::Buy, dec!(1), dec!(90)),
            )
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(exchange.open_order_ids("acct"), vec![order.order_id.clone()]);

        let fill = exchange.fill_order("acct", &order.order_id).unwrap();
        assert_eq!(fill.average_price, Some(dec!(90)));
        assert!(exchange.open_order_ids("acct").is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_counted() {
        let exchange = exchange();
        exchange.fail_next_orders(2);
        let request = OrderRequest::market("BTC/USDT", OrderSide::Buy, dec!(1));
        assert!(exchange.create_order("acct", &request).await.is_err());
        assert!(exchange.create_order("acct", &request).await.is_err());
        assert!(exchange.create_order("acct", &request).await.is_ok());
        assert_eq!(exchange.submitted_orders(), 3);
    }

    #[tokio::test]
    async fn cancel_unknown_order_fails() {
        let exchange = exchange();
        assert!(exchange.cancel_order("acct", "BTC/USDT", "nope").await.is_err());
    }
}
