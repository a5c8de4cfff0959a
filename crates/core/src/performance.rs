//! Trade-history performance reporting.

use crate::orders::TradeRecord;
use crate::position::PositionTracker;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Filled orders, opening and closing.
    pub total_trades: usize,
    /// Trades that reduced a position and realized `PnL`.
    pub closed_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    /// Realized `PnL` net of all fees.
    pub net_profit: Decimal,
    /// `gross_profit / gross_loss`; `None` when there were no losses.
    pub profit_factor: Option<Decimal>,
    /// Largest peak-to-trough decline of cumulative net `PnL`, in quote units.
    pub max_drawdown: Decimal,
    pub total_fees: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub total_volume: Decimal,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            total_trades: 0,
            closed_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            net_profit: Decimal::ZERO,
            profit_factor: None,
            max_drawdown: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            average_win: Decimal::ZERO,
            average_loss: Decimal::ZERO,
            total_volume: Decimal::ZERO,
        }
    }
}

impl PerformanceMetrics {
    /// Computes metrics from trades in chronological order.
    #[must_use]
    pub fn from_trades(trades: &[TradeRecord]) -> Self {
        let mut metrics = Self {
            total_trades: trades.len(),
            ..Self::default()
        };
        let mut tracker = PositionTracker::new();
        let mut equity = Decimal::ZERO;
        let mut peak = Decimal::ZERO;

        for trade in trades {
            metrics.total_fees += trade.fee;
            metrics.total_volume += trade.notional();

            match tracker.process_trade(trade) {
                Some(pnl) => {
                    metrics.closed_trades += 1;
                    if pnl > Decimal::ZERO {
                        metrics.winning_trades += 1;
                        metrics.gross_profit += pnl;
                    } else if pnl < Decimal::ZERO {
                        metrics.losing_trades += 1;
                        metrics.gross_loss += pnl.abs();
                    }
                    equity += pnl;
                }
                // Opening fees are not part of realized PnL yet but still cost money.
                None => equity -= trade.fee,
            }

            peak = peak.max(equity);
            metrics.max_drawdown = metrics.max_drawdown.max(peak - equity);
        }

        metrics.net_profit = equity;
        if metrics.closed_trades > 0 {
            metrics.win_rate = metrics.winning_trades.to_f64().unwrap_or(0.0)
                / metrics.closed_trades.to_f64().unwrap_or(1.0);
        }
        if metrics.gross_loss > Decimal::ZERO {
            metrics.profit_factor = Some(metrics.gross_profit / metrics.gross_loss);
        }
        if metrics.winning_trades > 0 {
            metrics.average_win = metrics.gross_profit / Decimal::from(metrics.winning_trades);
        }
        if metrics.losing_trades > 0 {
            metrics.average_loss = metrics.gross_loss / Decimal::from(metrics.losing_trades);
        }

        metrics
    }

    /// Realized `PnL` of trades at or after `since`, replaying earlier trades for cost basis.
    #[must_use]
    pub fn realized_since(trades: &[TradeRecord], since: chrono::DateTime<chrono::Utc>) -> Decimal {
        let mut tracker = PositionTracker::new();
        trades
            .iter()
            .filter_map(|trade| {
                let pnl = tracker.process_trade(trade);
                pnl.filter(|_| trade.timestamp >= since)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderSide;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn trade(side: OrderSide, amount: Decimal, price: Decimal, fee: Decimal) -> TradeRecord {
        TradeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            bot_id: "bot".to_string(),
            symbol: "ETH/USDT".to_string(),
            side,
            amount,
            price,
            fee,
            order_id: "o".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_history() {
        let metrics = PerformanceMetrics::from_trades(&[]);
        assert_eq!(metrics, PerformanceMetrics::default());
    }

    #[test]
    fn wins_losses_and_profit_factor() {
        let trades = vec![
            trade(OrderSide::Buy, dec!(1), dec!(100), Decimal::ZERO),
            trade(OrderSide::Sell, dec!(1), dec!(130), Decimal::ZERO), // +30
            trade(OrderSide::Buy, dec!(1), dec!(120), Decimal::ZERO),
            trade(OrderSide::Sell, dec!(1), dec!(110), Decimal::ZERO), // -10
        ];
        let metrics = PerformanceMetrics::from_trades(&trades);

        assert_eq!(metrics.total_trades, 4);
        assert_eq!(metrics.closed_trades, 2);
        assert_eq!(metrics.winning_trades, 1);
        assert_eq!(metrics.losing_trades, 1);
        assert!((metrics.win_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(metrics.net_profit, dec!(20));
        assert_eq!(metrics.profit_factor, Some(dec!(3)));
        assert_eq!(metrics.max_drawdown, dec!(10));
    }

    #[test]
    fn fees_reduce_net_profit() {
        let trades = vec![
            trade(OrderSide::Buy, dec!(1), dec!(100), dec!(1)),
            trade(OrderSide::Sell, dec!(1), dec!(110), dec!(1)),
        ];
        let metrics = PerformanceMetrics::from_trades(&trades);
        assert_eq!(metrics.total_fees, dec!(2));
        assert_eq!(metrics.net_profit, dec!(8));
        assert_eq!(metrics.profit_factor, None);
    }

    #[test]
    fn realized_since_ignores_older_closes() {
        let mut old_buy = trade(OrderSide::Buy, dec!(2), dec!(100), Decimal::ZERO);
        old_buy.timestamp = Utc::now() - Duration::days(2);
        let mut old_sell = trade(OrderSide::Sell, dec!(1), dec!(90), Decimal::ZERO);
        old_sell.timestamp = Utc::now() - Duration::days(2);
        let new_sell = trade(OrderSide::Sell, dec!(1), dec!(80), Decimal::ZERO);

        let since = Utc::now() - Duration::hours(1);
        let realized = PerformanceMetrics::realized_since(&[old_buy, old_sell, new_sell], since);
        assert_eq!(realized, dec!(-20));
    }
}
