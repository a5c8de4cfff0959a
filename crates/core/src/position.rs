use crate::orders::{OrderSide, TradeRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Net position in one symbol. Negative quantity means short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_price: Decimal,
}

impl Position {
    #[allow(clippy::missing_const_for_fn)] // String cannot be used in const fn
    fn new(symbol: String, quantity: Decimal, avg_price: Decimal) -> Self {
        Self {
            symbol,
            quantity,
            avg_price,
        }
    }

    #[must_use]
    pub fn side(&self) -> OrderSide {
        if self.quantity < Decimal::ZERO {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        }
    }

    #[must_use]
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        (price - self.avg_price) * self.quantity
    }
}

/// Replays a bot's trades into open positions and realized `PnL`.
#[derive(Debug, Default)]
pub struct PositionTracker {
    positions: HashMap<String, Position>,
}

impl PositionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
        }
    }

    /// Builds a tracker from trades in chronological order.
    #[must_use]
    pub fn from_trades<'a>(trades: impl IntoIterator<Item = &'a TradeRecord>) -> Self {
        let mut tracker = Self::new();
        for trade in trades {
            let _ = tracker.process_trade(trade);
        }
        tracker
    }

    /// Applies a trade and calculates realized `PnL` if it reduced a position.
    ///
    /// Returns `Some(pnl)` when a position is fully or partially closed, `None` when opening.
    #[must_use]
    pub fn process_trade(&mut self, trade: &TradeRecord) -> Option<Decimal> {
        let position = self.positions.get_mut(&trade.symbol);

        match (trade.side, position) {
            (OrderSide::Buy, None) => {
                self.positions.insert(
                    trade.symbol.clone(),
                    Position::new(trade.symbol.clone(), trade.amount, trade.price),
                );
                None
            }

            // Adding to long
            (OrderSide::Buy, Some(pos)) if pos.quantity >= Decimal::ZERO => {
                let total_cost = pos.avg_price * pos.quantity + trade.price * trade.amount;
                pos.quantity += trade.amount;
                if pos.quantity > Decimal::ZERO {
                    pos.avg_price = total_cost / pos.quantity;
                }
                None
            }

            // Closing long
            (OrderSide::Sell, Some(pos)) if pos.quantity > Decimal::ZERO => {
                let close_quantity = trade.amount.min(pos.quantity);
                let pnl = (trade.price - pos.avg_price) * close_quantity - trade.fee;

                pos.quantity -= close_quantity;
                if pos.quantity == Decimal::ZERO {
                    self.positions.remove(&trade.symbol);
                }

                Some(pnl)
            }

            (OrderSide::Sell, None) => {
                self.positions.insert(
                    trade.symbol.clone(),
                    Position::new(trade.symbol.clone(), -trade.amount, trade.price),
                );
                None
            }

            // Adding to short
            (OrderSide::Sell, Some(pos)) => {
                let total_cost = pos.avg_price * pos.quantity.abs() + trade.price * trade.amount;
                pos.quantity -= trade.amount;
                pos.avg_price = total_cost / pos.quantity.abs();
                None
            }

            // Closing short
            (OrderSide::Buy, Some(pos)) => {
                let close_quantity = trade.amount.min(pos.quantity.abs());
                let pnl = (pos.avg_price - trade.price) * close_quantity - trade.fee;

                pos.quantity += close_quantity;
                if pos.quantity == Decimal::ZERO {
                    self.positions.remove(&trade.symbol);
                }

                Some(pnl)
            }
        }
    }

    #[must_use]
    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    #[must_use]
    pub fn open_positions(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn trade(side: OrderSide, amount: Decimal, price: Decimal) -> TradeRecord {
        TradeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            bot_id: "bot".to_string(),
            symbol: "BTC/USDT".to_string(),
            side,
            amount,
            price,
            fee: Decimal::ZERO,
            order_id: "o".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn averages_entries_and_realizes_on_close() {
        let mut tracker = PositionTracker::new();
        assert!(tracker.process_trade(&trade(OrderSide::Buy, dec!(1), dec!(100))).is_none());
        assert!(tracker.process_trade(&trade(OrderSide::Buy, dec!(1), dec!(200))).is_none());

        let position = tracker.get_position("BTC/USDT").unwrap();
        assert_eq!(position.quantity, dec!(2));
        assert_eq!(position.avg_price, dec!(150));

        let pnl = tracker.process_trade(&trade(OrderSide::Sell, dec!(2), dec!(160)));
        assert_eq!(pnl, Some(dec!(20)));
        assert!(tracker.get_position("BTC/USDT").is_none());
    }

    #[test]
    fn short_positions_realize_inverse_pnl() {
        let mut tracker = PositionTracker::new();
        let _ = tracker.process_trade(&trade(OrderSide::Sell, dec!(1), dec!(100)));
        let pnl = tracker.process_trade(&trade(OrderSide::Buy, dec!(1), dec!(90)));
        assert_eq!(pnl, Some(dec!(10)));
    }

    #[test]
    fn from_trades_replays_history() {
        let trades = vec![
            trade(OrderSide::Buy, dec!(3), dec!(10)),
            trade(OrderSide::Sell, dec!(1), dec!(12)),
        ];
        let tracker = PositionTracker::from_trades(&trades);
        let positions = tracker.open_positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, dec!(2));
        assert_eq!(positions[0].unrealized_pnl(dec!(11)), dec!(2));
    }
}
