use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    /// Good till cancelled
    #[default]
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: Decimal,
    pub price: Option<Decimal>,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    #[must_use]
    pub fn market(symbol: impl Into<String>, side: OrderSide, amount: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            amount,
            price: None,
            time_in_force: TimeInForce::Ioc,
        }
    }

    #[must_use]
    pub fn limit(symbol: impl Into<String>, side: OrderSide, amount: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            amount,
            price: Some(price),
            time_in_force: TimeInForce::Gtc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Exchange-assigned order id.
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub amount: Decimal,
    pub filled_amount: Decimal,
    pub average_price: Option<Decimal>,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl OrderResult {
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}

/// An order resting on the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Option<Decimal>,
    pub amount: Decimal,
    pub filled_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A filled order attributed to a bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub bot_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub order_id: String,
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    /// Builds a trade record from a (partially) filled order result.
    ///
    /// Returns `None` when nothing was filled or no price is known.
    #[must_use]
    pub fn from_fill(bot_id: &str, order: &OrderResult, fallback_price: Decimal) -> Option<Self> {
        if order.filled_amount <= Decimal::ZERO {
            return None;
        }
        let price = order.average_price.unwrap_or(fallback_price);
        if price <= Decimal::ZERO {
            return None;
        }
        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            bot_id: bot_id.to_string(),
            symbol: order.symbol.clone(),
            side: order.side,
            amount: order.filled_amount,
            price,
            fee: order.fee,
            order_id: order.order_id.clone(),
            timestamp: order.timestamp,
        })
    }

    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.amount * self.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn filled(amount: Decimal, price: Option<Decimal>) -> OrderResult {
        OrderResult {
            order_id: "o-1".to_string(),
            symbol: "BTC/USDT".to_string(),
            side: OrderSide::Buy,
            status: OrderStatus::Filled,
            amount,
            filled_amount: amount,
            average_price: price,
            fee: dec!(0.1),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn trade_record_uses_fill_price() {
        let trade = TradeRecord::from_fill("bot", &filled(dec!(2), Some(dec!(100))), dec!(1)).unwrap();
        assert_eq!(trade.price, dec!(100));
        assert_eq!(trade.notional(), dec!(200));
        assert_eq!(trade.order_id, "o-1");
    }

    #[test]
    fn trade_record_falls_back_to_reference_price() {
        let trade = TradeRecord::from_fill("bot", &filled(dec!(1), None), dec!(99)).unwrap();
        assert_eq!(trade.price, dec!(99));
    }

    #[test]
    fn unfilled_order_produces_no_trade() {
        let mut order = filled(dec!(1), Some(dec!(100)));
        order.filled_amount = Decimal::ZERO;
        order.status = OrderStatus::New;
        assert!(TradeRecord::from_fill("bot", &order, dec!(100)).is_none());
    }

    #[test]
    fn order_side_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&OrderSide::Sell).unwrap(), "\"SELL\"");
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
    }
}
