//! Strategy output.

use crate::orders::OrderSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A strategy's recommendation for the current tick.
///
/// `Hold` is the normal "nothing to do" outcome and never reaches the risk gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy(TradeSignal),
    Sell(TradeSignal),
    Hold {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    /// In [0, 1].
    pub strength: f64,
    /// In [0, 1].
    pub confidence: f64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    /// Reference price the strategy decided at (grid level, DCA target, ...).
    pub price: Option<Decimal>,
    /// Size the strategy asks for, in base units. The risk gate may only shrink it.
    pub requested_amount: Option<Decimal>,
}

impl TradeSignal {
    #[must_use]
    pub fn new(strength: f64, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            strength: clamp_unit(strength),
            confidence: clamp_unit(confidence),
            reason: reason.into(),
            timestamp: Utc::now(),
            price: None,
            requested_amount: None,
        }
    }

    #[must_use]
    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    #[must_use]
    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.requested_amount = Some(amount);
        self
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl Signal {
    #[must_use]
    pub fn hold(reason: impl Into<String>) -> Self {
        Self::Hold {
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub const fn buy(signal: TradeSignal) -> Self {
        Self::Buy(signal)
    }

    #[must_use]
    pub const fn sell(signal: TradeSignal) -> Self {
        Self::Sell(signal)
    }

    #[must_use]
    pub const fn is_hold(&self) -> bool {
        matches!(self, Self::Hold { .. })
    }

    /// Side and payload for actionable signals.
    #[must_use]
    pub const fn trade(&self) -> Option<(OrderSide, &TradeSignal)> {
        match self {
            Self::Buy(signal) => Some((OrderSide::Buy, signal)),
            Self::Sell(signal) => Some((OrderSide::Sell, signal)),
            Self::Hold { .. } => None,
        }
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Buy(signal) | Self::Sell(signal) => &signal.reason,
            Self::Hold { reason, .. } => reason,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Buy(_) => "BUY",
            Self::Sell(_) => "SELL",
            Self::Hold { .. } => "HOLD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn strength_and_confidence_are_clamped() {
        let signal = TradeSignal::new(1.7, -0.2, "test");
        assert!((signal.strength - 1.0).abs() < f64::EPSILON);
        assert!(signal.confidence.abs() < f64::EPSILON);

        let nan = TradeSignal::new(f64::NAN, 0.5, "nan");
        assert!(nan.strength.abs() < f64::EPSILON);
    }

    #[test]
    fn trade_exposes_side() {
        let signal = Signal::sell(TradeSignal::new(0.5, 0.5, "exit").with_amount(dec!(2)));
        let (side, payload) = signal.trade().unwrap();
        assert_eq!(side, OrderSide::Sell);
        assert_eq!(payload.requested_amount, Some(dec!(2)));
        assert_eq!(signal.label(), "SELL");
    }

    #[test]
    fn hold_has_no_trade() {
        let signal = Signal::hold("insufficient data");
        assert!(signal.is_hold());
        assert!(signal.trade().is_none());
        assert_eq!(signal.reason(), "insufficient data");
    }
}
