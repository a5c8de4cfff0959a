//! Turns an actionable signal into an order amount, or rejects it.
//!
//! The gate only ever shrinks the strategy's requested size.

use autotrade_core::position_sizing::{risk_bounded_quantity, round_down};
use autotrade_core::{
    BotContext, EngineError, OrderSide, PerformanceMetrics, RiskAnalytics, SizingRequest,
    TradeSignal,
};
use autotrade_signals::indicators::{atr, last};
use chrono::{TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Default)]
pub struct RiskGate {
    analytics: Option<Arc<dyn RiskAnalytics>>,
}

impl RiskGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables advanced sizing for bots that opt in with `advanced_sizing`.
    #[must_use]
    pub fn with_analytics(analytics: Arc<dyn RiskAnalytics>) -> Self {
        Self {
            analytics: Some(analytics),
        }
    }

    /// Computes the order amount for `side`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::RiskLimit` when the price is not positive, the daily loss
    /// limit is reached (BUY), there is nothing to sell (SELL), or the amount rounds to zero.
    pub fn size_order(
        &self,
        side: OrderSide,
        signal: &TradeSignal,
        ctx: &BotContext,
    ) -> Result<Decimal, EngineError> {
        let price = ctx.current_price;
        if price <= Decimal::ZERO {
            return Err(EngineError::risk_limit(format!("Invalid price {price}")));
        }
        let risk = &ctx.config.risk;

        let amount = match side {
            OrderSide::Buy => {
                self.check_daily_loss(ctx)?;
                let mut amount = risk_bounded_quantity(
                    ctx.quote_balance(),
                    risk.risk_per_trade,
                    price,
                    risk.max_position_size,
                )?;
                if let Some(requested) = signal.requested_amount {
                    amount = amount.min(requested);
                }
                if risk.advanced_sizing {
                    amount = self.apply_analytics(amount, ctx);
                }
                amount
            }
            OrderSide::Sell => {
                let held = ctx.base_balance();
                if held <= Decimal::ZERO {
                    return Err(EngineError::risk_limit(format!(
                        "No {} position to sell",
                        ctx.symbol()
                    )));
                }
                let mut amount = held.min(risk.max_position_size);
                if let Some(requested) = signal.requested_amount {
                    amount = amount.min(requested);
                }
                amount
            }
        };

        let amount = round_down(amount);
        if amount <= Decimal::ZERO {
            return Err(EngineError::risk_limit(format!(
                "Computed {side} amount is zero for {}",
                ctx.symbol()
            )));
        }
        debug!(side = %side, amount = %amount, price = %price, "Order sized");
        Ok(amount)
    }

    fn check_daily_loss(&self, ctx: &BotContext) -> Result<(), EngineError> {
        let limit = ctx.config.risk.max_daily_loss;
        if limit <= Decimal::ZERO {
            return Ok(());
        }
        let midnight = ctx.timestamp.date_naive().and_hms_opt(0, 0, 0).map_or(ctx.timestamp, |naive| {
            Utc.from_utc_datetime(&naive)
        });
        let realized = PerformanceMetrics::realized_since(&ctx.recent_trades, midnight);
        let loss = -realized;
        if loss >= limit {
            return Err(EngineError::risk_limit(format!(
                "Daily loss {loss} reached limit {limit}"
            )));
        }
        Ok(())
    }

    fn apply_analytics(&self, amount: Decimal, ctx: &BotContext) -> Decimal {
        let Some(analytics) = &self.analytics else {
            return amount;
        };
        let history = PerformanceMetrics::from_trades(&ctx.recent_trades);
        let price_f = ctx.current_price.to_f64().unwrap_or(0.0);
        let volatility = last(&atr(&ctx.candles, 14))
            .filter(|_| price_f > 0.0)
            .map_or(0.0, |value| value / price_f);

        let result = analytics.size_position(&SizingRequest {
            account_balance: ctx.quote_balance(),
            price: ctx.current_price,
            volatility,
            win_rate: history.win_rate,
            avg_win: history.average_win,
            avg_loss: history.average_loss,
        });
        for warning in &result.warnings {
            debug!(warning = %warning, "Risk analytics");
        }
        // Analytics without an opinion (zero) leaves the base size alone.
        if result.amount > Decimal::ZERO {
            amount.min(result.amount)
        } else {
            amount
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context;
    use autotrade_core::{SizingResult, StopLossDecision, StopLossRequest, TradeRecord};
    use rust_decimal_macros::dec;

    fn buy() -> TradeSignal {
        TradeSignal::new(1.0, 1.0, "test")
    }

    #[test]
    fn buy_is_bounded_by_balance_risk_and_max_position() {
        let gate = RiskGate::new();
        let balances = [dec!(0), dec!(1), dec!(250.5), dec!(10000), dec!(1234567.89)];
        let prices = [dec!(0.0001), dec!(1), dec!(3.3), dec!(45000), dec!(99999.99)];
        let risks = [0.001, 0.02, 0.3333, 1.0];
        let caps = [dec!(0.5), dec!(1), dec!(1000000)];

        for b in balances {
            for p in prices {
                for r in risks {
                    for cap in caps {
                        let mut ctx = context("grid", p, b, Decimal::ZERO);
                        ctx.config.risk.risk_per_trade = r;
                        ctx.config.risk.max_position_size = cap;
                        let r_dec = Decimal::try_from(r).unwrap();
                        match gate.size_order(OrderSide::Buy, &buy(), &ctx) {
                            Ok(a) => {
                                assert!(a > Decimal::ZERO);
                                assert!(a * p <= b * r_dec, "A*P > B*r for b={b} p={p} r={r}");
                                assert!(a <= cap);
                            }
                            Err(e) => assert!(matches!(e, EngineError::RiskLimit(_))),
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn buy_never_exceeds_requested_amount() {
        let gate = RiskGate::new();
        let ctx = context("grid", dec!(100), dec!(100000), Decimal::ZERO);
        let signal = buy().with_amount(dec!(0.25));
        assert_eq!(gate.size_order(OrderSide::Buy, &signal, &ctx).unwrap(), dec!(0.25));
    }

    #[test]
    fn zero_balance_buy_is_rejected() {
        let gate = RiskGate::new();
        let ctx = context("grid", dec!(100), Decimal::ZERO, Decimal::ZERO);
        assert!(matches!(
            gate.size_order(OrderSide::Buy, &buy(), &ctx),
            Err(EngineError::RiskLimit(_))
        ));
    }

    #[test]
    fn sell_requires_position_and_is_capped() {
        let gate = RiskGate::new();
        let flat = context("grid", dec!(100), dec!(1000), Decimal::ZERO);
        assert!(gate.size_order(OrderSide::Sell, &buy(), &flat).is_err());

        let holding = context("grid", dec!(100), dec!(1000), dec!(3));
        // max_position_size defaults to 1
        assert_eq!(gate.size_order(OrderSide::Sell, &buy(), &holding).unwrap(), dec!(1));
        let signal = buy().with_amount(dec!(0.4));
        assert_eq!(gate.size_order(OrderSide::Sell, &signal, &holding).unwrap(), dec!(0.4));
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let gate = RiskGate::new();
        let ctx = context("grid", Decimal::ZERO, dec!(1000), dec!(1));
        assert!(gate.size_order(OrderSide::Sell, &buy(), &ctx).is_err());
    }

    #[test]
    fn daily_loss_limit_blocks_buys() {
        let gate = RiskGate::new();
        let mut ctx = context("grid", dec!(100), dec!(10000), dec!(1));
        ctx.config.risk.max_daily_loss = dec!(50);
        let trade = |side, price| TradeRecord {
            id: "t".to_string(),
            bot_id: "bot-test".to_string(),
            symbol: "BTC/USDT".to_string(),
            side,
            amount: dec!(1),
            price,
            fee: Decimal::ZERO,
            order_id: "o".to_string(),
            timestamp: Utc::now(),
        };
        ctx.recent_trades = vec![trade(OrderSide::Buy, dec!(200)), trade(OrderSide::Sell, dec!(140))];

        assert!(matches!(
            gate.size_order(OrderSide::Buy, &buy(), &ctx),
            Err(EngineError::RiskLimit(_))
        ));
        // Selling is still allowed.
        assert!(gate.size_order(OrderSide::Sell, &buy(), &ctx).is_ok());
    }

    struct FixedAnalytics(Decimal);

    impl RiskAnalytics for FixedAnalytics {
        fn size_position(&self, _request: &SizingRequest) -> SizingResult {
            SizingResult {
                amount: self.0,
                confidence: 1.0,
                warnings: Vec::new(),
            }
        }

        fn stop_loss(&self, request: &StopLossRequest) -> StopLossDecision {
            StopLossDecision {
                stop_price: request.entry_price,
                should_exit: false,
            }
        }
    }

    #[test]
    fn analytics_only_shrinks() {
        let mut ctx = context("grid", dec!(100), dec!(10000), Decimal::ZERO);
        ctx.config.risk.advanced_sizing = true;

        let smaller = RiskGate::with_analytics(Arc::new(FixedAnalytics(dec!(0.1))));
        assert_eq!(smaller.size_order(OrderSide::Buy, &buy(), &ctx).unwrap(), dec!(0.1));

        // 10000 * 0.02 / 100 = 2, capped at max_position_size 1
        let larger = RiskGate::with_analytics(Arc::new(FixedAnalytics(dec!(50))));
        assert_eq!(larger.size_order(OrderSide::Buy, &buy(), &ctx).unwrap(), dec!(1));
    }
}
