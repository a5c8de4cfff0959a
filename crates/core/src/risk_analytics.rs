//! Kelly-criterion sizing and ATR stops behind the `RiskAnalytics` interface.
//!
//! Continuous-outcome Kelly with win rate `W` and payoff ratio `R = avg_win / avg_loss`:
//! ```text
//! f* = W - (1 - W) / R
//! ```
//! A fraction of `f*` is used, then scaled down when volatility exceeds the target.

use crate::orders::OrderSide;
use crate::traits::RiskAnalytics;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingRequest {
    /// Quote-asset balance available for the trade.
    pub account_balance: Decimal,
    pub price: Decimal,
    /// Recent volatility as a fraction of price (e.g. ATR / price).
    pub volatility: f64,
    /// Historical win rate in [0, 1].
    pub win_rate: f64,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingResult {
    /// Base-asset amount.
    pub amount: Decimal,
    pub confidence: f64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLossRequest {
    pub entry_price: Decimal,
    pub current_price: Decimal,
    /// Side of the open position.
    pub side: OrderSide,
    pub atr: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLossDecision {
    pub stop_price: Decimal,
    pub should_exit: bool,
}

/// Fractional Kelly sizer with volatility targeting and ATR-multiple stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KellyRiskAnalytics {
    /// Fraction of Kelly to use (0.25 = quarter Kelly)
    pub fraction: f64,
    /// Hard cap on the fraction of balance committed
    pub max_fraction: f64,
    /// Volatility above which size is scaled down proportionally
    pub target_volatility: f64,
    /// Stop distance in ATRs
    pub atr_multiplier: f64,
    /// Stop distance as a fraction of entry when no ATR is available
    pub fallback_stop_pct: f64,
}

impl Default for KellyRiskAnalytics {
    fn default() -> Self {
        Self {
            fraction: 0.25,
            max_fraction: 0.20,
            target_volatility: 0.02,
            atr_multiplier: 2.0,
            fallback_stop_pct: 0.05,
        }
    }
}

impl KellyRiskAnalytics {
    /// Full Kelly fraction; `None` when inputs are unusable.
    #[must_use]
    pub fn full_kelly(win_rate: f64, avg_win: Decimal, avg_loss: Decimal) -> Option<f64> {
        if !(0.0..=1.0).contains(&win_rate) || avg_win <= Decimal::ZERO || avg_loss <= Decimal::ZERO
        {
            return None;
        }
        let payoff = (avg_win / avg_loss).to_f64()?;
        Some(win_rate - (1.0 - win_rate) / payoff)
    }
}

impl RiskAnalytics for KellyRiskAnalytics {
    fn size_position(&self, request: &SizingRequest) -> SizingResult {
        let mut warnings = Vec::new();

        if request.price <= Decimal::ZERO || request.account_balance <= Decimal::ZERO {
            warnings.push("Balance and price must be positive".to_string());
            return SizingResult {
                amount: Decimal::ZERO,
                confidence: 0.0,
                warnings,
            };
        }

        let Some(full_kelly) =
            Self::full_kelly(request.win_rate, request.avg_win, request.avg_loss)
        else {
            warnings.push("Insufficient trade history for Kelly sizing".to_string());
            return SizingResult {
                amount: Decimal::ZERO,
                confidence: 0.0,
                warnings,
            };
        };

        if full_kelly <= 0.0 {
            warnings.push(format!("No statistical edge (kelly={full_kelly:.4})"));
            return SizingResult {
                amount: Decimal::ZERO,
                confidence: 0.0,
                warnings,
            };
        }

        let mut fraction = full_kelly * self.fraction;
        let mut confidence = 1.0;
        if request.volatility > self.target_volatility && request.volatility > 0.0 {
            let scale = self.target_volatility / request.volatility;
            fraction *= scale;
            confidence = scale;
            warnings.push(format!(
                "Volatility {:.4} above target {:.4}, size scaled by {scale:.2}",
                request.volatility, self.target_volatility
            ));
        }
        if fraction > self.max_fraction {
            fraction = self.max_fraction;
            warnings.push(format!("Capped at max fraction {:.2}", self.max_fraction));
        }

        let amount = Decimal::from_f64(fraction)
            .map(|f| (request.account_balance * f / request.price).round_dp(8))
            .unwrap_or(Decimal::ZERO);

        SizingResult {
            amount,
            confidence,
            warnings,
        }
    }

    fn stop_loss(&self, request: &StopLossRequest) -> StopLossDecision {
        let entry = request.entry_price;
        let distance = request
            .atr
            .filter(|atr| *atr > 0.0)
            .and_then(|atr| Decimal::from_f64(atr * self.atr_multiplier))
            .or_else(|| Decimal::from_f64(self.fallback_stop_pct).map(|pct| entry * pct))
            .unwrap_or(Decimal::ZERO);

        match request.side {
            OrderSide::Buy => {
                let stop_price = (entry - distance).max(Decimal::ZERO);
                StopLossDecision {
                    stop_price,
                    should_exit: request.current_price <= stop_price,
                }
            }
            OrderSide::Sell => {
                let stop_price = entry + distance;
                StopLossDecision {
                    stop_price,
                    should_exit: request.current_price >= stop_price,
                }
            }
        }
    }
}
