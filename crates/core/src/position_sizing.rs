use crate::error::EngineError;
use rust_decimal::{Decimal, RoundingStrategy};

/// Risk-bounded order quantity.
///
/// `available_balance × risk_per_trade ÷ price`, capped at `max_position_size`, rounded down
/// to 8 decimal places.
///
/// # Arguments
/// * `available_balance` - Free quote-asset balance
/// * `risk_per_trade` - Fraction of the balance to commit (0.0-1.0]
/// * `price` - Current price of the base asset
/// * `max_position_size` - Cap in base-asset units
///
/// # Errors
/// Returns `EngineError::RiskLimit` if the price or risk fraction is invalid.
pub fn risk_bounded_quantity(
    available_balance: Decimal,
    risk_per_trade: f64,
    price: Decimal,
    max_position_size: Decimal,
) -> Result<Decimal, EngineError> {
    if price <= Decimal::ZERO {
        return Err(EngineError::risk_limit("Price must be positive"));
    }
    if !(risk_per_trade > 0.0 && risk_per_trade <= 1.0) {
        return Err(EngineError::risk_limit(format!(
            "risk_per_trade must be in (0, 1], got {risk_per_trade}"
        )));
    }

    let risk = Decimal::try_from(risk_per_trade)
        .map_err(|e| EngineError::risk_limit(format!("Invalid risk_per_trade: {e}")))?;

    let budget = available_balance.max(Decimal::ZERO) * risk;
    let quantity = (budget / price).min(max_position_size.max(Decimal::ZERO));

    Ok(round_down(quantity))
}

/// Truncates to 8 decimal places, the usual crypto lot precision.
#[must_use]
pub fn round_down(quantity: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(8, RoundingStrategy::ToZero)
}
