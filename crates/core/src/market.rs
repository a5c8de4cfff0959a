use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Flat candle at a single price, handy for feeds that only report trades.
    #[must_use]
    pub fn flat(timestamp: DateTime<Utc>, price: Decimal, volume: Decimal) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    #[must_use]
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }

    #[must_use]
    pub fn typical_price_f64(&self) -> f64 {
        let sum = self.high + self.low + self.close;
        (sum / Decimal::from(3)).to_f64().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Ticker {
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

/// Splits a trading pair into `(base, quote)`.
///
/// Accepts `BTC/USDT`, `BTC-USDT`, `BTC_USDT`, and concatenated forms such as `BTCUSDT`
/// when the quote is a well-known asset.
#[must_use]
pub fn split_symbol(symbol: &str) -> Option<(String, String)> {
    const KNOWN_QUOTES: [&str; 8] = ["USDT", "USDC", "BUSD", "FDUSD", "USD", "EUR", "BTC", "ETH"];

    let upper = symbol.trim().to_ascii_uppercase();
    if let Some((base, quote)) = upper.split_once(['/', '-', '_']) {
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        return Some((base.to_string(), quote.to_string()));
    }

    KNOWN_QUOTES.iter().find_map(|quote| {
        upper
            .strip_suffix(quote)
            .filter(|base| !base.is_empty())
            .map(|base| (base.to_string(), (*quote).to_string()))
    })
}
