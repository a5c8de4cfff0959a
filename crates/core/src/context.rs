//! Per-tick snapshot handed to strategies.

use crate::bot_config::BotConfig;
use crate::market::{split_symbol, Candle};
use crate::orders::{OpenOrder, TradeRecord};
use crate::position::Position;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Read-only view of the bot's world at one tick. Built fresh every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotContext {
    pub config: BotConfig,
    /// Most recent candle last.
    pub candles: Vec<Candle>,
    pub current_price: Decimal,
    /// Asset -> free amount.
    pub balances: HashMap<String, Decimal>,
    pub positions: Vec<Position>,
    pub open_orders: Vec<OpenOrder>,
    pub recent_trades: Vec<TradeRecord>,
    pub timestamp: DateTime<Utc>,
}

impl BotContext {
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.config.market.symbol
    }

    #[must_use]
    pub fn free_balance(&self, asset: &str) -> Decimal {
        self.balances
            .get(&asset.to_ascii_uppercase())
            .or_else(|| self.balances.get(asset))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Free balance of the quote asset (what buys spend).
    #[must_use]
    pub fn quote_balance(&self) -> Decimal {
        split_symbol(self.symbol()).map_or(Decimal::ZERO, |(_, quote)| self.free_balance(&quote))
    }

    /// Free balance of the base asset (what sells spend).
    #[must_use]
    pub fn base_balance(&self) -> Decimal {
        split_symbol(self.symbol()).map_or(Decimal::ZERO, |(base, _)| self.free_balance(&base))
    }

    #[must_use]
    pub fn position(&self) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == self.config.market.symbol)
    }

    #[must_use]
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(Candle::close_f64).collect()
    }

    #[must_use]
    pub fn has_price(&self) -> bool {
        self.current_price > Decimal::ZERO
    }
}
