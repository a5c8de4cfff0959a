//! Per-bot configuration as persisted by the store and snapshotted by the registry.

use crate::error::EngineError;
use crate::orders::{OrderType, TimeInForce};
use crate::rules::{ConditionNode, IndicatorConfig};
use crate::strategy_kind::StrategyKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub type StrategyParameters = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub strategy: StrategyDescriptor,
    pub market: MarketDescriptor,
    #[serde(default)]
    pub risk: RiskManagement,
    #[serde(default)]
    pub execution: ExecutionPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    pub strategy_type: String,
    #[serde(default)]
    pub parameters: StrategyParameters,
    #[serde(default)]
    pub indicators: Vec<IndicatorConfig>,
    #[serde(default)]
    pub conditions: Option<ConditionNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDescriptor {
    /// Trading pair, e.g. `BTC/USDT`.
    pub symbol: String,
    pub exchange_account_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskManagement {
    /// Maximum order size in base-asset units.
    #[serde(default = "default_max_position_size")]
    pub max_position_size: Decimal,
    /// Realized loss (quote units) per UTC day after which buys are rejected. Zero disables.
    #[serde(default)]
    pub max_daily_loss: Decimal,
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,
    #[serde(default = "default_max_leverage")]
    pub max_leverage: u8,
    /// Fraction of available balance committed per trade, in (0, 1].
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade: f64,
    /// Consult the risk-analytics collaborator when sizing.
    #[serde(default)]
    pub advanced_sizing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    #[serde(default = "default_slippage_tolerance")]
    pub slippage_tolerance: f64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

const fn default_enabled() -> bool {
    true
}

fn default_max_position_size() -> Decimal {
    Decimal::ONE
}

const fn default_stop_loss_pct() -> f64 {
    0.05
}

const fn default_take_profit_pct() -> f64 {
    0.10
}

const fn default_max_leverage() -> u8 {
    1
}

const fn default_risk_per_trade() -> f64 {
    0.02
}

const fn default_slippage_tolerance() -> f64 {
    0.005
}

const fn default_retry_attempts() -> u32 {
    3
}

const fn default_cooldown_secs() -> u64 {
    60
}

impl Default for RiskManagement {
    fn default() -> Self {
        Self {
            max_position_size: default_max_position_size(),
            max_daily_loss: Decimal::ZERO,
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            max_leverage: default_max_leverage(),
            risk_per_trade: default_risk_per_trade(),
            advanced_sizing: false,
        }
    }
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            order_type: OrderType::default(),
            time_in_force: TimeInForce::default(),
            slippage_tolerance: default_slippage_tolerance(),
            retry_attempts: default_retry_attempts(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl ExecutionPolicy {
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl BotConfig {
    /// Validates the configuration and resolves the strategy kind.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` describing the first violated rule.
    pub fn validate(&self) -> Result<StrategyKind, EngineError> {
        if self.id.trim().is_empty() {
            return Err(EngineError::configuration("Bot id is required"));
        }
        if self.market.symbol.trim().is_empty() {
            return Err(EngineError::configuration(format!(
                "Bot {} has no market symbol",
                self.id
            )));
        }
        if self.market.exchange_account_id.trim().is_empty() {
            return Err(EngineError::configuration(format!(
                "Bot {} has no exchange account",
                self.id
            )));
        }
        if self.strategy.strategy_type.trim().is_empty() {
            return Err(EngineError::configuration(format!(
                "Bot {} has no strategy type",
                self.id
            )));
        }
        let kind: StrategyKind = self.strategy.strategy_type.parse()?;

        let risk = &self.risk;
        if risk.max_position_size <= Decimal::ZERO {
            return Err(EngineError::configuration(
                "max_position_size must be positive",
            ));
        }
        if !(risk.risk_per_trade > 0.0 && risk.risk_per_trade <= 1.0) {
            return Err(EngineError::configuration(format!(
                "risk_per_trade must be in (0, 1], got {}",
                risk.risk_per_trade
            )));
        }
        if risk.max_daily_loss < Decimal::ZERO {
            return Err(EngineError::configuration(
                "max_daily_loss cannot be negative",
            ));
        }
        if risk.stop_loss_pct < 0.0 || risk.take_profit_pct < 0.0 {
            return Err(EngineError::configuration(
                "stop_loss_pct and take_profit_pct cannot be negative",
            ));
        }
        if risk.max_leverage == 0 {
            return Err(EngineError::configuration("max_leverage must be at least 1"));
        }

        let execution = &self.execution;
        if execution.retry_attempts == 0 {
            return Err(EngineError::configuration(
                "retry_attempts must be at least 1",
            ));
        }
        if execution.cooldown_secs == 0 {
            return Err(EngineError::configuration("cooldown_secs must be positive"));
        }
        if execution.slippage_tolerance < 0.0 {
            return Err(EngineError::configuration(
                "slippage_tolerance cannot be negative",
            ));
        }

        Ok(kind)
    }

    /// Merges a partial update into this configuration.
    ///
    /// Strategy parameters are merged key by key; every other field is replaced when present.
    pub fn apply_patch(&mut self, patch: BotConfigPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(strategy_type) = patch.strategy_type {
            self.strategy.strategy_type = strategy_type;
        }
        if let Some(parameters) = patch.parameters {
            self.strategy.parameters.extend(parameters);
        }
        if let Some(indicators) = patch.indicators {
            self.strategy.indicators = indicators;
        }
        if let Some(conditions) = patch.conditions {
            self.strategy.conditions = Some(conditions);
        }
        if let Some(symbol) = patch.symbol {
            self.market.symbol = symbol;
        }
        if let Some(account) = patch.exchange_account_id {
            self.market.exchange_account_id = account;
        }
        if let Some(risk) = patch.risk {
            self.risk = risk;
        }
        if let Some(execution) = patch.execution {
            self.execution = execution;
        }
    }
}

/// Partial configuration update accepted by `update_config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotConfigPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub strategy_type: Option<String>,
    #[serde(default)]
    pub parameters: Option<StrategyParameters>,
    #[serde(default)]
    pub indicators: Option<Vec<IndicatorConfig>>,
    #[serde(default)]
    pub conditions: Option<ConditionNode>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub exchange_account_id: Option<String>,
    #[serde(default)]
    pub risk: Option<RiskManagement>,
    #[serde(default)]
    pub execution: Option<ExecutionPolicy>,
}
