//! Declarative indicator and condition definitions carried in a bot's strategy descriptor.
//!
//! Evaluation lives in `autotrade-signals`; this module only defines the shapes.

use serde::{Deserialize, Serialize};

/// A named indicator computed over the tick's candle window.
///
/// Multi-output indicators publish their series under `name.field`
/// (`macd.signal`, `bb.upper`, `stoch.d`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub name: String,
    pub indicator: IndicatorKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndicatorKind {
    Sma {
        period: usize,
    },
    Ema {
        period: usize,
    },
    Rsi {
        period: usize,
    },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    BollingerBands {
        period: usize,
        std_dev: f64,
    },
    Atr {
        period: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Vwap,
}

/// Boolean condition tree over indicator comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionNode {
    And { conditions: Vec<ConditionNode> },
    Or { conditions: Vec<ConditionNode> },
    Not { condition: Box<ConditionNode> },
    Compare {
        left: Operand,
        operator: Comparison,
        right: Operand,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operand {
    /// Series published by an indicator, e.g. `rsi` or `bb.lower`.
    Indicator { name: String },
    /// Candle close prices.
    Price,
    Value { value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparison {
    GreaterThan,
    LessThan,
    /// Equal within an absolute epsilon.
    Equals,
    CrossAbove,
    CrossBelow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_tree_deserializes_from_json() {
        let json = serde_json::json!({
            "type": "AND",
            "conditions": [
                {
                    "type": "COMPARE",
                    "left": { "type": "INDICATOR", "name": "rsi" },
                    "operator": "LESS_THAN",
                    "right": { "type": "VALUE", "value": 30.0 }
                },
                {
                    "type": "NOT",
                    "condition": {
                        "type": "COMPARE",
                        "left": { "type": "PRICE" },
                        "operator": "CROSS_BELOW",
                        "right": { "type": "INDICATOR", "name": "bb.lower" }
                    }
                }
            ]
        });

        let node: ConditionNode = serde_json::from_value(json).unwrap();
        let ConditionNode::And { conditions } = node else {
            panic!("expected AND node");
        };
        assert_eq!(conditions.len(), 2);
        assert!(matches!(conditions[1], ConditionNode::Not { .. }));
    }

    #[test]
    fn indicator_config_uses_tagged_kind() {
        let json = serde_json::json!({
            "name": "macd",
            "indicator": { "type": "MACD", "fast": 12, "slow": 26, "signal": 9 }
        });
        let config: IndicatorConfig = serde_json::from_value(json).unwrap();
        assert_eq!(
            config.indicator,
            IndicatorKind::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
        );
    }
}
