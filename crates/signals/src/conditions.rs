//! Evaluation of declarative condition trees.

use anyhow::{bail, Result};
use autotrade_core::{Comparison, ConditionNode, Operand};

use crate::registry::IndicatorRegistry;

const EQUALS_EPSILON: f64 = 1e-9;

/// Evaluates a condition tree against the latest bar.
///
/// Comparisons whose operands are not defined yet (warm-up) evaluate to `false`.
///
/// # Errors
///
/// Returns an error when an operand references an indicator that was never configured.
pub fn evaluate(node: &ConditionNode, registry: &IndicatorRegistry) -> Result<bool> {
    match node {
        ConditionNode::And { conditions } => {
            for condition in conditions {
                if !evaluate(condition, registry)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        ConditionNode::Or { conditions } => {
            for condition in conditions {
                if evaluate(condition, registry)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        ConditionNode::Not { condition } => Ok(!evaluate(condition, registry)?),
        ConditionNode::Compare {
            left,
            operator,
            right,
        } => compare(left, *operator, right, registry),
    }
}

/// Checks that every indicator operand in the tree names a configured series.
///
/// # Errors
///
/// Returns an error naming the first unknown indicator.
pub fn check_references(node: &ConditionNode, known: &dyn Fn(&str) -> bool) -> Result<()> {
    match node {
        ConditionNode::And { conditions } | ConditionNode::Or { conditions } => conditions
            .iter()
            .try_for_each(|condition| check_references(condition, known)),
        ConditionNode::Not { condition } => check_references(condition, known),
        ConditionNode::Compare { left, right, .. } => {
            for operand in [left, right] {
                if let Operand::Indicator { name } = operand {
                    if !known(name) {
                        bail!("Condition references unknown indicator '{name}'");
                    }
                }
            }
            Ok(())
        }
    }
}

fn operand_values(operand: &Operand, registry: &IndicatorRegistry) -> Result<(Option<f64>, Option<f64>)> {
    match operand {
        Operand::Value { value } => Ok((Some(*value), Some(*value))),
        Operand::Price => Ok((registry.latest("price"), registry.previous("price"))),
        Operand::Indicator { name } => {
            if !registry.contains(name) {
                bail!("Condition references unknown indicator '{name}'");
            }
            Ok((registry.latest(name), registry.previous(name)))
        }
    }
}

fn compare(
    left: &Operand,
    operator: Comparison,
    right: &Operand,
    registry: &IndicatorRegistry,
) -> Result<bool> {
    let (left_now, left_prev) = operand_values(left, registry)?;
    let (right_now, right_prev) = operand_values(right, registry)?;

    let (Some(l), Some(r)) = (left_now, right_now) else {
        return Ok(false);
    };

    let result = match operator {
        Comparison::GreaterThan => l > r,
        Comparison::LessThan => l < r,
        Comparison::Equals => (l - r).abs() < EQUALS_EPSILON,
        Comparison::CrossAbove => match (left_prev, right_prev) {
            (Some(lp), Some(rp)) => lp <= rp && l > r,
            _ => false,
        },
        Comparison::CrossBelow => match (left_prev, right_prev) {
            (Some(lp), Some(rp)) => lp >= rp && l < r,
            _ => false,
        },
    };

    Ok(result)
}
