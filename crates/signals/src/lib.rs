//! Technical indicators and rule evaluation.
//!
//! Indicators work on `f64` series derived from candles; money amounts stay
//! `Decimal` in the core crate.

pub mod conditions;
pub mod indicators;
pub mod registry;

pub use conditions::{check_references, evaluate};
pub use indicators::{BollingerSeries, MacdSeries, Series, StochasticSeries};
pub use registry::IndicatorRegistry;
