//! Named indicator series computed for one tick.
//!
//! The registry maps the names declared in a bot's indicator list to computed
//! series. Multi-output indicators register one series per output under
//! `name.field`, with the primary output also available under the bare name.

use std::collections::HashMap;

use autotrade_core::{Candle, IndicatorConfig, IndicatorKind};

use crate::indicators::{self, Series};

#[derive(Debug, Default, Clone)]
pub struct IndicatorRegistry {
    series: HashMap<String, Series>,
}

impl IndicatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
        }
    }

    /// Computes every configured indicator over `candles`.
    #[must_use]
    pub fn compute(configs: &[IndicatorConfig], candles: &[Candle]) -> Self {
        let closes: Vec<f64> = candles.iter().map(Candle::close_f64).collect();
        let mut registry = Self::new();
        registry.register("price", closes.iter().copied().map(Some).collect());

        for config in configs {
            let name = config.name.as_str();
            match &config.indicator {
                IndicatorKind::Sma { period } => registry.register(name, indicators::sma(&closes, *period)),
                IndicatorKind::Ema { period } => registry.register(name, indicators::ema(&closes, *period)),
                IndicatorKind::Rsi { period } => registry.register(name, indicators::rsi(&closes, *period)),
                IndicatorKind::Macd { fast, slow, signal } => {
                    let out = indicators::macd(&closes, *fast, *slow, *signal);
                    registry.register(name, out.macd.clone());
                    registry.register_field(name, "macd", out.macd);
                    registry.register_field(name, "signal", out.signal);
                    registry.register_field(name, "histogram", out.histogram);
                }
                IndicatorKind::BollingerBands { period, std_dev } => {
                    let out = indicators::bollinger(&closes, *period, *std_dev);
                    registry.register(name, out.middle.clone());
                    registry.register_field(name, "upper", out.upper);
                    registry.register_field(name, "middle", out.middle);
                    registry.register_field(name, "lower", out.lower);
                }
                IndicatorKind::Atr { period } => registry.register(name, indicators::atr(candles, *period)),
                IndicatorKind::Stochastic { k_period, d_period } => {
                    let out = indicators::stochastic(candles, *k_period, *d_period);
                    registry.register(name, out.k.clone());
                    registry.register_field(name, "k", out.k);
                    registry.register_field(name, "d", out.d);
                }
                IndicatorKind::Vwap => registry.register(name, indicators::vwap(candles)),
            }
        }

        registry
    }

    /// Registers a series. An existing series with the same name is replaced.
    pub fn register(&mut self, name: &str, series: Series) {
        self.series.insert(name.to_string(), series);
    }

    fn register_field(&mut self, name: &str, field: &str, series: Series) {
        self.series.insert(format!("{name}.{field}"), series);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Series> {
        self.series.get(name)
    }

    /// Most recent value of a series, if defined.
    #[must_use]
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(indicators::last)
    }

    /// Value one bar before the most recent.
    #[must_use]
    pub fn previous(&self, name: &str) -> Option<f64> {
        let series = self.get(name)?;
        let len = series.len();
        if len < 2 {
            return None;
        }
        series[len - 2]
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn candles(closes: &[i64]) -> Vec<Candle> {
        closes
            .iter()
            .map(|c| Candle::flat(Utc::now(), Decimal::from(*c), Decimal::ONE))
            .collect()
    }

    #[test]
    fn computes_named_series() {
        let configs = vec![
            IndicatorConfig {
                name: "fast".to_string(),
                indicator: IndicatorKind::Sma { period: 2 },
            },
            IndicatorConfig {
                name: "bb".to_string(),
                indicator: IndicatorKind::BollingerBands {
                    period: 3,
                    std_dev: 2.0,
                },
            },
        ];
        let registry = IndicatorRegistry::compute(&configs, &candles(&[1, 2, 3, 4]));

        assert_eq!(registry.latest("fast"), Some(3.5));
        assert_eq!(registry.previous("fast"), Some(2.5));
        assert!(registry.contains("bb.upper"));
        assert!(registry.contains("bb.lower"));
        assert_eq!(registry.latest("bb"), Some(3.0));
        assert_eq!(registry.latest("price"), Some(4.0));
    }

    #[test]
    fn unknown_name_is_none() {
        let registry = IndicatorRegistry::compute(&[], &candles(&[1]));
        assert_eq!(registry.latest("missing"), None);
        assert_eq!(registry.previous("price"), None);
        assert_eq!(registry.len(), 1);
    }
}
