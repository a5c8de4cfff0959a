//! Indicator math over price series.
//!
//! Every function returns a series aligned with its input: index `i` of the output
//! describes the window ending at input index `i`, and is `None` until enough
//! history exists.

use autotrade_core::Candle;
use rust_decimal::prelude::ToPrimitive;

pub type Series = Vec<Option<f64>>;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Series,
    pub signal: Series,
    pub histogram: Series,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticSeries {
    pub k: Series,
    pub d: Series,
}

/// Simple moving average.
#[must_use]
pub fn sma(values: &[f64], period: usize) -> Series {
    if period == 0 {
        return vec![None; values.len()];
    }
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= period {
            sum -= values[i - period];
        }
        out.push((i + 1 >= period).then(|| sum / period as f64));
    }
    out
}

/// Exponential moving average, seeded with the SMA of the first `period` values.
#[must_use]
pub fn ema(values: &[f64], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(prev);
    for i in period..values.len() {
        prev = (values[i] - prev).mul_add(k, prev);
        out[i] = Some(prev);
    }
    out
}

/// EMA over a series that has a `None` prefix.
fn ema_of_series(series: &Series, period: usize) -> Series {
    let start = series.iter().position(Option::is_some).unwrap_or(series.len());
    let defined: Vec<f64> = series[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
    let mut out = vec![None; start];
    out.extend(ema(&defined, period));
    out
}

/// Relative strength index with Wilder smoothing.
#[must_use]
pub fn rsi(values: &[f64], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    let n = period as f64;
    for i in (period + 1)..values.len() {
        let change = values[i] - values[i - 1];
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        avg_gain = avg_gain.mul_add(n - 1.0, gain) / n;
        avg_loss = avg_loss.mul_add(n - 1.0, loss) / n;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[must_use]
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let macd: Series = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = ema_of_series(&macd, signal);
    let histogram = macd
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| Some((*m)? - (*s)?))
        .collect();

    MacdSeries {
        macd,
        signal: signal_line,
        histogram,
    }
}

/// Bollinger bands using population standard deviation.
#[must_use]
pub fn bollinger(values: &[f64], period: usize, std_dev: f64) -> BollingerSeries {
    let middle = sma(values, period);
    let mut upper = vec![None; values.len()];
    let mut lower = vec![None; values.len()];

    for (i, mean) in middle.iter().enumerate() {
        let Some(mean) = *mean else { continue };
        let window = &values[i + 1 - period..=i];
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        let band = variance.sqrt() * std_dev;
        upper[i] = Some(mean + band);
        lower[i] = Some(mean - band);
    }

    BollingerSeries {
        upper,
        middle,
        lower,
    }
}

fn hlc(candle: &Candle) -> (f64, f64, f64) {
    (
        candle.high.to_f64().unwrap_or(0.0),
        candle.low.to_f64().unwrap_or(0.0),
        candle.close_f64(),
    )
}

/// Average true range with Wilder smoothing.
#[must_use]
pub fn atr(candles: &[Candle], period: usize) -> Series {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() < period {
        return out;
    }

    let true_ranges: Vec<f64> = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let (high, low, _) = hlc(candle);
            if i == 0 {
                high - low
            } else {
                let (_, _, prev_close) = hlc(&candles[i - 1]);
                (high - low)
                    .max((high - prev_close).abs())
                    .max((low - prev_close).abs())
            }
        })
        .collect();

    let n = period as f64;
    let mut prev = true_ranges[..period].iter().sum::<f64>() / n;
    out[period - 1] = Some(prev);
    for i in period..candles.len() {
        prev = prev.mul_add(n - 1.0, true_ranges[i]) / n;
        out[i] = Some(prev);
    }
    out
}

/// Stochastic oscillator: `%K` over `k_period`, `%D` as SMA of `%K`.
#[must_use]
pub fn stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> StochasticSeries {
    let mut k = vec![None; candles.len()];
    if k_period > 0 {
        for i in (k_period.saturating_sub(1))..candles.len() {
            let window = &candles[i + 1 - k_period..=i];
            let (mut highest, mut lowest) = (f64::MIN, f64::MAX);
            for candle in window {
                let (high, low, _) = hlc(candle);
                highest = highest.max(high);
                lowest = lowest.min(low);
            }
            let close = candles[i].close_f64();
            let range = highest - lowest;
            k[i] = Some(if range > 0.0 {
                (close - lowest) / range * 100.0
            } else {
                50.0
            });
        }
    }

    let start = k.iter().position(Option::is_some).unwrap_or(k.len());
    let defined: Vec<f64> = k[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
    let mut d = vec![None; start];
    d.extend(sma(&defined, d_period));

    StochasticSeries { k, d }
}

/// Cumulative volume-weighted average of typical price.
#[must_use]
pub fn vwap(candles: &[Candle]) -> Series {
    let mut cumulative_pv = 0.0;
    let mut cumulative_volume = 0.0;
    candles
        .iter()
        .map(|candle| {
            let volume = candle.volume.to_f64().unwrap_or(0.0);
            cumulative_pv += candle.typical_price_f64() * volume;
            cumulative_volume += volume;
            (cumulative_volume > 0.0).then(|| cumulative_pv / cumulative_volume)
        })
        .collect()
}

/// Last defined value of a series.
#[must_use]
pub fn last(series: &Series) -> Option<f64> {
    series.last().copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(high: Decimal, low: Decimal, close: Decimal, volume: Decimal) -> Candle {
        Candle {
            timestamp: Utc::now(),
            open: close,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn sma_aligns_with_input() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn ema_seeds_with_sma() {
        let out = ema(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(4.0));
        // k = 0.5 -> 4 + (8 - 4) * 0.5
        assert!((out[3].unwrap() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_extremes() {
        let rising: Vec<f64> = (0..20).map(f64::from).collect();
        assert_eq!(last(&rsi(&rising, 14)), Some(100.0));

        let falling: Vec<f64> = (0..20).rev().map(f64::from).collect();
        assert!(last(&rsi(&falling, 14)).unwrap() < 1e-9);

        let flat = vec![5.0; 20];
        assert_eq!(last(&rsi(&flat, 14)), Some(50.0));
    }

    #[test]
    fn rsi_needs_period_plus_one_values() {
        let values: Vec<f64> = (0..14).map(f64::from).collect();
        assert!(rsi(&values, 14).iter().all(Option::is_none));
    }

    #[test]
    fn macd_of_flat_series_is_zero() {
        let values = vec![10.0; 40];
        let out = macd(&values, 12, 26, 9);
        assert_eq!(last(&out.macd), Some(0.0));
        assert_eq!(last(&out.signal), Some(0.0));
        assert_eq!(last(&out.histogram), Some(0.0));
        assert_eq!(out.macd[24], None);
        assert!(out.signal[33].is_some());
    }

    #[test]
    fn bollinger_bands_surround_mean() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let out = bollinger(&values, 5, 2.0);
        let middle = last(&out.middle).unwrap();
        let upper = last(&out.upper).unwrap();
        let lower = last(&out.lower).unwrap();
        assert!((middle - 3.0).abs() < 1e-9);
        // population std dev of 1..5 is sqrt(2)
        assert!((upper - (3.0 + 2.0 * 2f64.sqrt())).abs() < 1e-9);
        assert!((lower - (3.0 - 2.0 * 2f64.sqrt())).abs() < 1e-9);
    }

    #[test]
    fn atr_of_constant_range() {
        let candles: Vec<Candle> = (0..10)
            .map(|_| candle(dec!(11), dec!(9), dec!(10), dec!(1)))
            .collect();
        let out = atr(&candles, 5);
        assert_eq!(out[3], None);
        assert!((last(&out).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn stochastic_at_top_of_range() {
        let candles = vec![
            candle(dec!(10), dec!(5), dec!(6), dec!(1)),
            candle(dec!(12), dec!(6), dec!(8), dec!(1)),
            candle(dec!(15), dec!(7), dec!(15), dec!(1)),
        ];
        let out = stochastic(&candles, 3, 1);
        assert_eq!(last(&out.k), Some(100.0));
        assert_eq!(last(&out.d), Some(100.0));
    }

    #[test]
    fn vwap_weights_by_volume() {
        let candles = vec![
            candle(dec!(10), dec!(10), dec!(10), dec!(1)),
            candle(dec!(20), dec!(20), dec!(20), dec!(3)),
        ];
        let out = vwap(&candles);
        assert!((last(&out).unwrap() - 17.5).abs() < 1e-9);
    }
}
