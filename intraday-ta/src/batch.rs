//! Full recomputation of indicator series from raw bar history.
//!
//! Every value at bar `i` is derived from scratch using only bars `0..=i`, with two-pass
//! statistics instead of running accumulators. Used to audit the incremental
//! [`IndicatorEngine`](crate::engine::IndicatorEngine) path and to rebuild series offline.

use crate::indicator::{
    BandsOutput, INSUFFICIENT_HISTORY, IndicatorKind, IndicatorValue, MacdOutput, OVERFLOW,
    atr::true_range, finite, rsi::rsi_from_averages,
};
use intraday_instrument::PriceBar;

/// Recompute one indicator series over `bars`, aligned 1:1 with the input.
///
/// Bars with non-finite fields yield `ComputationOverflow` and are excluded from the history used
/// by later bars.
pub fn recompute(kind: &IndicatorKind, bars: &[PriceBar]) -> Vec<IndicatorValue> {
    let mut history = Vec::with_capacity(bars.len());
    bars.iter()
        .map(|bar| {
            if !bar.is_finite() {
                return OVERFLOW;
            }
            history.push(bar);
            value_at(kind, &history)
        })
        .collect()
}

fn value_at(kind: &IndicatorKind, history: &[&PriceBar]) -> IndicatorValue {
    if history.len() < kind.warm_up() {
        return INSUFFICIENT_HISTORY;
    }

    let closes = history.iter().map(|bar| bar.close).collect::<Vec<_>>();

    match *kind {
        IndicatorKind::Sma { period } => finite(mean(tail(&closes, period))),
        IndicatorKind::Ema { period } => match ema_series(&closes, period).last() {
            Some(&ema) => finite(ema),
            None => INSUFFICIENT_HISTORY,
        },
        IndicatorKind::Rsi { period } => {
            let window = tail(&closes, period + 1);
            let (gains, losses) = window.windows(2).fold((0.0, 0.0), |(gains, losses), pair| {
                let change = pair[1] - pair[0];
                (gains + change.max(0.0), losses + (-change).max(0.0))
            });
            finite(rsi_from_averages(gains / period as f64, losses / period as f64))
        }
        IndicatorKind::Macd { fast, slow, signal } => {
            let fast = ema_series(&closes, fast);
            let slow = ema_series(&closes, slow);
            let line = fast
                .iter()
                .zip(slow.iter())
                .map(|(fast, slow)| fast - slow)
                .collect::<Vec<_>>();
            let signal_series = ema_series(&line, signal);
            match (line.last(), signal_series.last()) {
                (Some(&line), Some(&signal)) if line.is_finite() && signal.is_finite() => {
                    IndicatorValue::Macd(MacdOutput {
                        line,
                        signal,
                        histogram: line - signal,
                    })
                }
                _ => OVERFLOW,
            }
        }
        IndicatorKind::Bollinger { period, std_dev } => {
            let window = tail(&closes, period);
            let middle = mean(window);
            let variance = window
                .iter()
                .map(|close| (close - middle).powi(2))
                .sum::<f64>()
                / (period as f64 - 1.0);
            let width = std_dev * variance.sqrt();
            let bands = BandsOutput {
                upper: middle + width,
                middle,
                lower: middle - width,
            };
            if bands.upper.is_finite() && bands.lower.is_finite() {
                IndicatorValue::Bands(bands)
            } else {
                OVERFLOW
            }
        }
        IndicatorKind::Vwap { period } => {
            let window = &history[history.len() - period..];
            let volume = window.iter().map(|bar| bar.volume).sum::<f64>();
            if volume <= 0.0 {
                return OVERFLOW;
            }
            let price_volume = window
                .iter()
                .map(|bar| bar.typical_price() * bar.volume)
                .sum::<f64>();
            finite(price_volume / volume)
        }
        IndicatorKind::Atr { period } => {
            let ranges = history
                .iter()
                .enumerate()
                .map(|(index, bar)| {
                    let prev_close = index.checked_sub(1).map(|prev| history[prev].close);
                    true_range(bar, prev_close)
                })
                .collect::<Vec<_>>();
            let period_f = period as f64;
            let seed = ranges[..period].iter().sum::<f64>() / period_f;
            finite(
                ranges[period..]
                    .iter()
                    .fold(seed, |atr, tr| (atr * (period_f - 1.0) + tr) / period_f),
            )
        }
    }
}

fn tail(values: &[f64], len: usize) -> &[f64] {
    &values[values.len().saturating_sub(len)..]
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Exponential moving average series seeded with the first value.
fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let k = 2.0 / (period as f64 + 1.0);
    let mut output: Vec<f64> = Vec::with_capacity(values.len());
    for &value in values {
        let next = match output.last() {
            Some(&prev) => k * value + (1.0 - k) * prev,
            None => value,
        };
        output.push(next);
    }
    output
}
