use crate::{bar::PriceBar, instrument::InstrumentId};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

pub fn f64_is_eq(actual: f64, expected: f64, epsilon: f64) -> bool {
    if actual.is_nan() && expected.is_nan() {
        true
    } else if actual.is_infinite() && expected.is_infinite() {
        actual.is_sign_positive() == expected.is_sign_positive()
    } else if actual.is_nan()
        || expected.is_nan()
        || actual.is_infinite()
        || expected.is_infinite()
    {
        false
    } else {
        (actual - expected).abs() < epsilon
    }
}

/// Fixed session open used as the base time of test bar sequences (2024-01-02 09:15 UTC).
pub fn session_open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 9, 15, 0).unwrap()
}

pub fn time_plus_mins(base: DateTime<Utc>, plus: i64) -> DateTime<Utc> {
    base.checked_add_signed(TimeDelta::minutes(plus)).unwrap()
}

pub fn bar(
    instrument: &str,
    time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
) -> PriceBar {
    PriceBar {
        instrument: InstrumentId::new(instrument),
        time,
        open,
        high,
        low,
        close,
        volume,
    }
}

/// Bar at `session_open() + index` minutes with open=high=low=close=`price`.
pub fn flat_bar(instrument: &str, index: i64, price: f64, volume: f64) -> PriceBar {
    bar(
        instrument,
        time_plus_mins(session_open(), index),
        price,
        price,
        price,
        price,
        volume,
    )
}

/// One-minute bars built from a close series: each bar opens at the previous close and its
/// high/low wrap the body by `wick`.
pub fn bars_from_closes(instrument: &str, closes: &[f64], wick: f64) -> Vec<PriceBar> {
    let mut prev_close = closes.first().copied().unwrap_or_default();
    closes
        .iter()
        .enumerate()
        .map(|(index, &close)| {
            let open = prev_close;
            prev_close = close;
            bar(
                instrument,
                time_plus_mins(session_open(), index as i64),
                open,
                open.max(close) + wick,
                open.min(close) - wick,
                close,
                1_000.0 + index as f64,
            )
        })
        .collect()
}
