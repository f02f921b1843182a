use analysis_core::types::{
    CandleClass, PriceBar, PriceDirection, VolumeClass, VolumeDirection, VolumePoint,
};
use analysis_core::{Parameters, ProcessedData};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Deterministic daily timestamp for bar `i`.
pub(crate) fn ts(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i as i64)
}

pub(crate) fn price_bars(rows: &[(f64, f64, f64, f64)]) -> Vec<PriceBar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| PriceBar {
            timestamp: ts(i),
            open,
            high,
            low,
            close,
        })
        .collect()
}

pub(crate) fn volume_points(values: &[f64]) -> Vec<VolumePoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &volume)| VolumePoint { timestamp: ts(i), volume })
        .collect()
}

/// Parameters with short windows so fixtures stay readable.
pub(crate) fn small_params() -> Parameters {
    let mut p = Parameters::default();
    p.lookback_period = 5;
    p.atr_period = 3;
    p.vol_lookback = 5;
    p.swing_n = 2;
    p.pattern_window = 10;
    p.pivot_window = 2;
    p.validated().unwrap()
}

/// A hand-buildable processed bundle with neutral defaults everywhere;
/// tests overwrite the columns they exercise.
pub(crate) fn flat_processed(n: usize, price: f64, volume: f64) -> ProcessedData {
    ProcessedData {
        timestamps: (0..n).map(ts).collect(),
        open: vec![price; n],
        high: vec![price; n],
        low: vec![price; n],
        close: vec![price; n],
        volume: vec![volume; n],
        spread: vec![0.0; n],
        body_percent: vec![0.0; n],
        upper_wick: vec![0.0; n],
        lower_wick: vec![0.0; n],
        avg_volume: vec![volume; n],
        avg_spread: vec![0.0; n],
        volume_ratio: vec![1.0; n],
        atr: vec![0.0; n],
        obv: vec![0.0; n],
        volume_class: vec![VolumeClass::Average; n],
        candle_class: vec![CandleClass::Neutral; n],
        price_direction: vec![PriceDirection::Sideways; n],
        volume_direction: vec![VolumeDirection::Flat; n],
    }
}
