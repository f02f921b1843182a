use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use analysis_core::types::{
    CandleClass, PriceBar, PriceDirection, VolumeClass, VolumeDirection, VolumePoint, EPSILON,
};
use analysis_core::{AnalysisError, Parameters, ProcessedData};

use crate::rolling::{ema, rolling_mean};

/// Aligns price and volume series and derives the per-bar feature bundle
/// every downstream analyzer consumes.
#[derive(Debug)]
pub struct Processor {
    params: Arc<Parameters>,
}

impl Processor {
    pub fn new(params: Arc<Parameters>) -> Self {
        Self { params }
    }

    /// Inner-join price and volume on timestamp, then derive all columns.
    ///
    /// Fails with `DataIntegrity` on duplicate timestamps, non-finite or
    /// non-positive prices, or negative volumes, and with
    /// `InsufficientData` when the aligned series is shorter than the
    /// configured minimum.
    pub fn preprocess(
        &self,
        price: &[PriceBar],
        volume: &[VolumePoint],
    ) -> Result<ProcessedData, AnalysisError> {
        let p = self.params.as_ref();

        for bar in price {
            let fields = [bar.open, bar.high, bar.low, bar.close];
            if fields.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(AnalysisError::DataIntegrity(format!(
                    "non-finite or non-positive price at {}",
                    bar.timestamp
                )));
            }
        }
        for point in volume {
            if !point.volume.is_finite() || point.volume < 0.0 {
                return Err(AnalysisError::DataIntegrity(format!(
                    "negative or non-finite volume at {}",
                    point.timestamp
                )));
            }
        }

        let mut seen = HashSet::new();
        for bar in price {
            if !seen.insert(bar.timestamp) {
                return Err(AnalysisError::DataIntegrity(format!(
                    "duplicate price timestamp {}",
                    bar.timestamp
                )));
            }
        }
        let mut seen = HashSet::new();
        for point in volume {
            if !seen.insert(point.timestamp) {
                return Err(AnalysisError::DataIntegrity(format!(
                    "duplicate volume timestamp {}",
                    point.timestamp
                )));
            }
        }

        // Inner join on timestamp; rows present on only one side are dropped.
        let by_ts: BTreeMap<_, _> = volume.iter().map(|pt| (pt.timestamp, pt.volume)).collect();
        let mut joined: Vec<(PriceBar, f64)> = price
            .iter()
            .filter_map(|bar| by_ts.get(&bar.timestamp).map(|v| (*bar, *v)))
            .collect();
        joined.sort_by_key(|(bar, _)| bar.timestamp);

        let n = joined.len();
        let min_bars = p.min_required_bars();
        if n < min_bars {
            return Err(AnalysisError::InsufficientData(format!(
                "aligned series has {n} bars, need at least {min_bars}"
            )));
        }

        let timestamps: Vec<_> = joined.iter().map(|(bar, _)| bar.timestamp).collect();
        let open: Vec<_> = joined.iter().map(|(bar, _)| bar.open).collect();
        let high: Vec<_> = joined.iter().map(|(bar, _)| bar.high).collect();
        let low: Vec<_> = joined.iter().map(|(bar, _)| bar.low).collect();
        let close: Vec<_> = joined.iter().map(|(bar, _)| bar.close).collect();
        let volume: Vec<_> = joined.iter().map(|(_, v)| *v).collect();

        // Candle geometry
        let spread: Vec<f64> = (0..n).map(|i| (close[i] - open[i]).abs()).collect();
        let body_percent: Vec<f64> = (0..n)
            .map(|i| spread[i] / (high[i] - low[i]).max(EPSILON))
            .collect();
        let upper_wick: Vec<f64> = (0..n).map(|i| high[i] - open[i].max(close[i])).collect();
        let lower_wick: Vec<f64> = (0..n).map(|i| open[i].min(close[i]) - low[i]).collect();

        // Volume metrics
        let avg_volume = rolling_mean(&volume, p.lookback_period);
        let avg_spread = rolling_mean(&spread, p.lookback_period);
        let volume_ratio: Vec<f64> = (0..n)
            .map(|i| {
                if avg_volume[i].is_finite() && avg_volume[i] > EPSILON {
                    volume[i] / avg_volume[i]
                } else {
                    f64::NAN
                }
            })
            .collect();

        let volume_class: Vec<VolumeClass> = volume_ratio
            .iter()
            .map(|&ratio| classify_volume(ratio, p))
            .collect();

        let candle_class: Vec<CandleClass> = (0..n)
            .map(|i| {
                classify_candle(
                    spread[i],
                    body_percent[i],
                    upper_wick[i],
                    lower_wick[i],
                    avg_spread[i],
                    p,
                )
            })
            .collect();

        // True range and ATR
        let true_range: Vec<f64> = (0..n)
            .map(|i| {
                if i == 0 {
                    high[0] - low[0]
                } else {
                    (high[i] - low[i])
                        .max((high[i] - close[i - 1]).abs())
                        .max((low[i] - close[i - 1]).abs())
                }
            })
            .collect();
        let atr = rolling_mean(&true_range, p.atr_period);

        // Price direction over the lookback, optionally on the EMA
        let basis: Vec<f64> = if p.use_ema {
            ema(&close, p.lookback_period)
        } else {
            close.clone()
        };
        let price_direction: Vec<PriceDirection> = (0..n)
            .map(|i| {
                if i < p.lookback_period {
                    return PriceDirection::Sideways;
                }
                let base = basis[i - p.lookback_period];
                if !base.is_finite() || base.abs() <= EPSILON {
                    return PriceDirection::Sideways;
                }
                let pct = (basis[i] - base) / base;
                if pct >= p.slight_threshold_pct {
                    PriceDirection::Up
                } else if pct <= -p.slight_threshold_pct {
                    PriceDirection::Down
                } else {
                    PriceDirection::Sideways
                }
            })
            .collect();

        // On-balance volume, seeded to zero
        let mut obv = vec![0.0; n];
        for i in 1..n {
            obv[i] = if close[i] > close[i - 1] {
                obv[i - 1] + volume[i]
            } else if close[i] < close[i - 1] {
                obv[i - 1] - volume[i]
            } else {
                obv[i - 1]
            };
        }

        // Volume direction from the OBV slope, normalized by window volume
        let volume_direction: Vec<VolumeDirection> = (0..n)
            .map(|i| {
                if i < p.lookback_period {
                    return VolumeDirection::Flat;
                }
                let total = avg_volume[i] * p.lookback_period as f64;
                if !total.is_finite() || total <= EPSILON {
                    return VolumeDirection::Flat;
                }
                let ratio = (obv[i] - obv[i - p.lookback_period]) / total;
                if ratio >= p.volume_trend_threshold_pct {
                    VolumeDirection::Increasing
                } else if ratio <= -p.volume_trend_threshold_pct {
                    VolumeDirection::Decreasing
                } else {
                    VolumeDirection::Flat
                }
            })
            .collect();

        let processed = ProcessedData {
            timestamps,
            open,
            high,
            low,
            close,
            volume,
            spread,
            body_percent,
            upper_wick,
            lower_wick,
            avg_volume,
            avg_spread,
            volume_ratio,
            atr,
            obv,
            volume_class,
            candle_class,
            price_direction,
            volume_direction,
        };
        processed.check_aligned()?;
        Ok(processed)
    }
}

fn classify_volume(ratio: f64, p: &Parameters) -> VolumeClass {
    if !ratio.is_finite() {
        // Warmup or zero average: neutral default.
        return VolumeClass::Average;
    }
    if ratio >= p.very_high_threshold {
        VolumeClass::VeryHigh
    } else if ratio >= p.high_threshold {
        VolumeClass::High
    } else if ratio >= p.low_threshold {
        VolumeClass::Average
    } else if ratio >= p.very_low_threshold {
        VolumeClass::Low
    } else {
        VolumeClass::VeryLow
    }
}

fn classify_candle(
    spread: f64,
    body_percent: f64,
    upper_wick: f64,
    lower_wick: f64,
    avg_spread: f64,
    p: &Parameters,
) -> CandleClass {
    // Degenerate bar (high == low): neutral, not narrow.
    if spread + upper_wick + lower_wick <= EPSILON {
        return CandleClass::Neutral;
    }
    // NaN avg_spread makes both spread comparisons false through warmup.
    if body_percent >= p.wide_body_threshold && spread >= p.wide_spread_threshold * avg_spread {
        return CandleClass::Wide;
    }
    if body_percent <= p.narrow_body_threshold && spread <= p.narrow_spread_threshold * avg_spread {
        return CandleClass::Narrow;
    }
    let max_wick = upper_wick.max(lower_wick);
    if max_wick > EPSILON && max_wick >= p.wick_ratio * spread {
        return CandleClass::Wick;
    }
    CandleClass::Neutral
}
