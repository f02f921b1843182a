use std::sync::Arc;

use analysis_core::types::{
    TrendAnalysis, TrendBias, TrendDirection, TrendSignal, VolumeDirection, EPSILON,
};
use analysis_core::{AnalysisError, Parameters, ProcessedData};

use crate::rolling::ema;

/// Classifies the trend over a lookback window and whether volume confirms
/// or contradicts it. The OBV slope carries the volume verdict: when it
/// agrees with the price trend the trend is validated, when it disagrees
/// the reading is an anomaly, and in both cases the bias follows the OBV
/// side of the disagreement.
#[derive(Debug)]
pub struct TrendAnalyzer {
    params: Arc<Parameters>,
}

impl TrendAnalyzer {
    pub fn new(params: Arc<Parameters>) -> Self {
        Self { params }
    }

    pub fn analyze(
        &self,
        data: &ProcessedData,
        index: usize,
        lookback: usize,
    ) -> Result<TrendAnalysis, AnalysisError> {
        let p = self.params.as_ref();
        let len = data.len();
        if index >= len {
            return Err(AnalysisError::IndexOutOfRange { index, len });
        }

        let price_change_pct = self.price_change(data, index, lookback);
        let direction = classify_direction(price_change_pct, p);
        let volume_trend = volume_slope(data, index, lookback, p);

        let (signal, bias) = match (direction, volume_trend) {
            (TrendDirection::Sideways, _) => (TrendSignal::Consolidation, TrendBias::Neutral),
            (d, VolumeDirection::Increasing) if d.is_up() => {
                (TrendSignal::TrendValidation, TrendBias::Bullish)
            }
            (d, VolumeDirection::Decreasing) if d.is_down() => {
                (TrendSignal::TrendValidation, TrendBias::Bearish)
            }
            (_, VolumeDirection::Increasing) => (TrendSignal::TrendAnomaly, TrendBias::Bullish),
            (_, VolumeDirection::Decreasing) => (TrendSignal::TrendAnomaly, TrendBias::Bearish),
            (_, VolumeDirection::Flat) => (TrendSignal::TrendAnomaly, TrendBias::Neutral),
        };

        let details = match signal {
            TrendSignal::TrendValidation => format!(
                "{:?} trend ({:+.2}%) validated by {:?} volume",
                direction,
                price_change_pct * 100.0,
                volume_trend
            ),
            TrendSignal::TrendAnomaly => format!(
                "{:?} trend ({:+.2}%) contradicted by {:?} volume",
                direction,
                price_change_pct * 100.0,
                volume_trend
            ),
            TrendSignal::Consolidation => format!(
                "sideways price action ({:+.2}%) over {} bars",
                price_change_pct * 100.0,
                lookback
            ),
        };

        Ok(TrendAnalysis {
            direction,
            volume_trend,
            signal,
            bias,
            price_change_pct,
            details,
        })
    }

    fn price_change(&self, data: &ProcessedData, index: usize, lookback: usize) -> f64 {
        if index < lookback {
            return 0.0;
        }
        let basis: Vec<f64> = if self.params.use_ema {
            ema(&data.close, lookback)
        } else {
            data.close.clone()
        };
        let base = basis[index - lookback];
        if !base.is_finite() || base.abs() <= EPSILON {
            return 0.0;
        }
        (basis[index] - base) / base
    }
}

fn classify_direction(pct: f64, p: &Parameters) -> TrendDirection {
    if pct >= p.strong_threshold_pct {
        TrendDirection::Up
    } else if pct >= p.slight_threshold_pct {
        TrendDirection::SlightUp
    } else if pct <= -p.strong_threshold_pct {
        TrendDirection::Down
    } else if pct <= -p.slight_threshold_pct {
        TrendDirection::SlightDown
    } else {
        TrendDirection::Sideways
    }
}

fn volume_slope(
    data: &ProcessedData,
    index: usize,
    lookback: usize,
    p: &Parameters,
) -> VolumeDirection {
    if index < lookback {
        return VolumeDirection::Flat;
    }
    let total: f64 = data.volume[index - lookback + 1..=index].iter().sum();
    if total <= EPSILON {
        return VolumeDirection::Flat;
    }
    let ratio = (data.obv[index] - data.obv[index - lookback]) / total;
    if ratio >= p.volume_trend_threshold_pct {
        VolumeDirection::Increasing
    } else if ratio <= -p.volume_trend_threshold_pct {
        VolumeDirection::Decreasing
    } else {
        VolumeDirection::Flat
    }
}

