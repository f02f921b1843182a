use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::types::{CandleClass, PriceDirection, VolumeClass, VolumeDirection};

/// Columnar per-timeframe feature bundle. Every column shares the
/// `timestamps` index; only rolling columns may contain leading NaNs, and
/// categorical columns carry neutral defaults through warmup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedData {
    pub timestamps: Vec<DateTime<Utc>>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,

    /// `|close - open|`
    pub spread: Vec<f64>,
    /// `spread / max(high - low, eps)`, in [0, 1]
    pub body_percent: Vec<f64>,
    /// `high - max(open, close)`
    pub upper_wick: Vec<f64>,
    /// `min(open, close) - low`
    pub lower_wick: Vec<f64>,

    /// Trailing mean volume over the lookback; NaN through warmup.
    pub avg_volume: Vec<f64>,
    /// Trailing mean spread over the lookback; NaN through warmup.
    pub avg_spread: Vec<f64>,
    /// `volume / avg_volume`; NaN where the average is NaN or zero.
    pub volume_ratio: Vec<f64>,
    /// Rolling mean true range; NaN through warmup.
    pub atr: Vec<f64>,
    /// On-balance volume, seeded to 0.
    pub obv: Vec<f64>,

    pub volume_class: Vec<VolumeClass>,
    pub candle_class: Vec<CandleClass>,
    pub price_direction: Vec<PriceDirection>,
    pub volume_direction: Vec<VolumeDirection>,
}

impl ProcessedData {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close.last().copied()
    }

    /// Verify that every column shares the timestamp index length.
    pub fn check_aligned(&self) -> Result<(), AnalysisError> {
        let n = self.timestamps.len();
        let lens = [
            self.open.len(),
            self.high.len(),
            self.low.len(),
            self.close.len(),
            self.volume.len(),
            self.spread.len(),
            self.body_percent.len(),
            self.upper_wick.len(),
            self.lower_wick.len(),
            self.avg_volume.len(),
            self.avg_spread.len(),
            self.volume_ratio.len(),
            self.atr.len(),
            self.obv.len(),
            self.volume_class.len(),
            self.candle_class.len(),
            self.price_direction.len(),
            self.volume_direction.len(),
        ];
        if lens.iter().any(|&l| l != n) {
            return Err(AnalysisError::InternalInvariant(format!(
                "processed columns are misaligned: index length {n}, column lengths {lens:?}"
            )));
        }
        Ok(())
    }
}
