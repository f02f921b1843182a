//! Per-timeframe dispatch of the VPA analyzers and cross-timeframe
//! confirmation arithmetic.

use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::types::{SignalType, Timeframe};
use analysis_core::{
    AnalysisError, Confirmations, MultiTimeframeAnalysis, Parameters, ProcessedData,
    TimeframeAnalysis,
};
use vpa_engine::{CandleAnalyzer, PatternRecognizer, SupportResistanceAnalyzer, TrendAnalyzer};

mod point_in_time;
pub use point_in_time::PointInTimeAnalyzer;

/// Runs the candle, trend, pattern and support/resistance analyzers over
/// each timeframe's processed bundle and measures cross-timeframe
/// agreement.
#[derive(Debug)]
pub struct MultiTimeframeAnalyzer {
    params: Arc<Parameters>,
    candle: CandleAnalyzer,
    trend: TrendAnalyzer,
    patterns: PatternRecognizer,
    support_resistance: SupportResistanceAnalyzer,
}

impl MultiTimeframeAnalyzer {
    pub fn new(params: Arc<Parameters>) -> Self {
        Self {
            candle: CandleAnalyzer::new(),
            trend: TrendAnalyzer::new(params.clone()),
            patterns: PatternRecognizer::new(params.clone()),
            support_resistance: SupportResistanceAnalyzer::new(params.clone()),
            params,
        }
    }

    /// Analyze every timeframe's bundle; each bundle is consumed and handed
    /// to its analysis so downstream reporting can read the processed data.
    pub fn analyze(
        &self,
        processed_by_tf: BTreeMap<Timeframe, ProcessedData>,
    ) -> Result<MultiTimeframeAnalysis, AnalysisError> {
        if processed_by_tf.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "no timeframe data to analyze".to_string(),
            ));
        }

        let mut timeframes = BTreeMap::new();
        for (timeframe, processed) in processed_by_tf {
            timeframes.insert(timeframe, self.analyze_one(processed)?);
        }
        let confirmations = confirmations(&timeframes);

        Ok(MultiTimeframeAnalysis {
            timeframes,
            confirmations,
        })
    }

    /// All per-timeframe analyses are evaluated at the latest bar.
    pub fn analyze_one(
        &self,
        processed: ProcessedData,
    ) -> Result<TimeframeAnalysis, AnalysisError> {
        let last = processed.last_index().ok_or_else(|| {
            AnalysisError::InsufficientData("empty processed bundle".to_string())
        })?;

        Ok(TimeframeAnalysis {
            candle_analysis: self.candle.analyze_bar(&processed, last)?,
            trend_analysis: self
                .trend
                .analyze(&processed, last, self.params.lookback_period)?,
            pattern_analysis: self.patterns.analyze(&processed, last)?,
            support_resistance: self.support_resistance.analyze(&processed)?,
            processed_data: processed,
        })
    }
}

fn confirmations(timeframes: &BTreeMap<Timeframe, TimeframeAnalysis>) -> Confirmations {
    let total = timeframes.len();
    if total == 0 {
        return Confirmations::default();
    }

    let bullish = timeframes
        .values()
        .filter(|a| {
            a.trend_analysis.direction.is_up() && a.candle_analysis.signal_type == SignalType::Buy
        })
        .count();
    let bearish = timeframes
        .values()
        .filter(|a| {
            a.trend_analysis.direction.is_down()
                && a.candle_analysis.signal_type == SignalType::Sell
        })
        .count();
    let high_volume = timeframes
        .values()
        .filter(|a| {
            a.processed_data
                .volume_class
                .last()
                .is_some_and(|class| class.is_high())
        })
        .count();

    Confirmations {
        bullish_alignment: bullish as f64 / total as f64,
        bearish_alignment: bearish as f64 / total as f64,
        volume_confirmation: 2 * high_volume > total,
        bullish_pattern_confirmation: timeframes
            .values()
            .any(|a| a.pattern_analysis.accumulation.detected),
        bearish_pattern_confirmation: timeframes
            .values()
            .any(|a| a.pattern_analysis.distribution.detected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::types::{PriceBar, VolumePoint};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use vpa_engine::Processor;

    fn ts(i: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i as i64)
    }

    fn small_params() -> Arc<Parameters> {
        let mut p = Parameters::default();
        p.lookback_period = 5;
        p.atr_period = 3;
        p.vol_lookback = 5;
        p.swing_n = 2;
        p.pattern_window = 10;
        p.pivot_window = 2;
        Arc::new(p.validated().unwrap())
    }

    fn series(rows: &[(f64, f64, f64, f64)], vols: &[f64]) -> (Vec<PriceBar>, Vec<VolumePoint>) {
        let price = rows
            .iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| PriceBar {
                timestamp: ts(i),
                open,
                high,
                low,
                close,
            })
            .collect();
        let volume = vols
            .iter()
            .enumerate()
            .map(|(i, &volume)| VolumePoint { timestamp: ts(i), volume })
            .collect();
        (price, volume)
    }

    /// Uptrend finishing on a wide, high-volume up bar: BUY candle, UP trend.
    fn bullish_series() -> (Vec<PriceBar>, Vec<VolumePoint>) {
        let mut rows: Vec<_> = (0..12)
            .map(|i| {
                let base = 100.0 + i as f64 * 0.5;
                (base, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        rows[11] = (105.5, 110.0, 105.0, 109.8);
        let vols = vec![
            100.0, 110.0, 120.0, 100.0, 90.0, 100.0, 110.0, 130.0, 120.0, 100.0, 110.0, 300.0,
        ];
        series(&rows, &vols)
    }

    fn quiet_series() -> (Vec<PriceBar>, Vec<VolumePoint>) {
        let rows: Vec<_> = (0..12).map(|_| (100.0, 100.6, 99.4, 100.1)).collect();
        let vols = vec![100.0; 12];
        series(&rows, &vols)
    }

    #[test]
    fn confirmations_measure_alignment_fractions() {
        let params = small_params();
        let processor = Processor::new(params.clone());
        let analyzer = MultiTimeframeAnalyzer::new(params);

        let (price, volume) = bullish_series();
        let bullish = processor.preprocess(&price, &volume).unwrap();
        let (price, volume) = quiet_series();
        let quiet = processor.preprocess(&price, &volume).unwrap();

        let mut by_tf = BTreeMap::new();
        by_tf.insert(Timeframe::Daily, bullish);
        by_tf.insert(Timeframe::Hour1, quiet);
        let analysis = analyzer.analyze(by_tf).unwrap();

        assert_eq!(analysis.timeframes.len(), 2);
        let daily = &analysis.timeframes[&Timeframe::Daily];
        assert_eq!(daily.candle_analysis.signal_type, SignalType::Buy);
        assert!(daily.trend_analysis.direction.is_up());

        let c = &analysis.confirmations;
        assert!((c.bullish_alignment - 0.5).abs() < 1e-9);
        assert!((c.bearish_alignment - 0.0).abs() < 1e-9);
        // One high-volume close out of two is not a majority.
        assert!(!c.volume_confirmation);
        assert!(!c.bullish_pattern_confirmation);
    }

    #[test]
    fn empty_input_is_insufficient_data() {
        let analyzer = MultiTimeframeAnalyzer::new(small_params());
        let err = analyzer.analyze(BTreeMap::new()).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
    }

    #[test]
    fn point_in_time_truncates_each_timeframe() {
        let params = small_params();
        let analyzer = PointInTimeAnalyzer::new(params.clone());

        let mut raw = BTreeMap::new();
        raw.insert(Timeframe::Daily, bullish_series());

        let at = analyzer.analyze_at(&raw, ts(8)).unwrap();
        assert_eq!(at.timeframes[&Timeframe::Daily].processed_data.len(), 9);

        // Truncating past the end reproduces the full analysis bit for bit.
        let full_input = {
            let (price, volume) = bullish_series();
            let processed = Processor::new(params.clone())
                .preprocess(&price, &volume)
                .unwrap();
            let mut by_tf = BTreeMap::new();
            by_tf.insert(Timeframe::Daily, processed);
            MultiTimeframeAnalyzer::new(params).analyze(by_tf).unwrap()
        };
        let at_end = analyzer.analyze_at(&raw, ts(11)).unwrap();
        assert_eq!(
            serde_json::to_string(&full_input).unwrap(),
            serde_json::to_string(&at_end).unwrap()
        );
    }

    #[test]
    fn point_in_time_needs_enough_history_after_truncation() {
        let analyzer = PointInTimeAnalyzer::new(small_params());
        let mut raw = BTreeMap::new();
        raw.insert(Timeframe::Daily, bullish_series());

        // 5 bars survive the cutoff; the minimum is 7.
        let err = analyzer.analyze_at(&raw, ts(4)).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
    }
}
