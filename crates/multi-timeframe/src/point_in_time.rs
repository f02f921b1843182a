use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::types::{PriceBar, Timeframe, VolumePoint};
use analysis_core::{AnalysisError, MultiTimeframeAnalysis, Parameters, ProcessedData};
use chrono::{DateTime, Utc};
use vpa_engine::Processor;

use crate::MultiTimeframeAnalyzer;

/// Multi-timeframe analysis evaluated as of a historical timestamp: every
/// timeframe's raw series is truncated at the cutoff before preprocessing,
/// reconstructing the view an analysis at that moment would have had.
#[derive(Debug)]
pub struct PointInTimeAnalyzer {
    processor: Processor,
    analyzer: MultiTimeframeAnalyzer,
}

impl PointInTimeAnalyzer {
    pub fn new(params: Arc<Parameters>) -> Self {
        Self {
            processor: Processor::new(params.clone()),
            analyzer: MultiTimeframeAnalyzer::new(params),
        }
    }

    /// Bars with timestamps after `as_of` are invisible to the analysis.
    /// Timeframes whose truncated series falls below the minimum are
    /// dropped; if none survive, the first failure is returned.
    pub fn analyze_at(
        &self,
        raw_by_tf: &BTreeMap<Timeframe, (Vec<PriceBar>, Vec<VolumePoint>)>,
        as_of: DateTime<Utc>,
    ) -> Result<MultiTimeframeAnalysis, AnalysisError> {
        let mut processed_by_tf: BTreeMap<Timeframe, ProcessedData> = BTreeMap::new();
        let mut first_error: Option<AnalysisError> = None;

        for (&timeframe, (price, volume)) in raw_by_tf {
            let price: Vec<PriceBar> = price
                .iter()
                .filter(|bar| bar.timestamp <= as_of)
                .copied()
                .collect();
            let volume: Vec<VolumePoint> = volume
                .iter()
                .filter(|point| point.timestamp <= as_of)
                .copied()
                .collect();

            match self.processor.preprocess(&price, &volume) {
                Ok(processed) => {
                    processed_by_tf.insert(timeframe, processed);
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        if processed_by_tf.is_empty() {
            return Err(first_error.unwrap_or_else(|| {
                AnalysisError::InsufficientData(format!(
                    "no timeframe retains enough history at {as_of}"
                ))
            }));
        }
        self.analyzer.analyze(processed_by_tf)
    }
}
