use analysis_core::types::{
    BarSignal, CandleClass, PriceDirection, SignalStrength, SignalType, VolumeClass,
};
use analysis_core::{AnalysisError, ProcessedData};

/// Classifies a single bar into a buy/sell/no-action verdict from its
/// candle class, volume class and local direction. Rules are evaluated
/// top-down; the first match wins. All thresholds were applied upstream
/// when the classes were derived, so the analyzer itself is stateless.
#[derive(Debug)]
pub struct CandleAnalyzer;

impl CandleAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_bar(
        &self,
        data: &ProcessedData,
        index: usize,
    ) -> Result<BarSignal, AnalysisError> {
        let len = data.len();
        if index >= len {
            return Err(AnalysisError::IndexOutOfRange { index, len });
        }

        let candle = data.candle_class[index];
        let volume = data.volume_class[index];
        let direction = data.price_direction[index];
        let lower_dominant = data.lower_wick[index] > data.upper_wick[index];

        let (signal_type, strength, details) = match (candle, direction) {
            (CandleClass::Wide, PriceDirection::Up) if volume.is_high() => (
                SignalType::Buy,
                SignalStrength::Strong,
                "wide up candle on high volume confirms demand",
            ),
            (CandleClass::Wide, PriceDirection::Down) if volume.is_high() => (
                SignalType::Sell,
                SignalStrength::Strong,
                "wide down candle on high volume confirms supply",
            ),
            (CandleClass::Wick, _) if lower_dominant && volume.is_high() => (
                SignalType::Buy,
                SignalStrength::Moderate,
                "long lower wick on high volume suggests absorbed selling",
            ),
            (CandleClass::Wick, _) if !lower_dominant && volume.is_high() => (
                SignalType::Sell,
                SignalStrength::Moderate,
                "long upper wick on high volume suggests rejected buying",
            ),
            (CandleClass::Narrow, _) if volume.rank() <= VolumeClass::Low.rank() => (
                SignalType::NoAction,
                SignalStrength::Neutral,
                "contraction: narrow candle on low volume",
            ),
            _ => (
                SignalType::NoAction,
                SignalStrength::Neutral,
                "no actionable candle/volume combination",
            ),
        };

        Ok(BarSignal {
            signal_type,
            strength,
            details: details.to_string(),
        })
    }
}

impl Default for CandleAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
