use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::processed::ProcessedData;
use crate::types::{
    BarSignal, PatternAnalysis, PhaseRecord, RiskAssessment, Signal,
    SupportResistanceAnalysis, Timeframe, TradingRange, TrendAnalysis, WyckoffAnalysis,
    WyckoffEventRecord,
};

/// Everything derived for one timeframe. The processed bundle is exposed
/// for downstream reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeAnalysis {
    pub candle_analysis: BarSignal,
    pub trend_analysis: TrendAnalysis,
    pub pattern_analysis: PatternAnalysis,
    pub support_resistance: SupportResistanceAnalysis,
    pub processed_data: ProcessedData,
}

/// Cross-timeframe agreement measures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Confirmations {
    /// Fraction of timeframes trending up with a BUY candle verdict.
    pub bullish_alignment: f64,
    /// Fraction of timeframes trending down with a SELL candle verdict.
    pub bearish_alignment: f64,
    /// Majority of timeframes closed their last bar on high volume.
    pub volume_confirmation: bool,
    /// Accumulation detected on at least one timeframe.
    pub bullish_pattern_confirmation: bool,
    /// Distribution detected on at least one timeframe.
    pub bearish_pattern_confirmation: bool,
}

/// Output of the multi-timeframe analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTimeframeAnalysis {
    pub timeframes: BTreeMap<Timeframe, TimeframeAnalysis>,
    pub confirmations: Confirmations,
}

/// Complete facade output for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub ticker: String,
    pub current_price: f64,
    pub primary_timeframe: Timeframe,
    pub timeframe_analyses: BTreeMap<Timeframe, TimeframeAnalysis>,
    /// Timeframes whose analysis failed, with the failure reason. A failure
    /// here never invalidates the remaining timeframes.
    pub failed_timeframes: BTreeMap<Timeframe, String>,
    pub confirmations: Confirmations,
    pub signal: Signal,
    /// Absent whenever the signal is NO_ACTION.
    pub risk_assessment: Option<RiskAssessment>,
    pub wyckoff: BTreeMap<Timeframe, WyckoffAnalysis>,
}

impl AnalysisResult {
    fn primary_wyckoff(&self) -> Option<&WyckoffAnalysis> {
        self.wyckoff.get(&self.primary_timeframe)
    }

    /// Wyckoff events on the primary timeframe.
    pub fn wyckoff_events(&self) -> &[WyckoffEventRecord] {
        self.primary_wyckoff().map_or(&[], |w| w.events.as_slice())
    }

    /// Wyckoff phases on the primary timeframe.
    pub fn wyckoff_phases(&self) -> &[PhaseRecord] {
        self.primary_wyckoff().map_or(&[], |w| w.phases.as_slice())
    }

    /// Wyckoff trading ranges on the primary timeframe.
    pub fn wyckoff_trading_ranges(&self) -> &[TradingRange] {
        self.primary_wyckoff()
            .map_or(&[], |w| w.trading_ranges.as_slice())
    }
}
