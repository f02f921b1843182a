//! Collapses a multi-timeframe analysis into one typed signal, and derives
//! the trade's risk parameters from it.

use std::sync::Arc;

use analysis_core::types::{Signal, SignalStrength, SignalType};
use analysis_core::{MultiTimeframeAnalysis, Parameters};
use serde_json::json;

mod risk;
pub use risk::RiskAssessor;

/// Top-down, first-match signal rules over the cross-timeframe
/// confirmations. Every rule only ever strengthens with more bullish
/// (resp. bearish) input, so the vote is monotone.
#[derive(Debug)]
pub struct SignalGenerator {
    params: Arc<Parameters>,
}

impl SignalGenerator {
    pub fn new(params: Arc<Parameters>) -> Self {
        Self { params }
    }

    pub fn generate(&self, analysis: &MultiTimeframeAnalysis) -> Signal {
        let p = self.params.as_ref();
        let c = &analysis.confirmations;

        let (signal_type, strength, details) = if c.bullish_alignment >= p.strong_align_pct
            && c.volume_confirmation
            && c.bullish_pattern_confirmation
        {
            (
                SignalType::Buy,
                SignalStrength::Strong,
                format!(
                    "Strong buy: {:.0}% of timeframes aligned bullish with volume confirmation and accumulation",
                    c.bullish_alignment * 100.0
                ),
            )
        } else if c.bearish_alignment >= p.strong_align_pct
            && c.volume_confirmation
            && c.bearish_pattern_confirmation
        {
            (
                SignalType::Sell,
                SignalStrength::Strong,
                format!(
                    "Strong sell: {:.0}% of timeframes aligned bearish with volume confirmation and distribution",
                    c.bearish_alignment * 100.0
                ),
            )
        } else if c.bullish_alignment >= p.moderate_align_pct
            && (c.volume_confirmation || c.bullish_pattern_confirmation)
        {
            (
                SignalType::Buy,
                SignalStrength::Moderate,
                format!(
                    "Moderate buy: {:.0}% of timeframes aligned bullish with partial confirmation",
                    c.bullish_alignment * 100.0
                ),
            )
        } else if c.bearish_alignment >= p.moderate_align_pct
            && (c.volume_confirmation || c.bearish_pattern_confirmation)
        {
            (
                SignalType::Sell,
                SignalStrength::Moderate,
                format!(
                    "Moderate sell: {:.0}% of timeframes aligned bearish with partial confirmation",
                    c.bearish_alignment * 100.0
                ),
            )
        } else {
            (
                SignalType::NoAction,
                SignalStrength::Neutral,
                "No actionable confluence across timeframes".to_string(),
            )
        };

        Signal {
            signal_type,
            strength,
            details,
            evidence: self.evidence(analysis),
        }
    }

    /// Per-timeframe excerpts, the confirmations and a normalized
    /// confidence score in [0, 1].
    fn evidence(&self, analysis: &MultiTimeframeAnalysis) -> serde_json::Value {
        let confidence = confidence_score(analysis);

        let per_timeframe: serde_json::Map<String, serde_json::Value> = analysis
            .timeframes
            .iter()
            .map(|(timeframe, a)| {
                let sr = &a.support_resistance;
                (
                    timeframe.as_str().to_string(),
                    json!({
                        "trend_direction": a.trend_analysis.direction,
                        "trend_signal": a.trend_analysis.signal,
                        "trend_bias": a.trend_analysis.bias,
                        "candle_signal": a.candle_analysis.signal_type,
                        "volume_class": a.processed_data.volume_class.last(),
                        "accumulation": a.pattern_analysis.accumulation.detected,
                        "distribution": a.pattern_analysis.distribution.detected,
                        "buying_climax": a.pattern_analysis.buying_climax.detected,
                        "selling_climax": a.pattern_analysis.selling_climax.detected,
                        "support": sr.support.iter().map(|l| l.price).collect::<Vec<_>>(),
                        "resistance": sr.resistance.iter().map(|l| l.price).collect::<Vec<_>>(),
                    }),
                )
            })
            .collect();

        json!({
            "per_timeframe": per_timeframe,
            "confirmations": {
                "bullish_alignment": analysis.confirmations.bullish_alignment,
                "bearish_alignment": analysis.confirmations.bearish_alignment,
                "volume_confirmation": analysis.confirmations.volume_confirmation,
                "bullish_pattern_confirmation": analysis.confirmations.bullish_pattern_confirmation,
                "bearish_pattern_confirmation": analysis.confirmations.bearish_pattern_confirmation,
            },
            "confidence_score": confidence,
        })
    }
}

fn confidence_score(analysis: &MultiTimeframeAnalysis) -> f64 {
    let total = analysis.timeframes.len();
    if total == 0 {
        return 0.0;
    }
    let sum: f64 = analysis
        .timeframes
        .values()
        .map(|a| a.candle_analysis.strength.to_score())
        .sum();
    sum / total as f64
}

#[cfg(test)]
mod tests;
