use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::types::{Timeframe, TimeframeSpec};

/// Immutable engine configuration. Construct with [`Parameters::default`],
/// adjust fields, then call [`Parameters::validated`]; the facade refuses
/// unvalidated parameter sets. Shared read-only across analyzers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    // Volume classification (ratio of bar volume to trailing average)
    pub very_high_threshold: f64,
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub very_low_threshold: f64,

    // Candle classification
    pub wide_body_threshold: f64,
    pub narrow_body_threshold: f64,
    pub wide_spread_threshold: f64,
    pub narrow_spread_threshold: f64,
    pub wick_ratio: f64,

    // Trend / processor
    pub lookback_period: usize,
    pub strong_threshold_pct: f64,
    pub slight_threshold_pct: f64,
    pub use_ema: bool,
    /// Flat band for the normalized OBV slope.
    pub volume_trend_threshold_pct: f64,
    pub atr_period: usize,

    // Pattern recognition
    pub pattern_window: usize,
    pub sideways_pct: f64,
    pub touch_tolerance_pct: f64,
    pub min_high_vol: usize,
    pub min_tests: usize,
    pub climax_band_pct: f64,
    pub max_tests: u32,
    pub strength_scale: u32,

    // Support / resistance
    pub pivot_window: usize,
    pub cluster_tolerance_pct: f64,
    pub max_levels: usize,

    // Risk
    pub default_risk_percent: f64,
    pub default_risk_reward: f64,
    pub stop_buffer_pct: f64,
    pub target_buffer_pct: f64,
    pub default_stop_pct: f64,
    pub account_equity: f64,

    // Signal synthesis
    pub strong_align_pct: f64,
    pub moderate_align_pct: f64,

    // Wyckoff
    pub vol_lookback: usize,
    pub swing_n: usize,
    pub climax_vol_multiplier: f64,
    pub climax_range_multiplier: f64,
    pub spring_pct: f64,
    pub spring_vol_multiplier: f64,
    pub ar_window: usize,
    pub test_band_pct: f64,
    pub range_min_length: usize,
    pub jac_gap_pct: f64,

    /// Timeframes to analyze; the first entry is the primary timeframe.
    pub timeframes: Vec<TimeframeSpec>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            very_high_threshold: 2.0,
            high_threshold: 1.3,
            low_threshold: 0.7,
            very_low_threshold: 0.3,

            wide_body_threshold: 0.7,
            narrow_body_threshold: 0.3,
            wide_spread_threshold: 1.5,
            narrow_spread_threshold: 0.6,
            wick_ratio: 1.5,

            lookback_period: 20,
            strong_threshold_pct: 0.05,
            slight_threshold_pct: 0.02,
            use_ema: false,
            volume_trend_threshold_pct: 0.05,
            atr_period: 14,

            pattern_window: 20,
            sideways_pct: 0.05,
            touch_tolerance_pct: 0.005,
            min_high_vol: 3,
            min_tests: 2,
            climax_band_pct: 0.01,
            max_tests: 5,
            strength_scale: 2,

            pivot_window: 5,
            cluster_tolerance_pct: 0.01,
            max_levels: 5,

            default_risk_percent: 0.02,
            default_risk_reward: 2.0,
            stop_buffer_pct: 0.0005,
            target_buffer_pct: 0.005,
            default_stop_pct: 0.03,
            account_equity: 100_000.0,

            strong_align_pct: 0.75,
            moderate_align_pct: 0.5,

            vol_lookback: 20,
            swing_n: 5,
            climax_vol_multiplier: 3.0,
            climax_range_multiplier: 2.0,
            spring_pct: 0.01,
            spring_vol_multiplier: 1.5,
            ar_window: 10,
            test_band_pct: 0.02,
            range_min_length: 10,
            jac_gap_pct: 0.02,

            timeframes: vec![
                TimeframeSpec::lookback(Timeframe::Daily, "60d"),
                TimeframeSpec::lookback(Timeframe::Hour1, "7d"),
                TimeframeSpec::lookback(Timeframe::Min15, "7d"),
            ],
        }
    }
}

impl Parameters {
    /// Minimum aligned series length any analysis requires.
    pub fn min_required_bars(&self) -> usize {
        self.lookback_period
            .max(self.vol_lookback)
            .max(self.atr_period)
            + self.swing_n
    }

    /// The first configured timeframe drives current price and risk levels.
    pub fn primary_timeframe(&self) -> Option<Timeframe> {
        self.timeframes.first().map(|spec| spec.timeframe)
    }

    /// Enforce cross-parameter invariants. Violations are fatal for the
    /// caller: a mis-ordered threshold chain silently corrupts every
    /// downstream classification.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let ordered = self.very_high_threshold > self.high_threshold
            && self.high_threshold > 1.0
            && 1.0 > self.low_threshold
            && self.low_threshold > self.very_low_threshold
            && self.very_low_threshold > 0.0;
        if !ordered {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "volume thresholds must satisfy very_high > high > 1.0 > low > very_low > 0, got {} > {} > 1.0 > {} > {} > 0",
                self.very_high_threshold,
                self.high_threshold,
                self.low_threshold,
                self.very_low_threshold,
            )));
        }

        if !(self.default_risk_percent > 0.0 && self.default_risk_percent < 0.10) {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "default_risk_percent must lie in (0, 0.10), got {}",
                self.default_risk_percent
            )));
        }
        if self.default_risk_reward < 1.0 {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "default_risk_reward must be >= 1.0, got {}",
                self.default_risk_reward
            )));
        }

        if self.narrow_body_threshold >= self.wide_body_threshold {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "narrow_body_threshold {} must be below wide_body_threshold {}",
                self.narrow_body_threshold, self.wide_body_threshold
            )));
        }

        for (name, value) in [
            ("lookback_period", self.lookback_period),
            ("atr_period", self.atr_period),
            ("pattern_window", self.pattern_window),
            ("pivot_window", self.pivot_window),
            ("vol_lookback", self.vol_lookback),
            ("swing_n", self.swing_n),
            ("ar_window", self.ar_window),
            ("range_min_length", self.range_min_length),
        ] {
            if value == 0 {
                return Err(AnalysisError::InvalidConfiguration(format!(
                    "{name} must be positive"
                )));
            }
        }

        for (name, value) in [
            ("wick_ratio", self.wick_ratio),
            ("sideways_pct", self.sideways_pct),
            ("touch_tolerance_pct", self.touch_tolerance_pct),
            ("climax_band_pct", self.climax_band_pct),
            ("cluster_tolerance_pct", self.cluster_tolerance_pct),
            ("default_stop_pct", self.default_stop_pct),
            ("account_equity", self.account_equity),
            ("climax_vol_multiplier", self.climax_vol_multiplier),
            ("climax_range_multiplier", self.climax_range_multiplier),
            ("spring_pct", self.spring_pct),
            ("spring_vol_multiplier", self.spring_vol_multiplier),
            ("test_band_pct", self.test_band_pct),
            ("jac_gap_pct", self.jac_gap_pct),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(AnalysisError::InvalidConfiguration(format!(
                    "{name} must be a positive finite number, got {value}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.moderate_align_pct)
            || !(0.0..=1.0).contains(&self.strong_align_pct)
            || self.moderate_align_pct > self.strong_align_pct
        {
            return Err(AnalysisError::InvalidConfiguration(format!(
                "alignment thresholds must satisfy 0 <= moderate ({}) <= strong ({}) <= 1",
                self.moderate_align_pct, self.strong_align_pct
            )));
        }

        if self.timeframes.is_empty() {
            return Err(AnalysisError::InvalidConfiguration(
                "at least one timeframe must be configured".to_string(),
            ));
        }

        Ok(())
    }

    /// Consuming validation, for construction-site use.
    pub fn validated(self) -> Result<Self, AnalysisError> {
        self.validate()?;
        Ok(self)
    }
}
