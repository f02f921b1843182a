use std::sync::Arc;

use analysis_core::types::{
    CandleClass, PatternAnalysis, PatternResult, TestEvent, TestKind, TestingResult, VolumeClass,
    EPSILON,
};
use analysis_core::{AnalysisError, Parameters, ProcessedData};

/// Window-based detection of accumulation, distribution, level testing and
/// climactic bars. All detections vote over the trailing window ending at
/// the analyzed index; thresholds come from the shared parameters.
#[derive(Debug)]
pub struct PatternRecognizer {
    params: Arc<Parameters>,
}

impl PatternRecognizer {
    pub fn new(params: Arc<Parameters>) -> Self {
        Self { params }
    }

    pub fn analyze(
        &self,
        data: &ProcessedData,
        index: usize,
    ) -> Result<PatternAnalysis, AnalysisError> {
        let len = data.len();
        if index >= len {
            return Err(AnalysisError::IndexOutOfRange { index, len });
        }

        let window = self.params.pattern_window;
        if index + 1 < window {
            let details = "window shorter than pattern_window";
            return Ok(PatternAnalysis {
                accumulation: PatternResult::not_detected(details),
                distribution: PatternResult::not_detected(details),
                testing: TestingResult {
                    detected: false,
                    strength: 0,
                    tests: Vec::new(),
                    details: details.to_string(),
                },
                buying_climax: PatternResult::not_detected(details),
                selling_climax: PatternResult::not_detected(details),
            });
        }

        let start = index + 1 - window;
        Ok(PatternAnalysis {
            accumulation: self.detect_accumulation(data, start, index),
            distribution: self.detect_distribution(data, start, index),
            testing: self.detect_testing(data, start, index),
            buying_climax: self.detect_buying_climax(data, start, index),
            selling_climax: self.detect_selling_climax(data, start, index),
        })
    }

    fn detect_accumulation(&self, data: &ProcessedData, start: usize, end: usize) -> PatternResult {
        let p = self.params.as_ref();
        let closes = &data.close[start..=end];
        let mean = closes.iter().sum::<f64>() / closes.len() as f64;
        if mean <= EPSILON {
            return PatternResult::not_detected("degenerate window");
        }

        let max = closes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = closes.iter().cloned().fold(f64::INFINITY, f64::min);
        let sideways = (max - min) / mean <= p.sideways_pct;
        if !sideways {
            return PatternResult::not_detected("price range too wide for accumulation");
        }

        let high_volume_count = high_volume_count(data, start, end);
        let support = window_low(data, start, end);
        let band = support * (1.0 + p.touch_tolerance_pct);
        let support_tests = (start..=end)
            .filter(|&i| data.low[i] <= band && data.close[i] > band)
            .count();

        let detected = high_volume_count >= p.min_high_vol && support_tests >= p.min_tests;
        PatternResult {
            detected,
            strength: if detected {
                scale_strength(high_volume_count.min(support_tests), p.strength_scale)
            } else {
                0
            },
            details: format!(
                "sideways window with {high_volume_count} high-volume bars and {support_tests} support tests"
            ),
        }
    }

    fn detect_distribution(&self, data: &ProcessedData, start: usize, end: usize) -> PatternResult {
        let p = self.params.as_ref();
        let closes = &data.close[start..=end];
        let mean = closes.iter().sum::<f64>() / closes.len() as f64;
        if mean <= EPSILON {
            return PatternResult::not_detected("degenerate window");
        }

        let max = closes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = closes.iter().cloned().fold(f64::INFINITY, f64::min);
        if (max - min) / mean > p.sideways_pct {
            return PatternResult::not_detected("price range too wide for distribution");
        }

        let high_volume_count = high_volume_count(data, start, end);
        let resistance = window_high(data, start, end);
        let band = resistance * (1.0 - p.touch_tolerance_pct);
        let resistance_tests = (start..=end)
            .filter(|&i| data.high[i] >= band && data.close[i] < band)
            .count();

        let detected = high_volume_count >= p.min_high_vol && resistance_tests >= p.min_tests;
        PatternResult {
            detected,
            strength: if detected {
                scale_strength(high_volume_count.min(resistance_tests), p.strength_scale)
            } else {
                0
            },
            details: format!(
                "sideways window with {high_volume_count} high-volume bars and {resistance_tests} resistance tests"
            ),
        }
    }

    fn detect_testing(&self, data: &ProcessedData, start: usize, end: usize) -> TestingResult {
        let p = self.params.as_ref();
        let support = window_low(data, start, end);
        let resistance = window_high(data, start, end);
        let support_band = support * (1.0 + p.touch_tolerance_pct);
        let resistance_band = resistance * (1.0 - p.touch_tolerance_pct);

        let mut tests = Vec::new();
        for i in start..=end {
            if data.low[i] <= support_band && data.close[i] > support_band {
                tests.push(TestEvent {
                    timestamp: data.timestamps[i],
                    kind: TestKind::SupportTest,
                    price: data.low[i],
                });
            }
            if data.high[i] >= resistance_band && data.close[i] < resistance_band {
                tests.push(TestEvent {
                    timestamp: data.timestamps[i],
                    kind: TestKind::ResistanceTest,
                    price: data.high[i],
                });
            }
        }

        let count = tests.len() as u32;
        TestingResult {
            detected: count > 0,
            strength: count.min(p.max_tests),
            details: format!("{count} level tests inside the window"),
            tests,
        }
    }

    fn detect_buying_climax(&self, data: &ProcessedData, start: usize, end: usize) -> PatternResult {
        let p = self.params.as_ref();
        let highest = window_high(data, start, end);

        let near_high = data.close[end] >= highest * (1.0 - p.climax_band_pct);
        let very_high_volume = data.volume_class[end] == VolumeClass::VeryHigh;
        let wide_up = data.candle_class[end] == CandleClass::Wide
            && data.close[end] > data.open[end];
        let upper_wick = data.upper_wick[end] > data.lower_wick[end];

        let strength = [near_high, very_high_volume, wide_up, upper_wick]
            .iter()
            .filter(|&&c| c)
            .count() as u32;
        let detected = near_high && very_high_volume && wide_up;
        PatternResult {
            detected,
            strength,
            details: format!(
                "near_high={near_high} very_high_volume={very_high_volume} wide_up={wide_up} upper_wick={upper_wick}"
            ),
        }
    }

    fn detect_selling_climax(
        &self,
        data: &ProcessedData,
        start: usize,
        end: usize,
    ) -> PatternResult {
        let p = self.params.as_ref();
        let lowest = window_low(data, start, end);

        let near_low = data.close[end] <= lowest * (1.0 + p.climax_band_pct);
        let very_high_volume = data.volume_class[end] == VolumeClass::VeryHigh;
        let wide_down = data.candle_class[end] == CandleClass::Wide
            && data.close[end] < data.open[end];
        let lower_wick = data.lower_wick[end] > data.upper_wick[end];

        let strength = [near_low, very_high_volume, wide_down, lower_wick]
            .iter()
            .filter(|&&c| c)
            .count() as u32;
        let detected = near_low && very_high_volume && wide_down;
        PatternResult {
            detected,
            strength,
            details: format!(
                "near_low={near_low} very_high_volume={very_high_volume} wide_down={wide_down} lower_wick={lower_wick}"
            ),
        }
    }
}

fn high_volume_count(data: &ProcessedData, start: usize, end: usize) -> usize {
    (start..=end)
        .filter(|&i| data.volume_class[i].is_high())
        .count()
}

fn window_low(data: &ProcessedData, start: usize, end: usize) -> f64 {
    data.low[start..=end]
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min)
}

fn window_high(data: &ProcessedData, start: usize, end: usize) -> f64 {
    data.high[start..=end]
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max)
}

fn scale_strength(count: usize, scale: u32) -> u32 {
    let scale = scale.max(1);
    ((count as u32 + scale - 1) / scale).clamp(1, 3)
}
