use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::types::{
    BarSignal, CandleClass, PatternAnalysis, PatternResult, PriceDirection, PriceLevel,
    SignalStrength, SignalType, SupportResistanceAnalysis, TestingResult, Timeframe, TrendAnalysis,
    TrendBias, TrendDirection, TrendSignal, VolumeClass, VolumeDirection,
};
use analysis_core::{
    Confirmations, MultiTimeframeAnalysis, Parameters, ProcessedData, TimeframeAnalysis,
};
use chrono::{TimeZone, Utc};

use crate::{RiskAssessor, SignalGenerator};

fn params() -> Arc<Parameters> {
    Arc::new(Parameters::default().validated().unwrap())
}

fn tiny_processed() -> ProcessedData {
    let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    ProcessedData {
        timestamps: vec![ts],
        open: vec![100.0],
        high: vec![100.0],
        low: vec![100.0],
        close: vec![100.0],
        volume: vec![100.0],
        spread: vec![0.0],
        body_percent: vec![0.0],
        upper_wick: vec![0.0],
        lower_wick: vec![0.0],
        avg_volume: vec![100.0],
        avg_spread: vec![0.0],
        volume_ratio: vec![1.0],
        atr: vec![0.0],
        obv: vec![0.0],
        volume_class: vec![VolumeClass::Average],
        candle_class: vec![CandleClass::Neutral],
        price_direction: vec![PriceDirection::Sideways],
        volume_direction: vec![VolumeDirection::Flat],
    }
}

fn tf_analysis(candle: SignalType, strength: SignalStrength) -> TimeframeAnalysis {
    let empty_pattern = || PatternResult::not_detected("");
    TimeframeAnalysis {
        candle_analysis: BarSignal {
            signal_type: candle,
            strength,
            details: String::new(),
        },
        trend_analysis: TrendAnalysis {
            direction: TrendDirection::Sideways,
            volume_trend: VolumeDirection::Flat,
            signal: TrendSignal::Consolidation,
            bias: TrendBias::Neutral,
            price_change_pct: 0.0,
            details: String::new(),
        },
        pattern_analysis: PatternAnalysis {
            accumulation: empty_pattern(),
            distribution: empty_pattern(),
            testing: TestingResult {
                detected: false,
                strength: 0,
                tests: Vec::new(),
                details: String::new(),
            },
            buying_climax: empty_pattern(),
            selling_climax: empty_pattern(),
        },
        support_resistance: SupportResistanceAnalysis::default(),
        processed_data: tiny_processed(),
    }
}

fn analysis_with(confirmations: Confirmations) -> MultiTimeframeAnalysis {
    let mut timeframes = BTreeMap::new();
    timeframes.insert(
        Timeframe::Daily,
        tf_analysis(SignalType::Sell, SignalStrength::Strong),
    );
    timeframes.insert(
        Timeframe::Hour1,
        tf_analysis(SignalType::Sell, SignalStrength::Moderate),
    );
    MultiTimeframeAnalysis {
        timeframes,
        confirmations,
    }
}

#[test]
fn strong_sell_needs_alignment_volume_and_distribution() {
    let generator = SignalGenerator::new(params());
    let signal = generator.generate(&analysis_with(Confirmations {
        bullish_alignment: 0.0,
        bearish_alignment: 0.8,
        volume_confirmation: true,
        bullish_pattern_confirmation: false,
        bearish_pattern_confirmation: true,
    }));

    assert_eq!(signal.signal_type, SignalType::Sell);
    assert_eq!(signal.strength, SignalStrength::Strong);
    assert!(signal.details.contains("Strong sell"));
    assert!(signal.evidence["confidence_score"].as_f64().unwrap() > 0.0);
    assert!(signal.evidence["per_timeframe"]["1d"].is_object());
}

#[test]
fn strong_buy_mirrors_strong_sell() {
    let generator = SignalGenerator::new(params());
    let signal = generator.generate(&analysis_with(Confirmations {
        bullish_alignment: 1.0,
        bearish_alignment: 0.0,
        volume_confirmation: true,
        bullish_pattern_confirmation: true,
        bearish_pattern_confirmation: false,
    }));

    assert_eq!(signal.signal_type, SignalType::Buy);
    assert_eq!(signal.strength, SignalStrength::Strong);
}

#[test]
fn moderate_buy_accepts_either_confirmation() {
    let generator = SignalGenerator::new(params());

    let with_volume = generator.generate(&analysis_with(Confirmations {
        bullish_alignment: 0.6,
        bearish_alignment: 0.0,
        volume_confirmation: true,
        bullish_pattern_confirmation: false,
        bearish_pattern_confirmation: false,
    }));
    assert_eq!(with_volume.signal_type, SignalType::Buy);
    assert_eq!(with_volume.strength, SignalStrength::Moderate);

    let with_pattern = generator.generate(&analysis_with(Confirmations {
        bullish_alignment: 0.6,
        bearish_alignment: 0.0,
        volume_confirmation: false,
        bullish_pattern_confirmation: true,
        bearish_pattern_confirmation: false,
    }));
    assert_eq!(with_pattern.signal_type, SignalType::Buy);
    assert_eq!(with_pattern.strength, SignalStrength::Moderate);
}

#[test]
fn no_confluence_is_no_action() {
    let generator = SignalGenerator::new(params());
    let signal = generator.generate(&analysis_with(Confirmations::default()));

    assert_eq!(signal.signal_type, SignalType::NoAction);
    assert_eq!(signal.strength, SignalStrength::Neutral);
}

#[test]
fn alignment_without_any_confirmation_is_no_action() {
    let generator = SignalGenerator::new(params());
    let signal = generator.generate(&analysis_with(Confirmations {
        bullish_alignment: 0.9,
        bearish_alignment: 0.0,
        volume_confirmation: false,
        bullish_pattern_confirmation: false,
        bearish_pattern_confirmation: false,
    }));
    assert_eq!(signal.signal_type, SignalType::NoAction);
}

#[test]
fn no_action_has_no_risk_assessment() {
    let assessor = RiskAssessor::new(params());
    let result = assessor
        .assess(
            SignalType::NoAction,
            100.0,
            &SupportResistanceAnalysis::default(),
        )
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn buy_without_support_falls_back_to_percentage_stops() {
    let mut p = Parameters::default();
    p.default_stop_pct = 0.03;
    p.default_risk_reward = 2.0;
    let assessor = RiskAssessor::new(Arc::new(p.validated().unwrap()));

    let risk = assessor
        .assess(SignalType::Buy, 100.0, &SupportResistanceAnalysis::default())
        .unwrap()
        .unwrap();

    assert!((risk.stop_loss - 97.0).abs() < 1e-9);
    assert!((risk.take_profit - 106.0).abs() < 1e-9);
    assert!((risk.risk_reward_ratio - 2.0).abs() < 1e-9);
    assert!((risk.risk_per_share - 3.0).abs() < 1e-9);
    // floor(100_000 * 0.02 / 3)
    assert!((risk.position_size - 666.0).abs() < 1e-9);
}

#[test]
fn sell_anchors_stop_on_resistance_and_target_on_support() {
    let assessor = RiskAssessor::new(params());
    let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let levels = SupportResistanceAnalysis {
        support: vec![PriceLevel { price: 41.87, volume: 1000.0, last_touched: ts }],
        resistance: vec![
            PriceLevel { price: 52.57, volume: 800.0, last_touched: ts },
            PriceLevel { price: 60.0, volume: 200.0, last_touched: ts },
        ],
    };

    let risk = assessor
        .assess(SignalType::Sell, 51.56, &levels)
        .unwrap()
        .unwrap();

    assert!((risk.stop_loss - 52.59).abs() < 0.02);
    assert!((risk.take_profit - 41.66).abs() < 0.02);
    assert!((risk.risk_reward_ratio - 9.6).abs() < 0.1);
    assert!(risk.risk_per_share > 0.0);
}

#[test]
fn buy_anchors_stop_on_support_and_target_on_resistance() {
    let assessor = RiskAssessor::new(params());
    let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let levels = SupportResistanceAnalysis {
        support: vec![PriceLevel { price: 98.0, volume: 500.0, last_touched: ts }],
        resistance: vec![PriceLevel { price: 104.0, volume: 400.0, last_touched: ts }],
    };

    let risk = assessor
        .assess(SignalType::Buy, 100.0, &levels)
        .unwrap()
        .unwrap();

    assert!(risk.stop_loss < 100.0);
    assert!(risk.stop_loss < 98.0 + 1e-9);
    assert!(risk.take_profit > 100.0);
    assert!(risk.take_profit < 104.0);
    assert!(risk.risk_per_share > 0.0);
    assert!(risk.position_size >= 0.0);
}

#[test]
fn invalid_price_is_an_internal_invariant_violation() {
    let assessor = RiskAssessor::new(params());
    let err = assessor
        .assess(
            SignalType::Buy,
            f64::NAN,
            &SupportResistanceAnalysis::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        analysis_core::AnalysisError::InternalInvariant(_)
    ));
}
