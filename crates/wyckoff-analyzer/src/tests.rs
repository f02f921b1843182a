use std::sync::Arc;

use analysis_core::types::{
    CandleClass, MarketContext, PriceBar, PriceDirection, RangeKind, VolumeClass, VolumeDirection,
    VolumePoint, WyckoffEventKind,
};
use analysis_core::{AnalysisError, Parameters, ProcessedData};
use chrono::{DateTime, Duration, TimeZone, Utc};
use vpa_engine::Processor;

use crate::WyckoffAnalyzer;

fn ts(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i as i64)
}

fn test_params() -> Arc<Parameters> {
    let mut p = Parameters::default();
    p.lookback_period = 5;
    p.atr_period = 3;
    p.vol_lookback = 5;
    p.swing_n = 2;
    p.climax_vol_multiplier = 2.5;
    p.climax_range_multiplier = 1.8;
    p.spring_pct = 0.02;
    p.spring_vol_multiplier = 1.5;
    p.ar_window = 6;
    p.test_band_pct = 0.03;
    p.range_min_length = 8;
    p.jac_gap_pct = 0.05;
    Arc::new(p.validated().unwrap())
}

fn preprocess(rows: &[(f64, f64, f64, f64, f64)], params: &Arc<Parameters>) -> ProcessedData {
    let price: Vec<PriceBar> = rows
        .iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, _))| PriceBar {
            timestamp: ts(i),
            open,
            high,
            low,
            close,
        })
        .collect();
    let volume: Vec<VolumePoint> = rows
        .iter()
        .enumerate()
        .map(|(i, &(_, _, _, _, volume))| VolumePoint { timestamp: ts(i), volume })
        .collect();
    Processor::new(params.clone()).preprocess(&price, &volume).unwrap()
}

/// Downtrend, selling climax, automatic rally, two secondary tests, a
/// spring with its low-volume retest, then a sign of strength: one full
/// accumulation cycle. Rows are (open, high, low, close, volume).
fn accumulation_rows() -> Vec<(f64, f64, f64, f64, f64)> {
    let mut rows = Vec::new();
    // t0-t9: steady markdown on quiet volume
    let mut open = 105.4;
    for _ in 0..10 {
        let close = open - 0.4;
        rows.push((open, open + 0.3, close - 0.3, close, 100.0));
        open = close;
    }
    // t10: selling climax (swing low, 2.7x volume, 2.7x range)
    rows.push((101.4, 101.5, 96.5, 97.0, 500.0));
    // t11-t13: automatic rally into the t13 swing high
    rows.push((97.0, 100.0, 96.9, 99.5, 150.0));
    rows.push((99.5, 100.8, 99.2, 100.3, 120.0));
    rows.push((100.3, 100.9, 100.0, 100.5, 110.0));
    // t14-t16: drift back down
    rows.push((100.5, 100.6, 99.8, 100.0, 100.0));
    rows.push((100.0, 100.2, 99.4, 99.6, 95.0));
    rows.push((99.6, 99.7, 97.8, 98.0, 90.0));
    // t17: first secondary test (swing low near the climax low)
    rows.push((98.0, 98.2, 97.0, 97.6, 80.0));
    rows.push((97.6, 98.6, 97.4, 98.4, 85.0));
    rows.push((98.4, 99.2, 98.2, 99.0, 90.0));
    // t20-t21: second secondary test
    rows.push((99.0, 99.1, 98.0, 98.2, 85.0));
    rows.push((98.2, 98.3, 96.8, 97.4, 75.0));
    rows.push((97.4, 98.2, 97.2, 98.0, 80.0));
    rows.push((98.0, 98.8, 97.9, 98.6, 85.0));
    // t24: spring pierces support and reclaims it on a volume surge
    rows.push((97.0, 97.8, 95.9, 97.5, 250.0));
    // t25: low-volume retest holds
    rows.push((97.5, 98.2, 97.3, 98.0, 70.0));
    rows.push((98.0, 99.2, 97.8, 99.0, 90.0));
    // t27: sign of strength closes above resistance on expanding volume
    rows.push((99.0, 102.8, 98.8, 102.5, 400.0));
    // t28: last point of support holds the broken level
    rows.push((102.5, 103.3, 102.2, 103.0, 150.0));
    rows.push((103.0, 103.8, 102.8, 103.5, 140.0));
    rows
}

/// Extends the accumulation cycle with markup, a buying climax, automatic
/// reaction, secondary test, upthrust and a sign of weakness: one full
/// distribution cycle on top.
fn full_cycle_rows() -> Vec<(f64, f64, f64, f64, f64)> {
    let mut rows = accumulation_rows();
    // t30-t32: markup continues
    rows.push((103.5, 104.3, 103.3, 104.0, 140.0));
    rows.push((104.0, 104.8, 103.8, 104.5, 145.0));
    rows.push((104.5, 105.3, 104.3, 105.0, 150.0));
    // t33: buying climax (swing high, climactic volume and range)
    rows.push((105.0, 109.5, 104.8, 109.0, 700.0));
    // t34-t35: automatic reaction into the t35 swing low
    rows.push((109.0, 109.2, 105.6, 106.5, 200.0));
    rows.push((106.5, 107.0, 104.5, 105.2, 150.0));
    rows.push((105.2, 106.4, 104.9, 106.0, 140.0));
    rows.push((106.0, 107.2, 105.7, 106.8, 135.0));
    rows.push((106.8, 107.8, 106.5, 107.4, 130.0));
    // t39: secondary test of the climax high
    rows.push((107.4, 108.8, 107.2, 108.3, 160.0));
    rows.push((108.3, 108.5, 107.3, 107.6, 140.0));
    rows.push((107.6, 107.9, 106.8, 107.0, 135.0));
    // t42: upthrust pierces resistance and is rejected
    rows.push((107.0, 110.2, 106.9, 108.5, 350.0));
    rows.push((108.5, 108.7, 106.7, 107.0, 180.0));
    // t44: sign of weakness closes below support
    rows.push((107.0, 107.2, 102.8, 103.0, 500.0));
    // t45: last point of supply fails at the broken level
    rows.push((103.0, 104.6, 102.9, 103.8, 200.0));
    rows.push((103.8, 104.0, 102.9, 103.2, 150.0));
    rows
}

fn kinds(analysis: &analysis_core::types::WyckoffAnalysis) -> Vec<WyckoffEventKind> {
    analysis.events.iter().map(|e| e.kind).collect()
}

#[test]
fn accumulation_cycle_emits_the_full_event_sequence() {
    let params = test_params();
    let data = preprocess(&accumulation_rows(), &params);
    let analysis = WyckoffAnalyzer::new(params).analyze(&data).unwrap();

    assert_eq!(
        kinds(&analysis),
        vec![
            WyckoffEventKind::Sc,
            WyckoffEventKind::Ar,
            WyckoffEventKind::St,
            WyckoffEventKind::St,
            WyckoffEventKind::Spring,
            WyckoffEventKind::Test,
            WyckoffEventKind::Sos,
            WyckoffEventKind::Lps,
        ]
    );

    assert_eq!(analysis.trading_ranges.len(), 1);
    let range = &analysis.trading_ranges[0];
    assert_eq!(range.kind, RangeKind::Accumulation);
    assert_eq!(range.start, ts(10));
    assert_eq!(range.end, Some(ts(27)));
    assert!((range.support - 96.5).abs() < 1e-9);
    assert!((range.resistance - 100.9).abs() < 1e-9);

    let phase_order: Vec<_> = analysis.phases.iter().map(|p| p.phase).collect();
    assert_eq!(
        phase_order,
        vec![
            analysis_core::types::WyckoffPhase::A,
            analysis_core::types::WyckoffPhase::B,
            analysis_core::types::WyckoffPhase::C,
            analysis_core::types::WyckoffPhase::D,
            analysis_core::types::WyckoffPhase::E,
        ]
    );
    assert_eq!(analysis.phases[0].start, ts(10));
    assert_eq!(analysis.phases.last().unwrap().end, None);

    assert_eq!(analysis.final_context, MarketContext::Uptrend);
}

#[test]
fn events_are_emitted_in_timestamp_order() {
    let params = test_params();
    let data = preprocess(&full_cycle_rows(), &params);
    let analysis = WyckoffAnalyzer::new(params).analyze(&data).unwrap();

    for pair in analysis.events.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[test]
fn full_cycle_runs_accumulation_then_distribution() {
    let params = test_params();
    let data = preprocess(&full_cycle_rows(), &params);
    let analysis = WyckoffAnalyzer::new(params).analyze(&data).unwrap();

    let kinds = kinds(&analysis);
    for expected in [
        WyckoffEventKind::Sc,
        WyckoffEventKind::Ar,
        WyckoffEventKind::Spring,
        WyckoffEventKind::Sos,
        WyckoffEventKind::Lps,
        WyckoffEventKind::Bc,
        WyckoffEventKind::AutoReaction,
        WyckoffEventKind::Ut,
        WyckoffEventKind::Sow,
        WyckoffEventKind::Lpsy,
    ] {
        assert!(kinds.contains(&expected), "missing {expected:?}");
    }

    assert_eq!(analysis.trading_ranges.len(), 2);
    assert_eq!(analysis.trading_ranges[0].kind, RangeKind::Accumulation);
    assert_eq!(analysis.trading_ranges[1].kind, RangeKind::Distribution);
    for range in &analysis.trading_ranges {
        assert!(range.support < range.resistance);
    }

    assert_eq!(analysis.final_context, MarketContext::Downtrend);
}

#[test]
fn constant_prices_produce_no_events() {
    let params = test_params();
    let rows: Vec<_> = (0..20).map(|_| (100.0, 100.0, 100.0, 100.0, 100.0)).collect();
    let data = preprocess(&rows, &params);
    let analysis = WyckoffAnalyzer::new(params).analyze(&data).unwrap();

    assert!(analysis.events.is_empty());
    assert!(analysis.trading_ranges.is_empty());
    assert!(analysis.phases.is_empty());
    assert_eq!(analysis.final_context, MarketContext::Undetermined);
}

#[test]
fn too_short_series_is_insufficient_data() {
    let params = test_params();
    let n = 6; // vol_lookback + swing_n = 7
    let data = ProcessedData {
        timestamps: (0..n).map(ts).collect(),
        open: vec![100.0; n],
        high: vec![100.0; n],
        low: vec![100.0; n],
        close: vec![100.0; n],
        volume: vec![100.0; n],
        spread: vec![0.0; n],
        body_percent: vec![0.0; n],
        upper_wick: vec![0.0; n],
        lower_wick: vec![0.0; n],
        avg_volume: vec![100.0; n],
        avg_spread: vec![0.0; n],
        volume_ratio: vec![1.0; n],
        atr: vec![0.0; n],
        obv: vec![0.0; n],
        volume_class: vec![VolumeClass::Average; n],
        candle_class: vec![CandleClass::Neutral; n],
        price_direction: vec![PriceDirection::Sideways; n],
        volume_direction: vec![VolumeDirection::Flat; n],
    };

    let err = WyckoffAnalyzer::new(params).analyze(&data).unwrap_err();
    assert!(matches!(err, AnalysisError::InsufficientData(_)));
}
