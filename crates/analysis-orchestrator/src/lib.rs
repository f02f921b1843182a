//! Facade wiring the whole pipeline: fetch per timeframe through the
//! injected provider, preprocess, run the per-timeframe analyzers and the
//! Wyckoff state machine, then synthesize the signal and its risk
//! parameters. Analyzers are owned by composition and share one read-only
//! parameters object; per-timeframe failures are isolated and recorded.

use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::types::{Signal, SignalType, Timeframe, TimeframeSpec, WyckoffAnalysis};
use analysis_core::{
    AnalysisError, AnalysisResult, CancellationFlag, DataProvider, MultiTimeframeAnalysis,
    Parameters, ProcessedData,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use multi_timeframe::{MultiTimeframeAnalyzer, PointInTimeAnalyzer};
use signal_engine::{RiskAssessor, SignalGenerator};
use tracing::{debug, info, warn};
use vpa_engine::Processor;
use wyckoff_analyzer::WyckoffAnalyzer;

#[derive(Debug)]
pub struct MarketFlowEngine<P> {
    provider: P,
    params: Arc<Parameters>,
    processor: Processor,
    analyzer: MultiTimeframeAnalyzer,
    point_in_time: PointInTimeAnalyzer,
    wyckoff: WyckoffAnalyzer,
    signal_generator: SignalGenerator,
    risk_assessor: RiskAssessor,
}

impl<P: DataProvider> MarketFlowEngine<P> {
    /// Parameters are validated once here; analyzers never re-check them.
    pub fn new(provider: P, params: Parameters) -> Result<Self, AnalysisError> {
        let params = Arc::new(params.validated()?);
        Ok(Self {
            provider,
            processor: Processor::new(params.clone()),
            analyzer: MultiTimeframeAnalyzer::new(params.clone()),
            point_in_time: PointInTimeAnalyzer::new(params.clone()),
            wyckoff: WyckoffAnalyzer::new(params.clone()),
            signal_generator: SignalGenerator::new(params.clone()),
            risk_assessor: RiskAssessor::new(params.clone()),
            params,
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Analyze the configured timeframes without external cancellation.
    pub async fn analyze(&self, ticker: &str) -> Result<AnalysisResult, AnalysisError> {
        let specs = self.params.timeframes.clone();
        self.analyze_with(ticker, &specs, &CancellationFlag::new())
            .await
    }

    /// Full pipeline for one ticker. The cancellation flag is observed
    /// between the fetch, per-timeframe analysis and synthesis phases.
    pub async fn analyze_with(
        &self,
        ticker: &str,
        timeframes: &[TimeframeSpec],
        cancel: &CancellationFlag,
    ) -> Result<AnalysisResult, AnalysisError> {
        if timeframes.is_empty() {
            return Err(AnalysisError::InvalidConfiguration(
                "no timeframes requested".to_string(),
            ));
        }
        check_cancel(cancel)?;
        info!(ticker, timeframes = timeframes.len(), "starting analysis");

        // Fetch every timeframe concurrently; results are reassembled by
        // timeframe key so the outcome does not depend on completion order.
        let fetches = timeframes.iter().map(|spec| {
            let provider = &self.provider;
            async move {
                debug!(ticker, timeframe = spec.timeframe.as_str(), "fetching bars");
                let fetched = provider.fetch(ticker, spec.timeframe, &spec.window).await;
                (spec.timeframe, fetched)
            }
        });
        let fetched = join_all(fetches).await;
        check_cancel(cancel)?;

        let mut first_error: Option<AnalysisError> = None;
        let mut failed_timeframes: BTreeMap<Timeframe, String> = BTreeMap::new();
        let mut processed_by_tf: BTreeMap<Timeframe, ProcessedData> = BTreeMap::new();
        let mut wyckoff: BTreeMap<Timeframe, WyckoffAnalysis> = BTreeMap::new();

        for (timeframe, fetch_result) in fetched {
            check_cancel(cancel)?;
            let outcome = fetch_result
                .map_err(AnalysisError::from)
                .and_then(|(price, volume)| self.processor.preprocess(&price, &volume))
                .and_then(|processed| {
                    let wyckoff_analysis = self.wyckoff.analyze(&processed)?;
                    Ok((processed, wyckoff_analysis))
                });
            match outcome {
                Ok((processed, wyckoff_analysis)) => {
                    processed_by_tf.insert(timeframe, processed);
                    wyckoff.insert(timeframe, wyckoff_analysis);
                }
                Err(err) => {
                    warn!(
                        ticker,
                        timeframe = timeframe.as_str(),
                        error = %err,
                        "timeframe analysis failed"
                    );
                    failed_timeframes.insert(timeframe, err.to_string());
                    first_error.get_or_insert(err);
                }
            }
        }

        if processed_by_tf.is_empty() {
            return Err(first_error.unwrap_or_else(|| {
                AnalysisError::InsufficientData("no timeframe produced data".to_string())
            }));
        }

        // The primary timeframe is the first configured one that succeeded;
        // it anchors the current price and the risk levels.
        let primary_timeframe = timeframes
            .iter()
            .map(|spec| spec.timeframe)
            .find(|tf| processed_by_tf.contains_key(tf))
            .expect("at least one timeframe succeeded");
        let current_price = processed_by_tf[&primary_timeframe]
            .last_close()
            .ok_or_else(|| {
                AnalysisError::InternalInvariant("processed bundle with no bars".to_string())
            })?;

        check_cancel(cancel)?;
        let analysis = self.analyzer.analyze(processed_by_tf)?;

        check_cancel(cancel)?;
        let (signal, risk_assessment) =
            self.synthesize(ticker, &analysis, primary_timeframe, current_price);

        Ok(AnalysisResult {
            ticker: ticker.to_string(),
            current_price,
            primary_timeframe,
            timeframe_analyses: analysis.timeframes,
            failed_timeframes,
            confirmations: analysis.confirmations,
            signal,
            risk_assessment,
            wyckoff,
        })
    }

    /// Historical reconstruction: the same analysis structure, with every
    /// timeframe truncated at `as_of`.
    pub async fn analyze_at(
        &self,
        ticker: &str,
        as_of: DateTime<Utc>,
    ) -> Result<MultiTimeframeAnalysis, AnalysisError> {
        let mut raw = BTreeMap::new();
        for spec in &self.params.timeframes {
            match self.provider.fetch(ticker, spec.timeframe, &spec.window).await {
                Ok(series) => {
                    raw.insert(spec.timeframe, series);
                }
                Err(err) => {
                    warn!(
                        ticker,
                        timeframe = spec.timeframe.as_str(),
                        error = %err,
                        "fetch failed for point-in-time analysis"
                    );
                }
            }
        }
        self.point_in_time.analyze_at(&raw, as_of)
    }

    /// A risk-assessor failure must not sink the analysis: the signal is
    /// downgraded to NO_ACTION with the reason in its details.
    fn synthesize(
        &self,
        ticker: &str,
        analysis: &MultiTimeframeAnalysis,
        primary_timeframe: Timeframe,
        current_price: f64,
    ) -> (Signal, Option<analysis_core::types::RiskAssessment>) {
        let signal = self.signal_generator.generate(analysis);
        if signal.signal_type == SignalType::NoAction {
            return (signal, None);
        }

        let levels = &analysis
            .timeframes
            .get(&primary_timeframe)
            .unwrap_or_else(|| {
                analysis
                    .timeframes
                    .values()
                    .next()
                    .expect("analysis has at least one timeframe")
            })
            .support_resistance;

        match self
            .risk_assessor
            .assess(signal.signal_type, current_price, levels)
        {
            Ok(risk) => (signal, risk),
            Err(err) => {
                warn!(ticker, error = %err, "risk assessment failed, downgrading signal");
                let downgraded = Signal {
                    signal_type: SignalType::NoAction,
                    strength: analysis_core::types::SignalStrength::Neutral,
                    details: format!("downgraded to NO_ACTION: risk assessment failed ({err})"),
                    evidence: signal.evidence,
                };
                (downgraded, None)
            }
        }
    }
}

fn check_cancel(cancel: &CancellationFlag) -> Result<(), AnalysisError> {
    if cancel.is_cancelled() {
        Err(AnalysisError::Cancelled)
    } else {
        Ok(())
    }
}
