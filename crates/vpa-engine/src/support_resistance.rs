use std::sync::Arc;

use analysis_core::types::{PriceLevel, SupportResistanceAnalysis};
use analysis_core::{AnalysisError, Parameters, ProcessedData};

use crate::rolling::{pivot_highs, pivot_lows};

/// Derives clustered support and resistance levels from close pivots,
/// weighted by the volume traded at the contributing pivot bars.
#[derive(Debug)]
pub struct SupportResistanceAnalyzer {
    params: Arc<Parameters>,
}

struct Pivot {
    index: usize,
    price: f64,
}

impl SupportResistanceAnalyzer {
    pub fn new(params: Arc<Parameters>) -> Self {
        Self { params }
    }

    pub fn analyze(&self, data: &ProcessedData) -> Result<SupportResistanceAnalysis, AnalysisError> {
        let p = self.params.as_ref();
        let current_price = data.last_close().ok_or_else(|| {
            AnalysisError::InsufficientData("empty series for support/resistance".to_string())
        })?;

        let lows: Vec<Pivot> = pivot_lows(&data.close, p.pivot_window)
            .into_iter()
            .map(|index| Pivot { index, price: data.close[index] })
            .collect();
        let highs: Vec<Pivot> = pivot_highs(&data.close, p.pivot_window)
            .into_iter()
            .map(|index| Pivot { index, price: data.close[index] })
            .collect();

        let mut levels = self.cluster(data, lows);
        levels.extend(self.cluster(data, highs));

        let mut support: Vec<PriceLevel> = levels
            .iter()
            .filter(|l| l.price < current_price)
            .cloned()
            .collect();
        let mut resistance: Vec<PriceLevel> = levels
            .into_iter()
            .filter(|l| l.price > current_price)
            .collect();

        rank_levels(&mut support, p.max_levels);
        rank_levels(&mut resistance, p.max_levels);

        Ok(SupportResistanceAnalysis { support, resistance })
    }

    /// Merge pivots lying within `cluster_tolerance_pct` of each other into
    /// a single level at the cluster median.
    fn cluster(&self, data: &ProcessedData, mut pivots: Vec<Pivot>) -> Vec<PriceLevel> {
        let tolerance = self.params.cluster_tolerance_pct;
        pivots.sort_by(|a, b| a.price.total_cmp(&b.price));

        let mut levels = Vec::new();
        let mut cluster: Vec<&Pivot> = Vec::new();
        for pivot in &pivots {
            let fits = cluster
                .first()
                .map(|anchor| (pivot.price - anchor.price) / anchor.price <= tolerance)
                .unwrap_or(false);
            if fits {
                cluster.push(pivot);
            } else {
                if !cluster.is_empty() {
                    levels.push(close_cluster(data, &cluster));
                }
                cluster = vec![pivot];
            }
        }
        if !cluster.is_empty() {
            levels.push(close_cluster(data, &cluster));
        }
        levels
    }
}

fn close_cluster(data: &ProcessedData, cluster: &[&Pivot]) -> PriceLevel {
    // Cluster members arrive sorted by price, so the median is positional.
    let mid = cluster.len() / 2;
    let price = if cluster.len() % 2 == 1 {
        cluster[mid].price
    } else {
        (cluster[mid - 1].price + cluster[mid].price) / 2.0
    };

    let volume = cluster.iter().map(|p| data.volume[p.index]).sum();
    let last_touched = cluster
        .iter()
        .map(|p| data.timestamps[p.index])
        .max()
        .expect("cluster is never empty");

    PriceLevel { price, volume, last_touched }
}

/// Rank by summed volume, break ties by recency, trim to `max_levels`.
fn rank_levels(levels: &mut Vec<PriceLevel>, max_levels: usize) {
    levels.sort_by(|a, b| {
        b.volume
            .total_cmp(&a.volume)
            .then(b.last_touched.cmp(&a.last_touched))
    });
    levels.truncate(max_levels);
}
