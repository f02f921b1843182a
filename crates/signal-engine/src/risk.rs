use std::sync::Arc;

use analysis_core::types::{RiskAssessment, SignalType, SupportResistanceAnalysis, EPSILON};
use analysis_core::{AnalysisError, Parameters};

/// Derives stop, target, risk/reward and position size for an actionable
/// signal from the nearby support/resistance structure, with percentage
/// fallbacks when no usable level exists.
#[derive(Debug)]
pub struct RiskAssessor {
    params: Arc<Parameters>,
}

impl RiskAssessor {
    pub fn new(params: Arc<Parameters>) -> Self {
        Self { params }
    }

    /// Returns `None` for NO_ACTION; BUY/SELL always yield an assessment.
    pub fn assess(
        &self,
        signal_type: SignalType,
        current_price: f64,
        levels: &SupportResistanceAnalysis,
    ) -> Result<Option<RiskAssessment>, AnalysisError> {
        let p = self.params.as_ref();
        if signal_type == SignalType::NoAction {
            return Ok(None);
        }
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(AnalysisError::InternalInvariant(format!(
                "risk assessment with invalid current price {current_price}"
            )));
        }

        let (stop_loss, take_profit) = match signal_type {
            SignalType::Buy => {
                let stop = levels
                    .nearest_support_below(current_price)
                    .map(|level| level.price * (1.0 - p.stop_buffer_pct))
                    .unwrap_or(current_price * (1.0 - p.default_stop_pct));
                let target = levels
                    .nearest_resistance_above(current_price)
                    .map(|level| level.price * (1.0 - p.target_buffer_pct))
                    .filter(|&t| t > current_price)
                    .unwrap_or(
                        current_price * (1.0 + p.default_stop_pct * p.default_risk_reward),
                    );
                (stop, target)
            }
            SignalType::Sell => {
                let stop = levels
                    .nearest_resistance_above(current_price)
                    .map(|level| level.price * (1.0 + p.stop_buffer_pct))
                    .unwrap_or(current_price * (1.0 + p.default_stop_pct));
                let target = levels
                    .nearest_support_below(current_price)
                    .map(|level| level.price * (1.0 - p.target_buffer_pct))
                    .filter(|&t| t < current_price)
                    .unwrap_or(
                        current_price * (1.0 - p.default_stop_pct * p.default_risk_reward),
                    );
                (stop, target)
            }
            SignalType::NoAction => unreachable!("handled above"),
        };

        let risk_per_share = (current_price - stop_loss).abs();
        let risk_reward_ratio = if risk_per_share > EPSILON {
            (take_profit - current_price).abs() / risk_per_share
        } else {
            0.0
        };
        let position_size = if risk_per_share > EPSILON {
            (p.account_equity * p.default_risk_percent / risk_per_share)
                .floor()
                .max(0.0)
        } else {
            0.0
        };

        Ok(Some(RiskAssessment {
            stop_loss,
            take_profit,
            risk_reward_ratio,
            position_size,
            risk_per_share,
        }))
    }
}
