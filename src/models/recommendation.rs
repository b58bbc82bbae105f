use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

use super::{ChainFailure, RiskLevel, YieldOpportunity};

/// Holder preferences driving opportunity scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationCriteria {
    pub risk_tolerance: RiskLevel,
    #[serde(default)]
    pub prioritize_highest_yield: bool,
    #[serde(default)]
    pub preferred_chains: Option<Vec<String>>,
    #[serde(default)]
    pub preferred_assets: Option<Vec<String>>,
    #[serde(default)]
    pub preferred_protocols: Option<Vec<String>>,
    /// Minimum TVL (USD). Opportunities below it are penalized, not dropped.
    #[serde(default)]
    pub min_liquidity: Option<Decimal>,
    /// Maximum acceptable slippage, percent.
    #[serde(default)]
    pub max_slippage: Option<Decimal>,
}

impl Default for OptimizationCriteria {
    fn default() -> Self {
        Self {
            risk_tolerance: RiskLevel::Medium,
            prioritize_highest_yield: false,
            preferred_chains: None,
            preferred_assets: None,
            preferred_protocols: None,
            min_liquidity: None,
            max_slippage: None,
        }
    }
}

impl OptimizationCriteria {
    /// Reject malformed criteria before any network work starts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(min) = self.min_liquidity {
            if min < Decimal::ZERO {
                return Err(ValidationError::new(
                    "min_liquidity",
                    format!("must not be negative, got {min}"),
                ));
            }
        }

        if let Some(slippage) = self.max_slippage {
            if slippage < Decimal::ZERO || slippage > Decimal::ONE_HUNDRED {
                return Err(ValidationError::new(
                    "max_slippage",
                    format!("must be within 0..=100 percent, got {slippage}"),
                ));
            }
        }

        for (field, list) in [
            ("preferred_chains", &self.preferred_chains),
            ("preferred_assets", &self.preferred_assets),
            ("preferred_protocols", &self.preferred_protocols),
        ] {
            if let Some(values) = list {
                if values.iter().any(|v| v.trim().is_empty()) {
                    return Err(ValidationError::new(field, "contains a blank entry"));
                }
            }
        }

        Ok(())
    }

    pub fn prefers_chain(&self, chain: &str) -> bool {
        contains_ignore_case(self.preferred_chains.as_deref(), chain)
    }

    pub fn prefers_asset(&self, symbol: &str) -> bool {
        contains_ignore_case(self.preferred_assets.as_deref(), symbol)
    }

    pub fn prefers_protocol(&self, protocol: &str) -> bool {
        contains_ignore_case(self.preferred_protocols.as_deref(), protocol)
    }
}

fn contains_ignore_case(list: Option<&[String]>, needle: &str) -> bool {
    list.map(|values| values.iter().any(|v| v.trim().eq_ignore_ascii_case(needle)))
        .unwrap_or(false)
}

/// A scored, explained opportunity for one holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub opportunity: YieldOpportunity,
    /// Always >= 0.
    pub score: f64,
    pub reasons: Vec<String>,
    /// Annualized return, percent.
    pub estimated_apy: Decimal,
    /// Expected yearly reward in USD on the holder's matching asset.
    pub estimated_annual_reward: Decimal,
    pub suggested_optimizations: Vec<String>,
    /// True when the holder's matching asset sits on another chain.
    pub requires_bridge: bool,
    pub source_chain: Option<String>,
}

/// Risk profile of a recommended set (not the whole catalog).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRisk {
    pub average_risk: f64,
    pub diversification_score: f64,
    pub protocol_risk_score: f64,
    pub impermanent_loss_risk: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub address: String,
    pub recommendations: Vec<Recommendation>,
    /// Equal-weighted mean APY of the top three recommendations.
    pub total_potential_yield: Decimal,
    /// Value-weighted APY of current holdings.
    pub total_current_yield: Decimal,
    pub potential_additional_yield: Decimal,
    pub risk_assessment: RecommendationRisk,
    /// Chains whose holdings could not be read for this report.
    pub failed_chains: Vec<ChainFailure>,
}

impl OptimizationReport {
    pub fn is_partial(&self) -> bool {
        !self.failed_chains.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
