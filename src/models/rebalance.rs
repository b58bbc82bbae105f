use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{Asset, ChainFailure};

/// How an action moves the holder's risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskChange {
    Increased,
    Decreased,
    Unchanged,
    /// Funds enter a position with nothing to compare against.
    New,
}

impl fmt::Display for RiskChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskChange::Increased => write!(f, "increased"),
            RiskChange::Decreased => write!(f, "decreased"),
            RiskChange::Unchanged => write!(f, "unchanged"),
            RiskChange::New => write!(f, "new"),
        }
    }
}

/// One unit of portfolio change.
///
/// A move has both `from` and `to`. A residual surplus with nowhere to go
/// has only `from` (exit to wallet); a residual deficit with no funding
/// position has only `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalancingAction {
    pub id: Uuid,
    pub from: Option<Asset>,
    pub to: Option<Asset>,
    /// Units of the source asset (or destination asset when there is no source).
    pub amount: Decimal,
    pub value_usd: Decimal,
    pub reason: String,
    /// Destination APY minus source APY, percentage points.
    pub expected_apy_delta: Decimal,
    pub risk_change: RiskChange,
    /// Destination is not present in the current portfolio.
    #[serde(default)]
    pub new_position: bool,
    /// Actions that must complete before this one is attempted.
    #[serde(default)]
    pub depends_on: Vec<Uuid>,
}

impl RebalancingAction {
    pub fn is_cross_chain(&self) -> bool {
        match (&self.from, &self.to) {
            (Some(from), Some(to)) => !from.chain.eq_ignore_ascii_case(&to.chain),
            _ => false,
        }
    }

    /// Chain the action starts on.
    pub fn source_chain(&self) -> Option<&str> {
        self.from
            .as_ref()
            .or(self.to.as_ref())
            .map(|a| a.chain.as_str())
    }
}

impl fmt::Display for RebalancingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self
            .from
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "new funds".into());
        let to = self
            .to
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "wallet".into());
        write!(f, "{} -> {} (${})", from, to, self.value_usd.round_dp(2))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRebalanceReport {
    pub current_portfolio: Vec<Asset>,
    pub recommended_portfolio: Vec<Asset>,
    pub actions: Vec<RebalancingAction>,
    /// Target weighted APY minus current weighted APY, percentage points.
    pub potential_apy_increase: Decimal,
    /// Target weighted risk minus current weighted risk, 0–10 scale.
    pub potential_risk_change: f64,
    pub estimated_annual_yield_difference: Decimal,
    /// Chains the holdings scan could not read; the plan ignores them.
    #[serde(default)]
    pub failed_chains: Vec<ChainFailure>,
}
