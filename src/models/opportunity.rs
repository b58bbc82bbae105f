use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordinal risk level used by opportunities and holder tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn rank(&self) -> i32 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyCategory {
    Lending,
    Staking,
    LiquidityProvision,
    Farming,
}

impl StrategyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyCategory::Lending => "lending",
            StrategyCategory::Staking => "staking",
            StrategyCategory::LiquidityProvision => "liquidity_provision",
            StrategyCategory::Farming => "farming",
        }
    }

    /// Categories whose positions are exposed to impermanent loss.
    pub fn has_pool_exposure(&self) -> bool {
        matches!(
            self,
            StrategyCategory::LiquidityProvision | StrategyCategory::Farming
        )
    }
}

impl fmt::Display for StrategyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalogued place to earn yield on an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldOpportunity {
    pub id: String,
    pub name: String,
    pub chain: String,
    pub protocol: String,
    pub asset: String,
    /// Annualized yield, percent.
    pub apy: Decimal,
    pub tvl_usd: Decimal,
    pub min_deposit: Decimal,
    pub max_deposit: Option<Decimal>,
    pub risk_level: RiskLevel,
    pub strategy: StrategyCategory,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Name of the indexer backend that supplied the record.
    #[serde(default)]
    pub source: String,
}

impl YieldOpportunity {
    pub fn key(&self) -> OpportunityKey {
        OpportunityKey {
            chain: self.chain.to_lowercase(),
            protocol: self.protocol.to_lowercase(),
            asset: self.asset.to_uppercase(),
            strategy: self.strategy,
        }
    }

    pub fn matches_symbol(&self, symbol: &str) -> bool {
        self.asset.eq_ignore_ascii_case(symbol)
    }
}

/// Identity used to reconcile records reported by different indexers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpportunityKey {
    pub chain: String,
    pub protocol: String,
    pub asset: String,
    pub strategy: StrategyCategory,
}

impl fmt::Display for OpportunityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chain, self.protocol, self.asset, self.strategy
        )
    }
}

/// One observation of an opportunity's yield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApySample {
    pub apy: Decimal,
    pub tvl_usd: Decimal,
    pub observed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
