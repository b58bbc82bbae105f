use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Asset;

/// A chain that contributed nothing to a scan, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainFailure {
    pub chain: String,
    pub reason: String,
}

/// Immutable result of one holdings scan. A rescan produces a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub address: String,
    pub assets: Vec<Asset>,
    pub failed_chains: Vec<ChainFailure>,
    /// `chain:symbol` balances that were dropped because no price was available.
    pub unpriced: Vec<String>,
    pub scanned_at: DateTime<Utc>,
    pub total_value: Decimal,
}

impl PortfolioSnapshot {
    pub fn new(
        address: String,
        assets: Vec<Asset>,
        failed_chains: Vec<ChainFailure>,
        unpriced: Vec<String>,
        scanned_at: DateTime<Utc>,
    ) -> Self {
        let total_value = assets.iter().map(|a| a.value_usd).sum();
        Self {
            address,
            assets,
            failed_chains,
            unpriced,
            scanned_at,
            total_value,
        }
    }

    /// An empty snapshot, e.g. for a holder with nothing on any chain.
    pub fn empty(address: &str, scanned_at: DateTime<Utc>) -> Self {
        Self::new(address.to_string(), Vec::new(), Vec::new(), Vec::new(), scanned_at)
    }

    pub fn is_partial(&self) -> bool {
        !self.failed_chains.is_empty()
    }
}

/// Value-weighted APY (percent) of a set of holdings; idle holdings count as 0%.
pub fn weighted_apy(assets: &[Asset]) -> Decimal {
    let total: Decimal = assets.iter().map(|a| a.value_usd).sum();
    if total.is_zero() {
        return Decimal::ZERO;
    }
    assets
        .iter()
        .map(|a| a.value_usd * a.apy_or_zero())
        .sum::<Decimal>()
        / total
}

/// Expected yearly yield in USD of a set of holdings.
pub fn annual_yield_usd(assets: &[Asset]) -> Decimal {
    assets
        .iter()
        .map(|a| a.value_usd * a.apy_or_zero() / Decimal::ONE_HUNDRED)
        .sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn asset(value: i64, apy: Option<i64>) -> Asset {
        Asset {
            symbol: "USDC".into(),
            chain: "ethereum".into(),
            protocol: apy.map(|_| "aave-v3".to_string()),
            token_address: Some("0xa0b8".into()),
            quantity: Decimal::from(value),
            value_usd: Decimal::from(value),
            apy: apy.map(Decimal::from),
            risk_score: None,
        }
    }

    #[test]
    fn test_weighted_apy() {
        let assets = vec![asset(750, Some(4)), asset(250, None)];
        assert_eq!(weighted_apy(&assets), Decimal::from(3));
        assert_eq!(annual_yield_usd(&assets), Decimal::from(30));
    }

    #[test]
    fn test_weighted_apy_empty() {
        assert_eq!(weighted_apy(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_snapshot_totals_and_partial_flag() {
        let snapshot = PortfolioSnapshot::new(
            "0xholder".into(),
            vec![asset(100, None), asset(50, None)],
            vec![ChainFailure {
                chain: "polygon".into(),
                reason: "timeout".into(),
            }],
            vec![],
            Utc::now(),
        );
        assert_eq!(snapshot.total_value, Decimal::from(150));
        assert!(snapshot.is_partial());
    }
}
