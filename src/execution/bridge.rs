use std::collections::HashSet;
use std::sync::Mutex;

use alloy::primitives::keccak256;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Operation;
use crate::tuning::bridge_pair_fee;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("no bridge route for {asset} from {from} to {to}")]
    NoRoute {
        from: String,
        to: String,
        asset: String,
    },

    #[error("bridge transfer failed: {0}")]
    Failed(String),
}

/// A bridge and the routes it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeOption {
    pub name: String,
    /// Any ordered pair of distinct chains in this list is supported.
    pub chains: Vec<String>,
    pub assets: Vec<String>,
    /// Applied to the pair's base bridge fee.
    pub fee_multiplier: Decimal,
    pub eta_secs: u64,
}

impl BridgeOption {
    pub fn supports(&self, from: &str, to: &str, asset: &str) -> bool {
        let has_chain = |c: &str| self.chains.iter().any(|x| x.eq_ignore_ascii_case(c));
        !from.eq_ignore_ascii_case(to)
            && has_chain(from)
            && has_chain(to)
            && self.assets.iter().any(|a| a.eq_ignore_ascii_case(asset))
    }
}

/// A bridge chosen for one transfer, with its quoted fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeQuote {
    pub bridge: String,
    pub from_chain: String,
    pub to_chain: String,
    pub asset: String,
    pub fee_usd: Decimal,
    pub eta_secs: u64,
}

/// Pick the cheapest bridge serving the pair and asset; ties go to the
/// faster, then alphabetically first.
pub fn select_bridge(
    options: &[BridgeOption],
    from: &str,
    to: &str,
    asset: &str,
) -> Result<BridgeQuote, BridgeError> {
    let no_route = || BridgeError::NoRoute {
        from: from.to_string(),
        to: to.to_string(),
        asset: asset.to_string(),
    };
    let from = from.to_lowercase();
    let to = to.to_lowercase();
    let base_fee = bridge_pair_fee(&from, &to).ok_or_else(no_route)?;

    options
        .iter()
        .filter(|o| o.supports(&from, &to, asset))
        .map(|o| BridgeQuote {
            bridge: o.name.clone(),
            from_chain: from.clone(),
            to_chain: to.clone(),
            asset: asset.to_uppercase(),
            fee_usd: (base_fee * o.fee_multiplier).round_dp(2),
            eta_secs: o.eta_secs,
        })
        .min_by(|a, b| {
            a.fee_usd
                .cmp(&b.fee_usd)
                .then(a.eta_secs.cmp(&b.eta_secs))
                .then_with(|| a.bridge.cmp(&b.bridge))
        })
        .ok_or_else(no_route)
}

/// Moves value between chains. Bridging is opaque: the router only reports
/// when (and whether) funds arrived on the destination chain.
#[async_trait]
pub trait BridgeRouter: Send + Sync {
    fn options(&self) -> Vec<BridgeOption>;

    /// Wait for the transfer started by `source_tx` to land; returns the
    /// destination-chain transaction hash.
    async fn await_arrival(
        &self,
        quote: &BridgeQuote,
        operation: &Operation,
        source_tx: &str,
    ) -> Result<String, BridgeError>;
}

/// Fixed bridge table. Arrivals confirm immediately unless the destination
/// chain is marked as failing.
#[derive(Debug, Default)]
pub struct StaticBridgeRouter {
    options: Vec<BridgeOption>,
    failing_destinations: Mutex<HashSet<String>>,
}

impl StaticBridgeRouter {
    pub fn new(options: Vec<BridgeOption>) -> Self {
        Self {
            options,
            failing_destinations: Mutex::new(HashSet::new()),
        }
    }

    pub fn mainnet() -> Self {
        let option = |name: &str, chains: &[&str], assets: &[&str], mult: Decimal, eta: u64| BridgeOption {
            name: name.into(),
            chains: chains.iter().map(|c| c.to_string()).collect(),
            assets: assets.iter().map(|a| a.to_string()).collect(),
            fee_multiplier: mult,
            eta_secs: eta,
        };

        Self::new(vec![
            option(
                "across",
                &["ethereum", "arbitrum", "optimism", "base", "polygon"],
                &["USDC", "USDT", "DAI", "WETH", "ETH"],
                Decimal::ONE,
                180,
            ),
            option(
                "stargate",
                &["ethereum", "arbitrum", "optimism", "base", "polygon", "bsc", "avalanche"],
                &["USDC", "USDT", "WETH", "ETH"],
                Decimal::new(12, 1),
                600,
            ),
            option(
                "cctp",
                &["ethereum", "arbitrum", "optimism", "base", "polygon", "avalanche"],
                &["USDC"],
                Decimal::new(8, 1),
                1_200,
            ),
        ])
    }

    /// Every transfer into `chain` fails to arrive.
    pub fn fail_arrivals_on(&self, chain: &str) {
        self.failing_destinations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(chain.to_lowercase());
    }
}

#[async_trait]
impl BridgeRouter for StaticBridgeRouter {
    fn options(&self) -> Vec<BridgeOption> {
        self.options.clone()
    }

    async fn await_arrival(
        &self,
        quote: &BridgeQuote,
        operation: &Operation,
        source_tx: &str,
    ) -> Result<String, BridgeError> {
        let failing = self
            .failing_destinations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&quote.to_chain);
        if failing {
            return Err(BridgeError::Failed(format!(
                "{} transfer {} never arrived on {}",
                quote.bridge, source_tx, quote.to_chain
            )));
        }

        let digest = keccak256(format!("{}:{}:{}:{}", quote.bridge, source_tx, operation.chain, operation.sequence));
        Ok(digest.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_cheapest_supported_bridge() {
        let router = StaticBridgeRouter::mainnet();
        let quote = select_bridge(&router.options(), "ethereum", "arbitrum", "usdc").unwrap();
        // cctp: 12.00 × 0.8
        assert_eq!(quote.bridge, "cctp");
        assert_eq!(quote.fee_usd, Decimal::new(960, 2));
    }

    #[test]
    fn test_asset_filter_applies() {
        let router = StaticBridgeRouter::mainnet();
        let quote = select_bridge(&router.options(), "ethereum", "arbitrum", "WETH").unwrap();
        assert_eq!(quote.bridge, "across");
    }

    #[test]
    fn test_no_route_is_explicit() {
        let router = StaticBridgeRouter::mainnet();
        let err = select_bridge(&router.options(), "bsc", "avalanche", "DAI").unwrap_err();
        assert!(matches!(err, BridgeError::NoRoute { .. }));
        assert!(select_bridge(&router.options(), "ethereum", "solana", "USDC").is_err());
        assert!(select_bridge(&router.options(), "base", "base", "USDC").is_err());
    }

    #[test]
    fn test_ties_prefer_faster_then_name() {
        let opts = vec![
            BridgeOption {
                name: "slow".into(),
                chains: vec!["base".into(), "optimism".into()],
                assets: vec!["USDC".into()],
                fee_multiplier: Decimal::ONE,
                eta_secs: 900,
            },
            BridgeOption {
                name: "fast".into(),
                chains: vec!["base".into(), "optimism".into()],
                assets: vec!["USDC".into()],
                fee_multiplier: Decimal::ONE,
                eta_secs: 60,
            },
        ];
        assert_eq!(select_bridge(&opts, "base", "optimism", "USDC").unwrap().bridge, "fast");
    }
}
