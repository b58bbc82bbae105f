use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::chains::ChainRegistry;
use crate::clock::Clock;
use crate::models::{is_stable_symbol, RiskLevel, StrategyCategory, YieldOpportunity};

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("indexer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("indexer unavailable: {0}")]
    Unavailable(String),

    #[error("malformed indexer payload: {0}")]
    Decode(String),
}

/// A source of yield opportunity records.
#[async_trait]
pub trait OpportunityIndexer: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<YieldOpportunity>, IndexerError>;
}

// ---------------------------------------------------------------------------
// DefiLlama yields
// ---------------------------------------------------------------------------

/// Protocols with public audits and a long production record.
const AUDITED_PROTOCOLS: &[&str] = &[
    "aave-v3",
    "aave-v2",
    "compound-v3",
    "compound-v2",
    "lido",
    "rocket-pool",
    "uniswap-v3",
    "curve-dex",
    "convex-finance",
    "balancer-v2",
    "morpho-blue",
    "spark",
    "aerodrome-v1",
    "velodrome-v2",
    "pancakeswap-amm-v3",
    "benqi-lending",
    "gmx-v2-perps",
];

const STAKING_HINTS: &[&str] = &["lido", "rocket-pool", "staking", "stake", "liquid"];

#[derive(Debug, Deserialize)]
struct PoolsResponse {
    data: Vec<Pool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pool {
    pool: String,
    chain: String,
    project: String,
    symbol: String,
    #[serde(default)]
    tvl_usd: Option<f64>,
    #[serde(default)]
    apy: Option<f64>,
    #[serde(default)]
    apy_reward: Option<f64>,
    #[serde(default)]
    stablecoin: Option<bool>,
    #[serde(default)]
    il_risk: Option<String>,
    #[serde(default)]
    exposure: Option<String>,
    #[serde(default)]
    pool_meta: Option<String>,
}

/// Client for the DefiLlama `pools` endpoint, restricted to registry chains.
pub struct DefiLlamaIndexer {
    http: Client,
    url: String,
    registry: Arc<ChainRegistry>,
    min_tvl: Decimal,
    clock: Arc<dyn Clock>,
}

impl DefiLlamaIndexer {
    pub fn new(
        url: impl Into<String>,
        registry: Arc<ChainRegistry>,
        min_tvl: Decimal,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            url: url.into(),
            registry,
            min_tvl,
            clock,
        })
    }

    fn map_pool(&self, pool: Pool, now: DateTime<Utc>) -> Option<YieldOpportunity> {
        let chain = registry_chain_id(&self.registry, &pool.chain)?;
        let apy = Decimal::from_f64(pool.apy?)?.round_dp(4);
        let tvl_usd = Decimal::from_f64(pool.tvl_usd?)?.round_dp(2);
        if apy < Decimal::ZERO || tvl_usd < self.min_tvl {
            return None;
        }

        let multi = pool.exposure.as_deref() == Some("multi");
        let il = pool.il_risk.as_deref() == Some("yes");
        let stable = pool.stablecoin.unwrap_or_else(|| is_stable_symbol(&pool.symbol));
        let rewarded = pool.apy_reward.unwrap_or(0.0) > 0.0;
        let project = pool.project.to_lowercase();

        let strategy = if multi && rewarded {
            StrategyCategory::Farming
        } else if multi {
            StrategyCategory::LiquidityProvision
        } else if STAKING_HINTS.iter().any(|h| project.contains(h)) {
            StrategyCategory::Staking
        } else {
            StrategyCategory::Lending
        };

        let risk_level = if il {
            RiskLevel::High
        } else if stable && !multi {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        };

        let name = match pool.pool_meta.as_deref() {
            Some(meta) if !meta.is_empty() => format!("{} {} ({})", pool.project, pool.symbol, meta),
            _ => format!("{} {}", pool.project, pool.symbol),
        };

        Some(YieldOpportunity {
            id: pool.pool,
            name,
            chain,
            protocol: project.clone(),
            asset: pool.symbol.to_uppercase(),
            apy,
            tvl_usd,
            min_deposit: Decimal::ZERO,
            max_deposit: None,
            risk_level,
            strategy,
            verified: AUDITED_PROTOCOLS.contains(&project.as_str()),
            created_at: now,
            updated_at: now,
            source: String::new(),
        })
    }
}

/// Map an indexer's chain label onto a registry id.
fn registry_chain_id(registry: &ChainRegistry, label: &str) -> Option<String> {
    let normalized = match label.to_lowercase().as_str() {
        "binance" | "bnb" | "bsc" => "bsc".to_string(),
        "op mainnet" => "optimism".to_string(),
        other => other.to_string(),
    };
    registry.get(&normalized).map(|c| c.id.clone())
}

#[async_trait]
impl OpportunityIndexer for DefiLlamaIndexer {
    fn name(&self) -> &str {
        "defillama"
    }

    async fn fetch(&self) -> Result<Vec<YieldOpportunity>, IndexerError> {
        let resp: PoolsResponse = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| IndexerError::Decode(e.to_string()))?;

        let now = self.clock.now();
        let total = resp.data.len();
        let records: Vec<YieldOpportunity> = resp
            .data
            .into_iter()
            .filter_map(|pool| self.map_pool(pool, now))
            .collect();

        tracing::info!(pools = total, kept = records.len(), "DefiLlama pools fetched");
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Static indexer
// ---------------------------------------------------------------------------

/// Fixed record list. Serves as the curated secondary backend in production
/// and as a deterministic backend in tests.
pub struct StaticIndexer {
    name: String,
    records: Mutex<Vec<YieldOpportunity>>,
    unavailable: Mutex<Option<String>>,
}

impl StaticIndexer {
    pub fn new(name: impl Into<String>, records: Vec<YieldOpportunity>) -> Self {
        Self {
            name: name.into(),
            records: Mutex::new(records),
            unavailable: Mutex::new(None),
        }
    }

    /// Hand-maintained list of well-known opportunities on the registry chains.
    pub fn curated(now: DateTime<Utc>) -> Self {
        use RiskLevel::*;
        use StrategyCategory::*;

        let seed = [
            ("ethereum", "aave-v3", "USDC", Lending, "4.80", 2_100_000_000_i64, Low),
            ("ethereum", "aave-v3", "WETH", Lending, "2.10", 4_500_000_000, Low),
            ("ethereum", "compound-v3", "USDC", Lending, "5.20", 900_000_000, Low),
            ("ethereum", "lido", "STETH", Staking, "3.20", 25_000_000_000, Low),
            ("ethereum", "curve-dex", "USDC-USDT", LiquidityProvision, "3.90", 180_000_000, Medium),
            ("arbitrum", "aave-v3", "USDC", Lending, "6.10", 450_000_000, Low),
            ("arbitrum", "uniswap-v3", "USDC-WETH", LiquidityProvision, "14.50", 120_000_000, Medium),
            ("arbitrum", "gmx-v2-perps", "WETH-USDC", Farming, "18.20", 300_000_000, High),
            ("optimism", "aave-v3", "USDC", Lending, "5.70", 120_000_000, Low),
            ("optimism", "velodrome-v2", "USDC-WETH", Farming, "16.40", 40_000_000, High),
            ("base", "aave-v3", "USDC", Lending, "6.40", 300_000_000, Low),
            ("base", "aerodrome-v1", "USDC-WETH", Farming, "22.30", 85_000_000, High),
            ("polygon", "aave-v3", "USDC", Lending, "5.50", 180_000_000, Low),
            ("polygon", "aave-v3", "WETH", Lending, "1.80", 90_000_000, Low),
            ("bsc", "pancakeswap-amm-v3", "USDT-USDC", LiquidityProvision, "7.20", 60_000_000, Medium),
            ("avalanche", "benqi-lending", "USDC", Lending, "6.90", 70_000_000, Medium),
        ];

        let records = seed
            .into_iter()
            .map(|(chain, protocol, asset, strategy, apy, tvl, risk_level)| YieldOpportunity {
                id: format!("{protocol}-{chain}-{}", asset.to_lowercase()),
                name: format!("{protocol} {asset} {strategy}"),
                chain: chain.into(),
                protocol: protocol.into(),
                asset: asset.into(),
                apy: apy.parse().unwrap_or(Decimal::ZERO),
                tvl_usd: Decimal::from(tvl),
                min_deposit: Decimal::ZERO,
                max_deposit: None,
                risk_level,
                strategy,
                verified: AUDITED_PROTOCOLS.contains(&protocol),
                created_at: now,
                updated_at: now,
                source: String::new(),
            })
            .collect();

        Self::new("curated", records)
    }

    pub fn set_records(&self, records: Vec<YieldOpportunity>) {
        *self.records.lock().unwrap_or_else(|e| e.into_inner()) = records;
    }

    /// Make every fetch fail with `reason`, or recover with `None`.
    pub fn set_unavailable(&self, reason: Option<String>) {
        *self.unavailable.lock().unwrap_or_else(|e| e.into_inner()) = reason;
    }
}

#[async_trait]
impl OpportunityIndexer for StaticIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<YieldOpportunity>, IndexerError> {
        if let Some(reason) = self.unavailable.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(IndexerError::Unavailable(reason));
        }
        Ok(self.records.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
