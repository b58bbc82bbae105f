use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use yieldrouter::catalog::{OpportunityIndexer, StaticIndexer};
use yieldrouter::chains::{ChainRegistry, InMemoryChainReader};
use yieldrouter::clock::SystemClock;
use yieldrouter::config::AppConfig;
use yieldrouter::execution::StaticBridgeRouter;
use yieldrouter::models::{Asset, RebalancingAction, RiskChange, RiskLevel, StrategyCategory, YieldOpportunity};
use yieldrouter::pricing::StaticPriceFeed;
use yieldrouter::{AppState, Context};

pub const HOLDER: &str = "0x1111111111111111111111111111111111111111";

/// Config with short timeouts for fast, offline tests.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    AppConfig {
        chain_call_timeout_ms: 200,
        indexer_timeout_ms: 200,
        operation_timeout_secs: 5,
        ..AppConfig::default()
    }
}

#[allow(dead_code)]
pub fn lending(id: &str, chain: &str, asset: &str, apy: i64) -> YieldOpportunity {
    YieldOpportunity {
        id: id.into(),
        name: format!("{asset} lending on {chain}"),
        chain: chain.into(),
        protocol: "aave-v3".into(),
        asset: asset.into(),
        apy: Decimal::from(apy),
        tvl_usd: Decimal::from(250_000_000),
        min_deposit: Decimal::ZERO,
        max_deposit: None,
        risk_level: RiskLevel::Low,
        strategy: StrategyCategory::Lending,
        verified: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        source: "test".into(),
    }
}

/// Holder with 1000 USDC on ethereum; catalog pays 5% there and 8% on arbitrum.
#[allow(dead_code)]
pub fn scenario_a() -> (InMemoryChainReader, Vec<YieldOpportunity>) {
    let reader = InMemoryChainReader::new().with_token("ethereum", HOLDER, "USDC", Decimal::from(1_000));
    let catalog = vec![
        lending("eth-usdc", "ethereum", "USDC", 5),
        lending("arb-usdc", "arbitrum", "USDC", 8),
    ];
    (reader, catalog)
}

#[allow(dead_code)]
pub fn build_context(reader: InMemoryChainReader, catalog: Vec<YieldOpportunity>) -> Context {
    let prices = StaticPriceFeed::new()
        .with_price("USDC", Decimal::ONE)
        .with_price("USDT", Decimal::ONE)
        .with_price("DAI", Decimal::ONE)
        .with_price("ETH", Decimal::from(3_000))
        .with_price("WETH", Decimal::from(3_000));
    let backend: Arc<dyn OpportunityIndexer> = Arc::new(StaticIndexer::new("test", catalog));

    Context::new(
        &test_config(),
        Arc::new(ChainRegistry::mainnets()),
        Arc::new(reader),
        Arc::new(prices),
        vec![backend],
        Arc::new(StaticBridgeRouter::mainnet()),
        Arc::new(SystemClock),
    )
}

#[allow(dead_code)]
pub fn build_state(context: Context, api_token: Option<&str>) -> AppState {
    AppState {
        context: Arc::new(context),
        config: AppConfig {
            api_token: api_token.map(String::from),
            ..test_config()
        },
        metrics_handle: yieldrouter::metrics::init_metrics(),
        signer: None,
        pause_flag: Arc::new(AtomicBool::new(false)),
    }
}

#[allow(dead_code)]
pub fn wallet_usdc(chain: &str, value: i64) -> Asset {
    Asset {
        symbol: "USDC".into(),
        chain: chain.into(),
        protocol: None,
        token_address: None,
        quantity: Decimal::from(value),
        value_usd: Decimal::from(value),
        apy: None,
        risk_score: None,
    }
}

/// Deposit `value` wallet USDC into aave on `chain`: approve + deposit.
#[allow(dead_code)]
pub fn deposit_action(chain: &str, value: i64) -> RebalancingAction {
    let from = wallet_usdc(chain, value);
    let to = Asset {
        protocol: Some("aave-v3".into()),
        apy: Some(Decimal::from(5)),
        ..from.clone()
    };
    RebalancingAction {
        id: Uuid::new_v4(),
        from: Some(from),
        to: Some(to),
        amount: Decimal::from(value),
        value_usd: Decimal::from(value),
        reason: format!("Deposit USDC on {chain}"),
        expected_apy_delta: Decimal::from(5),
        risk_change: RiskChange::Unchanged,
        new_position: true,
        depends_on: vec![],
    }
}
