pub mod api;
pub mod cache;
pub mod catalog;
pub mod chains;
pub mod clock;
pub mod config;
pub mod errors;
pub mod execution;
pub mod intelligence;
pub mod metrics;
pub mod models;
pub mod planner;
pub mod pricing;
pub mod scanner;
pub mod tuning;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::catalog::{OpportunityCatalog, OpportunityIndexer};
use crate::chains::{ChainReader, ChainRegistry};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::errors::ValidationError;
use crate::execution::{BridgeRouter, ExecutionOrchestrator, ReceiptLog, TransactionSigner};
use crate::intelligence::{RecommendationEngine, RiskModel};
use crate::models::{OptimizationCriteria, PortfolioRebalanceReport};
use crate::planner::{target_from_recommendations, RebalancePlanner};
use crate::pricing::PriceFeed;
use crate::scanner::HoldingsScanner;

/// The pipeline's components, wired once at start-up and shared by every
/// request. Data sources are passed in, so tests build the same context
/// over in-memory fakes.
pub struct Context {
    pub registry: Arc<ChainRegistry>,
    pub scanner: Arc<HoldingsScanner>,
    pub catalog: Arc<OpportunityCatalog>,
    pub risk: RiskModel,
    pub engine: RecommendationEngine,
    pub planner: RebalancePlanner,
    pub orchestrator: ExecutionOrchestrator,
}

impl Context {
    pub fn new(
        config: &AppConfig,
        registry: Arc<ChainRegistry>,
        reader: Arc<dyn ChainReader>,
        prices: Arc<dyn PriceFeed>,
        backends: Vec<Arc<dyn OpportunityIndexer>>,
        bridges: Arc<dyn BridgeRouter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scanner = Arc::new(HoldingsScanner::new(
            registry.clone(),
            reader,
            prices,
            clock.clone(),
            config.cache_ttl(),
            config.chain_call_timeout(),
        ));
        let catalog = Arc::new(OpportunityCatalog::new(
            backends,
            clock,
            config.cache_ttl(),
            config.stale_after(),
            config.indexer_timeout(),
        )
        .with_history_limit(config.apy_history_limit));
        let orchestrator = ExecutionOrchestrator::new(
            registry.clone(),
            bridges,
            Arc::new(ReceiptLog::new()),
            config.operation_timeout(),
        );

        Self {
            engine: RecommendationEngine::new(scanner.clone(), catalog.clone()),
            registry,
            scanner,
            catalog,
            risk: RiskModel::new(),
            planner: RebalancePlanner::new(),
            orchestrator,
        }
    }

    /// Scan, optimize, allocate the holder's value over the top
    /// recommendations and diff the result against current holdings. The
    /// holder is read once; chains missing from that read are reported on
    /// the plan.
    pub async fn plan_rebalance(
        &self,
        address: &str,
        criteria: &OptimizationCriteria,
    ) -> Result<PortfolioRebalanceReport, ValidationError> {
        let (snapshot, opportunities) = self.engine.load(address, criteria).await?;
        let report = self.engine.recommend(&snapshot, &opportunities, criteria);

        let target = target_from_recommendations(&snapshot.assets, &report.recommendations);
        let mut plan = self.planner.plan(&snapshot.assets, &target, &opportunities);
        plan.failed_chains = snapshot.failed_chains;
        Ok(plan)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<Context>,
    pub config: AppConfig,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    /// Key-backed signer; without one each plan runs under a dry-run signer
    /// for the requesting holder.
    pub signer: Option<Arc<dyn TransactionSigner>>,
    pub pause_flag: Arc<AtomicBool>,
}
