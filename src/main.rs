use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use yieldrouter::api::router::create_router;
use yieldrouter::catalog::{DefiLlamaIndexer, OpportunityIndexer, StaticIndexer};
use yieldrouter::chains::{ChainRegistry, RpcChainReader};
use yieldrouter::clock::{Clock, SystemClock};
use yieldrouter::config::AppConfig;
use yieldrouter::execution::{DryRunSigner, StaticBridgeRouter, TransactionSigner};
use yieldrouter::pricing::HttpPriceFeed;
use yieldrouter::{AppState, Context};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing(config.log_json);

    let addr = format!("{}:{}", config.host, config.port);
    let metrics_handle = yieldrouter::metrics::init_metrics();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(ChainRegistry::mainnets().with_rpc_overrides(&config.rpc_overrides));
    tracing::info!(chains = registry.chains().len(), "Chain registry loaded");

    // --- Discovery collaborators ---
    let reader = Arc::new(RpcChainReader::new(config.chain_call_timeout())?);
    let prices = Arc::new(HttpPriceFeed::new(&config.price_api_url, config.chain_call_timeout())?);

    let indexer = DefiLlamaIndexer::new(
        &config.yield_indexer_url,
        registry.clone(),
        config.indexer_min_tvl,
        clock.clone(),
        config.indexer_timeout(),
    )?;
    // First backend is primary; the curated seed only fills gaps.
    let backends: Vec<Arc<dyn OpportunityIndexer>> = vec![
        Arc::new(indexer),
        Arc::new(StaticIndexer::curated(clock.now())),
    ];

    // --- Execution collaborators ---
    let bridges = Arc::new(StaticBridgeRouter::mainnet());
    let signer: Option<Arc<dyn TransactionSigner>> = match &config.signer_private_key {
        Some(key) => {
            let signer: Arc<dyn TransactionSigner> = Arc::new(DryRunSigner::from_private_key(key)?);
            tracing::info!(address = %signer.address(), "Signer key loaded");
            Some(signer)
        }
        None => None,
    };
    if !config.dry_run {
        tracing::warn!("DRY_RUN=false but no live signer is available, operations stay dry-run");
    }

    let context = Arc::new(Context::new(
        &config,
        registry,
        reader,
        prices,
        backends,
        bridges,
        clock,
    ));

    // Warm the catalog so the first optimize call does not pay for it.
    let warm = context.clone();
    tokio::spawn(async move {
        let opportunities = warm.catalog.opportunities(true).await;
        tracing::info!(active = opportunities.len(), "Catalog warmed");
    });

    let state = AppState {
        context,
        config,
        metrics_handle,
        signer,
        pause_flag: Arc::new(AtomicBool::new(false)),
    };

    let router = create_router(state);

    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}
