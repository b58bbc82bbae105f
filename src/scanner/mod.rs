//! Holdings Scanner: aggregates one holder's balances across every
//! registered chain into a [`PortfolioSnapshot`].
//!
//! Chains are read concurrently. Each chain branch is bounded by the
//! configured call timeout and can be abandoned through a
//! [`CancellationToken`]; a failing branch contributes nothing and is
//! reported in `failed_chains` instead of failing the scan.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{join_all, try_join_all};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::cache::TtlCache;
use crate::chains::{ChainError, ChainInfo, ChainReader, ChainRegistry};
use crate::clock::Clock;
use crate::errors::{validate_address, ValidationError};
use crate::intelligence::RiskModel;
use crate::models::{Asset, ChainFailure, PortfolioSnapshot};
use crate::pricing::PriceFeed;

/// A non-zero balance before valuation.
#[derive(Debug, Clone)]
struct RawBalance {
    chain: String,
    symbol: String,
    protocol: Option<String>,
    token_address: Option<String>,
    quantity: Decimal,
    apy: Option<Decimal>,
}

pub struct HoldingsScanner {
    registry: Arc<ChainRegistry>,
    reader: Arc<dyn ChainReader>,
    prices: Arc<dyn PriceFeed>,
    risk: RiskModel,
    clock: Arc<dyn Clock>,
    cache: TtlCache<String, PortfolioSnapshot>,
    chain_timeout: Duration,
}

impl HoldingsScanner {
    pub fn new(
        registry: Arc<ChainRegistry>,
        reader: Arc<dyn ChainReader>,
        prices: Arc<dyn PriceFeed>,
        clock: Arc<dyn Clock>,
        cache_ttl: chrono::Duration,
        chain_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            reader,
            prices,
            risk: RiskModel::new(),
            cache: TtlCache::new(cache_ttl, clock.clone()),
            clock,
            chain_timeout,
        }
    }

    /// Scan `address`, serving a fresh cached snapshot unless `force_refresh`.
    pub async fn scan(&self, address: &str, force_refresh: bool) -> Result<PortfolioSnapshot, ValidationError> {
        self.scan_with_cancel(address, force_refresh, &CancellationToken::new())
            .await
    }

    pub async fn scan_with_cancel(
        &self,
        address: &str,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<PortfolioSnapshot, ValidationError> {
        validate_address(address)?;
        let cache_key = address.to_lowercase();

        if !force_refresh {
            if let Some(snapshot) = self.cache.get(&cache_key).await {
                tracing::debug!(address = %address, "Holdings served from cache");
                return Ok(snapshot);
            }
        }

        let started = Instant::now();
        metrics::counter!("holdings_scans_total").increment(1);

        let branches = self
            .registry
            .chains()
            .iter()
            .map(|chain| self.scan_chain_bounded(chain, address, cancel));
        let results = join_all(branches).await;

        let mut balances = Vec::new();
        let mut failed_chains = Vec::new();
        for (chain, result) in self.registry.chains().iter().zip(results) {
            match result {
                Ok(found) => balances.extend(found),
                Err(reason) => {
                    tracing::warn!(chain = %chain.id, address = %address, reason = %reason, "Chain scan failed, continuing with partial holdings");
                    metrics::counter!("chain_scan_failures_total").increment(1);
                    failed_chains.push(ChainFailure {
                        chain: chain.id.clone(),
                        reason,
                    });
                }
            }
        }

        let (assets, unpriced) = self.value_balances(balances).await;
        let snapshot = PortfolioSnapshot::new(
            address.to_string(),
            assets,
            failed_chains,
            unpriced,
            self.clock.now(),
        );

        metrics::histogram!("holdings_scan_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            address = %address,
            assets = snapshot.assets.len(),
            total_value = %snapshot.total_value,
            failed_chains = snapshot.failed_chains.len(),
            "Holdings scan complete"
        );

        if cancel.is_cancelled() {
            tracing::info!(address = %address, "Scan cancelled, result not cached");
        } else if snapshot.is_partial() {
            tracing::debug!(address = %address, "Partial scan not cached");
        } else {
            self.cache.insert(cache_key, snapshot.clone()).await;
        }

        Ok(snapshot)
    }

    /// Drop the cached snapshot for `address`.
    pub async fn invalidate(&self, address: &str) {
        self.cache.invalidate(&address.to_lowercase()).await;
    }

    async fn scan_chain_bounded(
        &self,
        chain: &ChainInfo,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawBalance>, String> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err("cancelled".to_string()),
            result = tokio::time::timeout(self.chain_timeout, self.scan_chain(chain, address)) => {
                match result {
                    Ok(Ok(balances)) => Ok(balances),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("timed out after {}ms", self.chain_timeout.as_millis())),
                }
            }
        }
    }

    async fn scan_chain(&self, chain: &ChainInfo, address: &str) -> Result<Vec<RawBalance>, ChainError> {
        let mut balances = Vec::new();

        let native = self.reader.native_balance(chain, address).await?;
        if native > Decimal::ZERO {
            balances.push(RawBalance {
                chain: chain.id.clone(),
                symbol: chain.native_symbol.clone(),
                protocol: None,
                token_address: None,
                quantity: native,
                apy: None,
            });
        }

        let tokens: Vec<_> = self.registry.tracked_tokens(&chain.id).collect();
        let amounts = try_join_all(
            tokens
                .iter()
                .map(|token| self.reader.token_balance(chain, token, address)),
        )
        .await?;
        for (token, amount) in tokens.into_iter().zip(amounts) {
            if amount > Decimal::ZERO {
                balances.push(RawBalance {
                    chain: chain.id.clone(),
                    symbol: token.symbol.clone(),
                    protocol: None,
                    token_address: Some(token.address.clone()),
                    quantity: amount,
                    apy: None,
                });
            }
        }

        for position in self.reader.protocol_positions(chain, address).await? {
            if position.quantity > Decimal::ZERO {
                balances.push(RawBalance {
                    chain: chain.id.clone(),
                    symbol: position.symbol.to_uppercase(),
                    protocol: Some(position.protocol),
                    token_address: self
                        .registry
                        .token(&chain.id, &position.symbol)
                        .map(|t| t.address.clone()),
                    quantity: position.quantity,
                    apy: position.apy,
                });
            }
        }

        tracing::debug!(chain = %chain.id, balances = balances.len(), "Chain scanned");
        Ok(balances)
    }

    /// Price every balance; balances without a price are reported, not valued.
    async fn value_balances(&self, balances: Vec<RawBalance>) -> (Vec<Asset>, Vec<String>) {
        if balances.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let symbols: Vec<String> = balances
            .iter()
            .map(|b| b.symbol.to_uppercase())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let prices: HashMap<String, Decimal> = match self.prices.prices_usd(&symbols).await {
            Ok(prices) => prices,
            Err(e) => {
                tracing::warn!(error = %e, "Price lookup failed, balances left unpriced");
                HashMap::new()
            }
        };

        let mut assets = Vec::new();
        let mut unpriced = Vec::new();
        for balance in balances {
            let Some(price) = prices.get(&balance.symbol.to_uppercase()) else {
                unpriced.push(format!("{}:{}", balance.chain, balance.symbol));
                continue;
            };
            let value_usd = (balance.quantity * price).round_dp(6);
            if value_usd.is_zero() {
                continue;
            }

            let mut asset = Asset {
                symbol: balance.symbol,
                chain: balance.chain,
                protocol: balance.protocol,
                token_address: balance.token_address,
                quantity: balance.quantity,
                value_usd,
                apy: balance.apy,
                risk_score: None,
            };
            if asset.protocol.is_some() {
                asset.risk_score = Some(self.risk.asset_risk_score(&asset, &[]));
            }
            assets.push(asset);
        }

        assets.sort_by(|a, b| a.key().cmp(&b.key()));
        (assets, unpriced)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::{InMemoryChainReader, ProtocolPosition};
    use crate::clock::ManualClock;
    use crate::pricing::StaticPriceFeed;
    use chrono::{TimeZone, Utc};

    const HOLDER: &str = "0x1111111111111111111111111111111111111111";

    fn prices() -> StaticPriceFeed {
        StaticPriceFeed::new()
            .with_price("ETH", Decimal::from(3_000))
            .with_price("USDC", Decimal::ONE)
            .with_price("WETH", Decimal::from(3_000))
    }

    fn scanner(reader: InMemoryChainReader, clock: Arc<ManualClock>) -> HoldingsScanner {
        HoldingsScanner::new(
            Arc::new(ChainRegistry::mainnets()),
            Arc::new(reader),
            Arc::new(prices()),
            clock,
            chrono::Duration::minutes(5),
            Duration::from_millis(200),
        )
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()))
    }

    #[tokio::test]
    async fn test_scan_values_and_drops_zero_balances() {
        let reader = InMemoryChainReader::new()
            .with_native("ethereum", HOLDER, Decimal::new(5, 1))
            .with_token("ethereum", HOLDER, "USDC", Decimal::from(1_000))
            .with_token("arbitrum", HOLDER, "USDC", Decimal::ZERO);

        let snapshot = scanner(reader, clock()).scan(HOLDER, false).await.unwrap();

        assert_eq!(snapshot.assets.len(), 2);
        assert!(snapshot.assets.iter().all(|a| a.value_usd > Decimal::ZERO));
        assert_eq!(snapshot.total_value, Decimal::from(2_500));
        assert!(!snapshot.is_partial());
    }

    #[tokio::test]
    async fn test_failing_chain_degrades_to_partial() {
        let reader = InMemoryChainReader::new()
            .with_token("ethereum", HOLDER, "USDC", Decimal::from(1_000))
            .with_token("polygon", HOLDER, "USDC", Decimal::from(500))
            .failing_chain("polygon");

        let snapshot = scanner(reader, clock()).scan(HOLDER, false).await.unwrap();

        assert_eq!(snapshot.total_value, Decimal::from(1_000));
        assert!(snapshot.is_partial());
        assert_eq!(snapshot.failed_chains.len(), 1);
        assert_eq!(snapshot.failed_chains[0].chain, "polygon");
    }

    #[tokio::test]
    async fn test_slow_chain_is_bounded_by_timeout() {
        let reader = InMemoryChainReader::new()
            .with_token("base", HOLDER, "USDC", Decimal::from(10))
            .with_token("ethereum", HOLDER, "USDC", Decimal::from(1_000))
            .slow_chain("base", Duration::from_secs(5));

        let snapshot = scanner(reader, clock()).scan(HOLDER, false).await.unwrap();

        assert_eq!(snapshot.total_value, Decimal::from(1_000));
        let failure = &snapshot.failed_chains[0];
        assert_eq!(failure.chain, "base");
        assert!(failure.reason.contains("timed out"));
    }

    #[tokio::test]
    async fn test_unpriced_balances_are_reported() {
        let reader = InMemoryChainReader::new()
            .with_token("ethereum", HOLDER, "DAI", Decimal::from(50))
            .with_token("ethereum", HOLDER, "USDC", Decimal::from(1));

        let snapshot = scanner(reader, clock()).scan(HOLDER, false).await.unwrap();
        assert_eq!(snapshot.unpriced, vec!["ethereum:DAI".to_string()]);
        assert_eq!(snapshot.assets.len(), 1);
    }

    #[tokio::test]
    async fn test_protocol_positions_are_tagged() {
        let reader = InMemoryChainReader::new().with_position(
            "arbitrum",
            HOLDER,
            ProtocolPosition {
                protocol: "aave-v3".into(),
                symbol: "usdc".into(),
                quantity: Decimal::from(200),
                apy: Some(Decimal::from(4)),
            },
        );

        let snapshot = scanner(reader, clock()).scan(HOLDER, false).await.unwrap();
        let asset = &snapshot.assets[0];
        assert_eq!(asset.protocol.as_deref(), Some("aave-v3"));
        assert_eq!(asset.symbol, "USDC");
        assert_eq!(asset.apy, Some(Decimal::from(4)));
        assert!(asset.risk_score.is_some());
    }

    #[tokio::test]
    async fn test_cache_and_force_refresh() {
        let clock = clock();
        let scanner = scanner(
            InMemoryChainReader::new().with_token("ethereum", HOLDER, "USDC", Decimal::from(10)),
            clock.clone(),
        );

        let first = scanner.scan(HOLDER, false).await.unwrap();
        clock.advance(chrono::Duration::minutes(1));
        let cached = scanner.scan(HOLDER, false).await.unwrap();
        assert_eq!(cached.scanned_at, first.scanned_at);

        let refreshed = scanner.scan(HOLDER, true).await.unwrap();
        assert!(refreshed.scanned_at > first.scanned_at);

        clock.advance(chrono::Duration::minutes(6));
        let expired = scanner.scan(HOLDER, false).await.unwrap();
        assert!(expired.scanned_at > refreshed.scanned_at);
    }

    #[tokio::test]
    async fn test_cancelled_scan_reports_every_chain() {
        let reader = InMemoryChainReader::new()
            .with_token("ethereum", HOLDER, "USDC", Decimal::from(10))
            .slow_chain("ethereum", Duration::from_millis(100));
        let scanner = scanner(reader, clock());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let snapshot = scanner.scan_with_cancel(HOLDER, false, &cancel).await.unwrap();
        assert!(snapshot.assets.is_empty());
        assert!(snapshot.failed_chains.iter().all(|f| f.reason == "cancelled"));
        assert_eq!(scanner.cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_blank_address_rejected() {
        let scanner = scanner(InMemoryChainReader::new(), clock());
        assert!(scanner.scan("  ", false).await.is_err());
    }
}
