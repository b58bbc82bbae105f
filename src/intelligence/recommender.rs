use std::cmp::Ordering;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::catalog::OpportunityCatalog;
use crate::errors::{validate_address, ValidationError};
use crate::models::{
    weighted_apy, OptimizationCriteria, OptimizationReport, PortfolioSnapshot, Recommendation,
    YieldOpportunity,
};
use crate::scanner::HoldingsScanner;
use crate::tuning::{MAX_RECOMMENDATIONS, POTENTIAL_YIELD_SAMPLE};

use super::risk::RiskModel;
use super::scorer::score_opportunity;

/// Scores the catalog against a holder and produces an optimization report.
pub struct RecommendationEngine {
    scanner: Arc<HoldingsScanner>,
    catalog: Arc<OpportunityCatalog>,
    risk: RiskModel,
}

impl RecommendationEngine {
    pub fn new(scanner: Arc<HoldingsScanner>, catalog: Arc<OpportunityCatalog>) -> Self {
        Self {
            scanner,
            catalog,
            risk: RiskModel::new(),
        }
    }

    /// Validate, scan holdings, load opportunities and rank them.
    ///
    /// Only validation errors are returned; unavailable chains or indexers
    /// degrade the report instead.
    pub async fn optimize(
        &self,
        address: &str,
        criteria: &OptimizationCriteria,
    ) -> Result<OptimizationReport, ValidationError> {
        let (snapshot, opportunities) = self.load(address, criteria).await?;
        Ok(self.recommend(&snapshot, &opportunities, criteria))
    }

    /// Validate the request, then read holdings and the active catalog
    /// concurrently. Callers that build on the report reuse this snapshot so
    /// every later step sees the same read of the chains.
    pub async fn load(
        &self,
        address: &str,
        criteria: &OptimizationCriteria,
    ) -> Result<(PortfolioSnapshot, Vec<YieldOpportunity>), ValidationError> {
        validate_address(address)?;
        criteria.validate()?;

        let (snapshot, opportunities) = tokio::join!(
            self.scanner.scan(address, false),
            self.catalog.opportunities(false)
        );
        Ok((snapshot?, opportunities))
    }

    /// Rank `opportunities` for the holder described by `snapshot`.
    pub fn recommend(
        &self,
        snapshot: &PortfolioSnapshot,
        opportunities: &[YieldOpportunity],
        criteria: &OptimizationCriteria,
    ) -> OptimizationReport {
        let mut scored: Vec<Recommendation> = opportunities
            .iter()
            .map(|opportunity| {
                let s = score_opportunity(opportunity, &snapshot.assets, criteria);
                Recommendation {
                    estimated_apy: opportunity.apy,
                    estimated_annual_reward: (s.matching_value * opportunity.apy
                        / Decimal::ONE_HUNDRED)
                        .round_dp(2),
                    opportunity: opportunity.clone(),
                    score: s.score,
                    reasons: s.reasons,
                    suggested_optimizations: s.suggestions,
                    requires_bridge: s.requires_bridge,
                    source_chain: s.source_chain,
                }
            })
            .collect();

        scored.sort_by(rank_order);
        scored.truncate(MAX_RECOMMENDATIONS);

        let total_potential_yield = mean_apy(&scored, POTENTIAL_YIELD_SAMPLE);
        let total_current_yield = weighted_apy(&snapshot.assets).round_dp(4);

        let recommended: Vec<&YieldOpportunity> = scored.iter().map(|r| &r.opportunity).collect();
        let risk_assessment = self.risk.assess_opportunities(&recommended);

        metrics::counter!("recommendations_generated_total").increment(scored.len() as u64);
        tracing::info!(
            address = %snapshot.address,
            candidates = opportunities.len(),
            recommendations = scored.len(),
            potential_yield = %total_potential_yield,
            current_yield = %total_current_yield,
            "Optimization report built"
        );

        OptimizationReport {
            address: snapshot.address.clone(),
            recommendations: scored,
            total_potential_yield,
            total_current_yield,
            potential_additional_yield: total_potential_yield - total_current_yield,
            risk_assessment,
            failed_chains: snapshot.failed_chains.clone(),
        }
    }
}

/// Score descending; ties broken by APY descending then id for stability.
fn rank_order(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.opportunity.apy.cmp(&a.opportunity.apy))
        .then_with(|| a.opportunity.id.cmp(&b.opportunity.id))
}

/// Equal-weighted mean APY of the first `n` recommendations.
fn mean_apy(recommendations: &[Recommendation], n: usize) -> Decimal {
    let sample: Vec<Decimal> = recommendations.iter().take(n).map(|r| r.estimated_apy).collect();
    if sample.is_empty() {
        return Decimal::ZERO;
    }
    (sample.iter().copied().sum::<Decimal>() / Decimal::from(sample.len())).round_dp(4)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{OpportunityIndexer, StaticIndexer};
    use crate::chains::{ChainRegistry, InMemoryChainReader};
    use crate::clock::SystemClock;
    use crate::models::{Asset, RiskLevel, StrategyCategory};
    use crate::pricing::StaticPriceFeed;
    use chrono::Utc;
    use std::time::Duration;

    fn opportunity(id: &str, chain: &str, asset: &str, apy: i64) -> YieldOpportunity {
        YieldOpportunity {
            id: id.into(),
            name: format!("{asset} lending on {chain}"),
            chain: chain.into(),
            protocol: "aave-v3".into(),
            asset: asset.into(),
            apy: Decimal::from(apy),
            tvl_usd: Decimal::from(100_000_000),
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

    fn engine(reader: InMemoryChainReader, catalog: Vec<YieldOpportunity>) -> RecommendationEngine {
        let clock = Arc::new(SystemClock);
        let scanner = HoldingsScanner::new(
            Arc::new(ChainRegistry::mainnets()),
            Arc::new(reader),
            Arc::new(StaticPriceFeed::new().with_price("USDC", Decimal::ONE)),
            clock.clone(),
            chrono::Duration::minutes(5),
            Duration::from_millis(200),
        );
        let backend: Arc<dyn OpportunityIndexer> = Arc::new(StaticIndexer::new("test", catalog));
        let catalog = OpportunityCatalog::new(
            vec![backend],
            clock,
            chrono::Duration::minutes(5),
            chrono::Duration::hours(24),
            Duration::from_millis(200),
        );
        RecommendationEngine::new(Arc::new(scanner), Arc::new(catalog))
    }

    fn snapshot(assets: Vec<Asset>) -> PortfolioSnapshot {
        PortfolioSnapshot::new("0xholder".into(), assets, vec![], vec![], Utc::now())
    }

    #[test]
    fn test_top_n_and_potential_yield() {
        let engine = engine(InMemoryChainReader::new(), vec![]);
        let catalog: Vec<_> = (1..=7)
            .map(|i| opportunity(&format!("o{i}"), "ethereum", "USDC", i))
            .collect();
        let criteria = OptimizationCriteria {
            prioritize_highest_yield: true,
            ..Default::default()
        };

        let report = engine.recommend(&snapshot(vec![]), &catalog, &criteria);

        assert_eq!(report.recommendations.len(), MAX_RECOMMENDATIONS);
        assert_eq!(report.recommendations[0].opportunity.id, "o7");
        // mean of 7, 6, 5
        assert_eq!(report.total_potential_yield, Decimal::from(6));
        assert_eq!(report.total_current_yield, Decimal::ZERO);
        assert_eq!(report.potential_additional_yield, Decimal::from(6));
    }

    #[test]
    fn test_no_catalog_gives_empty_report() {
        let engine = engine(InMemoryChainReader::new(), vec![]);
        let report = engine.recommend(&snapshot(vec![]), &[], &OptimizationCriteria::default());
        assert!(report.recommendations.is_empty());
        assert_eq!(report.total_potential_yield, Decimal::ZERO);
        assert_eq!(report.risk_assessment.average_risk, 0.0);
    }

    #[tokio::test]
    async fn test_optimize_rejects_invalid_criteria_first() {
        let engine = engine(InMemoryChainReader::new().failing_chain("ethereum"), vec![]);
        let criteria = OptimizationCriteria {
            min_liquidity: Some(Decimal::from(-5)),
            ..Default::default()
        };
        let err = engine.optimize("0xholder", &criteria).await.unwrap_err();
        assert_eq!(err.field, "min_liquidity");
    }

    #[tokio::test]
    async fn test_optimize_end_to_end_with_partial_scan() {
        let reader = InMemoryChainReader::new()
            .with_token("ethereum", "0xholder", "USDC", Decimal::from(1_000))
            .failing_chain("polygon");
        let engine = engine(reader, vec![opportunity("eth-usdc", "ethereum", "USDC", 5)]);

        let report = engine
            .optimize("0xholder", &OptimizationCriteria::default())
            .await
            .unwrap();

        assert!(report.is_partial());
        assert_eq!(report.recommendations.len(), 1);
        assert_eq!(report.recommendations[0].estimated_annual_reward, Decimal::from(50));
    }
}
