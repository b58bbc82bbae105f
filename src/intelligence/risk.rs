//! Multi-factor risk scoring for single opportunities and whole portfolios.
//!
//! All formulas are deterministic heuristics. Value-at-risk in particular is
//! `amount × volatility proxy × 1.65` (a one-tailed 95% normal quantile over
//! an assumed volatility), not a calibrated financial model.

use std::collections::HashSet;
use std::fmt;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{
    volatility_class, Asset, AssetKey, RecommendationRisk, RiskLevel, StrategyCategory,
    VolatilityClass, YieldOpportunity,
};
use crate::tuning::*;

/// Eight risk factors, each on a 0–10 scale.
///
/// `audit_score` and `liquidity_depth` are "higher is better" and are
/// inverted before weighting; every other factor is "higher is riskier".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub protocol_risk: f64,
    pub audit_score: f64,
    pub impermanent_loss_risk: f64,
    pub liquidity_depth: f64,
    pub volatility_risk: f64,
    pub composability_risk: f64,
    pub regulatory_risk: f64,
    pub counterparty_risk: f64,
}

impl RiskFactors {
    /// Weighted overall score in [0, 10].
    pub fn overall_score(&self) -> f64 {
        let score = WEIGHT_PROTOCOL * clamp10(self.protocol_risk)
            + WEIGHT_AUDIT * (10.0 - clamp10(self.audit_score))
            + WEIGHT_IMPERMANENT_LOSS * clamp10(self.impermanent_loss_risk)
            + WEIGHT_LIQUIDITY * (10.0 - clamp10(self.liquidity_depth))
            + WEIGHT_VOLATILITY * clamp10(self.volatility_risk)
            + WEIGHT_COMPOSABILITY * clamp10(self.composability_risk)
            + WEIGHT_REGULATORY * clamp10(self.regulatory_risk)
            + WEIGHT_COUNTERPARTY * clamp10(self.counterparty_risk);
        clamp10(score)
    }
}

/// Five ordinal buckets derived from an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskCategory {
    pub fn from_score(score: f64) -> Self {
        let [very_low, low, medium, high] = CATEGORY_THRESHOLDS;
        if score < very_low {
            RiskCategory::VeryLow
        } else if score < low {
            RiskCategory::Low
        } else if score < medium {
            RiskCategory::Medium
        } else if score < high {
            RiskCategory::High
        } else {
            RiskCategory::VeryHigh
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskCategory::VeryLow => "Very Low",
            RiskCategory::Low => "Low",
            RiskCategory::Medium => "Medium",
            RiskCategory::High => "High",
            RiskCategory::VeryHigh => "Very High",
        };
        f.write_str(label)
    }
}

/// Estimated losses (percent of position) under three stress scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressTestResults {
    pub market_crash_loss_pct: f64,
    pub protocol_hack_loss_pct: f64,
    pub liquidity_crisis_loss_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub opportunity_id: String,
    pub investment_amount: Decimal,
    pub factors: RiskFactors,
    pub overall_score: f64,
    pub category: RiskCategory,
    pub value_at_risk: Decimal,
    pub max_drawdown_pct: f64,
    pub stress_tests: StressTestResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRiskSummary {
    /// Value-weighted average of each holding's risk score.
    pub overall_risk_score: f64,
    pub category: RiskCategory,
    /// 0–100, rewards distinct chains, protocols and assets.
    pub diversification_score: f64,
    /// Herfindahl index of value shares, scaled to 0–10.
    pub concentration_risk: f64,
    pub correlation_risk: f64,
    pub protocol_risk_score: f64,
    pub impermanent_loss_risk: f64,
    pub total_value: Decimal,
}

impl PortfolioRiskSummary {
    fn empty() -> Self {
        Self {
            overall_risk_score: 0.0,
            category: RiskCategory::VeryLow,
            diversification_score: 0.0,
            concentration_risk: 0.0,
            correlation_risk: 0.0,
            protocol_risk_score: 0.0,
            impermanent_loss_risk: 0.0,
            total_value: Decimal::ZERO,
        }
    }
}

/// One weighted position as seen by the portfolio formulas.
struct Exposure {
    chain: String,
    protocol: String,
    symbol: String,
    weight: f64,
    risk: f64,
    protocol_risk: f64,
    il_risk: f64,
}

/// Stateless risk model. Deterministic for identical inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskModel;

impl RiskModel {
    pub fn new() -> Self {
        Self
    }

    /// Derive the eight factors from opportunity metadata.
    pub fn factors(&self, opportunity: &YieldOpportunity) -> RiskFactors {
        let class = volatility_class(&opportunity.asset);
        let profile = category_risk_profile(opportunity.strategy);

        let mut protocol_risk = match opportunity.risk_level {
            RiskLevel::Low => PROTOCOL_RISK_LOW,
            RiskLevel::Medium => PROTOCOL_RISK_MEDIUM,
            RiskLevel::High => PROTOCOL_RISK_HIGH,
        };
        if !opportunity.verified {
            protocol_risk += UNVERIFIED_PROTOCOL_PENALTY;
        }

        let audit_score = if opportunity.verified {
            AUDIT_SCORE_VERIFIED
        } else {
            AUDIT_SCORE_UNVERIFIED
        };

        let stable = class == VolatilityClass::Stable;
        let impermanent_loss_risk = match opportunity.strategy {
            StrategyCategory::LiquidityProvision if stable => IL_RISK_LP_STABLE,
            StrategyCategory::LiquidityProvision => IL_RISK_LP_VOLATILE,
            StrategyCategory::Farming if stable => IL_RISK_FARMING_STABLE,
            StrategyCategory::Farming => IL_RISK_FARMING_VOLATILE,
            StrategyCategory::Lending | StrategyCategory::Staking => 0.0,
        };

        let mut volatility_risk = match class {
            VolatilityClass::Stable => VOLATILITY_STABLE,
            VolatilityClass::Major => VOLATILITY_MAJOR,
            VolatilityClass::Other => VOLATILITY_OTHER,
        };
        if opportunity.strategy == StrategyCategory::Farming {
            volatility_risk += VOLATILITY_FARMING_SURCHARGE;
        }

        RiskFactors {
            protocol_risk: clamp10(protocol_risk),
            audit_score,
            impermanent_loss_risk,
            liquidity_depth: liquidity_depth(opportunity.tvl_usd),
            volatility_risk: clamp10(volatility_risk),
            composability_risk: profile.composability,
            regulatory_risk: profile.regulatory,
            counterparty_risk: profile.counterparty,
        }
    }

    pub fn score(&self, opportunity: &YieldOpportunity) -> f64 {
        self.factors(opportunity).overall_score()
    }

    /// Full assessment of putting `investment_amount` (USD) into `opportunity`.
    pub fn assess(&self, opportunity: &YieldOpportunity, investment_amount: Decimal) -> RiskAssessment {
        let amount = investment_amount.max(Decimal::ZERO);
        let factors = self.factors(opportunity);
        let overall_score = factors.overall_score();

        RiskAssessment {
            opportunity_id: opportunity.id.clone(),
            investment_amount: amount,
            factors,
            overall_score,
            category: RiskCategory::from_score(overall_score),
            value_at_risk: value_at_risk(amount, factors.volatility_risk),
            max_drawdown_pct: clamp_pct(
                overall_score * DRAWDOWN_PER_RISK_POINT
                    + factors.impermanent_loss_risk * DRAWDOWN_PER_IL_POINT,
            ),
            stress_tests: stress_tests(&factors),
        }
    }

    /// Risk score of a held asset: the matching catalog entry if there is
    /// one, else the score the asset carries, else a default by volatility
    /// class.
    pub fn asset_risk_score(&self, asset: &Asset, catalog: &[YieldOpportunity]) -> f64 {
        if let Some(opportunity) = find_opportunity(asset, catalog) {
            return self.score(opportunity);
        }
        if let Some(score) = asset.risk_score {
            return clamp10(score);
        }
        if asset.protocol.is_some() {
            return idle_risk(&asset.symbol).max(UNKNOWN_PROTOCOL_RISK);
        }
        idle_risk(&asset.symbol)
    }

    /// Aggregate risk of a set of holdings, weighted by value share.
    pub fn assess_portfolio(&self, assets: &[Asset], catalog: &[YieldOpportunity]) -> PortfolioRiskSummary {
        if assets.is_empty() {
            return PortfolioRiskSummary::empty();
        }

        let total_value: Decimal = assets.iter().map(|a| a.value_usd).sum();
        let total = total_value.to_f64().unwrap_or(0.0);
        let equal_weight = 1.0 / assets.len() as f64;

        let exposures: Vec<Exposure> = assets
            .iter()
            .map(|asset| {
                let matched = find_opportunity(asset, catalog).map(|o| self.factors(o));
                let protocol_risk = match (&matched, &asset.protocol) {
                    (Some(f), _) => f.protocol_risk,
                    (None, Some(_)) => UNKNOWN_PROTOCOL_RISK,
                    (None, None) => 0.0,
                };
                let weight = if total > 0.0 {
                    asset.value_usd.to_f64().unwrap_or(0.0) / total
                } else {
                    equal_weight
                };
                Exposure {
                    chain: asset.chain.to_lowercase(),
                    protocol: asset.protocol_label().to_lowercase(),
                    symbol: asset.symbol.to_uppercase(),
                    weight,
                    risk: self.asset_risk_score(asset, catalog),
                    protocol_risk,
                    il_risk: matched.map(|f| f.impermanent_loss_risk).unwrap_or(0.0),
                }
            })
            .collect();

        let mut summary = summarize(&exposures);
        summary.total_value = total_value;
        summary
    }

    /// Equal-weighted risk profile of a recommended set of opportunities.
    pub fn assess_opportunities(&self, opportunities: &[&YieldOpportunity]) -> RecommendationRisk {
        if opportunities.is_empty() {
            return RecommendationRisk::default();
        }

        let weight = 1.0 / opportunities.len() as f64;
        let exposures: Vec<Exposure> = opportunities
            .iter()
            .map(|o| {
                let factors = self.factors(o);
                Exposure {
                    chain: o.chain.to_lowercase(),
                    protocol: o.protocol.to_lowercase(),
                    symbol: o.asset.to_uppercase(),
                    weight,
                    risk: factors.overall_score(),
                    protocol_risk: factors.protocol_risk,
                    il_risk: factors.impermanent_loss_risk,
                }
            })
            .collect();

        let summary = summarize(&exposures);
        RecommendationRisk {
            average_risk: summary.overall_risk_score,
            diversification_score: summary.diversification_score,
            protocol_risk_score: summary.protocol_risk_score,
            impermanent_loss_risk: summary.impermanent_loss_risk,
        }
    }
}

fn summarize(exposures: &[Exposure]) -> PortfolioRiskSummary {
    if exposures.is_empty() {
        return PortfolioRiskSummary::empty();
    }

    let weighted = |f: fn(&Exposure) -> f64| -> f64 {
        exposures.iter().map(|e| e.weight * f(e)).sum::<f64>()
    };

    let overall = clamp10(weighted(|e| e.risk));
    let chains: HashSet<&str> = exposures.iter().map(|e| e.chain.as_str()).collect();
    let protocols: HashSet<&str> = exposures.iter().map(|e| e.protocol.as_str()).collect();
    let symbols: HashSet<&str> = exposures.iter().map(|e| e.symbol.as_str()).collect();

    PortfolioRiskSummary {
        overall_risk_score: overall,
        category: RiskCategory::from_score(overall),
        diversification_score: diversification_score(chains.len(), protocols.len(), symbols.len()),
        concentration_risk: clamp10(herfindahl(exposures.iter().map(|e| e.weight)) * 10.0),
        correlation_risk: correlation_risk(chains.len(), protocols.len()),
        protocol_risk_score: clamp10(weighted(|e| e.protocol_risk)),
        impermanent_loss_risk: clamp10(weighted(|e| e.il_risk)),
        total_value: Decimal::ZERO,
    }
}

pub fn diversification_score(chains: usize, protocols: usize, assets: usize) -> f64 {
    let raw = chains as f64 * DIVERSIFICATION_PER_CHAIN
        + protocols as f64 * DIVERSIFICATION_PER_PROTOCOL
        + assets as f64 * DIVERSIFICATION_PER_ASSET;
    raw.min(DIVERSIFICATION_CAP)
}

/// Sum of squared shares; 1.0 for a single position.
pub fn herfindahl(shares: impl Iterator<Item = f64>) -> f64 {
    shares.map(|s| s * s).sum()
}

/// Coarse correlation proxy: more chains and protocols, less shared failure.
pub fn correlation_risk(chains: usize, protocols: usize) -> f64 {
    if chains == 0 && protocols == 0 {
        return 0.0;
    }
    let relief = chains.saturating_sub(1) as f64 * CORRELATION_RELIEF_PER_CHAIN
        + protocols.saturating_sub(1) as f64 * CORRELATION_RELIEF_PER_PROTOCOL;
    clamp10(CORRELATION_BASE - relief)
}

/// Log-scaled TVL: $10k scores 0, every 10× adds two points, $1B scores 10.
pub fn liquidity_depth(tvl_usd: Decimal) -> f64 {
    let tvl = tvl_usd.to_f64().unwrap_or(0.0);
    if tvl <= 0.0 {
        return 0.0;
    }
    clamp10((tvl.log10() - LIQUIDITY_LOG10_FLOOR) * LIQUIDITY_POINTS_PER_DECADE)
}

/// Heuristic VaR: amount × volatility proxy × 1.65, capped at the amount.
pub fn value_at_risk(amount: Decimal, volatility_risk: f64) -> Decimal {
    let proxy = clamp10(volatility_risk) / 10.0 * VOLATILITY_PROXY_SCALE;
    let factor = Decimal::from_f64(proxy * VAR_CONFIDENCE_MULTIPLIER)
        .unwrap_or(Decimal::ZERO)
        .round_dp(6);
    (amount * factor).min(amount).round_dp(2)
}

/// Value loss of a 50/50 constant-product position when one asset's price
/// moves by `price_ratio` relative to the other, as a percentage (<= 0).
pub fn impermanent_loss_pct(price_ratio: f64) -> f64 {
    if price_ratio <= 0.0 {
        return -100.0;
    }
    (2.0 * price_ratio.sqrt() / (1.0 + price_ratio) - 1.0) * 100.0
}

fn stress_tests(f: &RiskFactors) -> StressTestResults {
    StressTestResults {
        market_crash_loss_pct: clamp_pct(
            f.volatility_risk / 10.0 * STRESS_CRASH_VOLATILITY_PCT
                + f.impermanent_loss_risk / 10.0 * STRESS_CRASH_IL_PCT,
        ),
        protocol_hack_loss_pct: clamp_pct(
            f.protocol_risk / 10.0 * STRESS_HACK_PROTOCOL_PCT
                + (10.0 - f.audit_score) / 10.0 * STRESS_HACK_AUDIT_PCT,
        ),
        liquidity_crisis_loss_pct: clamp_pct(
            (10.0 - f.liquidity_depth) / 10.0 * STRESS_LIQUIDITY_CRISIS_PCT,
        ),
    }
}

fn idle_risk(symbol: &str) -> f64 {
    match volatility_class(symbol) {
        VolatilityClass::Stable => IDLE_RISK_STABLE,
        VolatilityClass::Major => IDLE_RISK_MAJOR,
        VolatilityClass::Other => IDLE_RISK_OTHER,
    }
}

/// Catalog entry describing where `asset` is deployed, if any.
pub fn find_opportunity<'a>(asset: &Asset, catalog: &'a [YieldOpportunity]) -> Option<&'a YieldOpportunity> {
    asset.protocol.as_ref()?;
    let key = asset.key();
    catalog
        .iter()
        .find(|o| AssetKey::new(&o.chain, Some(&o.protocol), &o.asset) == key)
}

fn clamp10(x: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(0.0, 10.0)
}

fn clamp_pct(x: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn opportunity(asset: &str, strategy: StrategyCategory, level: RiskLevel, tvl: i64) -> YieldOpportunity {
        YieldOpportunity {
            id: format!("{asset}-{strategy}"),
            name: format!("{asset} {strategy}"),
            chain: "ethereum".into(),
            protocol: "aave-v3".into(),
            asset: asset.into(),
            apy: Decimal::from(5),
            tvl_usd: Decimal::from(tvl),
            min_deposit: Decimal::ZERO,
            max_deposit: None,
            risk_level: level,
            strategy,
            verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            source: "test".into(),
        }
    }

    fn holding(chain: &str, protocol: Option<&str>, symbol: &str, value: i64) -> Asset {
        Asset {
            symbol: symbol.into(),
            chain: chain.into(),
            protocol: protocol.map(String::from),
            token_address: Some("0xtoken".into()),
            quantity: Decimal::from(value),
            value_usd: Decimal::from(value),
            apy: None,
            risk_score: None,
        }
    }

    fn base_factors() -> RiskFactors {
        RiskFactors {
            protocol_risk: 3.0,
            audit_score: 7.0,
            impermanent_loss_risk: 2.0,
            liquidity_depth: 6.0,
            volatility_risk: 4.0,
            composability_risk: 3.0,
            regulatory_risk: 3.0,
            counterparty_risk: 3.0,
        }
    }

    #[test]
    fn test_category_thresholds() {
        assert_eq!(RiskCategory::from_score(0.0), RiskCategory::VeryLow);
        assert_eq!(RiskCategory::from_score(1.99), RiskCategory::VeryLow);
        assert_eq!(RiskCategory::from_score(2.0), RiskCategory::Low);
        assert_eq!(RiskCategory::from_score(5.5), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(7.9), RiskCategory::High);
        assert_eq!(RiskCategory::from_score(8.0), RiskCategory::VeryHigh);
        assert_eq!(RiskCategory::from_score(10.0), RiskCategory::VeryHigh);
    }

    #[test]
    fn test_overall_score_monotonic_in_risk_factors() {
        let setters: [fn(&mut RiskFactors, f64); 3] = [
            |f, v| f.protocol_risk = v,
            |f, v| f.impermanent_loss_risk = v,
            |f, v| f.volatility_risk = v,
        ];

        for set in setters {
            let mut previous = f64::MIN;
            for step in 0..=20 {
                let mut factors = base_factors();
                set(&mut factors, step as f64 * 0.5);
                let score = factors.overall_score();
                assert!(score >= previous, "score dropped from {previous} to {score}");
                assert!((0.0..=10.0).contains(&score));
                previous = score;
            }
        }
    }

    #[test]
    fn test_audit_and_liquidity_are_inverted() {
        let mut better = base_factors();
        better.audit_score = 10.0;
        better.liquidity_depth = 10.0;
        assert!(better.overall_score() < base_factors().overall_score());
    }

    #[test]
    fn test_liquidity_depth_log_scale() {
        assert_eq!(liquidity_depth(Decimal::ZERO), 0.0);
        assert_eq!(liquidity_depth(Decimal::from(10_000)), 0.0);
        assert!((liquidity_depth(Decimal::from(1_000_000)) - 4.0).abs() < 1e-9);
        assert_eq!(liquidity_depth(Decimal::from(10_000_000_000_i64)), 10.0);
    }

    #[test]
    fn test_impermanent_loss_only_for_pool_strategies() {
        let model = RiskModel::new();
        let lending = model.factors(&opportunity("WETH", StrategyCategory::Lending, RiskLevel::Low, 1_000_000_000));
        let lp = model.factors(&opportunity("USDC-WETH", StrategyCategory::LiquidityProvision, RiskLevel::Medium, 50_000_000));
        let stable_lp = model.factors(&opportunity("USDC-USDT", StrategyCategory::LiquidityProvision, RiskLevel::Low, 50_000_000));

        assert_eq!(lending.impermanent_loss_risk, 0.0);
        assert!(lp.impermanent_loss_risk > stable_lp.impermanent_loss_risk);
        assert!(stable_lp.impermanent_loss_risk > 0.0);
    }

    #[test]
    fn test_stable_assets_have_low_volatility() {
        let model = RiskModel::new();
        let usdc = model.factors(&opportunity("USDC", StrategyCategory::Lending, RiskLevel::Low, 1_000_000_000));
        let eth = model.factors(&opportunity("WETH", StrategyCategory::Lending, RiskLevel::Low, 1_000_000_000));
        assert!(usdc.volatility_risk < eth.volatility_risk);
    }

    #[test]
    fn test_lending_counterparty_elevated() {
        let model = RiskModel::new();
        let lending = model.factors(&opportunity("USDC", StrategyCategory::Lending, RiskLevel::Low, 1_000_000));
        let staking = model.factors(&opportunity("USDC", StrategyCategory::Staking, RiskLevel::Low, 1_000_000));
        assert!(lending.counterparty_risk > staking.counterparty_risk);
    }

    #[test]
    fn test_assess_is_deterministic() {
        let model = RiskModel::new();
        let opp = opportunity("WETH", StrategyCategory::Farming, RiskLevel::High, 5_000_000);
        let a = model.assess(&opp, Decimal::from(10_000));
        let b = model.assess(&opp, Decimal::from(10_000));
        assert_eq!(a, b);
        assert!(a.value_at_risk > Decimal::ZERO);
        assert!(a.value_at_risk <= Decimal::from(10_000));
        assert!(a.max_drawdown_pct <= 100.0);
        assert!(a.stress_tests.market_crash_loss_pct > 0.0);
    }

    #[test]
    fn test_value_at_risk_heuristic() {
        // volatility 10 → proxy 0.5 → 0.825 of the amount
        assert_eq!(value_at_risk(Decimal::from(1_000), 10.0), Decimal::from(825));
        assert_eq!(value_at_risk(Decimal::from(1_000), 0.0), Decimal::ZERO);
    }

    #[test]
    fn test_impermanent_loss_formula() {
        assert!(impermanent_loss_pct(1.0).abs() < 1e-9);
        // 2× price move → about -5.72%
        assert!((impermanent_loss_pct(2.0) + 5.719).abs() < 0.01);
        assert_eq!(impermanent_loss_pct(0.0), -100.0);
    }

    #[test]
    fn test_empty_portfolio_is_zero_risk() {
        let summary = RiskModel::new().assess_portfolio(&[], &[]);
        assert_eq!(summary.overall_risk_score, 0.0);
        assert_eq!(summary.category, RiskCategory::VeryLow);
        assert_eq!(summary.diversification_score, 0.0);
        assert_eq!(summary.concentration_risk, 0.0);
        assert_eq!(summary.correlation_risk, 0.0);
    }

    #[test]
    fn test_diversified_portfolio_scores_higher() {
        let model = RiskModel::new();
        let concentrated = vec![holding("ethereum", Some("aave-v3"), "USDC", 3_000)];
        let spread = vec![
            holding("ethereum", Some("aave-v3"), "USDC", 1_000),
            holding("arbitrum", Some("compound-v3"), "WETH", 1_000),
            holding("base", Some("aerodrome"), "DAI", 1_000),
        ];

        let a = model.assess_portfolio(&concentrated, &[]);
        let b = model.assess_portfolio(&spread, &[]);

        assert!(a.diversification_score < b.diversification_score);
        assert!(a.concentration_risk > b.concentration_risk);
        assert!(a.correlation_risk > b.correlation_risk);
        assert!(b.diversification_score <= 100.0);
    }

    #[test]
    fn test_portfolio_is_value_weighted() {
        let model = RiskModel::new();
        let mut risky = holding("ethereum", Some("degen"), "PEPE", 100);
        risky.risk_score = Some(9.0);
        let mut safe = holding("ethereum", None, "USDC", 900);
        safe.risk_score = Some(1.0);

        let summary = model.assess_portfolio(&[risky, safe], &[]);
        assert!((summary.overall_risk_score - 1.8).abs() < 1e-9);
        assert_eq!(summary.total_value, Decimal::from(1_000));
    }

    #[test]
    fn test_asset_risk_uses_catalog_match() {
        let model = RiskModel::new();
        let opp = opportunity("WETH", StrategyCategory::Farming, RiskLevel::High, 100_000);
        let deployed = holding("ethereum", Some("aave-v3"), "weth", 1_000);
        let score = model.asset_risk_score(&deployed, std::slice::from_ref(&opp));
        assert_eq!(score, model.score(&opp));

        let idle = holding("ethereum", None, "USDC", 1_000);
        assert_eq!(model.asset_risk_score(&idle, &[opp]), IDLE_RISK_STABLE);
    }

    #[test]
    fn test_assess_opportunities_empty_and_spread() {
        let model = RiskModel::new();
        assert_eq!(model.assess_opportunities(&[]), RecommendationRisk::default());

        let lp = opportunity("USDC-WETH", StrategyCategory::LiquidityProvision, RiskLevel::Medium, 50_000_000);
        let lend = opportunity("USDC", StrategyCategory::Lending, RiskLevel::Low, 500_000_000);
        let risk = model.assess_opportunities(&[&lp, &lend]);
        assert!(risk.impermanent_loss_risk > 0.0);
        assert!(risk.average_risk > 0.0);
        assert!(risk.diversification_score > 0.0);
    }
}
