//! Scoring, risk, allocation and fee constants.
//!
//! Every heuristic weight the pipeline uses lives here so it can be tuned
//! and tested independently of the code that applies it. Risk factors are on
//! a 0–10 scale; APYs are percentages (5.0 = 5%); fees are in USD.

use rust_decimal::Decimal;

use crate::models::StrategyCategory;

// ---------------------------------------------------------------------------
// Risk model: factor weights (must sum to 1.0)
// ---------------------------------------------------------------------------

pub const WEIGHT_PROTOCOL: f64 = 0.20;
/// Applied to `10 - audit_score`.
pub const WEIGHT_AUDIT: f64 = 0.15;
pub const WEIGHT_IMPERMANENT_LOSS: f64 = 0.15;
/// Applied to `10 - liquidity_depth`.
pub const WEIGHT_LIQUIDITY: f64 = 0.15;
pub const WEIGHT_VOLATILITY: f64 = 0.15;
pub const WEIGHT_COMPOSABILITY: f64 = 0.08;
pub const WEIGHT_REGULATORY: f64 = 0.05;
pub const WEIGHT_COUNTERPARTY: f64 = 0.07;

/// Upper bounds (exclusive) of the Very Low, Low, Medium and High buckets.
pub const CATEGORY_THRESHOLDS: [f64; 4] = [2.0, 4.0, 6.0, 8.0];

// ---------------------------------------------------------------------------
// Risk model: factor derivation
// ---------------------------------------------------------------------------

pub const PROTOCOL_RISK_LOW: f64 = 2.0;
pub const PROTOCOL_RISK_MEDIUM: f64 = 5.0;
pub const PROTOCOL_RISK_HIGH: f64 = 8.0;
pub const UNVERIFIED_PROTOCOL_PENALTY: f64 = 1.5;

pub const AUDIT_SCORE_VERIFIED: f64 = 8.0;
pub const AUDIT_SCORE_UNVERIFIED: f64 = 3.0;

/// TVL (USD) at which liquidity depth starts scoring above zero: 10^4.
pub const LIQUIDITY_LOG10_FLOOR: f64 = 4.0;
/// Points per order of magnitude above the floor ($1B scores 10).
pub const LIQUIDITY_POINTS_PER_DECADE: f64 = 2.0;

pub const VOLATILITY_STABLE: f64 = 1.0;
pub const VOLATILITY_MAJOR: f64 = 5.0;
pub const VOLATILITY_OTHER: f64 = 7.5;
pub const VOLATILITY_FARMING_SURCHARGE: f64 = 1.0;

pub const IL_RISK_LP_STABLE: f64 = 2.0;
pub const IL_RISK_LP_VOLATILE: f64 = 6.0;
pub const IL_RISK_FARMING_STABLE: f64 = 3.0;
pub const IL_RISK_FARMING_VOLATILE: f64 = 7.0;

/// Strategy-dependent factors that do not depend on the asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryRiskProfile {
    pub composability: f64,
    pub regulatory: f64,
    pub counterparty: f64,
}

pub fn category_risk_profile(strategy: StrategyCategory) -> CategoryRiskProfile {
    let (composability, regulatory, counterparty) = match strategy {
        StrategyCategory::Lending => (3.0, 5.0, 6.5),
        StrategyCategory::Staking => (2.0, 4.0, 4.0),
        StrategyCategory::LiquidityProvision => (4.0, 3.0, 3.0),
        StrategyCategory::Farming => (6.0, 4.0, 5.0),
    };
    CategoryRiskProfile {
        composability,
        regulatory,
        counterparty,
    }
}

/// Risk score used for a holding with no deployment metadata.
pub const IDLE_RISK_STABLE: f64 = 1.0;
pub const IDLE_RISK_MAJOR: f64 = 3.0;
pub const IDLE_RISK_OTHER: f64 = 5.0;
/// Protocol risk assumed for a deployed holding missing from the catalog.
pub const UNKNOWN_PROTOCOL_RISK: f64 = 5.0;

/// One-tailed 95% normal quantile. Heuristic VaR, not a calibrated model.
pub const VAR_CONFIDENCE_MULTIPLIER: f64 = 1.65;
/// Maps volatility risk 10 to an assumed 50% annual volatility.
pub const VOLATILITY_PROXY_SCALE: f64 = 0.5;

pub const DRAWDOWN_PER_RISK_POINT: f64 = 6.0;
pub const DRAWDOWN_PER_IL_POINT: f64 = 2.0;

pub const STRESS_CRASH_VOLATILITY_PCT: f64 = 50.0;
pub const STRESS_CRASH_IL_PCT: f64 = 10.0;
pub const STRESS_HACK_PROTOCOL_PCT: f64 = 80.0;
pub const STRESS_HACK_AUDIT_PCT: f64 = 20.0;
pub const STRESS_LIQUIDITY_CRISIS_PCT: f64 = 30.0;

// ---------------------------------------------------------------------------
// Portfolio risk
// ---------------------------------------------------------------------------

pub const DIVERSIFICATION_PER_CHAIN: f64 = 15.0;
pub const DIVERSIFICATION_PER_PROTOCOL: f64 = 10.0;
pub const DIVERSIFICATION_PER_ASSET: f64 = 10.0;
pub const DIVERSIFICATION_CAP: f64 = 100.0;

pub const CORRELATION_BASE: f64 = 10.0;
pub const CORRELATION_RELIEF_PER_CHAIN: f64 = 2.0;
pub const CORRELATION_RELIEF_PER_PROTOCOL: f64 = 1.5;

// ---------------------------------------------------------------------------
// Recommendation scoring
// ---------------------------------------------------------------------------

pub const SCORE_HELD_SAME_CHAIN: f64 = 50.0;
pub const SCORE_HELD_OTHER_CHAIN: f64 = 25.0;
pub const SCORE_NOT_HELD: f64 = 5.0;
/// Points per APY percentage point when yield is prioritized.
pub const SCORE_YIELD_WEIGHT: f64 = 2.0;
pub const SCORE_WITHIN_TOLERANCE: f64 = 15.0;
/// Points removed per risk level above the holder's tolerance.
pub const SCORE_EXCESS_RISK_PENALTY: f64 = 20.0;
pub const SCORE_PREFERRED_CHAIN: f64 = 10.0;
pub const SCORE_PREFERRED_ASSET: f64 = 10.0;
pub const SCORE_PREFERRED_PROTOCOL: f64 = 10.0;
pub const SCORE_VERIFIED: f64 = 5.0;
pub const SCORE_LOW_LIQUIDITY_PENALTY: f64 = 15.0;

pub const MAX_RECOMMENDATIONS: usize = 5;
/// Recommendations averaged into `total_potential_yield`.
pub const POTENTIAL_YIELD_SAMPLE: usize = 3;

// ---------------------------------------------------------------------------
// Rebalance planning
// ---------------------------------------------------------------------------

/// Share of total value given to the 1st..4th recommendation.
pub const TARGET_ALLOCATION_SPLIT: [Decimal; 4] = [
    Decimal::from_parts(40, 0, 0, false, 2),
    Decimal::from_parts(30, 0, 0, false, 2),
    Decimal::from_parts(20, 0, 0, false, 2),
    Decimal::from_parts(10, 0, 0, false, 2),
];

/// Risk deltas inside ±this value are reported as unchanged.
pub const RISK_CHANGE_DEAD_ZONE: f64 = 0.5;
/// Value deltas (USD) below this are ignored by the planner.
pub const DUST_THRESHOLD: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

// ---------------------------------------------------------------------------
// Execution cost model
// ---------------------------------------------------------------------------

/// Base fee (USD) of one on-chain operation per chain.
pub fn chain_base_fee(chain: &str) -> Decimal {
    match chain {
        "ethereum" => Decimal::new(800, 2),
        "polygon" => Decimal::new(2, 2),
        "arbitrum" => Decimal::new(15, 2),
        "optimism" => Decimal::new(10, 2),
        "base" => Decimal::new(5, 2),
        "bsc" => Decimal::new(20, 2),
        "avalanche" => Decimal::new(25, 2),
        _ => Decimal::new(100, 2),
    }
}

pub const SWAP_FEE_MULTIPLIER: Decimal = Decimal::from_parts(15, 0, 0, false, 1);
pub const WITHDRAW_FEE_MULTIPLIER: Decimal = Decimal::from_parts(12, 0, 0, false, 1);
pub const DEPOSIT_FEE_MULTIPLIER: Decimal = Decimal::from_parts(12, 0, 0, false, 1);
pub const APPROVE_FEE_MULTIPLIER: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Flat bridge fee (USD) for a directed chain pair, if the table has one.
pub fn bridge_pair_fee(from: &str, to: &str) -> Option<Decimal> {
    let fee = match (from, to) {
        ("ethereum", "arbitrum") | ("ethereum", "optimism") | ("ethereum", "base") => {
            Decimal::new(1200, 2)
        }
        ("ethereum", "polygon") => Decimal::new(1500, 2),
        ("ethereum", _) => Decimal::new(2000, 2),
        (_, "ethereum") => Decimal::new(500, 2),
        ("arbitrum", "optimism") | ("optimism", "arbitrum") => Decimal::new(100, 2),
        ("arbitrum", "base") | ("base", "arbitrum") => Decimal::new(80, 2),
        ("optimism", "base") | ("base", "optimism") => Decimal::new(60, 2),
        ("polygon", _) | (_, "polygon") => Decimal::new(150, 2),
        ("bsc", _) | (_, "bsc") => Decimal::new(200, 2),
        ("avalanche", _) | (_, "avalanche") => Decimal::new(250, 2),
        _ => return None,
    };
    Some(fee)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_weights_sum_to_one() {
        let sum = WEIGHT_PROTOCOL
            + WEIGHT_AUDIT
            + WEIGHT_IMPERMANENT_LOSS
            + WEIGHT_LIQUIDITY
            + WEIGHT_VOLATILITY
            + WEIGHT_COMPOSABILITY
            + WEIGHT_REGULATORY
            + WEIGHT_COUNTERPARTY;
        assert!((sum - 1.0).abs() < 1e-9, "weights sum to {sum}");
    }

    #[test]
    fn test_allocation_split_sums_to_one() {
        let sum: Decimal = TARGET_ALLOCATION_SPLIT.iter().copied().sum();
        assert_eq!(sum, Decimal::ONE);
    }

    #[test]
    fn test_bridge_pair_fee_lookup() {
        assert_eq!(bridge_pair_fee("ethereum", "arbitrum"), Some(Decimal::new(12, 0)));
        assert_eq!(bridge_pair_fee("base", "optimism"), Some(Decimal::new(60, 2)));
        assert_eq!(bridge_pair_fee("solana", "aptos"), None);
    }
}
