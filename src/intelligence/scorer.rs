use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Asset, OptimizationCriteria, YieldOpportunity};
use crate::tuning::*;

/// Scoring output for one opportunity against one holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityScore {
    /// Never negative.
    pub score: f64,
    pub reasons: Vec<String>,
    pub suggestions: Vec<String>,
    pub requires_bridge: bool,
    /// Chain the holder's matching asset would be bridged from.
    pub source_chain: Option<String>,
    /// USD value of the holder's asset that would fund the opportunity.
    pub matching_value: Decimal,
}

/// How the holder relates to an opportunity's asset.
enum Holding {
    SameChain(Decimal),
    OtherChain { chain: String, value: Decimal },
    None,
}

fn find_holding(opportunity: &YieldOpportunity, holdings: &[Asset]) -> Holding {
    let matching = holdings.iter().filter(|a| opportunity.matches_symbol(&a.symbol));

    let same_chain: Decimal = matching
        .clone()
        .filter(|a| a.chain.eq_ignore_ascii_case(&opportunity.chain))
        .map(|a| a.value_usd)
        .sum();
    if same_chain > Decimal::ZERO {
        return Holding::SameChain(same_chain);
    }

    matching
        .filter(|a| a.value_usd > Decimal::ZERO)
        .max_by(|a, b| a.value_usd.cmp(&b.value_usd).then_with(|| b.chain.cmp(&a.chain)))
        .map(|a| Holding::OtherChain {
            chain: a.chain.clone(),
            value: a.value_usd,
        })
        .unwrap_or(Holding::None)
}

/// Score an opportunity for a holder. Pure and deterministic.
pub fn score_opportunity(
    opportunity: &YieldOpportunity,
    holdings: &[Asset],
    criteria: &OptimizationCriteria,
) -> OpportunityScore {
    let mut score = 0.0;
    let mut reasons = Vec::new();
    let mut suggestions = Vec::new();
    let mut requires_bridge = false;
    let mut source_chain = None;
    let mut matching_value = Decimal::ZERO;

    match find_holding(opportunity, holdings) {
        Holding::SameChain(value) => {
            score += SCORE_HELD_SAME_CHAIN;
            matching_value = value;
            reasons.push(format!(
                "You already hold {} on {}",
                opportunity.asset, opportunity.chain
            ));
        }
        Holding::OtherChain { chain, value } => {
            score += SCORE_HELD_OTHER_CHAIN;
            matching_value = value;
            requires_bridge = true;
            reasons.push(format!(
                "Cross-chain opportunity: your {} is on {}, this pays on {}",
                opportunity.asset, chain, opportunity.chain
            ));
            suggestions.push(format!(
                "Bridge {} from {} to {} to capture {}% APY",
                opportunity.asset,
                chain,
                opportunity.chain,
                opportunity.apy.round_dp(2)
            ));
            source_chain = Some(chain);
        }
        Holding::None => {
            score += SCORE_NOT_HELD;
            reasons.push(format!("You don't currently hold {}", opportunity.asset));
            suggestions.push(format!(
                "Acquire {} on {} to enter this position",
                opportunity.asset, opportunity.chain
            ));
        }
    }

    if criteria.prioritize_highest_yield {
        let apy = opportunity.apy.to_f64().unwrap_or(0.0).max(0.0);
        score += apy * SCORE_YIELD_WEIGHT;
        reasons.push(format!("Yields {}% APY", opportunity.apy.round_dp(2)));
    }

    let excess = opportunity.risk_level.rank() - criteria.risk_tolerance.rank();
    if excess <= 0 {
        score += SCORE_WITHIN_TOLERANCE;
        reasons.push(format!(
            "{} risk is within your {} tolerance",
            opportunity.risk_level, criteria.risk_tolerance
        ));
    } else {
        score -= SCORE_EXCESS_RISK_PENALTY * excess as f64;
        reasons.push(format!(
            "{} risk exceeds your {} tolerance",
            opportunity.risk_level, criteria.risk_tolerance
        ));
    }

    if criteria.prefers_chain(&opportunity.chain) {
        score += SCORE_PREFERRED_CHAIN;
        reasons.push(format!("On preferred chain {}", opportunity.chain));
    }
    if criteria.prefers_asset(&opportunity.asset) {
        score += SCORE_PREFERRED_ASSET;
        reasons.push(format!("Uses preferred asset {}", opportunity.asset));
    }
    if criteria.prefers_protocol(&opportunity.protocol) {
        score += SCORE_PREFERRED_PROTOCOL;
        reasons.push(format!("Uses preferred protocol {}", opportunity.protocol));
    }

    if opportunity.verified {
        score += SCORE_VERIFIED;
        reasons.push("Verified protocol".to_string());
    }

    if let Some(min) = criteria.min_liquidity {
        if opportunity.tvl_usd < min {
            score -= SCORE_LOW_LIQUIDITY_PENALTY;
            reasons.push(format!(
                "TVL ${} is below your ${} minimum",
                opportunity.tvl_usd.round_dp(0),
                min.round_dp(0)
            ));
        }
    }

    OpportunityScore {
        score: score.max(0.0),
        reasons,
        suggestions,
        requires_bridge,
        source_chain,
        matching_value,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
