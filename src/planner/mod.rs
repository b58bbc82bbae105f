//! Rebalance Planner: turns the difference between a current and a target
//! portfolio into an ordered list of [`RebalancingAction`]s.
//!
//! Positions are compared by [`AssetKey`]. Surpluses are paired greedily
//! with deficits, preferring a source with the same symbol on the same
//! chain, then the same symbol elsewhere, then the same chain. Whatever
//! cannot be paired becomes a one-sided action.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::intelligence::RiskModel;
use crate::models::{
    annual_yield_usd, weighted_apy, Asset, AssetKey, PortfolioRebalanceReport, RebalancingAction,
    Recommendation, RiskChange, YieldOpportunity,
};
use crate::tuning::{DUST_THRESHOLD, RISK_CHANGE_DEAD_ZONE, TARGET_ALLOCATION_SPLIT};

/// One side of the diff: a position and the value still to move.
#[derive(Debug, Clone)]
struct Leg {
    asset: Asset,
    remaining: Decimal,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RebalancePlanner {
    risk: RiskModel,
}

impl RebalancePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions transforming `current` into `target`. `catalog` supplies risk
    /// metadata for deployed positions.
    pub fn diff(
        &self,
        current: &[Asset],
        target: &[Asset],
        catalog: &[YieldOpportunity],
    ) -> Vec<RebalancingAction> {
        let current_by_key = aggregate(current);
        let target_by_key = aggregate(target);

        let mut surpluses = Vec::new();
        let mut deficits = Vec::new();

        for (key, held) in &current_by_key {
            let wanted = target_by_key.get(key).map(|a| a.value_usd).unwrap_or(Decimal::ZERO);
            let delta = held.value_usd - wanted;
            if delta > DUST_THRESHOLD {
                surpluses.push(Leg {
                    asset: held.clone(),
                    remaining: delta,
                });
            }
        }
        for (key, wanted) in &target_by_key {
            let held = current_by_key.get(key).map(|a| a.value_usd).unwrap_or(Decimal::ZERO);
            let delta = wanted.value_usd - held;
            if delta > DUST_THRESHOLD {
                deficits.push(Leg {
                    asset: wanted.clone(),
                    remaining: delta,
                });
            }
        }

        // Largest first; BTreeMap iteration already fixed the tie order.
        surpluses.sort_by(|a, b| b.remaining.cmp(&a.remaining));
        deficits.sort_by(|a, b| b.remaining.cmp(&a.remaining));

        let mut actions = Vec::new();

        for deficit in &mut deficits {
            let mut order: Vec<usize> = (0..surpluses.len()).collect();
            order.sort_by_key(|&i| pairing_rank(&surpluses[i].asset, &deficit.asset));

            for i in order {
                if deficit.remaining <= DUST_THRESHOLD {
                    break;
                }
                let source = &mut surpluses[i];
                if source.remaining <= DUST_THRESHOLD {
                    continue;
                }
                let value = source.remaining.min(deficit.remaining);
                source.remaining -= value;
                deficit.remaining -= value;

                let new_position = !current_by_key.contains_key(&deficit.asset.key());
                actions.push(self.move_action(&source.asset, &deficit.asset, value, new_position, catalog));
            }
        }

        for surplus in surpluses.iter().filter(|s| s.remaining > DUST_THRESHOLD) {
            actions.push(self.exit_action(&surplus.asset, surplus.remaining, catalog));
        }
        for deficit in deficits.iter().filter(|d| d.remaining > DUST_THRESHOLD) {
            let new_position = !current_by_key.contains_key(&deficit.asset.key());
            actions.push(entry_action(&deficit.asset, deficit.remaining, new_position));
        }

        tracing::debug!(
            current = current_by_key.len(),
            target = target_by_key.len(),
            actions = actions.len(),
            "Portfolio diff computed"
        );
        actions
    }

    /// Full report: actions plus APY, risk and yield deltas.
    pub fn plan(
        &self,
        current: &[Asset],
        target: &[Asset],
        catalog: &[YieldOpportunity],
    ) -> PortfolioRebalanceReport {
        let actions = self.diff(current, target, catalog);

        let current_risk = self.risk.assess_portfolio(current, catalog).overall_risk_score;
        let target_risk = self.risk.assess_portfolio(target, catalog).overall_risk_score;

        let report = PortfolioRebalanceReport {
            current_portfolio: current.to_vec(),
            recommended_portfolio: target.to_vec(),
            potential_apy_increase: (weighted_apy(target) - weighted_apy(current)).round_dp(4),
            potential_risk_change: target_risk - current_risk,
            estimated_annual_yield_difference: (annual_yield_usd(target) - annual_yield_usd(current))
                .round_dp(2),
            actions,
            failed_chains: Vec::new(),
        };

        tracing::info!(
            actions = report.actions.len(),
            apy_increase = %report.potential_apy_increase,
            risk_change = report.potential_risk_change,
            "Rebalance plan built"
        );
        report
    }

    fn move_action(
        &self,
        from: &Asset,
        to: &Asset,
        value: Decimal,
        new_position: bool,
        catalog: &[YieldOpportunity],
    ) -> RebalancingAction {
        let from_risk = self.risk.asset_risk_score(from, catalog);
        let to_risk = self.risk.asset_risk_score(to, catalog);
        let apy_delta = to.apy_or_zero() - from.apy_or_zero();

        let reason = if from.chain.eq_ignore_ascii_case(&to.chain) {
            format!("Move {} into {} for {:+}% APY", from, to, apy_delta.round_dp(2))
        } else {
            format!(
                "Bridge {} from {} into {} for {:+}% APY",
                from.symbol,
                from.chain,
                to,
                apy_delta.round_dp(2)
            )
        };

        RebalancingAction {
            id: Uuid::new_v4(),
            from: Some(from.clone()),
            to: Some(to.clone()),
            amount: units_of(from, value),
            value_usd: value,
            reason,
            expected_apy_delta: apy_delta,
            risk_change: classify_risk_change(from_risk, to_risk),
            new_position,
            depends_on: Vec::new(),
        }
    }

    fn exit_action(&self, from: &Asset, value: Decimal, catalog: &[YieldOpportunity]) -> RebalancingAction {
        let wallet = Asset {
            protocol: None,
            apy: None,
            risk_score: None,
            ..from.clone()
        };
        let from_risk = self.risk.asset_risk_score(from, catalog);
        let to_risk = self.risk.asset_risk_score(&wallet, catalog);

        RebalancingAction {
            id: Uuid::new_v4(),
            from: Some(from.clone()),
            to: None,
            amount: units_of(from, value),
            value_usd: value,
            reason: format!("Reduce {} with no target to fund", from),
            expected_apy_delta: -from.apy_or_zero(),
            risk_change: classify_risk_change(from_risk, to_risk),
            new_position: false,
            depends_on: Vec::new(),
        }
    }
}

fn entry_action(to: &Asset, value: Decimal, new_position: bool) -> RebalancingAction {
    RebalancingAction {
        id: Uuid::new_v4(),
        from: None,
        to: Some(to.clone()),
        amount: units_of(to, value),
        value_usd: value,
        reason: format!("Fund {} from new capital", to),
        expected_apy_delta: to.apy_or_zero(),
        risk_change: RiskChange::New,
        new_position,
        depends_on: Vec::new(),
    }
}

/// Merge duplicate keys by summing quantity and value.
fn aggregate(assets: &[Asset]) -> BTreeMap<AssetKey, Asset> {
    let mut by_key: BTreeMap<AssetKey, Asset> = BTreeMap::new();
    for asset in assets {
        by_key
            .entry(asset.key())
            .and_modify(|existing| {
                existing.quantity += asset.quantity;
                existing.value_usd += asset.value_usd;
            })
            .or_insert_with(|| asset.clone());
    }
    by_key
}

/// Lower is a better funding source for `target`.
fn pairing_rank(source: &Asset, target: &Asset) -> u8 {
    let same_symbol = source.symbol.eq_ignore_ascii_case(&target.symbol);
    let same_chain = source.chain.eq_ignore_ascii_case(&target.chain);
    match (same_symbol, same_chain) {
        (true, true) => 0,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    }
}

/// Units of `asset` worth `value` USD; falls back to `value` when unpriced.
pub(crate) fn units_of(asset: &Asset, value: Decimal) -> Decimal {
    match asset.unit_price() {
        Some(price) if !price.is_zero() => (value / price).round_dp(8),
        _ => value,
    }
}

pub fn classify_risk_change(from_risk: f64, to_risk: f64) -> RiskChange {
    let delta = to_risk - from_risk;
    if delta > RISK_CHANGE_DEAD_ZONE {
        RiskChange::Increased
    } else if delta < -RISK_CHANGE_DEAD_ZONE {
        RiskChange::Decreased
    } else {
        RiskChange::Unchanged
    }
}

/// Target portfolio placing the holder's total value into the top
/// recommendations by the 40/30/20/10 split, renormalised when fewer than
/// four are available. With no recommendations the current portfolio is
/// the target.
pub fn target_from_recommendations(current: &[Asset], recommendations: &[Recommendation]) -> Vec<Asset> {
    let total: Decimal = current.iter().map(|a| a.value_usd).sum();
    let picks: Vec<&Recommendation> = recommendations.iter().take(TARGET_ALLOCATION_SPLIT.len()).collect();
    if picks.is_empty() || total <= Decimal::ZERO {
        return current.to_vec();
    }

    let weights = &TARGET_ALLOCATION_SPLIT[..picks.len()];
    let weight_sum: Decimal = weights.iter().copied().sum();

    let last = picks.len() - 1;
    let mut allocated = Decimal::ZERO;

    let targets: Vec<Asset> = picks
        .iter()
        .zip(weights)
        .enumerate()
        .map(|(i, (rec, weight))| {
            let opportunity = &rec.opportunity;
            // Last slice takes the remainder so slices sum to the total exactly.
            let value_usd = if i == last {
                total - allocated
            } else {
                (total * *weight / weight_sum).round_dp(2)
            };
            allocated += value_usd;
            let unit_price = current
                .iter()
                .filter(|a| a.symbol.eq_ignore_ascii_case(&opportunity.asset))
                .find_map(Asset::unit_price);
            let quantity = match unit_price {
                Some(price) if !price.is_zero() => (value_usd / price).round_dp(8),
                _ => value_usd,
            };
            Asset {
                symbol: opportunity.asset.clone(),
                chain: opportunity.chain.clone(),
                protocol: Some(opportunity.protocol.clone()),
                token_address: None,
                quantity,
                value_usd,
                apy: Some(opportunity.apy),
                risk_score: None,
            }
        })
        .collect();

    aggregate(&targets).into_values().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
