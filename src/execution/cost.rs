//! Decomposition of a [`RebalancingAction`] into on-chain operations, and the
//! pre-flight fee estimate built on it.
//!
//! Same-chain: withdraw (if deployed) → approve → swap (if symbols differ) →
//! deposit (if the destination is a protocol).
//! Cross-chain: withdraw → approve → bridge-out → bridge-in → swap →
//! deposit, each leg only when needed. At most one approval per action.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::chains::ChainRegistry;
use crate::models::{Asset, Operation, OperationKind, RebalancingAction};
use crate::planner::units_of;
use crate::tuning::{
    chain_base_fee, APPROVE_FEE_MULTIPLIER, DEPOSIT_FEE_MULTIPLIER, SWAP_FEE_MULTIPLIER,
    WITHDRAW_FEE_MULTIPLIER,
};

use super::bridge::{select_bridge, BridgeError, BridgeOption, BridgeQuote};

/// Counterparty recorded for swaps.
pub const SWAP_ROUTER: &str = "dex-aggregator";

/// An operation with its estimated fee and, for bridge legs, the quote.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOperation {
    pub operation: Operation,
    pub fee_usd: Decimal,
    pub bridge: Option<BridgeQuote>,
}

/// Estimated fee of one operation. Bridge-out carries the bridge quote;
/// bridge-in is paid by the bridge.
pub fn operation_fee(kind: OperationKind, chain: &str, bridge: Option<&BridgeQuote>) -> Decimal {
    let base = chain_base_fee(&chain.to_lowercase());
    match kind {
        OperationKind::Approve => base * APPROVE_FEE_MULTIPLIER,
        OperationKind::Withdraw => base * WITHDRAW_FEE_MULTIPLIER,
        OperationKind::Swap => base * SWAP_FEE_MULTIPLIER,
        OperationKind::Deposit => base * DEPOSIT_FEE_MULTIPLIER,
        OperationKind::BridgeOut => bridge.map(|q| q.fee_usd).unwrap_or(Decimal::ZERO),
        OperationKind::BridgeIn => Decimal::ZERO,
    }
}

fn needs_approval(registry: &ChainRegistry, chain: &str, symbol: &str) -> bool {
    registry
        .get(chain)
        .map(|c| !c.native_symbol.eq_ignore_ascii_case(symbol))
        .unwrap_or(true)
}

struct Builder {
    action_id: Uuid,
    ops: Vec<PlannedOperation>,
}

impl Builder {
    fn push(
        &mut self,
        kind: OperationKind,
        chain: &str,
        asset: &str,
        amount: Decimal,
        counterparty: &str,
        bridge: Option<BridgeQuote>,
    ) {
        let fee_usd = operation_fee(kind, chain, bridge.as_ref());
        self.ops.push(PlannedOperation {
            operation: Operation {
                action_id: self.action_id,
                sequence: self.ops.len(),
                kind,
                chain: chain.to_string(),
                asset: asset.to_string(),
                amount,
                counterparty: counterparty.to_string(),
            },
            fee_usd,
            bridge,
        });
    }
}

/// Units of the destination asset the action delivers.
fn destination_units(action: &RebalancingAction, from: &Asset, to: &Asset) -> Decimal {
    if from.symbol.eq_ignore_ascii_case(&to.symbol) {
        action.amount
    } else {
        units_of(to, action.value_usd)
    }
}

/// Operations needed to carry out `action`, in submission order.
///
/// Fails only when a cross-chain action has no bridge serving its chain
/// pair and asset.
pub fn decompose(
    action: &RebalancingAction,
    registry: &ChainRegistry,
    bridges: &[BridgeOption],
) -> Result<Vec<PlannedOperation>, BridgeError> {
    let mut b = Builder {
        action_id: action.id,
        ops: Vec::new(),
    };

    match (&action.from, &action.to) {
        (Some(from), Some(to)) => {
            let cross_chain = action.is_cross_chain();
            let quote = if cross_chain {
                Some(select_bridge(bridges, &from.chain, &to.chain, &from.symbol)?)
            } else {
                None
            };
            let swap = !from.symbol.eq_ignore_ascii_case(&to.symbol);
            let out_units = destination_units(action, from, to);

            if let Some(protocol) = &from.protocol {
                b.push(OperationKind::Withdraw, &from.chain, &from.symbol, action.amount, protocol, None);
            }

            // First contract the source token is handed to.
            let spender = match (&quote, swap, &to.protocol) {
                (Some(q), _, _) => Some(q.bridge.as_str()),
                (None, true, _) => Some(SWAP_ROUTER),
                (None, false, Some(protocol)) => Some(protocol.as_str()),
                (None, false, None) => None,
            };
            if let Some(spender) = spender {
                if needs_approval(registry, &from.chain, &from.symbol) {
                    b.push(OperationKind::Approve, &from.chain, &from.symbol, action.amount, spender, None);
                }
            }

            if let Some(q) = quote {
                let bridge = q.bridge.clone();
                b.push(OperationKind::BridgeOut, &from.chain, &from.symbol, action.amount, &bridge, Some(q.clone()));
                b.push(OperationKind::BridgeIn, &to.chain, &from.symbol, action.amount, &bridge, Some(q));
            }
            if swap {
                b.push(OperationKind::Swap, &to.chain, &to.symbol, out_units, SWAP_ROUTER, None);
            }
            if let Some(protocol) = &to.protocol {
                b.push(OperationKind::Deposit, &to.chain, &to.symbol, out_units, protocol, None);
            }
        }
        (None, Some(to)) => {
            if let Some(protocol) = &to.protocol {
                if needs_approval(registry, &to.chain, &to.symbol) {
                    b.push(OperationKind::Approve, &to.chain, &to.symbol, action.amount, protocol, None);
                }
                b.push(OperationKind::Deposit, &to.chain, &to.symbol, action.amount, protocol, None);
            }
        }
        (Some(from), None) => {
            if let Some(protocol) = &from.protocol {
                b.push(OperationKind::Withdraw, &from.chain, &from.symbol, action.amount, protocol, None);
            }
        }
        (None, None) => {}
    }

    Ok(b.ops)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationCost {
    pub kind: OperationKind,
    pub chain: String,
    pub fee_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionCost {
    pub action_id: Uuid,
    pub operations: Vec<OperationCost>,
    pub bridge: Option<BridgeQuote>,
    pub total_usd: Decimal,
    /// Set when the action cannot be routed; it contributes no fee.
    pub error: Option<String>,
}

/// Pre-flight fee estimate for a whole plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    pub actions: Vec<ActionCost>,
    pub total_usd: Decimal,
    pub unroutable_actions: usize,
}

pub fn estimate_cost(
    actions: &[RebalancingAction],
    registry: &ChainRegistry,
    bridges: &[BridgeOption],
) -> CostEstimate {
    let costs: Vec<ActionCost> = actions
        .iter()
        .map(|action| match decompose(action, registry, bridges) {
            Ok(ops) => ActionCost {
                action_id: action.id,
                total_usd: ops.iter().map(|p| p.fee_usd).sum::<Decimal>().round_dp(4),
                bridge: ops.iter().find_map(|p| p.bridge.clone()),
                operations: ops
                    .iter()
                    .map(|p| OperationCost {
                        kind: p.operation.kind,
                        chain: p.operation.chain.clone(),
                        fee_usd: p.fee_usd,
                    })
                    .collect(),
                error: None,
            },
            Err(e) => ActionCost {
                action_id: action.id,
                operations: Vec::new(),
                bridge: None,
                total_usd: Decimal::ZERO,
                error: Some(e.to_string()),
            },
        })
        .collect();

    let estimate = CostEstimate {
        total_usd: costs.iter().map(|c| c.total_usd).sum(),
        unroutable_actions: costs.iter().filter(|c| c.error.is_some()).count(),
        actions: costs,
    };
    tracing::debug!(
        actions = actions.len(),
        total_usd = %estimate.total_usd,
        unroutable = estimate.unroutable_actions,
        "Plan cost estimated"
    );
    estimate
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::bridge::{BridgeRouter, StaticBridgeRouter};
    use crate::models::RiskChange;

    fn asset(symbol: &str, chain: &str, protocol: Option<&str>, value: i64) -> Asset {
        Asset {
            symbol: symbol.into(),
            chain: chain.into(),
            protocol: protocol.map(String::from),
            token_address: None,
            quantity: Decimal::from(value),
            value_usd: Decimal::from(value),
            apy: None,
            risk_score: None,
        }
    }

    fn action(from: Option<Asset>, to: Option<Asset>, value: i64) -> RebalancingAction {
        RebalancingAction {
            id: Uuid::new_v4(),
            from,
            to,
            amount: Decimal::from(value),
            value_usd: Decimal::from(value),
            reason: "test".into(),
            expected_apy_delta: Decimal::ZERO,
            risk_change: RiskChange::Unchanged,
            new_position: false,
            depends_on: vec![],
        }
    }

    fn kinds(ops: &[PlannedOperation]) -> Vec<OperationKind> {
        ops.iter().map(|p| p.operation.kind).collect()
    }

    #[test]
    fn test_same_chain_protocol_transition() {
        let registry = ChainRegistry::mainnets();
        let a = action(
            Some(asset("USDC", "ethereum", Some("aave-v3"), 1_000)),
            Some(asset("USDC", "ethereum", Some("compound-v3"), 1_000)),
            1_000,
        );
        let ops = decompose(&a, &registry, &[]).unwrap();

        assert_eq!(
            kinds(&ops),
            vec![OperationKind::Withdraw, OperationKind::Approve, OperationKind::Deposit]
        );
        assert_eq!(ops[1].operation.counterparty, "compound-v3");
        let total: Decimal = ops.iter().map(|p| p.fee_usd).sum();
        // 8.00 × (1.2 + 0.5 + 1.2)
        assert_eq!(total, Decimal::new(2320, 2));
        assert!(ops.iter().enumerate().all(|(i, p)| p.operation.sequence == i));
    }

    #[test]
    fn test_same_chain_swap_of_native_skips_approval() {
        let registry = ChainRegistry::mainnets();
        let a = action(
            Some(asset("ETH", "ethereum", None, 500)),
            Some(asset("USDC", "ethereum", None, 500)),
            500,
        );
        let ops = decompose(&a, &registry, &[]).unwrap();
        assert_eq!(kinds(&ops), vec![OperationKind::Swap]);
        assert_eq!(ops[0].operation.counterparty, SWAP_ROUTER);
    }

    #[test]
    fn test_cross_chain_route() {
        let registry = ChainRegistry::mainnets();
        let router = StaticBridgeRouter::mainnet();
        let a = action(
            Some(asset("USDC", "arbitrum", None, 1_000)),
            Some(asset("USDC", "base", Some("aave-v3"), 1_000)),
            1_000,
        );
        let ops = decompose(&a, &registry, &router.options()).unwrap();

        assert_eq!(
            kinds(&ops),
            vec![
                OperationKind::Approve,
                OperationKind::BridgeOut,
                OperationKind::BridgeIn,
                OperationKind::Deposit
            ]
        );
        assert_eq!(ops[0].operation.counterparty, "cctp");
        assert_eq!(ops[2].operation.chain, "base");
        assert_eq!(ops[1].fee_usd, Decimal::new(64, 2));
        assert_eq!(ops[2].fee_usd, Decimal::ZERO);
    }

    #[test]
    fn test_one_sided_actions() {
        let registry = ChainRegistry::mainnets();
        let entry = action(None, Some(asset("USDC", "base", Some("aave-v3"), 100)), 100);
        let exit = action(Some(asset("USDC", "base", Some("aave-v3"), 100)), None, 100);
        let idle_exit = action(Some(asset("USDC", "base", None, 100)), None, 100);

        assert_eq!(
            kinds(&decompose(&entry, &registry, &[]).unwrap()),
            vec![OperationKind::Approve, OperationKind::Deposit]
        );
        assert_eq!(kinds(&decompose(&exit, &registry, &[]).unwrap()), vec![OperationKind::Withdraw]);
        assert!(decompose(&idle_exit, &registry, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_estimate_reports_unroutable_actions() {
        let registry = ChainRegistry::mainnets();
        let router = StaticBridgeRouter::mainnet();
        let routable = action(
            Some(asset("USDC", "base", None, 100)),
            Some(asset("USDC", "base", Some("aave-v3"), 100)),
            100,
        );
        let unroutable = action(
            Some(asset("DAI", "bsc", None, 100)),
            Some(asset("DAI", "avalanche", Some("aave-v3"), 100)),
            100,
        );

        let estimate = estimate_cost(&[routable, unroutable], &registry, &router.options());

        assert_eq!(estimate.unroutable_actions, 1);
        assert!(estimate.actions[1].error.as_deref().unwrap().contains("no bridge route"));
        // base: 0.05 × (0.5 + 1.2)
        assert_eq!(estimate.total_usd, Decimal::new(85, 3));
    }
}
