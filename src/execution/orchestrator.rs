use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::chains::ChainRegistry;
use crate::models::{
    ActionStatus, ActionUpdate, ExecutionReceipt, FailedAction, OperationKind, RebalancingAction,
    RebalancingResult, ReceiptStatus, StrandedFunds,
};

use super::bridge::{BridgeOption, BridgeRouter};
use super::cost::{decompose, estimate_cost, CostEstimate, PlannedOperation};
use super::receipts::ReceiptLog;
use super::signer::TransactionSigner;

/// Receives every action state transition.
pub type ProgressCallback<'a> = &'a (dyn Fn(&ActionUpdate) + Send + Sync);

const CANCELLED: &str = "execution cancelled";

/// Outcome of one action.
struct ActionRun {
    receipts: Vec<ExecutionReceipt>,
    fees: Decimal,
    failure: Option<(String, Option<StrandedFunds>)>,
}

/// Executes rebalancing plans action by action.
///
/// Actions within a plan run sequentially. A failed action does not stop
/// the plan: later actions are still attempted unless they list the failed
/// action in `depends_on`. Confirmed operations are never rolled back; a
/// failed action reports where its funds were left instead.
pub struct ExecutionOrchestrator {
    registry: Arc<ChainRegistry>,
    bridges: Arc<dyn BridgeRouter>,
    receipts: Arc<ReceiptLog>,
    operation_timeout: Duration,
}

impl ExecutionOrchestrator {
    pub fn new(
        registry: Arc<ChainRegistry>,
        bridges: Arc<dyn BridgeRouter>,
        receipts: Arc<ReceiptLog>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            bridges,
            receipts,
            operation_timeout,
        }
    }

    pub fn receipts(&self) -> &Arc<ReceiptLog> {
        &self.receipts
    }

    pub fn bridge_options(&self) -> Vec<BridgeOption> {
        self.bridges.options()
    }

    /// Pre-flight fee estimate; submits nothing.
    pub fn estimate(&self, actions: &[RebalancingAction]) -> CostEstimate {
        estimate_cost(actions, &self.registry, &self.bridges.options())
    }

    pub async fn execute(
        &self,
        actions: &[RebalancingAction],
        signer: &dyn TransactionSigner,
        progress: Option<ProgressCallback<'_>>,
        cancel: &CancellationToken,
    ) -> RebalancingResult {
        let started = Instant::now();
        let emit = |index: usize, action: &RebalancingAction, status: ActionStatus, message: String| {
            if let Some(cb) = progress {
                cb(&ActionUpdate {
                    action_id: action.id,
                    index,
                    status,
                    message,
                });
            }
        };

        let mut transactions = Vec::new();
        let mut completed = Vec::new();
        let mut failed = Vec::new();
        let mut completed_ids: HashSet<Uuid> = HashSet::new();
        let mut failed_ids: HashSet<Uuid> = HashSet::new();
        let mut total_fees = Decimal::ZERO;

        tracing::info!(
            holder = %signer.address(),
            actions = actions.len(),
            "Executing rebalance plan"
        );

        for (index, action) in actions.iter().enumerate() {
            emit(index, action, ActionStatus::Pending, action.to_string());

            let blocked = if cancel.is_cancelled() {
                Some(CANCELLED.to_string())
            } else {
                action
                    .depends_on
                    .iter()
                    .find(|dep| !completed_ids.contains(*dep))
                    .map(|dep| {
                        if failed_ids.contains(dep) {
                            format!("dependency {dep} failed")
                        } else {
                            format!("dependency {dep} not completed")
                        }
                    })
            };

            let run = match blocked {
                Some(reason) => ActionRun {
                    receipts: Vec::new(),
                    fees: Decimal::ZERO,
                    failure: Some((reason, None)),
                },
                None => self.run_action(index, action, signer, &emit, cancel).await,
            };

            total_fees += run.fees;
            transactions.extend(run.receipts);

            match run.failure {
                None => {
                    metrics::counter!("actions_completed_total").increment(1);
                    tracing::info!(action_id = %action.id, index, "Action completed");
                    emit(index, action, ActionStatus::Completed, "all operations confirmed".into());
                    completed_ids.insert(action.id);
                    completed.push(action.clone());
                }
                Some((reason, stranded)) => {
                    metrics::counter!("actions_failed_total").increment(1);
                    tracing::error!(
                        action_id = %action.id,
                        index,
                        reason = %reason,
                        stranded = stranded.is_some(),
                        "Action failed"
                    );
                    emit(index, action, ActionStatus::Failed, reason.clone());
                    failed_ids.insert(action.id);
                    failed.push(FailedAction {
                        action: action.clone(),
                        reason,
                        stranded,
                    });
                }
            }
        }

        let elapsed = started.elapsed();
        metrics::histogram!("plan_execution_seconds").record(elapsed.as_secs_f64());
        tracing::info!(
            completed = completed.len(),
            failed = failed.len(),
            fees = %total_fees,
            elapsed_ms = elapsed.as_millis() as u64,
            "Rebalance plan finished"
        );

        RebalancingResult {
            success: failed.is_empty(),
            transactions,
            completed_actions: completed,
            failed_actions: failed,
            total_gas_fees: total_fees,
            time_elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    async fn run_action(
        &self,
        index: usize,
        action: &RebalancingAction,
        signer: &dyn TransactionSigner,
        emit: &(dyn Fn(usize, &RebalancingAction, ActionStatus, String) + Send + Sync),
        cancel: &CancellationToken,
    ) -> ActionRun {
        let mut run = ActionRun {
            receipts: Vec::new(),
            fees: Decimal::ZERO,
            failure: None,
        };

        let ops = match decompose(action, &self.registry, &self.bridges.options()) {
            Ok(ops) => ops,
            Err(e) => {
                run.failure = Some((e.to_string(), None));
                return run;
            }
        };

        let mut last_tx: Option<String> = None;
        let mut stranded: Option<StrandedFunds> = None;

        for planned in &ops {
            let op = &planned.operation;
            if cancel.is_cancelled() {
                run.failure = Some((CANCELLED.to_string(), stranded));
                return run;
            }

            let submitted = match (op.kind, &planned.bridge, &last_tx) {
                (OperationKind::BridgeIn, Some(quote), Some(source_tx)) => {
                    self.bounded(cancel, self.bridges.await_arrival(quote, op, source_tx)).await
                }
                (OperationKind::BridgeIn, _, _) => Err("bridge-in without a bridge-out".to_string()),
                _ => self.bounded(cancel, signer.submit(op)).await,
            };
            let tx_hash = match submitted {
                Ok(hash) => hash,
                Err(e) => {
                    run.failure = Some((format!("{} on {} failed: {}", op.kind, op.chain, e), stranded));
                    return run;
                }
            };

            if op.sequence == 0 {
                emit(index, action, ActionStatus::Confirming, format!("{} submitted", op.kind));
            }

            let receipt = self.receipt(signer, planned, &tx_hash);
            let slot = self.receipts.append(receipt.clone()).await;
            run.fees += planned.fee_usd;

            // Arrival on the destination chain is its own confirmation.
            let confirmed = if op.kind == OperationKind::BridgeIn {
                Ok(1)
            } else {
                self.bounded(cancel, signer.confirm(&op.chain, &tx_hash)).await
            };

            match confirmed {
                Ok(confirmations) => {
                    let done = self
                        .receipts
                        .update_status(slot, ReceiptStatus::Completed, confirmations)
                        .await
                        .unwrap_or(receipt);
                    run.receipts.push(done);
                    if op.kind != OperationKind::Approve {
                        stranded = Some(StrandedFunds {
                            chain: op.chain.clone(),
                            asset: op.asset.clone(),
                            amount: op.amount,
                            last_confirmed_tx: tx_hash.clone(),
                        });
                    }
                    last_tx = Some(tx_hash);
                }
                Err(e) => {
                    let failed = self
                        .receipts
                        .update_status(slot, ReceiptStatus::Failed, 0)
                        .await
                        .unwrap_or(receipt);
                    run.receipts.push(failed);
                    run.failure = Some((
                        format!("{} on {} not confirmed: {}", op.kind, op.chain, e),
                        stranded,
                    ));
                    return run;
                }
            }
        }

        run
    }

    fn receipt(
        &self,
        signer: &dyn TransactionSigner,
        planned: &PlannedOperation,
        tx_hash: &str,
    ) -> ExecutionReceipt {
        let op = &planned.operation;
        ExecutionReceipt {
            tx_hash: tx_hash.to_string(),
            action_id: op.action_id,
            from: signer.address(),
            to: op.counterparty.clone(),
            status: ReceiptStatus::Pending,
            confirmations: 0,
            chain: op.chain.clone(),
            asset: op.asset.clone(),
            amount: op.amount,
            kind: op.kind,
            fee_usd: planned.fee_usd,
            explorer_url: self.registry.explorer_tx_url(&op.chain, tx_hash),
        }
    }

    /// Await `fut` bounded by the per-operation timeout and cancellation.
    async fn bounded<T, E, F>(&self, cancel: &CancellationToken, fut: F) -> Result<T, String>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CANCELLED.to_string()),
            result = tokio::time::timeout(self.operation_timeout, fut) => match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("timed out after {}s", self.operation_timeout.as_secs())),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::bridge::StaticBridgeRouter;
    use crate::execution::signer::DryRunSigner;
    use crate::models::{Asset, RiskChange};
    use std::sync::Mutex;

    fn asset(symbol: &str, chain: &str, protocol: Option<&str>) -> Asset {
        Asset {
            symbol: symbol.into(),
            chain: chain.into(),
            protocol: protocol.map(String::from),
            token_address: None,
            quantity: Decimal::from(100),
            value_usd: Decimal::from(100),
            apy: None,
            risk_score: None,
        }
    }

    fn action(from: Asset, to: Asset) -> RebalancingAction {
        RebalancingAction {
            id: Uuid::new_v4(),
            from: Some(from),
            to: Some(to),
            amount: Decimal::from(100),
            value_usd: Decimal::from(100),
            reason: "test".into(),
            expected_apy_delta: Decimal::ONE,
            risk_change: RiskChange::Unchanged,
            new_position: false,
            depends_on: vec![],
        }
    }

    fn orchestrator(router: StaticBridgeRouter) -> ExecutionOrchestrator {
        ExecutionOrchestrator::new(
            Arc::new(ChainRegistry::mainnets()),
            Arc::new(router),
            Arc::new(ReceiptLog::new()),
            Duration::from_secs(5),
        )
    }

    fn deposit_action() -> RebalancingAction {
        action(asset("USDC", "base", None), asset("USDC", "base", Some("aave-v3")))
    }

    #[tokio::test]
    async fn test_state_transitions_are_reported_in_order() {
        let orch = orchestrator(StaticBridgeRouter::mainnet());
        let signer = DryRunSigner::new("0xholder");
        let updates = Mutex::new(Vec::new());
        let record: ProgressCallback<'_> = &|u: &ActionUpdate| updates.lock().unwrap().push(u.status);

        let result = orch
            .execute(&[deposit_action()], &signer, Some(record), &CancellationToken::new())
            .await;

        assert!(result.success);
        assert_eq!(result.transactions.len(), 2);
        assert!(result.transactions.iter().all(|r| r.status == ReceiptStatus::Completed));
        assert_eq!(
            *updates.lock().unwrap(),
            vec![ActionStatus::Pending, ActionStatus::Confirming, ActionStatus::Completed]
        );
        assert_eq!(orch.receipts().len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_bridge_arrival_reports_stranded_funds() {
        let router = StaticBridgeRouter::mainnet();
        router.fail_arrivals_on("base");
        let orch = orchestrator(router);
        let signer = DryRunSigner::new("0xholder");
        let a = action(asset("USDC", "arbitrum", Some("aave-v3")), asset("USDC", "base", Some("aave-v3")));

        let result = orch.execute(&[a], &signer, None, &CancellationToken::new()).await;

        assert!(!result.success);
        let failure = &result.failed_actions[0];
        assert!(failure.reason.contains("bridge_in on base failed"));
        let stranded = failure.stranded.as_ref().unwrap();
        // withdraw, approve and bridge-out confirmed on arbitrum
        assert_eq!(stranded.chain, "arbitrum");
        assert_eq!(result.transactions.len(), 3);
        assert_eq!(stranded.last_confirmed_tx, result.transactions[2].tx_hash);
        assert!(result.total_gas_fees > Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_revert_marks_receipt_failed() {
        let orch = orchestrator(StaticBridgeRouter::mainnet());
        let signer = DryRunSigner::new("0xholder");
        let a = deposit_action();
        signer.revert_on_confirm(a.id, 1);

        let result = orch.execute(&[a], &signer, None, &CancellationToken::new()).await;

        assert_eq!(result.failed_actions.len(), 1);
        assert_eq!(result.transactions[1].status, ReceiptStatus::Failed);
        // approve confirmed but approvals do not strand funds
        assert!(result.failed_actions[0].stranded.is_none());
    }

    #[tokio::test]
    async fn test_no_route_fails_without_submitting() {
        let orch = orchestrator(StaticBridgeRouter::mainnet());
        let signer = DryRunSigner::new("0xholder");
        let a = action(asset("DAI", "bsc", None), asset("DAI", "avalanche", Some("aave-v3")));

        let result = orch.execute(&[a], &signer, None, &CancellationToken::new()).await;

        assert!(result.failed_actions[0].reason.contains("no bridge route"));
        assert_eq!(signer.submitted_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_plan_attempts_nothing() {
        let orch = orchestrator(StaticBridgeRouter::mainnet());
        let signer = DryRunSigner::new("0xholder");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orch
            .execute(&[deposit_action(), deposit_action()], &signer, None, &cancel)
            .await;

        assert_eq!(result.failed_actions.len(), 2);
        assert!(result.failed_actions.iter().all(|f| f.reason == CANCELLED));
        assert_eq!(signer.submitted_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_plan_succeeds() {
        let orch = orchestrator(StaticBridgeRouter::mainnet());
        let signer = DryRunSigner::new("0xholder");
        let result = orch.execute(&[], &signer, None, &CancellationToken::new()).await;
        assert!(result.success);
        assert!(result.transactions.is_empty());
        assert_eq!(result.total_gas_fees, Decimal::ZERO);
    }
}
