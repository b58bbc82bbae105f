use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::RebalancingAction;

/// Kind of on-chain operation an action decomposes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Approve,
    Withdraw,
    Swap,
    BridgeOut,
    BridgeIn,
    Deposit,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Approve => "approve",
            OperationKind::Withdraw => "withdraw",
            OperationKind::Swap => "swap",
            OperationKind::BridgeOut => "bridge_out",
            OperationKind::BridgeIn => "bridge_in",
            OperationKind::Deposit => "deposit",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation ready to be signed and submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub action_id: Uuid,
    /// Position of the operation within its action, from 0.
    pub sequence: usize,
    pub kind: OperationKind,
    pub chain: String,
    pub asset: String,
    pub amount: Decimal,
    /// Protocol, router or bridge contract the operation interacts with.
    pub counterparty: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Pending,
    Completed,
    Failed,
}

impl ReceiptStatus {
    /// Status only moves forward: Pending -> Completed | Failed.
    pub fn can_transition_to(&self, next: ReceiptStatus) -> bool {
        matches!(
            (self, next),
            (ReceiptStatus::Pending, ReceiptStatus::Completed)
                | (ReceiptStatus::Pending, ReceiptStatus::Failed)
        )
    }
}

/// Record of one submitted operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub tx_hash: String,
    pub action_id: Uuid,
    pub from: String,
    pub to: String,
    pub status: ReceiptStatus,
    pub confirmations: u32,
    pub chain: String,
    pub asset: String,
    pub amount: Decimal,
    pub kind: OperationKind,
    pub fee_usd: Decimal,
    pub explorer_url: Option<String>,
}

/// Per-action state machine: Pending -> Confirming -> Completed | Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Confirming,
    Completed,
    Failed,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::Failed)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStatus::Pending => write!(f, "pending"),
            ActionStatus::Confirming => write!(f, "confirming"),
            ActionStatus::Completed => write!(f, "completed"),
            ActionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Progress event emitted on every action state transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionUpdate {
    pub action_id: Uuid,
    pub index: usize,
    pub status: ActionStatus,
    pub message: String,
}

/// Funds left mid-route when an action failed after some legs confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrandedFunds {
    pub chain: String,
    pub asset: String,
    pub amount: Decimal,
    pub last_confirmed_tx: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAction {
    pub action: RebalancingAction,
    pub reason: String,
    pub stranded: Option<StrandedFunds>,
}

/// Outcome of executing one plan. Partial success is representable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancingResult {
    /// True only when no action failed.
    pub success: bool,
    pub transactions: Vec<ExecutionReceipt>,
    pub completed_actions: Vec<RebalancingAction>,
    pub failed_actions: Vec<FailedAction>,
    pub total_gas_fees: Decimal,
    pub time_elapsed_ms: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
