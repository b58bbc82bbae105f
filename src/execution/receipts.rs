use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{ExecutionReceipt, ReceiptStatus};

/// Append-only log of every submitted operation, shared by all plans.
///
/// Entries are never removed; only their status may move forward.
#[derive(Default)]
pub struct ReceiptLog {
    entries: Mutex<Vec<ExecutionReceipt>>,
}

impl ReceiptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append and return the entry's index.
    pub async fn append(&self, receipt: ExecutionReceipt) -> usize {
        let mut entries = self.entries.lock().await;
        entries.push(receipt);
        entries.len() - 1
    }

    /// Move entry `index` to `status`. Backward or repeated transitions are
    /// refused and leave the entry untouched.
    pub async fn update_status(
        &self,
        index: usize,
        status: ReceiptStatus,
        confirmations: u32,
    ) -> Option<ExecutionReceipt> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(index)?;
        if !entry.status.can_transition_to(status) {
            tracing::warn!(
                tx_hash = %entry.tx_hash,
                from = ?entry.status,
                to = ?status,
                "Refusing receipt status regression"
            );
            return None;
        }
        entry.status = status;
        entry.confirmations = confirmations;
        Some(entry.clone())
    }

    pub async fn get(&self, index: usize) -> Option<ExecutionReceipt> {
        self.entries.lock().await.get(index).cloned()
    }

    pub async fn for_action(&self, action_id: Uuid) -> Vec<ExecutionReceipt> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|r| r.action_id == action_id)
            .cloned()
            .collect()
    }

    /// Transfer history of one holder, oldest first.
    pub async fn for_holder(&self, address: &str) -> Vec<ExecutionReceipt> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|r| r.from.eq_ignore_ascii_case(address))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
