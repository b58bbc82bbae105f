use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use alloy::primitives::{keccak256, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Operation;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignerError {
    #[error("signing rejected: {0}")]
    Rejected(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

/// The holder's signing authority.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Account the signer acts for.
    fn address(&self) -> String;

    /// Sign and submit `operation`; returns the transaction hash.
    async fn submit(&self, operation: &Operation) -> Result<String, SignerError>;

    /// Wait for `tx_hash` to be mined; returns the confirmation count.
    async fn confirm(&self, chain: &str, tx_hash: &str) -> Result<u32, SignerError>;
}

/// Signs nothing on-chain. Each operation gets a deterministic hash derived
/// from its content, signed by a local key when one is configured.
///
/// A submitted hash is tracked only until `confirm` resolves it.
pub struct DryRunSigner {
    address: String,
    key: Option<PrivateKeySigner>,
    failing: Mutex<HashSet<(Uuid, usize)>>,
    reverting: Mutex<HashSet<(Uuid, usize)>>,
    pending: Mutex<HashMap<String, (Uuid, usize)>>,
    submitted: AtomicUsize,
}

impl DryRunSigner {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            key: None,
            failing: Mutex::new(HashSet::new()),
            reverting: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashMap::new()),
            submitted: AtomicUsize::new(0),
        }
    }

    /// Build from a hex private key (with or without `0x`); the address is
    /// derived from the key.
    pub fn from_private_key(private_key: &str) -> anyhow::Result<Self> {
        let key = PrivateKeySigner::from_str(private_key.trim())?;
        let mut signer = Self::new(key.address().to_string().to_lowercase());
        signer.key = Some(key);
        Ok(signer)
    }

    /// Submission of operation `sequence` of `action_id` is rejected.
    pub fn fail_submission(&self, action_id: Uuid, sequence: usize) {
        lock(&self.failing).insert((action_id, sequence));
    }

    /// Operation `sequence` of `action_id` submits but reverts on confirmation.
    pub fn revert_on_confirm(&self, action_id: Uuid, sequence: usize) {
        lock(&self.reverting).insert((action_id, sequence));
    }

    /// Number of operations submitted so far.
    pub fn submitted_count(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Submitted operations not yet resolved by `confirm`.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    fn digest(&self, operation: &Operation) -> B256 {
        keccak256(format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.address.to_lowercase(),
            operation.action_id,
            operation.sequence,
            operation.kind,
            operation.chain,
            operation.asset,
            operation.amount.normalize()
        ))
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl TransactionSigner for DryRunSigner {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn submit(&self, operation: &Operation) -> Result<String, SignerError> {
        let id = (operation.action_id, operation.sequence);
        if lock(&self.failing).contains(&id) {
            return Err(SignerError::Rejected(format!(
                "{} of {} on {} rejected",
                operation.kind, operation.asset, operation.chain
            )));
        }

        let digest = self.digest(operation);
        let tx_hash = match &self.key {
            Some(key) => {
                let signature = key
                    .sign_hash_sync(&digest)
                    .map_err(|e| SignerError::Rejected(e.to_string()))?;
                keccak256(signature.as_bytes()).to_string()
            }
            None => digest.to_string(),
        };

        tracing::info!(
            kind = %operation.kind,
            chain = %operation.chain,
            asset = %operation.asset,
            amount = %operation.amount,
            counterparty = %operation.counterparty,
            tx_hash = %tx_hash,
            "[DRY-RUN] Would submit operation"
        );

        lock(&self.pending).insert(tx_hash.clone(), id);
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(tx_hash)
    }

    async fn confirm(&self, chain: &str, tx_hash: &str) -> Result<u32, SignerError> {
        let origin = lock(&self.pending).remove(tx_hash);

        let Some(origin) = origin else {
            return Err(SignerError::Unavailable(format!("unknown transaction {tx_hash} on {chain}")));
        };
        if lock(&self.reverting).contains(&origin) {
            return Err(SignerError::Reverted(format!("{tx_hash} reverted on {chain}")));
        }
        Ok(1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OperationKind;
    use rust_decimal::Decimal;

    fn operation(action_id: Uuid, sequence: usize) -> Operation {
        Operation {
            action_id,
            sequence,
            kind: OperationKind::Deposit,
            chain: "base".into(),
            asset: "USDC".into(),
            amount: Decimal::from(100),
            counterparty: "aave-v3".into(),
        }
    }

    #[tokio::test]
    async fn test_hashes_are_deterministic() {
        let id = Uuid::new_v4();
        let a = DryRunSigner::new("0xholder");
        let b = DryRunSigner::new("0xHOLDER");

        let ha = a.submit(&operation(id, 0)).await.unwrap();
        let hb = b.submit(&operation(id, 0)).await.unwrap();
        let other = a.submit(&operation(id, 1)).await.unwrap();

        assert_eq!(ha, hb);
        assert_ne!(ha, other);
        assert!(ha.starts_with("0x"));
        assert_eq!(ha.len(), 66);
        assert_eq!(a.confirm("base", &ha).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failure_hooks() {
        let id = Uuid::new_v4();
        let signer = DryRunSigner::new("0xholder");
        signer.fail_submission(id, 0);
        signer.revert_on_confirm(id, 1);

        assert!(matches!(
            signer.submit(&operation(id, 0)).await,
            Err(SignerError::Rejected(_))
        ));
        let hash = signer.submit(&operation(id, 1)).await.unwrap();
        assert!(matches!(
            signer.confirm("base", &hash).await,
            Err(SignerError::Reverted(_))
        ));
        assert!(signer.confirm("base", "0xunknown").await.is_err());
    }

    #[tokio::test]
    async fn test_confirm_releases_submitted_hash() {
        let id = Uuid::new_v4();
        let signer = DryRunSigner::new("0xholder");
        signer.revert_on_confirm(id, 1);

        let ok = signer.submit(&operation(id, 0)).await.unwrap();
        let reverted = signer.submit(&operation(id, 1)).await.unwrap();
        assert_eq!(signer.pending_count(), 2);

        assert_eq!(signer.confirm("base", &ok).await.unwrap(), 1);
        assert!(signer.confirm("base", &reverted).await.is_err());

        assert_eq!(signer.pending_count(), 0);
        assert_eq!(signer.submitted_count(), 2);
        // A resolved hash is no longer known.
        assert!(matches!(
            signer.confirm("base", &ok).await,
            Err(SignerError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_private_key_derives_address_and_signs() {
        // Well-known development key (anvil account 0).
        let signer = DryRunSigner::from_private_key(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        assert_eq!(signer.address(), "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");

        let id = Uuid::new_v4();
        let first = signer.submit(&operation(id, 0)).await.unwrap();
        let second = signer.submit(&operation(id, 0)).await.unwrap();
        assert_eq!(first, second);
    }
}
