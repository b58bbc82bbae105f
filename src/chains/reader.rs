use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use super::{ChainInfo, TrackedToken};

/// `balanceOf(address)` selector.
const BALANCE_OF_SELECTOR: &str = "70a08231";

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        ChainError::Unreachable(e.to_string())
    }
}

/// A balance already deployed into a protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolPosition {
    pub protocol: String,
    pub symbol: String,
    pub quantity: Decimal,
    pub apy: Option<Decimal>,
}

/// Read-only access to on-chain balances. Quantities are in whole units.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn native_balance(&self, chain: &ChainInfo, address: &str) -> Result<Decimal, ChainError>;

    async fn token_balance(
        &self,
        chain: &ChainInfo,
        token: &TrackedToken,
        address: &str,
    ) -> Result<Decimal, ChainError>;

    /// Positions held inside protocols. Readers without protocol indexing report none.
    async fn protocol_positions(
        &self,
        _chain: &ChainInfo,
        _address: &str,
    ) -> Result<Vec<ProtocolPosition>, ChainError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC reader
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    message: String,
}

/// Reads balances from EVM nodes over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcChainReader {
    http: Client,
}

impl RpcChainReader {
    pub fn new(call_timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(call_timeout).build()?;
        Ok(Self { http })
    }

    async fn call(&self, chain: &ChainInfo, method: &str, params: serde_json::Value) -> Result<String, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp: RpcResponse = self
            .http
            .post(&chain.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| ChainError::Decode(e.to_string()))?;

        if let Some(err) = resp.error {
            return Err(ChainError::Reverted(err.message));
        }

        resp.result
            .ok_or_else(|| ChainError::Decode(format!("{method} returned no result")))
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn native_balance(&self, chain: &ChainInfo, address: &str) -> Result<Decimal, ChainError> {
        let address = parse_evm_address(address)?;
        let raw = self
            .call(chain, "eth_getBalance", json!([address, "latest"]))
            .await?;
        scale_hex_amount(&raw, chain.native_decimals)
    }

    async fn token_balance(
        &self,
        chain: &ChainInfo,
        token: &TrackedToken,
        address: &str,
    ) -> Result<Decimal, ChainError> {
        let holder = parse_evm_address(address)?;
        let data = balance_of_calldata(&holder);
        let raw = self
            .call(
                chain,
                "eth_call",
                json!([{ "to": token.address, "data": data }, "latest"]),
            )
            .await?;
        scale_hex_amount(&raw, token.decimals)
    }
}

/// Validate an EVM address and return it lowercase with `0x`.
fn parse_evm_address(address: &str) -> Result<String, ChainError> {
    Address::from_str(address.trim())
        .map(|a| format!("{a:#x}"))
        .map_err(|_| ChainError::InvalidAddress(address.to_string()))
}

fn balance_of_calldata(holder: &str) -> String {
    format!(
        "0x{}{:0>64}",
        BALANCE_OF_SELECTOR,
        holder.trim_start_matches("0x")
    )
}

/// Convert a hex-encoded integer amount into whole units.
pub(crate) fn scale_hex_amount(raw: &str, decimals: u32) -> Result<Decimal, ChainError> {
    let digits = raw.trim().trim_start_matches("0x").trim_start_matches('0');
    if digits.is_empty() {
        return Ok(Decimal::ZERO);
    }
    if digits.len() > 32 {
        return Err(ChainError::Decode(format!("amount {raw} exceeds 128 bits")));
    }

    let value = u128::from_str_radix(digits, 16)
        .map_err(|e| ChainError::Decode(format!("{raw}: {e}")))?;
    let value = i128::try_from(value)
        .map_err(|_| ChainError::Decode(format!("amount {raw} out of range")))?;

    Decimal::try_from_i128_with_scale(value, decimals)
        .map(|d| d.normalize())
        .map_err(|e| ChainError::Decode(format!("{raw}: {e}")))
}

// ---------------------------------------------------------------------------
// In-memory reader
// ---------------------------------------------------------------------------

/// Deterministic reader backed by fixed balances. Chains can be marked as
/// failing or slow to exercise degraded scans. Clones share the read
/// counter.
#[derive(Debug, Default, Clone)]
pub struct InMemoryChainReader {
    native: HashMap<(String, String), Decimal>,
    tokens: HashMap<(String, String, String), Decimal>,
    positions: HashMap<(String, String), Vec<ProtocolPosition>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    native_reads: Arc<AtomicUsize>,
}

impl InMemoryChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native(mut self, chain: &str, address: &str, amount: Decimal) -> Self {
        self.native.insert(key(chain, address), amount);
        self
    }

    pub fn with_token(mut self, chain: &str, address: &str, symbol: &str, amount: Decimal) -> Self {
        self.tokens.insert(
            (chain.to_lowercase(), address.to_lowercase(), symbol.to_uppercase()),
            amount,
        );
        self
    }

    pub fn with_position(mut self, chain: &str, address: &str, position: ProtocolPosition) -> Self {
        self.positions
            .entry(key(chain, address))
            .or_default()
            .push(position);
        self
    }

    /// Every call against `chain` fails as unreachable.
    pub fn failing_chain(mut self, chain: &str) -> Self {
        self.failing.insert(chain.to_lowercase());
        self
    }

    /// Every call against `chain` waits `delay` before answering.
    pub fn slow_chain(mut self, chain: &str, delay: Duration) -> Self {
        self.delays.insert(chain.to_lowercase(), delay);
        self
    }

    /// Native balance reads attempted so far, failed ones included.
    pub fn native_reads(&self) -> usize {
        self.native_reads.load(Ordering::Relaxed)
    }

    async fn enter(&self, chain: &ChainInfo) -> Result<(), ChainError> {
        let id = chain.id.to_lowercase();
        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&id) {
            return Err(ChainError::Unreachable(format!("{} endpoint down", chain.id)));
        }
        Ok(())
    }
}

fn key(chain: &str, address: &str) -> (String, String) {
    (chain.to_lowercase(), address.to_lowercase())
}

#[async_trait]
impl ChainReader for InMemoryChainReader {
    async fn native_balance(&self, chain: &ChainInfo, address: &str) -> Result<Decimal, ChainError> {
        self.native_reads.fetch_add(1, Ordering::Relaxed);
        self.enter(chain).await?;
        Ok(self
            .native
            .get(&key(&chain.id, address))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn token_balance(
        &self,
        chain: &ChainInfo,
        token: &TrackedToken,
        address: &str,
    ) -> Result<Decimal, ChainError> {
        self.enter(chain).await?;
        let (chain_id, holder) = key(&chain.id, address);
        Ok(self
            .tokens
            .get(&(chain_id, holder, token.symbol.to_uppercase()))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn protocol_positions(
        &self,
        chain: &ChainInfo,
        address: &str,
    ) -> Result<Vec<ProtocolPosition>, ChainError> {
        self.enter(chain).await?;
        Ok(self
            .positions
            .get(&key(&chain.id, address))
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
