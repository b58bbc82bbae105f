pub mod reader;

pub use reader::{ChainError, ChainReader, InMemoryChainReader, ProtocolPosition, RpcChainReader};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A supported network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Registry identifier, lowercase (`ethereum`, `arbitrum`, ...).
    pub id: String,
    pub name: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_url: String,
    pub native_symbol: String,
    pub native_decimals: u32,
}

/// An ERC-20 contract whose balance the scanner reads on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedToken {
    pub chain: String,
    pub symbol: String,
    pub address: String,
    pub decimals: u32,
}

/// Static table of supported networks and tracked tokens.
///
/// Built once at start-up and shared read-only; there is no global instance.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainInfo>,
    tokens: Vec<TrackedToken>,
}

impl ChainRegistry {
    pub fn new(chains: Vec<ChainInfo>, tokens: Vec<TrackedToken>) -> Self {
        Self { chains, tokens }
    }

    /// The production network table.
    pub fn mainnets() -> Self {
        Self::new(default_chains(), default_tokens())
    }

    /// Replace RPC endpoints for the chains named in `overrides`.
    pub fn with_rpc_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for chain in &mut self.chains {
            if let Some(url) = overrides.get(&chain.id) {
                tracing::info!(chain = %chain.id, url = %url, "Using RPC override");
                chain.rpc_url = url.clone();
            }
        }
        self
    }

    pub fn chains(&self) -> &[ChainInfo] {
        &self.chains
    }

    pub fn get(&self, id: &str) -> Option<&ChainInfo> {
        self.chains.iter().find(|c| c.id.eq_ignore_ascii_case(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn tracked_tokens<'a>(&'a self, chain: &str) -> impl Iterator<Item = &'a TrackedToken> + 'a {
        let chain = chain.to_lowercase();
        self.tokens
            .iter()
            .filter(move |t| t.chain.eq_ignore_ascii_case(&chain))
    }

    pub fn token(&self, chain: &str, symbol: &str) -> Option<&TrackedToken> {
        self.tracked_tokens(chain)
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn explorer_tx_url(&self, chain: &str, tx_hash: &str) -> Option<String> {
        self.get(chain)
            .map(|c| format!("{}/tx/{}", c.explorer_url.trim_end_matches('/'), tx_hash))
    }
}

fn chain(
    id: &str,
    name: &str,
    chain_id: u64,
    rpc_url: &str,
    explorer_url: &str,
    native_symbol: &str,
) -> ChainInfo {
    ChainInfo {
        id: id.into(),
        name: name.into(),
        chain_id,
        rpc_url: rpc_url.into(),
        explorer_url: explorer_url.into(),
        native_symbol: native_symbol.into(),
        native_decimals: 18,
    }
}

fn default_chains() -> Vec<ChainInfo> {
    vec![
        chain("ethereum", "Ethereum", 1, "https://eth.llamarpc.com", "https://etherscan.io", "ETH"),
        chain("polygon", "Polygon", 137, "https://polygon-rpc.com", "https://polygonscan.com", "POL"),
        chain("arbitrum", "Arbitrum One", 42161, "https://arb1.arbitrum.io/rpc", "https://arbiscan.io", "ETH"),
        chain("optimism", "OP Mainnet", 10, "https://mainnet.optimism.io", "https://optimistic.etherscan.io", "ETH"),
        chain("base", "Base", 8453, "https://mainnet.base.org", "https://basescan.org", "ETH"),
        chain("bsc", "BNB Smart Chain", 56, "https://bsc-dataseed.binance.org", "https://bscscan.com", "BNB"),
        chain("avalanche", "Avalanche C-Chain", 43114, "https://api.avax.network/ext/bc/C/rpc", "https://snowtrace.io", "AVAX"),
    ]
}

fn token(chain: &str, symbol: &str, address: &str, decimals: u32) -> TrackedToken {
    TrackedToken {
        chain: chain.into(),
        symbol: symbol.into(),
        address: address.into(),
        decimals,
    }
}

fn default_tokens() -> Vec<TrackedToken> {
    vec![
        token("ethereum", "USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6),
        token("ethereum", "USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6),
        token("ethereum", "DAI", "0x6B175474E89094C44Da98b954EedeAC495271d0F", 18),
        token("ethereum", "WETH", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18),
        token("polygon", "USDC", "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", 6),
        token("polygon", "USDT", "0xc2132D05D31c914a87C6611C10748AEb04B58e8F", 6),
        token("polygon", "WETH", "0x7ceB23fD6bC0adD59E62ac25578270cFf1b9f619", 18),
        token("arbitrum", "USDC", "0xaf88d065e77c8cC2239327C5EDb3A432268e5831", 6),
        token("arbitrum", "USDT", "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9", 6),
        token("arbitrum", "WETH", "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1", 18),
        token("optimism", "USDC", "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85", 6),
        token("optimism", "WETH", "0x4200000000000000000000000000000000000006", 18),
        token("base", "USDC", "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", 6),
        token("base", "WETH", "0x4200000000000000000000000000000000000006", 18),
        token("bsc", "USDT", "0x55d398326f99059fF775485246999027B3197955", 18),
        token("bsc", "USDC", "0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d", 18),
        token("avalanche", "USDC", "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E", 6),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
