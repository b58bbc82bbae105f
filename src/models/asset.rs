use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single holding: native balance, wallet token, or a protocol deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub chain: String,
    /// `None` for assets sitting in the wallet (native coin or plain token).
    pub protocol: Option<String>,
    /// Token contract; `None` for the chain's native coin.
    #[serde(default)]
    pub token_address: Option<String>,
    pub quantity: Decimal,
    pub value_usd: Decimal,
    #[serde(default)]
    pub apy: Option<Decimal>,
    #[serde(default)]
    pub risk_score: Option<f64>,
}

impl Asset {
    pub fn key(&self) -> AssetKey {
        AssetKey::new(&self.chain, self.protocol.as_deref(), &self.symbol)
    }

    pub fn is_native(&self) -> bool {
        self.protocol.is_none() && self.token_address.is_none()
    }

    /// USD value of one unit, if the holding has a non-zero quantity.
    pub fn unit_price(&self) -> Option<Decimal> {
        if self.quantity.is_zero() {
            None
        } else {
            Some(self.value_usd / self.quantity)
        }
    }

    pub fn apy_or_zero(&self) -> Decimal {
        self.apy.unwrap_or(Decimal::ZERO)
    }

    pub fn protocol_label(&self) -> &str {
        self.protocol.as_deref().unwrap_or("wallet")
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} ({})", self.symbol, self.chain, self.protocol_label())
    }
}

/// Identity of a holding within one portfolio snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetKey {
    pub chain: String,
    pub protocol: Option<String>,
    pub symbol: String,
}

impl AssetKey {
    pub fn new(chain: &str, protocol: Option<&str>, symbol: &str) -> Self {
        Self {
            chain: chain.to_lowercase(),
            protocol: protocol.map(|p| p.to_lowercase()),
            symbol: symbol.to_uppercase(),
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.chain,
            self.protocol.as_deref().unwrap_or("wallet"),
            self.symbol
        )
    }
}

// ---------------------------------------------------------------------------
// Volatility classes
// ---------------------------------------------------------------------------

const STABLE_SYMBOLS: &[&str] = &[
    "USDC", "USDT", "DAI", "FRAX", "LUSD", "USDC.E", "USDBC", "BUSD", "TUSD", "USDE", "GHO",
    "PYUSD", "CRVUSD",
];

const MAJOR_SYMBOLS: &[&str] = &[
    "ETH", "WETH", "STETH", "WSTETH", "RETH", "CBETH", "BTC", "WBTC", "CBBTC", "TBTC",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityClass {
    Stable,
    Major,
    Other,
}

/// Classify a symbol; pool symbols such as `USDC-WETH` take their most
/// volatile component.
pub fn volatility_class(symbol: &str) -> VolatilityClass {
    symbol_components(symbol)
        .map(single_volatility_class)
        .max_by_key(|c| match c {
            VolatilityClass::Stable => 0,
            VolatilityClass::Major => 1,
            VolatilityClass::Other => 2,
        })
        .unwrap_or(VolatilityClass::Other)
}

pub fn is_stable_symbol(symbol: &str) -> bool {
    volatility_class(symbol) == VolatilityClass::Stable
}

fn single_volatility_class(symbol: &str) -> VolatilityClass {
    let upper = symbol.trim().to_uppercase();
    if STABLE_SYMBOLS.contains(&upper.as_str()) {
        VolatilityClass::Stable
    } else if MAJOR_SYMBOLS.contains(&upper.as_str()) {
        VolatilityClass::Major
    } else {
        VolatilityClass::Other
    }
}

fn symbol_components(symbol: &str) -> impl Iterator<Item = &str> {
    symbol
        .split(['-', '/', '+'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
