use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::is_stable_symbol;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected price response: {0}")]
    Unexpected(String),
}

/// USD price lookups. Symbols without a known price are omitted from the result.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn prices_usd(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>, PriceError>;
}

/// CoinGecko-style `simple/price` client. Stablecoins are pinned to $1.
#[derive(Debug, Clone)]
pub struct HttpPriceFeed {
    http: Client,
    url: String,
}

impl HttpPriceFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

/// Price-API id for a symbol.
fn price_id(symbol: &str) -> Option<&'static str> {
    let id = match symbol.to_uppercase().as_str() {
        "ETH" | "WETH" => "ethereum",
        "STETH" | "WSTETH" => "staked-ether",
        "RETH" => "rocket-pool-eth",
        "BTC" | "WBTC" | "CBBTC" => "bitcoin",
        "POL" | "MATIC" => "polygon-ecosystem-token",
        "BNB" => "binancecoin",
        "AVAX" => "avalanche-2",
        "ARB" => "arbitrum",
        "OP" => "optimism",
        _ => return None,
    };
    Some(id)
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn prices_usd(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>, PriceError> {
        let mut prices = HashMap::new();
        let mut wanted: HashMap<&'static str, Vec<String>> = HashMap::new();

        for symbol in symbols {
            let upper = symbol.to_uppercase();
            if is_stable_symbol(&upper) {
                prices.insert(upper, Decimal::ONE);
            } else if let Some(id) = price_id(&upper) {
                wanted.entry(id).or_default().push(upper);
            } else {
                tracing::debug!(symbol = %upper, "No price source for symbol");
            }
        }

        if wanted.is_empty() {
            return Ok(prices);
        }

        let ids = wanted.keys().copied().collect::<Vec<_>>().join(",");
        let url = Url::parse_with_params(&self.url, &[("ids", ids.as_str()), ("vs_currencies", "usd")])
            .map_err(|e| PriceError::Unexpected(format!("bad price url: {e}")))?;
        let resp: HashMap<String, HashMap<String, f64>> = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        for (id, symbols) in wanted {
            let Some(usd) = resp.get(id).and_then(|quote| quote.get("usd")) else {
                tracing::warn!(price_id = id, "Price API omitted quote");
                continue;
            };
            let price = Decimal::try_from(*usd)
                .map_err(|e| PriceError::Unexpected(format!("{id}: {e}")))?;
            for symbol in symbols {
                prices.insert(symbol, price);
            }
        }

        Ok(prices)
    }
}

/// Fixed price table.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceFeed {
    prices: HashMap<String, Decimal>,
}

impl StaticPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: &str, usd: Decimal) -> Self {
        self.prices.insert(symbol.to_uppercase(), usd);
        self
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn prices_usd(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>, PriceError> {
        Ok(symbols
            .iter()
            .filter_map(|s| {
                let upper = s.to_uppercase();
                self.prices.get(&upper).map(|p| (upper, *p))
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
