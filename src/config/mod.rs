use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
const DEFAULT_YIELD_INDEXER_URL: &str = "https://yields.llama.fi/pools";
const RPC_OVERRIDE_PREFIX: &str = "RPC_URL_";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,

    // Discovery
    pub cache_ttl_secs: u64,
    pub chain_call_timeout_ms: u64,
    pub indexer_timeout_ms: u64,
    pub opportunity_stale_after_secs: i64,
    /// APY samples kept per catalog record; oldest are dropped first.
    pub apy_history_limit: usize,
    pub price_api_url: String,
    pub yield_indexer_url: String,
    pub indexer_min_tvl: Decimal,
    /// Chain id (lowercase) → RPC endpoint, from `RPC_URL_<CHAIN>`.
    pub rpc_overrides: HashMap<String, String>,

    // Execution
    pub operation_timeout_secs: u64,
    pub dry_run: bool,
    /// Hex key the dry-run signer signs operation digests with.
    pub signer_private_key: Option<String>,

    // API
    /// Bearer token for protected routes; `None` disables auth.
    pub api_token: Option<String>,

    // Logging
    pub log_json: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let rpc_overrides = env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(RPC_OVERRIDE_PREFIX)
                    .filter(|_| !value.trim().is_empty())
                    .map(|chain| (chain.to_lowercase(), value.trim().to_string()))
            })
            .collect();

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            cache_ttl_secs: parse_or("CACHE_TTL_SECS", 300),
            chain_call_timeout_ms: parse_or("CHAIN_CALL_TIMEOUT_MS", 8_000),
            indexer_timeout_ms: parse_or("INDEXER_TIMEOUT_MS", 15_000),
            opportunity_stale_after_secs: parse_or("OPPORTUNITY_STALE_AFTER_SECS", 86_400),
            apy_history_limit: parse_or("APY_HISTORY_LIMIT", 500),
            price_api_url: env::var("PRICE_API_URL")
                .unwrap_or_else(|_| DEFAULT_PRICE_API_URL.into()),
            yield_indexer_url: env::var("YIELD_INDEXER_URL")
                .unwrap_or_else(|_| DEFAULT_YIELD_INDEXER_URL.into()),
            indexer_min_tvl: env::var("INDEXER_MIN_TVL")
                .unwrap_or_else(|_| "1000000".into())
                .parse()
                .unwrap_or(Decimal::from(1_000_000)),
            rpc_overrides,

            operation_timeout_secs: parse_or("OPERATION_TIMEOUT_SECS", 600),
            dry_run: env::var("DRY_RUN")
                .unwrap_or_else(|_| "true".into())
                .parse()
                .unwrap_or(true),
            signer_private_key: non_empty_var("SIGNER_PRIVATE_KEY"),

            api_token: non_empty_var("API_TOKEN"),

            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs as i64)
    }

    pub fn chain_call_timeout(&self) -> Duration {
        Duration::from_millis(self.chain_call_timeout_ms)
    }

    pub fn indexer_timeout(&self) -> Duration {
        Duration::from_millis(self.indexer_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.opportunity_stale_after_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            cache_ttl_secs: 300,
            chain_call_timeout_ms: 8_000,
            indexer_timeout_ms: 15_000,
            opportunity_stale_after_secs: 86_400,
            apy_history_limit: 500,
            price_api_url: DEFAULT_PRICE_API_URL.into(),
            yield_indexer_url: DEFAULT_YIELD_INDEXER_URL.into(),
            indexer_min_tvl: Decimal::from(1_000_000),
            rpc_overrides: HashMap::new(),
            operation_timeout_secs: 600,
            dry_run: true,
            signer_private_key: None,
            api_token: None,
            log_json: false,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
