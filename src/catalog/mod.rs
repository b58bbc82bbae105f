//! Opportunity Catalog.
//!
//! Records are pulled from one or more [`OpportunityIndexer`] backends in
//! parallel. The first registered backend is the primary: its record for
//! an identity wins while it is fresh, and secondary backends only fill
//! gaps. A record that has gone stale is a gap, so a secondary may take the
//! identity over until a higher-ranked backend reports it again. Records
//! are never removed; ones not refreshed within the staleness window are
//! hidden from "active" queries but stay available for APY history.

pub mod indexers;

pub use indexers::{DefiLlamaIndexer, IndexerError, OpportunityIndexer, StaticIndexer};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::cache::{TtlCache, ALL_OPPORTUNITIES_KEY};
use crate::clock::Clock;
use crate::models::{ApySample, OpportunityKey, YieldOpportunity};

/// APY samples kept per record unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

struct CatalogEntry {
    record: YieldOpportunity,
    /// Index of the backend that supplied `record`; lower is preferred.
    source_rank: usize,
    history: Vec<ApySample>,
}

/// Outcome of one refresh pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshSummary {
    pub backends_ok: usize,
    pub backends_failed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub total_records: usize,
}

pub struct OpportunityCatalog {
    backends: Vec<Arc<dyn OpportunityIndexer>>,
    clock: Arc<dyn Clock>,
    stale_after: chrono::Duration,
    indexer_timeout: Duration,
    history_limit: usize,
    entries: RwLock<HashMap<OpportunityKey, CatalogEntry>>,
    cache: TtlCache<&'static str, Vec<YieldOpportunity>>,
    refresh_lock: Mutex<()>,
}

impl OpportunityCatalog {
    pub fn new(
        backends: Vec<Arc<dyn OpportunityIndexer>>,
        clock: Arc<dyn Clock>,
        cache_ttl: chrono::Duration,
        stale_after: chrono::Duration,
        indexer_timeout: Duration,
    ) -> Self {
        Self {
            backends,
            cache: TtlCache::new(cache_ttl, clock.clone()),
            clock,
            stale_after,
            indexer_timeout,
            history_limit: DEFAULT_HISTORY_LIMIT,
            entries: RwLock::new(HashMap::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Keep at most `limit` APY samples per record.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Pull every backend and merge the results into the store.
    pub async fn refresh(&self) -> RefreshSummary {
        let fetches = self.backends.iter().map(|backend| async move {
            match tokio::time::timeout(self.indexer_timeout, backend.fetch()).await {
                Ok(result) => result,
                Err(_) => Err(IndexerError::Unavailable(format!(
                    "timed out after {}ms",
                    self.indexer_timeout.as_millis()
                ))),
            }
        });
        let results = join_all(fetches).await;

        // Reconcile across backends first: lowest rank wins per identity.
        let mut incoming: HashMap<OpportunityKey, (usize, YieldOpportunity)> = HashMap::new();
        let mut backends_ok = 0;
        let mut backends_failed = 0;
        for (rank, (backend, result)) in self.backends.iter().zip(results).enumerate() {
            match result {
                Ok(records) => {
                    backends_ok += 1;
                    tracing::debug!(backend = backend.name(), records = records.len(), "Indexer fetched");
                    for mut record in records {
                        record.source = backend.name().to_string();
                        incoming.entry(record.key()).or_insert((rank, record));
                    }
                }
                Err(e) => {
                    backends_failed += 1;
                    metrics::counter!("indexer_failures_total").increment(1);
                    tracing::warn!(backend = backend.name(), error = %e, "Indexer refresh failed, keeping previous records");
                }
            }
        }

        let now = self.clock.now();
        let cutoff = now - self.stale_after;
        let mut inserted = 0;
        let mut updated = 0;
        let mut entries = self.entries.write().await;

        for (key, (rank, mut record)) in incoming {
            record.updated_at = now;
            match entries.get_mut(&key) {
                Some(entry) if entry.source_rank < rank && entry.record.updated_at >= cutoff => {
                    tracing::debug!(key = %key, backend = %record.source, "Secondary record ignored, primary present");
                }
                Some(entry) => {
                    if entry.source_rank != rank {
                        tracing::info!(
                            key = %key,
                            from = %entry.record.source,
                            to = %record.source,
                            "Catalog identity changed source"
                        );
                    }
                    record.created_at = entry.record.created_at;
                    if entry.history.last().map(|s| s.apy) != Some(record.apy) {
                        entry.history.push(sample(&record));
                        let excess = entry.history.len().saturating_sub(self.history_limit);
                        entry.history.drain(..excess);
                    }
                    entry.record = record;
                    entry.source_rank = rank;
                    updated += 1;
                }
                None => {
                    record.created_at = now;
                    let history = vec![sample(&record)];
                    entries.insert(
                        key,
                        CatalogEntry {
                            record,
                            source_rank: rank,
                            history,
                        },
                    );
                    inserted += 1;
                }
            }
        }

        let total_records = entries.len();
        drop(entries);

        metrics::counter!("catalog_refreshes_total").increment(1);
        tracing::info!(
            backends_ok,
            backends_failed,
            inserted,
            updated,
            total_records,
            "Catalog refreshed"
        );

        RefreshSummary {
            backends_ok,
            backends_failed,
            inserted,
            updated,
            total_records,
        }
    }

    /// Non-stale records, ordered by id.
    pub async fn get_all_active(&self) -> Vec<YieldOpportunity> {
        let cutoff = self.clock.now() - self.stale_after;
        let entries = self.entries.read().await;
        let mut active: Vec<YieldOpportunity> = entries
            .values()
            .filter(|e| e.record.updated_at >= cutoff)
            .map(|e| e.record.clone())
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        metrics::gauge!("catalog_active_opportunities").set(active.len() as f64);
        active
    }

    pub async fn get_by_chain(&self, chain: &str) -> Vec<YieldOpportunity> {
        self.get_all_active()
            .await
            .into_iter()
            .filter(|o| o.chain.eq_ignore_ascii_case(chain))
            .collect()
    }

    /// Active opportunities through the TTL cache. A forced refresh bypasses
    /// the cache and repopulates it.
    pub async fn opportunities(&self, force_refresh: bool) -> Vec<YieldOpportunity> {
        if !force_refresh {
            if let Some(cached) = self.cache.get(&ALL_OPPORTUNITIES_KEY).await {
                return cached;
            }
        }

        let _guard = self.refresh_lock.lock().await;
        if !force_refresh {
            // Another caller may have refreshed while we waited.
            if let Some(cached) = self.cache.get(&ALL_OPPORTUNITIES_KEY).await {
                return cached;
            }
        }

        self.refresh().await;
        let active = self.get_all_active().await;
        self.cache.insert(ALL_OPPORTUNITIES_KEY, active.clone()).await;
        active
    }

    pub async fn opportunities_by_chain(&self, chain: &str, force_refresh: bool) -> Vec<YieldOpportunity> {
        self.opportunities(force_refresh)
            .await
            .into_iter()
            .filter(|o| o.chain.eq_ignore_ascii_case(chain))
            .collect()
    }

    /// Look up a record by id, stale or not.
    pub async fn get(&self, id: &str) -> Option<YieldOpportunity> {
        let entries = self.entries.read().await;
        entries
            .values()
            .find(|e| e.record.id == id)
            .map(|e| e.record.clone())
    }

    /// APY observations for a record, oldest first.
    pub async fn apy_history(&self, id: &str) -> Option<Vec<ApySample>> {
        let entries = self.entries.read().await;
        entries
            .values()
            .find(|e| e.record.id == id)
            .map(|e| e.history.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn sample(record: &YieldOpportunity) -> ApySample {
    ApySample {
        apy: record.apy,
        tvl_usd: record.tvl_usd,
        observed_at: record.updated_at,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
