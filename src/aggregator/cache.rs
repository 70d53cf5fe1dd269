//! Origin-specific TTL caches for candidate lookups

use super::models::ContractCandidate;
use crate::intent::ContractCategory;
use crate::metrics::METRICS;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Local category lookups and remote fetches, each with its own TTL
///
/// Local entries expire quickly because the store is writable; remote
/// entries live longer since refetching costs a round trip and rate-limit
/// budget.
#[derive(Clone)]
pub struct CandidateCache {
    local: Cache<ContractCategory, Arc<Vec<ContractCandidate>>>,
    remote: Cache<String, Arc<ContractCandidate>>,
}

impl CandidateCache {
    pub fn new(local_ttl: Duration, remote_ttl: Duration, max_entries: u64) -> Self {
        let local = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(local_ttl)
            .build();
        let remote = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(remote_ttl)
            .eviction_listener(|path, _value, cause| {
                tracing::debug!("Remote cache evicted: {} (cause: {:?})", path, cause);
            })
            .build();

        Self { local, remote }
    }

    pub async fn get_local(
        &self,
        category: ContractCategory,
    ) -> Option<Arc<Vec<ContractCandidate>>> {
        let result = self.local.get(&category).await;
        METRICS.record_cache("local", result.is_some());
        result
    }

    pub async fn insert_local(
        &self,
        category: ContractCategory,
        candidates: Vec<ContractCandidate>,
    ) {
        self.local.insert(category, Arc::new(candidates)).await;
    }

    pub async fn get_remote(&self, path: &str) -> Option<Arc<ContractCandidate>> {
        let result = self.remote.get(path).await;
        METRICS.record_cache("remote", result.is_some());
        result
    }

    pub async fn insert_remote(&self, path: String, candidate: ContractCandidate) {
        self.remote.insert(path, Arc::new(candidate)).await;
    }

    /// Drop every cached local lookup
    pub async fn invalidate_local(&self) {
        self.local.invalidate_all();
        self.local.run_pending_tasks().await;
    }
}
