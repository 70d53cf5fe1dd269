//! Candidate aggregation across the local store and a remote source

use super::cache::CandidateCache;
use super::models::{CandidateOrigin, ContractCandidate};
use super::remote::{RemoteCredentials, RemoteSource};
use super::store::CandidateStore;
use crate::intent::{ContractCategory, ContractIntent};
use crate::metrics::METRICS;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Below this many local candidates the remote source is consulted
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,

    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Category looked up when the intent has none
    #[serde(default = "default_fallback_category")]
    pub fallback_category: ContractCategory,

    /// Remote path for a template id; `{id}` is replaced
    #[serde(default = "default_remote_path_template")]
    pub remote_path_template: String,

    #[serde(default = "default_local_ttl_secs")]
    pub local_ttl_secs: u64,

    #[serde(default = "default_remote_ttl_secs")]
    pub remote_ttl_secs: u64,

    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: u64,
}

fn default_min_candidates() -> usize {
    3
}

fn default_max_candidates() -> usize {
    5
}

fn default_fallback_category() -> ContractCategory {
    ContractCategory::Utility
}

fn default_remote_path_template() -> String {
    "aptos-move/move-examples/{id}/sources/{id}.move".to_string()
}

fn default_local_ttl_secs() -> u64 {
    60
}

fn default_remote_ttl_secs() -> u64 {
    600
}

fn default_cache_max_entries() -> u64 {
    1000
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_candidates: default_min_candidates(),
            max_candidates: default_max_candidates(),
            fallback_category: default_fallback_category(),
            remote_path_template: default_remote_path_template(),
            local_ttl_secs: default_local_ttl_secs(),
            remote_ttl_secs: default_remote_ttl_secs(),
            cache_max_entries: default_cache_max_entries(),
        }
    }
}

impl AggregatorConfig {
    pub fn remote_path(&self, id: &str) -> String {
        self.remote_path_template.replace("{id}", id)
    }
}

/// Per-call retrieval options
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub use_remote: bool,
    pub credentials: Option<Arc<RemoteCredentials>>,
}

impl FetchOptions {
    pub fn local_only() -> Self {
        Self::default()
    }

    pub fn with_remote(credentials: Option<Arc<RemoteCredentials>>) -> Self {
        Self {
            use_remote: true,
            credentials,
        }
    }
}

/// Result of one aggregation
#[derive(Debug, Default)]
pub struct Aggregation {
    pub candidates: Vec<ContractCandidate>,
    /// Remote lookups that failed, as `"<path>: <error>"`
    pub skipped: Vec<String>,
}

/// Merges and ranks candidates for an intent
pub struct ContractSourceAggregator {
    store: Arc<dyn CandidateStore>,
    remote: Option<Arc<dyn RemoteSource>>,
    cache: CandidateCache,
    config: AggregatorConfig,
}

impl ContractSourceAggregator {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        remote: Option<Arc<dyn RemoteSource>>,
        config: AggregatorConfig,
    ) -> Self {
        let cache = CandidateCache::new(
            Duration::from_secs(config.local_ttl_secs),
            Duration::from_secs(config.remote_ttl_secs),
            config.cache_max_entries,
        );
        Self {
            store,
            remote,
            cache,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn CandidateStore> {
        &self.store
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Forget cached local lookups; call after writing to the store
    pub async fn invalidate_local(&self) {
        self.cache.invalidate_local().await;
    }

    /// Candidates for `intent`, locals first, at most `max_candidates`
    pub async fn fetch_candidates(
        &self,
        intent: &ContractIntent,
        options: &FetchOptions,
    ) -> Vec<ContractCandidate> {
        self.aggregate(intent, options).await.candidates
    }

    /// Like [`fetch_candidates`](Self::fetch_candidates), also reporting
    /// the remote lookups that were skipped
    pub async fn aggregate(&self, intent: &ContractIntent, options: &FetchOptions) -> Aggregation {
        let categories: Vec<ContractCategory> = if intent.categories.is_empty() {
            vec![self.config.fallback_category]
        } else {
            intent.categories.clone()
        };

        let mut results = self.fetch_local(intent, &categories).await;
        let mut skipped = Vec::new();
        METRICS
            .candidates_fetched
            .with_label_values(&[CandidateOrigin::Local.as_str()])
            .inc_by(results.len() as f64);
        debug!("{} local candidates for {:?}", results.len(), categories);

        if results.len() < self.config.min_candidates && options.use_remote {
            match &self.remote {
                Some(remote) => {
                    let (remote_candidates, failures) = self
                        .fetch_remote(remote.as_ref(), intent, &categories, options)
                        .await;
                    skipped = failures;
                    let mut seen_ids: HashSet<String> =
                        results.iter().map(|c| c.id.clone()).collect();
                    let seen_prints: HashSet<String> =
                        results.iter().map(|c| c.fingerprint()).collect();

                    let mut added = 0;
                    for candidate in remote_candidates {
                        if seen_prints.contains(&candidate.fingerprint())
                            || !seen_ids.insert(candidate.id.clone())
                        {
                            debug!("Skipping duplicate remote candidate {}", candidate.id);
                            continue;
                        }
                        results.push(candidate);
                        added += 1;
                    }

                    METRICS
                        .candidates_fetched
                        .with_label_values(&[CandidateOrigin::Remote.as_str()])
                        .inc_by(added as f64);
                }
                None => debug!("Remote retrieval requested but no remote source configured"),
            }
        }

        results.truncate(self.config.max_candidates);
        info!(
            "Aggregated {} candidates ({} remote, {} skipped)",
            results.len(),
            results
                .iter()
                .filter(|c| c.origin == CandidateOrigin::Remote)
                .count(),
            skipped.len()
        );
        Aggregation {
            candidates: results,
            skipped,
        }
    }

    async fn fetch_local(
        &self,
        intent: &ContractIntent,
        categories: &[ContractCategory],
    ) -> Vec<ContractCandidate> {
        let mut results = Vec::new();
        let mut seen = HashSet::new();

        for (rank, category) in categories.iter().enumerate() {
            let found = match self.cache.get_local(*category).await {
                Some(cached) => cached.as_ref().clone(),
                None => {
                    let found = self.store.by_category(*category).await;
                    self.cache.insert_local(*category, found.clone()).await;
                    found
                }
            };

            let mut ranked: Vec<ContractCandidate> = found
                .iter()
                .filter(|c| !seen.contains(&c.id))
                .map(|c| c.with_relevance(relevance(c, intent, rank)))
                .collect();
            ranked.sort_by(|a, b| {
                b.relevance
                    .total_cmp(&a.relevance)
                    .then_with(|| a.id.cmp(&b.id))
            });

            for candidate in ranked {
                seen.insert(candidate.id.clone());
                results.push(candidate);
            }
        }

        results
    }

    /// Remote candidates re-labelled for this intent, plus failed lookups
    async fn fetch_remote(
        &self,
        remote: &dyn RemoteSource,
        intent: &ContractIntent,
        categories: &[ContractCategory],
        options: &FetchOptions,
    ) -> (Vec<ContractCandidate>, Vec<String>) {
        let credentials = options.credentials.as_deref();
        let primary = categories[0];

        let paths: Vec<String> = if intent.suggested_templates.is_empty() {
            let pattern = search_pattern(intent, primary);
            match remote.search_by_pattern(&pattern, credentials).await {
                Ok(paths) => paths,
                Err(e) => {
                    warn!("Remote search for '{}' failed: {}", pattern, e);
                    return (Vec::new(), vec![format!("search '{}': {}", pattern, e)]);
                }
            }
        } else {
            intent
                .suggested_templates
                .iter()
                .map(|id| self.config.remote_path(id))
                .collect()
        };

        if paths.is_empty() {
            return (Vec::new(), Vec::new());
        }
        debug!("Fetching {} remote paths", paths.len());

        // The cache holds candidates as fetched; category and relevance
        // depend on the intent and are applied per lookup
        let fetches = paths.iter().map(|path| async move {
            let fetched = match self.cache.get_remote(path).await {
                Some(cached) => cached.as_ref().clone(),
                None => {
                    let candidate = remote
                        .fetch_by_path(path, credentials)
                        .await
                        .map_err(|e| {
                            warn!("Skipping remote candidate {}: {}", path, e);
                            format!("{}: {}", path, e)
                        })?;
                    self.cache
                        .insert_remote(path.clone(), candidate.clone())
                        .await;
                    candidate
                }
            };
            let candidate = fetched.with_category(primary);
            let score = relevance(&candidate, intent, 0);
            Ok::<_, String>(candidate.with_relevance(score))
        });

        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        for result in join_all(fetches).await {
            match result {
                Ok(candidate) => candidates.push(candidate),
                Err(failure) => failures.push(failure),
            }
        }
        (candidates, failures)
    }
}

/// Feature overlap with the intent, plus a bonus for the category's rank
fn relevance(candidate: &ContractCandidate, intent: &ContractIntent, rank: usize) -> f32 {
    let overlap = if intent.features.is_empty() {
        0.0
    } else {
        let matched = intent
            .features
            .iter()
            .filter(|f| candidate.has_feature(f))
            .count();
        matched as f32 / intent.features.len() as f32
    };
    let rank_bonus = 1.0 / (rank as f32 + 1.0);
    (0.6 * overlap + 0.4 * rank_bonus).clamp(0.0, 1.0)
}

fn search_pattern(intent: &ContractIntent, primary: ContractCategory) -> String {
    if intent.features.is_empty() {
        primary.as_str().to_lowercase()
    } else {
        intent.features.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::remote::{candidate_id, RemoteError};
    use crate::aggregator::store::InMemoryCandidateStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves every path except those containing "broken"
    #[derive(Default)]
    struct MockRemote {
        fetches: AtomicUsize,
        searches: AtomicUsize,
    }

    #[async_trait]
    impl RemoteSource for MockRemote {
        async fn fetch_by_path(
            &self,
            path: &str,
            _credentials: Option<&RemoteCredentials>,
        ) -> Result<ContractCandidate, RemoteError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if path.contains("broken") {
                return Err(RemoteError::NotFound(path.to_string()));
            }
            let id = candidate_id(path);
            Ok(ContractCandidate::new(
                id.clone(),
                ContractCategory::Utility,
                format!("module 0x1::{} {{ fun f() {{}} }}", id),
            )
            .with_origin(CandidateOrigin::Remote))
        }

        async fn search_by_pattern(
            &self,
            _pattern: &str,
            _credentials: Option<&RemoteCredentials>,
        ) -> Result<Vec<String>, RemoteError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["found/searched.move".to_string()])
        }
    }

    fn intent(
        categories: Vec<ContractCategory>,
        features: &[&str],
        templates: &[&str],
    ) -> ContractIntent {
        ContractIntent {
            categories,
            features: features.iter().map(|s| s.to_string()).collect(),
            confidence: 0.8,
            suggested_templates: templates.iter().map(|s| s.to_string()).collect(),
            category_scores: Vec::new(),
        }
    }

    fn config() -> AggregatorConfig {
        AggregatorConfig {
            remote_path_template: "remote/{id}.move".to_string(),
            ..AggregatorConfig::default()
        }
    }

    async fn store_with(candidates: Vec<ContractCandidate>) -> Arc<InMemoryCandidateStore> {
        let store = Arc::new(InMemoryCandidateStore::new());
        for candidate in candidates {
            store.add(candidate).await.unwrap();
        }
        store
    }

    fn local(id: &str, category: ContractCategory, features: &[&str]) -> ContractCandidate {
        ContractCandidate::new(id, category, format!("module 0x1::{} {{}}", id))
            .with_features(features.iter().copied())
    }

    #[tokio::test]
    async fn test_local_only_returns_exactly_locals() {
        let store = store_with(vec![
            local("nft_a", ContractCategory::Nft, &["minting"]),
            local("nft_b", ContractCategory::Nft, &[]),
        ])
        .await;
        let remote = Arc::new(MockRemote::default());
        let aggregator = ContractSourceAggregator::new(store, Some(remote.clone()), config());

        let intent = intent(vec![ContractCategory::Nft], &["minting"], &["nft_collection"]);
        let results = aggregator
            .fetch_candidates(&intent, &FetchOptions::local_only())
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "nft_a");
        assert!(results[0].relevance > results[1].relevance);
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(remote.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remote_fills_after_locals_and_isolates_failures() {
        let store = store_with(vec![local("nft_a", ContractCategory::Nft, &[])]).await;
        let remote = Arc::new(MockRemote::default());
        let aggregator = ContractSourceAggregator::new(store, Some(remote.clone()), config());

        let intent = intent(
            vec![ContractCategory::Nft],
            &[],
            &["nft_collection", "broken_one", "digital_asset"],
        );
        let results = aggregator
            .fetch_candidates(&intent, &FetchOptions::with_remote(None))
            .await;

        let ids: Vec<_> = results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["nft_a", "nft_collection", "digital_asset"]);
        assert_eq!(results[0].origin, CandidateOrigin::Local);
        assert!(results[1..].iter().all(|c| c.origin == CandidateOrigin::Remote));
        assert!(results[1..].iter().all(|c| c.category == ContractCategory::Nft));
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_result_capped_at_max() {
        let store = store_with(
            (0..8)
                .map(|i| local(&format!("token_{}", i), ContractCategory::Token, &[]))
                .collect(),
        )
        .await;
        let aggregator = ContractSourceAggregator::new(store, None, config());

        let intent = intent(vec![ContractCategory::Token], &[], &[]);
        let results = aggregator
            .fetch_candidates(&intent, &FetchOptions::with_remote(None))
            .await;
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn test_category_rank_order() {
        let store = store_with(vec![
            local("defi_a", ContractCategory::Defi, &["staking"]),
            local("token_a", ContractCategory::Token, &[]),
        ])
        .await;
        let aggregator = ContractSourceAggregator::new(store, None, config());

        let intent = intent(
            vec![ContractCategory::Token, ContractCategory::Defi],
            &["staking"],
            &[],
        );
        let results = aggregator
            .fetch_candidates(&intent, &FetchOptions::local_only())
            .await;

        let ids: Vec<_> = results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["token_a", "defi_a"]);
    }

    #[tokio::test]
    async fn test_fallback_category_and_search() {
        let store = store_with(vec![local("registry", ContractCategory::Utility, &[])]).await;
        let remote = Arc::new(MockRemote::default());
        let aggregator = ContractSourceAggregator::new(store, Some(remote.clone()), config());

        let intent = intent(Vec::new(), &[], &[]);
        let results = aggregator
            .fetch_candidates(&intent, &FetchOptions::with_remote(None))
            .await;

        let ids: Vec<_> = results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["registry", "searched"]);
        assert_eq!(remote.searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_copy_of_local_is_dropped() {
        // Local source identical to what the mock remote serves for "copy"
        let copy = ContractCandidate::new(
            "local_copy",
            ContractCategory::Nft,
            "module 0x1::copy { fun f() {} }",
        );
        let store = store_with(vec![copy]).await;
        let aggregator =
            ContractSourceAggregator::new(store, Some(Arc::new(MockRemote::default())), config());

        let intent = intent(vec![ContractCategory::Nft], &[], &["copy"]);
        let results = aggregator
            .fetch_candidates(&intent, &FetchOptions::with_remote(None))
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "local_copy");
    }

    #[tokio::test]
    async fn test_remote_results_are_cached() {
        let store = store_with(Vec::new()).await;
        let remote = Arc::new(MockRemote::default());
        let aggregator = ContractSourceAggregator::new(store, Some(remote.clone()), config());

        let intent = intent(vec![ContractCategory::Defi], &[], &["staking_vault"]);
        let options = FetchOptions::with_remote(None);
        aggregator.fetch_candidates(&intent, &options).await;
        aggregator.fetch_candidates(&intent, &options).await;

        assert_eq!(remote.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_local_sees_new_writes() {
        let store = store_with(Vec::new()).await;
        let aggregator = ContractSourceAggregator::new(store.clone(), None, config());
        let intent = intent(vec![ContractCategory::Social], &[], &[]);

        assert!(aggregator
            .fetch_candidates(&intent, &FetchOptions::local_only())
            .await
            .is_empty());

        store
            .add(local("profile", ContractCategory::Social, &[]))
            .await
            .unwrap();
        aggregator.invalidate_local().await;

        let results = aggregator
            .fetch_candidates(&intent, &FetchOptions::local_only())
            .await;
        assert_eq!(results.len(), 1);
    }

    /// Search always finds the same path; the file declares `staking`
    #[derive(Default)]
    struct SharedPathRemote {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl RemoteSource for SharedPathRemote {
        async fn fetch_by_path(
            &self,
            path: &str,
            _credentials: Option<&RemoteCredentials>,
        ) -> Result<ContractCandidate, RemoteError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(ContractCandidate::new(
                candidate_id(path),
                ContractCategory::Utility,
                "module 0x1::shared { fun stake() {} }",
            )
            .with_features(["staking"])
            .with_origin(CandidateOrigin::Remote))
        }

        async fn search_by_pattern(
            &self,
            _pattern: &str,
            _credentials: Option<&RemoteCredentials>,
        ) -> Result<Vec<String>, RemoteError> {
            Ok(vec!["shared/shared.move".to_string()])
        }
    }

    #[tokio::test]
    async fn test_cached_remote_relabelled_per_intent() {
        let store = store_with(Vec::new()).await;
        let remote = Arc::new(SharedPathRemote::default());
        let aggregator = ContractSourceAggregator::new(store, Some(remote.clone()), config());
        let options = FetchOptions::with_remote(None);

        let gaming = intent(vec![ContractCategory::Gaming], &[], &[]);
        let first = aggregator.fetch_candidates(&gaming, &options).await;
        assert_eq!(first[0].category, ContractCategory::Gaming);
        assert!((first[0].relevance - 0.4).abs() < 1e-6);

        let defi = intent(vec![ContractCategory::Defi], &["staking"], &[]);
        let second = aggregator.fetch_candidates(&defi, &options).await;
        assert_eq!(second[0].id, "shared");
        assert_eq!(second[0].category, ContractCategory::Defi);
        assert!((second[0].relevance - 1.0).abs() < 1e-6);

        // Served from the cache, not refetched
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_aggregate_reports_skipped_fetches() {
        let store = store_with(Vec::new()).await;
        let aggregator =
            ContractSourceAggregator::new(store, Some(Arc::new(MockRemote::default())), config());

        let intent = intent(vec![ContractCategory::Nft], &[], &["good", "broken_one"]);
        let aggregation = aggregator
            .aggregate(&intent, &FetchOptions::with_remote(None))
            .await;

        assert_eq!(aggregation.candidates.len(), 1);
        assert_eq!(aggregation.skipped.len(), 1);
        assert!(aggregation.skipped[0].starts_with("remote/broken_one.move"));
    }
}
