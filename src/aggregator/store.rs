//! Local candidate store with incrementally maintained indices

use super::models::{ContractCandidate, StoreStats};
use super::templates::builtin_templates;
use crate::intent::ContractCategory;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::hash::Hash;
use thiserror::Error;
use tracing::debug;

/// Store write errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Candidate already exists: {0}")]
    AlreadyExists(String),

    #[error("Candidate not found: {0}")]
    NotFound(String),
}

/// Keyed candidate storage
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn get(&self, id: &str) -> Option<ContractCandidate>;

    async fn by_category(&self, category: ContractCategory) -> Vec<ContractCandidate>;

    async fn by_feature(&self, feature: &str) -> Vec<ContractCandidate>;

    async fn by_tag(&self, tag: &str) -> Vec<ContractCandidate>;

    async fn add(&self, candidate: ContractCandidate) -> Result<(), StoreError>;

    async fn update(&self, candidate: ContractCandidate) -> Result<(), StoreError>;

    async fn remove(&self, id: &str) -> Option<ContractCandidate>;

    async fn stats(&self) -> StoreStats;
}

/// In-memory store
///
/// Each index map is sharded by `DashMap`, so readers see either the old or
/// the new id set for a key, never a torn one. Lookups return candidates
/// sorted by id.
#[derive(Debug, Default)]
pub struct InMemoryCandidateStore {
    candidates: DashMap<String, ContractCandidate>,
    by_category: DashMap<ContractCategory, HashSet<String>>,
    by_feature: DashMap<String, HashSet<String>>,
    by_tag: DashMap<String, HashSet<String>>,
}

impl InMemoryCandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the bundled Move templates
    pub fn with_builtin_templates() -> Self {
        let store = Self::new();
        for candidate in builtin_templates() {
            store.insert_indexed(candidate);
        }
        debug!("Seeded store with {} builtin templates", store.candidates.len());
        store
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    fn insert_indexed(&self, candidate: ContractCandidate) {
        let id = candidate.id.clone();
        index_insert(&self.by_category, candidate.category, &id);
        for feature in &candidate.features {
            index_insert(&self.by_feature, feature.clone(), &id);
        }
        for tag in &candidate.tags {
            index_insert(&self.by_tag, tag.clone(), &id);
        }
        self.candidates.insert(id, candidate);
    }

    fn unindex(&self, candidate: &ContractCandidate) {
        index_remove(&self.by_category, &candidate.category, &candidate.id);
        for feature in &candidate.features {
            index_remove(&self.by_feature, feature, &candidate.id);
        }
        for tag in &candidate.tags {
            index_remove(&self.by_tag, tag, &candidate.id);
        }
    }

    fn resolve(&self, ids: Option<HashSet<String>>) -> Vec<ContractCandidate> {
        let mut ids: Vec<String> = ids.map(|set| set.into_iter().collect()).unwrap_or_default();
        ids.sort();
        ids.iter()
            .filter_map(|id| self.candidates.get(id).map(|entry| entry.value().clone()))
            .collect()
    }
}

fn index_insert<K: Eq + Hash>(index: &DashMap<K, HashSet<String>>, key: K, id: &str) {
    index.entry(key).or_default().insert(id.to_string());
}

fn index_remove<K: Eq + Hash>(index: &DashMap<K, HashSet<String>>, key: &K, id: &str) {
    if let Some(mut ids) = index.get_mut(key) {
        ids.remove(id);
    }
    index.remove_if(key, |_, ids| ids.is_empty());
}

#[async_trait]
impl CandidateStore for InMemoryCandidateStore {
    async fn get(&self, id: &str) -> Option<ContractCandidate> {
        self.candidates.get(id).map(|entry| entry.value().clone())
    }

    async fn by_category(&self, category: ContractCategory) -> Vec<ContractCandidate> {
        let ids = self.by_category.get(&category).map(|ids| ids.value().clone());
        self.resolve(ids)
    }

    async fn by_feature(&self, feature: &str) -> Vec<ContractCandidate> {
        let ids = self.by_feature.get(feature).map(|ids| ids.value().clone());
        self.resolve(ids)
    }

    async fn by_tag(&self, tag: &str) -> Vec<ContractCandidate> {
        let ids = self.by_tag.get(tag).map(|ids| ids.value().clone());
        self.resolve(ids)
    }

    async fn add(&self, candidate: ContractCandidate) -> Result<(), StoreError> {
        if self.candidates.contains_key(&candidate.id) {
            return Err(StoreError::AlreadyExists(candidate.id));
        }
        debug!("Adding candidate {}", candidate.id);
        self.insert_indexed(candidate);
        Ok(())
    }

    async fn update(&self, candidate: ContractCandidate) -> Result<(), StoreError> {
        let previous = self
            .candidates
            .get(&candidate.id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(candidate.id.clone()))?;

        self.unindex(&previous);
        self.insert_indexed(candidate);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Option<ContractCandidate> {
        let (_, candidate) = self.candidates.remove(id)?;
        self.unindex(&candidate);
        debug!("Removed candidate {}", id);
        Some(candidate)
    }

    async fn stats(&self) -> StoreStats {
        StoreStats {
            count: self.candidates.len(),
            categories: self.by_category.len(),
            features: self.by_feature.len(),
            tags: self.by_tag.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn candidate(id: &str, category: ContractCategory) -> ContractCandidate {
        ContractCandidate::new(id, category, format!("module 0x1::{} {{}}", id))
    }

    #[tokio::test]
    async fn test_add_and_lookup() {
        let store = InMemoryCandidateStore::new();
        store
            .add(
                candidate("b_nft", ContractCategory::Nft)
                    .with_features(["minting"])
                    .with_tags(["starter"]),
            )
            .await
            .unwrap();
        store
            .add(candidate("a_nft", ContractCategory::Nft).with_features(["minting", "royalties"]))
            .await
            .unwrap();

        let nfts = store.by_category(ContractCategory::Nft).await;
        let ids: Vec<_> = nfts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a_nft", "b_nft"]);

        assert_eq!(store.by_feature("minting").await.len(), 2);
        assert_eq!(store.by_feature("royalties").await.len(), 1);
        assert_eq!(store.by_tag("starter").await[0].id, "b_nft");
        assert!(store.by_category(ContractCategory::Defi).await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_add_rejected() {
        let store = InMemoryCandidateStore::new();
        store.add(candidate("x", ContractCategory::Token)).await.unwrap();
        let result = store.add(candidate("x", ContractCategory::Token)).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_update_reindexes() {
        let store = InMemoryCandidateStore::new();
        store
            .add(candidate("x", ContractCategory::Token).with_features(["burning"]))
            .await
            .unwrap();

        store
            .update(candidate("x", ContractCategory::Defi).with_features(["staking"]))
            .await
            .unwrap();

        assert!(store.by_category(ContractCategory::Token).await.is_empty());
        assert!(store.by_feature("burning").await.is_empty());
        assert_eq!(store.by_category(ContractCategory::Defi).await.len(), 1);
        assert_eq!(store.by_feature("staking").await.len(), 1);

        let missing = store.update(candidate("y", ContractCategory::Defi)).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_evicts_from_every_index() {
        let store = InMemoryCandidateStore::new();
        store
            .add(
                candidate("x", ContractCategory::Gaming)
                    .with_features(["game_items"])
                    .with_tags(["starter"]),
            )
            .await
            .unwrap();

        let removed = store.remove("x").await;
        assert!(removed.is_some());
        assert!(store.get("x").await.is_none());
        assert_eq!(store.stats().await, StoreStats::default());
        assert!(store.remove("x").await.is_none());
    }

    #[tokio::test]
    async fn test_builtin_templates() {
        let store = InMemoryCandidateStore::with_builtin_templates();
        let stats = store.stats().await;
        assert_eq!(stats.count, 16);
        assert_eq!(store.by_category(ContractCategory::Nft).await.len(), 2);
        assert_eq!(store.by_category(ContractCategory::Utility).await.len(), 2);
        assert!(store.get("staking_vault").await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_readers_during_writes() {
        let store = Arc::new(InMemoryCandidateStore::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for j in 0..25 {
                    let id = format!("c_{}_{}", i, j);
                    store
                        .add(candidate(&id, ContractCategory::Utility).with_features(["allowlist"]))
                        .await
                        .unwrap();
                    let found = store.by_category(ContractCategory::Utility).await;
                    assert!(found.iter().any(|c| c.id == id));
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.stats().await.count, 200);
        assert_eq!(store.by_feature("allowlist").await.len(), 200);
    }
}
