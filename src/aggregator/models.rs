//! Candidate data models

use crate::intent::ContractCategory;
use serde::{Deserialize, Serialize};

/// Where a candidate was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateOrigin {
    Local,
    Remote,
}

impl CandidateOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// A contract source considered for a generated project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractCandidate {
    pub id: String,
    pub origin: CandidateOrigin,
    pub category: ContractCategory,
    pub relevance: f32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub source: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ContractCandidate {
    /// Create a local candidate with zero relevance
    pub fn new(id: impl Into<String>, category: ContractCategory, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: CandidateOrigin::Local,
            category,
            relevance: 0.0,
            features: Vec::new(),
            tags: Vec::new(),
            source: source.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: CandidateOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Copy with a new relevance score
    pub fn with_relevance(&self, relevance: f32) -> Self {
        Self {
            relevance,
            ..self.clone()
        }
    }

    /// Copy filed under a different category
    pub fn with_category(&self, category: ContractCategory) -> Self {
        Self {
            category,
            ..self.clone()
        }
    }

    /// SHA-256 of the source text, hex encoded
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.source.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// Candidate store statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub count: usize,
    pub categories: usize,
    pub features: usize,
    pub tags: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_depends_on_source_only() {
        let a = ContractCandidate::new("a", ContractCategory::Nft, "module 0x1::a {}");
        let b = ContractCandidate::new("b", ContractCategory::Token, "module 0x1::a {}")
            .with_origin(CandidateOrigin::Remote);
        let c = ContractCandidate::new("a", ContractCategory::Nft, "module 0x1::c {}");

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_with_relevance_leaves_original() {
        let original = ContractCandidate::new("a", ContractCategory::Nft, "src");
        let scored = original.with_relevance(0.75);
        assert_eq!(original.relevance, 0.0);
        assert_eq!(scored.relevance, 0.75);
        assert_eq!(scored.id, original.id);
    }

    #[test]
    fn test_origin_serialization() {
        let json = serde_json::to_string(&CandidateOrigin::Remote).unwrap();
        assert_eq!(json, "\"remote\"");
    }
}
