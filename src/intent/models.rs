//! Data models for intent classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Contract category detected from a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractCategory {
    Nft,
    Token,
    Marketplace,
    Defi,
    Governance,
    Gaming,
    Social,
    Utility,
}

impl ContractCategory {
    /// All categories in declaration order (also the tie-break order)
    pub const ALL: [ContractCategory; 8] = [
        ContractCategory::Nft,
        ContractCategory::Token,
        ContractCategory::Marketplace,
        ContractCategory::Defi,
        ContractCategory::Governance,
        ContractCategory::Gaming,
        ContractCategory::Social,
        ContractCategory::Utility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractCategory::Nft => "NFT",
            ContractCategory::Token => "TOKEN",
            ContractCategory::Marketplace => "MARKETPLACE",
            ContractCategory::Defi => "DEFI",
            ContractCategory::Governance => "GOVERNANCE",
            ContractCategory::Gaming => "GAMING",
            ContractCategory::Social => "SOCIAL",
            ContractCategory::Utility => "UTILITY",
        }
    }
}

impl fmt::Display for ContractCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized score of a ranked category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: ContractCategory,
    /// Raw score divided by the category's keyword-list length
    pub score: f32,
    /// Number of keywords matched
    pub matches: usize,
}

/// Classified intent of a natural-language request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractIntent {
    /// Categories ranked by normalized score, zero scores excluded
    pub categories: Vec<ContractCategory>,
    /// Feature tags, sorted and deduplicated
    pub features: Vec<String>,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Template identifiers suggested for retrieval, in rank order
    pub suggested_templates: Vec<String>,
    /// Per-category scores backing `categories`
    #[serde(default)]
    pub category_scores: Vec<CategoryScore>,
}

impl ContractIntent {
    /// Highest-ranked category, if any matched
    pub fn primary_category(&self) -> Option<ContractCategory> {
        self.categories.first().copied()
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&ContractCategory::Defi).unwrap();
        assert_eq!(json, "\"DEFI\"");

        let parsed: ContractCategory = serde_json::from_str("\"NFT\"").unwrap();
        assert_eq!(parsed, ContractCategory::Nft);
    }

    #[test]
    fn test_primary_category() {
        let intent = ContractIntent {
            categories: vec![ContractCategory::Token, ContractCategory::Defi],
            features: vec!["staking".to_string()],
            confidence: 0.6,
            suggested_templates: vec![],
            category_scores: vec![],
        };
        assert_eq!(intent.primary_category(), Some(ContractCategory::Token));
        assert!(intent.has_feature("staking"));
        assert!(!intent.has_feature("voting"));
    }
}
