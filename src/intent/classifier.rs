//! Keyword-weighted intent classifier
//!
//! Every category owns a fixed keyword list. A keyword found as a substring
//! of the lower-cased prompt contributes its word count to the category's
//! raw score; the normalized score divides by the list length so large lists
//! are not favored by size alone.

use super::models::{CategoryScore, ContractCategory, ContractIntent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Classifier tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    /// Multiplier applied to the top normalized score before clamping to 1
    #[serde(default = "default_confidence_multiplier")]
    pub confidence_multiplier: f32,

    /// Confidence above which a prompt counts as contract related
    #[serde(default = "default_related_threshold")]
    pub related_threshold: f32,

    /// Confidence below which an intent is reported as ambiguous
    #[serde(default = "default_ambiguity_threshold")]
    pub ambiguity_threshold: f32,

    /// Maximum suggested template identifiers
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

fn default_confidence_multiplier() -> f32 {
    2.0
}

fn default_related_threshold() -> f32 {
    0.3
}

fn default_ambiguity_threshold() -> f32 {
    0.3
}

fn default_max_suggestions() -> usize {
    5
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            confidence_multiplier: default_confidence_multiplier(),
            related_threshold: default_related_threshold(),
            ambiguity_threshold: default_ambiguity_threshold(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

const DOMAIN_KEYWORDS: &[&str] = &[
    "smart contract",
    "contract",
    "move",
    "aptos",
    "deploy",
    "blockchain",
    "on-chain",
    "onchain",
    "web3",
    "dapp",
    "module",
];

fn category_keywords(category: ContractCategory) -> &'static [&'static str] {
    match category {
        ContractCategory::Nft => &[
            "nft",
            "non-fungible",
            "collection",
            "collectible",
            "digital art",
            "mint",
            "minting",
            "royalty",
            "royalties",
            "pfp",
            "metadata",
            "token v2",
        ],
        ContractCategory::Token => &[
            "fungible token",
            "fungible asset",
            "token",
            "coin",
            "erc20",
            "supply",
            "airdrop",
            "burn",
            "transfer",
            "decimals",
        ],
        ContractCategory::Marketplace => &[
            "marketplace",
            "listing",
            "buy",
            "sell",
            "auction",
            "bid",
            "escrow",
            "trade",
            "offer",
            "storefront",
        ],
        ContractCategory::Defi => &[
            "defi",
            "swap",
            "liquidity",
            "liquidity pool",
            "lending",
            "borrow",
            "yield",
            "staking",
            "stake",
            "vault",
            "amm",
            "interest rate",
        ],
        ContractCategory::Governance => &[
            "governance",
            "dao",
            "vote",
            "voting",
            "proposal",
            "multisig",
            "treasury",
            "quorum",
            "delegate",
        ],
        ContractCategory::Gaming => &[
            "game",
            "gaming",
            "player",
            "item",
            "quest",
            "reward",
            "leaderboard",
            "battle",
            "loot",
        ],
        ContractCategory::Social => &[
            "social",
            "profile",
            "follow",
            "post",
            "tip",
            "community",
            "reputation",
            "badge",
        ],
        ContractCategory::Utility => &[
            "utility",
            "registry",
            "timelock",
            "oracle",
            "whitelist",
            "allowlist",
            "access control",
            "payment splitter",
            "subscription",
            "counter",
        ],
    }
}

fn feature_for_keyword(keyword: &str) -> Option<&'static str> {
    let feature = match keyword {
        "mint" | "minting" => "minting",
        "nft" | "non-fungible" | "collection" | "collectible" | "token v2" | "fungible token"
        | "fungible asset" => "token_creation",
        "royalty" | "royalties" => "royalties",
        "metadata" => "metadata",
        "burn" => "burning",
        "transfer" => "transfers",
        "supply" => "supply_management",
        "airdrop" => "airdrop",
        "auction" | "bid" => "auction",
        "listing" | "sell" | "storefront" => "listing",
        "escrow" => "escrow",
        "swap" | "amm" => "swap",
        "liquidity" | "liquidity pool" => "liquidity_pool",
        "lending" | "borrow" | "interest rate" => "lending",
        "staking" | "stake" => "staking",
        "yield" => "yield_farming",
        "vote" | "voting" | "quorum" => "voting",
        "proposal" => "proposals",
        "multisig" => "multisig",
        "treasury" => "treasury",
        "reward" | "quest" => "rewards",
        "leaderboard" => "leaderboard",
        "item" | "loot" => "game_items",
        "profile" => "profiles",
        "follow" => "following",
        "tip" => "tipping",
        "badge" | "reputation" => "badges",
        "whitelist" | "allowlist" | "access control" => "allowlist",
        "timelock" => "timelock",
        "oracle" => "oracle",
        "subscription" => "subscriptions",
        "payment splitter" => "payment_splitting",
        _ => return None,
    };
    Some(feature)
}

/// Template ids suggested for `category`
pub(crate) fn category_templates(category: ContractCategory) -> &'static [&'static str] {
    match category {
        ContractCategory::Nft => &["nft_collection", "digital_asset"],
        ContractCategory::Token => &["fungible_token", "managed_coin"],
        ContractCategory::Marketplace => &["nft_marketplace", "fixed_price_listing"],
        ContractCategory::Defi => &["staking_vault", "token_swap"],
        ContractCategory::Governance => &["dao_voting", "multisig_account"],
        ContractCategory::Gaming => &["game_items", "leaderboard"],
        ContractCategory::Social => &["social_profile", "tipping"],
        ContractCategory::Utility => &["allowlist_registry", "payment_splitter"],
    }
}

/// Intent classifier
#[derive(Debug, Clone, Default)]
pub struct IntentClassifier {
    config: IntentConfig,
}

impl IntentClassifier {
    pub fn new(config: IntentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IntentConfig {
        &self.config
    }

    /// Classify a prompt into ranked categories, features and confidence
    pub fn detect_intent(&self, prompt: &str) -> ContractIntent {
        let lowered = prompt.to_lowercase();
        let mut features = BTreeSet::new();
        let mut scores: Vec<CategoryScore> = Vec::new();

        for category in ContractCategory::ALL {
            let keywords = category_keywords(category);
            let mut raw = 0usize;
            let mut matches = 0usize;

            for keyword in keywords {
                if !lowered.contains(keyword) {
                    continue;
                }
                raw += keyword.split_whitespace().count();
                matches += 1;
                if let Some(feature) = feature_for_keyword(keyword) {
                    features.insert(feature.to_string());
                }
            }

            if raw > 0 {
                scores.push(CategoryScore {
                    category,
                    score: raw as f32 / keywords.len() as f32,
                    matches,
                });
            }
        }

        // Stable sort keeps declaration order on equal scores
        scores.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let top = scores.first().map(|s| s.score).unwrap_or(0.0);
        let confidence = (top * self.config.confidence_multiplier).clamp(0.0, 1.0);

        let categories: Vec<ContractCategory> = scores.iter().map(|s| s.category).collect();
        let suggested_templates = self.suggest_templates(&categories);

        debug!(
            "Detected intent: categories={:?}, confidence={:.2}, features={}",
            categories,
            confidence,
            features.len()
        );

        ContractIntent {
            categories,
            features: features.into_iter().collect(),
            confidence,
            suggested_templates,
            category_scores: scores,
        }
    }

    /// Whether the prompt asks for something contract related
    pub fn is_contract_related(&self, prompt: &str) -> bool {
        let lowered = prompt.to_lowercase();
        if DOMAIN_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return true;
        }

        let intent = self.detect_intent(prompt);
        intent.confidence > self.config.related_threshold && !intent.categories.is_empty()
    }

    /// Whether an intent is too weak to trust its categories
    pub fn is_ambiguous(&self, intent: &ContractIntent) -> bool {
        intent.categories.is_empty() || intent.confidence < self.config.ambiguity_threshold
    }

    fn suggest_templates(&self, categories: &[ContractCategory]) -> Vec<String> {
        let mut suggestions: Vec<String> = Vec::new();
        for category in categories {
            for template in category_templates(*category) {
                if suggestions.len() >= self.config.max_suggestions {
                    return suggestions;
                }
                if !suggestions.iter().any(|s| s == template) {
                    suggestions.push(template.to_string());
                }
            }
        }
        suggestions
    }
}
