//! Per-prompt token budget
//!
//! The prompt window is split into fixed shares:
//! - System/Instructions: 600-800 tokens
//! - Conversation history: 1,000-2,000 tokens
//! - Reference context: 3,000-4,500 tokens
//! - Completion: 800-1,200 tokens
//! - Total: ≤8,000 tokens

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBudgetConfig {
    #[serde(default = "default_system_tokens")]
    pub system_tokens: usize,
    #[serde(default = "default_history_tokens")]
    pub history_tokens: usize,
    #[serde(default = "default_reference_context")]
    pub reference_context: usize,
    #[serde(default = "default_completion")]
    pub completion: usize,
    #[serde(default = "default_max_total")]
    pub max_total: usize,
}

fn default_system_tokens() -> usize {
    700
}

fn default_history_tokens() -> usize {
    1500
}

fn default_reference_context() -> usize {
    3750
}

fn default_completion() -> usize {
    1000
}

fn default_max_total() -> usize {
    8000
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self {
            system_tokens: default_system_tokens(),
            history_tokens: default_history_tokens(),
            reference_context: default_reference_context(),
            completion: default_completion(),
            max_total: default_max_total(),
        }
    }
}

impl TokenBudgetConfig {
    /// Validate that the budget configuration is consistent
    pub fn validate(&self) -> Result<(), BudgetError> {
        let total =
            self.system_tokens + self.history_tokens + self.reference_context + self.completion;

        if total > self.max_total {
            return Err(BudgetError::ConfigurationInvalid {
                allocated: total,
                max: self.max_total,
            });
        }

        Ok(())
    }
}

/// Budget allocation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub system_tokens: usize,
    pub history_tokens: usize,
    pub reference_context: usize,
    pub completion: usize,
    pub total_allocated: usize,
    pub remaining: usize,
}

impl BudgetAllocation {
    /// Check if this allocation fits within the budget
    pub fn is_within_budget(&self, max_total: usize) -> bool {
        self.total_allocated <= max_total
    }
}

/// Token budget errors
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("Budget exceeded: {used} tokens used, {max} tokens allowed")]
    BudgetExceeded { used: usize, max: usize },

    #[error("Configuration invalid: {allocated} tokens allocated, {max} tokens max")]
    ConfigurationInvalid { allocated: usize, max: usize },

    #[error("Token estimation failed: {0}")]
    EstimationFailed(String),
}

/// Token budget manager
#[derive(Debug, Clone)]
pub struct TokenBudgetManager {
    config: TokenBudgetConfig,
}

impl TokenBudgetManager {
    /// Create a new token budget manager
    pub fn new(config: TokenBudgetConfig) -> Result<Self, BudgetError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Allocate tokens based on current usage
    pub fn allocate(
        &self,
        system_used: usize,
        history_used: usize,
        context_used: usize,
        completion_used: usize,
    ) -> Result<BudgetAllocation, BudgetError> {
        let total = system_used + history_used + context_used + completion_used;

        if total > self.config.max_total {
            return Err(BudgetError::BudgetExceeded {
                used: total,
                max: self.config.max_total,
            });
        }

        Ok(BudgetAllocation {
            system_tokens: system_used,
            history_tokens: history_used,
            reference_context: context_used,
            completion: completion_used,
            total_allocated: total,
            remaining: self.config.max_total - total,
        })
    }

    /// Check if a given token count fits within the budget
    pub fn check_budget(&self, tokens: usize) -> Result<(), BudgetError> {
        if tokens > self.config.max_total {
            return Err(BudgetError::BudgetExceeded {
                used: tokens,
                max: self.config.max_total,
            });
        }
        Ok(())
    }

    /// Tokens that must stay free while packing history, given the
    /// reference context already placed
    pub fn reserved_for_history(&self, context_used: usize) -> usize {
        self.config.system_tokens + self.config.completion + context_used
    }

    /// Get the maximum allowed tokens for reference context
    pub fn max_reference_context(&self) -> usize {
        self.config.reference_context
    }

    /// Get the maximum total tokens
    pub fn max_total(&self) -> usize {
        self.config.max_total
    }

    /// Get the configuration
    pub fn config(&self) -> &TokenBudgetConfig {
        &self.config
    }
}

impl Default for TokenBudgetManager {
    fn default() -> Self {
        Self {
            config: TokenBudgetConfig::default(),
        }
    }
}
