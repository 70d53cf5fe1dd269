//! Token-budgeted context assembly
//!
//! Reference documents are split at headings, scored against the query and
//! packed greedily into a hard token budget. Conversation history is
//! truncated newest-first to whatever the prompt budget leaves over.

pub mod budget;
pub mod models;
pub mod token_budget;
pub mod token_estimator;

pub use budget::{AssembledContext, ContextBudgetManager, ContextConfig};
pub use models::{ContextSection, Message, Role, SectionSource};
pub use token_budget::{BudgetAllocation, BudgetError, TokenBudgetConfig, TokenBudgetManager};
pub use token_estimator::{CharRatioEstimator, TiktokenEstimator, TokenEstimator};
