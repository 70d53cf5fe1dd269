//! Intent classification for natural-language contract requests

pub mod classifier;
pub mod models;

pub use classifier::{IntentClassifier, IntentConfig};
pub use models::{CategoryScore, ContractCategory, ContractIntent};
