//! Contract candidate retrieval
//!
//! Candidates come from a local keyed store first and, when there are too
//! few of them, from a remote source. Both origins are cached with their
//! own TTL.

pub mod cache;
pub mod circuit_breaker;
pub mod models;
pub mod remote;
pub mod remote_config;
pub mod service;
pub mod store;
pub mod templates;

pub use cache::CandidateCache;
pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use models::{CandidateOrigin, ContractCandidate, StoreStats};
pub use remote::{GithubRemoteSource, RemoteCredentials, RemoteError, RemoteSource};
pub use remote_config::RemoteConfig;
pub use service::{Aggregation, AggregatorConfig, ContractSourceAggregator, FetchOptions};
pub use store::{CandidateStore, InMemoryCandidateStore, StoreError};
pub use templates::builtin_templates;
