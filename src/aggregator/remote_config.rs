//! Configuration for the GitHub remote source

use super::remote::RemoteCredentials;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Raw file host
    #[serde(default = "default_raw_base_url")]
    pub raw_base_url: String,

    /// REST API host, used for code search
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// `owner/name` of the repository holding contract sources
    #[serde(default = "default_repository")]
    pub repository: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    /// Base backoff in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_fetches: usize,

    /// Results requested per code search
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    #[serde(default = "default_breaker_failures")]
    pub circuit_breaker_failures: usize,

    #[serde(default = "default_breaker_reset")]
    pub circuit_breaker_reset_secs: u64,
}

fn default_raw_base_url() -> String { "https://raw.githubusercontent.com".to_string() }
fn default_api_base_url() -> String { "https://api.github.com".to_string() }
fn default_repository() -> String { "aptos-labs/aptos-core".to_string() }
fn default_branch() -> String { "main".to_string() }
fn default_token_env() -> String { "GITHUB_TOKEN".to_string() }
fn default_user_agent() -> String { concat!("contract-forge/", env!("CARGO_PKG_VERSION")).to_string() }
fn default_timeout_ms() -> u64 { 10_000 }
fn default_retry_attempts() -> usize { 2 }
fn default_retry_backoff_ms() -> u64 { 200 }
fn default_max_concurrent() -> usize { 4 }
fn default_search_limit() -> usize { 5 }
fn default_breaker_failures() -> usize { 5 }
fn default_breaker_reset() -> u64 { 30 }

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            raw_base_url: default_raw_base_url(),
            api_base_url: default_api_base_url(),
            repository: default_repository(),
            branch: default_branch(),
            token_env: default_token_env(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_concurrent_fetches: default_max_concurrent(),
            search_limit: default_search_limit(),
            circuit_breaker_failures: default_breaker_failures(),
            circuit_breaker_reset_secs: default_breaker_reset(),
        }
    }
}

impl RemoteConfig {
    /// Credentials from the configured environment variable, if set
    pub fn credentials(&self) -> Option<RemoteCredentials> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(RemoteCredentials::new)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn breaker_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_reset_secs)
    }
}
