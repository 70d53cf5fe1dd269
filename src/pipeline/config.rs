//! Configuration for pipeline execution

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Wall-clock budget for one execution, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Buffered progress updates per execution
    #[serde(default = "default_progress_capacity")]
    pub progress_capacity: usize,

    /// How long a progress send may wait on a full channel
    #[serde(default = "default_progress_send_timeout_ms")]
    pub progress_send_timeout_ms: u64,

    /// Buffered build status messages from the build service
    #[serde(default = "default_build_status_capacity")]
    pub build_status_capacity: usize,

    /// Network used when the request names none
    #[serde(default = "default_network")]
    pub default_network: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_progress_capacity() -> usize {
    32
}

fn default_progress_send_timeout_ms() -> u64 {
    250
}

fn default_build_status_capacity() -> usize {
    16
}

fn default_network() -> String {
    "testnet".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            progress_capacity: default_progress_capacity(),
            progress_send_timeout_ms: default_progress_send_timeout_ms(),
            build_status_capacity: default_build_status_capacity(),
            default_network: default_network(),
        }
    }
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn progress_send_timeout(&self) -> Duration {
        Duration::from_millis(self.progress_send_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.progress_send_timeout(), Duration::from_millis(250));
        assert_eq!(config.default_network, "testnet");
    }

    #[test]
    fn test_partial_deserialize() {
        let config: PipelineConfig = serde_json::from_str(r#"{"timeout_secs": 5}"#).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.progress_capacity, 32);
    }
}
