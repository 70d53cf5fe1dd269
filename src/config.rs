//! Top-level configuration
//!
//! Every section carries serde defaults so a partial (or missing) file is
//! valid. Values are layered: defaults, then the optional TOML file, then
//! `FORGE__<SECTION>__<KEY>` environment variables.

use crate::aggregator::{AggregatorConfig, RemoteConfig};
use crate::context::{ContextConfig, TokenBudgetConfig};
use crate::error::{ForgeError, Result};
use crate::intent::IntentConfig;
use crate::pipeline::PipelineConfig;
use crate::telemetry::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub intent: IntentConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub token_budget: TokenBudgetConfig,

    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env is the normal case outside development
        let _ = dotenvy::dotenv();

        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let raw = builder
            .add_source(
                ::config::Environment::with_prefix("FORGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = raw.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    /// Parse from an in-memory TOML string (no environment layer)
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw = ::config::Config::builder()
            .add_source(::config::File::from_str(contents, ::config::FileFormat::Toml))
            .build()?;

        let config: Config = raw.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<()> {
        self.token_budget.validate()?;

        if self.context.chars_per_token <= 0.0 {
            return Err(ForgeError::Configuration(
                "context.chars_per_token must be positive".to_string(),
            ));
        }

        if self.aggregator.max_candidates == 0 {
            return Err(ForgeError::Configuration(
                "aggregator.max_candidates must be at least 1".to_string(),
            ));
        }

        if self.aggregator.min_candidates > self.aggregator.max_candidates {
            return Err(ForgeError::Configuration(format!(
                "aggregator.min_candidates ({}) exceeds max_candidates ({})",
                self.aggregator.min_candidates, self.aggregator.max_candidates
            )));
        }

        if !self.aggregator.remote_path_template.contains("{id}") {
            return Err(ForgeError::Configuration(
                "aggregator.remote_path_template must contain {id}".to_string(),
            ));
        }

        if self.pipeline.timeout_secs == 0 {
            return Err(ForgeError::Configuration(
                "pipeline.timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
