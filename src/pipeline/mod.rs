//! Prompt-to-contract pipeline
//!
//! Stages run in order (analyzing, fetching-context, generating, then the
//! optional building and deploying) and report progress through a bounded
//! channel.

pub mod config;
pub mod deployer;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod schemas;

pub use config::PipelineConfig;
pub use deployer::{BuildDeployService, BuildError, BuildOutcome, BuildRequest, BuildStatus};
pub use error::{PipelineError, PipelineErrorKind};
pub use orchestrator::PipelineOrchestrator;
pub use progress::{ExecutionTracker, ProgressSink};
pub use schemas::{
    ContractBundle, ExecutionStep, PipelineExecution, PipelineRequest, PipelineResult,
    PipelineStage, ProgressUpdate, StepStatus,
};

use crate::aggregator::{CandidateStore, ContractSourceAggregator, GithubRemoteSource, RemoteSource};
use crate::context::{ContextBudgetManager, TokenBudgetManager};
use crate::intent::IntentClassifier;
use crate::Config;
use std::sync::Arc;
use tracing::info;

/// Wire an orchestrator from configuration
pub fn build_orchestrator(
    config: &Config,
    store: Arc<dyn CandidateStore>,
    deployer: Option<Arc<dyn BuildDeployService>>,
) -> crate::Result<PipelineOrchestrator> {
    info!("Initializing contract pipeline");
    config.validate()?;

    let remote: Arc<dyn RemoteSource> = Arc::new(GithubRemoteSource::new(config.remote.clone())?);
    let credentials = config.remote.credentials().map(Arc::new);
    if credentials.is_none() {
        info!(
            "{} not set; remote requests are unauthenticated",
            config.remote.token_env
        );
    }

    let aggregator =
        ContractSourceAggregator::new(store, Some(remote), config.aggregator.clone());

    let mut orchestrator = PipelineOrchestrator::new(aggregator, config.pipeline.clone())
        .with_classifier(IntentClassifier::new(config.intent.clone()))
        .with_context_manager(ContextBudgetManager::new(config.context.clone()))
        .with_token_budget(TokenBudgetManager::new(config.token_budget.clone())?)
        .with_credentials(credentials);

    match deployer {
        Some(deployer) => orchestrator = orchestrator.with_deployer(deployer),
        None => info!("No build service configured; deploy requests will fail"),
    }

    info!("Contract pipeline initialized");
    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::InMemoryCandidateStore;

    #[tokio::test]
    async fn test_build_orchestrator_from_defaults() {
        let config = Config::default();
        let store = Arc::new(InMemoryCandidateStore::with_builtin_templates());

        let orchestrator = build_orchestrator(&config, store, None).unwrap();
        assert_eq!(orchestrator.config().timeout_secs, 30);

        let result = orchestrator
            .execute(
                PipelineRequest::new("Launch a fungible token with burning", "coin"),
                None,
            )
            .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.bundle.unwrap().candidate_id, "fungible_token");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.pipeline.timeout_secs = 0;
        let store = Arc::new(InMemoryCandidateStore::new());
        assert!(build_orchestrator(&config, store, None).is_err());
    }
}
