//! Bridge to an external build and deploy service
//!
//! The service reports its own stages over a channel while the call is in
//! flight; the orchestrator turns those into progress updates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// What to build and where to publish it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub module_name: String,
    pub address: String,
    pub source: String,
    pub network: String,
}

/// Stage reported by the build service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Compiling,
    Funding,
    Deploying,
    Verifying,
    Completed,
    Failed,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compiling => "compiling",
            Self::Funding => "funding",
            Self::Deploying => "deploying",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Statuses at or past this point belong to the deploying stage
    pub fn is_deploy_phase(&self) -> bool {
        matches!(self, Self::Deploying | Self::Verifying | Self::Completed)
    }
}

/// Result reported by the build service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildOutcome {
    pub fn deployed(transaction_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            deployed_address: Some(address.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Build service errors
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Compilation failed: {0}")]
    Compilation(String),

    #[error("Deployment failed: {0}")]
    Deployment(String),

    #[error("Build service unavailable: {0}")]
    Unavailable(String),
}

/// Compiles and publishes a module
///
/// Implementations own their retries. Status sends are best effort; the
/// receiver may already be gone when the pipeline timed out.
#[async_trait]
pub trait BuildDeployService: Send + Sync {
    async fn build_and_deploy(
        &self,
        request: BuildRequest,
        status: mpsc::Sender<BuildStatus>,
    ) -> Result<BuildOutcome, BuildError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_phases() {
        assert!(!BuildStatus::Compiling.is_deploy_phase());
        assert!(!BuildStatus::Funding.is_deploy_phase());
        assert!(BuildStatus::Deploying.is_deploy_phase());
        assert!(BuildStatus::Verifying.is_deploy_phase());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(BuildOutcome::deployed("0xtx", "0xcafe")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["transaction_id"], "0xtx");
        assert!(json.get("error").is_none());

        let failed = BuildOutcome::failed("out of gas");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("out of gas"));
    }
}
