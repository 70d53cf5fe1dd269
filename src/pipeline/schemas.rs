//! Data models for pipeline executions, requests and results

use super::deployer::BuildOutcome;
use super::error::{PipelineError, PipelineErrorKind};
use crate::aggregator::CandidateOrigin;
use crate::context::Message;
use crate::intent::ContractIntent;
use crate::source::{CustomizationOptions, SourceModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Forward-only execution stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Analyzing,
    FetchingContext,
    Generating,
    Building,
    Deploying,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyzing => "analyzing",
            Self::FetchingContext => "fetching-context",
            Self::Generating => "generating",
            Self::Building => "building",
            Self::Deploying => "deploying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Position in the forward order
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Analyzing => 0,
            Self::FetchingContext => 1,
            Self::Generating => 2,
            Self::Building => 3,
            Self::Deploying => 4,
            Self::Completed => 5,
            Self::Failed => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// One entry of the append-only step log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub name: String,
    #[serde(default)]
    pub status: StepStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// State of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineExecution {
    pub id: Uuid,
    pub stage: PipelineStage,
    pub progress_percent: u8,
    pub steps: Vec<ExecutionStep>,
    pub started_at: DateTime<Utc>,
}

impl PipelineExecution {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: PipelineStage::Analyzing,
            progress_percent: 0,
            steps: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Move to `next`; stages only move forward and terminal stages are
    /// final. `Failed` is reachable from any non-terminal stage.
    pub fn transition(&mut self, next: PipelineStage) -> Result<(), PipelineError> {
        let backwards = next != PipelineStage::Failed && next.ordinal() <= self.stage.ordinal();
        if self.stage.is_terminal() || backwards {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        if next == PipelineStage::Failed {
            self.progress_percent = 0;
        }
        Ok(())
    }

    /// Raise progress; lower values are ignored
    pub fn advance(&mut self, percent: u8) {
        self.progress_percent = self.progress_percent.max(percent.min(100));
    }

    pub fn push_step(
        &mut self,
        status: StepStatus,
        message: impl Into<String>,
        detail: Option<serde_json::Value>,
    ) {
        self.steps.push(ExecutionStep {
            name: self.stage.as_str().to_string(),
            status,
            message: message.into(),
            timestamp: Utc::now(),
            detail,
        });
    }
}

impl Default for PipelineExecution {
    fn default() -> Self {
        Self::new()
    }
}

/// Record pushed to progress observers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub execution_id: Uuid,
    pub stage: PipelineStage,
    pub message: String,
    pub progress_percent: u8,
    pub steps: Vec<ExecutionStep>,
}

/// One end-to-end request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub prompt: String,
    pub project_name: String,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Reference document searched first
    #[serde(default)]
    pub primary_reference: Option<String>,
    /// Reference document that loses score ties
    #[serde(default)]
    pub secondary_reference: Option<String>,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub use_remote: bool,
    /// Run the building and deploying stages
    #[serde(default)]
    pub deploy: bool,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub strip_features: Vec<String>,
    #[serde(default)]
    pub constants: BTreeMap<String, String>,
    #[serde(default)]
    pub extra_imports: Vec<String>,
}

impl PipelineRequest {
    pub fn new(prompt: impl Into<String>, project_name: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            project_name: project_name.into(),
            ..Self::default()
        }
    }

    pub fn with_reference(mut self, primary: impl Into<String>) -> Self {
        self.primary_reference = Some(primary.into());
        self
    }

    pub fn with_secondary_reference(mut self, secondary: impl Into<String>) -> Self {
        self.secondary_reference = Some(secondary.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_remote(mut self) -> Self {
        self.use_remote = true;
        self
    }

    pub fn with_deploy(mut self, network: Option<String>) -> Self {
        self.deploy = true;
        self.network = network;
        self
    }

    pub fn customization(&self) -> CustomizationOptions {
        CustomizationOptions {
            project_name: self.project_name.clone(),
            module_name: self.module_name.clone(),
            address: self.address.clone(),
            strip_features: self.strip_features.clone(),
            constants: self.constants.clone(),
            extra_imports: self.extra_imports.clone(),
        }
    }
}

/// Customized source plus everything the generating stage assembled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractBundle {
    pub candidate_id: String,
    pub origin: CandidateOrigin,
    pub source: String,
    pub model: SourceModel,
    pub intent: ContractIntent,
    /// Reference context packed for the prompt
    pub context: String,
    pub history: Vec<Message>,
}

/// Final outcome of an execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub execution_id: Uuid,
    pub success: bool,
    pub stage: PipelineStage,
    pub progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<ContractBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<BuildOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<PipelineErrorKind>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub steps: Vec<ExecutionStep>,
}
