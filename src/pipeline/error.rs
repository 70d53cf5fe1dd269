//! Pipeline error taxonomy

use super::schemas::PipelineStage;
use crate::context::BudgetError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while executing a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Non-fatal; reported as a warning on the analyzing step
    #[error("Intent is ambiguous (confidence {confidence:.2})")]
    ClassificationAmbiguous { confidence: f32 },

    /// Non-fatal; one skipped remote lookup
    #[error("Source fetch failed: {0}")]
    SourceFetch(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No usable contract candidates: {0}")]
    AggregationEmpty(String),

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Deploy failed: {0}")]
    Deploy(String),

    #[error("Pipeline timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid stage transition from {from} to {to}")]
    InvalidTransition {
        from: PipelineStage,
        to: PipelineStage,
    },

    /// Non-fatal; the run continues with the oversized context
    #[error("Token budget error: {0}")]
    Budget(#[from] BudgetError),
}

/// Serializable discriminant of [`PipelineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineErrorKind {
    ClassificationAmbiguous,
    SourceFetch,
    Validation,
    AggregationEmpty,
    Build,
    Deploy,
    Timeout,
    InvalidTransition,
    Budget,
}

impl PipelineError {
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            Self::ClassificationAmbiguous { .. } => PipelineErrorKind::ClassificationAmbiguous,
            Self::SourceFetch(_) => PipelineErrorKind::SourceFetch,
            Self::Validation(_) => PipelineErrorKind::Validation,
            Self::AggregationEmpty(_) => PipelineErrorKind::AggregationEmpty,
            Self::Build(_) => PipelineErrorKind::Build,
            Self::Deploy(_) => PipelineErrorKind::Deploy,
            Self::Timeout(_) => PipelineErrorKind::Timeout,
            Self::InvalidTransition { .. } => PipelineErrorKind::InvalidTransition,
            Self::Budget(_) => PipelineErrorKind::Budget,
        }
    }

    /// Whether the execution has to stop
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ClassificationAmbiguous { .. }
                | Self::SourceFetch(_)
                | Self::Validation(_)
                | Self::Budget(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serialization() {
        let err = PipelineError::Timeout(Duration::from_secs(30));
        assert_eq!(err.kind(), PipelineErrorKind::Timeout);
        assert_eq!(
            serde_json::to_string(&PipelineErrorKind::AggregationEmpty).unwrap(),
            "\"aggregation_empty\""
        );
    }

    #[test]
    fn test_fatality() {
        assert!(!PipelineError::ClassificationAmbiguous { confidence: 0.1 }.is_fatal());
        assert!(!PipelineError::Validation("x".into()).is_fatal());
        assert!(!PipelineError::SourceFetch("x".into()).is_fatal());
        assert!(!PipelineError::Budget(BudgetError::BudgetExceeded { used: 2, max: 1 }).is_fatal());
        assert!(PipelineError::Build("x".into()).is_fatal());
        assert!(PipelineError::Timeout(Duration::from_secs(1)).is_fatal());
    }

    #[test]
    fn test_sub_second_timeout_message() {
        let err = PipelineError::Timeout(Duration::from_millis(200));
        assert_eq!(err.to_string(), "Pipeline timed out after 200ms");
    }

    #[test]
    fn test_transition_message() {
        let err = PipelineError::InvalidTransition {
            from: PipelineStage::Completed,
            to: PipelineStage::Analyzing,
        };
        assert_eq!(
            err.to_string(),
            "Invalid stage transition from completed to analyzing"
        );
    }
}
