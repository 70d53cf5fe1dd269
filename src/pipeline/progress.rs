//! Push-based progress reporting

use super::error::PipelineError;
use super::schemas::{PipelineExecution, PipelineStage, ProgressUpdate, StepStatus};
use crate::metrics::METRICS;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Bounded progress channel
///
/// A send waits at most `send_timeout` for room; after that, or once the
/// receiver is gone, the update is dropped so a slow observer never stalls
/// the pipeline.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressUpdate>,
    send_timeout: Duration,
}

impl ProgressSink {
    pub fn channel(
        capacity: usize,
        send_timeout: Duration,
    ) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, send_timeout }, rx)
    }

    /// Deliver `update`, dropping it on timeout or a closed receiver
    pub async fn send(&self, update: ProgressUpdate) -> bool {
        match self.tx.send_timeout(update, self.send_timeout).await {
            Ok(()) => true,
            Err(mpsc::error::SendTimeoutError::Timeout(update)) => {
                warn!(
                    "Progress observer too slow; dropped {} update at {}%",
                    update.stage, update.progress_percent
                );
                false
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                debug!("Progress observer gone; update dropped");
                false
            }
        }
    }
}

/// Owns one execution's step log and publishes every change
pub struct ExecutionTracker {
    execution: PipelineExecution,
    sink: Option<ProgressSink>,
    stage_started: Instant,
}

impl ExecutionTracker {
    pub fn new(sink: Option<ProgressSink>) -> Self {
        Self {
            execution: PipelineExecution::new(),
            sink,
            stage_started: Instant::now(),
        }
    }

    pub fn execution(&self) -> &PipelineExecution {
        &self.execution
    }

    pub fn into_execution(self) -> PipelineExecution {
        self.execution
    }

    pub fn stage(&self) -> PipelineStage {
        self.execution.stage
    }

    /// Enter `stage` and log a running step
    pub async fn begin(
        &mut self,
        stage: PipelineStage,
        percent: u8,
        message: &str,
    ) -> Result<(), PipelineError> {
        // The execution is created in the first stage
        if !(self.execution.steps.is_empty() && self.execution.stage == stage) {
            self.execution.transition(stage)?;
        }
        self.stage_started = Instant::now();
        self.execution.advance(percent);
        self.execution.push_step(StepStatus::Running, message, None);
        self.publish(message).await;
        Ok(())
    }

    /// Log a completed step for the current stage
    pub async fn complete(
        &mut self,
        percent: u8,
        message: &str,
        detail: Option<serde_json::Value>,
    ) {
        METRICS.record_stage(
            self.execution.stage.as_str(),
            self.stage_started.elapsed().as_secs_f64(),
        );
        self.execution.advance(percent);
        self.execution.push_step(StepStatus::Completed, message, detail);
        self.publish(message).await;
    }

    /// Progress notification without a step
    pub async fn notify(&mut self, percent: u8, message: &str) {
        self.execution.advance(percent);
        self.publish(message).await;
    }

    /// Terminal success
    pub async fn finish(&mut self, message: &str) -> Result<(), PipelineError> {
        self.execution.transition(PipelineStage::Completed)?;
        self.execution.advance(100);
        self.publish(message).await;
        Ok(())
    }

    /// Log the failure on the current stage and enter `failed`
    pub async fn fail(&mut self, error: &PipelineError) {
        let message = error.to_string();
        let detail = serde_json::json!({ "kind": error.kind() });
        self.execution
            .push_step(StepStatus::Failed, message.clone(), Some(detail));
        if self.execution.transition(PipelineStage::Failed).is_err() {
            warn!(
                "Execution {} already terminal at {}",
                self.execution.id, self.execution.stage
            );
        }
        self.publish(&message).await;
    }

    async fn publish(&self, message: &str) {
        let Some(sink) = &self.sink else {
            return;
        };
        let update = ProgressUpdate {
            execution_id: self.execution.id,
            stage: self.execution.stage,
            message: message.to_string(),
            progress_percent: self.execution.progress_percent,
            steps: self.execution.steps.clone(),
        };
        sink.send(update).await;
    }
}
