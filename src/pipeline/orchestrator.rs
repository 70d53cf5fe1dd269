//! Staged prompt-to-contract orchestrator

use super::config::PipelineConfig;
use super::deployer::{BuildDeployService, BuildOutcome, BuildRequest, BuildStatus};
use super::error::PipelineError;
use super::progress::{ExecutionTracker, ProgressSink};
use super::schemas::{
    ContractBundle, PipelineRequest, PipelineResult, PipelineStage, ProgressUpdate,
};
use crate::aggregator::{
    ContractCandidate, ContractSourceAggregator, FetchOptions, RemoteCredentials,
};
use crate::context::{ContextBudgetManager, Message, TokenBudgetManager};
use crate::intent::{ContractIntent, IntentClassifier};
use crate::metrics::METRICS;
use crate::source::{CustomizationOptions, SourceCustomizer, SourceModelExtractor};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Output of the fetching-context stage
struct PreparedContext {
    text: String,
    history: Vec<Message>,
}

/// Whatever an execution produced before it ended
#[derive(Default)]
struct RunState {
    warnings: Vec<String>,
    bundle: Option<ContractBundle>,
    deployment: Option<BuildOutcome>,
}

impl RunState {
    /// Record a non-fatal error as a warning; fatal ones are handed back
    fn absorb(&mut self, err: PipelineError) -> Result<(), PipelineError> {
        if err.is_fatal() {
            return Err(err);
        }
        warn!("{}", err);
        self.warnings.push(err.to_string());
        Ok(())
    }
}

/// Candidate that passed validation, possibly after a repair
struct UsableCandidate {
    candidate: ContractCandidate,
    source: String,
}

/// Drives one request through every pipeline stage
pub struct PipelineOrchestrator {
    classifier: IntentClassifier,
    context: ContextBudgetManager,
    budget: TokenBudgetManager,
    aggregator: ContractSourceAggregator,
    extractor: SourceModelExtractor,
    customizer: SourceCustomizer,
    deployer: Option<Arc<dyn BuildDeployService>>,
    credentials: Option<Arc<RemoteCredentials>>,
    config: PipelineConfig,
    timeout: Duration,
}

impl PipelineOrchestrator {
    pub fn new(aggregator: ContractSourceAggregator, config: PipelineConfig) -> Self {
        let extractor = SourceModelExtractor::default();
        Self {
            classifier: IntentClassifier::default(),
            context: ContextBudgetManager::default(),
            budget: TokenBudgetManager::default(),
            aggregator,
            customizer: SourceCustomizer::new(extractor.clone()),
            extractor,
            deployer: None,
            credentials: None,
            timeout: config.timeout(),
            config,
        }
    }

    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_context_manager(mut self, context: ContextBudgetManager) -> Self {
        self.context = context;
        self
    }

    pub fn with_token_budget(mut self, budget: TokenBudgetManager) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_extractor(mut self, extractor: SourceModelExtractor) -> Self {
        self.customizer = SourceCustomizer::new(extractor.clone());
        self.extractor = extractor;
        self
    }

    pub fn with_deployer(mut self, deployer: Arc<dyn BuildDeployService>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Arc<RemoteCredentials>>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Override the configured wall-clock budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &ContractSourceAggregator {
        &self.aggregator
    }

    /// Open a progress channel sized from the configuration
    pub fn progress_channel(&self) -> (ProgressSink, mpsc::Receiver<ProgressUpdate>) {
        ProgressSink::channel(
            self.config.progress_capacity,
            self.config.progress_send_timeout(),
        )
    }

    /// Run `request` to completion or failure
    ///
    /// Never returns an error: failures end up in the result together with
    /// the step log.
    pub async fn execute(
        &self,
        request: PipelineRequest,
        progress: Option<ProgressSink>,
    ) -> PipelineResult {
        let started = Instant::now();
        let mut tracker = ExecutionTracker::new(progress);
        let mut state = RunState::default();
        info!(
            "Starting execution {} for project '{}'",
            tracker.execution().id,
            request.project_name
        );

        let stages = self.run_stages(&request, &mut tracker, &mut state);
        let outcome = match tokio::time::timeout(self.timeout, stages).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(self.timeout)),
        };

        let (success, error) = match outcome {
            Ok(()) => match tracker.finish("Pipeline completed").await {
                Ok(()) => (true, None),
                Err(err) => (false, Some(err)),
            },
            Err(err) => (false, Some(err)),
        };

        if let Some(err) = &error {
            error!(
                "Execution {} failed at {}: {}",
                tracker.execution().id,
                tracker.stage(),
                err
            );
            tracker.fail(err).await;
        } else {
            info!(
                "Execution {} completed in {:?}",
                tracker.execution().id,
                started.elapsed()
            );
        }
        METRICS.record_execution(success);

        let execution = tracker.into_execution();
        PipelineResult {
            execution_id: execution.id,
            success,
            stage: execution.stage,
            progress_percent: execution.progress_percent,
            bundle: state.bundle,
            deployment: state.deployment,
            error: error.as_ref().map(|e| e.to_string()),
            error_kind: error.as_ref().map(|e| e.kind()),
            warnings: state.warnings,
            steps: execution.steps,
        }
    }

    async fn run_stages(
        &self,
        request: &PipelineRequest,
        tracker: &mut ExecutionTracker,
        state: &mut RunState,
    ) -> Result<(), PipelineError> {
        let intent = self.analyze(request, tracker, state).await?;
        let prepared = self.prepare_context(request, tracker, state).await?;
        let bundle = self
            .generate(request, &intent, prepared, tracker, state)
            .await?;

        if request.deploy {
            let build_request = BuildRequest {
                module_name: bundle.model.module_name.clone(),
                address: bundle.model.address.clone(),
                source: bundle.source.clone(),
                network: request
                    .network
                    .clone()
                    .unwrap_or_else(|| self.config.default_network.clone()),
            };
            state.bundle = Some(bundle);
            let outcome = self.build_and_deploy(build_request, tracker).await?;
            state.deployment = Some(outcome);
        } else {
            state.bundle = Some(bundle);
        }

        Ok(())
    }

    async fn analyze(
        &self,
        request: &PipelineRequest,
        tracker: &mut ExecutionTracker,
        state: &mut RunState,
    ) -> Result<ContractIntent, PipelineError> {
        tracker
            .begin(PipelineStage::Analyzing, 0, "Classifying request")
            .await?;

        let intent = self.classifier.detect_intent(&request.prompt);
        let mut detail = serde_json::json!({
            "categories": intent.categories,
            "features": intent.features,
            "confidence": intent.confidence,
        });

        if self.classifier.is_ambiguous(&intent) {
            let warning = PipelineError::ClassificationAmbiguous {
                confidence: intent.confidence,
            };
            detail["warning"] = serde_json::Value::String(warning.to_string());
            state.absorb(warning)?;
        }

        info!(
            "Classified request as {:?} (confidence {:.2})",
            intent.categories, intent.confidence
        );
        tracker.complete(10, "Request classified", Some(detail)).await;
        Ok(intent)
    }

    async fn prepare_context(
        &self,
        request: &PipelineRequest,
        tracker: &mut ExecutionTracker,
        state: &mut RunState,
    ) -> Result<PreparedContext, PipelineError> {
        tracker
            .begin(PipelineStage::FetchingContext, 20, "Assembling reference context")
            .await?;

        let assembled = match request.primary_reference.as_deref() {
            Some(primary) => self.context.assemble_from_sources(
                &request.prompt,
                primary,
                request.secondary_reference.as_deref(),
                self.budget.max_reference_context(),
            ),
            None => match request.secondary_reference.as_deref() {
                Some(secondary) => self.context.assemble_from_sources(
                    &request.prompt,
                    "",
                    Some(secondary),
                    self.budget.max_reference_context(),
                ),
                None => Default::default(),
            },
        };
        tracker.notify(30, "Reference context assembled").await;

        let history = self.context.truncate_history(
            &request.history,
            self.budget.reserved_for_history(assembled.estimated_tokens),
            self.budget.max_total(),
        );
        let history_tokens: usize = history
            .iter()
            .map(|message| {
                let serialized = serde_json::to_string(message)
                    .unwrap_or_else(|_| message.content.clone());
                self.context.estimate(&serialized)
            })
            .sum();

        // The newest message is always kept, so history alone can overflow
        let budget_config = self.budget.config();
        let remaining = match self.budget.allocate(
            budget_config.system_tokens,
            history_tokens,
            assembled.estimated_tokens,
            budget_config.completion,
        ) {
            Ok(allocation) => {
                debug!(
                    "Token allocation: {} used, {} remaining",
                    allocation.total_allocated, allocation.remaining
                );
                allocation.remaining
            }
            Err(err) => {
                state.absorb(PipelineError::Budget(err))?;
                0
            }
        };

        let detail = serde_json::json!({
            "topics": assembled.topics,
            "context_tokens": assembled.estimated_tokens,
            "truncated": assembled.truncated,
            "history_kept": history.len(),
            "history_dropped": request.history.len() - history.len(),
            "remaining_tokens": remaining,
        });
        tracker.complete(40, "Context ready", Some(detail)).await;

        Ok(PreparedContext {
            text: assembled.text,
            history,
        })
    }

    async fn generate(
        &self,
        request: &PipelineRequest,
        intent: &ContractIntent,
        prepared: PreparedContext,
        tracker: &mut ExecutionTracker,
        state: &mut RunState,
    ) -> Result<ContractBundle, PipelineError> {
        tracker
            .begin(PipelineStage::Generating, 40, "Retrieving contract candidates")
            .await?;

        let options = if request.use_remote {
            FetchOptions::with_remote(self.credentials.clone())
        } else {
            FetchOptions::local_only()
        };
        let aggregation = self.aggregator.aggregate(intent, &options).await;
        for skipped in aggregation.skipped {
            state.absorb(PipelineError::SourceFetch(skipped))?;
        }
        let candidates = aggregation.candidates;
        if candidates.is_empty() {
            return Err(PipelineError::AggregationEmpty(format!(
                "no candidates for {:?}",
                intent.categories
            )));
        }
        tracker
            .notify(45, &format!("Retrieved {} candidates", candidates.len()))
            .await;

        let customization = request.customization();
        let usable = self.validate_candidates(candidates, &customization, state)?;
        tracker
            .notify(50, &format!("{} candidates passed validation", usable.len()))
            .await;

        for UsableCandidate { candidate, source } in usable {
            let customized = self.customizer.customize(&source, &customization);
            let model = self.extractor.extract_model(&customized);
            if !model.is_valid {
                state.absorb(PipelineError::Validation(format!(
                    "customized {} is invalid: {}",
                    candidate.id,
                    model.diagnostics.join("; ")
                )))?;
                continue;
            }

            info!(
                "Selected candidate {} ({}) as {}",
                candidate.id,
                candidate.origin.as_str(),
                model.qualified_name()
            );
            let detail = serde_json::json!({
                "candidate": candidate.id,
                "origin": candidate.origin,
                "module": model.qualified_name(),
                "functions": model.functions.len(),
            });
            tracker
                .complete(60, "Contract source generated", Some(detail))
                .await;

            return Ok(ContractBundle {
                candidate_id: candidate.id,
                origin: candidate.origin,
                source: customized,
                model,
                intent: intent.clone(),
                context: prepared.text,
                history: prepared.history,
            });
        }

        Err(PipelineError::AggregationEmpty(
            "no candidate survived validation and customization".to_string(),
        ))
    }

    /// Validate every candidate, giving invalid ones a single repair pass
    fn validate_candidates(
        &self,
        candidates: Vec<ContractCandidate>,
        customization: &CustomizationOptions,
        state: &mut RunState,
    ) -> Result<Vec<UsableCandidate>, PipelineError> {
        let mut usable = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let model = self.extractor.extract_model(&candidate.source);
            if model.is_valid {
                METRICS.record_validation("valid");
                let source = candidate.source.clone();
                usable.push(UsableCandidate { candidate, source });
                continue;
            }

            let repaired = self
                .customizer
                .repair(&candidate.source, &model, customization);
            let repaired_model = self.extractor.extract_model(&repaired);
            if repaired_model.is_valid {
                debug!("Repaired candidate {}", candidate.id);
                METRICS.record_validation("repaired");
                usable.push(UsableCandidate {
                    candidate,
                    source: repaired,
                });
            } else {
                METRICS.record_validation("dropped");
                state.absorb(PipelineError::Validation(format!(
                    "dropped candidate {}: {}",
                    candidate.id,
                    repaired_model.diagnostics.join("; ")
                )))?;
            }
        }

        Ok(usable)
    }

    async fn build_and_deploy(
        &self,
        build_request: BuildRequest,
        tracker: &mut ExecutionTracker,
    ) -> Result<BuildOutcome, PipelineError> {
        tracker
            .begin(PipelineStage::Building, 60, "Building contract")
            .await?;

        let Some(deployer) = self.deployer.clone() else {
            return Err(PipelineError::Build(
                "no build service configured".to_string(),
            ));
        };

        info!(
            "Building {}::{} for {}",
            build_request.address, build_request.module_name, build_request.network
        );
        let (tx, mut rx) = mpsc::channel(self.config.build_status_capacity.max(1));
        let call = deployer.build_and_deploy(build_request, tx);
        tokio::pin!(call);

        let result = loop {
            tokio::select! {
                result = &mut call => break result,
                Some(status) = rx.recv() => self.on_build_status(status, tracker).await?,
            }
        };
        while let Ok(status) = rx.try_recv() {
            self.on_build_status(status, tracker).await?;
        }

        let outcome = match result {
            Ok(outcome) if outcome.success => outcome,
            Ok(outcome) => {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "build service reported failure".to_string());
                return Err(self.build_failure(tracker.stage(), message));
            }
            Err(err) => return Err(self.build_failure(tracker.stage(), err.to_string())),
        };

        self.enter_deploying(tracker).await?;
        let detail = serde_json::to_value(&outcome).ok();
        tracker.complete(100, "Contract deployed", detail).await;
        Ok(outcome)
    }

    async fn on_build_status(
        &self,
        status: BuildStatus,
        tracker: &mut ExecutionTracker,
    ) -> Result<(), PipelineError> {
        debug!("Build service status: {}", status.as_str());
        if status.is_deploy_phase() {
            self.enter_deploying(tracker).await?;
        }

        let (percent, message) = match status {
            BuildStatus::Compiling => (65, "Compiling"),
            BuildStatus::Funding => (70, "Funding deployer account"),
            BuildStatus::Deploying => (85, "Submitting transaction"),
            BuildStatus::Verifying => (90, "Verifying deployment"),
            BuildStatus::Completed => (95, "Build service finished"),
            BuildStatus::Failed => (0, "Build service reported failure"),
        };
        tracker.notify(percent, message).await;
        Ok(())
    }

    /// Close the building stage and open deploying, once
    async fn enter_deploying(&self, tracker: &mut ExecutionTracker) -> Result<(), PipelineError> {
        if tracker.stage() == PipelineStage::Building {
            tracker.complete(80, "Build finished", None).await;
            tracker
                .begin(PipelineStage::Deploying, 80, "Deploying contract")
                .await?;
        }
        Ok(())
    }

    fn build_failure(&self, stage: PipelineStage, message: String) -> PipelineError {
        if stage == PipelineStage::Deploying {
            PipelineError::Deploy(message)
        } else {
            PipelineError::Build(message)
        }
    }
}
