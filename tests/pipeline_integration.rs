//! End-to-end pipeline tests with in-process collaborators
//!
//! The store is the in-memory implementation; the remote source and the
//! build service are scripted mocks.

use async_trait::async_trait;
use contract_forge::aggregator::{
    builtin_templates, AggregatorConfig, CandidateOrigin, CandidateStore, ContractCandidate,
    ContractSourceAggregator, FetchOptions, InMemoryCandidateStore, RemoteCredentials,
    RemoteError, RemoteSource,
};
use contract_forge::intent::{ContractCategory, IntentClassifier};
use contract_forge::pipeline::{
    BuildDeployService, BuildError, BuildOutcome, BuildRequest, BuildStatus, PipelineConfig,
    PipelineErrorKind, PipelineOrchestrator, PipelineRequest, PipelineStage, ProgressUpdate,
    StepStatus,
};
use contract_forge::context::Message;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const NFT_PROMPT: &str = "Create an NFT collection with minting";

#[derive(Default)]
struct CountingRemote {
    fetches: AtomicUsize,
    searches: AtomicUsize,
}

#[async_trait]
impl RemoteSource for CountingRemote {
    async fn fetch_by_path(
        &self,
        path: &str,
        _credentials: Option<&RemoteCredentials>,
    ) -> Result<ContractCandidate, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let id = contract_forge::aggregator::remote::candidate_id(path);
        let source = format!(
            "module 0x1::{id} {{\n    use std::signer;\n\n    public entry fun mint(account: &signer) {{\n        let _ = signer::address_of(account);\n    }}\n}}\n"
        );
        Ok(ContractCandidate::new(id, ContractCategory::Utility, source)
            .with_origin(CandidateOrigin::Remote)
            .with_tags(["github"]))
    }

    async fn search_by_pattern(
        &self,
        _pattern: &str,
        _credentials: Option<&RemoteCredentials>,
    ) -> Result<Vec<String>, RemoteError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

/// Records what it was asked to build and replays a fixed status script
struct RecordingDeployer {
    requests: Mutex<Vec<BuildRequest>>,
}

#[async_trait]
impl BuildDeployService for RecordingDeployer {
    async fn build_and_deploy(
        &self,
        request: BuildRequest,
        status: mpsc::Sender<BuildStatus>,
    ) -> Result<BuildOutcome, BuildError> {
        let address = request.address.clone();
        self.requests
            .lock()
            .map_err(|e| BuildError::Unavailable(e.to_string()))?
            .push(request);
        for s in [
            BuildStatus::Compiling,
            BuildStatus::Funding,
            BuildStatus::Deploying,
            BuildStatus::Verifying,
            BuildStatus::Completed,
        ] {
            let _ = status.send(s).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(BuildOutcome::deployed("0xabc", address))
    }
}

async fn store_with(ids: &[&str]) -> InMemoryCandidateStore {
    let store = InMemoryCandidateStore::new();
    for candidate in builtin_templates() {
        if ids.contains(&candidate.id.as_str()) {
            store.add(candidate).await.unwrap();
        }
    }
    store
}

fn orchestrator_with(
    store: InMemoryCandidateStore,
    remote: Option<Arc<dyn RemoteSource>>,
) -> PipelineOrchestrator {
    let aggregator = ContractSourceAggregator::new(Arc::new(store), remote, AggregatorConfig::default());
    PipelineOrchestrator::new(aggregator, PipelineConfig::default())
}

async fn collect(mut rx: mpsc::Receiver<ProgressUpdate>) -> Vec<ProgressUpdate> {
    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        updates.push(update);
    }
    updates
}

#[tokio::test]
async fn local_only_returns_exactly_the_local_candidates() {
    let store = store_with(&["nft_collection", "fungible_token"]).await;
    let remote = Arc::new(CountingRemote::default());
    let aggregator = ContractSourceAggregator::new(
        Arc::new(store),
        Some(remote.clone() as Arc<dyn RemoteSource>),
        AggregatorConfig::default(),
    );
    let intent = IntentClassifier::default()
        .detect_intent("An NFT collection plus a fungible token for rewards");

    let candidates = aggregator
        .fetch_candidates(&intent, &FetchOptions::local_only())
        .await;

    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|c| c.origin == CandidateOrigin::Local));
    assert_eq!(remote.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(remote.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn remote_candidates_follow_locals() {
    let store = store_with(&["nft_collection"]).await;
    let remote = Arc::new(CountingRemote::default());
    let aggregator = ContractSourceAggregator::new(
        Arc::new(store),
        Some(remote.clone() as Arc<dyn RemoteSource>),
        AggregatorConfig::default(),
    );
    let intent = IntentClassifier::default().detect_intent(NFT_PROMPT);

    let candidates = aggregator
        .fetch_candidates(&intent, &FetchOptions::with_remote(None))
        .await;

    // The remote copy of nft_collection is a duplicate id and is dropped
    let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["nft_collection", "digital_asset"]);
    assert_eq!(candidates[1].origin, CandidateOrigin::Remote);
    assert_eq!(candidates[1].category, ContractCategory::Nft);
    assert!(candidates.len() <= 5);

    // Second lookup is served from the remote cache
    let fetches = remote.fetches.load(Ordering::SeqCst);
    aggregator
        .fetch_candidates(&intent, &FetchOptions::with_remote(None))
        .await;
    assert_eq!(remote.fetches.load(Ordering::SeqCst), fetches);
}

#[tokio::test]
async fn nft_prompt_runs_end_to_end_with_deploy() {
    let store = store_with(&["nft_collection", "nft_marketplace"]).await;
    let deployer = Arc::new(RecordingDeployer {
        requests: Mutex::new(Vec::new()),
    });
    let orchestrator = orchestrator_with(store, None).with_deployer(deployer.clone());
    let (sink, rx) = orchestrator.progress_channel();
    let observer = tokio::spawn(collect(rx));

    let request = PipelineRequest::new(NFT_PROMPT, "Space Cats")
        .with_address("0xcafe")
        .with_reference("# Minting\nUse mint to create tokens.\n\n# Fees\nGas details.")
        .with_history(vec![Message::user("I want NFTs"), Message::assistant("Sure")])
        .with_deploy(Some("devnet".to_string()));

    let result = orchestrator.execute(request, Some(sink)).await;
    let updates = observer.await.unwrap();

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.stage, PipelineStage::Completed);

    let bundle = result.bundle.as_ref().unwrap();
    assert_eq!(bundle.candidate_id, "nft_collection");
    assert_eq!(bundle.model.qualified_name(), "0xcafe::space_cats");
    assert!(bundle.source.contains("module 0xcafe::space_cats"));

    let requests = deployer.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].module_name, "space_cats");
    assert_eq!(requests[0].network, "devnet");
    assert_eq!(
        result.deployment.as_ref().unwrap().deployed_address.as_deref(),
        Some("0xcafe")
    );

    let mut last = 0;
    for update in &updates {
        assert!(update.progress_percent >= last);
        last = update.progress_percent;
        assert_eq!(update.execution_id, result.execution_id);
    }
    let final_update = updates.last().unwrap();
    assert_eq!(final_update.stage, PipelineStage::Completed);
    assert_eq!(final_update.progress_percent, 100);
    assert!(updates.iter().any(|u| u.stage == PipelineStage::Deploying));
}

#[tokio::test]
async fn failed_run_ends_with_failed_update() {
    let orchestrator = orchestrator_with(InMemoryCandidateStore::new(), None);
    let (sink, rx) = orchestrator.progress_channel();
    let observer = tokio::spawn(collect(rx));

    let result = orchestrator
        .execute(PipelineRequest::new(NFT_PROMPT, "empty"), Some(sink))
        .await;
    let updates = observer.await.unwrap();

    assert_eq!(result.error_kind, Some(PipelineErrorKind::AggregationEmpty));
    let final_update = updates.last().unwrap();
    assert_eq!(final_update.stage, PipelineStage::Failed);
    assert_eq!(final_update.progress_percent, 0);
    assert_eq!(final_update.steps.last().unwrap().status, StepStatus::Failed);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["stage"], "failed");
    assert_eq!(json["error_kind"], "aggregation_empty");
    assert!(json.get("bundle").is_none());
}

#[tokio::test]
async fn slow_observer_does_not_stall_pipeline() {
    let store = store_with(&["nft_collection"]).await;
    let orchestrator = orchestrator_with(store, None);
    let (sink, _rx) = contract_forge::pipeline::ProgressSink::channel(1, Duration::from_millis(5));

    let started = std::time::Instant::now();
    let result = orchestrator
        .execute(PipelineRequest::new(NFT_PROMPT, "unobserved"), Some(sink))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn stalled_build_times_out() {
    struct Stalled;

    #[async_trait]
    impl BuildDeployService for Stalled {
        async fn build_and_deploy(
            &self,
            _request: BuildRequest,
            status: mpsc::Sender<BuildStatus>,
        ) -> Result<BuildOutcome, BuildError> {
            let _ = status.send(BuildStatus::Compiling).await;
            std::future::pending::<()>().await;
            Err(BuildError::Unavailable("unreachable".to_string()))
        }
    }

    let store = store_with(&["nft_collection"]).await;
    let orchestrator = orchestrator_with(store, None)
        .with_deployer(Arc::new(Stalled))
        .with_timeout(Duration::from_millis(300));

    let result = orchestrator
        .execute(PipelineRequest::new(NFT_PROMPT, "stalled").with_deploy(None), None)
        .await;

    assert_eq!(result.error_kind, Some(PipelineErrorKind::Timeout));
    assert_eq!(result.progress_percent, 0);
    let failed = result.steps.last().unwrap();
    assert_eq!(failed.name, "building");
    assert_eq!(failed.status, StepStatus::Failed);
    // The bundle produced before the build is still reported
    assert!(result.bundle.is_some());
}
