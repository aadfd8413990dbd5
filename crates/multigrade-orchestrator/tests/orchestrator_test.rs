use async_trait::async_trait;
use multigrade_abstraction::{BackendError, GenerationParameters};
use multigrade_core::prompts::REPAIR_REQUEST;
use multigrade_core::storage::StorageResult;
use multigrade_core::{
    AgentKind, ArtifactBody, ContentPath, ContentStore, ContentVersioner, GradeSet,
    InMemoryContentStore, LineageKey, Normalizer, PersistPolicy, PutMode, RequestContext,
    StorageError, TemplateRegistry, TopicSplitter, VersionedContent,
};
use multigrade_models::{MockBackend, MockReply};
use multigrade_orchestrator::{
    AgentOrchestrator, GenerationClient, OrchestratorConfig, OutcomeStatus, RetryPolicy, TopicResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const WORKSHEET_JSON: &str = r#"{
  "worksheet_title": "Adding Up",
  "grade_sections": [
    {"grade": "Grade 1", "questions": [{"number": 1, "prompt": "2 + 3 = ?"}]},
    {"grade": "Grade 2", "questions": [{"number": 1, "prompt": "12 + 9 = ?"}]}
  ],
  "answer_key": [
    {"grade": "Grade 1", "question_number": 1, "answer": "5"},
    {"grade": "Grade 2", "question_number": 1, "answer": "21"}
  ]
}"#;

fn context() -> RequestContext {
    RequestContext::builder(GradeSet::parse_list("1,2").unwrap(), "Mathematics", "Addition")
        .build()
        .unwrap()
}

const CHAPTER: &str = "Unit 1\nTwo Little Hands\nClap your hands, clap clap clap.\nParts of the Body\nPoint to your nose.\nPicture Talk\nWhat do you see?";

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(200),
        max_backoff: Duration::from_secs(2),
        backoff_multiplier: 2.0,
        attempt_timeout: Duration::from_secs(5),
        total_timeout: Duration::from_secs(60),
    }
}

fn orchestrator(
    backend: MockBackend,
    store: Arc<dyn ContentStore>,
    config: OrchestratorConfig,
) -> AgentOrchestrator {
    shared_orchestrator(Arc::new(backend), store, config)
}

fn shared_orchestrator(
    backend: Arc<MockBackend>,
    store: Arc<dyn ContentStore>,
    config: OrchestratorConfig,
) -> AgentOrchestrator {
    let client = GenerationClient::new(backend, policy(), GenerationParameters::default());
    AgentOrchestrator::new(
        Arc::new(TemplateRegistry::builtin()),
        client,
        Normalizer::default(),
        ContentVersioner::new(store),
        config,
    )
}

#[tokio::test]
async fn test_well_formed_worksheet_succeeds_and_is_stored() {
    let store = Arc::new(InMemoryContentStore::new());
    let orch = orchestrator(MockBackend::new("mock").with_text(WORKSHEET_JSON), store.clone(), OrchestratorConfig::default());

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert!(outcome.diagnostic.is_none());
    let artifact = outcome.artifact.unwrap();
    assert_eq!(artifact.version_number, 1);
    assert_eq!(artifact.artifact.header.applicable_grades, GradeSet::parse_list("1,2").unwrap());
    assert!(matches!(artifact.artifact.body, ArtifactBody::Worksheet(_)));
    assert_eq!(outcome.stored_at, Some(artifact.path()));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_prose_response_is_degraded_with_raw_text() {
    let prose = "Here are some addition ideas: count apples, then add two more.";
    let store = Arc::new(InMemoryContentStore::new());
    let backend = MockBackend::new("mock").with_text(prose).with_text("Sorry, still only prose.");
    let orch = orchestrator(backend, store.clone(), OrchestratorConfig::default());

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Degraded);
    assert!(!outcome.diagnostic.unwrap_or_default().is_empty());
    match outcome.artifact.unwrap().artifact.body {
        ArtifactBody::Unstructured { raw_text, .. } => assert_eq!(raw_text, prose),
        other => panic!("expected unstructured body, got {other:?}"),
    }
    assert_eq!(store.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_fail_without_store_write() {
    let store = Arc::new(InMemoryContentStore::new());
    let slow = MockReply::Delayed(Duration::from_secs(30), Box::new(MockReply::Text(WORKSHEET_JSON.into())));
    let orch = orchestrator(MockBackend::new("mock").with_fallback(slow), store.clone(), OrchestratorConfig::default());

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.diagnostic.unwrap().contains("timed out"));
    assert!(outcome.artifact.is_none());
    assert_eq!(outcome.attempts, 3);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_rejected_request_is_failed_after_one_attempt() {
    let store = Arc::new(InMemoryContentStore::new());
    let backend = MockBackend::new("mock").with_error(BackendError::NonTransient("API key not valid".into()));
    let orch = orchestrator(backend, store.clone(), OrchestratorConfig::default());

    let outcome = orch.run(AgentKind::CoursePlanner, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.diagnostic.unwrap().contains("API key not valid"));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_empty_response_is_failed() {
    let store = Arc::new(InMemoryContentStore::new());
    let orch = orchestrator(MockBackend::new("mock").with_text("   ").with_text(""), store.clone(), OrchestratorConfig::default());

    let outcome = orch.run(AgentKind::AssessmentGenerator, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.artifact.is_none());
    assert_eq!(outcome.attempts, 2);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_missing_placeholder_value_fails_before_backend() {
    let store = Arc::new(InMemoryContentStore::new());
    let backend = Arc::new(MockBackend::new("mock"));
    let template = multigrade_core::PromptTemplate::new(
        AgentKind::WorksheetGenerator,
        "",
        "{{grades}} {{subject}} {{topic}} {{reading_level}}",
    );
    let registry = TemplateRegistry::builtin().with_override(AgentKind::WorksheetGenerator, template).unwrap();
    let orch = AgentOrchestrator::new(
        Arc::new(registry),
        GenerationClient::new(backend.clone(), policy(), GenerationParameters::default()),
        Normalizer::default(),
        ContentVersioner::new(store),
        OrchestratorConfig::default(),
    );

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.diagnostic.unwrap().contains("reading_level"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_prior_id_produces_increasing_versions() {
    let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
    let backend = MockBackend::new("mock").with_fallback(MockReply::Text(WORKSHEET_JSON.into()));
    let orch = orchestrator(backend, store.clone(), OrchestratorConfig::default());

    let first = orch.run(AgentKind::WorksheetGenerator, context(), None).await.artifact.unwrap();
    let id = first.content_id;
    let second = orch.run(AgentKind::WorksheetGenerator, context(), Some(id)).await.artifact.unwrap();
    let third = orch.run(AgentKind::WorksheetGenerator, context(), Some(id)).await.artifact.unwrap();

    assert_eq!(
        [first.version_number, second.version_number, third.version_number],
        [1, 2, 3]
    );
    assert_eq!(third.parent_version_id, Some(second.version_id()));
    assert_eq!(store.list_versions(&first.lineage()).await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_success_only_policy_skips_degraded() {
    let store = Arc::new(InMemoryContentStore::new());
    let config = OrchestratorConfig { persist: PersistPolicy::SuccessOnly, ..OrchestratorConfig::default() };
    let backend = MockBackend::new("mock").with_text("just prose").with_text("more prose");
    let orch = orchestrator(backend, store.clone(), config);

    let outcome = orch.run(AgentKind::VisualAidGenerator, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Degraded);
    assert!(outcome.artifact.is_some());
    assert!(outcome.stored_at.is_none());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_never_policy_leaves_commit_to_caller() {
    let store = Arc::new(InMemoryContentStore::new());
    let config = OrchestratorConfig { persist: PersistPolicy::Never, ..OrchestratorConfig::default() };
    let orch = orchestrator(MockBackend::new("mock").with_text(WORKSHEET_JSON), store.clone(), config);

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), None).await;
    assert!(store.is_empty().await);

    let artifact = outcome.artifact.unwrap();
    let path = orch.versioner().commit(&artifact).await.unwrap();
    assert_eq!(path, artifact.path());
    assert_eq!(store.len().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_on_one_lineage_get_distinct_versions() {
    let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
    let backend = MockBackend::new("mock").with_fallback(MockReply::Text(WORKSHEET_JSON.into()));
    let orch = orchestrator(backend, store.clone(), OrchestratorConfig::default());
    let first = orch.run(AgentKind::WorksheetGenerator, context(), None).await.artifact.unwrap();

    let runs: Vec<_> = (0..4)
        .map(|_| {
            let orch = orch.clone();
            let id = first.content_id;
            tokio::spawn(async move { orch.run(AgentKind::WorksheetGenerator, context(), Some(id)).await })
        })
        .collect();
    let mut versions = Vec::new();
    for run in runs {
        let outcome = run.await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Success, "{:?}", outcome.diagnostic);
        versions.push(outcome.artifact.unwrap().version_number);
    }
    versions.sort_unstable();

    assert_eq!(versions, vec![2, 3, 4, 5]);
    assert_eq!(store.list_versions(&first.lineage()).await.unwrap(), vec![1, 2, 3, 4, 5]);
}

/// Hides the newest version from the first `list_versions` call, the way a
/// concurrent writer landing between read and write would.
struct StaleReadStore {
    inner: InMemoryContentStore,
    stale_once: AtomicBool,
}

#[async_trait]
impl ContentStore for StaleReadStore {
    async fn put(&self, path: &ContentPath, content: &VersionedContent, mode: PutMode) -> StorageResult<()> {
        self.inner.put(path, content, mode).await
    }

    async fn get(&self, path: &ContentPath) -> StorageResult<VersionedContent> {
        self.inner.get(path).await
    }

    async fn list_versions(&self, lineage: &LineageKey) -> StorageResult<Vec<u32>> {
        let mut versions = self.inner.list_versions(lineage).await?;
        if self.stale_once.swap(false, Ordering::SeqCst) {
            versions.pop();
        }
        Ok(versions)
    }

    async fn list_lineages(&self, subject: Option<&str>) -> StorageResult<Vec<LineageKey>> {
        self.inner.list_lineages(subject).await
    }
}

async fn stale_setup(conflict_retries: u32) -> (AgentOrchestrator, Arc<StaleReadStore>, VersionedContent) {
    let store = Arc::new(StaleReadStore { inner: InMemoryContentStore::new(), stale_once: AtomicBool::new(false) });
    let backend = MockBackend::new("mock").with_fallback(MockReply::Text(WORKSHEET_JSON.into()));
    let config = OrchestratorConfig { conflict_retries, ..OrchestratorConfig::default() };
    let orch = orchestrator(backend, store.clone(), config);
    let first = orch.run(AgentKind::WorksheetGenerator, context(), None).await.artifact.unwrap();
    store.stale_once.store(true, Ordering::SeqCst);
    (orch, store, first)
}

#[tokio::test]
async fn test_lost_version_race_is_retried() {
    let (orch, store, first) = stale_setup(1).await;

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), Some(first.content_id)).await;

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.artifact.unwrap().version_number, 2);
    assert_eq!(store.inner.len().await, 2);
}

#[tokio::test]
async fn test_conflict_without_retries_fails_but_keeps_artifact() {
    let (orch, store, first) = stale_setup(0).await;

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), Some(first.content_id)).await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.diagnostic.unwrap().contains("failed to store content"));
    assert_eq!(outcome.artifact.unwrap().version_number, 1);
    assert!(outcome.stored_at.is_none());
    assert_eq!(store.inner.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_while_waiting_on_backend() {
    let store = Arc::new(InMemoryContentStore::new());
    let slow = MockReply::Delayed(Duration::from_secs(4), Box::new(MockReply::Text(WORKSHEET_JSON.into())));
    let orch = orchestrator(MockBackend::new("mock").with_reply(slow), store.clone(), OrchestratorConfig::default());
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let outcome = orch.run_with_cancellation(AgentKind::WorksheetGenerator, context(), None, &token).await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.diagnostic.unwrap().contains("cancelled"));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_failing_store_reports_failed() {
    struct BrokenStore;

    #[async_trait]
    impl ContentStore for BrokenStore {
        async fn put(&self, path: &ContentPath, _: &VersionedContent, _: PutMode) -> StorageResult<()> {
            Err(StorageError::InvalidData(format!("disk full writing {path}")))
        }
        async fn get(&self, path: &ContentPath) -> StorageResult<VersionedContent> {
            Err(StorageError::NotFound(path.to_string()))
        }
        async fn list_versions(&self, _: &LineageKey) -> StorageResult<Vec<u32>> {
            Ok(Vec::new())
        }
        async fn list_lineages(&self, _: Option<&str>) -> StorageResult<Vec<LineageKey>> {
            Ok(Vec::new())
        }
    }

    let orch = orchestrator(MockBackend::new("mock").with_text(WORKSHEET_JSON), Arc::new(BrokenStore), OrchestratorConfig::default());

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.diagnostic.unwrap().contains("disk full"));
    assert!(outcome.artifact.is_some());
}

#[tokio::test]
async fn test_prose_then_json_is_repaired() {
    let store = Arc::new(InMemoryContentStore::new());
    let backend = Arc::new(MockBackend::new("mock").with_text("I would suggest counting apples.").with_text(WORKSHEET_JSON));
    let orch = shared_orchestrator(backend.clone(), store.clone(), OrchestratorConfig::default());

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.attempts, 2);
    assert!(matches!(outcome.artifact.unwrap().artifact.body, ArtifactBody::Worksheet(_)));
    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].starts_with(&prompts[0]));
    assert!(prompts[1].ends_with(REPAIR_REQUEST));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_partial_json_is_not_repaired() {
    let backend = Arc::new(MockBackend::new("mock").with_text(r#"{"worksheet_title": "Only a title"}"#));
    let orch = shared_orchestrator(backend.clone(), Arc::new(InMemoryContentStore::new()), OrchestratorConfig::default());

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Degraded);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_zero_repair_attempts_sends_one_prompt() {
    let backend = Arc::new(MockBackend::new("mock").with_text("prose").with_text(WORKSHEET_JSON));
    let config = OrchestratorConfig { repair_attempts: 0, ..OrchestratorConfig::default() };
    let orch = shared_orchestrator(backend.clone(), Arc::new(InMemoryContentStore::new()), config);

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Degraded);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_failed_repair_keeps_first_output() {
    let prose = "Count apples, then add two more.";
    let backend = MockBackend::new("mock")
        .with_text(prose)
        .with_error(BackendError::NonTransient("quota exceeded".into()));
    let orch = orchestrator(backend, Arc::new(InMemoryContentStore::new()), OrchestratorConfig::default());

    let outcome = orch.run(AgentKind::WorksheetGenerator, context(), None).await;

    assert_eq!(outcome.status, OutcomeStatus::Degraded);
    assert_eq!(outcome.attempts, 2);
    match outcome.artifact.unwrap().artifact.body {
        ArtifactBody::Unstructured { raw_text, .. } => assert_eq!(raw_text, prose),
        other => panic!("expected unstructured body, got {other:?}"),
    }
}

fn chapter_context() -> RequestContext {
    RequestContext::builder(GradeSet::parse_list("1,2").unwrap(), "English", "Unit 1")
        .chapter("Unit 1")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_batch_skips_topics_with_stored_content() {
    let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
    let backend = Arc::new(MockBackend::new("mock").with_fallback(MockReply::Text(WORKSHEET_JSON.into())));
    let orch = shared_orchestrator(backend.clone(), store.clone(), OrchestratorConfig::default());
    let base = chapter_context();
    let topics = TopicSplitter::new().split(CHAPTER);
    assert_eq!(topics.len(), 3);

    let done = base.with_topic(&topics[1].title(), &topics[1].text).unwrap();
    let earlier = orch.run(AgentKind::WorksheetGenerator, done, None).await.artifact.unwrap();

    let report = orch.run_batch(AgentKind::WorksheetGenerator, &base, &topics, &CancellationToken::new()).await;

    assert!(!report.cancelled);
    assert_eq!((report.generated(), report.skipped(), report.failed()), (2, 1, 0));
    assert_eq!(report.topics[1].topic, "02_Parts_of_the_Body");
    assert_eq!(report.topics[1].result, TopicResult::Skipped { existing: earlier.lineage() });
    match &report.topics[0].result {
        TopicResult::Generated(outcome) => {
            assert_eq!(outcome.status, OutcomeStatus::Success);
            assert_eq!(outcome.artifact.as_ref().unwrap().artifact.header.topic, "01 Two Little Hands");
        }
        other => panic!("expected generated topic, got {other:?}"),
    }

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[1].contains("Clap your hands, clap clap clap."));
    assert!(prompts[2].contains("What do you see?"));
    assert_eq!(store.list_lineages(Some("English")).await.unwrap().len(), 3);

    let again = orch.run_batch(AgentKind::WorksheetGenerator, &base, &topics, &CancellationToken::new()).await;
    assert_eq!(again.skipped(), 3);
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn test_batch_stops_once_cancelled() {
    let backend = Arc::new(MockBackend::new("mock").with_fallback(MockReply::Text(WORKSHEET_JSON.into())));
    let orch = shared_orchestrator(backend.clone(), Arc::new(InMemoryContentStore::new()), OrchestratorConfig::default());
    let topics = TopicSplitter::new().split(CHAPTER);
    let token = CancellationToken::new();
    token.cancel();

    let report = orch.run_batch(AgentKind::WorksheetGenerator, &chapter_context(), &topics, &token).await;

    assert!(report.cancelled);
    assert!(report.topics.is_empty());
    assert_eq!(backend.call_count(), 0);
}
