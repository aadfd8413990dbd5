//! End-to-end pipeline for one generation request, and for a chapter's
//! worth of topics.

use multigrade_core::config::OrchestratorSection;
use multigrade_core::{
    AgentKind, ArtifactHeader, BoundPrompt, ContentId, ContentPath, ContentVersioner,
    GeneratedArtifact, LineageKey, NormalizationStatus, Normalized, Normalizer, PersistPolicy,
    RequestContext, StorageError, TemplateRegistry, Topic, VersionedContent, bind,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::GenerationClient;
use crate::error::GenerationError;

/// Quality of a finished run; the same scale the normalizer reports.
pub type OutcomeStatus = NormalizationStatus;

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub persist: PersistPolicy,
    /// Re-versioning rounds after losing a version race.
    pub conflict_retries: u32,
    /// JSON-only re-prompts after output with no JSON in it.
    pub repair_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&OrchestratorSection::default())
    }
}

impl From<&OrchestratorSection> for OrchestratorConfig {
    fn from(section: &OrchestratorSection) -> Self {
        Self {
            persist: section.persist,
            conflict_retries: section.conflict_retries,
            repair_attempts: section.repair_attempts,
        }
    }
}

impl OrchestratorConfig {
    fn persists(&self, status: OutcomeStatus) -> bool {
        match self.persist {
            PersistPolicy::Always => status != OutcomeStatus::Failed,
            PersistPolicy::SuccessOnly => status == OutcomeStatus::Success,
            PersistPolicy::Never => false,
        }
    }
}

/// Terminal result of [`AgentOrchestrator::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub status: OutcomeStatus,
    /// Absent only when nothing usable was produced.
    pub artifact: Option<VersionedContent>,
    pub diagnostic: Option<String>,
    /// Set when the artifact was written to the store.
    pub stored_at: Option<ContentPath>,
    /// Backend attempts used.
    pub attempts: u32,
}

impl GenerationOutcome {
    fn failed(diagnostic: impl Into<String>, attempts: u32) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            artifact: None,
            diagnostic: Some(diagnostic.into()),
            stored_at: None,
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// What happened to one topic of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TopicResult {
    /// Content for the topic was already stored.
    Skipped { existing: LineageKey },
    Generated(GenerationOutcome),
}

/// One entry of a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicOutcome {
    /// Topic key name, `NN_Header_Text`.
    pub topic: String,
    #[serde(flatten)]
    pub result: TopicResult,
}

/// Result of [`AgentOrchestrator::run_batch`], in topic order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub topics: Vec<TopicOutcome>,
    /// Set when cancellation stopped the batch before its last topic.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn skipped(&self) -> usize {
        self.topics.iter().filter(|t| matches!(t.result, TopicResult::Skipped { .. })).count()
    }

    pub fn generated(&self) -> usize {
        self.count_generated(|outcome| outcome.status != OutcomeStatus::Failed)
    }

    pub fn failed(&self) -> usize {
        self.count_generated(|outcome| outcome.status == OutcomeStatus::Failed)
    }

    fn count_generated(&self, pred: impl Fn(&GenerationOutcome) -> bool) -> usize {
        self.topics
            .iter()
            .filter(|t| matches!(&t.result, TopicResult::Generated(outcome) if pred(outcome)))
            .count()
    }
}

/// Runs registry lookup, binding, generation, normalization, versioning and
/// persistence for one request.
///
/// The orchestrator holds no per-request state, so one instance can serve
/// concurrent calls.
#[derive(Clone)]
pub struct AgentOrchestrator {
    registry: Arc<TemplateRegistry>,
    client: GenerationClient,
    normalizer: Normalizer,
    versioner: ContentVersioner,
    config: OrchestratorConfig,
}

impl AgentOrchestrator {
    pub fn new(
        registry: Arc<TemplateRegistry>,
        client: GenerationClient,
        normalizer: Normalizer,
        versioner: ContentVersioner,
        config: OrchestratorConfig,
    ) -> Self {
        Self { registry, client, normalizer, versioner, config }
    }

    pub fn versioner(&self) -> &ContentVersioner {
        &self.versioner
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Produces content of `kind` for `context`, as a new version of `prior`
    /// when given.
    pub async fn run(
        &self,
        kind: AgentKind,
        context: RequestContext,
        prior: Option<ContentId>,
    ) -> GenerationOutcome {
        self.run_with_cancellation(kind, context, prior, &CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but gives up while waiting on the backend once
    /// `cancel` fires. Cancellation after generation has finished is ignored,
    /// so the store never sees a half-finished run.
    pub async fn run_with_cancellation(
        &self,
        kind: AgentKind,
        context: RequestContext,
        prior: Option<ContentId>,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        info!(
            agent_kind = %kind,
            subject = %context.subject(),
            topic = %context.topic(),
            grades = %context.grades(),
            "Starting generation"
        );

        let prompt = match bind(self.registry.lookup(kind), &context) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!(agent_kind = %kind, error = %e, "Prompt binding failed");
                return GenerationOutcome::failed(e.to_string(), 0);
            }
        };
        debug!(agent_kind = %kind, prompt_len = prompt.text.len(), "Bound prompt");

        let generated = match self.client.generate_with_cancellation(&prompt.text, cancel).await {
            Ok(generated) => generated,
            Err(e) => {
                warn!(agent_kind = %kind, error = %e, "Generation failed");
                return GenerationOutcome::failed(e.to_string(), e.attempts());
            }
        };
        let normalized = self.normalizer.normalize(kind, &generated.text);
        let (normalized, attempts) =
            match self.repair(&prompt, normalized, generated.attempts, cancel).await {
                Ok(repaired) => repaired,
                Err(outcome) => return outcome,
            };

        let Normalized { body, status, diagnostic } = normalized;
        let Some(body) = body.filter(|_| status != OutcomeStatus::Failed) else {
            let diagnostic = diagnostic.unwrap_or_else(|| "backend returned no usable content".to_string());
            warn!(agent_kind = %kind, diagnostic = %diagnostic, "Normalization failed");
            return GenerationOutcome::failed(diagnostic, attempts);
        };
        if status == OutcomeStatus::Degraded {
            warn!(
                agent_kind = %kind,
                diagnostic = diagnostic.as_deref().unwrap_or_default(),
                "Returning degraded artifact"
            );
        }

        let artifact = GeneratedArtifact::new(ArtifactHeader::from_context(kind, &context), body);
        let versioned = match self.versioner.version(artifact, prior).await {
            Ok(versioned) => versioned,
            Err(e) => {
                error!(agent_kind = %kind, error = %e, "Version lookup failed");
                return GenerationOutcome::failed(format!("version lookup failed: {e}"), attempts);
            }
        };

        let mut outcome = GenerationOutcome {
            status,
            artifact: None,
            diagnostic,
            stored_at: None,
            attempts,
        };

        if !self.config.persists(outcome.status) {
            debug!(agent_kind = %kind, status = %outcome.status, "Skipping persistence");
            outcome.artifact = Some(versioned);
            return outcome;
        }

        match self.persist(versioned).await {
            Ok((stored, path)) => {
                info!(path = %path, status = %outcome.status, "Generation finished");
                outcome.artifact = Some(stored);
                outcome.stored_at = Some(path);
            }
            Err((unstored, e)) => {
                error!(agent_kind = %kind, error = %e, "Persisting content failed");
                outcome.status = OutcomeStatus::Failed;
                outcome.diagnostic = Some(format!("failed to store content: {e}"));
                outcome.artifact = Some(unstored);
            }
        }
        outcome
    }

    /// Generates one topic after another from a split chapter.
    ///
    /// Each topic runs with `base` retargeted to the topic title and text.
    /// Topics that already have stored content of `kind` are skipped. Stops
    /// before the next topic once `cancel` fires.
    pub async fn run_batch(
        &self,
        kind: AgentKind,
        base: &RequestContext,
        topics: &[Topic],
        cancel: &CancellationToken,
    ) -> BatchReport {
        info!(agent_kind = %kind, subject = %base.subject(), topics = topics.len(), "Starting batch");
        let mut report = BatchReport::default();
        for topic in topics {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let result = self.run_topic(kind, base, topic, cancel).await;
            report.topics.push(TopicOutcome { topic: topic.name.clone(), result });
        }
        info!(
            agent_kind = %kind,
            generated = report.generated(),
            skipped = report.skipped(),
            failed = report.failed(),
            cancelled = report.cancelled,
            "Batch finished"
        );
        report
    }

    async fn run_topic(
        &self,
        kind: AgentKind,
        base: &RequestContext,
        topic: &Topic,
        cancel: &CancellationToken,
    ) -> TopicResult {
        let context = match base.with_topic(&topic.title(), &topic.text) {
            Ok(context) => context,
            Err(e) => {
                warn!(topic = %topic.name, error = %e, "Topic has no usable context");
                return TopicResult::Generated(GenerationOutcome::failed(e.to_string(), 0));
            }
        };
        let header = ArtifactHeader::from_context(kind, &context);
        match self.versioner.existing_lineages(&header).await {
            Ok(existing) => {
                if let Some(existing) = existing.into_iter().next() {
                    info!(topic = %topic.name, lineage = %existing, "Content exists, skipping topic");
                    return TopicResult::Skipped { existing };
                }
            }
            Err(e) => {
                error!(topic = %topic.name, error = %e, "Lineage lookup failed");
                return TopicResult::Generated(GenerationOutcome::failed(
                    format!("lineage lookup failed: {e}"),
                    0,
                ));
            }
        }
        TopicResult::Generated(self.run_with_cancellation(kind, context, None, cancel).await)
    }

    /// Re-prompts for JSON while the normalized output holds none, keeping
    /// whichever answer normalizes best. A failed re-prompt keeps what was
    /// already there; cancellation ends the run.
    async fn repair(
        &self,
        prompt: &BoundPrompt,
        mut normalized: Normalized,
        mut attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<(Normalized, u32), GenerationOutcome> {
        let kind = prompt.kind;
        let repair = prompt.repair();
        for round in 1..=self.config.repair_attempts {
            if normalized.found_json() {
                break;
            }
            info!(agent_kind = %kind, round, "Output held no JSON, asking for JSON only");
            match self.client.generate_with_cancellation(&repair.text, cancel).await {
                Ok(generated) => {
                    attempts += generated.attempts;
                    let candidate = self.normalizer.normalize(kind, &generated.text);
                    let better = candidate.status.improves_on(normalized.status)
                        || (candidate.status == normalized.status && candidate.found_json());
                    if better {
                        normalized = candidate;
                    } else {
                        debug!(agent_kind = %kind, status = %candidate.status, "Repair did not improve output");
                    }
                }
                Err(e @ GenerationError::Cancelled { .. }) => {
                    warn!(agent_kind = %kind, "Cancelled during repair");
                    return Err(GenerationOutcome::failed(e.to_string(), attempts + e.attempts()));
                }
                Err(e) => {
                    warn!(agent_kind = %kind, error = %e, "Repair generation failed");
                    attempts += e.attempts();
                    break;
                }
            }
        }
        Ok((normalized, attempts))
    }

    /// Commits `content`, re-versioning after each lost race. On failure the
    /// last unstored version comes back with the error.
    async fn persist(
        &self,
        mut content: VersionedContent,
    ) -> Result<(VersionedContent, ContentPath), (VersionedContent, StorageError)> {
        let mut retries_left = self.config.conflict_retries;
        loop {
            match self.versioner.commit(&content).await {
                Ok(path) => return Ok((content, path)),
                Err(e) if e.is_conflict() && retries_left > 0 => {
                    retries_left -= 1;
                    warn!(
                        path = %content.path(),
                        retries_left,
                        "Version slot taken by a concurrent writer, re-versioning"
                    );
                    let artifact = content.artifact.clone();
                    content = match self.versioner.version(artifact, Some(content.content_id)).await {
                        Ok(next) => next,
                        Err(e) => return Err((content, e)),
                    };
                }
                Err(e) => return Err((content, e)),
            }
        }
    }
}
