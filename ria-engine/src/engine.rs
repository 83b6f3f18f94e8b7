//! Top-level facade wiring retrieval, the model client, the council
//! protocol, the workflow state machine and the review queue into the
//! external interface (spec §6).

use std::sync::Arc;

use ria_contracts::council::BootstrapConfig;
use ria_contracts::{
    Assessment, AssessmentId, ContextMetadata, ModelId, PolicyCategory, ReportSections, ReviewAction,
    ReviewDecision, ReviewType, WorkflowState,
};
use ria_council::CouncilConfig;
use ria_graph::GraphEngine;
use ria_index::VectorStore;
use ria_model_client::ModelClient;
use ria_retrieval::{RetrievalOrchestrator, RetrievalRequest};
use ria_workflow::review_store::ReviewSlaBase;
use ria_workflow::{ProgressEvent, ReviewPriority, ReviewStore, WorkflowEngine, WorkflowManager};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::EngineError;
use crate::events::{translate_progress_event, Event};
use crate::validation::validate_proposal;

const MAX_CONCURRENT_ASSESSMENTS: usize = 256;

/// Owns every long-lived component and drives assessments end to end. Cheap
/// to clone as an `Arc<Engine>`; internal mutable state sits behind its own
/// locks.
pub struct Engine {
    retrieval: RetrievalOrchestrator,
    client: Arc<dyn ModelClient>,
    council_config: CouncilConfig,
    workflows: Mutex<WorkflowManager>,
    reviews: ReviewStore,
}

impl Engine {
    pub fn new(
        config: ria_config::EngineConfig,
        store: Arc<VectorStore>,
        graph: Arc<GraphEngine>,
        client: Arc<dyn ModelClient>,
    ) -> Arc<Self> {
        let council_config = CouncilConfig {
            council_models: config.council.council_models.iter().map(ModelId::new).collect(),
            chairman_model: ModelId::new(config.council.chairman_model.clone()),
            bootstrap: BootstrapConfig {
                iterations: config.council.bootstrap_iterations,
                enabled: config.council.enable_bootstrap,
                criteria: config.council.evaluation_criteria.clone(),
                aggregation_method: config.council.aggregation_method,
            },
            allow_chairman_fallback: config.council.allow_chairman_fallback,
        };
        let sla_base = ReviewSlaBase {
            synthesis_hours: config.review_slas.synthesis_hours,
            report_hours: config.review_slas.report_hours,
        };

        Arc::new(Self {
            retrieval: RetrievalOrchestrator::new(store, graph),
            client,
            council_config,
            workflows: Mutex::new(WorkflowManager::new(MAX_CONCURRENT_ASSESSMENTS)),
            reviews: ReviewStore::new(sla_base),
        })
    }

    pub fn reviews(&self) -> &ReviewStore {
        &self.reviews
    }

    /// Validates the proposal, retrieves supporting context, and starts a
    /// council synthesis run in the background. Returns as soon as the
    /// assessment is registered; progress is observed via
    /// [`Engine::stream_assessment`].
    #[instrument(skip(self, proposal_text, context_metadata))]
    pub async fn create_assessment(
        self: &Arc<Self>,
        proposal_text: impl Into<String>,
        context_metadata: ContextMetadata,
    ) -> Result<AssessmentId, EngineError> {
        let proposal_text = proposal_text.into();
        validate_proposal(&proposal_text)?;

        let explicit_categories: Vec<PolicyCategory> =
            context_metadata.requested_categories.iter().filter_map(|c| PolicyCategory::parse(c).ok()).collect();

        let outcome = self
            .retrieval
            .retrieve(RetrievalRequest { proposal_text: proposal_text.clone(), explicit_categories, filter: None })
            .await?;

        let mut assessment = Assessment::new(proposal_text, context_metadata);
        let assessment_id = assessment.assessment_id;
        assessment.quality_metrics.retrieval_hit_count = outcome.hits.len();
        assessment.quality_metrics.retrieval_mean_score = mean_score(&outcome.hits);
        assessment.quality_metrics.retrieval_expanded = outcome.expanded;
        assessment.quality_metrics.insufficient_context = outcome.insufficient_context;
        assessment.sources = outcome.context.entries.iter().map(|e| e.chunk_id.to_string()).collect();

        let context_text =
            outcome.context.entries.iter().map(|e| e.content.as_str()).collect::<Vec<_>>().join("\n\n");

        let (workflow_engine, _progress_rx) = WorkflowEngine::new(
            assessment,
            context_text,
            self.council_config.clone(),
            self.client.clone(),
            CancellationToken::new(),
        );

        {
            let mut manager = self.workflows.lock().await;
            manager.start(workflow_engine)?;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move { this.drive_synthesis(assessment_id).await });

        info!(assessment_id = %assessment_id, "assessment created");
        Ok(assessment_id)
    }

    async fn drive_synthesis(self: Arc<Self>, assessment_id: AssessmentId) {
        let key = assessment_id.to_string();
        let result = {
            let mut manager = self.workflows.lock().await;
            match manager.get_mut(&key) {
                Some(engine) => engine.run_synthesis().await,
                None => return,
            }
        };
        if result.is_ok() {
            self.reviews.enqueue(assessment_id, ReviewType::Synthesis, ReviewPriority::Normal);
        }
    }

    /// Subscribes to an in-flight assessment's progress, translated into the
    /// external event vocabulary. The returned receiver closes itself once a
    /// terminal event (`WorkflowComplete` or `Error`) has been delivered.
    pub async fn stream_assessment(&self, assessment_id: AssessmentId) -> Result<broadcast::Receiver<Event>, EngineError> {
        let mut progress_rx: broadcast::Receiver<ProgressEvent> = {
            let manager = self.workflows.lock().await;
            let engine = manager.get(&assessment_id.to_string()).ok_or_else(|| EngineError::NotFound(assessment_id.to_string()))?;
            engine.subscribe()
        };

        let (event_tx, event_rx) = broadcast::channel(256);
        tokio::spawn(async move {
            loop {
                match progress_rx.recv().await {
                    Ok(progress) => {
                        let event = translate_progress_event(progress, assessment_id);
                        let terminal = matches!(event, Event::WorkflowComplete | Event::Error { .. });
                        if event_tx.send(event).is_err() || terminal {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(event_rx)
    }

    /// Applies a human review decision. The review type is inferred from the
    /// assessment's current state rather than taken as a parameter, since
    /// only one review gate can be pending at a time (spec §6).
    pub async fn review(
        &self,
        assessment_id: AssessmentId,
        action: ReviewAction,
        comments: impl Into<String>,
        reviewer_id: impl Into<String>,
        revision_feedback: Option<String>,
    ) -> Result<WorkflowState, EngineError> {
        let key = assessment_id.to_string();
        let mut manager = self.workflows.lock().await;
        let workflow_engine = manager.get_mut(&key).ok_or_else(|| EngineError::NotFound(key.clone()))?;

        let review_type = match workflow_engine.state() {
            WorkflowState::SynthesisReviewPending => ReviewType::Synthesis,
            WorkflowState::ReportReviewPending => ReviewType::Report,
            other => {
                return Err(EngineError::Workflow(ria_workflow::WorkflowError::InvalidTransition {
                    from: other.label(),
                    to: "no review is currently pending".to_string(),
                }))
            }
        };

        let decision = ReviewDecision::new(review_type, action, comments, reviewer_id, revision_feedback);
        self.reviews.record_decision(assessment_id, decision.clone());

        match review_type {
            ReviewType::Synthesis => workflow_engine.submit_synthesis_review(decision).await?,
            ReviewType::Report => workflow_engine.submit_report_review(decision).await?,
        }

        let state = workflow_engine.state().clone();
        if workflow_engine.is_terminal() {
            manager.retire_if_terminal(&key)?;
        } else if matches!(state, WorkflowState::ReportReviewPending) {
            self.reviews.enqueue(assessment_id, ReviewType::Report, ReviewPriority::Normal);
        } else if matches!(state, WorkflowState::SynthesisReviewPending) {
            self.reviews.enqueue(assessment_id, ReviewType::Synthesis, ReviewPriority::Normal);
        }
        Ok(state)
    }

    pub async fn get_assessment(&self, assessment_id: AssessmentId) -> Option<Assessment> {
        let manager = self.workflows.lock().await;
        manager.find_assessment(&assessment_id.to_string())
    }

    pub async fn get_status(&self, assessment_id: AssessmentId) -> Option<WorkflowState> {
        self.get_assessment(assessment_id).await.map(|a| a.state)
    }

    pub async fn get_report(&self, assessment_id: AssessmentId) -> Option<ReportSections> {
        self.get_assessment(assessment_id).await.and_then(|a| a.report_sections)
    }

    pub async fn list(&self, status: Option<WorkflowState>) -> Vec<Assessment> {
        let manager = self.workflows.lock().await;
        let all = manager.all_assessments();
        match status {
            Some(filter) => {
                let want = std::mem::discriminant(&filter);
                all.into_iter().filter(|a| std::mem::discriminant(&a.state) == want).collect()
            }
            None => all,
        }
    }
}

fn mean_score(hits: &[(ria_contracts::ChunkId, f64)]) -> f64 {
    if hits.is_empty() {
        return 0.0;
    }
    hits.iter().map(|(_, s)| s).sum::<f64>() / hits.len() as f64
}
