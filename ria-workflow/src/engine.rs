use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ria_contracts::{Assessment, CouncilRun, ReviewAction, ReviewDecision, ReviewType, WorkflowState};
use ria_council::{run_council, CouncilConfig};
use ria_model_client::ModelClient;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::WorkflowError;
use crate::events::ProgressEvent;
use crate::history::{StateTransition, TransitionTrigger};
use crate::transitions::is_allowed;

/// A review type may be sent back for revision at most this many times
/// before the assessment fails outright (spec §4.9 revision loop bound).
pub const REVISION_LIMIT: u32 = 3;

/// Drives a single `Assessment` through the full review lifecycle: council
/// synthesis, human review of the synthesis, section extraction, human
/// review of the report, and knowledge-base handoff (spec §4.9).
pub struct WorkflowEngine {
    assessment: Assessment,
    context: String,
    history: Vec<StateTransition>,
    council_config: CouncilConfig,
    client: Arc<dyn ModelClient>,
    cancel: CancellationToken,
    progress_tx: broadcast::Sender<ProgressEvent>,
}

impl WorkflowEngine {
    pub fn new(
        assessment: Assessment,
        context: impl Into<String>,
        council_config: CouncilConfig,
        client: Arc<dyn ModelClient>,
        cancel: CancellationToken,
    ) -> (Self, broadcast::Receiver<ProgressEvent>) {
        let (progress_tx, progress_rx) = broadcast::channel(256);
        (
            Self {
                assessment,
                context: context.into(),
                history: Vec::new(),
                council_config,
                client,
                cancel,
                progress_tx,
            },
            progress_rx,
        )
    }

    pub fn state(&self) -> &WorkflowState {
        &self.assessment.state
    }

    pub fn is_terminal(&self) -> bool {
        self.assessment.state.is_terminal()
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    pub fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    pub fn into_assessment(self) -> Assessment {
        self.assessment
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }

    fn emit(&self, event: ProgressEvent) {
        let _ = self.progress_tx.send(event);
    }

    fn transition(&mut self, to: WorkflowState, trigger: TransitionTrigger) -> Result<(), WorkflowError> {
        if !is_allowed(&self.assessment.state, &to) {
            return Err(WorkflowError::InvalidTransition {
                from: self.assessment.state.label(),
                to: to.label(),
            });
        }
        self.emit(ProgressEvent::new("state_transition", to.label()));
        self.history.push(StateTransition {
            from_state: self.assessment.state.clone(),
            to_state: to.clone(),
            timestamp: Utc::now(),
            trigger,
            metadata: HashMap::new(),
        });
        self.assessment.state = to;
        self.assessment.updated_at = Utc::now();
        Ok(())
    }

    fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "assessment failed");
        let _ = self.transition(WorkflowState::Failed { reason }, TransitionTrigger::Error);
    }

    /// Cancels any in-flight model call and moves to `Cancelled` once it
    /// resolves. A no-op on an already-terminal assessment.
    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        self.cancel.cancel();
        if self.assessment.state.is_terminal() {
            return Ok(());
        }
        self.transition(WorkflowState::Cancelled, TransitionTrigger::External)
    }

    /// Runs council stages 1-3 over the proposal and stores the resulting
    /// report sections, ending at `SynthesisReviewPending`. Must be called
    /// from `Draft`.
    #[instrument(skip(self), fields(assessment_id = %self.assessment.assessment_id))]
    pub async fn run_synthesis(&mut self) -> Result<(), WorkflowError> {
        self.transition(WorkflowState::Preprocessing, TransitionTrigger::Automatic)?;
        self.transition(WorkflowState::Stage1Running, TransitionTrigger::Automatic)?;

        let run = run_council(
            self.assessment.assessment_id,
            &self.assessment.proposal_text,
            &self.context,
            &self.council_config,
            None,
            self.client.as_ref(),
            self.cancel.clone(),
        )
        .await;

        let run = match run {
            Ok(run) => run,
            Err(err) => {
                self.fail(err.to_string());
                return Err(WorkflowError::Council(err));
            }
        };

        self.transition(WorkflowState::Stage1Complete, TransitionTrigger::Automatic)?;
        self.transition(WorkflowState::Stage2Running, TransitionTrigger::Automatic)?;
        self.transition(WorkflowState::Stage2Complete, TransitionTrigger::Automatic)?;
        self.transition(WorkflowState::Stage3Running, TransitionTrigger::Automatic)?;

        if let Some(sections) = &run.stage3_structured {
            self.assessment.quality_metrics.missing_theme_count = sections.missing_theme_count;
        }
        self.assessment.council_history.push(run);

        self.transition(WorkflowState::Stage3Complete, TransitionTrigger::Automatic)?;
        self.transition(WorkflowState::SynthesisReviewPending, TransitionTrigger::Automatic)?;
        info!("synthesis ready for review");
        Ok(())
    }

    fn record_revision(&mut self, review_type: ReviewType) -> Result<(), WorkflowError> {
        let key = match review_type {
            ReviewType::Synthesis => "synthesis",
            ReviewType::Report => "report",
        };
        let count = self.assessment.quality_metrics.revision_count_by_type.entry(key.to_string()).or_insert(0);
        *count += 1;
        if *count > REVISION_LIMIT {
            self.fail("revision_limit_exceeded");
            return Err(WorkflowError::RevisionLimitExceeded { review_type });
        }
        Ok(())
    }

    /// Applies a human decision on the synthesis review gate.
    pub async fn submit_synthesis_review(&mut self, decision: ReviewDecision) -> Result<(), WorkflowError> {
        if self.assessment.state != WorkflowState::SynthesisReviewPending {
            return Err(WorkflowError::ReviewNotPending { review_type: ReviewType::Synthesis });
        }
        self.transition(WorkflowState::SynthesisReviewInProgress, TransitionTrigger::Manual)?;

        match decision.decision {
            ReviewAction::Approve => {
                self.transition(WorkflowState::SynthesisApproved, TransitionTrigger::Manual)?;
                self.assessment.review_decisions.push(decision);
                self.extract_report(WorkflowState::SynthesisApproved, None).await
            }
            ReviewAction::RequestRevision => {
                self.record_revision(ReviewType::Synthesis)?;
                self.transition(WorkflowState::SynthesisRevisionRequested, TransitionTrigger::Manual)?;
                let feedback = decision.revision_feedback.clone();
                self.assessment.review_decisions.push(decision);
                self.rerun_chairman(feedback).await
            }
            ReviewAction::Reject => {
                self.transition(WorkflowState::SynthesisRejected, TransitionTrigger::Manual)?;
                self.assessment.review_decisions.push(decision);
                Ok(())
            }
            ReviewAction::Edit => Err(WorkflowError::InvalidTransition {
                from: "SynthesisReviewInProgress".to_string(),
                to: "edit is not a valid synthesis review outcome".to_string(),
            }),
        }
    }

    /// Re-invokes only the chairman with reviewer feedback appended to the
    /// prompt, reusing the prior run's Stage-1/Stage-2 outputs rather than
    /// rerunning the full council (spec §4.9:
    /// `SynthesisRevisionRequested -> Stage3Running` "with the reviewer
    /// feedback appended to the chairman prompt"). Appends a new
    /// `CouncilRun` to `council_history` rather than mutating the prior one.
    async fn rerun_chairman(&mut self, feedback: Option<String>) -> Result<(), WorkflowError> {
        self.transition(WorkflowState::Stage3Running, TransitionTrigger::Automatic)?;

        let prior = self.assessment.current_council_run().cloned().ok_or_else(|| WorkflowError::InvalidTransition {
            from: "Stage3Running".to_string(),
            to: "no prior council run to revise".to_string(),
        })?;

        let outcome = ria_council::chairman::run_stage3(
            &self.council_config.chairman_model,
            &self.assessment.proposal_text,
            &self.context,
            &prior.stage1,
            &prior.stage1_labels,
            &prior.stage2_aggregated,
            feedback.as_deref(),
            self.council_config.allow_chairman_fallback,
            self.client.as_ref(),
            self.cancel.clone(),
        )
        .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                self.fail(err.to_string());
                return Err(WorkflowError::Council(err));
            }
        };

        let mut run = CouncilRun::new(prior.bootstrap_config.clone().unwrap_or_default());
        run.stage1 = prior.stage1.clone();
        run.stage1_labels = prior.stage1_labels.clone();
        run.stage2 = prior.stage2.clone();
        run.stage2_aggregated = prior.stage2_aggregated.clone();
        run.stage3_text = Some(outcome.text.clone());
        run.chairman_fallback = outcome.fallback;
        run.stage3_structured = Some(ria_council::extract(&outcome.text));
        run.revision_feedback = feedback;

        if let Some(sections) = &run.stage3_structured {
            self.assessment.quality_metrics.missing_theme_count = sections.missing_theme_count;
        }
        self.assessment.council_history.push(run);
        self.transition(WorkflowState::Stage3Complete, TransitionTrigger::Automatic)?;
        self.transition(WorkflowState::SynthesisReviewPending, TransitionTrigger::Automatic)?;
        Ok(())
    }

    /// Runs the section extractor over the latest council run's chairman
    /// text and stores the result, ending at `ReportReviewPending`.
    async fn extract_report(&mut self, from: WorkflowState, _edit_note: Option<String>) -> Result<(), WorkflowError> {
        let _ = from;
        self.transition(WorkflowState::ExtractingData, TransitionTrigger::Automatic)?;
        let text = self
            .assessment
            .current_council_run()
            .and_then(|run| run.stage3_text.clone())
            .unwrap_or_default();
        let sections = ria_council::extract(&text);
        self.assessment.quality_metrics.missing_theme_count = sections.missing_theme_count;
        self.assessment.report_sections = Some(sections);
        self.transition(WorkflowState::GeneratingReport, TransitionTrigger::Automatic)?;
        self.transition(WorkflowState::ReportReviewPending, TransitionTrigger::Automatic)?;
        Ok(())
    }

    /// Applies a human decision on the generated-report review gate.
    pub async fn submit_report_review(&mut self, decision: ReviewDecision) -> Result<(), WorkflowError> {
        if self.assessment.state != WorkflowState::ReportReviewPending {
            return Err(WorkflowError::ReviewNotPending { review_type: ReviewType::Report });
        }
        self.transition(WorkflowState::ReportReviewInProgress, TransitionTrigger::Manual)?;

        match decision.decision {
            ReviewAction::Approve => {
                self.transition(WorkflowState::ReportApproved, TransitionTrigger::Manual)?;
                self.assessment.review_decisions.push(decision);
                self.transition(WorkflowState::UpdatingKnowledge, TransitionTrigger::Automatic)?;
                self.transition(WorkflowState::Completed, TransitionTrigger::Automatic)?;
                Ok(())
            }
            ReviewAction::Edit => {
                self.transition(WorkflowState::ReportEditRequested, TransitionTrigger::Manual)?;
                if let Some(sections) = self.assessment.report_sections.as_mut() {
                    sections.overall_assessment_summary = Some(decision.comments.clone());
                }
                self.assessment.review_decisions.push(decision);
                self.transition(WorkflowState::ReportReviewPending, TransitionTrigger::Automatic)?;
                Ok(())
            }
            ReviewAction::RequestRevision => {
                self.record_revision(ReviewType::Report)?;
                self.transition(WorkflowState::ReportRegenerationRequested, TransitionTrigger::Manual)?;
                self.assessment.review_decisions.push(decision);
                self.transition(WorkflowState::GeneratingReport, TransitionTrigger::Automatic)?;
                let text = self
                    .assessment
                    .current_council_run()
                    .and_then(|run| run.stage3_text.clone())
                    .unwrap_or_default();
                let sections = ria_council::extract(&text);
                self.assessment.quality_metrics.missing_theme_count = sections.missing_theme_count;
                self.assessment.report_sections = Some(sections);
                self.transition(WorkflowState::ReportReviewPending, TransitionTrigger::Automatic)?;
                Ok(())
            }
            ReviewAction::Reject => {
                self.transition(WorkflowState::ReportRejected, TransitionTrigger::Manual)?;
                self.assessment.review_decisions.push(decision);
                Ok(())
            }
        }
    }
}

/// Coordinates many concurrently-running assessments.
pub struct WorkflowManager {
    active: HashMap<String, WorkflowEngine>,
    completed: Vec<Assessment>,
    max_concurrent: usize,
}

impl WorkflowManager {
    pub fn new(max_concurrent: usize) -> Self {
        Self { active: HashMap::new(), completed: Vec::new(), max_concurrent }
    }

    pub fn start(&mut self, engine: WorkflowEngine) -> Result<String, WorkflowError> {
        if self.active.len() >= self.max_concurrent {
            return Err(WorkflowError::InvalidTransition {
                from: "manager".to_string(),
                to: format!("maximum concurrent assessments ({}) exceeded", self.max_concurrent),
            });
        }
        let id = engine.assessment().assessment_id.to_string();
        self.active.insert(id.clone(), engine);
        Ok(id)
    }

    pub fn get(&self, assessment_id: &str) -> Option<&WorkflowEngine> {
        self.active.get(assessment_id)
    }

    pub fn get_mut(&mut self, assessment_id: &str) -> Option<&mut WorkflowEngine> {
        self.active.get_mut(assessment_id)
    }

    pub fn retire_if_terminal(&mut self, assessment_id: &str) -> Result<(), WorkflowError> {
        let engine = self.active.get(assessment_id).ok_or_else(|| WorkflowError::NotFound(assessment_id.to_string()))?;
        if !engine.is_terminal() {
            return Err(WorkflowError::InvalidTransition {
                from: engine.state().label(),
                to: "completed (not terminal yet)".to_string(),
            });
        }
        let engine = self.active.remove(assessment_id).expect("checked above");
        self.completed.push(engine.into_assessment());
        Ok(())
    }

    /// Looks up an assessment by id, active or already retired.
    pub fn find_assessment(&self, assessment_id: &str) -> Option<Assessment> {
        if let Some(engine) = self.active.get(assessment_id) {
            return Some(engine.assessment().clone());
        }
        self.completed.iter().find(|a| a.assessment_id.to_string() == assessment_id).cloned()
    }

    /// All assessments known to this manager, active or retired.
    pub fn all_assessments(&self) -> Vec<Assessment> {
        let mut all: Vec<Assessment> = self.active.values().map(|e| e.assessment().clone()).collect();
        all.extend(self.completed.iter().cloned());
        all
    }

    pub fn statistics(&self) -> WorkflowStatistics {
        let total_completed = self.completed.len();
        let succeeded = self.completed.iter().filter(|a| matches!(a.state, WorkflowState::Completed)).count();
        WorkflowStatistics {
            total_active: self.active.len(),
            total_completed,
            succeeded,
            success_rate: if total_completed > 0 { succeeded as f64 / total_completed as f64 } else { 0.0 },
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowStatistics {
    pub total_active: usize,
    pub total_completed: usize,
    pub succeeded: usize,
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ria_contracts::council::BootstrapConfig;
    use ria_contracts::{ContextMetadata, ModelId};
    use ria_model_client::{Message, ModelResponse, QueryParams};

    struct StubClient;

    #[async_trait]
    impl ModelClient for StubClient {
        async fn query(
            &self,
            model_id: &str,
            _messages: &[Message],
            _params: &QueryParams,
            _cancel: CancellationToken,
        ) -> Result<ModelResponse, ria_model_client::ModelError> {
            let content = if model_id == "chairman" {
                "Background and Problem Definition\nBg.\nExecutive Summary\nEs.\nProposal Overview\nPo.\n\
                 21 Belgian Impact Themes Assessment\n[1] positive impact [doc-1]\n\
                 Overall Assessment Summary\nDone."
                    .to_string()
            } else {
                format!("opinion from {model_id}. Ranking: Response A, Response B")
            };
            Ok(ModelResponse { content, model_id: model_id.to_string() })
        }
    }

    fn config() -> CouncilConfig {
        CouncilConfig {
            council_models: vec![ModelId::new("m1"), ModelId::new("m2")],
            chairman_model: ModelId::new("chairman"),
            bootstrap: BootstrapConfig { iterations: 1, enabled: false, ..BootstrapConfig::default() },
            allow_chairman_fallback: true,
        }
    }

    #[tokio::test]
    async fn happy_path_reaches_completed() {
        let assessment = Assessment::new("a proposal", ContextMetadata::default());
        let (mut engine, _rx) =
            WorkflowEngine::new(assessment, "context", config(), Arc::new(StubClient), CancellationToken::new());

        engine.run_synthesis().await.unwrap();
        assert_eq!(*engine.state(), WorkflowState::SynthesisReviewPending);

        engine
            .submit_synthesis_review(ReviewDecision::new(ReviewType::Synthesis, ReviewAction::Approve, "lgtm", "alice", None))
            .await
            .unwrap();
        assert_eq!(*engine.state(), WorkflowState::ReportReviewPending);

        engine
            .submit_report_review(ReviewDecision::new(ReviewType::Report, ReviewAction::Approve, "ship it", "alice", None))
            .await
            .unwrap();
        assert_eq!(*engine.state(), WorkflowState::Completed);
    }

    #[tokio::test]
    async fn revision_loop_past_limit_fails_the_assessment() {
        let assessment = Assessment::new("a proposal", ContextMetadata::default());
        let (mut engine, _rx) =
            WorkflowEngine::new(assessment, "context", config(), Arc::new(StubClient), CancellationToken::new());
        engine.run_synthesis().await.unwrap();

        for _ in 0..REVISION_LIMIT {
            engine
                .submit_synthesis_review(ReviewDecision::new(
                    ReviewType::Synthesis,
                    ReviewAction::RequestRevision,
                    "needs work",
                    "alice",
                    Some("tighten section 2".to_string()),
                ))
                .await
                .unwrap();
            assert_eq!(*engine.state(), WorkflowState::SynthesisReviewPending);
        }

        let result = engine
            .submit_synthesis_review(ReviewDecision::new(
                ReviewType::Synthesis,
                ReviewAction::RequestRevision,
                "still not right",
                "alice",
                Some("one more pass".to_string()),
            ))
            .await;
        assert!(matches!(result, Err(WorkflowError::RevisionLimitExceeded { review_type: ReviewType::Synthesis })));
        assert!(matches!(engine.state(), WorkflowState::Failed { .. }));
    }

    #[tokio::test]
    async fn revision_only_reinvokes_the_chairman_not_stage1_or_stage2() {
        struct CountingClient {
            non_chairman_calls: std::sync::atomic::AtomicUsize,
        }

        #[async_trait]
        impl ModelClient for CountingClient {
            async fn query(
                &self,
                model_id: &str,
                _messages: &[Message],
                _params: &QueryParams,
                _cancel: CancellationToken,
            ) -> Result<ModelResponse, ria_model_client::ModelError> {
                if model_id != "chairman" {
                    self.non_chairman_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
                let content = if model_id == "chairman" {
                    "Background and Problem Definition\nBg.\nExecutive Summary\nEs.\nProposal Overview\nPo.\n\
                     21 Belgian Impact Themes Assessment\n[1] positive impact [doc-1]\n\
                     Overall Assessment Summary\nDone."
                        .to_string()
                } else {
                    format!("opinion from {model_id}. Ranking: Response A, Response B")
                };
                Ok(ModelResponse { content, model_id: model_id.to_string() })
            }
        }

        let client = Arc::new(CountingClient { non_chairman_calls: std::sync::atomic::AtomicUsize::new(0) });
        let assessment = Assessment::new("a proposal", ContextMetadata::default());
        let (mut engine, _rx) = WorkflowEngine::new(assessment, "context", config(), client.clone(), CancellationToken::new());
        engine.run_synthesis().await.unwrap();
        let calls_after_initial_run = client.non_chairman_calls.load(std::sync::atomic::Ordering::SeqCst);
        assert!(calls_after_initial_run > 0);

        engine
            .submit_synthesis_review(ReviewDecision::new(
                ReviewType::Synthesis,
                ReviewAction::RequestRevision,
                "needs work",
                "alice",
                Some("tighten section 2".to_string()),
            ))
            .await
            .unwrap();

        assert_eq!(client.non_chairman_calls.load(std::sync::atomic::Ordering::SeqCst), calls_after_initial_run);
    }

    #[tokio::test]
    async fn rejects_review_submission_when_no_review_is_pending() {
        let assessment = Assessment::new("a proposal", ContextMetadata::default());
        let (mut engine, _rx) =
            WorkflowEngine::new(assessment, "context", config(), Arc::new(StubClient), CancellationToken::new());
        let result = engine
            .submit_synthesis_review(ReviewDecision::new(ReviewType::Synthesis, ReviewAction::Approve, "x", "alice", None))
            .await;
        assert!(matches!(result, Err(WorkflowError::ReviewNotPending { review_type: ReviewType::Synthesis })));
    }
}
