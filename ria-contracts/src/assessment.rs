use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::council::CouncilRun;
use crate::ids::AssessmentId;
use crate::report::ReportSections;
use crate::review::ReviewDecision;

/// Workflow state machine states (spec §4.9). `Failed` carries the reason
/// string recorded at the failing transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    Draft,
    Preprocessing,
    Stage1Running,
    Stage1Complete,
    Stage2Running,
    Stage2Complete,
    Stage3Running,
    Stage3Complete,
    SynthesisReviewPending,
    SynthesisReviewInProgress,
    SynthesisApproved,
    SynthesisRevisionRequested,
    SynthesisRejected,
    ExtractingData,
    GeneratingReport,
    ReportReviewPending,
    ReportReviewInProgress,
    ReportApproved,
    ReportEditRequested,
    ReportRegenerationRequested,
    ReportRejected,
    UpdatingKnowledge,
    Completed,
    Failed { reason: String },
    Cancelled,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Completed | WorkflowState::Failed { .. } | WorkflowState::Cancelled
        )
    }

    pub fn label(&self) -> String {
        match self {
            WorkflowState::Failed { reason } => format!("Failed({reason})"),
            other => format!("{other:?}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub retrieval_hit_count: usize,
    pub retrieval_mean_score: f64,
    pub retrieval_expanded: bool,
    /// Set when the retrieval orchestrator flagged the corpus as too thin to
    /// support a confident synthesis, so a reviewer sees `context=empty` was
    /// raised rather than discovering it only from a low hit count.
    pub insufficient_context: bool,
    pub missing_theme_count: usize,
    pub revision_count_by_type: HashMap<String, u32>,
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self {
            retrieval_hit_count: 0,
            retrieval_mean_score: 0.0,
            retrieval_expanded: false,
            insufficient_context: false,
            missing_theme_count: 0,
            revision_count_by_type: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub jurisdiction: Option<String>,
    pub requested_categories: Vec<String>,
    pub extra: HashMap<String, String>,
}

impl Default for ContextMetadata {
    fn default() -> Self {
        Self {
            jurisdiction: None,
            requested_categories: Vec::new(),
            extra: HashMap::new(),
        }
    }
}

/// Top-level entity owned exclusively by the workflow engine (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub assessment_id: AssessmentId,
    pub proposal_text: String,
    pub context_metadata: ContextMetadata,
    pub state: WorkflowState,
    pub council_history: Vec<CouncilRun>,
    pub report_sections: Option<ReportSections>,
    pub sources: Vec<String>,
    pub quality_metrics: QualityMetrics,
    pub review_decisions: Vec<ReviewDecision>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assessment {
    pub fn new(proposal_text: impl Into<String>, context_metadata: ContextMetadata) -> Self {
        let now = Utc::now();
        Self {
            assessment_id: AssessmentId::new(),
            proposal_text: proposal_text.into(),
            context_metadata,
            state: WorkflowState::Draft,
            council_history: Vec::new(),
            report_sections: None,
            sources: Vec::new(),
            quality_metrics: QualityMetrics::default(),
            review_decisions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn current_council_run(&self) -> Option<&CouncilRun> {
        self.council_history.last()
    }

    pub fn current_council_run_mut(&mut self) -> Option<&mut CouncilRun> {
        self.council_history.last_mut()
    }
}
