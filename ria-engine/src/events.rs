//! External event stream vocabulary (spec §6) and the translation from the
//! workflow engine's internal `ProgressEvent`s.

use ria_contracts::{AssessmentId, ReviewType};
use ria_workflow::ProgressEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    WorkflowStart { stage: String },
    Stage { stage: String, node: Option<String> },
    WorkflowComplete,
    ReviewRequired { review_type: ReviewType, assessment_id: AssessmentId },
    Report { assessment_id: AssessmentId },
    ValidationError { data: serde_json::Value },
    Error { message: String },
}

/// Maps a workflow engine's internal stage-transition events onto the
/// external vocabulary. `ReportReviewPending` is reported as `Report` rather
/// than a second `ReviewRequired`, since by the time a caller would act on it
/// the generated report is the interesting payload; the review queue itself
/// is still the source of truth for what's pending (spec §6/§4.10).
pub fn translate_progress_event(event: ProgressEvent, assessment_id: AssessmentId) -> Event {
    match event.stage.as_str() {
        "Preprocessing" => Event::WorkflowStart { stage: event.stage },
        "SynthesisReviewPending" => Event::ReviewRequired { review_type: ReviewType::Synthesis, assessment_id },
        "ReportReviewPending" => Event::Report { assessment_id },
        "Completed" => Event::WorkflowComplete,
        stage if stage.starts_with("Failed(") => Event::Error { message: stage.to_string() },
        stage => Event::Stage { stage: stage.to_string(), node: event.node },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_stage_becomes_workflow_complete() {
        let id = AssessmentId::new();
        let event = translate_progress_event(ProgressEvent::new("state_transition", "Completed"), id);
        assert!(matches!(event, Event::WorkflowComplete));
    }

    #[test]
    fn synthesis_review_pending_becomes_review_required() {
        let id = AssessmentId::new();
        let event = translate_progress_event(ProgressEvent::new("state_transition", "SynthesisReviewPending"), id);
        assert!(matches!(event, Event::ReviewRequired { review_type: ReviewType::Synthesis, .. }));
    }

    #[test]
    fn failed_stage_becomes_error() {
        let id = AssessmentId::new();
        let event = translate_progress_event(ProgressEvent::new("state_transition", "Failed(revision_limit_exceeded)"), id);
        assert!(matches!(event, Event::Error { .. }));
    }
}
