use ria_contracts::WorkflowState;

/// `WorkflowState` without its `Failed` payload, so the transition table can
/// be a plain match over discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
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
    Failed,
    Cancelled,
}

impl From<&WorkflowState> for StateKind {
    fn from(state: &WorkflowState) -> Self {
        match state {
            WorkflowState::Draft => StateKind::Draft,
            WorkflowState::Preprocessing => StateKind::Preprocessing,
            WorkflowState::Stage1Running => StateKind::Stage1Running,
            WorkflowState::Stage1Complete => StateKind::Stage1Complete,
            WorkflowState::Stage2Running => StateKind::Stage2Running,
            WorkflowState::Stage2Complete => StateKind::Stage2Complete,
            WorkflowState::Stage3Running => StateKind::Stage3Running,
            WorkflowState::Stage3Complete => StateKind::Stage3Complete,
            WorkflowState::SynthesisReviewPending => StateKind::SynthesisReviewPending,
            WorkflowState::SynthesisReviewInProgress => StateKind::SynthesisReviewInProgress,
            WorkflowState::SynthesisApproved => StateKind::SynthesisApproved,
            WorkflowState::SynthesisRevisionRequested => StateKind::SynthesisRevisionRequested,
            WorkflowState::SynthesisRejected => StateKind::SynthesisRejected,
            WorkflowState::ExtractingData => StateKind::ExtractingData,
            WorkflowState::GeneratingReport => StateKind::GeneratingReport,
            WorkflowState::ReportReviewPending => StateKind::ReportReviewPending,
            WorkflowState::ReportReviewInProgress => StateKind::ReportReviewInProgress,
            WorkflowState::ReportApproved => StateKind::ReportApproved,
            WorkflowState::ReportEditRequested => StateKind::ReportEditRequested,
            WorkflowState::ReportRegenerationRequested => StateKind::ReportRegenerationRequested,
            WorkflowState::ReportRejected => StateKind::ReportRejected,
            WorkflowState::UpdatingKnowledge => StateKind::UpdatingKnowledge,
            WorkflowState::Completed => StateKind::Completed,
            WorkflowState::Failed { .. } => StateKind::Failed,
            WorkflowState::Cancelled => StateKind::Cancelled,
        }
    }
}

/// The state graph (spec §4.9). Any non-terminal state may also move to
/// `Failed`/`Cancelled`; those edges are included explicitly rather than
/// bolted on, so the table is the single source of truth for what is legal.
pub fn valid_transitions(from: StateKind) -> Vec<StateKind> {
    use StateKind::*;
    match from {
        Draft => vec![Preprocessing, Cancelled, Failed],
        Preprocessing => vec![Stage1Running, Failed, Cancelled],
        Stage1Running => vec![Stage1Complete, Failed, Cancelled],
        Stage1Complete => vec![Stage2Running, Failed, Cancelled],
        Stage2Running => vec![Stage2Complete, Failed, Cancelled],
        Stage2Complete => vec![Stage3Running, Failed, Cancelled],
        Stage3Running => vec![Stage3Complete, Failed, Cancelled],
        Stage3Complete => vec![SynthesisReviewPending, Failed, Cancelled],
        SynthesisReviewPending => vec![SynthesisReviewInProgress, Cancelled],
        SynthesisReviewInProgress => {
            vec![SynthesisApproved, SynthesisRevisionRequested, SynthesisRejected, Cancelled]
        }
        SynthesisApproved => vec![ExtractingData, Failed, Cancelled],
        // Revision feeds back into the chairman stage, not all the way to stage 1.
        SynthesisRevisionRequested => vec![Stage3Running, Failed, Cancelled],
        SynthesisRejected => vec![],
        ExtractingData => vec![GeneratingReport, Failed, Cancelled],
        GeneratingReport => vec![ReportReviewPending, Failed, Cancelled],
        ReportReviewPending => vec![ReportReviewInProgress, Cancelled],
        ReportReviewInProgress => {
            vec![ReportApproved, ReportEditRequested, ReportRegenerationRequested, ReportRejected, Cancelled]
        }
        ReportApproved => vec![UpdatingKnowledge, Failed, Cancelled],
        ReportEditRequested => vec![ReportReviewPending, Failed, Cancelled],
        ReportRegenerationRequested => vec![GeneratingReport, Failed, Cancelled],
        ReportRejected => vec![],
        UpdatingKnowledge => vec![Completed, Failed, Cancelled],
        Completed | Failed | Cancelled => vec![],
    }
}

pub fn is_allowed(from: &WorkflowState, to: &WorkflowState) -> bool {
    valid_transitions(StateKind::from(from)).contains(&StateKind::from(to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_can_move_to_preprocessing() {
        assert!(is_allowed(&WorkflowState::Draft, &WorkflowState::Preprocessing));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        assert!(!is_allowed(&WorkflowState::Completed, &WorkflowState::Draft));
        assert!(!is_allowed(&WorkflowState::Cancelled, &WorkflowState::Draft));
        assert!(!is_allowed(
            &WorkflowState::Failed { reason: "x".to_string() },
            &WorkflowState::Draft
        ));
    }

    #[test]
    fn cannot_skip_stages() {
        assert!(!is_allowed(&WorkflowState::Draft, &WorkflowState::Stage1Running));
    }

    #[test]
    fn synthesis_revision_returns_to_stage3_not_stage1() {
        assert!(is_allowed(&WorkflowState::SynthesisRevisionRequested, &WorkflowState::Stage3Running));
        assert!(!is_allowed(&WorkflowState::SynthesisRevisionRequested, &WorkflowState::Stage1Running));
    }
}
