#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{review_type:?} review is not pending for this assessment")]
    ReviewNotPending { review_type: ria_contracts::ReviewType },

    #[error("revision limit exceeded for {review_type:?} review")]
    RevisionLimitExceeded { review_type: ria_contracts::ReviewType },

    #[error("assessment {0} not found")]
    NotFound(String),

    #[error("council run failed: {0}")]
    Council(#[from] ria_council::CouncilError),
}
