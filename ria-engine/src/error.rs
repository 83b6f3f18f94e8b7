use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] ria_retrieval::RetrievalError),

    #[error("workflow error: {0}")]
    Workflow(#[from] ria_workflow::WorkflowError),

    #[error("assessment {0} not found")]
    NotFound(String),
}
