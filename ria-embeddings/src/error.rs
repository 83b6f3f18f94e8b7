/// Embedding failures, classified for retry purposes (spec §4.1/§7).
/// Transient errors are retried by callers (the model client's retry
/// machinery, or a retrieval-orchestrator wrapper); permanent ones surface.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("transient embedding failure: {0}")]
    Transient(String),

    #[error("permanent embedding failure: {0}")]
    Permanent(String),

    #[error("provider returned dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbeddingError::Transient(_))
    }
}
