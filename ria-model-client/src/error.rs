#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("transient model error: {0}")]
    Transient(String),
    #[error("permanent model error: {0}")]
    Permanent(String),
    #[error("call cancelled")]
    Cancelled,
    #[error("circuit open for model {model_id}")]
    CircuitOpen { model_id: String },
}

impl ModelError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Transient(_))
    }
}
