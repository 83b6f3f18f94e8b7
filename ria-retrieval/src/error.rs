#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("index error during retrieval: {0}")]
    Index(#[from] ria_index::IndexError),
}
