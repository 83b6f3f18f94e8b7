#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding failure during add: {0}")]
    Embedding(#[from] ria_embeddings::EmbeddingError),

    #[error("io error persisting index: {0}")]
    Io(#[from] std::io::Error),

    #[error("(de)serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
