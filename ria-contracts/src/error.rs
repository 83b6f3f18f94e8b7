use crate::category::PolicyCategory;

/// Errors raised by the shared contract layer: malformed ids, closed-set
/// parse failures, and chunk invariant violations.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("chunk content is empty after normalization")]
    EmptyContent,

    #[error("chunk kind 'evidence' requires a source_document_id")]
    EvidenceMissingSourceDocument,

    #[error("'{0}' is not a recognized policy category")]
    UnknownCategory(String),

    #[error("'{0}' is not a recognized domain")]
    UnknownDomain(String),

    #[error("'{0}' is not a recognized analysis pattern")]
    UnknownAnalysisPattern(String),

    #[error("category {0:?} already present on chunk")]
    DuplicateCategory(PolicyCategory),

    #[error("(de)serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
