#[derive(Debug, thiserror::Error)]
pub enum CouncilError {
    #[error("chairman model must not also be a council model")]
    ChairmanInCouncil,

    #[error("stage 1 produced fewer than 2 responses ({got} available)")]
    InsufficientResponses { got: usize },

    #[error("model client error: {0}")]
    Model(#[from] ria_model_client::ModelError),
}
