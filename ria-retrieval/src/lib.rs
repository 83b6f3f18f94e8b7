//! C5: strategy selection, concurrent retrieval, merge/dedupe, quality
//! gating and context synthesis over C3 (vector store) and C4 (graph).

pub mod context;
pub mod error;
pub mod features;
pub mod orchestrator;
pub mod strategy;

pub use context::{ContextBundle, ContextEntry};
pub use error::RetrievalError;
pub use features::{extract_features, Complexity, QueryFeatures};
pub use orchestrator::{RetrievalOrchestrator, RetrievalOutcome, RetrievalRequest, DEFAULT_CONTEXT_BUDGET};
pub use strategy::{select_strategy, Strategy};
