//! Facade crate wiring embeddings, the hybrid index, the knowledge graph,
//! retrieval, the model client, the council protocol, the workflow state
//! machine and the review queue into the external assessment interface
//! (spec §6).

pub mod demo;
pub mod engine;
pub mod error;
pub mod events;
pub mod validation;

pub use engine::Engine;
pub use error::EngineError;
pub use events::{translate_progress_event, Event};
pub use validation::{validate_proposal, ValidationError, MIN_PROPOSAL_WORDS};
