//! C9 (workflow state machine) and C10 (human review queue).

pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod review_store;
pub mod transitions;

pub use engine::{WorkflowEngine, WorkflowManager, WorkflowStatistics, REVISION_LIMIT};
pub use error::WorkflowError;
pub use events::ProgressEvent;
pub use history::{StateTransition, TransitionTrigger};
pub use review_store::{ReviewPriority, ReviewQueueEntry, ReviewStore};
