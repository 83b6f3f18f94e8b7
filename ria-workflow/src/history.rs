use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ria_contracts::WorkflowState;
use serde::{Deserialize, Serialize};

/// What caused a transition, recorded alongside it for audit (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionTrigger {
    Automatic,
    Manual,
    Error,
    Timeout,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: WorkflowState,
    pub to_state: WorkflowState,
    pub timestamp: DateTime<Utc>,
    pub trigger: TransitionTrigger,
    pub metadata: HashMap<String, String>,
}
