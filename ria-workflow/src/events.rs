use serde::{Deserialize, Serialize};

/// Progress event streamed to a caller watching an in-flight assessment
/// (spec §4.9 execution & streaming). `node` names the concrete piece of
/// work within `stage` that just ran, when finer-grained than the stage
/// itself; `data` carries stage-specific payloads (e.g. a partial response
/// count) as opaque JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub event_type: String,
    pub stage: String,
    pub node: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl ProgressEvent {
    pub fn new(event_type: impl Into<String>, stage: impl Into<String>) -> Self {
        Self { event_type: event_type.into(), stage: stage.into(), node: None, data: None }
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
