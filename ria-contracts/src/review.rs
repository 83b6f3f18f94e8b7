use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewType {
    Synthesis,
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewAction {
    Approve,
    RequestRevision,
    Reject,
    Edit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub review_type: ReviewType,
    pub decision: ReviewAction,
    pub comments: String,
    pub reviewer_id: String,
    pub reviewed_at: DateTime<Utc>,
    pub revision_feedback: Option<String>,
}

impl ReviewDecision {
    pub fn new(
        review_type: ReviewType,
        decision: ReviewAction,
        comments: impl Into<String>,
        reviewer_id: impl Into<String>,
        revision_feedback: Option<String>,
    ) -> Self {
        Self {
            review_type,
            decision,
            comments: comments.into(),
            reviewer_id: reviewer_id.into(),
            reviewed_at: Utc::now(),
            revision_feedback,
        }
    }
}
