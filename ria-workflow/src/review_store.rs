use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ria_contracts::{AssessmentId, ReviewDecision, ReviewType};
use serde::{Deserialize, Serialize};

/// Queue priority drives the SLA deadline assigned at enqueue time. No
/// advanced authorization model sits in front of this store; callers are
/// trusted to have already checked the reviewer is entitled to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl ReviewPriority {
    /// Scales the review type's base SLA (spec §4.10: `synthesis=24h,
    /// report=48h`, "with per-priority overrides").
    fn multiplier(self) -> f64 {
        match self {
            ReviewPriority::Low => 2.0,
            ReviewPriority::Normal => 1.0,
            ReviewPriority::High => 0.5,
            ReviewPriority::Urgent => 0.2,
        }
    }
}

/// Base SLA hours per review type before the priority multiplier is
/// applied. Carried here rather than hardcoded in `sla()` so a caller
/// wiring in `ria-config`'s `review_slas` can override it.
#[derive(Debug, Clone, Copy)]
pub struct ReviewSlaBase {
    pub synthesis_hours: i64,
    pub report_hours: i64,
}

impl Default for ReviewSlaBase {
    fn default() -> Self {
        Self { synthesis_hours: 24, report_hours: 48 }
    }
}

impl ReviewSlaBase {
    fn base_hours(self, review_type: ReviewType) -> i64 {
        match review_type {
            ReviewType::Synthesis => self.synthesis_hours,
            ReviewType::Report => self.report_hours,
        }
    }

    fn deadline_for(self, review_type: ReviewType, priority: ReviewPriority) -> Duration {
        let hours = (self.base_hours(review_type) as f64 * priority.multiplier()).round() as i64;
        Duration::hours(hours.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewQueueEntry {
    pub assessment_id: AssessmentId,
    pub review_type: ReviewType,
    pub priority: ReviewPriority,
    pub assigned_to: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub sla_deadline: DateTime<Utc>,
}

impl ReviewQueueEntry {
    pub fn is_overdue(&self) -> bool {
        Utc::now() > self.sla_deadline
    }
}

/// Pending human-review queue, keyed by assessment, with SLA tracking
/// (spec §4.10). The workflow engine itself enacts review decisions; this
/// store is the surface a review dashboard or worker pool polls.
pub struct ReviewStore {
    queue: DashMap<AssessmentId, ReviewQueueEntry>,
    decisions: DashMap<AssessmentId, Vec<ReviewDecision>>,
    sla_base: ReviewSlaBase,
}

impl Default for ReviewStore {
    fn default() -> Self {
        Self::new(ReviewSlaBase::default())
    }
}

impl ReviewStore {
    pub fn new(sla_base: ReviewSlaBase) -> Self {
        Self { queue: DashMap::new(), decisions: DashMap::new(), sla_base }
    }

    pub fn enqueue(&self, assessment_id: AssessmentId, review_type: ReviewType, priority: ReviewPriority) {
        let now = Utc::now();
        self.queue.insert(
            assessment_id,
            ReviewQueueEntry {
                assessment_id,
                review_type,
                priority,
                assigned_to: None,
                enqueued_at: now,
                sla_deadline: now + self.sla_base.deadline_for(review_type, priority),
            },
        );
    }

    pub fn assign(&self, assessment_id: &AssessmentId, reviewer_id: impl Into<String>) -> bool {
        match self.queue.get_mut(assessment_id) {
            Some(mut entry) => {
                entry.assigned_to = Some(reviewer_id.into());
                true
            }
            None => false,
        }
    }

    /// Records a decision and removes the entry from the pending queue.
    pub fn record_decision(&self, assessment_id: AssessmentId, decision: ReviewDecision) {
        self.decisions.entry(assessment_id).or_default().push(decision);
        self.queue.remove(&assessment_id);
    }

    pub fn pending(&self) -> Vec<ReviewQueueEntry> {
        self.queue.iter().map(|e| e.value().clone()).collect()
    }

    pub fn pending_for_type(&self, review_type: ReviewType) -> Vec<ReviewQueueEntry> {
        self.queue.iter().filter(|e| e.review_type == review_type).map(|e| e.value().clone()).collect()
    }

    pub fn overdue(&self) -> Vec<ReviewQueueEntry> {
        self.queue.iter().filter(|e| e.is_overdue()).map(|e| e.value().clone()).collect()
    }

    pub fn decisions_for(&self, assessment_id: &AssessmentId) -> Vec<ReviewDecision> {
        self.decisions.get(assessment_id).map(|d| d.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ria_contracts::ReviewAction;

    #[test]
    fn enqueue_and_assign_round_trips() {
        let store = ReviewStore::default();
        let id = AssessmentId::new();
        store.enqueue(id, ReviewType::Synthesis, ReviewPriority::High);
        assert_eq!(store.pending().len(), 1);
        assert!(store.assign(&id, "alice"));
        assert_eq!(store.pending()[0].assigned_to.as_deref(), Some("alice"));
    }

    #[test]
    fn recording_a_decision_clears_the_queue_entry() {
        let store = ReviewStore::default();
        let id = AssessmentId::new();
        store.enqueue(id, ReviewType::Report, ReviewPriority::Normal);
        store.record_decision(id, ReviewDecision::new(ReviewType::Report, ReviewAction::Approve, "ok", "bob", None));
        assert!(store.pending().is_empty());
        assert_eq!(store.decisions_for(&id).len(), 1);
    }

    #[test]
    fn urgent_priority_has_a_tighter_deadline_than_low() {
        let store = ReviewStore::default();
        let urgent_id = AssessmentId::new();
        let low_id = AssessmentId::new();
        store.enqueue(urgent_id, ReviewType::Synthesis, ReviewPriority::Urgent);
        store.enqueue(low_id, ReviewType::Synthesis, ReviewPriority::Low);
        let urgent = store.pending().into_iter().find(|e| e.assessment_id == urgent_id).unwrap();
        let low = store.pending().into_iter().find(|e| e.assessment_id == low_id).unwrap();
        assert!(urgent.sla_deadline < low.sla_deadline);
    }
}
