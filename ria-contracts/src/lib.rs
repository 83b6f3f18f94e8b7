//! Shared data model for the regulatory impact assessment engine: closed-set
//! vocabulary, chunk/document ids, the knowledge-graph node/edge vocabulary,
//! council and workflow records. Every other crate in this workspace depends
//! on this one; it depends on nothing in the workspace.

pub mod assessment;
pub mod category;
pub mod chunk;
pub mod council;
pub mod error;
pub mod graph_types;
pub mod ids;
pub mod report;
pub mod review;

pub use assessment::{Assessment, ContextMetadata, QualityMetrics, WorkflowState};
pub use category::{AnalysisPattern, Domain, PolicyCategory};
pub use chunk::{content_hash, estimate_token_count, normalize_content, Chunk, ChunkKind, ChunkMetadata};
pub use council::{
    AggregationMethod, BootstrapConfig, CouncilRun, EvaluationCriterion, IterationRanking,
    ResponseLabel,
};
pub use error::ContractError;
pub use graph_types::{EdgeKind, NodeId, NodeKind};
pub use ids::{AssessmentId, ChunkId, DocumentId, ModelId, ReviewId};
pub use report::{ImpactTag, ReportSections, SectionName, ThemeEntry, THEME_COUNT, THEME_TITLES};
pub use review::{ReviewAction, ReviewDecision, ReviewType};
