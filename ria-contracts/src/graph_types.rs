//! Shared vocabulary for the knowledge graph (spec §3/§4.4): node and edge
//! type tags. The graph storage and traversal implementation live in the
//! `ria-graph` crate; this module only fixes the typed vocabulary so every
//! crate agrees on what a node or edge *is*.

use serde::{Deserialize, Serialize};

use crate::category::{AnalysisPattern, Domain, PolicyCategory};
use crate::ids::{ChunkId, DocumentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Category,
    Domain,
    AnalysisPattern,
    Document,
    Chunk,
}

/// A graph node identity. Category/Domain/AnalysisPattern nodes are keyed by
/// their closed-set value directly (one node per enum variant); Document and
/// Chunk nodes are keyed by their opaque id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeId {
    Category(PolicyCategory),
    Domain(Domain),
    AnalysisPattern(AnalysisPattern),
    Document(DocumentId),
    Chunk(ChunkId),
}

impl NodeId {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeId::Category(_) => NodeKind::Category,
            NodeId::Domain(_) => NodeKind::Domain,
            NodeId::AnalysisPattern(_) => NodeKind::AnalysisPattern,
            NodeId::Document(_) => NodeKind::Document,
            NodeId::Chunk(_) => NodeKind::Chunk,
        }
    }
}

/// Directed edge types. Bidirectional relationships from spec §3 are
/// materialized as two directed edges (the forward and reverse variant) so
/// traversal is O(1) in both directions; this enum only names the relation,
/// direction is implied by which node holds the outgoing edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Category -> Domain
    HasDomain,
    /// Domain -> Category
    HasDomainRev,
    /// Domain -> AnalysisPattern
    UsesPattern,
    /// AnalysisPattern -> Domain
    UsesPatternRev,
    /// Document -> Chunk
    ContainsChunk,
    /// Category -> Chunk
    ReferencesCategory,
    /// Chunk -> Category
    ReferencesCategoryRev,
    /// Category -> Chunk (kind=analysis)
    AnalyzesCategory,
    /// Chunk -> Category
    AnalyzesCategoryRev,
    /// Chunk(evidence) -> Chunk(analysis)
    SupportsAnalysis,
    /// Chunk(analysis) -> Chunk(evidence)
    SupportsAnalysisRev,
}

impl EdgeKind {
    /// The permitted (source_kind, target_kind) pair for this edge type,
    /// enforced at insertion time (spec §4.4 invariant: "typed edges only
    /// connect permitted node-type pairs").
    pub fn allowed_pair(&self) -> (NodeKind, NodeKind) {
        use EdgeKind::*;
        use NodeKind::*;
        match self {
            HasDomain => (Category, Domain),
            HasDomainRev => (Domain, Category),
            UsesPattern => (Domain, AnalysisPattern),
            UsesPatternRev => (AnalysisPattern, Domain),
            ContainsChunk => (Document, Chunk),
            ReferencesCategory => (Category, Chunk),
            ReferencesCategoryRev => (Chunk, Category),
            AnalyzesCategory => (Category, Chunk),
            AnalyzesCategoryRev => (Chunk, Category),
            SupportsAnalysis => (Chunk, Chunk),
            SupportsAnalysisRev => (Chunk, Chunk),
        }
    }
}
