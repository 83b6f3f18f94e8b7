//! C4: typed adjacency-list multigraph over chunks, documents, categories,
//! domains and analysis patterns (spec §4.4).

use std::collections::{HashSet, VecDeque};

use dashmap::DashMap;
use ria_contracts::{
    Chunk, ChunkId, ChunkKind, Domain, EdgeKind, NodeId, PolicyCategory,
};

/// A hit from [`GraphEngine::chunks_by_category`] or [`GraphEngine::related`],
/// carrying the ranking signal alongside the id so callers don't need a
/// second lookup.
#[derive(Debug, Clone, Copy)]
pub struct RankedChunk {
    pub chunk_id: ChunkId,
    /// Distinct category overlap count (`chunks_by_category`) or BFS hop
    /// distance (`related`), depending on which call produced it.
    pub rank_signal: usize,
}

#[derive(Debug, Default, Clone)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub document_count: usize,
    pub chunk_count: usize,
}

/// In-memory typed multigraph. `DashMap` gives concurrent read-many access
/// without a shared lock (spec §5), matching the cache-backed read path the
/// teacher's knowledge-graph engine uses over a database-backed store.
pub struct GraphEngine {
    edges: DashMap<NodeId, Vec<(EdgeKind, NodeId)>>,
    chunk_categories: DashMap<ChunkId, Vec<PolicyCategory>>,
}

impl GraphEngine {
    pub fn new() -> Self {
        Self {
            edges: DashMap::new(),
            chunk_categories: DashMap::new(),
        }
    }

    fn link(&self, from: NodeId, kind: EdgeKind, to: NodeId) {
        debug_assert_eq!((from.kind(), to.kind()), kind.allowed_pair());
        self.edges.entry(from).or_default().push((kind, to));
    }

    /// Builds Category/Domain/Pattern nodes from the closed sets, Document
    /// nodes from unique `source_document_id`s, and links each chunk to its
    /// document, categories, and — for analysis chunks — any inferred
    /// analysis pattern (spec §4.4).
    pub fn build_from_chunks(chunks: &[Chunk]) -> Self {
        let engine = Self::new();

        for category in PolicyCategory::ALL {
            let category_node = NodeId::Category(category);
            for domain in Domain::for_category(category) {
                let domain_node = NodeId::Domain(*domain);
                engine.link(category_node, EdgeKind::HasDomain, domain_node);
                engine.link(domain_node, EdgeKind::HasDomainRev, category_node);
            }
        }

        for chunk in chunks {
            let chunk_node = NodeId::Chunk(chunk.id);
            engine
                .chunk_categories
                .insert(chunk.id, chunk.metadata.categories.clone());

            if let Some(document_id) = chunk.source_document_id {
                let document_node = NodeId::Document(document_id);
                engine.link(document_node, EdgeKind::ContainsChunk, chunk_node);
            }

            for category in &chunk.metadata.categories {
                let category_node = NodeId::Category(*category);
                match chunk.kind {
                    ChunkKind::Analysis => {
                        engine.link(category_node, EdgeKind::AnalyzesCategory, chunk_node);
                        engine.link(chunk_node, EdgeKind::AnalyzesCategoryRev, category_node);
                    }
                    _ => {
                        engine.link(category_node, EdgeKind::ReferencesCategory, chunk_node);
                        engine.link(chunk_node, EdgeKind::ReferencesCategoryRev, category_node);
                    }
                }
            }

            if matches!(chunk.kind, ChunkKind::Analysis) {
                for pattern in ria_contracts::AnalysisPattern::infer_from_text(&chunk.content) {
                    for domain in &chunk.metadata.categories {
                        for d in Domain::for_category(*domain) {
                            let domain_node = NodeId::Domain(*d);
                            let pattern_node = NodeId::AnalysisPattern(pattern);
                            engine.link(domain_node, EdgeKind::UsesPattern, pattern_node);
                            engine.link(pattern_node, EdgeKind::UsesPatternRev, domain_node);
                        }
                    }
                }
            }
        }

        engine
    }

    pub fn stats(&self) -> GraphStats {
        let edge_count: usize = self.edges.iter().map(|e| e.value().len()).sum();
        GraphStats {
            node_count: self.edges.len(),
            edge_count,
            document_count: self
                .edges
                .iter()
                .filter(|e| matches!(e.key(), NodeId::Document(_)))
                .count(),
            chunk_count: self.chunk_categories.len(),
        }
    }

    /// Returns the first `k` chunks reachable via `references_category` or
    /// `analyzes_category` edges, ordered by descending distinct-category
    /// overlap, then by chunk id (spec §4.4).
    pub fn chunks_by_category(&self, category: PolicyCategory, k: usize) -> Vec<ChunkId> {
        let category_node = NodeId::Category(category);
        let Some(outgoing) = self.edges.get(&category_node) else {
            return Vec::new();
        };

        let mut candidates: Vec<ChunkId> = outgoing
            .iter()
            .filter(|(kind, _)| matches!(kind, EdgeKind::ReferencesCategory | EdgeKind::AnalyzesCategory))
            .filter_map(|(_, node)| match node {
                NodeId::Chunk(id) => Some(*id),
                _ => None,
            })
            .collect();
        candidates.sort();
        candidates.dedup();

        let mut ranked: Vec<RankedChunk> = candidates
            .into_iter()
            .map(|id| {
                let overlap = self
                    .chunk_categories
                    .get(&id)
                    .map(|c| c.len())
                    .unwrap_or(0);
                RankedChunk { chunk_id: id, rank_signal: overlap }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.rank_signal
                .cmp(&a.rank_signal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        ranked.into_iter().take(k).map(|r| r.chunk_id).collect()
    }

    /// Bounded BFS from `chunk_id`, visiting every node at most once so the
    /// traversal terminates even on highly connected graphs (spec §4.4
    /// invariant). Returns only `Chunk` nodes, ordered by ascending path
    /// length, then descending category overlap with the seed, then by id.
    pub fn related(&self, chunk_id: ChunkId, max_depth: usize) -> Vec<ChunkId> {
        let seed_node = NodeId::Chunk(chunk_id);
        let seed_categories: HashSet<PolicyCategory> = self
            .chunk_categories
            .get(&chunk_id)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default();

        let mut visited: HashSet<NodeId> = HashSet::new();
        visited.insert(seed_node);
        let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();
        queue.push_back((seed_node, 0));

        let mut found: Vec<(ChunkId, usize)> = Vec::new();

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(outgoing) = self.edges.get(&node) else {
                continue;
            };
            for (_, neighbor) in outgoing.iter() {
                if !visited.insert(*neighbor) {
                    continue;
                }
                if let NodeId::Chunk(id) = neighbor {
                    if *id != chunk_id {
                        found.push((*id, depth + 1));
                    }
                }
                queue.push_back((*neighbor, depth + 1));
            }
        }

        found.sort_by(|(id_a, depth_a), (id_b, depth_b)| {
            let overlap = |id: &ChunkId| -> usize {
                self.chunk_categories
                    .get(id)
                    .map(|c| c.iter().filter(|cat| seed_categories.contains(cat)).count())
                    .unwrap_or(0)
            };
            depth_a
                .cmp(depth_b)
                .then_with(|| overlap(id_b).cmp(&overlap(id_a)))
                .then_with(|| id_a.cmp(id_b))
        });

        found.into_iter().map(|(id, _)| id).collect()
    }
}

impl Default for GraphEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ria_contracts::{ChunkMetadata, DocumentId};

    fn chunk(content: &str, kind: ChunkKind, category: PolicyCategory, doc: DocumentId) -> Chunk {
        let meta = ChunkMetadata::new("BE", "law", 2024).with_category(category);
        Chunk::new(kind, content, meta, "1", Some(doc)).unwrap()
    }

    #[test]
    fn chunks_by_category_orders_by_overlap_then_id() {
        let doc = DocumentId::new();
        let a = chunk("AI governance", ChunkKind::Category, PolicyCategory::Digital, doc);
        let b = chunk("AI and privacy framework", ChunkKind::Category, PolicyCategory::Digital, doc)
            .tap_add_category(PolicyCategory::FundamentalRights);
        let engine = GraphEngine::build_from_chunks(&[a.clone(), b.clone()]);
        let ranked = engine.chunks_by_category(PolicyCategory::Digital, 10);
        assert_eq!(ranked.first(), Some(&b.id));
        assert!(ranked.contains(&a.id));
    }

    #[test]
    fn related_terminates_and_excludes_seed() {
        let doc = DocumentId::new();
        let a = chunk("AI governance", ChunkKind::Category, PolicyCategory::Digital, doc);
        let b = chunk("AI risk assessment", ChunkKind::Analysis, PolicyCategory::Digital, doc);
        let engine = GraphEngine::build_from_chunks(&[a.clone(), b.clone()]);
        let related = engine.related(a.id, 2);
        assert!(!related.contains(&a.id));
        assert!(related.contains(&b.id));
    }

    #[test]
    fn related_on_empty_graph_is_empty() {
        let engine = GraphEngine::new();
        assert!(engine.related(ChunkId::new(), 2).is_empty());
    }

    trait TapAddCategory {
        fn tap_add_category(self, category: PolicyCategory) -> Self;
    }

    impl TapAddCategory for Chunk {
        fn tap_add_category(mut self, category: PolicyCategory) -> Self {
            if !self.metadata.categories.contains(&category) {
                self.metadata.categories.push(category);
            }
            self
        }
    }
}
