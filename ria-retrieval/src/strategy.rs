use ria_contracts::PolicyCategory;
use ria_graph::GraphEngine;

use crate::features::QueryFeatures;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    VectorOnly,
    GraphOnly,
    Hybrid,
    GraphFirst,
}

/// Chunk count above which a category is considered a specialist domain,
/// worth seeding retrieval from the graph before broadening (spec §4.5).
const GRAPH_FIRST_THRESHOLD: usize = 50;

/// Picks a retrieval strategy per spec §4.5. `dense_index_populated` and
/// `graph_populated` reflect corpus availability, not strategy preference.
pub fn select_strategy(
    features: &QueryFeatures,
    dense_index_populated: bool,
    graph_populated: bool,
    graph: &GraphEngine,
) -> Strategy {
    if !dense_index_populated && graph_populated {
        return Strategy::GraphOnly;
    }
    if !graph_populated {
        return Strategy::VectorOnly;
    }
    if let Some(category) = features.category_tags.first() {
        if graph.chunks_by_category(*category, GRAPH_FIRST_THRESHOLD + 1).len() >= GRAPH_FIRST_THRESHOLD
        {
            return Strategy::GraphFirst;
        }
    }
    Strategy::Hybrid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{extract_features, Complexity};

    #[test]
    fn falls_back_to_vector_only_without_graph() {
        let features = QueryFeatures {
            query_text: "x".into(),
            category_tags: vec![],
            complexity: Complexity::Low,
        };
        let graph = GraphEngine::new();
        assert_eq!(select_strategy(&features, true, false, &graph), Strategy::VectorOnly);
    }

    #[test]
    fn defaults_to_hybrid_with_category_signal() {
        let features = extract_features("AI governance proposal", &[]);
        let graph = GraphEngine::new();
        assert_eq!(select_strategy(&features, true, true, &graph), Strategy::Hybrid);
    }

    #[test]
    fn graph_only_when_no_dense_index() {
        let features = extract_features("AI governance proposal", &[]);
        let graph = GraphEngine::new();
        assert_eq!(select_strategy(&features, false, true, &graph), Strategy::GraphOnly);
    }
}
