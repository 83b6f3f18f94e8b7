use std::collections::HashMap;
use std::sync::Arc;

use ria_contracts::{Chunk, ChunkId, PolicyCategory};
use ria_graph::GraphEngine;
use ria_index::{HybridWeights, MetadataFilter, SearchMode, VectorStore};

use crate::context::{synthesize_context, ContextBundle};
use crate::error::RetrievalError;
use crate::features::{extract_features, QueryFeatures};
use crate::strategy::{select_strategy, Strategy};

/// Default context token budget (spec §4.5).
pub const DEFAULT_CONTEXT_BUDGET: usize = 8192;
const MIN_HITS: usize = 5;
const MIN_TOP5_MEAN: f64 = 0.35;
const DEFAULT_TOP_K: usize = 10;
const GRAPH_SEED_LIMIT: usize = 20;

#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub proposal_text: String,
    pub explicit_categories: Vec<PolicyCategory>,
    pub filter: Option<MetadataFilter>,
}

#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub strategy: Strategy,
    pub hits: Vec<(ChunkId, f64)>,
    pub context: ContextBundle,
    pub expanded: bool,
    pub insufficient_context: bool,
}

pub struct RetrievalOrchestrator {
    store: Arc<VectorStore>,
    graph: Arc<GraphEngine>,
}

impl RetrievalOrchestrator {
    pub fn new(store: Arc<VectorStore>, graph: Arc<GraphEngine>) -> Self {
        Self { store, graph }
    }

    pub async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalOutcome, RetrievalError> {
        let features = extract_features(&request.proposal_text, &request.explicit_categories);
        let dense_populated = !self.store.is_empty();
        let graph_populated = self.graph.stats().chunk_count > 0;
        let strategy = select_strategy(&features, dense_populated, graph_populated, &self.graph);

        let mut hits = self
            .run_strategy(strategy, &features, request.filter.clone(), DEFAULT_TOP_K)
            .await?;
        let mut expanded = false;

        if !self.passes_quality_gate(&hits) {
            let mut expanded_filter = request.filter.clone().unwrap_or_default();
            expanded_filter.relax_year_range(2);
            hits = self
                .run_strategy(strategy, &features, Some(expanded_filter), DEFAULT_TOP_K * 2)
                .await?;
            expanded = true;
        }

        let insufficient_context = !self.passes_quality_gate(&hits);

        let chunks: Vec<(Chunk, f64)> = hits
            .iter()
            .filter_map(|(id, score)| self.store.get(id).map(|chunk| (chunk, *score)))
            .collect();
        let context = synthesize_context(chunks, DEFAULT_CONTEXT_BUDGET);

        Ok(RetrievalOutcome {
            strategy,
            hits,
            context,
            expanded,
            insufficient_context,
        })
    }

    /// Runs the dense and graph score sources concurrently for `hybrid`
    /// (spec §4.5 step 2), merges by taking the max of the two per-source
    /// normalized scores for each chunk id (step 3), and returns hits sorted
    /// by descending merged score.
    async fn run_strategy(
        &self,
        strategy: Strategy,
        features: &QueryFeatures,
        filter: Option<MetadataFilter>,
        top_k: usize,
    ) -> Result<Vec<(ChunkId, f64)>, RetrievalError> {
        let wants_dense = !matches!(strategy, Strategy::GraphOnly);
        let wants_graph = !matches!(strategy, Strategy::VectorOnly);

        let dense_fut = async {
            if wants_dense {
                self.dense_scores(&features.query_text, filter.as_ref(), top_k).await
            } else {
                Ok(HashMap::new())
            }
        };
        let graph_fut = async {
            if wants_graph {
                self.graph_scores(features, top_k)
            } else {
                HashMap::new()
            }
        };
        let (dense_scores, graph_scores) = tokio::join!(dense_fut, graph_fut);
        let dense_scores = dense_scores?;

        let mut merged: HashMap<ChunkId, f64> = HashMap::new();
        for (id, score) in dense_scores {
            merged.insert(id, score);
        }
        for (id, score) in graph_scores {
            let entry = merged.entry(id).or_insert(0.0);
            if score > *entry {
                *entry = score;
            }
        }

        let mut ranked: Vec<(ChunkId, f64)> = merged.into_iter().collect();
        ranked.sort_by(|(id_a, a), (id_b, b)| {
            b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal).then_with(|| id_a.cmp(id_b))
        });
        Ok(ranked)
    }

    fn passes_quality_gate(&self, hits: &[(ChunkId, f64)]) -> bool {
        if hits.len() < MIN_HITS {
            return false;
        }
        let mut scores: Vec<f64> = hits.iter().map(|(_, s)| *s).collect();
        scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let top5: Vec<f64> = scores.into_iter().take(5).collect();
        let mean = top5.iter().sum::<f64>() / top5.len() as f64;
        mean >= MIN_TOP5_MEAN
    }

    async fn dense_scores(
        &self,
        query_text: &str,
        filter: Option<&MetadataFilter>,
        top_k: usize,
    ) -> Result<HashMap<ChunkId, f64>, RetrievalError> {
        let hits = self
            .store
            .search(query_text, top_k, SearchMode::Hybrid, HybridWeights::default(), filter)
            .await?;
        Ok(normalize(hits.into_iter().map(|h| (h.chunk_id, h.hybrid_score)).collect()))
    }

    /// Seeds from `chunks_by_category` for each tagged category, expanded one
    /// hop via `related`, scored by inverse rank within each seed list (spec
    /// §4.5: graph contributes a score source alongside dense).
    fn graph_scores(&self, features: &QueryFeatures, top_k: usize) -> HashMap<ChunkId, f64> {
        let mut raw: HashMap<ChunkId, f64> = HashMap::new();
        for category in &features.category_tags {
            let seeds = self.graph.chunks_by_category(*category, GRAPH_SEED_LIMIT.max(top_k));
            for (rank, seed) in seeds.iter().enumerate() {
                let score = 1.0 / (1.0 + rank as f64);
                raw.entry(*seed).or_insert(0.0);
                if raw[seed] < score {
                    raw.insert(*seed, score);
                }
                for (hop_rank, related) in self.graph.related(*seed, 2).into_iter().enumerate() {
                    let hop_score = score / (2.0 + hop_rank as f64);
                    let current = *raw.get(&related).unwrap_or(&0.0);
                    if hop_score > current {
                        raw.insert(related, hop_score);
                    }
                }
            }
        }
        normalize(raw)
    }
}

/// Min-max normalization to `[0, 1]` for a single source's raw scores (spec
/// §4.5 step 3).
fn normalize(scores: HashMap<ChunkId, f64>) -> HashMap<ChunkId, f64> {
    if scores.is_empty() {
        return scores;
    }
    let max = scores.values().cloned().fold(f64::MIN, f64::max);
    let min = scores.values().cloned().fold(f64::MAX, f64::min);
    if (max - min).abs() < f64::EPSILON {
        return scores.into_iter().map(|(id, _)| (id, 1.0)).collect();
    }
    scores.into_iter().map(|(id, v)| (id, (v - min) / (max - min))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ria_contracts::{ChunkKind, ChunkMetadata, DocumentId};
    use ria_embeddings::DeterministicEmbeddingProvider;

    async fn build_orchestrator(n: usize) -> RetrievalOrchestrator {
        let provider = Arc::new(DeterministicEmbeddingProvider::new(16));
        let store = Arc::new(VectorStore::new(provider));
        let doc = DocumentId::new();
        let mut chunks = Vec::new();
        for i in 0..n {
            let meta = ChunkMetadata::new("BE", "law", 2024).with_category(PolicyCategory::Digital);
            let chunk = Chunk::new(
                ChunkKind::Category,
                format!("AI governance discussion number {i}"),
                meta,
                i.to_string(),
                Some(doc),
            )
            .unwrap();
            chunks.push(chunk);
        }
        store.add(chunks.clone()).await.unwrap();
        let graph = Arc::new(GraphEngine::build_from_chunks(&chunks));
        RetrievalOrchestrator::new(store, graph)
    }

    #[tokio::test]
    async fn retrieve_returns_hits_and_context_for_populated_corpus() {
        let orchestrator = build_orchestrator(8).await;
        let outcome = orchestrator
            .retrieve(RetrievalRequest {
                proposal_text: "New AI governance proposal".to_string(),
                explicit_categories: vec![],
                filter: None,
            })
            .await
            .unwrap();
        assert!(!outcome.hits.is_empty());
        assert!(!outcome.context.entries.is_empty());
    }

    #[tokio::test]
    async fn retrieve_on_empty_corpus_flags_insufficient_context() {
        let provider = Arc::new(DeterministicEmbeddingProvider::new(16));
        let store = Arc::new(VectorStore::new(provider));
        let graph = Arc::new(GraphEngine::new());
        let orchestrator = RetrievalOrchestrator::new(store, graph);
        let outcome = orchestrator
            .retrieve(RetrievalRequest {
                proposal_text: "New AI governance proposal".to_string(),
                explicit_categories: vec![],
                filter: None,
            })
            .await
            .unwrap();
        assert!(outcome.insufficient_context);
    }
}
