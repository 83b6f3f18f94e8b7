//! C3: unifies C1 (dense) + C2 (sparse) with a metadata catalog (spec §4.3).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use ria_contracts::{Chunk, ChunkId, PolicyCategory};
use ria_embeddings::EmbeddingProvider;
use serde::{Deserialize, Serialize};

use crate::bm25::{Bm25Index, Bm25Snapshot};
use crate::error::IndexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Dense,
    Sparse,
    Hybrid,
}

#[derive(Debug, Clone, Copy)]
pub struct HybridWeights {
    pub dense: f64,
    pub sparse: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self { dense: 0.7, sparse: 0.3 }
    }
}

impl HybridWeights {
    /// Clamps to non-negative and forces the mode's implied weighting (spec
    /// §8: "mode `dense` => sparse_weight=0 internally and vice versa").
    pub fn for_mode(self, mode: SearchMode) -> Self {
        let dense = self.dense.max(0.0);
        let sparse = self.sparse.max(0.0);
        match mode {
            SearchMode::Dense => Self { dense, sparse: 0.0 },
            SearchMode::Sparse => Self { dense: 0.0, sparse },
            SearchMode::Hybrid => Self { dense, sparse },
        }
    }
}

/// Conjunction over metadata keys; within a key, a list means "any of"
/// (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub jurisdiction: Option<Vec<String>>,
    pub document_type: Option<Vec<String>>,
    pub categories: Option<Vec<PolicyCategory>>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
}

impl MetadataFilter {
    pub fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(allowed) = &self.jurisdiction {
            if !allowed.iter().any(|j| j == &chunk.metadata.jurisdiction) {
                return false;
            }
        }
        if let Some(allowed) = &self.document_type {
            if !allowed.iter().any(|d| d == &chunk.metadata.document_type) {
                return false;
            }
        }
        if let Some(allowed) = &self.categories {
            if !allowed.iter().any(|c| chunk.metadata.categories.contains(c)) {
                return false;
            }
        }
        if let Some(min) = self.year_min {
            if chunk.metadata.year < min {
                return false;
            }
        }
        if let Some(max) = self.year_max {
            if chunk.metadata.year > max {
                return false;
            }
        }
        true
    }

    /// Relaxes the year bounds by `delta` in both directions, used by the
    /// retrieval orchestrator's quality-gate expansion (spec §4.5).
    pub fn relax_year_range(&mut self, delta: i32) {
        if let Some(min) = self.year_min.as_mut() {
            *min -= delta;
        }
        if let Some(max) = self.year_max.as_mut() {
            *max += delta;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub chunk_id: ChunkId,
    pub dense_score: f64,
    pub sparse_score: f64,
    pub hybrid_score: f64,
}

#[derive(Serialize, Deserialize)]
struct PersistedState {
    chunks: HashMap<ChunkId, Chunk>,
    dense_vectors: HashMap<ChunkId, Vec<f32>>,
    content_hashes: HashMap<String, ChunkId>,
    bm25: Bm25Snapshot,
}

/// In-process hybrid vector store. Shared *read-many*; writes are
/// serialized through the internal locks (spec §5).
pub struct VectorStore {
    provider: Arc<dyn EmbeddingProvider>,
    chunks: RwLock<HashMap<ChunkId, Chunk>>,
    dense_vectors: RwLock<HashMap<ChunkId, Vec<f32>>>,
    /// content hash -> chunk id, enforcing idempotent `add` (spec §9).
    content_hashes: RwLock<HashMap<String, ChunkId>>,
    bm25: Bm25Index,
}

impl VectorStore {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            chunks: RwLock::new(HashMap::new()),
            dense_vectors: RwLock::new(HashMap::new()),
            content_hashes: RwLock::new(HashMap::new()),
            bm25: Bm25Index::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    pub fn get(&self, chunk_id: &ChunkId) -> Option<Chunk> {
        self.chunks.read().get(chunk_id).cloned()
    }

    /// Embeds and tokenizes a batch of chunks, idempotent by content hash:
    /// a chunk whose normalized content already exists in the store is a
    /// no-op (spec §8 round-trip laws). On embedding failure the whole
    /// batch is rolled back (spec §4.3 failure model).
    pub async fn add(&self, entries: Vec<Chunk>) -> Result<usize, IndexError> {
        let mut to_embed = Vec::new();
        let mut to_embed_chunks = Vec::new();
        {
            let content_hashes = self.content_hashes.read();
            for chunk in entries {
                let hash = chunk.content_hash();
                if content_hashes.contains_key(&hash) {
                    continue;
                }
                to_embed.push(chunk.content.clone());
                to_embed_chunks.push(chunk);
            }
        }

        if to_embed_chunks.is_empty() {
            return Ok(0);
        }

        let span = tracing::info_span!("vector_store_add", batch_size = to_embed_chunks.len());
        let _enter = span.enter();

        let vectors = self.provider.generate_embeddings(&to_embed).await?;
        if vectors.len() != to_embed_chunks.len() {
            return Err(IndexError::Embedding(
                ria_embeddings::EmbeddingError::Permanent(
                    "provider returned a different number of vectors than texts".to_string(),
                ),
            ));
        }

        let mut chunks = self.chunks.write();
        let mut dense_vectors = self.dense_vectors.write();
        let mut content_hashes = self.content_hashes.write();

        let added = to_embed_chunks.len();
        for (chunk, vector) in to_embed_chunks.into_iter().zip(vectors.into_iter()) {
            let hash = chunk.content_hash();
            self.bm25.add(chunk.id, &chunk.content);
            dense_vectors.insert(chunk.id, vector);
            content_hashes.insert(hash, chunk.id);
            chunks.insert(chunk.id, chunk);
        }
        Ok(added)
    }

    /// Returns `[]` on an empty corpus, never raises (spec §4.3, §8).
    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        mode: SearchMode,
        weights: HybridWeights,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Hit>, IndexError> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let weights = weights.for_mode(mode);

        let dense_scores: HashMap<ChunkId, f64> = if weights.dense > 0.0 {
            let query_vec = self
                .provider
                .generate_embeddings(&[query_text.to_string()])
                .await?
                .into_iter()
                .next()
                .unwrap_or_default();
            let dense_vectors = self.dense_vectors.read();
            let raw: HashMap<ChunkId, f64> = dense_vectors
                .iter()
                .map(|(id, v)| (*id, cosine_similarity(&query_vec, v) as f64))
                .collect();
            normalize_to_unit(raw)
        } else {
            HashMap::new()
        };

        let sparse_scores: HashMap<ChunkId, f64> = if weights.sparse > 0.0 {
            self.bm25
                .score_normalized(query_text)
                .into_iter()
                .map(|(id, s)| (id, s as f64))
                .collect()
        } else {
            HashMap::new()
        };

        let mut candidate_ids: Vec<ChunkId> = dense_scores
            .keys()
            .chain(sparse_scores.keys())
            .copied()
            .collect();
        candidate_ids.sort();
        candidate_ids.dedup();

        let chunks = self.chunks.read();
        let m = top_k.saturating_mul(5).max(top_k);

        let mut scored: Vec<Hit> = candidate_ids
            .into_iter()
            .map(|id| {
                let dense_score = *dense_scores.get(&id).unwrap_or(&0.0);
                let sparse_score = *sparse_scores.get(&id).unwrap_or(&0.0);
                let hybrid_score = weights.dense * dense_score + weights.sparse * sparse_score;
                Hit {
                    chunk_id: id,
                    dense_score,
                    sparse_score,
                    hybrid_score,
                }
            })
            .collect();

        scored.sort_by(|a, b| compare_hits(a, b));

        // Filter over the top-M candidates; if that leaves fewer than
        // top_k, pull the next M-sized window from the unfiltered, sorted
        // list and keep going until top_k is satisfied or candidates run
        // out (spec §4.3).
        let mut filtered: Vec<Hit> = Vec::new();
        let mut window_start = 0;
        while filtered.len() < top_k && window_start < scored.len() {
            let window_end = (window_start + m).min(scored.len());
            for hit in &scored[window_start..window_end] {
                if filtered.len() >= top_k {
                    break;
                }
                let keep = match (filter, chunks.get(&hit.chunk_id)) {
                    (Some(f), Some(chunk)) => f.matches(chunk),
                    (None, _) => true,
                    (Some(_), None) => false,
                };
                if keep {
                    filtered.push(hit.clone());
                }
            }
            window_start = window_end;
        }

        Ok(filtered)
    }

    /// Atomic write-new-then-rename (spec §4.3, §5 staging-blob swap).
    pub async fn persist(&self, path: &Path) -> Result<(), IndexError> {
        let state = PersistedState {
            chunks: self.chunks.read().clone(),
            dense_vectors: self.dense_vectors.read().clone(),
            content_hashes: self.content_hashes.read().clone(),
            bm25: self.bm25.snapshot(),
        };
        let json = serde_json::to_vec_pretty(&state)?;
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    pub async fn load(path: &Path, provider: Arc<dyn EmbeddingProvider>) -> Result<Self, IndexError> {
        let bytes = tokio::fs::read(path).await?;
        let state: PersistedState = serde_json::from_slice(&bytes)?;
        Ok(Self {
            provider,
            chunks: RwLock::new(state.chunks),
            dense_vectors: RwLock::new(state.dense_vectors),
            content_hashes: RwLock::new(state.content_hashes),
            bm25: Bm25Index::from_snapshot(state.bm25),
        })
    }
}

/// Tie-break on higher dense score, then lexicographically on id (spec
/// §4.3).
fn compare_hits(a: &Hit, b: &Hit) -> Ordering {
    b.hybrid_score
        .partial_cmp(&a.hybrid_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.dense_score.partial_cmp(&a.dense_score).unwrap_or(Ordering::Equal))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Min-max normalization per source before combination (spec §4.5).
fn normalize_to_unit(scores: HashMap<ChunkId, f64>) -> HashMap<ChunkId, f64> {
    if scores.is_empty() {
        return scores;
    }
    let max = scores.values().cloned().fold(f64::MIN, f64::max);
    let min = scores.values().cloned().fold(f64::MAX, f64::min);
    if (max - min).abs() < f64::EPSILON {
        return scores.into_iter().map(|(id, _)| (id, 1.0)).collect();
    }
    scores
        .into_iter()
        .map(|(id, v)| (id, (v - min) / (max - min)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ria_contracts::{ChunkKind, ChunkMetadata};
    use ria_embeddings::DeterministicEmbeddingProvider;

    fn chunk(content: &str, category: PolicyCategory) -> Chunk {
        let meta = ChunkMetadata::new("BE", "law", 2024).with_category(category);
        Chunk::new(ChunkKind::Category, content, meta, "1", None).unwrap()
    }

    #[tokio::test]
    async fn empty_corpus_search_returns_empty() {
        let provider = Arc::new(DeterministicEmbeddingProvider::new(16));
        let store = VectorStore::new(provider);
        let hits = store
            .search("anything", 5, SearchMode::Hybrid, HybridWeights::default(), None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn add_is_idempotent_by_content_hash() {
        let provider = Arc::new(DeterministicEmbeddingProvider::new(16));
        let store = VectorStore::new(provider);
        let c = chunk("AI governance framework", PolicyCategory::Digital);
        let c2 = c.clone();
        let added_first = store.add(vec![c]).await.unwrap();
        let added_second = store.add(vec![c2]).await.unwrap();
        assert_eq!(added_first, 1);
        assert_eq!(added_second, 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn persist_then_load_yields_identical_hits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let provider: Arc<dyn EmbeddingProvider> = Arc::new(DeterministicEmbeddingProvider::new(16));
        let store = VectorStore::new(provider.clone());
        store
            .add(vec![
                chunk("AI governance framework", PolicyCategory::Digital),
                chunk("biodiversity restoration", PolicyCategory::Environment),
            ])
            .await
            .unwrap();

        let before = store
            .search("AI regulation", 2, SearchMode::Hybrid, HybridWeights::default(), None)
            .await
            .unwrap();

        store.persist(&path).await.unwrap();
        let loaded = VectorStore::load(&path, provider).await.unwrap();
        let after = loaded
            .search("AI regulation", 2, SearchMode::Hybrid, HybridWeights::default(), None)
            .await
            .unwrap();

        let before_ids: Vec<_> = before.iter().map(|h| h.chunk_id).collect();
        let after_ids: Vec<_> = after.iter().map(|h| h.chunk_id).collect();
        assert_eq!(before_ids, after_ids);
    }

    /// A restrictive filter that only a handful of chunks beyond the
    /// initial top-M window satisfy must still refill to top_k rather than
    /// returning a short result (spec §4.3).
    #[tokio::test]
    async fn restrictive_filter_refills_beyond_the_initial_candidate_window() {
        let provider = Arc::new(DeterministicEmbeddingProvider::new(16));
        let store = VectorStore::new(provider);

        let mut chunks = Vec::new();
        for i in 0..20 {
            chunks.push(chunk(&format!("AI governance discussion number {i}"), PolicyCategory::Digital));
        }
        for i in 0..3 {
            chunks.push(chunk(&format!("AI governance discussion with evidence {i}"), PolicyCategory::Environment));
        }
        store.add(chunks).await.unwrap();

        // top_k=2 means M=10; only the 3 Environment-tagged chunks match
        // the filter, and nothing guarantees they sort into the first 10
        // candidates, so without a refill loop this can come up short.
        let filter = MetadataFilter { categories: Some(vec![PolicyCategory::Environment]), ..MetadataFilter::default() };
        let hits = store
            .search("AI governance discussion", 2, SearchMode::Hybrid, HybridWeights::default(), Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }
}
