//! C2: BM25 scoring over tokenized chunk content (spec §4.2).

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use ria_contracts::ChunkId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Stats {
    pub total_documents: u64,
    pub total_terms: u64,
    pub avg_doc_length: f32,
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Stats {
    fn default() -> Self {
        Self {
            total_documents: 0,
            total_terms: 0,
            avg_doc_length: 0.0,
            k1: 1.5,
            b: 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentRecord {
    term_freqs: HashMap<String, u32>,
    length: usize,
}

/// A raw (un-normalized) per-chunk BM25 score.
#[derive(Debug, Clone, Copy)]
pub struct RawScore {
    pub chunk_id: ChunkId,
    pub score: f32,
}

/// Durable snapshot of the index, used for `persist`/`load` (spec §4.2:
/// "index is serializable to a durable blob").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Snapshot {
    documents: HashMap<ChunkId, DocumentRecord>,
    inverted_index: HashMap<String, HashMap<ChunkId, u32>>,
    stats: Bm25Stats,
}

pub struct Bm25Index {
    documents: RwLock<HashMap<ChunkId, DocumentRecord>>,
    inverted_index: RwLock<HashMap<String, HashMap<ChunkId, u32>>>,
    stats: Mutex<Bm25Stats>,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            inverted_index: RwLock::new(HashMap::new()),
            stats: Mutex::new(Bm25Stats::default()),
        }
    }

    pub fn from_snapshot(snapshot: Bm25Snapshot) -> Self {
        Self {
            documents: RwLock::new(snapshot.documents),
            inverted_index: RwLock::new(snapshot.inverted_index),
            stats: Mutex::new(snapshot.stats),
        }
    }

    pub fn snapshot(&self) -> Bm25Snapshot {
        Bm25Snapshot {
            documents: self.documents.read().clone(),
            inverted_index: self.inverted_index.read().clone(),
            stats: self.stats.lock().clone(),
        }
    }

    /// Tokenizes and indexes a chunk's content, replacing any prior entry
    /// for the same id (re-add is an update, not a duplicate).
    pub fn add(&self, chunk_id: ChunkId, content: &str) {
        let tokens = tokenize(content);
        let term_freqs = term_frequencies(&tokens);
        let length = tokens.len();

        let mut documents = self.documents.write();
        let mut inverted_index = self.inverted_index.write();
        let mut stats = self.stats.lock();

        if let Some(existing) = documents.remove(&chunk_id) {
            remove_from_index(chunk_id, &existing, &mut inverted_index, &mut stats);
        }

        for (term, freq) in &term_freqs {
            inverted_index
                .entry(term.clone())
                .or_default()
                .insert(chunk_id, *freq);
        }

        documents.insert(chunk_id, DocumentRecord { term_freqs, length });

        stats.total_documents += 1;
        stats.total_terms += length as u64;
        stats.avg_doc_length = stats.total_terms as f32 / stats.total_documents as f32;
    }

    pub fn remove(&self, chunk_id: ChunkId) {
        let mut documents = self.documents.write();
        let mut inverted_index = self.inverted_index.write();
        let mut stats = self.stats.lock();
        if let Some(existing) = documents.remove(&chunk_id) {
            remove_from_index(chunk_id, &existing, &mut inverted_index, &mut stats);
        }
    }

    pub fn contains(&self, chunk_id: &ChunkId) -> bool {
        self.documents.read().contains_key(chunk_id)
    }

    pub fn stats(&self) -> Bm25Stats {
        self.stats.lock().clone()
    }

    /// Raw BM25 scores for the query, unsorted, over every document with at
    /// least one matching term. Normalization to [0, 1] by the top observed
    /// score is the caller's job (the vector store combines raw scores from
    /// several sources before normalizing).
    pub fn score(&self, query_text: &str) -> Vec<RawScore> {
        let tokens = tokenize(query_text);
        if tokens.is_empty() {
            return Vec::new();
        }

        let documents = self.documents.read();
        if documents.is_empty() {
            return Vec::new();
        }
        let inverted_index = self.inverted_index.read();
        let stats = self.stats.lock().clone();

        let total_docs = stats.total_documents as f32;
        if total_docs <= 0.0 {
            return Vec::new();
        }
        let avg_doc_length = if stats.avg_doc_length > 0.0 {
            stats.avg_doc_length
        } else {
            1.0
        };

        let mut query_terms: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *query_terms.entry(token).or_insert(0) += 1;
        }

        let mut scores: HashMap<ChunkId, f32> = HashMap::new();
        for term in query_terms.keys() {
            let Some(postings) = inverted_index.get(term) else {
                continue;
            };
            let doc_freq = postings.len() as f32;
            if doc_freq == 0.0 {
                continue;
            }
            let idf = ((total_docs - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln();
            for (chunk_id, &term_freq) in postings {
                if let Some(doc) = documents.get(chunk_id) {
                    let denom = term_freq as f32
                        + stats.k1 * (1.0 - stats.b + stats.b * (doc.length as f32 / avg_doc_length));
                    let score = idf * ((term_freq as f32 * (stats.k1 + 1.0)) / denom);
                    *scores.entry(*chunk_id).or_insert(0.0) += score;
                }
            }
        }

        scores
            .into_iter()
            .map(|(chunk_id, score)| RawScore { chunk_id, score })
            .collect()
    }

    /// Scores normalized by the top observed score for this query (spec
    /// §4.2), so `0.0..=1.0` is meaningful for hybrid combination.
    pub fn score_normalized(&self, query_text: &str) -> HashMap<ChunkId, f32> {
        let raw = self.score(query_text);
        let top = raw.iter().map(|r| r.score).fold(0.0_f32, f32::max);
        if top <= 0.0 {
            return HashMap::new();
        }
        raw.into_iter().map(|r| (r.chunk_id, r.score / top)).collect()
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_from_index(
    chunk_id: ChunkId,
    record: &DocumentRecord,
    inverted_index: &mut HashMap<String, HashMap<ChunkId, u32>>,
    stats: &mut Bm25Stats,
) {
    for term in record.term_freqs.keys() {
        if let Some(postings) = inverted_index.get_mut(term) {
            postings.remove(&chunk_id);
            if postings.is_empty() {
                inverted_index.remove(term);
            }
        }
    }
    stats.total_documents = stats.total_documents.saturating_sub(1);
    stats.total_terms = stats.total_terms.saturating_sub(record.length as u64);
    stats.avg_doc_length = if stats.total_documents > 0 {
        stats.total_terms as f32 / stats.total_documents as f32
    } else {
        0.0
    };
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter_map(|token| {
            let normalized = token.trim().to_lowercase();
            if normalized.is_empty() || is_stopword(&normalized) {
                None
            } else {
                Some(normalized)
            }
        })
        .collect()
}

fn is_stopword(token: &str) -> bool {
    matches!(
        token,
        "the" | "a" | "an" | "of" | "to" | "and" | "or" | "in" | "on" | "is" | "for"
    )
}

fn term_frequencies(tokens: &[String]) -> HashMap<String, u32> {
    let mut freqs = HashMap::new();
    for token in tokens {
        *freqs.entry(token.clone()).or_insert(0) += 1;
    }
    freqs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_match_spec() {
        let stats = Bm25Stats::default();
        assert_eq!(stats.k1, 1.5);
        assert_eq!(stats.b, 0.75);
    }

    #[test]
    fn search_finds_matching_document() {
        let index = Bm25Index::new();
        let id = ChunkId::new();
        index.add(id, "AI governance framework for digital markets");
        let scores = index.score_normalized("AI regulation");
        assert!(scores.contains_key(&id));
        assert!(scores[&id] > 0.0);
    }

    #[test]
    fn empty_index_returns_empty_scores() {
        let index = Bm25Index::new();
        assert!(index.score_normalized("anything").is_empty());
    }

    #[test]
    fn reindexing_same_id_updates_not_duplicates() {
        let index = Bm25Index::new();
        let id = ChunkId::new();
        index.add(id, "first version");
        index.add(id, "second version with more words");
        assert_eq!(index.stats().total_documents, 1);
    }
}
