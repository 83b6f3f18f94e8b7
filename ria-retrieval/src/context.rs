use ria_contracts::{Chunk, ChunkId, ChunkKind};

const GROUP_ORDER: [ChunkKindTag; 3] = [ChunkKindTag::Category, ChunkKindTag::Analysis, ChunkKindTag::Evidence];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkKindTag {
    Category,
    Analysis,
    Evidence,
}

fn tag_of(kind: &ChunkKind) -> ChunkKindTag {
    match kind {
        ChunkKind::Category => ChunkKindTag::Category,
        ChunkKind::Analysis => ChunkKindTag::Analysis,
        ChunkKind::Evidence => ChunkKindTag::Evidence,
    }
}

#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub chunk_id: ChunkId,
    pub content: String,
    pub score: f64,
    pub token_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ContextBundle {
    pub entries: Vec<ContextEntry>,
    pub total_tokens: usize,
    /// Set when the token budget was exhausted before every candidate could
    /// be included (spec §4.5 step 5).
    pub truncated: bool,
}

/// Groups hits by `kind` (category -> analysis -> evidence), dedupes by
/// normalized content hash keeping the highest-scoring occurrence, and
/// truncates to `budget` tokens, filling groups in order and preferring the
/// highest-scoring entry within each group (spec §4.5 step 5).
pub fn synthesize_context(hits: Vec<(Chunk, f64)>, budget: usize) -> ContextBundle {
    let mut best_by_hash: std::collections::HashMap<String, (Chunk, f64)> = std::collections::HashMap::new();
    for (chunk, score) in hits {
        let hash = chunk.content_hash();
        match best_by_hash.get(&hash) {
            Some((_, existing_score)) if *existing_score >= score => {}
            _ => {
                best_by_hash.insert(hash, (chunk, score));
            }
        }
    }

    let mut by_group: std::collections::HashMap<ChunkKindTag, Vec<(Chunk, f64)>> = std::collections::HashMap::new();
    for (chunk, score) in best_by_hash.into_values() {
        by_group.entry(tag_of(&chunk.kind)).or_default().push((chunk, score));
    }
    for group in by_group.values_mut() {
        group.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    }

    let mut bundle = ContextBundle::default();
    'groups: for tag in GROUP_ORDER {
        let Some(group) = by_group.get(&tag) else { continue };
        for (chunk, score) in group {
            if bundle.total_tokens + chunk.token_count > budget {
                bundle.truncated = true;
                continue 'groups;
            }
            bundle.total_tokens += chunk.token_count;
            bundle.entries.push(ContextEntry {
                chunk_id: chunk.id,
                content: chunk.content.clone(),
                score: *score,
                token_count: chunk.token_count,
            });
        }
    }
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use ria_contracts::ChunkMetadata;

    fn chunk(content: &str, kind: ChunkKind) -> Chunk {
        Chunk::new(kind, content, ChunkMetadata::new("BE", "law", 2024), "1", None).unwrap()
    }

    #[test]
    fn dedupes_by_content_keeping_highest_score() {
        let a = chunk("repeated text here", ChunkKind::Category);
        let mut b = a.clone();
        b.id = ChunkId::new();
        let bundle = synthesize_context(vec![(a, 0.4), (b, 0.9)], 8192);
        assert_eq!(bundle.entries.len(), 1);
        assert_eq!(bundle.entries[0].score, 0.9);
    }

    #[test]
    fn truncates_when_budget_exhausted() {
        let a = chunk(&"word ".repeat(10), ChunkKind::Category);
        let b = chunk(&"other ".repeat(10), ChunkKind::Analysis);
        let bundle = synthesize_context(vec![(a, 0.9), (b, 0.8)], 10);
        assert!(bundle.total_tokens <= 10);
        assert!(bundle.truncated);
    }
}
