use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::category::{AnalysisPattern, PolicyCategory};
use crate::error::ContractError;
use crate::ids::{ChunkId, DocumentId};

/// Atomic unit of retrievable content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Category,
    Analysis,
    Evidence,
}

/// Structural path of a chunk within its source document, e.g. `"3.2.1"`.
pub type Position = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub jurisdiction: String,
    pub document_type: String,
    pub year: i32,
    pub categories: Vec<PolicyCategory>,
    pub analysis_type: Option<AnalysisPattern>,
    pub evidence_type: Option<String>,
    pub impact_type: Option<String>,
}

impl ChunkMetadata {
    pub fn new(jurisdiction: impl Into<String>, document_type: impl Into<String>, year: i32) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            document_type: document_type.into(),
            year,
            categories: Vec::new(),
            analysis_type: None,
            evidence_type: None,
            impact_type: None,
        }
    }

    pub fn with_category(mut self, category: PolicyCategory) -> Self {
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    #[serde(with = "chunk_kind_serde")]
    pub kind: ChunkKind,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub position: Position,
    pub source_document_id: Option<DocumentId>,
    pub token_count: usize,
}

impl Chunk {
    /// Builds a chunk, normalizing content and validating the invariants in
    /// spec §3: non-empty post-normalization content, and evidence chunks
    /// require a source document.
    pub fn new(
        kind: ChunkKind,
        content: impl Into<String>,
        metadata: ChunkMetadata,
        position: impl Into<String>,
        source_document_id: Option<DocumentId>,
    ) -> Result<Self, ContractError> {
        let content = normalize_content(&content.into());
        if content.is_empty() {
            return Err(ContractError::EmptyContent);
        }
        if matches!(kind, ChunkKind::Evidence) && source_document_id.is_none() {
            return Err(ContractError::EvidenceMissingSourceDocument);
        }
        let token_count = estimate_token_count(&content);
        Ok(Self {
            id: ChunkId::new(),
            kind,
            content,
            metadata,
            position: position.into(),
            source_document_id,
            token_count,
        })
    }

    /// SHA-256 of the normalized content, used for content-hash
    /// deduplication (spec §4.3, §9 idempotent-add note).
    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }
}

/// Trims and collapses internal whitespace runs to single spaces.
pub fn normalize_content(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn content_hash(normalized_content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whitespace-delimited token estimate; deliberately simple since neither
/// the budget accounting (§4.5) nor BM25 tokenization (§4.2) require a real
/// tokenizer's subword granularity.
pub fn estimate_token_count(content: &str) -> usize {
    content.split_whitespace().count()
}

mod chunk_kind_serde {
    use super::ChunkKind;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum Wire {
        Category,
        Analysis,
        Evidence,
    }

    pub fn serialize<S: Serializer>(kind: &ChunkKind, s: S) -> Result<S::Ok, S::Error> {
        let wire = match kind {
            ChunkKind::Category => Wire::Category,
            ChunkKind::Analysis => Wire::Analysis,
            ChunkKind::Evidence => Wire::Evidence,
        };
        wire.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ChunkKind, D::Error> {
        let wire = Wire::deserialize(d)?;
        Ok(match wire {
            Wire::Category => ChunkKind::Category,
            Wire::Analysis => ChunkKind::Analysis,
            Wire::Evidence => ChunkKind::Evidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_content("  a \n b\t c  "), "a b c");
    }

    #[test]
    fn empty_content_rejected() {
        let meta = ChunkMetadata::new("BE", "law", 2024);
        let err = Chunk::new(ChunkKind::Category, "   ", meta, "1", None).unwrap_err();
        assert!(matches!(err, ContractError::EmptyContent));
    }

    #[test]
    fn evidence_requires_source_document() {
        let meta = ChunkMetadata::new("BE", "law", 2024);
        let err = Chunk::new(ChunkKind::Evidence, "some evidence text", meta, "1", None).unwrap_err();
        assert!(matches!(err, ContractError::EvidenceMissingSourceDocument));
    }

    #[test]
    fn same_content_same_hash() {
        let meta = ChunkMetadata::new("BE", "law", 2024);
        let a = Chunk::new(ChunkKind::Category, "AI governance framework", meta.clone(), "1", None).unwrap();
        let b = Chunk::new(ChunkKind::Category, "AI   governance   framework", meta, "2", None).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
    }
}
