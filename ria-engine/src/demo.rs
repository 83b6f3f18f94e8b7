//! In-memory demo corpus and a scripted model client, standing in for a live
//! model gateway and a real document store in the absence of either (used by
//! the `assess` binary and the crate's integration tests).

use std::sync::Arc;

use async_trait::async_trait;
use ria_contracts::{Chunk, ChunkKind, ChunkMetadata, DocumentId, PolicyCategory, THEME_COUNT, THEME_TITLES};
use ria_embeddings::DeterministicEmbeddingProvider;
use ria_graph::GraphEngine;
use ria_index::VectorStore;
use ria_model_client::{Message, ModelClient, ModelError, ModelResponse, QueryParams};
use tokio_util::sync::CancellationToken;

/// A small corpus of historical assessment chunks covering AI governance,
/// touching several categories so both the category-tag and graph-expansion
/// retrieval strategies have something to find.
pub fn demo_corpus() -> Vec<Chunk> {
    let doc = DocumentId::new();
    let entries: &[(&str, ChunkKind, PolicyCategory, i32)] = &[
        ("Prior AI governance frameworks required risk-based classification of automated decision systems before deployment.", ChunkKind::Category, PolicyCategory::Digital, 2022),
        ("Administrative burden for SMEs rose under comparable algorithmic transparency mandates in neighboring jurisdictions.", ChunkKind::Analysis, PolicyCategory::Digital, 2023),
        ("Data protection impact assessments became mandatory for any system processing biometric identifiers at scale.", ChunkKind::Evidence, PolicyCategory::FundamentalRights, 2023),
        ("Labor market studies found automation disclosure rules had a modest but measurable effect on employment in affected sectors.", ChunkKind::Analysis, PolicyCategory::Employment, 2021),
        ("Consumer protection complaints regarding opaque algorithmic pricing doubled in the two years after similar rules took effect.", ChunkKind::Evidence, PolicyCategory::ConsumerProtection, 2022),
        ("Competition authorities flagged concerns that compliance costs for algorithmic audits could favor incumbent platforms.", ChunkKind::Analysis, PolicyCategory::Competition, 2024),
        ("Judicial review of automated administrative decisions required a documented human-in-the-loop override mechanism.", ChunkKind::Category, PolicyCategory::Justice, 2020),
        ("Cost-benefit analyses of registries for high-risk AI systems estimated a multi-year payback through reduced enforcement overhead.", ChunkKind::Analysis, PolicyCategory::EconomicDevelopment, 2023),
    ];

    entries
        .iter()
        .enumerate()
        .map(|(i, (content, kind, category, year))| {
            let metadata = ChunkMetadata::new("BE", "impact-assessment", *year).with_category(*category);
            Chunk::new(kind.clone(), *content, metadata, i.to_string(), Some(doc)).expect("demo chunk is well-formed")
        })
        .collect()
}

pub async fn build_demo_store() -> (Arc<VectorStore>, Arc<GraphEngine>) {
    let chunks = demo_corpus();
    let provider = Arc::new(DeterministicEmbeddingProvider::new(32));
    let store = Arc::new(VectorStore::new(provider));
    store.add(chunks.clone()).await.expect("demo corpus embeds cleanly");
    let graph = Arc::new(GraphEngine::build_from_chunks(&chunks));
    (store, graph)
}

/// Stands in for a model gateway: council members return a short opinion
/// with a ranking line stage 2 can parse, and the chairman returns a fully
/// populated synthesis covering all five sections and all 21 themes. Set
/// `fail_chairman` to exercise the chairman-fallback path.
pub struct DemoModelClient {
    pub fail_chairman: bool,
}

impl DemoModelClient {
    pub fn new() -> Self {
        Self { fail_chairman: false }
    }

    pub fn with_chairman_failure() -> Self {
        Self { fail_chairman: true }
    }
}

impl Default for DemoModelClient {
    fn default() -> Self {
        Self::new()
    }
}

fn synthetic_chairman_text() -> String {
    let mut themes = String::new();
    for index in 1..=THEME_COUNT {
        let title = THEME_TITLES[index - 1];
        let impact = if index % 7 == 0 { "negative impact" } else { "positive impact" };
        themes.push_str(&format!(
            "[{index}] {impact} on {title_lower}, grounded in the historical corpus [doc-{index}].\n",
            title_lower = title.to_lowercase()
        ));
    }
    format!(
        "Background and Problem Definition\n\
         The proposal responds to gaps identified in prior automated decision-making oversight.\n\
         Executive Summary\n\
         On balance the proposal is well supported by precedent, with manageable administrative cost.\n\
         Proposal Overview\n\
         Introduces a risk-based registration and audit regime for high-risk automated systems.\n\
         21 Belgian Impact Themes Assessment\n\
         {themes}\n\
         Overall Assessment Summary\n\
         The proposal is recommended for adoption subject to a phased compliance timeline."
    )
}

#[async_trait]
impl ModelClient for DemoModelClient {
    async fn query(
        &self,
        model_id: &str,
        _messages: &[Message],
        _params: &QueryParams,
        _cancel: CancellationToken,
    ) -> Result<ModelResponse, ModelError> {
        if model_id.contains("chairman") {
            if self.fail_chairman {
                return Err(ModelError::Permanent("chairman model unavailable".to_string()));
            }
            return Ok(ModelResponse { content: synthetic_chairman_text(), model_id: model_id.to_string() });
        }
        Ok(ModelResponse {
            content: format!(
                "{model_id} assesses the proposal as addressing a documented regulatory gap with \
                 proportionate administrative burden. Ranking: Response A, Response B, Response C"
            ),
            model_id: model_id.to_string(),
        })
    }
}
