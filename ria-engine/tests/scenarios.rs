//! End-to-end scenarios against the demo corpus and scripted model client,
//! exercising the assessment lifecycle through the external interface only.

use std::sync::Arc;
use std::time::Duration;

use ria_contracts::{ContextMetadata, ReviewAction, WorkflowState};
use ria_engine::demo::{build_demo_store, DemoModelClient};
use ria_engine::{Engine, EngineError};

const PROPOSAL: &str = "This proposal establishes a risk-based registration and audit regime for \
    high-risk automated decision-making systems deployed by public administrations and large private \
    operators. Covered entities must register affected systems before deployment, undergo periodic \
    algorithmic audits, and provide a documented human-in-the-loop override mechanism for any \
    individual decision with material legal effect. The proposal introduces phased compliance \
    deadlines over three years, proportionate to operator size.";

async fn demo_engine(client: Arc<dyn ria_model_client::ModelClient>) -> Arc<Engine> {
    let (store, graph) = build_demo_store().await;
    let config = ria_config::EngineConfig::default();
    Engine::new(config, store, graph, client)
}

/// Polls `get_status` until it reports `SynthesisReviewPending` or a
/// terminal state, rather than waiting on the event stream directly, so a
/// slow scheduler never flakes the test.
async fn wait_for(engine: &Engine, id: ria_contracts::AssessmentId, target: &WorkflowState) -> WorkflowState {
    for _ in 0..200 {
        if let Some(state) = engine.get_status(id).await {
            if std::mem::discriminant(&state) == std::mem::discriminant(target) || state.is_terminal() {
                return state;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    engine.get_status(id).await.expect("assessment should still be known")
}

#[tokio::test]
async fn small_hybrid_retrieval_feeds_a_completed_assessment() {
    let engine = demo_engine(Arc::new(DemoModelClient::new())).await;
    let context = ContextMetadata { requested_categories: vec!["Digital".to_string()], ..ContextMetadata::default() };
    let id = engine.create_assessment(PROPOSAL, context).await.unwrap();

    let assessment = engine.get_assessment(id).await.unwrap();
    assert!(assessment.quality_metrics.retrieval_hit_count > 0);
    assert!(!assessment.sources.is_empty());

    let state = wait_for(&engine, id, &WorkflowState::SynthesisReviewPending).await;
    assert_eq!(state, WorkflowState::SynthesisReviewPending);

    let state = engine
        .review(id, ReviewAction::Approve, "synthesis looks right", "reviewer-1", None)
        .await
        .unwrap();
    assert_eq!(state, WorkflowState::ReportReviewPending);

    let state = engine.review(id, ReviewAction::Approve, "ship it", "reviewer-1", None).await.unwrap();
    assert_eq!(state, WorkflowState::Completed);

    let report = engine.get_report(id).await.unwrap();
    assert_eq!(report.themes.len(), ria_contracts::THEME_COUNT);
    assert_eq!(report.missing_theme_count, 0);
    assert!(report.executive_summary.is_some());
}

#[tokio::test]
async fn bootstrap_aggregation_reaches_synthesis_review_with_populated_council_history() {
    let engine = demo_engine(Arc::new(DemoModelClient::new())).await;
    let id = engine.create_assessment(PROPOSAL, ContextMetadata::default()).await.unwrap();

    let state = wait_for(&engine, id, &WorkflowState::SynthesisReviewPending).await;
    assert_eq!(state, WorkflowState::SynthesisReviewPending);

    let assessment = engine.get_assessment(id).await.unwrap();
    let run = assessment.current_council_run().unwrap();
    assert!(run.is_finalized());
    assert!(!run.stage2_aggregated.is_empty());
    assert!(!run.chairman_fallback);
}

#[tokio::test]
async fn chairman_failure_falls_back_to_the_highest_ranked_stage1_response() {
    let engine = demo_engine(Arc::new(DemoModelClient::with_chairman_failure())).await;
    let id = engine.create_assessment(PROPOSAL, ContextMetadata::default()).await.unwrap();

    let state = wait_for(&engine, id, &WorkflowState::SynthesisReviewPending).await;
    assert_eq!(state, WorkflowState::SynthesisReviewPending);

    let assessment = engine.get_assessment(id).await.unwrap();
    let run = assessment.current_council_run().unwrap();
    assert!(run.chairman_fallback);
}

#[tokio::test]
async fn revision_loop_past_the_limit_fails_the_assessment() {
    let engine = demo_engine(Arc::new(DemoModelClient::new())).await;
    let id = engine.create_assessment(PROPOSAL, ContextMetadata::default()).await.unwrap();
    wait_for(&engine, id, &WorkflowState::SynthesisReviewPending).await;

    for _ in 0..ria_workflow::REVISION_LIMIT {
        let state = engine
            .review(id, ReviewAction::RequestRevision, "needs more detail", "reviewer-1", Some("tighten theme 3".to_string()))
            .await
            .unwrap();
        assert_eq!(state, WorkflowState::SynthesisReviewPending);
    }

    let result = engine
        .review(id, ReviewAction::RequestRevision, "still not there", "reviewer-1", Some("one more pass".to_string()))
        .await;
    assert!(result.is_err());

    let final_state = engine.get_status(id).await.unwrap();
    assert!(matches!(final_state, WorkflowState::Failed { .. }));
}

#[tokio::test]
async fn quality_gate_flags_insufficient_context_on_an_empty_corpus_but_the_workflow_still_runs() {
    let provider = Arc::new(ria_embeddings::DeterministicEmbeddingProvider::new(32));
    let store = Arc::new(ria_index::VectorStore::new(provider));
    let graph = Arc::new(ria_graph::GraphEngine::new());
    let config = ria_config::EngineConfig::default();
    let engine = Engine::new(config, store, graph, Arc::new(DemoModelClient::new()));

    let id = engine.create_assessment(PROPOSAL, ContextMetadata::default()).await.unwrap();
    let assessment = engine.get_assessment(id).await.unwrap();
    assert_eq!(assessment.quality_metrics.retrieval_hit_count, 0);
    assert!(assessment.quality_metrics.insufficient_context);

    let state = wait_for(&engine, id, &WorkflowState::SynthesisReviewPending).await;
    assert_eq!(state, WorkflowState::SynthesisReviewPending);
}

#[tokio::test]
async fn short_proposal_is_rejected_before_any_retrieval_or_council_work() {
    let engine = demo_engine(Arc::new(DemoModelClient::new())).await;
    let result = engine.create_assessment("Too short a proposal.", ContextMetadata::default()).await;
    match result {
        Err(EngineError::Validation(validation_error)) => {
            assert!(!validation_error.guidance.is_empty());
            assert!(!validation_error.examples.is_empty());
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn list_filters_assessments_by_workflow_state() {
    let engine = demo_engine(Arc::new(DemoModelClient::new())).await;
    let first = engine.create_assessment(PROPOSAL, ContextMetadata::default()).await.unwrap();
    let second = engine.create_assessment(PROPOSAL, ContextMetadata::default()).await.unwrap();
    wait_for(&engine, first, &WorkflowState::SynthesisReviewPending).await;
    wait_for(&engine, second, &WorkflowState::SynthesisReviewPending).await;

    let pending = engine.list(Some(WorkflowState::SynthesisReviewPending)).await;
    let ids: Vec<_> = pending.iter().map(|a| a.assessment_id).collect();
    assert!(ids.contains(&first));
    assert!(ids.contains(&second));

    let all = engine.list(None).await;
    assert!(all.len() >= 2);
}
