use std::collections::HashMap;

use ria_contracts::{ModelId, ResponseLabel};
use ria_model_client::{Message, ModelClient, QueryParams};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::CouncilError;

pub struct Stage1Outcome {
    pub responses: HashMap<ModelId, String>,
    pub labels: HashMap<ModelId, ResponseLabel>,
    pub errors: Vec<String>,
}

fn stage1_prompt(proposal: &str, context: &str) -> Vec<Message> {
    vec![
        Message::system(
            "You are a member of a regulatory impact assessment council. Draft an independent \
             first assessment of the proposal using only the supplied context.",
        ),
        Message::user(format!("Proposal:\n{proposal}\n\nContext:\n{context}")),
    ]
}

/// Invokes every council model in parallel with a shared prompt (spec §4.7
/// Stage 1). Proceeds if at least one response is collected — a single
/// surviving model skips Stage 2 and Stage 3 proceeds directly on that
/// response (spec §8 boundary behavior) — otherwise returns
/// `CouncilError::InsufficientResponses`. Labels are assigned in the order
/// `models` was given, skipping models that failed.
pub async fn run_stage1(
    models: &[ModelId],
    proposal: &str,
    context: &str,
    client: &dyn ModelClient,
    cancel: CancellationToken,
) -> Result<Stage1Outcome, CouncilError> {
    let prompt = stage1_prompt(proposal, context);
    let model_strings: Vec<String> = models.iter().map(|m| m.0.clone()).collect();
    let mut raw = client.query_parallel(&model_strings, &prompt, &QueryParams::default(), cancel).await;

    let mut responses = HashMap::new();
    let mut labels = HashMap::new();
    let mut errors = Vec::new();
    let mut next_label = 0usize;

    for model in models {
        match raw.remove(&model.0) {
            Some(Ok(response)) => {
                responses.insert(model.clone(), response.content);
                labels.insert(model.clone(), ResponseLabel::from_index(next_label));
                next_label += 1;
            }
            Some(Err(err)) => {
                warn!(model = %model.0, error = %err, "stage 1 response failed");
                errors.push(format!("{}: {err}", model.0));
            }
            None => {}
        }
    }

    if responses.is_empty() {
        return Err(CouncilError::InsufficientResponses { got: 0 });
    }

    Ok(Stage1Outcome { responses, labels, errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ria_model_client::ModelError;
    use ria_model_client::ModelResponse;

    struct StubClient;

    #[async_trait]
    impl ModelClient for StubClient {
        async fn query(
            &self,
            model_id: &str,
            _messages: &[Message],
            _params: &QueryParams,
            _cancel: CancellationToken,
        ) -> Result<ModelResponse, ModelError> {
            if model_id == "flaky" {
                Err(ModelError::Permanent("down".into()))
            } else {
                Ok(ModelResponse { content: format!("opinion from {model_id}"), model_id: model_id.to_string() })
            }
        }
    }

    #[tokio::test]
    async fn labels_successful_responses_in_enumeration_order() {
        let models = vec![ModelId::new("m1"), ModelId::new("flaky"), ModelId::new("m3")];
        let outcome = run_stage1(&models, "proposal", "context", &StubClient, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.responses.len(), 2);
        assert_eq!(outcome.labels[&ModelId::new("m1")], ResponseLabel::from_index(0));
        assert_eq!(outcome.labels[&ModelId::new("m3")], ResponseLabel::from_index(1));
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn zero_responses_is_an_error() {
        let models = vec![ModelId::new("flaky")];
        let result = run_stage1(&models, "proposal", "context", &StubClient, CancellationToken::new()).await;
        assert!(matches!(result, Err(CouncilError::InsufficientResponses { got: 0 })));
    }

    #[tokio::test]
    async fn a_single_surviving_model_is_accepted() {
        let models = vec![ModelId::new("flaky"), ModelId::new("m1")];
        let outcome = run_stage1(&models, "proposal", "context", &StubClient, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.responses.len(), 1);
        assert_eq!(outcome.labels[&ModelId::new("m1")], ResponseLabel::from_index(0));
    }
}
