use std::collections::HashMap;

use ria_contracts::council::AggregationMethod;
use ria_contracts::{ModelId, ResponseLabel};
use ria_model_client::{Message, ModelClient, QueryParams};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::CouncilError;

pub struct ChairmanOutcome {
    pub text: String,
    pub fallback: bool,
}

fn chairman_prompt(
    proposal: &str,
    context: &str,
    stage1_responses: &HashMap<ModelId, String>,
    stage2_aggregated: &HashMap<ModelId, Vec<ResponseLabel>>,
    revision_feedback: Option<&str>,
) -> Vec<Message> {
    let mut body = format!("Proposal:\n{proposal}\n\nSynthesized context:\n{context}\n\n");
    body.push_str("Independent council assessments:\n");
    for (model, response) in stage1_responses {
        body.push_str(&format!("- {}: {}\n", model.0, response));
    }
    body.push_str("\nPeer-ranked consensus orderings (best first):\n");
    for (evaluator, ranking) in stage2_aggregated {
        let order: Vec<String> = ranking.iter().map(|l| l.to_string()).collect();
        body.push_str(&format!("- {}: {}\n", evaluator.0, order.join(" > ")));
    }
    if let Some(feedback) = revision_feedback {
        body.push_str(&format!("\nReviewer feedback from a prior revision request:\n{feedback}\n"));
    }
    body.push_str(
        "\nSynthesize a final structured assessment with these headings exactly: \
         \"Background and Problem Definition\", \"Executive Summary\", \"Proposal Overview\", \
         \"21 Belgian Impact Themes Assessment\", \"Overall Assessment Summary\". In the themes \
         section, number each theme [1] through [21] in order, tag each as positive impact, \
         negative impact, or no impact, explain the reasoning, and cite supporting sources in \
         brackets.",
    );
    vec![
        Message::system("You are the chairman of a regulatory impact assessment council."),
        Message::user(body),
    ]
}

/// Invokes the chairman model once (spec §4.7 Stage 3). On a permanent
/// chairman error, falls back to the highest-Borda Stage-1 response when
/// `allow_fallback` is set.
pub async fn run_stage3(
    chairman_model: &ModelId,
    proposal: &str,
    context: &str,
    stage1_responses: &HashMap<ModelId, String>,
    stage1_labels: &HashMap<ModelId, ResponseLabel>,
    stage2_aggregated: &HashMap<ModelId, Vec<ResponseLabel>>,
    revision_feedback: Option<&str>,
    allow_fallback: bool,
    client: &dyn ModelClient,
    cancel: CancellationToken,
) -> Result<ChairmanOutcome, CouncilError> {
    let prompt = chairman_prompt(proposal, context, stage1_responses, stage2_aggregated, revision_feedback);
    match client.query(&chairman_model.0, &prompt, &QueryParams { max_tokens: 4096, ..Default::default() }, cancel).await {
        Ok(response) => Ok(ChairmanOutcome { text: response.content, fallback: false }),
        Err(err) if err.is_transient() || !allow_fallback => Err(CouncilError::Model(err)),
        Err(err) => {
            warn!(error = %err, "chairman call failed permanently, falling back to highest-Borda stage 1 response");
            // With exactly one surviving Stage-1 response there is nothing
            // to rank (Stage 2 is skipped in that case); fall back to it
            // directly rather than asking `highest_borda_label` to pick a
            // winner out of an empty ranking.
            let fallback_model = if stage1_labels.len() == 1 {
                stage1_labels.keys().next().cloned()
            } else {
                let winner = highest_borda_label(stage2_aggregated, stage1_labels.len());
                winner.and_then(|winner| {
                    stage1_labels.iter().find(|(_, label)| **label == winner).map(|(model, _)| model.clone())
                })
            };
            let text = fallback_model
                .and_then(|model| stage1_responses.get(&model).cloned())
                .unwrap_or_default();
            Ok(ChairmanOutcome { text, fallback: true })
        }
    }
}

pub(crate) fn highest_borda_label(
    stage2_aggregated: &HashMap<ModelId, Vec<ResponseLabel>>,
    n: usize,
) -> Option<ResponseLabel> {
    if n == 0 {
        return None;
    }
    let rankings: Vec<&Vec<ResponseLabel>> = stage2_aggregated.values().collect();
    if rankings.is_empty() {
        return None;
    }
    crate::bootstrap::aggregate(&rankings, n, AggregationMethod::Borda).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ria_model_client::{ModelError, ModelResponse};

    struct StubClient {
        chairman_fails: bool,
    }

    #[async_trait]
    impl ModelClient for StubClient {
        async fn query(
            &self,
            model_id: &str,
            _messages: &[Message],
            _params: &QueryParams,
            _cancel: CancellationToken,
        ) -> Result<ModelResponse, ModelError> {
            if model_id == "chairman" && self.chairman_fails {
                return Err(ModelError::Permanent("chairman unavailable".to_string()));
            }
            Ok(ModelResponse { content: "chairman synthesis".to_string(), model_id: model_id.to_string() })
        }
    }

    #[tokio::test]
    async fn a_single_surviving_stage1_response_is_used_directly_on_chairman_failure() {
        let model = ModelId::new("m1");
        let label = ResponseLabel::from_index(0);
        let stage1_responses = HashMap::from([(model.clone(), "the lone response".to_string())]);
        let stage1_labels = HashMap::from([(model, label)]);

        let outcome = run_stage3(
            &ModelId::new("chairman"),
            "proposal",
            "context",
            &stage1_responses,
            &stage1_labels,
            &HashMap::new(),
            None,
            true,
            &StubClient { chairman_fails: true },
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.fallback);
        assert_eq!(outcome.text, "the lone response");
    }

    #[tokio::test]
    async fn chairman_success_is_used_verbatim() {
        let model = ModelId::new("m1");
        let stage1_responses = HashMap::from([(model.clone(), "a response".to_string())]);
        let stage1_labels = HashMap::from([(model, ResponseLabel::from_index(0))]);

        let outcome = run_stage3(
            &ModelId::new("chairman"),
            "proposal",
            "context",
            &stage1_responses,
            &stage1_labels,
            &HashMap::new(),
            None,
            true,
            &StubClient { chairman_fails: false },
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(!outcome.fallback);
        assert_eq!(outcome.text, "chairman synthesis");
    }
}
