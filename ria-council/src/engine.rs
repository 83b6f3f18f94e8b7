use ria_contracts::council::BootstrapConfig;
use ria_contracts::{CouncilRun, ModelId};
use ria_model_client::ModelClient;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::run_stage2;
use crate::chairman::run_stage3;
use crate::error::CouncilError;
use crate::extractor::extract;
use crate::stage1::run_stage1;

#[derive(Debug, Clone)]
pub struct CouncilConfig {
    pub council_models: Vec<ModelId>,
    pub chairman_model: ModelId,
    pub bootstrap: BootstrapConfig,
    pub allow_chairman_fallback: bool,
}

impl CouncilConfig {
    fn validate(&self) -> Result<(), CouncilError> {
        if self.council_models.contains(&self.chairman_model) {
            return Err(CouncilError::ChairmanInCouncil);
        }
        Ok(())
    }
}

/// Runs the full three-stage council protocol over a proposal and its
/// synthesized context, producing a populated `CouncilRun` (spec §4.7).
/// `revision_feedback` is `Some` when this run is a revision cycle's new
/// `CouncilRun`, reusing the prior Stage-1/2 outputs if supplied.
pub async fn run_council(
    assessment_id: ria_contracts::AssessmentId,
    proposal: &str,
    context: &str,
    config: &CouncilConfig,
    revision_feedback: Option<&str>,
    client: &dyn ModelClient,
    cancel: CancellationToken,
) -> Result<CouncilRun, CouncilError> {
    config.validate()?;

    let mut run = CouncilRun::new(config.bootstrap.clone());

    let stage1 = run_stage1(&config.council_models, proposal, context, client, cancel.clone()).await?;
    run.stage1 = stage1.responses.clone();
    run.stage1_labels = stage1.labels.clone();
    run.errors.extend(stage1.errors);

    if stage1.responses.len() > 1 {
        let stage2 = run_stage2(
            assessment_id,
            &config.council_models,
            &stage1.labels,
            &stage1.responses,
            &config.bootstrap,
            proposal,
            client,
            cancel.clone(),
        )
        .await;
        run.stage2 = stage2.iterations;
        run.stage2_aggregated = stage2.aggregated.clone();
        run.errors.extend(stage2.errors);

        let stage3 = run_stage3(
            &config.chairman_model,
            proposal,
            context,
            &stage1.responses,
            &stage1.labels,
            &stage2.aggregated,
            revision_feedback,
            config.allow_chairman_fallback,
            client,
            cancel,
        )
        .await?;
        run.stage3_text = Some(stage3.text.clone());
        run.chairman_fallback = stage3.fallback;
        run.stage3_structured = Some(extract(&stage3.text));
    } else {
        // Single council response: stage 2 is skipped, stage 3 proceeds
        // directly on the lone response (spec §7 boundary behaviors).
        let stage3 = run_stage3(
            &config.chairman_model,
            proposal,
            context,
            &stage1.responses,
            &stage1.labels,
            &std::collections::HashMap::new(),
            revision_feedback,
            config.allow_chairman_fallback,
            client,
            cancel,
        )
        .await?;
        run.stage3_text = Some(stage3.text.clone());
        run.chairman_fallback = stage3.fallback;
        run.stage3_structured = Some(extract(&stage3.text));
    }

    run.revision_feedback = revision_feedback.map(str::to_string);
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ria_model_client::{Message, ModelResponse, QueryParams};

    struct StubClient;

    #[async_trait]
    impl ModelClient for StubClient {
        async fn query(
            &self,
            model_id: &str,
            _messages: &[Message],
            _params: &QueryParams,
            _cancel: CancellationToken,
        ) -> Result<ModelResponse, ria_model_client::ModelError> {
            let content = if model_id == "chairman" {
                "Background and Problem Definition\nBg.\nExecutive Summary\nEs.\nProposal Overview\nPo.\n\
                 21 Belgian Impact Themes Assessment\n[1] positive impact reasoning [doc-1]\n\
                 Overall Assessment Summary\nDone."
                    .to_string()
            } else {
                format!("draft opinion from {model_id}. Ranking: Response A, Response B, Response C")
            };
            Ok(ModelResponse { content, model_id: model_id.to_string() })
        }
    }

    #[tokio::test]
    async fn rejects_chairman_also_in_council() {
        let config = CouncilConfig {
            council_models: vec![ModelId::new("m1"), ModelId::new("m2")],
            chairman_model: ModelId::new("m1"),
            bootstrap: BootstrapConfig::default(),
            allow_chairman_fallback: true,
        };
        let result = run_council(
            ria_contracts::AssessmentId::new(),
            "proposal",
            "context",
            &config,
            None,
            &StubClient,
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(CouncilError::ChairmanInCouncil)));
    }

    #[tokio::test]
    async fn produces_a_finalized_council_run() {
        let config = CouncilConfig {
            council_models: vec![ModelId::new("m1"), ModelId::new("m2"), ModelId::new("m3")],
            chairman_model: ModelId::new("chairman"),
            bootstrap: BootstrapConfig { iterations: 2, ..BootstrapConfig::default() },
            allow_chairman_fallback: true,
        };
        let run = run_council(
            ria_contracts::AssessmentId::new(),
            "proposal",
            "context",
            &config,
            None,
            &StubClient,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(run.is_finalized());
        assert_eq!(run.stage3_structured.unwrap().themes.len(), ria_contracts::THEME_COUNT);
    }
}
