use std::collections::HashMap;

use ria_contracts::council::{AggregationMethod, EvaluationCriterion};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Hybrid-retrieval defaults (spec §6: `top_k=10, dense_weight=0.7,
/// sparse_weight=0.3`).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RetrievalDefaults {
    #[validate(range(min = 1, max = 500, message = "top_k must be between 1 and 500"))]
    pub top_k: usize,
    #[validate(range(min = 0.0, message = "dense_weight must be non-negative"))]
    pub dense_weight: f32,
    #[validate(range(min = 0.0, message = "sparse_weight must be non-negative"))]
    pub sparse_weight: f32,
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self { top_k: 10, dense_weight: 0.7, sparse_weight: 0.3 }
    }
}

/// Base SLA hours per review type before per-priority overrides are applied
/// (spec §6: `review_slas: {synthesis=24h, report=48h}`).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReviewSlaSettings {
    #[validate(range(min = 1, message = "synthesis_hours must be positive"))]
    pub synthesis_hours: i64,
    #[validate(range(min = 1, message = "report_hours must be positive"))]
    pub report_hours: i64,
    /// Multiplier applied per named priority tier (e.g. "urgent" -> 0.2).
    pub priority_overrides: HashMap<String, f64>,
}

impl Default for ReviewSlaSettings {
    fn default() -> Self {
        let mut priority_overrides = HashMap::new();
        priority_overrides.insert("low".to_string(), 2.0);
        priority_overrides.insert("normal".to_string(), 1.0);
        priority_overrides.insert("high".to_string(), 0.5);
        priority_overrides.insert("urgent".to_string(), 0.2);
        Self { synthesis_hours: 24, report_hours: 48, priority_overrides }
    }
}

/// Embedding provider configuration (spec §6: `embedding_model`,
/// `embedding_dim`).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EmbeddingSettings {
    #[validate(length(min = 1, message = "embedding_model cannot be empty"))]
    pub embedding_model: String,
    #[validate(range(min = 1, max = 8192, message = "embedding_dim must be between 1 and 8192"))]
    pub embedding_dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { embedding_model: "text-embedding-3-large".to_string(), embedding_dim: 1536 }
    }
}

/// Council composition and aggregation configuration (spec §6/§4.7).
/// `chairman_model` must not also appear in `council_models`; this is a
/// cross-field rule the `validator` derive can't express on its own, so
/// `CouncilSettings::validate_cross_field` checks it explicitly and the
/// loader calls both.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CouncilSettings {
    #[validate(length(min = 2, message = "at least 2 council models are required for stage 1"))]
    pub council_models: Vec<String>,
    #[validate(length(min = 1, message = "chairman_model cannot be empty"))]
    pub chairman_model: String,
    pub enable_bootstrap: bool,
    #[validate(range(min = 1, max = 100, message = "bootstrap_iterations must be between 1 and 100"))]
    pub bootstrap_iterations: u32,
    pub evaluation_criteria: Vec<EvaluationCriterion>,
    pub aggregation_method: AggregationMethod,
    pub allow_chairman_fallback: bool,
    #[validate(range(min = 0, max = 10, message = "revision_limit must be between 0 and 10"))]
    pub revision_limit: u32,
}

impl Default for CouncilSettings {
    fn default() -> Self {
        Self {
            council_models: vec!["model-a".to_string(), "model-b".to_string(), "model-c".to_string()],
            chairman_model: "chairman-model".to_string(),
            enable_bootstrap: true,
            bootstrap_iterations: 5,
            evaluation_criteria: ria_contracts::council::default_criteria(),
            aggregation_method: AggregationMethod::Borda,
            allow_chairman_fallback: true,
            revision_limit: 3,
        }
    }
}

impl CouncilSettings {
    pub fn validate_cross_field(&self) -> Result<(), ValidationError> {
        if self.council_models.iter().any(|m| m == &self.chairman_model) {
            let mut err = ValidationError::new("chairman_in_council");
            err.message = Some("chairman_model must not also appear in council_models".into());
            return Err(err);
        }
        Ok(())
    }
}

/// Top-level, validated configuration for the assessment engine (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    #[validate(nested)]
    pub council: CouncilSettings,
    #[validate(nested)]
    pub retrieval: RetrievalDefaults,
    #[validate(nested)]
    pub embedding: EmbeddingSettings,
    #[validate(nested)]
    pub review_slas: ReviewSlaSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            council: CouncilSettings::default(),
            retrieval: RetrievalDefaults::default(),
            embedding: EmbeddingSettings::default(),
            review_slas: ReviewSlaSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn chairman_in_council_models_fails_cross_field_validation() {
        let mut config = CouncilSettings::default();
        config.chairman_model = config.council_models[0].clone();
        assert!(config.validate().is_ok());
        assert!(config.validate_cross_field().is_err());
    }

    #[test]
    fn single_council_model_fails_validation() {
        let mut config = CouncilSettings::default();
        config.council_models = vec!["only-one".to_string()];
        assert!(config.validate().is_err());
    }
}
