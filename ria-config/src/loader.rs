use std::path::Path;

use tracing::{debug, info, warn};
use validator::Validate;

use crate::error::ConfigError;
use crate::schema::EngineConfig;

/// Loads configuration from layered sources: built-in defaults, an optional
/// JSON file, then environment variable overrides, validating the result
/// (spec §6, grounded on the teacher's `config::loader` file-then-env
/// layering).
pub struct ConfigLoader {
    file_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { file_path: None }
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        let mut config = EngineConfig::default();

        if let Some(path) = &self.file_path {
            config = self.load_from_file(path)?;
        }

        apply_env_overrides(&mut config)?;

        config.validate().map_err(|e| ConfigError::Validation(e.to_string()))?;
        config.council.validate_cross_field().map_err(|e| ConfigError::Validation(e.to_string()))?;

        info!(
            council_models = config.council.council_models.len(),
            chairman = %config.council.chairman_model,
            "configuration loaded"
        );
        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> Result<EngineConfig, ConfigError> {
        if !Path::new(path).exists() {
            warn!(path, "config file not found, falling back to defaults");
            return Ok(EngineConfig::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_string(), source })?;
        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_string(), source })?;
        debug!(path, "loaded configuration from file");
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_str(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), message: format!("could not parse {raw:?}") }),
        None => Ok(None),
    }
}

/// Applies `RIA_*` environment overrides on top of file/default values.
/// Only a fixed, known set of keys is consulted; unrecognized `RIA_*`
/// variables are ignored rather than erroring, so unrelated environment
/// variables never break a deploy.
fn apply_env_overrides(config: &mut EngineConfig) -> Result<(), ConfigError> {
    if let Some(models) = env_str("RIA_COUNCIL_MODELS") {
        config.council.council_models = models.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(chairman) = env_str("RIA_CHAIRMAN_MODEL") {
        config.council.chairman_model = chairman;
    }
    if let Some(iterations) = env_parsed::<u32>("RIA_BOOTSTRAP_ITERATIONS")? {
        config.council.bootstrap_iterations = iterations;
    }
    if let Some(enabled) = env_parsed::<bool>("RIA_ENABLE_BOOTSTRAP")? {
        config.council.enable_bootstrap = enabled;
    }
    if let Some(limit) = env_parsed::<u32>("RIA_REVISION_LIMIT")? {
        config.council.revision_limit = limit;
    }
    if let Some(model) = env_str("RIA_EMBEDDING_MODEL") {
        config.embedding.embedding_model = model;
    }
    if let Some(dim) = env_parsed::<usize>("RIA_EMBEDDING_DIM")? {
        config.embedding.embedding_dim = dim;
    }
    if let Some(top_k) = env_parsed::<usize>("RIA_RETRIEVAL_TOP_K")? {
        config.retrieval.top_k = top_k;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_defaults_when_no_file_given() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.council.bootstrap_iterations, 5);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"council":{{"council_models":["a","b"],"chairman_model":"c","enable_bootstrap":true,
               "bootstrap_iterations":9,"evaluation_criteria":[],"aggregation_method":"Borda",
               "allow_chairman_fallback":true,"revision_limit":3}},
               "retrieval":{{"top_k":10,"dense_weight":0.7,"sparse_weight":0.3}},
               "embedding":{{"embedding_model":"m","embedding_dim":128}},
               "review_slas":{{"synthesis_hours":24,"report_hours":48,"priority_overrides":{{}}}}}}"#
        )
        .unwrap();
        let config = ConfigLoader::new().with_file(file.path().to_str().unwrap()).load().unwrap();
        assert_eq!(config.council.bootstrap_iterations, 9);
        assert_eq!(config.council.chairman_model, "c");
    }

    #[test]
    fn missing_file_falls_back_to_defaults_rather_than_erroring() {
        let config = ConfigLoader::new().with_file("/nonexistent/path/config.json").load().unwrap();
        assert_eq!(config.council.chairman_model, "chairman-model");
    }
}
