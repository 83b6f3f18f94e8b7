#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: serde_json::Error },

    #[error("invalid environment override {key}: {message}")]
    InvalidEnvOverride { key: String, message: String },

    #[error("configuration validation failed: {0}")]
    Validation(String),
}
