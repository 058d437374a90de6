use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse the configuration file as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Environment variable '{0}' is not set")]
    UnresolvedVariable(String),

    #[error("Invalid env file: {0}")]
    EnvFile(String),
}
