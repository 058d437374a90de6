use connectors::error::ConnectorError;
use engine_config::error::ConfigError;
use engine_core::error::StateError;
use engine_runtime::error::RuntimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load the configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to run the polling sessions: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Connection failed: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Offset store error: {0}")]
    State(#[from] StateError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("No stored offset for session '{0}'")]
    NoCheckpoint(String),

    #[error("Output task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
