use connectors::error::ConnectorError;
use engine_config::error::ConfigError;
use engine_core::error::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Worker for session '{0}' was already started")]
    AlreadyStarted(String),

    /// The polling task panicked or was aborted.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Top-level errors of a polling run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connector error in session '{session}': {source}")]
    Connector {
        session: String,
        #[source]
        source: ConnectorError,
    },

    #[error("State store error: {0}")]
    State(#[from] StateError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}
