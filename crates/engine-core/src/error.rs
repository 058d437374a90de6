use connectors::{
    error::{ConnectorError, DbError},
    query::error::TemplateError,
};
use thiserror::Error;

/// Everything that ends a polling session.
#[derive(Debug, Error)]
pub enum PollingError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectorError),

    /// No template could be resolved for the connected database product.
    #[error("{0}")]
    UnsupportedDatabase(#[from] TemplateError),

    #[error("Query execution error: {0}")]
    QueryExecution(#[from] DbError),

    #[error("Event sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] StateError),
}

/// Fatal session error handed to the completion reporter.
#[derive(Debug, Error)]
#[error("Error in polling for changes on {table}: {cause}")]
pub struct PollingFailure {
    pub table: String,
    #[source]
    pub cause: PollingError,
}

impl PollingFailure {
    pub fn new(table: &str, cause: PollingError) -> Self {
        PollingFailure {
            table: table.to_string(),
            cause,
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Event channel closed")]
    Closed,

    /// The owner released the sink while the session was still running.
    #[error("Event sink was dropped")]
    Dropped,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("State store error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Checkpoint encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}
