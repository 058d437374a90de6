use crate::error::{ConnectorError, DbError};
use async_trait::async_trait;
use model::records::event::RowEvent;

/// Hands out connections for a polling session. Pool construction and
/// lifecycle belong to the implementor.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    type Connection: PollConnection;

    async fn connect(&self) -> Result<Self::Connection, ConnectorError>;
}

/// A live connection owned by exactly one poll loop.
#[async_trait]
pub trait PollConnection: Send {
    type Statement: Send + Sync;

    /// Product name as the database reports it, e.g. `MySQL` or `PostgreSQL`.
    async fn product_name(&mut self) -> Result<String, ConnectorError>;

    /// Prepares `sql`. Positional parameters are written as `?`.
    async fn prepare(&mut self, sql: &str) -> Result<Self::Statement, DbError>;

    /// Executes a prepared statement and materializes every row, with values
    /// coerced to strings in result-set column order.
    async fn query(
        &mut self,
        statement: &Self::Statement,
        params: &[&str],
        table: &str,
    ) -> Result<Vec<RowEvent>, DbError>;
}
