use crate::{
    error::{ConnectorError, DbError},
    registry::DatasourceRegistry,
    sql::{
        base::provider::{ConnectionProvider, PollConnection},
        mysql::provider::{MySqlConnection, MySqlProvider},
        postgres::provider::{PgConnection, PgProvider},
    },
};
use async_trait::async_trait;
use model::{
    execution::connection::{ConnectionDescriptor, DirectConnection, Driver},
    records::event::RowEvent,
};
use tracing::debug;

/// Provider for whichever driver a session's connection names.
#[derive(Clone)]
pub enum Adapter {
    MySql(MySqlProvider),
    Postgres(PgProvider),
}

impl Adapter {
    pub fn from_direct(conn: &DirectConnection) -> Result<Self, ConnectorError> {
        let driver = conn
            .driver()
            .ok_or_else(|| ConnectorError::UnsupportedDriver(conn.url.clone()))?;
        debug!(%driver, "Creating adapter");

        match driver {
            Driver::MySql => Ok(Adapter::MySql(MySqlProvider::new(conn)?)),
            Driver::Postgres => Ok(Adapter::Postgres(PgProvider::new(conn)?)),
        }
    }

    /// Resolves a datasource reference through `registry` before building
    /// the provider.
    pub fn from_descriptor(
        descriptor: &ConnectionDescriptor,
        registry: &dyn DatasourceRegistry,
    ) -> Result<Self, ConnectorError> {
        match descriptor {
            ConnectionDescriptor::Direct(conn) => Self::from_direct(conn),
            ConnectionDescriptor::Datasource(reference) => {
                let conn = registry
                    .lookup(&reference.datasource)
                    .ok_or_else(|| ConnectorError::UnknownDatasource(reference.datasource.clone()))?;
                Self::from_direct(&conn)
            }
        }
    }

    pub fn driver(&self) -> Driver {
        match self {
            Adapter::MySql(_) => Driver::MySql,
            Adapter::Postgres(_) => Driver::Postgres,
        }
    }
}

#[async_trait]
impl ConnectionProvider for Adapter {
    type Connection = AdapterConnection;

    async fn connect(&self) -> Result<AdapterConnection, ConnectorError> {
        match self {
            Adapter::MySql(provider) => Ok(AdapterConnection::MySql(provider.connect().await?)),
            Adapter::Postgres(provider) => {
                Ok(AdapterConnection::Postgres(provider.connect().await?))
            }
        }
    }
}

pub enum AdapterConnection {
    MySql(MySqlConnection),
    Postgres(PgConnection),
}

pub enum AdapterStatement {
    MySql(<MySqlConnection as PollConnection>::Statement),
    Postgres(<PgConnection as PollConnection>::Statement),
}

#[async_trait]
impl PollConnection for AdapterConnection {
    type Statement = AdapterStatement;

    async fn product_name(&mut self) -> Result<String, ConnectorError> {
        match self {
            AdapterConnection::MySql(conn) => conn.product_name().await,
            AdapterConnection::Postgres(conn) => conn.product_name().await,
        }
    }

    async fn prepare(&mut self, sql: &str) -> Result<AdapterStatement, DbError> {
        match self {
            AdapterConnection::MySql(conn) => Ok(AdapterStatement::MySql(conn.prepare(sql).await?)),
            AdapterConnection::Postgres(conn) => {
                Ok(AdapterStatement::Postgres(conn.prepare(sql).await?))
            }
        }
    }

    async fn query(
        &mut self,
        statement: &AdapterStatement,
        params: &[&str],
        table: &str,
    ) -> Result<Vec<RowEvent>, DbError> {
        match (self, statement) {
            (AdapterConnection::MySql(conn), AdapterStatement::MySql(stmt)) => {
                conn.query(stmt, params, table).await
            }
            (AdapterConnection::Postgres(conn), AdapterStatement::Postgres(stmt)) => {
                conn.query(stmt, params, table).await
            }
            _ => Err(DbError::Unknown(
                "Statement was prepared on a different driver".to_string(),
            )),
        }
    }
}
