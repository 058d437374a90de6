use crate::{
    error::{ConnectorError, DbError},
    sql::{
        base::provider::{ConnectionProvider, PollConnection},
        postgres::{
            params::PgParamStore,
            row::to_row_event,
            utils::{connect_client, numbered_placeholders},
        },
    },
};
use async_trait::async_trait;
use model::{execution::connection::DirectConnection, records::event::RowEvent};
use tokio_postgres::{Client, Config, Statement};
use tracing::debug;

pub const PRODUCT_POSTGRES: &str = "PostgreSQL";

/// Opens one client per `connect` call; the session keeps it for its lifetime.
#[derive(Clone)]
pub struct PgProvider {
    config: Config,
}

impl PgProvider {
    pub fn new(conn: &DirectConnection) -> Result<Self, ConnectorError> {
        let mut config = conn
            .url
            .parse::<Config>()
            .map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
        if let Some(user) = &conn.username {
            config.user(user);
        }
        if let Some(pass) = &conn.password {
            config.password(pass);
        }
        Ok(PgProvider { config })
    }
}

#[async_trait]
impl ConnectionProvider for PgProvider {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection, ConnectorError> {
        let client = connect_client(self.config.clone()).await?;
        Ok(PgConnection { client })
    }
}

pub struct PgConnection {
    client: Client,
}

#[async_trait]
impl PollConnection for PgConnection {
    type Statement = Statement;

    async fn product_name(&mut self) -> Result<String, ConnectorError> {
        if self.client.is_closed() {
            return Err(ConnectorError::Unavailable(
                "Postgres connection is closed".to_string(),
            ));
        }
        Ok(PRODUCT_POSTGRES.to_string())
    }

    async fn prepare(&mut self, sql: &str) -> Result<Statement, DbError> {
        let sql = numbered_placeholders(sql);
        debug!(%sql, "Preparing Postgres statement");
        Ok(self.client.prepare(&sql).await?)
    }

    async fn query(
        &mut self,
        statement: &Statement,
        params: &[&str],
        table: &str,
    ) -> Result<Vec<RowEvent>, DbError> {
        let bindings = PgParamStore::for_statement(statement.params(), params)?;
        let rows = self.client.query(statement, &bindings.as_refs()).await?;
        Ok(rows.iter().map(|row| to_row_event(row, table)).collect())
    }
}
