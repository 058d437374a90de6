use crate::{
    error::{ConnectorError, DbError},
    sql::{
        base::provider::{ConnectionProvider, PollConnection},
        mysql::row::to_row_event,
    },
};
use async_trait::async_trait;
use model::{execution::connection::DirectConnection, records::event::RowEvent};
use mysql_async::{
    Conn, Opts, OptsBuilder, Params, Pool, Row, Statement, Value as MySqlValue, prelude::Queryable,
};
use tracing::debug;

pub const PRODUCT_MYSQL: &str = "MySQL";
pub const PRODUCT_MARIADB: &str = "MariaDB";

/// Pool-backed provider for MySQL and MariaDB servers.
#[derive(Clone)]
pub struct MySqlProvider {
    pool: Pool,
}

impl MySqlProvider {
    pub fn new(conn: &DirectConnection) -> Result<Self, ConnectorError> {
        let opts =
            Opts::from_url(&conn.url).map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
        let mut builder = OptsBuilder::from_opts(opts);
        if let Some(user) = &conn.username {
            builder = builder.user(Some(user));
        }
        if let Some(pass) = &conn.password {
            builder = builder.pass(Some(pass));
        }

        Ok(MySqlProvider {
            pool: Pool::new(builder),
        })
    }
}

#[async_trait]
impl ConnectionProvider for MySqlProvider {
    type Connection = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection, ConnectorError> {
        let conn = self.pool.get_conn().await?;
        Ok(MySqlConnection { conn })
    }
}

pub struct MySqlConnection {
    conn: Conn,
}

#[async_trait]
impl PollConnection for MySqlConnection {
    type Statement = Statement;

    async fn product_name(&mut self) -> Result<String, ConnectorError> {
        let version: Option<String> = self.conn.query_first("SELECT VERSION()").await?;
        let version = version.unwrap_or_default();
        debug!(%version, "MySQL server version");

        if version.to_ascii_lowercase().contains("mariadb") {
            Ok(PRODUCT_MARIADB.to_string())
        } else {
            Ok(PRODUCT_MYSQL.to_string())
        }
    }

    async fn prepare(&mut self, sql: &str) -> Result<Statement, DbError> {
        Ok(self.conn.prep(sql).await?)
    }

    async fn query(
        &mut self,
        statement: &Statement,
        params: &[&str],
        table: &str,
    ) -> Result<Vec<RowEvent>, DbError> {
        let params = if params.is_empty() {
            Params::Empty
        } else {
            // MySQL compares the string parameter against the column's own type.
            Params::Positional(
                params
                    .iter()
                    .map(|p| MySqlValue::Bytes(p.as_bytes().to_vec()))
                    .collect(),
            )
        };

        let rows: Vec<Row> = self.conn.exec(statement, params).await?;
        Ok(rows.iter().map(|row| to_row_event(row, table)).collect())
    }
}
