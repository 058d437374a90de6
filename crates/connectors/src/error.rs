use thiserror::Error;

/// Errors happening while obtaining or validating a database connection.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// MySQL driver failed to hand out a connection.
    #[error("MySQL connection error: {0}")]
    MySql(#[from] mysql_async::Error),

    /// Postgres driver failed to connect.
    #[error("Postgres connection error: {0}")]
    Connection(#[from] tokio_postgres::Error),

    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] native_tls::Error),

    /// A named datasource is not registered.
    #[error("Datasource '{0}' cannot be found")]
    UnknownDatasource(String),

    /// Neither the driver identifier nor the URL scheme names a supported driver.
    #[error("Unsupported driver for connection '{0}'")]
    UnsupportedDriver(String),

    #[error("Connection unavailable: {0}")]
    Unavailable(String),
}

/// All errors coming from the query layer once a connection is established.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("MySQL error: {0}")]
    MySqlError(#[from] mysql_async::Error),

    #[error("Postgres error: {0}")]
    PgError(#[from] tokio_postgres::Error),

    /// The watermark could not be converted to the parameter type the
    /// prepared statement declares.
    #[error("Cannot bind '{value}' as {expected}")]
    Coercion { value: String, expected: String },

    #[error("Unknown error: {0}")]
    Unknown(String),
}
