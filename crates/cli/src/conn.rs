use crate::error::CliError;
use connectors::{
    adapter::Adapter,
    sql::base::provider::{ConnectionProvider, PollConnection},
};
use model::execution::connection::{DirectConnection, Driver};
use tracing::{error, info};

/// Opens a connection and asks the server for its product name, which is
/// also the name templates are resolved by.
pub async fn test_connection(driver: Driver, url: &str) -> Result<String, CliError> {
    info!(%driver, "Testing connection");

    let adapter = Adapter::from_direct(&DirectConnection::new(url, Some(driver)))?;
    let mut conn = adapter.connect().await.map_err(|e| {
        error!(%driver, error = %e, "Connection failed");
        e
    })?;
    let product = conn.product_name().await?;

    info!(%driver, %product, "Connection OK");
    Ok(product)
}
