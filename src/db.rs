//! PostgreSQL connection bootstrap

use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

use crate::config::Config;
use crate::error::Result;

/// Connect to the configured database and return a ready client.
///
/// The connection task is driven in the background; a failure there ends
/// in-flight queries with an error on the client side.
pub async fn connect(config: &Config) -> Result<Client> {
    let (client, connection) = tokio_postgres::connect(&config.connection_string(), NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "postgres connection task failed");
        }
    });
    debug!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        "connected to postgres"
    );
    Ok(client)
}
