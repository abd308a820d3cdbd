use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use retentor_application::{DatabaseGateway, GatewayProvider};
use retentor_core::{AppError, AppResult};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use tokio::sync::Mutex;
use tracing::info;

use crate::mysql_database_gateway::MySqlDatabaseGateway;

/// Pool size used when a connection does not set one.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 2;

/// Connection details for one named connection reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// `mysql://` connection URL.
    pub url: String,
    /// Upper bound of pooled connections.
    pub max_connections: u32,
}

/// Resolves connection references into pooled MySQL gateways.
///
/// One pool is opened per reference on first use and shared for the rest of
/// the run.
pub struct MySqlGatewayRegistry {
    connections: HashMap<String, ConnectionSettings>,
    statement_timeout: Option<Duration>,
    gateways: Mutex<HashMap<String, Arc<MySqlDatabaseGateway>>>,
}

impl MySqlGatewayRegistry {
    /// Creates a registry over the configured connections.
    #[must_use]
    pub fn new(
        connections: HashMap<String, ConnectionSettings>,
        statement_timeout: Option<Duration>,
    ) -> Self {
        Self {
            connections,
            statement_timeout,
            gateways: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true when a reference has connection details.
    #[must_use]
    pub fn is_configured(&self, connection_reference: &str) -> bool {
        self.connections.contains_key(connection_reference)
    }

    /// Returns the gateway for a reference, opening its pool on first use.
    pub async fn connect(&self, connection_reference: &str) -> AppResult<Arc<MySqlDatabaseGateway>> {
        let mut gateways = self.gateways.lock().await;
        if let Some(gateway) = gateways.get(connection_reference) {
            return Ok(gateway.clone());
        }

        let settings = self.connections.get(connection_reference).ok_or_else(|| {
            AppError::Query(format!(
                "connection '{connection_reference}' is not configured"
            ))
        })?;

        let options = MySqlConnectOptions::from_str(settings.url.as_str()).map_err(|error| {
            AppError::Query(format!(
                "invalid url for connection '{connection_reference}': {error}"
            ))
        })?;

        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await
            .map_err(|error| {
                AppError::Query(format!(
                    "failed to connect using '{connection_reference}': {error}"
                ))
            })?;

        info!(
            connection = connection_reference,
            max_connections = settings.max_connections,
            "opened connection pool"
        );

        let gateway = Arc::new(
            MySqlDatabaseGateway::new(connection_reference, pool)
                .with_statement_timeout(self.statement_timeout),
        );
        gateways.insert(connection_reference.to_owned(), gateway.clone());
        Ok(gateway)
    }
}

#[async_trait]
impl GatewayProvider for MySqlGatewayRegistry {
    async fn gateway_for(
        &self,
        connection_reference: &str,
    ) -> AppResult<Arc<dyn DatabaseGateway>> {
        let gateway: Arc<dyn DatabaseGateway> = self.connect(connection_reference).await?;
        Ok(gateway)
    }
}
