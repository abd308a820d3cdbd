use std::sync::Arc;

use async_trait::async_trait;
use retentor_core::AppResult;

use super::gateway::DatabaseGateway;

/// Resolves named connection references into database gateways.
#[async_trait]
pub trait GatewayProvider: Send + Sync {
    /// Returns a reusable gateway for one connection reference.
    async fn gateway_for(&self, connection_reference: &str)
    -> AppResult<Arc<dyn DatabaseGateway>>;
}
