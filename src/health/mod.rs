use crate::error::CatalogError;

/// Reachability probe for the model server.
#[async_trait::async_trait]
pub trait HealthProvider {
    async fn health_check(&self) -> Result<(), CatalogError>;
}
