//! Model catalog fetched from `GET /api/tags`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::client::ClientConfig;
use crate::error::CatalogError;
use crate::health::HealthProvider;

const TAGS_PATH: &str = "/api/tags";

/// Model names in server order, stamped with the time they were fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    pub names: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

impl ModelCatalog {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|candidate| candidate == name)
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

/// Fetches and caches the list of installed models.
///
/// The cache is replaced whole on every successful fetch. A failed fetch
/// leaves any previous catalog in place and reports the error.
#[derive(Debug)]
pub struct ModelCatalogClient {
    config: Arc<ClientConfig>,
    cache: Mutex<Option<ModelCatalog>>,
}

impl ModelCatalogClient {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self {
            config,
            cache: Mutex::new(None),
        }
    }

    /// Returns the cached model names, fetching them on first use.
    pub async fn fetch_models(&self) -> Result<Vec<String>, CatalogError> {
        let mut cache = self.cache.lock().await;
        if let Some(catalog) = cache.as_ref() {
            return Ok(catalog.names.clone());
        }
        let catalog = self.fetch_catalog().await?;
        let names = catalog.names.clone();
        *cache = Some(catalog);
        Ok(names)
    }

    /// Fetches the catalog from the server, ignoring the cache.
    pub async fn refresh(&self) -> Result<ModelCatalog, CatalogError> {
        let mut cache = self.cache.lock().await;
        let catalog = self.fetch_catalog().await?;
        *cache = Some(catalog.clone());
        Ok(catalog)
    }

    /// The cached catalog, if one has been fetched.
    pub async fn cached(&self) -> Option<ModelCatalog> {
        self.cache.lock().await.clone()
    }

    async fn fetch_catalog(&self) -> Result<ModelCatalog, CatalogError> {
        let url = self.config.url(TAGS_PATH);
        let client = Client::builder()
            .timeout(self.config.catalog_timeout)
            .build()?;

        let resp = client.get(&url).send().await?;
        log::debug!("GET {} -> {}", url, resp.status());

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(CatalogError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse =
            serde_json::from_str(&body).map_err(|err| CatalogError::ResponseFormat {
                message: err.to_string(),
                raw_response: body.clone(),
            })?;

        let names: Vec<String> = tags.models.into_iter().map(|model| model.name).collect();
        log::debug!("catalog lists {} models", names.len());
        Ok(ModelCatalog {
            names,
            fetched_at: Utc::now(),
        })
    }
}

#[async_trait::async_trait]
impl HealthProvider for ModelCatalogClient {
    async fn health_check(&self) -> Result<(), CatalogError> {
        self.fetch_catalog().await.map(|_| ())
    }
}
