use std::time::Duration;

use crate::request::Endpoint;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const DEFAULT_GENERATE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MULTIMODAL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 5;

/// Connection settings shared by the stream and catalog clients.
///
/// Immutable once handed to a client; build a new one to change the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server base URL, e.g. `http://localhost:11434`
    pub base_url: String,
    /// Connect and read timeout for `/api/generate`
    pub generate_timeout: Duration,
    /// Connect and read timeout for `/api/chat` requests carrying an image
    pub multimodal_timeout: Duration,
    /// Timeout for `/api/tags`
    pub catalog_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            generate_timeout: Duration::from_secs(DEFAULT_GENERATE_TIMEOUT_SECS),
            multimodal_timeout: Duration::from_secs(DEFAULT_MULTIMODAL_TIMEOUT_SECS),
            catalog_timeout: Duration::from_secs(DEFAULT_CATALOG_TIMEOUT_SECS),
        }
    }

    pub fn timeout_for(&self, endpoint: Endpoint) -> Duration {
        match endpoint {
            Endpoint::Generate => self.generate_timeout,
            Endpoint::Chat => self.multimodal_timeout,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
