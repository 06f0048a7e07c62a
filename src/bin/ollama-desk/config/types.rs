use std::time::Duration;

use serde::{Deserialize, Serialize};

use ollama_desk::client::{ClientConfig, DEFAULT_BASE_URL};
use ollama_desk::request::GenerationParameters;

const DEFAULT_LOG_ROTATE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_LOG_ROTATE_KEEP: usize = 5;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub generate_timeout_secs: u64,
    pub multimodal_timeout_secs: u64,
    pub catalog_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            generate_timeout_secs: defaults.generate_timeout.as_secs(),
            multimodal_timeout_secs: defaults.multimodal_timeout.as_secs(),
            catalog_timeout_secs: defaults.catalog_timeout.as_secs(),
        }
    }
}

impl ServerConfig {
    pub fn client_config(&self, base_url_override: Option<&str>) -> ClientConfig {
        ClientConfig {
            base_url: base_url_override.unwrap_or(&self.base_url).to_string(),
            generate_timeout: Duration::from_secs(self.generate_timeout_secs),
            multimodal_timeout: Duration::from_secs(self.multimodal_timeout_secs),
            catalog_timeout: Duration::from_secs(self.catalog_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let defaults = GenerationParameters::default();
        Self {
            model: None,
            temperature: defaults.temperature,
            top_p: defaults.top_p,
            max_tokens: defaults.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub path: Option<String>,
    pub rotate_size: u64,
    pub rotate_keep: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: None,
            rotate_size: DEFAULT_LOG_ROTATE_SIZE,
            rotate_keep: DEFAULT_LOG_ROTATE_KEEP,
        }
    }
}
