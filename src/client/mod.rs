//! HTTP clients for the Ollama server.

mod config;
mod listener;
mod ollama;

pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use listener::{ChannelListener, NoopListener, StreamEvent, StreamListener};
pub use ollama::{OllamaStreamClient, StreamHandle};
