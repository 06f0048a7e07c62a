//! Streaming client core for a locally hosted [Ollama](https://ollama.com) server.
//!
//! The crate covers the parts of a chat front-end that deal with the model
//! server:
//!
//! - [`prompt`] builds the prompt text from the user's input, attached files
//!   and web-search results;
//! - [`client::OllamaStreamClient`] sends a [`request::GenerationRequest`] and
//!   streams the answer on a background task, reporting progress through a
//!   [`client::StreamListener`];
//! - [`stream`] decodes the newline-delimited JSON body into frames;
//! - [`assembler::ResponseAssembler`] accumulates text and inline images;
//! - [`catalog::ModelCatalogClient`] lists installed models.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ollama_desk::client::{ClientConfig, OllamaStreamClient};
//! use ollama_desk::request::GenerationRequest;
//!
//! # async fn run() -> Result<(), ollama_desk::error::RequestError> {
//! let client = OllamaStreamClient::new(Arc::new(ClientConfig::default()));
//! let request = GenerationRequest::builder("llama3").prompt("Hello").build()?;
//! let handle = client.send(request, |text: &str| println!("{text}"));
//! let response = handle.result().await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod catalog;
pub mod client;
pub mod error;
pub mod health;
pub mod image;
pub mod prompt;
pub mod request;
pub mod stream;

pub use assembler::{AssembledResponse, ResponseAssembler};
pub use catalog::{ModelCatalog, ModelCatalogClient};
pub use client::{ClientConfig, OllamaStreamClient, StreamHandle, StreamListener};
pub use request::GenerationRequest;
