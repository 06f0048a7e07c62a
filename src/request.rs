//! Generation requests and their JSON wire bodies.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::error::{ImageLoadError, RequestError};
use crate::image::{markdown_data_uri, ImageMime};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TOP_P: f32 = 0.9;
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParameters {
    /// Sampling temperature in `[0, 1]`
    pub temperature: f32,
    /// Nucleus sampling mass in `[0, 1]`
    pub top_p: f32,
    /// Upper bound on generated tokens, at least 1
    pub max_tokens: u32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl GenerationParameters {
    pub fn validate(&self) -> Result<(), RequestError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(RequestError::InvalidRequest(format!(
                "temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(RequestError::InvalidRequest(format!(
                "top_p must be within [0, 1], got {}",
                self.top_p
            )));
        }
        if self.max_tokens == 0 {
            return Err(RequestError::InvalidRequest(
                "max_tokens must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// An image attached to a multimodal request, already Base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub mime: ImageMime,
    pub base64: String,
}

impl ImageAttachment {
    pub fn from_bytes(mime: ImageMime, bytes: &[u8]) -> Self {
        Self {
            mime,
            base64: STANDARD.encode(bytes),
        }
    }

    /// Reads an image file, detecting its format from the content and
    /// falling back to the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ImageLoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mime = ImageMime::sniff(&bytes)
            .or_else(|| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(ImageMime::from_subtype)
            })
            .ok_or_else(|| ImageLoadError::UnknownFormat(path.display().to_string()))?;
        Ok(Self::from_bytes(mime, &bytes))
    }

    pub(crate) fn markdown(&self) -> String {
        markdown_data_uri(self.mime, &self.base64)
    }
}

/// Server endpoint a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `POST /api/generate`, plain text completion
    Generate,
    /// `POST /api/chat`, used for multimodal requests
    Chat,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Generate => "/api/generate",
            Endpoint::Chat => "/api/chat",
        }
    }
}

/// An immutable generation request. Build one with [`GenerationRequest::builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    model: String,
    prompt_text: String,
    image: Option<ImageAttachment>,
    parameters: GenerationParameters,
}

impl GenerationRequest {
    pub fn builder(model: impl Into<String>) -> GenerationRequestBuilder {
        GenerationRequestBuilder::new(model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    pub fn image(&self) -> Option<&ImageAttachment> {
        self.image.as_ref()
    }

    pub fn parameters(&self) -> &GenerationParameters {
        &self.parameters
    }

    /// Requests always stream.
    pub fn stream(&self) -> bool {
        true
    }

    /// Requests carrying an image go to the chat endpoint, all others to
    /// the generate endpoint.
    pub fn endpoint(&self) -> Endpoint {
        if self.image.is_some() {
            Endpoint::Chat
        } else {
            Endpoint::Generate
        }
    }

    /// Serializes the request body for its endpoint.
    pub fn to_body(&self) -> Result<serde_json::Value, RequestError> {
        let params = &self.parameters;
        let value = match &self.image {
            None => serde_json::to_value(GenerateBody {
                model: &self.model,
                prompt: &self.prompt_text,
                temperature: params.temperature,
                top_p: params.top_p,
                max_tokens: params.max_tokens,
                stream: true,
            }),
            Some(image) => serde_json::to_value(ChatBody {
                model: &self.model,
                messages: vec![ChatBodyMessage {
                    role: "user",
                    content: format!("{}\n\n{}", self.prompt_text, image.markdown()),
                }],
                temperature: params.temperature,
                top_p: params.top_p,
                max_tokens: params.max_tokens,
                stream: true,
            }),
        };
        value.map_err(|err| RequestError::InvalidRequest(err.to_string()))
    }
}

/// Builder for [`GenerationRequest`]
#[derive(Debug)]
pub struct GenerationRequestBuilder {
    model: String,
    prompt_text: String,
    image: Option<ImageAttachment>,
    parameters: GenerationParameters,
}

impl GenerationRequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt_text: String::new(),
            image: None,
            parameters: GenerationParameters::default(),
        }
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt_text = prompt.into();
        self
    }

    pub fn image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }

    pub fn parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.parameters.temperature = temperature;
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.parameters.top_p = top_p;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.parameters.max_tokens = max_tokens;
        self
    }

    /// Validates and builds the request.
    pub fn build(self) -> Result<GenerationRequest, RequestError> {
        if self.model.trim().is_empty() {
            return Err(RequestError::InvalidRequest(
                "model name must not be empty".to_string(),
            ));
        }
        self.parameters.validate()?;
        Ok(GenerationRequest {
            model: self.model,
            prompt_text: self.prompt_text,
            image: self.image,
            parameters: self.parameters,
        })
    }
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatBodyMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatBodyMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream: bool,
}
