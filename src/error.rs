use thiserror::Error;

use crate::assembler::AssembledResponse;

/// Errors produced while turning the response byte stream into frames.
///
/// Only [`DecodeError::Transport`] ends the stream; the other variants are
/// logged by the reader and skipped.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The line was not valid JSON (keep-alive fragments, truncated writes)
    #[error("malformed stream line: {reason}. Raw line: {line}")]
    MalformedLine { line: String, reason: String },
    /// Valid JSON without a `response`, `message` or `delta` payload
    #[error("unrecognized frame shape: {line}")]
    UnrecognizedShape { line: String },
    /// The underlying connection failed while reading
    #[error("transport error while reading stream: {0}")]
    Transport(String),
}

impl DecodeError {
    /// Whether the reader may keep consuming the stream after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DecodeError::Transport(_))
    }
}

/// Errors raised while decoding an inline Base64 image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageDecodeError {
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
    #[error("image payload is empty")]
    Empty,
    #[error("unsupported or corrupt image data (declared image/{declared})")]
    UnsupportedFormat { declared: String },
}

/// Errors surfaced to the caller of a generation request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request was rejected before anything was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The server answered with a non-2xx status
    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },
    /// Connecting or reading failed. `partial` holds whatever was streamed
    /// before the failure.
    #[error("Transport error: {cause}")]
    Transport {
        cause: String,
        partial: Option<AssembledResponse>,
    },
    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,
}

impl RequestError {
    /// Text streamed before a transport failure, if any.
    pub fn partial(&self) -> Option<&AssembledResponse> {
        match self {
            RequestError::Transport { partial, .. } => partial.as_ref(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RequestError::Cancelled)
    }

    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        RequestError::Transport {
            cause: err.to_string(),
            partial: None,
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        RequestError::transport(err)
    }
}

/// Errors raised while listing models from the server.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Ollama server unreachable: {0}")]
    Unreachable(String),
    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("Response format error: {message}. Raw response: {raw_response}")]
    ResponseFormat {
        message: String,
        raw_response: String,
    },
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::Unreachable(err.to_string())
    }
}

/// Failure reported by a web-search collaborator.
#[derive(Debug, Clone, Error)]
#[error("Web search failed: {0}")]
pub struct SearchError(pub String);

/// Errors raised while loading a local image to attach to a request.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("could not read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognized image format: {0}")]
    UnknownFormat(String),
}
