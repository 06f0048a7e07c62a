//! Streaming generation client.

use std::sync::Arc;

use futures::StreamExt;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::assembler::{AssembledResponse, ResponseAssembler, TextSnapshot};
use crate::error::RequestError;
use crate::request::GenerationRequest;
use crate::stream::{create_frame_stream, FrameStream};

use super::config::ClientConfig;
use super::listener::StreamListener;

/// Client for the streaming `/api/generate` and `/api/chat` endpoints.
///
/// Each request opens its own connection and runs on its own task. Nothing
/// is retried: failures go back to the caller.
#[derive(Debug, Clone)]
pub struct OllamaStreamClient {
    config: Arc<ClientConfig>,
}

impl OllamaStreamClient {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Starts a request on a background task and returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn send<L>(&self, request: GenerationRequest, listener: L) -> StreamHandle
    where
        L: StreamListener + 'static,
    {
        let assembler = ResponseAssembler::new();
        let snapshot = assembler.handle();
        let cancel = CancellationToken::new();
        let config = Arc::clone(&self.config);
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            execute(&config, &request, assembler, &listener, &task_cancel).await
        });

        StreamHandle {
            cancel: cancel.drop_guard(),
            snapshot,
            task,
        }
    }

    /// Runs a request on the current task, returning once the stream ends.
    pub async fn send_and_wait(
        &self,
        request: &GenerationRequest,
        listener: &dyn StreamListener,
        cancel: &CancellationToken,
    ) -> Result<AssembledResponse, RequestError> {
        execute(&self.config, request, ResponseAssembler::new(), listener, cancel).await
    }
}

/// Handle on an in-flight request started with [`OllamaStreamClient::send`].
///
/// Dropping the handle, or the future returned by [`StreamHandle::result`],
/// cancels the request.
#[derive(Debug)]
pub struct StreamHandle {
    cancel: DropGuard,
    snapshot: TextSnapshot,
    task: JoinHandle<Result<AssembledResponse, RequestError>>,
}

impl StreamHandle {
    /// Requests cancellation. The connection is closed and no further
    /// callbacks are scheduled; one already running may still complete.
    pub fn cancel(&self) {
        self.cancel.token().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.token().is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.token().clone()
    }

    /// Text streamed so far, readable from any thread.
    pub fn current_text(&self) -> String {
        self.snapshot.current_text()
    }

    pub fn snapshot(&self) -> TextSnapshot {
        self.snapshot.clone()
    }

    /// Waits for the request to finish.
    pub async fn result(self) -> Result<AssembledResponse, RequestError> {
        let Self {
            cancel: _guard,
            task,
            ..
        } = self;
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(RequestError::Cancelled),
            Err(err) => Err(RequestError::Transport {
                cause: format!("stream task failed: {err}"),
                partial: None,
            }),
        }
    }
}

async fn execute(
    config: &ClientConfig,
    request: &GenerationRequest,
    assembler: ResponseAssembler,
    listener: &dyn StreamListener,
    cancel: &CancellationToken,
) -> Result<AssembledResponse, RequestError> {
    let endpoint = request.endpoint();
    let url = config.url(endpoint.path());
    let timeout = config.timeout_for(endpoint);
    let body = request.to_body()?;

    log::debug!(
        "POST {} (model {}, prompt {} chars, image: {})",
        url,
        request.model(),
        request.prompt_text().len(),
        request.image().is_some()
    );

    let client = Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .pool_max_idle_per_host(0)
        .build()?;

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(RequestError::Cancelled),
        response = client.post(&url).json(&body).send() => response?,
    };

    let status = response.status();
    log::debug!("Ollama HTTP status: {}", status);
    if !status.is_success() {
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RequestError::Cancelled),
            body = response.text() => match body {
                Ok(body) => body,
                Err(err) => format!("<unreadable error body: {err}>"),
            },
        };
        return Err(RequestError::ServerError {
            status: status.as_u16(),
            body,
        });
    }

    pump_frames(create_frame_stream(response), &assembler, listener, cancel).await?;
    Ok(assembler.finalize())
}

/// Applies frames in arrival order until the stream ends, fails or is
/// cancelled. Dropping `frames` on return closes the connection.
pub(crate) async fn pump_frames(
    mut frames: FrameStream,
    assembler: &ResponseAssembler,
    listener: &dyn StreamListener,
    cancel: &CancellationToken,
) -> Result<(), RequestError> {
    let mut applied = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("request cancelled after {} frames", applied);
                return Err(RequestError::Cancelled);
            }
            next = frames.next() => next,
        };

        let Some(item) = next else {
            log::debug!("stream ended after {} frames", applied);
            return Ok(());
        };

        match item {
            Ok(decoded) => {
                let outcome = assembler.apply_frame(&decoded.frame);
                applied += 1;
                if cancel.is_cancelled() {
                    return Err(RequestError::Cancelled);
                }
                if outcome.has_text() {
                    listener.on_partial(&assembler.current_text());
                }
                if let Some(image) = &outcome.image {
                    if cancel.is_cancelled() {
                        return Err(RequestError::Cancelled);
                    }
                    listener.on_image(image);
                }
                if decoded.done {
                    log::trace!("server flagged final frame");
                }
            }
            Err(err) if err.is_recoverable() => log::warn!("skipping stream line: {err}"),
            Err(err) => {
                return Err(RequestError::Transport {
                    cause: err.to_string(),
                    partial: Some(assembler.snapshot()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests;
