//! Accumulation of streamed frames into a single response.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::image::{find_inline_images, DecodedImage};
use crate::stream::StreamFrame;

/// Text substituted when a stream finishes without producing any text.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "[The model returned an empty response]";

/// Text and inline image accumulated for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledResponse {
    /// Append-only text in arrival order
    pub text: String,
    /// Most recent inline image found in the text
    pub embedded_image: Option<DecodedImage>,
}

/// What a single [`ResponseAssembler::apply_frame`] call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    /// Number of bytes appended to the text
    pub appended: usize,
    /// Image that replaced the previous one, if the fragment contained one
    pub image: Option<DecodedImage>,
}

impl FrameOutcome {
    pub fn has_text(&self) -> bool {
        self.appended > 0
    }
}

/// Stateful accumulator bound to one generation request.
///
/// A single reader applies frames; any number of other threads may read
/// snapshots through [`ResponseAssembler::current_text`] or a
/// [`TextSnapshot`] handle. Appends happen under a write lock, so readers
/// never observe a half-applied frame.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    state: Arc<RwLock<AssembledResponse>>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the frame's text and scans the appended fragment for an
    /// inline image. A broken image is logged and ignored.
    pub fn apply_frame(&self, frame: &StreamFrame) -> FrameOutcome {
        let Some(fragment) = frame.text().filter(|text| !text.is_empty()) else {
            return FrameOutcome::default();
        };

        let image = latest_inline_image(fragment);

        let mut state = self.state.write();
        state.text.push_str(fragment);
        if let Some(image) = &image {
            state.embedded_image = Some(image.clone());
        }

        FrameOutcome {
            appended: fragment.len(),
            image,
        }
    }

    /// Full text accumulated so far.
    pub fn current_text(&self) -> String {
        self.state.read().text.clone()
    }

    pub fn current_image(&self) -> Option<DecodedImage> {
        self.state.read().embedded_image.clone()
    }

    /// Copy of the whole response as it stands.
    pub fn snapshot(&self) -> AssembledResponse {
        self.state.read().clone()
    }

    /// Read-only handle that can be moved to another thread.
    pub fn handle(&self) -> TextSnapshot {
        TextSnapshot {
            state: Arc::clone(&self.state),
        }
    }

    /// Closes the assembler. An empty response is replaced by
    /// [`EMPTY_RESPONSE_PLACEHOLDER`].
    pub fn finalize(self) -> AssembledResponse {
        let mut response = self.snapshot();
        if response.text.is_empty() {
            log::debug!("stream produced no text, substituting placeholder");
            response.text = EMPTY_RESPONSE_PLACEHOLDER.to_string();
        }
        response
    }
}

/// Cloneable read side of a [`ResponseAssembler`].
#[derive(Debug, Clone)]
pub struct TextSnapshot {
    state: Arc<RwLock<AssembledResponse>>,
}

impl TextSnapshot {
    pub fn current_text(&self) -> String {
        self.state.read().text.clone()
    }

    pub fn current_image(&self) -> Option<DecodedImage> {
        self.state.read().embedded_image.clone()
    }
}

fn latest_inline_image(fragment: &str) -> Option<DecodedImage> {
    let mut latest = None;
    for reference in find_inline_images(fragment) {
        match reference.decode() {
            Ok(image) => {
                log::debug!(
                    "decoded inline {} image ({} bytes)",
                    image.mime.mime_type(),
                    image.len()
                );
                latest = Some(image);
            }
            Err(err) => log::warn!("skipping inline image: {err}"),
        }
    }
    latest
}
