use tokio::sync::mpsc;

use crate::image::DecodedImage;

/// Receives incremental updates from a running request.
///
/// Callbacks run on the request's background task. Implementations must not
/// block and must not touch thread-bound UI state directly; hand the update
/// to the owning thread instead (see [`ChannelListener`]).
pub trait StreamListener: Send + Sync {
    /// Called with the full text accumulated so far, never with a delta.
    fn on_partial(&self, text: &str);

    /// Called when an inline image replaced the current one.
    fn on_image(&self, _image: &DecodedImage) {}
}

impl<F> StreamListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_partial(&self, text: &str) {
        self(text)
    }
}

/// Listener that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl StreamListener for NoopListener {
    fn on_partial(&self, _text: &str) {}
}

/// Update forwarded by a [`ChannelListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Full text so far
    Partial(String),
    /// Newly decoded inline image
    Image(DecodedImage),
}

/// Forwards updates over an unbounded channel so the consumer can apply
/// them on its own thread. Sending never blocks.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelListener {
    /// Creates a listener together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, event: StreamEvent) {
        if self.sender.send(event).is_err() {
            log::trace!("stream listener receiver dropped");
        }
    }
}

impl StreamListener for ChannelListener {
    fn on_partial(&self, text: &str) {
        self.forward(StreamEvent::Partial(text.to_string()));
    }

    fn on_image(&self, image: &DecodedImage) {
        self.forward(StreamEvent::Image(image.clone()));
    }
}
