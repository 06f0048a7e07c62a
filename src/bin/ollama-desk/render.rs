use std::io::{self, Write};

use ollama_desk::client::StreamEvent;
use ollama_desk::image::DecodedImage;

/// Renders full-text snapshots to the terminal by printing only the part
/// that has not been printed yet.
#[derive(Default)]
pub struct TerminalRenderer {
    printed: usize,
    image: Option<DecodedImage>,
}

impl TerminalRenderer {
    pub fn apply(&mut self, event: StreamEvent) -> io::Result<()> {
        match event {
            StreamEvent::Partial(text) => self.render_text(&text),
            StreamEvent::Image(image) => {
                log::debug!("received inline {} image", image.mime.mime_type());
                self.image = Some(image);
                Ok(())
            }
        }
    }

    pub fn render_text(&mut self, text: &str) -> io::Result<()> {
        let Some(unseen) = text.get(self.printed..) else {
            return Ok(());
        };
        if unseen.is_empty() {
            return Ok(());
        }
        let mut stdout = io::stdout();
        stdout.write_all(unseen.as_bytes())?;
        stdout.flush()?;
        self.printed = text.len();
        Ok(())
    }

    pub fn take_image(&mut self) -> Option<DecodedImage> {
        self.image.take()
    }

    #[cfg(test)]
    fn printed(&self) -> usize {
        self.printed
    }
}
