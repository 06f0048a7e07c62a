use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::DecodeError;

use super::frame::{decode_line, DecodedFrame};

const LINE_DELIMITER: char = '\n';

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<DecodedFrame, DecodeError>> + Send>>;

/// Decodes the body of a streaming response into frames, one per line.
pub fn create_frame_stream(response: reqwest::Response) -> FrameStream {
    decode_frames(response.bytes_stream())
}

/// Decodes any newline-delimited JSON byte stream into frames.
///
/// Malformed or unrecognized lines are yielded as recoverable errors and the
/// stream continues. A transport error is yielded once and ends the stream.
pub fn decode_frames<S, E>(bytes: S) -> FrameStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let stream = bytes
        .map(Some)
        .chain(stream::once(async { None }))
        .scan(LineBuffer::default(), |state, chunk| {
            let results = match chunk {
                Some(chunk) => state.handle_chunk(chunk),
                None => state.finish(),
            };
            futures::future::ready(Some(results))
        })
        .flat_map(stream::iter)
        .scan(false, |failed, item: Result<DecodedFrame, DecodeError>| {
            if *failed {
                return futures::future::ready(None);
            }
            if matches!(item, Err(DecodeError::Transport(_))) {
                *failed = true;
            }
            futures::future::ready(Some(item))
        });

    Box::pin(stream)
}

#[derive(Default)]
struct LineBuffer {
    buffer: String,
    utf8_buffer: Vec<u8>,
}

impl LineBuffer {
    fn handle_chunk<E: Display>(
        &mut self,
        chunk: Result<Bytes, E>,
    ) -> Vec<Result<DecodedFrame, DecodeError>> {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(err) => return vec![Err(DecodeError::Transport(err.to_string()))],
        };
        self.push_bytes(&bytes);
        self.drain_lines()
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.utf8_buffer.extend_from_slice(bytes);
        loop {
            match std::str::from_utf8(&self.utf8_buffer) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.utf8_buffer.clear();
                    return;
                }
                Err(err) => match err.error_len() {
                    // Invalid sequence: replace only it, then keep scanning so a
                    // split character after it is still carried over.
                    Some(invalid_len) => {
                        self.consume_valid_prefix(err.valid_up_to());
                        self.buffer.push(char::REPLACEMENT_CHARACTER);
                        self.utf8_buffer.drain(..invalid_len);
                    }
                    None => {
                        self.consume_valid_prefix(err.valid_up_to());
                        return;
                    }
                },
            }
        }
    }

    fn consume_valid_prefix(&mut self, valid_up_to: usize) {
        if valid_up_to == 0 {
            return;
        }

        let valid = String::from_utf8_lossy(&self.utf8_buffer[..valid_up_to]);
        self.buffer.push_str(&valid);
        self.utf8_buffer.drain(..valid_up_to);
    }

    fn drain_lines(&mut self) -> Vec<Result<DecodedFrame, DecodeError>> {
        let mut results = Vec::new();
        while let Some(line) = self.next_line() {
            if let Some(result) = decode_trimmed(&line) {
                results.push(result);
            }
        }
        results
    }

    fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.find(LINE_DELIMITER)?;
        let line = self.buffer[..pos].to_string();
        self.buffer.drain(..=pos);
        Some(line)
    }

    /// Flushes an unterminated final line once the body has ended.
    fn finish(&mut self) -> Vec<Result<DecodedFrame, DecodeError>> {
        if !self.utf8_buffer.is_empty() {
            let rest = String::from_utf8_lossy(&self.utf8_buffer).into_owned();
            self.buffer.push_str(&rest);
            self.utf8_buffer.clear();
        }
        let mut results = self.drain_lines();
        let tail = std::mem::take(&mut self.buffer);
        if let Some(result) = decode_trimmed(&tail) {
            results.push(result);
        }
        results
    }
}

fn decode_trimmed(line: &str) -> Option<Result<DecodedFrame, DecodeError>> {
    let line = line.trim();
    if line.is_empty() {
        log::trace!("skipping blank keep-alive line");
        return None;
    }
    Some(decode_line(line))
}

#[cfg(test)]
#[path = "ndjson_tests.rs"]
mod tests;
