//! Newline-delimited JSON stream decoding.
//!
//! The Ollama server writes one JSON object per line while a model is
//! generating. [`decode_frames`] turns the raw byte stream into a sequence of
//! classified [`StreamFrame`]s, tolerating keep-alive and malformed lines.

mod frame;
mod ndjson;

pub use frame::{classify, decode_line, DecodedFrame, StreamFrame};
pub use ndjson::{create_frame_stream, decode_frames, FrameStream};
