use serde_json::Value;

use crate::error::DecodeError;

/// One decoded line of a generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Text-completion shape: `{"response": "..."}`
    Generate { response_text: String },
    /// Chat shape: `{"message": {"content": "..."}}` or `{"delta": {"content": "..."}}`
    Chat {
        message_content: Option<String>,
        delta_content: Option<String>,
    },
}

impl StreamFrame {
    pub fn generate(text: impl Into<String>) -> Self {
        StreamFrame::Generate {
            response_text: text.into(),
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        StreamFrame::Chat {
            message_content: Some(text.into()),
            delta_content: None,
        }
    }

    pub fn delta(text: impl Into<String>) -> Self {
        StreamFrame::Chat {
            message_content: None,
            delta_content: Some(text.into()),
        }
    }

    /// The text carried by this frame. Message content wins over delta
    /// content when a chat frame carries both.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamFrame::Generate { response_text } => Some(response_text),
            StreamFrame::Chat {
                message_content: Some(content),
                ..
            } => Some(content),
            StreamFrame::Chat { delta_content, .. } => delta_content.as_deref(),
        }
    }
}

/// A frame together with the terminal flag the server puts on the last line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub frame: StreamFrame,
    pub done: bool,
}

/// Classifies a parsed JSON line into a [`StreamFrame`].
///
/// `response` is checked first, then `message.content`, then `delta.content`.
/// Anything else, including a `done` line without payload, is
/// [`DecodeError::UnrecognizedShape`].
pub fn classify(value: &Value) -> Result<DecodedFrame, DecodeError> {
    let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);

    if let Some(text) = value.get("response").and_then(Value::as_str) {
        return Ok(DecodedFrame {
            frame: StreamFrame::generate(text),
            done,
        });
    }

    let message_content = nested_content(value, "message");
    let delta_content = nested_content(value, "delta");
    if message_content.is_none() && delta_content.is_none() {
        return Err(DecodeError::UnrecognizedShape {
            line: value.to_string(),
        });
    }

    Ok(DecodedFrame {
        frame: StreamFrame::Chat {
            message_content,
            delta_content,
        },
        done,
    })
}

/// Parses and classifies a single raw line.
pub fn decode_line(line: &str) -> Result<DecodedFrame, DecodeError> {
    let value: Value = serde_json::from_str(line).map_err(|err| DecodeError::MalformedLine {
        line: line.to_string(),
        reason: err.to_string(),
    })?;
    classify(&value)
}

fn nested_content(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .filter(|inner| inner.is_object())
        .and_then(|inner| inner.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
