//! Inline image handling.
//!
//! Models served through the chat endpoint may answer with markdown image
//! links whose target is a `data:image/<subtype>;base64,<payload>` URI. This
//! module finds those links in a text fragment and decodes their payload.

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;

use crate::error::ImageDecodeError;

/// The supported MIME type of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImageMime {
    /// JPEG image
    JPEG,
    /// PNG image
    PNG,
    /// GIF image
    GIF,
    /// WebP image
    WEBP,
    /// BMP image
    BMP,
}

impl ImageMime {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageMime::JPEG => "image/jpeg",
            ImageMime::PNG => "image/png",
            ImageMime::GIF => "image/gif",
            ImageMime::WEBP => "image/webp",
            ImageMime::BMP => "image/bmp",
        }
    }

    /// Maps a subtype or file extension (`png`, `jpg`, ...) to a MIME type.
    pub fn from_subtype(subtype: &str) -> Option<Self> {
        match subtype.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(ImageMime::JPEG),
            "png" => Some(ImageMime::PNG),
            "gif" => Some(ImageMime::GIF),
            "webp" => Some(ImageMime::WEBP),
            "bmp" => Some(ImageMime::BMP),
            _ => None,
        }
    }

    /// Detects the format from the leading magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageMime::JPEG)
        } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageMime::PNG)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageMime::GIF)
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(ImageMime::WEBP)
        } else if data.starts_with(b"BM") && data.len() >= 26 {
            Some(ImageMime::BMP)
        } else {
            None
        }
    }
}

/// An image decoded from an inline data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Format detected from the image bytes
    pub mime: ImageMime,
    /// Subtype as written in the data URI, which may disagree with `mime`
    pub declared_subtype: String,
    /// Raw image bytes
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A data-URI image link found in markdown text. Borrows from the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineImageRef<'a> {
    pub alt: &'a str,
    pub subtype: &'a str,
    pub payload: &'a str,
}

impl InlineImageRef<'_> {
    pub fn decode(&self) -> Result<DecodedImage, ImageDecodeError> {
        decode_inline_image(self.subtype, self.payload)
    }
}

fn inline_image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"!\[([^\]]*)\]\(\s*data:image/([A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=\s]+?)\s*\)")
            .expect("inline image pattern is a valid regex")
    })
}

/// Finds every markdown data-URI image link in `text`, in order of appearance.
pub fn find_inline_images(text: &str) -> Vec<InlineImageRef<'_>> {
    inline_image_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            Some(InlineImageRef {
                alt: caps.get(1)?.as_str(),
                subtype: caps.get(2)?.as_str(),
                payload: caps.get(3)?.as_str(),
            })
        })
        .collect()
}

/// Decodes a Base64 image payload and checks that the bytes are an image.
pub fn decode_inline_image(subtype: &str, payload: &str) -> Result<DecodedImage, ImageDecodeError> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(ImageDecodeError::Empty);
    }
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| ImageDecodeError::InvalidBase64(err.to_string()))?;
    if bytes.is_empty() {
        return Err(ImageDecodeError::Empty);
    }
    let mime = ImageMime::sniff(&bytes).ok_or_else(|| ImageDecodeError::UnsupportedFormat {
        declared: subtype.to_string(),
    })?;
    Ok(DecodedImage {
        mime,
        declared_subtype: subtype.to_ascii_lowercase(),
        bytes,
    })
}

/// Renders bytes as a markdown image link with a data URI.
pub fn markdown_data_uri(mime: ImageMime, base64_payload: &str) -> String {
    format!("![image](data:{};base64,{})", mime.mime_type(), base64_payload)
}
