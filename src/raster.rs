use std::{fmt, str::FromStr};

use image::{ImageFormat, RgbaImage};

use crate::error::{AnalysisError, DecodeError, Result};

/// RGBA8 pixel buffer shared by every stage of the pipeline.
pub type PixelBuffer = RgbaImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Jpeg,
    Png,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Png => "image/png",
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            ImageMime::Jpeg => ImageFormat::Jpeg,
            ImageMime::Png => ImageFormat::Png,
        }
    }

    /// Detects the type from magic bytes.
    pub fn sniff(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Jpeg) => Ok(ImageMime::Jpeg),
            Ok(ImageFormat::Png) => Ok(ImageMime::Png),
            Ok(other) => Err(DecodeError::UnsupportedFormat(format!("{:?}", other))),
            Err(_) => Err(DecodeError::UnsupportedFormat("unknown".into())),
        }
    }
}

impl FromStr for ImageMime {
    type Err = DecodeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Ok(ImageMime::Jpeg),
            "image/png" => Ok(ImageMime::Png),
            other => Err(DecodeError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn decode(bytes: &[u8], mime: ImageMime) -> std::result::Result<PixelBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let image = image::load_from_memory_with_format(bytes, mime.format())
        .map_err(DecodeError::Corrupt)?;

    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::ZeroDimensions);
    }

    Ok(image.to_rgba8())
}

/// A submitted image: decoded pixels plus the original encoded payload.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: PixelBuffer,
    bytes: Vec<u8>,
    mime: ImageMime,
}

impl SourceImage {
    /// Enforces the size ceiling before any decoding work.
    pub fn from_bytes(bytes: Vec<u8>, mime: ImageMime, max_bytes: usize) -> Result<Self> {
        if bytes.len() > max_bytes {
            return Err(AnalysisError::FileTooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }

        let pixels = decode(&bytes, mime)?;
        log::debug!(
            "Decoded {} image: {}x{} ({} bytes)",
            mime,
            pixels.width(),
            pixels.height(),
            bytes.len()
        );

        Ok(Self { pixels, bytes, mime })
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> ImageMime {
        self.mime
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}
