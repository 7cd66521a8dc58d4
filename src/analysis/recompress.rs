use std::io::Cursor;

use image::{ImageFormat, codecs::jpeg::JpegEncoder};

use crate::{error::CodecError, image_utils::flatten_on_black, raster::PixelBuffer};

/// Round-trips a raster through the JPEG codec.
pub struct RecompressionCodec;

impl RecompressionCodec {
    /// `quality` is on a 0-1 scale and must lie in (0, 1].
    pub fn recompress(buffer: &PixelBuffer, quality: f32) -> Result<PixelBuffer, CodecError> {
        let jpeg_quality = Self::jpeg_quality(quality)?;
        let (width, height) = buffer.dimensions();

        let rgb = flatten_on_black(buffer);
        let mut encoded = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut encoded, jpeg_quality);
        rgb.write_with_encoder(encoder).map_err(CodecError::Encode)?;

        let bytes = encoded.into_inner();
        log::debug!(
            "Recompressed {}x{} at quality {} ({} bytes)",
            width,
            height,
            jpeg_quality,
            bytes.len()
        );

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
            .map_err(CodecError::Decode)?
            .to_rgba8();

        if decoded.dimensions() != (width, height) {
            return Err(CodecError::DimensionMismatch {
                expected: (width, height),
                actual: decoded.dimensions(),
            });
        }

        Ok(decoded)
    }

    /// Maps the 0-1 quality to the encoder's 1-100 scale.
    pub fn jpeg_quality(quality: f32) -> Result<u8, CodecError> {
        if !(quality > 0.0 && quality <= 1.0) {
            return Err(CodecError::InvalidQuality(quality));
        }

        Ok((quality * 100.0).round().clamp(1.0, 100.0) as u8)
    }
}
