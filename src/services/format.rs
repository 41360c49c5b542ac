//! Output encoding service

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
};
use image::{ImageEncoder, RgbaImage};
use tracing::debug;

/// Service for encoding the RGBA result
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an RGBA image in the given format
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_invoker::{services::OutputFormatHandler, OutputFormat};
    /// use image::RgbaImage;
    ///
    /// let bytes = OutputFormatHandler::encode(&RgbaImage::new(4, 4), OutputFormat::Png)?;
    /// assert!(bytes.starts_with(b"\x89PNG"));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - Encoder failure
    /// - WebP requested without the `webp-support` feature
    pub fn encode(image: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let (width, height) = image.dimensions();

        match format {
            OutputFormat::Png => {
                image::codecs::png::PngEncoder::new(&mut buffer)
                    .write_image(image.as_raw(), width, height, image::ExtendedColorType::Rgba8)
                    .map_err(|e| BgRemovalError::encode(format!("Failed to encode PNG: {e}")))?;
            },
            OutputFormat::WebP => Self::encode_webp(image, &mut buffer)?,
        }

        debug!(format = %format, bytes = buffer.len(), "Encoded output image");
        Ok(buffer)
    }

    #[cfg(feature = "webp-support")]
    fn encode_webp(image: &RgbaImage, buffer: &mut Vec<u8>) -> Result<()> {
        let (width, height) = image.dimensions();
        image::codecs::webp::WebPEncoder::new_lossless(buffer)
            .write_image(image.as_raw(), width, height, image::ExtendedColorType::Rgba8)
            .map_err(|e| BgRemovalError::encode(format!("Failed to encode WebP: {e}")))
    }

    #[cfg(not(feature = "webp-support"))]
    fn encode_webp(_image: &RgbaImage, _buffer: &mut Vec<u8>) -> Result<()> {
        Err(BgRemovalError::unsupported_format(
            "WebP output requires the webp-support feature",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(9, 5, |x, y| Rgba([x as u8 * 20, y as u8 * 40, 100, (x * 25) as u8]))
    }

    #[test]
    fn test_png_roundtrip_keeps_alpha() {
        let bytes = OutputFormatHandler::encode(&sample(), OutputFormat::Png).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.to_rgba8(), sample());
    }

    #[cfg(feature = "webp-support")]
    #[test]
    fn test_webp_is_lossless() {
        let bytes = OutputFormatHandler::encode(&sample(), OutputFormat::WebP).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.to_rgba8(), sample());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let first = OutputFormatHandler::encode(&sample(), OutputFormat::Png).unwrap();
        let second = OutputFormatHandler::encode(&sample(), OutputFormat::Png).unwrap();
        assert_eq!(first, second);
    }
}
