//! Byte stream input/output and image decoding
//!
//! Keeps stream handling separate from the processing pipeline so the
//! pipeline can be driven from stdin/stdout, files or in-memory buffers.

use crate::error::{BgRemovalError, Result};
use image::{
    metadata::Orientation, DynamicImage, ImageDecoder, ImageFormat, ImageReader,
};
use std::io::{Cursor, Read, Write};
use tracing::debug;

/// Service for reading input bytes, decoding them and writing output bytes
pub struct ImageIOService;

impl ImageIOService {
    /// Read the entire input stream into memory
    ///
    /// # Errors
    /// - Reading the stream failed
    /// - The stream was empty
    pub fn read_input<R: Read>(mut reader: R) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;

        if buffer.is_empty() {
            return Err(BgRemovalError::EmptyInput);
        }

        debug!(bytes = buffer.len(), "Read input stream");
        Ok(buffer)
    }

    /// Decode image bytes, detecting the format from content
    ///
    /// EXIF orientation is applied so the returned image is upright.
    ///
    /// # Errors
    /// - Empty input
    /// - Unrecognized format
    /// - Corrupt or truncated image data
    pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(BgRemovalError::EmptyInput);
        }

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| BgRemovalError::decode(format!("Failed to read image header: {e}")))?;

        let format = reader.format().ok_or_else(|| {
            BgRemovalError::decode(format!(
                "Unrecognized image format ({} bytes, starts with {})",
                bytes.len(),
                hex_prefix(bytes)
            ))
        })?;

        let mut decoder = reader
            .into_decoder()
            .map_err(|e| BgRemovalError::decode(format!("{format:?}: {e}")))?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

        let mut image = DynamicImage::from_decoder(decoder)
            .map_err(|e| BgRemovalError::decode(format!("{format:?}: {e}")))?;
        image.apply_orientation(orientation);

        debug!(
            format = ?format,
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            orientation = ?orientation,
            "Decoded input image"
        );
        Ok(image)
    }

    /// Write all bytes to the output stream and flush it
    ///
    /// # Errors
    /// - Writing or flushing failed (e.g. closed pipe)
    pub fn write_output<W: Write>(mut writer: W, bytes: &[u8]) -> Result<usize> {
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(bytes.len())
    }

    /// Detect the image format from magic bytes
    #[must_use]
    pub fn detect_image_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
