//! Pure Rust codec built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only, no full decode) |
//! | Decode (JPEG, PNG, GIF, BMP, WebP) | `image::ImageReader::decode` under [`decode_limits`] |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode lossy | `image::codecs::jpeg::JpegEncoder` (quality 10–95) |
//! | Encode lossless | `image::codecs::png::PngEncoder` (best compression, adaptive filter) |

use super::backend::{BackendError, Dimensions, ImageCodec};
use super::params::{Encoding, ResizeParams};
use crate::types::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Limits};
use std::io::Cursor;

/// Pure Rust codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Longest side accepted when decoding.
pub const MAX_DECODE_DIMENSION: u32 = 16_384;

/// Largest allocation a single decode may make.
pub const MAX_DECODE_ALLOC: u64 = 512 * 1024 * 1024;

/// Bounds applied to every decode.
pub fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_DIMENSION);
    limits.max_image_height = Some(MAX_DECODE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

/// Decode an in-memory image of the declared format.
fn load_image(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, BackendError> {
    let mut reader = ImageReader::with_format(Cursor::new(bytes), format.decoder_format());
    reader.limits(decode_limits());
    reader
        .decode()
        .map_err(|e| BackendError::Decode(format!("{} decode failed: {}", format.label(), e)))
}

/// Encode as baseline JPEG. Alpha is dropped; JPEG has no alpha channel.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, BackendError> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {}", e)))?;
    Ok(buffer.into_inner())
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder =
        PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, PngFilterType::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(format!("PNG encode failed: {}", e)))?;
    Ok(buffer.into_inner())
}

impl ImageCodec for RustCodec {
    fn identify(&self, bytes: &[u8], format: ImageFormat) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::with_format(Cursor::new(bytes), format.decoder_format())
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {}", e)))?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(&params.source, params.format)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        match params.encoding {
            Encoding::Lossy(quality) => encode_jpeg(&resized, quality.jpeg_quality()),
            Encoding::Lossless => encode_png(&resized),
        }
    }
}
