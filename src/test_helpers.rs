//! Shared test utilities for the fitzip test suite.
//!
//! Builds small synthetic images and archives in memory so unit tests never
//! depend on fixture files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let archive = zip_of(&[
//!     ("album/dawn.jpg", &jpeg_bytes(320, 240)),
//!     ("album/logo.png", &png_bytes(64, 64)),
//! ]);
//! let result = scan_zip_bytes(&archive).unwrap();
//! assert_eq!(names(&result.images), ["album/dawn.jpg", "album/logo.png"]);
//! ```

use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::types::ImageRecord;

// =========================================================================
// Synthetic images
// =========================================================================

/// Smooth RGB gradient encoded as JPEG (quality 90).
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    encode_jpeg(&img, 90)
}

/// Pseudo-random noise encoded as JPEG (quality 95).
///
/// Noise compresses poorly, so output size tracks quality and dimensions
/// closely. Deterministic for a given size.
pub fn noisy_jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x2545_F491;
    let img = RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            // xorshift32
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        };
        Rgb([next(), next(), next()])
    });
    encode_jpeg(&img, 95)
}

/// RGBA gradient with a transparent corner, encoded as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let alpha = if x < width / 4 && y < height / 4 { 0 } else { 255 };
        Rgba([
            (x * 255 / width.max(1)) as u8,
            64,
            (y * 255 / height.max(1)) as u8,
            alpha,
        ])
    });
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    out
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(img)
        .unwrap();
    out
}

// =========================================================================
// Archives
// =========================================================================

/// Build a ZIP in memory from `(name, bytes)` entries, in order.
///
/// Names ending in `/` become directory entries.
pub fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let options = SimpleFileOptions::default();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

// =========================================================================
// Lookups
// =========================================================================

/// Entry names of a set of records, in order.
pub fn names(images: &[ImageRecord]) -> Vec<&str> {
    images.iter().map(ImageRecord::name).collect()
}

/// Find a record by name. Panics if not found.
pub fn find_record<'a>(images: &'a [ImageRecord], name: &str) -> &'a ImageRecord {
    images.iter().find(|i| i.name() == name).unwrap_or_else(|| {
        panic!("image '{name}' not found. Available: {:?}", names(images))
    })
}
