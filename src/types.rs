//! Shared types threaded through every stage of a compression run.
//!
//! Images are ingested once (see [`scan`](crate::scan)) into [`ImageRecord`]s
//! and never mutated afterwards. Every round of the search loop produces a
//! fresh set of [`TransformedImage`]s from those records; a round's set is
//! frozen once assembled.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// File extensions accepted as input images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Source formats that are re-encoded lossily (as JPEG).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LossyKind {
    Jpeg,
    WebP,
    Bmp,
    Gif,
}

/// Source formats that only ever get resized, never quality-reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LosslessKind {
    Png,
}

/// Encoding family of an input image, decided once at ingestion.
///
/// | Extension | Format |
/// |---|---|
/// | `jpg`, `jpeg` | `Lossy(Jpeg)` |
/// | `webp` | `Lossy(WebP)` |
/// | `bmp` | `Lossy(Bmp)` |
/// | `gif` | `Lossy(Gif)` |
/// | `png` | `LosslessOnly(Png)` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "family", content = "kind", rename_all = "snake_case")]
pub enum ImageFormat {
    Lossy(LossyKind),
    LosslessOnly(LosslessKind),
}

impl ImageFormat {
    /// Map a file extension (without the dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Lossy(LossyKind::Jpeg)),
            "webp" => Some(Self::Lossy(LossyKind::WebP)),
            "bmp" => Some(Self::Lossy(LossyKind::Bmp)),
            "gif" => Some(Self::Lossy(LossyKind::Gif)),
            "png" => Some(Self::LosslessOnly(LosslessKind::Png)),
            _ => None,
        }
    }

    /// Map an entry name like `album/001-dawn.JPG` to a format.
    pub fn from_name(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_lossless_only(self) -> bool {
        matches!(self, Self::LosslessOnly(_))
    }

    /// Decoder hint for the `image` crate.
    pub fn decoder_format(self) -> image::ImageFormat {
        match self {
            Self::Lossy(LossyKind::Jpeg) => image::ImageFormat::Jpeg,
            Self::Lossy(LossyKind::WebP) => image::ImageFormat::WebP,
            Self::Lossy(LossyKind::Bmp) => image::ImageFormat::Bmp,
            Self::Lossy(LossyKind::Gif) => image::ImageFormat::Gif,
            Self::LosslessOnly(LosslessKind::Png) => image::ImageFormat::Png,
        }
    }

    /// Short label for CLI output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Lossy(LossyKind::Jpeg) => "jpeg",
            Self::Lossy(LossyKind::WebP) => "webp",
            Self::Lossy(LossyKind::Bmp) => "bmp",
            Self::Lossy(LossyKind::Gif) => "gif",
            Self::LosslessOnly(LosslessKind::Png) => "png",
        }
    }
}

/// One input image. Immutable after creation.
///
/// The raw bytes are reference-counted so a transform worker (and the
/// fallback path) can hold them without copying.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    name: String,
    raw_bytes: Arc<[u8]>,
    format: ImageFormat,
}

impl ImageRecord {
    pub fn new(name: impl Into<String>, raw_bytes: Vec<u8>, format: ImageFormat) -> Self {
        Self {
            name: name.into(),
            raw_bytes: raw_bytes.into(),
            format,
        }
    }

    /// Build a record, inferring the format from the name's extension.
    ///
    /// Returns `None` for names without a supported image extension.
    pub fn from_named_bytes(name: impl Into<String>, raw_bytes: Vec<u8>) -> Option<Self> {
        let name = name.into();
        let format = ImageFormat::from_name(&name)?;
        Some(Self::new(name, raw_bytes, format))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw_bytes(&self) -> &Arc<[u8]> {
        &self.raw_bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn original_size(&self) -> u64 {
        self.raw_bytes.len() as u64
    }
}

/// Sum of `original_size` over a set of images.
pub fn total_original_size(images: &[ImageRecord]) -> u64 {
    images.iter().map(ImageRecord::original_size).sum()
}

/// Why the transform engine returned an image's original bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// Decoding, resizing or encoding failed.
    Failed(String),
    /// The codec did not finish within the per-image budget.
    TimedOut(Duration),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(msg) => write!(f, "{msg}"),
            Self::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs_f64()),
        }
    }
}

/// How a [`TransformedImage`] was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Re-encoded at the given dimensions.
    Encoded { width: u32, height: u32 },
    /// Original bytes passed through.
    Fallback(FallbackReason),
}

/// Output of the transform engine for one image in one round.
#[derive(Debug, Clone)]
pub struct TransformedImage {
    pub name: String,
    pub encoded_bytes: Arc<[u8]>,
    /// Index of the [`ImageRecord`] this was produced from.
    pub source_index: usize,
    pub outcome: TransformOutcome,
}

impl TransformedImage {
    /// The original bytes of `image`, unchanged.
    pub fn fallback(source_index: usize, image: &ImageRecord, reason: FallbackReason) -> Self {
        Self {
            name: image.name().to_string(),
            encoded_bytes: Arc::clone(image.raw_bytes()),
            source_index,
            outcome: TransformOutcome::Fallback(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, TransformOutcome::Fallback(_))
    }

    pub fn size(&self) -> u64 {
        self.encoded_bytes.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(
            ImageFormat::from_extension("JPG"),
            Some(ImageFormat::Lossy(LossyKind::Jpeg))
        );
        assert_eq!(
            ImageFormat::from_extension("Png"),
            Some(ImageFormat::LosslessOnly(LosslessKind::Png))
        );
        assert_eq!(ImageFormat::from_extension("tiff"), None);
    }

    #[test]
    fn every_accepted_extension_maps_to_a_format() {
        for ext in IMAGE_EXTENSIONS {
            assert!(ImageFormat::from_extension(ext).is_some(), "{ext}");
        }
    }

    #[test]
    fn format_from_nested_name() {
        assert_eq!(
            ImageFormat::from_name("trip/day-1/beach.webp"),
            Some(ImageFormat::Lossy(LossyKind::WebP))
        );
        assert_eq!(ImageFormat::from_name("notes.txt"), None);
        assert_eq!(ImageFormat::from_name("no-extension"), None);
    }

    #[test]
    fn only_png_is_lossless_only() {
        assert!(ImageFormat::from_extension("png").unwrap().is_lossless_only());
        for ext in ["jpg", "jpeg", "gif", "bmp", "webp"] {
            assert!(!ImageFormat::from_extension(ext).unwrap().is_lossless_only());
        }
    }

    #[test]
    fn record_reports_original_size() {
        let record = ImageRecord::from_named_bytes("a.jpg", vec![0u8; 1234]).unwrap();
        assert_eq!(record.original_size(), 1234);
        assert_eq!(record.name(), "a.jpg");
    }

    #[test]
    fn record_rejects_unknown_extension() {
        assert!(ImageRecord::from_named_bytes("readme.md", vec![1, 2, 3]).is_none());
    }

    #[test]
    fn total_size_sums_records() {
        let images = vec![
            ImageRecord::from_named_bytes("a.jpg", vec![0u8; 10]).unwrap(),
            ImageRecord::from_named_bytes("b.png", vec![0u8; 32]).unwrap(),
        ];
        assert_eq!(total_original_size(&images), 42);
    }

    #[test]
    fn fallback_shares_original_bytes() {
        let record = ImageRecord::from_named_bytes("a.jpg", vec![7u8; 16]).unwrap();
        let out = TransformedImage::fallback(3, &record, FallbackReason::Failed("bad".into()));
        assert!(out.is_fallback());
        assert_eq!(out.source_index, 3);
        assert!(Arc::ptr_eq(&out.encoded_bytes, record.raw_bytes()));
    }

    #[test]
    fn fallback_reason_display() {
        let reason = FallbackReason::TimedOut(Duration::from_secs(10));
        assert_eq!(reason.to_string(), "timed out after 10s");
    }
}
