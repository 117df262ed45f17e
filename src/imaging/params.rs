//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides target dimensions and encoding) and the
//! [`backend`](super::backend) (which does the actual pixel work). This
//! separation allows swapping codecs (e.g. for testing with a mock) without
//! changing operation logic.
//!
//! ## Types
//!
//! - [`Ratio`] — Fraction of the original byte budget a round aims for (0.05–1.0). Clamped on construction.
//! - [`Quality`] — Lossy encoding quality (0.10–0.95). Clamped on construction.
//! - [`Encoding`] — Lossy-with-quality or lossless, decided by the source format.
//! - [`ResizeParams`] — Full specification for one re-encode: source bytes, format, target dimensions, encoding.

use crate::types::ImageFormat;
use serde::Serialize;
use std::sync::Arc;

/// Smallest ratio any round may use.
pub const MIN_RATIO: f64 = 0.05;
/// Largest ratio any round may use.
pub const MAX_RATIO: f64 = 1.0;

/// Fraction of the original byte budget targeted for a round.
///
/// Drives both the resize scale (`sqrt(ratio)`) and lossy quality
/// (`ratio * 1.2`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Ratio(f64);

impl Ratio {
    /// Clamp `value` into `[MIN_RATIO, MAX_RATIO]`. NaN maps to the minimum.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(MIN_RATIO);
        }
        Self(value.clamp(MIN_RATIO, MAX_RATIO))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Multiply by `factor`, staying in bounds.
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.0 * factor)
    }
}

/// Lossy encoding quality in `[0.10, 0.95]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quality(f32);

impl Quality {
    pub const MIN: f32 = 0.10;
    pub const MAX: f32 = 0.95;

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(Self::MIN);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    /// Quality used for a round: `clamp(ratio * 1.2, 0.10, 0.95)`.
    pub fn for_ratio(ratio: Ratio) -> Self {
        Self::new((ratio.value() * 1.2) as f32)
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Quality on the JPEG encoder's 1–100 scale.
    pub fn jpeg_quality(self) -> u8 {
        (self.0 * 100.0).round() as u8
    }
}

/// How the resized pixels are written back out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoding {
    /// JPEG at the given quality.
    Lossy(Quality),
    /// PNG; no quality parameter applies.
    Lossless,
}

impl Encoding {
    /// Pick the encoding for an image of `format` at `ratio`.
    pub fn for_format(format: ImageFormat, ratio: Ratio) -> Self {
        if format.is_lossless_only() {
            Self::Lossless
        } else {
            Self::Lossy(Quality::for_ratio(ratio))
        }
    }
}

/// Parameters for a decode → resize → encode operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: Arc<[u8]>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub encoding: Encoding,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LosslessKind, LossyKind};

    #[test]
    fn ratio_clamps_to_valid_range() {
        assert_eq!(Ratio::new(0.0).value(), MIN_RATIO);
        assert_eq!(Ratio::new(-3.0).value(), MIN_RATIO);
        assert_eq!(Ratio::new(0.5).value(), 0.5);
        assert_eq!(Ratio::new(4.2).value(), MAX_RATIO);
        assert_eq!(Ratio::new(f64::NAN).value(), MIN_RATIO);
    }

    #[test]
    fn ratio_scaled_stays_in_bounds() {
        assert_eq!(Ratio::new(0.06).scaled(0.5).value(), MIN_RATIO);
        assert_eq!(Ratio::new(0.95).scaled(1.1).value(), MAX_RATIO);
        assert!((Ratio::new(0.5).scaled(0.8).value() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn quality_follows_ratio() {
        assert!((Quality::for_ratio(Ratio::new(0.5)).value() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn quality_clamps_at_both_ends() {
        assert_eq!(Quality::for_ratio(Ratio::new(0.05)).value(), Quality::MIN);
        assert_eq!(Quality::for_ratio(Ratio::new(1.0)).value(), Quality::MAX);
    }

    #[test]
    fn jpeg_quality_scale() {
        assert_eq!(Quality::new(0.10).jpeg_quality(), 10);
        assert_eq!(Quality::new(0.95).jpeg_quality(), 95);
        assert_eq!(Quality::new(0.6).jpeg_quality(), 60);
    }

    #[test]
    fn png_is_always_lossless() {
        let png = ImageFormat::LosslessOnly(LosslessKind::Png);
        assert_eq!(Encoding::for_format(png, Ratio::new(0.1)), Encoding::Lossless);
        assert_eq!(Encoding::for_format(png, Ratio::new(0.9)), Encoding::Lossless);
    }

    #[test]
    fn jpeg_gets_quality() {
        let jpeg = ImageFormat::Lossy(LossyKind::Jpeg);
        assert!(matches!(
            Encoding::for_format(jpeg, Ratio::new(0.5)),
            Encoding::Lossy(q) if (q.value() - 0.6).abs() < 1e-6
        ));
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ratio_always_within_bounds(v in proptest::num::f64::ANY) {
                let r = Ratio::new(v).value();
                prop_assert!((MIN_RATIO..=MAX_RATIO).contains(&r));
            }

            #[test]
            fn quality_within_bounds_for_every_ratio(v in 0.05f64..=1.0) {
                let q = Quality::for_ratio(Ratio::new(v)).value();
                prop_assert!((Quality::MIN..=Quality::MAX).contains(&q));
            }
        }
    }
}
