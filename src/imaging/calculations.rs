//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{MIN_RATIO, Ratio};

/// Smallest width or height a transformed image may have.
pub const MIN_DIMENSION: u32 = 50;
/// Largest width or height a transformed image may have.
pub const MAX_DIMENSION: u32 = 2048;

/// Linear scale applied to each axis: `sqrt(max(ratio, 0.05))`.
///
/// Pixel count scales with the square of this, so the area shrinks roughly in
/// proportion to the ratio.
pub fn scale_factor(ratio: Ratio) -> f64 {
    ratio.value().max(MIN_RATIO).sqrt()
}

/// Calculate the output dimensions for an image at a given ratio.
///
/// Each axis is scaled by [`scale_factor`], floored, and raised to at least
/// [`MIN_DIMENSION`]. If either axis then exceeds [`MAX_DIMENSION`], the
/// longer axis is pinned to the maximum and the other is derived from the
/// original aspect ratio (floored, and still at least [`MIN_DIMENSION`]).
///
/// # Examples
/// ```
/// # use fitzip::imaging::{Ratio, calculate_target_dimensions};
/// // ratio 0.25 halves both axes
/// assert_eq!(calculate_target_dimensions((800, 600), Ratio::new(0.25)), (400, 300));
///
/// // oversized originals are capped at 2048 on the longer edge
/// assert_eq!(calculate_target_dimensions((4000, 3000), Ratio::new(1.0)), (2048, 1536));
/// ```
pub fn calculate_target_dimensions(original: (u32, u32), ratio: Ratio) -> (u32, u32) {
    let (orig_w, orig_h) = (original.0.max(1), original.1.max(1));
    let scale = scale_factor(ratio);

    let width = ((orig_w as f64 * scale).floor() as u32).max(MIN_DIMENSION);
    let height = ((orig_h as f64 * scale).floor() as u32).max(MIN_DIMENSION);

    if width <= MAX_DIMENSION && height <= MAX_DIMENSION {
        return (width, height);
    }

    let aspect = orig_w as f64 / orig_h as f64;
    if orig_w >= orig_h {
        // Landscape or square: width is the long edge
        let h = ((MAX_DIMENSION as f64 / aspect).floor() as u32).max(MIN_DIMENSION);
        (MAX_DIMENSION, h)
    } else {
        // Portrait: height is the long edge
        let w = ((MAX_DIMENSION as f64 * aspect).floor() as u32).max(MIN_DIMENSION);
        (w, MAX_DIMENSION)
    }
}
