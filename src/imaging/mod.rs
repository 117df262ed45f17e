//! Image processing — pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Resize** | Lanczos3 via `DynamicImage::resize_exact` |
//! | **Encode lossy** | JPEG, quality from the round's ratio |
//! | **Encode lossless** | PNG, resize only |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Ratio, quality and resize descriptions
//! - **Backend**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Operations**: [`TransformEngine`], combining calculations + codec with timeout and fallback

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageCodec};
pub use calculations::{MAX_DIMENSION, MIN_DIMENSION, calculate_target_dimensions, scale_factor};
pub use operations::{DEFAULT_TIMEOUT, TransformEngine, plan_resize};
pub use params::{Encoding, MAX_RATIO, MIN_RATIO, Quality, Ratio, ResizeParams};
pub use rust_backend::RustCodec;
