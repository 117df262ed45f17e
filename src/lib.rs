//! # fitzip
//!
//! Packs a set of photos into a ZIP archive under a target size. Rather than
//! guessing one set of encoder settings, fitzip searches: every round
//! re-encodes all images at a single *ratio*, packages them, measures the
//! archive, and steers the ratio from that measurement.
//!
//! # Architecture: One Loop, Three Collaborators
//!
//! ```text
//! scan         .zip / dir  →  ImageRecord[]          (read once, immutable)
//! search       ratio       →  TransformedImage[]     (imaging, every round)
//!                          →  archive bytes, size    (archive, trial level)
//! compress     best round  →  archive bytes + stats  (archive, final level)
//! ```
//!
//! The transform engine and the archive evaluator are pure functions of
//! (images, parameters). All cross-round state lives in one
//! [`search::SearchState`] value owned by the loop.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Reads images out of a ZIP or directory, skipping system artifacts |
//! | [`types`] | `ImageRecord`, `ImageFormat`, `TransformedImage` |
//! | [`imaging`] | Ratio → dimensions and quality; decode/resize/encode with timeout and fallback |
//! | [`archive`] | `Packager` trait and the deterministic ZIP writer |
//! | [`search`] | The size-targeting loop: two-tier ratio control, candidate tracking, fallback |
//! | [`compress`] | Public entry point, final re-package, `CompressionStats` |
//! | [`progress`] | Progress events and their percent schedule |
//! | [`config`] | Layered `fitzip.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Ratio Drives Everything
//!
//! A ratio `r` in `[0.05, 1.0]` is the fraction of the original byte budget
//! each image should get. Pixel area scales with `r` (each axis by `√r`,
//! clamped to `[50, 2048]`) and JPEG quality with `1.2·r` (clamped to
//! `[0.10, 0.95]`). PNGs are only resized. A single scalar keeps the search
//! one-dimensional, so plain multiplicative steps converge in a few rounds.
//!
//! ## Never Fail an Image
//!
//! Decoding, resizing and encoding run on a worker thread raced against a
//! timeout. Any failure, or a timeout, stores the original bytes for that
//! round. A corrupt photo costs its own size, never the run.
//!
//! ## Always Return Something
//!
//! The loop keeps the smallest feasible round as its best candidate and the
//! last packaged round as a fallback. Only a run in which packaging failed
//! every round is an error.
//!
//! ## Pure-Rust Stack
//!
//! Images go through the `image` crate (Lanczos3 resampling, JPEG and PNG
//! encoders) and archives through `zip` with deflate. No system libraries.

pub mod archive;
pub mod compress;
pub mod config;
pub mod imaging;
pub mod output;
pub mod progress;
pub mod scan;
pub mod search;
pub mod types;

pub use compress::{CompressError, CompressOptions, Compressed, CompressionStats, compress};

#[cfg(test)]
pub(crate) mod test_helpers;
