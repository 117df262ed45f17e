//! Image codec trait and shared types.
//!
//! The [`ImageCodec`] trait defines the two operations the transform engine
//! needs: identify (read dimensions) and resize (decode → resize → encode).
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec) — pure Rust, built on the
//! `image` crate. Tests swap in a mock that records operations.

use super::params::ResizeParams;
use crate::types::ImageFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image codecs.
///
/// Implementations must be `Send + Sync`: the transform engine runs each
/// operation on a worker thread so it can be raced against a timeout.
pub trait ImageCodec: Send + Sync {
    /// Read an encoded image's dimensions.
    fn identify(&self, bytes: &[u8], format: ImageFormat) -> Result<Dimensions, BackendError>;

    /// Decode, resize to the exact target dimensions, and re-encode.
    fn resize(&self, params: &ResizeParams) -> Result<Vec<u8>, BackendError>;
}
