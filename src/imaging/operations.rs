//! High-level image operations.
//!
//! [`TransformEngine`] combines the dimension calculations with codec
//! execution. It is a total function over images: a decode or encode failure,
//! or a codec that overruns the per-image time budget, yields the original
//! bytes instead of an error.
//!
//! ## Timeout race
//!
//! Each transform runs on its own worker thread and the engine waits on a
//! channel with `recv_timeout`. If the timer wins, the receiver is dropped:
//! the worker finishes on its own, its `send` fails, and the late result is
//! freed inside the worker. Nothing it produces can reach a round that has
//! already moved on.
//!
//! An image that timed out once is not retried: later rounds pass its
//! original bytes through without spawning another worker, so at most one
//! orphaned worker exists per image for the life of the engine.

use super::backend::{BackendError, Dimensions, ImageCodec};
use super::calculations::calculate_target_dimensions;
use super::params::{Encoding, Ratio, ResizeParams};
use crate::types::{FallbackReason, ImageRecord, TransformOutcome, TransformedImage};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Default per-image budget for decode + resize + encode.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Plan the re-encode of an image with known dimensions at `ratio`.
///
/// Pure, so parameter generation can be tested without decoding.
pub fn plan_resize(image: &ImageRecord, original: Dimensions, ratio: Ratio) -> ResizeParams {
    let (width, height) = calculate_target_dimensions((original.width, original.height), ratio);
    ResizeParams {
        source: Arc::clone(image.raw_bytes()),
        format: image.format(),
        width,
        height,
        encoding: Encoding::for_format(image.format(), ratio),
    }
}

/// Identify, plan and re-encode one image. Runs on the worker thread.
fn run_codec(
    codec: &dyn ImageCodec,
    image: &ImageRecord,
    ratio: Ratio,
) -> Result<(Vec<u8>, Dimensions), BackendError> {
    let original = codec.identify(image.raw_bytes(), image.format())?;
    let params = plan_resize(image, original, ratio);
    let bytes = codec.resize(&params)?;
    if bytes.is_empty() {
        return Err(BackendError::Encode("encoder produced no data".to_string()));
    }
    Ok((
        bytes,
        Dimensions {
            width: params.width,
            height: params.height,
        },
    ))
}

/// Re-encodes images for a round, with per-image timeout and fallback.
///
/// Clones share the set of images that have timed out.
#[derive(Clone)]
pub struct TransformEngine {
    codec: Arc<dyn ImageCodec>,
    timeout: Duration,
    timed_out: Arc<Mutex<HashSet<String>>>,
}

impl TransformEngine {
    pub fn new(codec: Arc<dyn ImageCodec>, timeout: Duration) -> Self {
        Self {
            codec,
            timeout,
            timed_out: Arc::default(),
        }
    }

    /// Whether `name` has already overrun the time budget on this engine.
    pub fn has_timed_out(&self, name: &str) -> bool {
        self.timed_out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    fn mark_timed_out(&self, name: &str) {
        self.timed_out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Transform one image. Never fails; see the [module docs](self).
    pub fn transform(&self, index: usize, image: &ImageRecord, ratio: Ratio) -> TransformedImage {
        if self.has_timed_out(image.name()) {
            tracing::debug!(image = image.name(), "timed out earlier, keeping original");
            return TransformedImage::fallback(index, image, FallbackReason::TimedOut(self.timeout));
        }
        match self.race(image, ratio) {
            Ok((bytes, dims)) => TransformedImage {
                name: image.name().to_string(),
                encoded_bytes: bytes.into(),
                source_index: index,
                outcome: TransformOutcome::Encoded {
                    width: dims.width,
                    height: dims.height,
                },
            },
            Err(reason) => {
                tracing::warn!(image = image.name(), %reason, "using original bytes");
                TransformedImage::fallback(index, image, reason)
            }
        }
    }

    /// Transform every image at `ratio` on the rayon pool.
    ///
    /// The result is in input order and has exactly one entry per image.
    /// `on_done` is called once per image as it completes, from whichever
    /// worker finished it.
    pub fn transform_all<F>(
        &self,
        images: &[ImageRecord],
        ratio: Ratio,
        on_done: F,
    ) -> Vec<TransformedImage>
    where
        F: Fn(&TransformedImage) + Sync,
    {
        images
            .par_iter()
            .enumerate()
            .map(|(index, image)| {
                let out = self.transform(index, image, ratio);
                on_done(&out);
                out
            })
            .collect()
    }

    fn race(
        &self,
        image: &ImageRecord,
        ratio: Ratio,
    ) -> Result<(Vec<u8>, Dimensions), FallbackReason> {
        let (tx, rx) = mpsc::channel();
        let codec = Arc::clone(&self.codec);
        let owned = image.clone();

        thread::Builder::new()
            .name("fitzip-transform".to_string())
            .spawn(move || {
                let result = run_codec(codec.as_ref(), &owned, ratio);
                // Receiver is gone if we timed out; the result is dropped here
                let _ = tx.send(result);
            })
            .map_err(|e| FallbackReason::Failed(format!("failed to spawn worker: {}", e)))?;

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(done)) => Ok(done),
            Ok(Err(e)) => Err(FallbackReason::Failed(e.to_string())),
            Err(RecvTimeoutError::Timeout) => {
                self.mark_timed_out(image.name());
                Err(FallbackReason::TimedOut(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(FallbackReason::Failed("transform worker panicked".to_string()))
            }
        }
    }
}
