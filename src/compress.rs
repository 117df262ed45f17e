//! Compression entry point and result selection.
//!
//! [`compress`] wires the production collaborators ([`RustCodec`],
//! [`ZipPackager`]) into the search loop; [`compress_with`] takes them as
//! parameters so tests can inject mocks. After the loop settles on a round,
//! that round is packaged once more at [`PackLevel::Final`] and the run's
//! [`CompressionStats`] are computed.

use crate::archive::{PackLevel, Packager, PackagingError, ZipPackager};
use crate::config::FitzipConfig;
use crate::imaging::{DEFAULT_TIMEOUT, ImageCodec, RustCodec, TransformEngine};
use crate::progress::{Progress, ProgressEvent};
use crate::search::{RoundOutcome, RoundRecord, SearchError, SearchOptions, run_search};
use crate::types::{ImageRecord, total_original_size};
use serde::Serialize;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("No image files found")]
    NoImages,
    #[error("Target size must be greater than zero")]
    InvalidTarget,
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("Final packaging failed: {0}")]
    Packaging(#[from] PackagingError),
}

/// Tuning for one run. Defaults match the stock config.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressOptions {
    pub max_rounds: u32,
    pub overhead_fraction: f64,
    /// Per-image transform budget.
    pub timeout: Duration,
    /// Whole-run budget, checked between rounds.
    pub run_timeout: Option<Duration>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        let search = SearchOptions::default();
        Self {
            max_rounds: search.max_rounds,
            overhead_fraction: search.overhead_fraction,
            timeout: DEFAULT_TIMEOUT,
            run_timeout: search.run_timeout,
        }
    }
}

impl CompressOptions {
    pub fn from_config(config: &FitzipConfig) -> Self {
        Self {
            max_rounds: config.target.max_rounds,
            overhead_fraction: config.target.overhead_fraction,
            timeout: config.transform.timeout(),
            run_timeout: config.processing.run_timeout(),
        }
    }

    pub fn validate(&self) -> Result<(), CompressError> {
        if self.max_rounds == 0 {
            return Err(CompressError::InvalidOptions(
                "max_rounds must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.overhead_fraction) {
            return Err(CompressError::InvalidOptions(
                "overhead_fraction must be in [0, 1)".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(CompressError::InvalidOptions(
                "timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    fn search_options(&self) -> SearchOptions {
        SearchOptions {
            max_rounds: self.max_rounds,
            overhead_fraction: self.overhead_fraction,
            run_timeout: self.run_timeout,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionStats {
    pub image_count: usize,
    pub target_size: u64,
    pub original_total: u64,
    pub final_size: u64,
    /// `original_total - final_size`; negative when the archive grew.
    pub space_saved: i64,
    pub savings_percent: f64,
    pub rounds: usize,
    pub selected_round: u32,
    pub selected_ratio: f64,
    /// The selected round landed in the acceptance band (or could not grow
    /// any further).
    pub converged: bool,
    pub fallback_images: usize,
    pub history: Vec<RoundRecord>,
}

impl CompressionStats {
    fn new(
        images: &[ImageRecord],
        target_size: u64,
        selected: &RoundOutcome,
        final_size: u64,
        converged: bool,
        history: Vec<RoundRecord>,
    ) -> Self {
        let original_total = total_original_size(images);
        let space_saved = original_total as i64 - final_size as i64;
        let savings_percent = if original_total == 0 {
            0.0
        } else {
            space_saved as f64 / original_total as f64 * 100.0
        };
        Self {
            image_count: images.len(),
            target_size,
            original_total,
            final_size,
            space_saved,
            savings_percent,
            rounds: history.len(),
            selected_round: selected.round,
            selected_ratio: selected.ratio.value(),
            converged,
            fallback_images: selected.fallback_count(),
            history,
        }
    }

    pub fn within_target(&self) -> bool {
        self.final_size <= self.target_size
    }
}

/// The delivered archive and its stats.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub stats: CompressionStats,
}

/// Compress `images` into a ZIP of at most `target_bytes` (best effort).
pub fn compress(
    images: &[ImageRecord],
    target_bytes: u64,
    options: &CompressOptions,
    progress: Option<Sender<ProgressEvent>>,
) -> Result<Compressed, CompressError> {
    compress_with(
        Arc::new(RustCodec::new()),
        &ZipPackager::new(),
        images,
        target_bytes,
        options,
        progress,
    )
}

/// [`compress`] with injected collaborators.
pub fn compress_with(
    codec: Arc<dyn ImageCodec>,
    packager: &dyn Packager,
    images: &[ImageRecord],
    target_bytes: u64,
    options: &CompressOptions,
    progress: Option<Sender<ProgressEvent>>,
) -> Result<Compressed, CompressError> {
    if images.is_empty() {
        return Err(CompressError::NoImages);
    }
    if target_bytes == 0 {
        return Err(CompressError::InvalidTarget);
    }
    options.validate()?;

    let progress = Progress::new(progress);
    progress.emit(ProgressEvent::Analyzing {
        image_count: images.len(),
        original_total: total_original_size(images),
    });

    let engine = TransformEngine::new(codec, options.timeout);
    let result = run_search(
        &engine,
        packager,
        images,
        target_bytes,
        &options.search_options(),
        &progress,
    )?;

    let selected = result.selected;
    progress.emit(ProgressEvent::Finalizing {
        selected_round: selected.round,
    });

    let items = selected.pack_items();
    let mut bytes = packager.package(&items, PackLevel::Final)?;
    if bytes.len() as u64 > selected.measured_size {
        // Stronger deflate is not guaranteed to win; keep the measured archive
        tracing::debug!(
            final_size = bytes.len(),
            measured_size = selected.measured_size,
            "final packaging larger than trial, keeping trial level"
        );
        bytes = packager.package(&items, PackLevel::Trial)?;
    }
    drop(items);

    let final_size = bytes.len() as u64;
    let stats = CompressionStats::new(
        images,
        target_bytes,
        &selected,
        final_size,
        result.converged,
        result.history,
    );
    tracing::info!(
        final_size,
        original_total = stats.original_total,
        selected_round = stats.selected_round,
        converged = stats.converged,
        "compression finished"
    );
    progress.emit(ProgressEvent::Complete { final_size });

    Ok(Compressed { bytes, stats })
}

/// Convert a size in megabytes (base 1024) to bytes.
pub fn megabytes_to_bytes(mb: f64) -> u64 {
    (mb * 1024.0 * 1024.0).round() as u64
}
