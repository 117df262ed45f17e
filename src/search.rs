//! Size-targeting search loop.
//!
//! Repeatedly transforms every image at a ratio, packages the result at the
//! trial level, and steers the ratio from the measured archive size until the
//! size lands in the acceptance band `[0.8 × target, target]` or the round
//! budget runs out.
//!
//! ## Two-tier control
//!
//! ```text
//! running_ratio   persistent trend, updated after every packaged round
//!                   over target  → × 0.80
//!                   otherwise    → × 1.05
//! effective ratio running_ratio with a one-round reactive nudge
//!                   prev > target        → × 0.85
//!                   prev < 0.8 × target  → × 1.10
//! ```
//!
//! Both are clamped to `[0.05, 1.0]` by [`Ratio`]. The reactive nudge never
//! feeds back into `running_ratio`.
//!
//! ## Selection
//!
//! A round whose size is at most the target is a *feasible candidate*; the
//! smallest one seen is kept as the best. An in-band round wins immediately.
//! Otherwise the run ends on the last round (or when the run deadline passes)
//! and returns the best candidate, falling back to the most recently packaged
//! round when nothing was feasible.
//!
//! A round that fails to package is abandoned without touching the running
//! state. Only a run where no round ever packaged is an error.

use crate::archive::{PackItem, PackLevel, Packager, PackagingError};
use crate::imaging::{MAX_RATIO, MIN_RATIO, Ratio, TransformEngine};
use crate::progress::{Progress, ProgressEvent};
use crate::types::{ImageRecord, TransformedImage, total_original_size};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Lower edge of the acceptance band, as a fraction of the target.
pub const ACCEPT_BAND_LOW: f64 = 0.8;

const REACTIVE_TIGHTEN: f64 = 0.85;
const REACTIVE_RELAX: f64 = 1.10;
const TREND_TIGHTEN: f64 = 0.8;
const TREND_RELAX: f64 = 1.05;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("No feasible archive produced: packaging failed in all {rounds} rounds")]
    NoFeasibleArchive {
        rounds: u32,
        #[source]
        last_error: Option<PackagingError>,
    },
}

/// Knobs for one search run.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub max_rounds: u32,
    /// Estimated share of the archive taken by container structure.
    pub overhead_fraction: f64,
    /// Stop starting new rounds once this much time has passed.
    pub run_timeout: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            overhead_fraction: 0.15,
            run_timeout: None,
        }
    }
}

/// How a round's measured size was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Inside `[0.8 × target, target]`.
    Accepted,
    /// Feasible, but below the band with the ratio already at its maximum.
    Saturated,
    /// Feasible, below the band.
    UnderTarget,
    /// Larger than the target.
    OverTarget,
    /// Over the target with the ratio already at its minimum.
    Floored,
    /// The archive writer failed; the round was abandoned.
    PackagingFailed,
}

impl Verdict {
    /// Judge a packaged size. Saturation and flooring depend on the ratio
    /// used, see [`Verdict::at_ratio`].
    pub fn classify(measured_size: u64, target: u64) -> Self {
        if !is_feasible(measured_size, target) {
            Self::OverTarget
        } else if in_acceptance_band(measured_size, target) {
            Self::Accepted
        } else {
            Self::UnderTarget
        }
    }

    /// Judge a packaged size, taking into account that a ratio pinned at a
    /// bound produces the same output every later round.
    pub fn at_ratio(measured_size: u64, target: u64, ratio: Ratio) -> Self {
        match Self::classify(measured_size, target) {
            Self::UnderTarget if ratio.value() >= MAX_RATIO => Self::Saturated,
            Self::OverTarget if ratio.value() <= MIN_RATIO => Self::Floored,
            other => other,
        }
    }

    /// The run stops on this round and returns it (or the best candidate).
    fn ends_search(self) -> bool {
        matches!(self, Self::Accepted | Self::Saturated | Self::Floored)
    }
}

/// Diagnostics for one executed round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub round: u32,
    pub ratio: f64,
    pub measured_size: Option<u64>,
    pub verdict: Verdict,
    pub fallback_images: usize,
}

/// The transformed image set of one packaged round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub round: u32,
    pub ratio: Ratio,
    pub images: Vec<TransformedImage>,
    pub measured_size: u64,
}

impl RoundOutcome {
    pub fn pack_items(&self) -> Vec<PackItem<'_>> {
        pack_items(&self.images)
    }

    pub fn fallback_count(&self) -> usize {
        self.images.iter().filter(|t| t.is_fallback()).count()
    }
}

fn pack_items(images: &[TransformedImage]) -> Vec<PackItem<'_>> {
    images
        .iter()
        .map(|t| PackItem {
            name: &t.name,
            bytes: &t.encoded_bytes,
        })
        .collect()
}

pub fn is_feasible(measured_size: u64, target: u64) -> bool {
    measured_size <= target
}

pub fn in_acceptance_band(measured_size: u64, target: u64) -> bool {
    is_feasible(measured_size, target) && measured_size as f64 >= target as f64 * ACCEPT_BAND_LOW
}

/// Starting ratio: payload budget over the original total.
///
/// `payload = target × (1 − overhead_fraction)`. An empty input starts at the
/// maximum ratio.
pub fn initial_ratio(original_total: u64, target: u64, overhead_fraction: f64) -> Ratio {
    if original_total == 0 {
        return Ratio::new(MAX_RATIO);
    }
    let payload = target as f64 * (1.0 - overhead_fraction);
    Ratio::new(payload / original_total as f64)
}

/// One-round nudge from the previous round's size.
pub fn reactive_factor(prev_size: Option<u64>, target: u64) -> f64 {
    match prev_size {
        Some(size) if size > target => REACTIVE_TIGHTEN,
        Some(size) if (size as f64) < target as f64 * ACCEPT_BAND_LOW => REACTIVE_RELAX,
        _ => 1.0,
    }
}

/// Persistent trend update after a packaged round.
pub fn trend_factor(measured_size: u64, target: u64) -> f64 {
    if measured_size > target {
        TREND_TIGHTEN
    } else {
        TREND_RELAX
    }
}

/// Cross-round state, owned by the loop.
#[derive(Debug)]
pub struct SearchState {
    pub round: u32,
    pub running_ratio: Ratio,
    /// Size of the most recent round that packaged.
    pub prev_size: Option<u64>,
    pub best: Option<RoundOutcome>,
    /// Most recent packaged round that did not become the best.
    pub last: Option<RoundOutcome>,
    pub history: Vec<RoundRecord>,
}

impl SearchState {
    pub fn new(running_ratio: Ratio) -> Self {
        Self {
            round: 0,
            running_ratio,
            prev_size: None,
            best: None,
            last: None,
            history: Vec::new(),
        }
    }

    pub fn best_size(&self) -> Option<u64> {
        self.best.as_ref().map(|b| b.measured_size)
    }

    /// Ratio to use for the current round.
    pub fn effective_ratio(&self, target: u64) -> Ratio {
        if self.round == 0 {
            self.running_ratio
        } else {
            self.running_ratio
                .scaled(reactive_factor(self.prev_size, target))
        }
    }

    /// Keep a packaged round, as the new best if it is a smaller feasible
    /// candidate.
    fn remember(&mut self, outcome: RoundOutcome, target: u64) {
        let improves = is_feasible(outcome.measured_size, target)
            && self
                .best_size()
                .is_none_or(|best| outcome.measured_size < best);
        if improves {
            self.best = Some(outcome);
            self.last = None;
        } else {
            self.last = Some(outcome);
        }
    }

    /// Best candidate, else the most recent packaged round.
    fn take_fallback(&mut self) -> Option<RoundOutcome> {
        self.best.take().or_else(|| self.last.take())
    }
}

/// What the loop settled on.
#[derive(Debug)]
pub struct SearchResult {
    pub selected: RoundOutcome,
    /// The selected round ended the search on its own merits (in band or
    /// saturated) rather than by running out of rounds or time.
    pub converged: bool,
    pub history: Vec<RoundRecord>,
}

/// Run the search loop over `images` for an archive of at most `target` bytes.
pub fn run_search(
    engine: &TransformEngine,
    packager: &dyn Packager,
    images: &[ImageRecord],
    target: u64,
    options: &SearchOptions,
    progress: &Progress,
) -> Result<SearchResult, SearchError> {
    let original_total = total_original_size(images);
    let mut state = SearchState::new(initial_ratio(
        original_total,
        target,
        options.overhead_fraction,
    ));
    let max_rounds = options.max_rounds;
    let started = Instant::now();
    let mut last_error = None;

    tracing::info!(
        original_total,
        target,
        initial_ratio = state.running_ratio.value(),
        "starting size search"
    );

    while state.round < max_rounds {
        let round = state.round;
        let is_last = round + 1 == max_rounds;

        if round > 0 && options.run_timeout.is_some_and(|limit| started.elapsed() >= limit) {
            tracing::warn!(round, "run deadline reached, stopping early");
            break;
        }

        let ratio = state.effective_ratio(target);
        progress.emit(ProgressEvent::RoundStarted {
            round,
            max_rounds,
            ratio: ratio.value(),
        });

        let completed = AtomicUsize::new(0);
        let transformed = engine.transform_all(images, ratio, |t| {
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            progress.emit(ProgressEvent::ImageTransformed {
                round,
                max_rounds,
                name: t.name.clone(),
                completed: done,
                total: images.len(),
                fallback: t.is_fallback(),
            });
        });
        let fallback_images = transformed.iter().filter(|t| t.is_fallback()).count();

        let packaged = packager.package(&pack_items(&transformed), PackLevel::Trial);
        let measured_size = match packaged {
            Ok(bytes) => bytes.len() as u64,
            Err(e) => {
                tracing::warn!(round, error = %e, "packaging failed, abandoning round");
                state.history.push(RoundRecord {
                    round,
                    ratio: ratio.value(),
                    measured_size: None,
                    verdict: Verdict::PackagingFailed,
                    fallback_images,
                });
                progress.emit(ProgressEvent::RoundMeasured {
                    round,
                    max_rounds,
                    measured_size: None,
                    verdict: Verdict::PackagingFailed,
                });
                last_error = Some(e);
                state.round += 1;
                continue;
            }
        };

        let verdict = Verdict::at_ratio(measured_size, target, ratio);
        tracing::info!(
            round,
            ratio = ratio.value(),
            measured_size,
            ?verdict,
            "round measured"
        );
        state.history.push(RoundRecord {
            round,
            ratio: ratio.value(),
            measured_size: Some(measured_size),
            verdict,
            fallback_images,
        });
        progress.emit(ProgressEvent::RoundMeasured {
            round,
            max_rounds,
            measured_size: Some(measured_size),
            verdict,
        });

        let outcome = RoundOutcome {
            round,
            ratio,
            images: transformed,
            measured_size,
        };
        state.prev_size = Some(measured_size);

        if verdict == Verdict::Accepted || verdict == Verdict::Saturated {
            return Ok(SearchResult {
                selected: outcome,
                converged: true,
                history: state.history,
            });
        }

        state.remember(outcome, target);
        if is_last || verdict.ends_search() {
            break;
        }

        state.running_ratio = state
            .running_ratio
            .scaled(trend_factor(measured_size, target));
        state.round += 1;
    }

    match state.take_fallback() {
        Some(selected) => {
            tracing::info!(
                round = selected.round,
                measured_size = selected.measured_size,
                "target band not reached, using best available round"
            );
            Ok(SearchResult {
                selected,
                converged: false,
                history: state.history,
            })
        }
        None => Err(SearchError::NoFeasibleArchive {
            rounds: state.history.len() as u32,
            last_error,
        }),
    }
}
