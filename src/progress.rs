//! Progress events emitted during a compression run.
//!
//! The library never prints. Callers that want progress pass an
//! `mpsc::Sender<ProgressEvent>` and render the events however they like; the
//! CLI drains them on a printer thread through
//! [`output::format_progress_event`](crate::output::format_progress_event).
//! Events are purely observational: a closed receiver is ignored.
//!
//! ## Percent schedule
//!
//! ```text
//!   5%        analysing input
//!  10% → 80%  rounds, each owning 70 / max_rounds, advanced per image
//!  90%        finalising (re-package at maximum compression)
//! 100%        complete
//! ```

use crate::search::Verdict;
use std::sync::mpsc::Sender;

/// Share of the bar spent in the search rounds.
const ROUNDS_SPAN: f64 = 70.0;
const ROUNDS_START: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Analyzing {
        image_count: usize,
        original_total: u64,
    },
    RoundStarted {
        round: u32,
        max_rounds: u32,
        ratio: f64,
    },
    ImageTransformed {
        round: u32,
        max_rounds: u32,
        name: String,
        completed: usize,
        total: usize,
        fallback: bool,
    },
    RoundMeasured {
        round: u32,
        max_rounds: u32,
        measured_size: Option<u64>,
        verdict: Verdict,
    },
    Finalizing {
        selected_round: u32,
    },
    Complete {
        final_size: u64,
    },
}

impl ProgressEvent {
    /// Overall completion, 0–100.
    pub fn percent(&self) -> f64 {
        match self {
            Self::Analyzing { .. } => 5.0,
            Self::RoundStarted {
                round, max_rounds, ..
            } => round_start_percent(*round, *max_rounds),
            Self::ImageTransformed {
                round,
                max_rounds,
                completed,
                total,
                ..
            } => {
                let share = if *total == 0 {
                    0.0
                } else {
                    *completed as f64 / *total as f64
                };
                round_start_percent(*round, *max_rounds) + share * round_span(*max_rounds)
            }
            Self::RoundMeasured {
                round, max_rounds, ..
            } => round_start_percent(*round + 1, *max_rounds),
            Self::Finalizing { .. } => 90.0,
            Self::Complete { .. } => 100.0,
        }
    }
}

fn round_span(max_rounds: u32) -> f64 {
    ROUNDS_SPAN / max_rounds.max(1) as f64
}

/// `10 + round * 70 / max_rounds`.
pub fn round_start_percent(round: u32, max_rounds: u32) -> f64 {
    ROUNDS_START + round as f64 * round_span(max_rounds)
}

/// Optional event sink. Sending never fails the run.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    sender: Option<Sender<ProgressEvent>>,
}

impl Progress {
    pub fn new(sender: Option<Sender<ProgressEvent>>) -> Self {
        Self { sender }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.sender {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_start_schedule() {
        assert_eq!(round_start_percent(0, 8), 10.0);
        assert_eq!(round_start_percent(4, 8), 45.0);
        assert_eq!(round_start_percent(8, 8), 80.0);
    }

    #[test]
    fn image_progress_advances_within_round() {
        let half = ProgressEvent::ImageTransformed {
            round: 0,
            max_rounds: 7,
            name: "a.jpg".into(),
            completed: 5,
            total: 10,
            fallback: false,
        };
        assert!((half.percent() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_milestones() {
        let analyzing = ProgressEvent::Analyzing {
            image_count: 3,
            original_total: 10,
        };
        assert_eq!(analyzing.percent(), 5.0);
        assert_eq!(ProgressEvent::Finalizing { selected_round: 2 }.percent(), 90.0);
        assert_eq!(ProgressEvent::Complete { final_size: 1 }.percent(), 100.0);
    }

    #[test]
    fn emit_without_receiver_is_silent() {
        let (tx, rx) = std::sync::mpsc::channel();
        drop(rx);
        Progress::new(Some(tx)).emit(ProgressEvent::Complete { final_size: 0 });
        Progress::default().emit(ProgressEvent::Complete { final_size: 0 });
    }
}
