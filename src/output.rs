//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Inspect
//!
//! ```text
//! Images
//! 001 album/001-dawn.jpg (jpeg, 4.2 MB)
//! 002 album/logo.png (png, 310.5 KB)
//!
//! Skipped
//!     __MACOSX/album/._dawn.jpg (system artifact)
//!     album/notes.txt (not an image)
//!
//! 2 images, 4.5 MB
//! ```
//!
//! ## Compress (progress)
//!
//! ```text
//! [  5%] Analyzing 2 images (4.5 MB)
//! [ 10%] Round 1/8 at ratio 0.472
//! [ 14%]     001 album/001-dawn.jpg
//! [ 19%]     002 album/logo.png (kept original)
//! [ 19%] Round 1/8: 2.71 MB, over target
//! [ 90%] Finalizing round 2
//! [100%] Complete: 2.3 MB
//! ```
//!
//! ## Compress (summary)
//!
//! ```text
//! Original size:    4.5 MB
//! Final size:       2.3 MB (target 2.5 MB)
//! Images processed: 2
//! Space saved:      2.2 MB (48.89%)
//! Rounds:           2 (selected round 2, ratio 0.401)
//! Wrote compressed_images.zip
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: they build strings and never print.

use crate::compress::CompressionStats;
use crate::progress::ProgressEvent;
use crate::scan::{ScanResult, SkipReason};
use crate::search::Verdict;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable size, base 1024, at most two decimals.
///
/// ```text
/// 0        → 0 Bytes
/// 1536     → 1.5 KB
/// 2621440  → 2.5 MB
/// ```
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", trim_decimals(value), SIZE_UNITS[unit])
}

/// Two decimals with trailing zeros (and a bare point) removed.
fn trim_decimals(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    fixed
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn percent_prefix(event: &ProgressEvent) -> String {
    format!("[{:>3.0}%]", event.percent())
}

fn verdict_label(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Accepted => "within target",
        Verdict::Saturated => "under target at full size",
        Verdict::UnderTarget => "under target",
        Verdict::OverTarget => "over target",
        Verdict::Floored => "over target at minimum size",
        Verdict::PackagingFailed => "packaging failed",
    }
}

fn skip_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::SystemArtifact => "system artifact",
        SkipReason::NotAnImage => "not an image",
    }
}

// ============================================================================
// Inspect
// ============================================================================

/// Format the images found in an input, plus what was left out and why.
pub fn format_scan_output(result: &ScanResult) -> Vec<String> {
    let mut lines = Vec::new();

    if result.images.is_empty() {
        lines.push("No image files found".to_string());
    } else {
        lines.push("Images".to_string());
        for (i, image) in result.images.iter().enumerate() {
            lines.push(format!(
                "{} {} ({}, {})",
                format_index(i + 1),
                image.name(),
                image.format().label(),
                format_file_size(image.original_size())
            ));
        }
    }

    if !result.skipped.is_empty() {
        lines.push(String::new());
        lines.push("Skipped".to_string());
        for entry in &result.skipped {
            lines.push(format!("    {} ({})", entry.name, skip_label(entry.reason)));
        }
    }

    if !result.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings".to_string());
        for warning in &result.warnings {
            lines.push(format!("    {}: {}", warning.name, warning.reason));
        }
    }

    lines.push(String::new());
    let noun = if result.images.len() == 1 { "image" } else { "images" };
    lines.push(format!(
        "{} {}, {}",
        result.images.len(),
        noun,
        format_file_size(result.original_total())
    ));
    lines
}

/// Print inspect output to stdout.
pub fn print_scan_output(result: &ScanResult) {
    for line in format_scan_output(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Compress
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_progress_event(event: &ProgressEvent) -> Vec<String> {
    let prefix = percent_prefix(event);
    let line = match event {
        ProgressEvent::Analyzing {
            image_count,
            original_total,
        } => format!(
            "{} Analyzing {} images ({})",
            prefix,
            image_count,
            format_file_size(*original_total)
        ),
        ProgressEvent::RoundStarted {
            round,
            max_rounds,
            ratio,
        } => format!(
            "{} Round {}/{} at ratio {:.3}",
            prefix,
            round + 1,
            max_rounds,
            ratio
        ),
        ProgressEvent::ImageTransformed {
            name,
            completed,
            fallback,
            ..
        } => {
            let suffix = if *fallback { " (kept original)" } else { "" };
            format!("{}     {} {}{}", prefix, format_index(*completed), name, suffix)
        }
        ProgressEvent::RoundMeasured {
            round,
            max_rounds,
            measured_size,
            verdict,
        } => match measured_size {
            Some(size) => format!(
                "{} Round {}/{}: {}, {}",
                prefix,
                round + 1,
                max_rounds,
                format_file_size(*size),
                verdict_label(*verdict)
            ),
            None => format!(
                "{} Round {}/{}: {}",
                prefix,
                round + 1,
                max_rounds,
                verdict_label(*verdict)
            ),
        },
        ProgressEvent::Finalizing { selected_round } => {
            format!("{} Finalizing round {}", prefix, selected_round + 1)
        }
        ProgressEvent::Complete { final_size } => {
            format!("{} Complete: {}", prefix, format_file_size(*final_size))
        }
    };
    vec![line]
}

/// Format the end-of-run summary.
pub fn format_stats(stats: &CompressionStats, output: &Path) -> Vec<String> {
    let mut lines = vec![
        format!("Original size:    {}", format_file_size(stats.original_total)),
        format!(
            "Final size:       {} (target {})",
            format_file_size(stats.final_size),
            format_file_size(stats.target_size)
        ),
        format!("Images processed: {}", stats.image_count),
    ];

    let saved = if stats.space_saved >= 0 {
        format_file_size(stats.space_saved as u64)
    } else {
        format!("-{}", format_file_size(stats.space_saved.unsigned_abs()))
    };
    lines.push(format!(
        "Space saved:      {} ({}%)",
        saved,
        trim_decimals(stats.savings_percent)
    ));
    lines.push(format!(
        "Rounds:           {} (selected round {}, ratio {:.3})",
        stats.rounds,
        stats.selected_round + 1,
        stats.selected_ratio
    ));

    if stats.fallback_images > 0 {
        lines.push(format!("Kept originals:   {}", stats.fallback_images));
    }
    if !stats.within_target() {
        lines.push("Warning: archive is larger than the target".to_string());
    } else if !stats.converged {
        lines.push("Note: best result below the 80% band; target not closely matched".to_string());
    }
    lines.push(format!("Wrote {}", output.display()));
    lines
}

/// Print the end-of-run summary to stdout.
pub fn print_stats(stats: &CompressionStats, output: &Path) {
    for line in format_stats(stats, output) {
        println!("{}", line);
    }
}
