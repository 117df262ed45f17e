//! Input discovery: read images out of a ZIP archive or a directory.
//!
//! Stage 1 of a run. Produces the immutable [`ImageRecord`]s the search loop
//! works on.
//!
//! ## Filtering
//!
//! ```text
//! photos.zip
//! ├── __MACOSX/                  skipped (system artifact)
//! │   └── ._dawn.jpg
//! ├── .DS_Store                  skipped (hidden)
//! ├── album/                     directory entry, skipped
//! ├── album/001-dawn.jpg         kept
//! ├── album/002-dusk.JPEG        kept (extensions are case-insensitive)
//! ├── album/logo.png             kept
//! └── album/notes.txt            skipped (not an image)
//! ```
//!
//! Kept extensions: `jpg jpeg png gif bmp webp`. A path is a system artifact
//! when any of its components starts with `.` or equals `__MACOSX`.
//!
//! Entries that cannot be read become [`ExtractionWarning`]s and the scan
//! carries on. Images keep their archive-relative names (or, for directories,
//! `/`-separated paths relative to the root) so the output archive mirrors
//! the input layout.

use crate::types::{ImageFormat, ImageRecord, total_original_size};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Input is neither a .zip file nor a directory: {0}")]
    UnsupportedInput(PathBuf),
}

/// An entry that looked like an image but could not be read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionWarning {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Hidden file or `__MACOSX` metadata.
    SystemArtifact,
    /// Extension is not one of the accepted image types.
    NotAnImage,
}

/// A file entry left out of the scan on purpose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: SkipReason,
}

/// Output of the scan stage.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub images: Vec<ImageRecord>,
    pub warnings: Vec<ExtractionWarning>,
    pub skipped: Vec<SkippedEntry>,
}

impl ScanResult {
    pub fn original_total(&self) -> u64 {
        total_original_size(&self.images)
    }

    fn skip(&mut self, name: &str, reason: SkipReason) {
        tracing::debug!(entry = name, ?reason, "skipping entry");
        self.skipped.push(SkippedEntry {
            name: name.to_string(),
            reason,
        });
    }

    fn warn(&mut self, name: &str, reason: impl ToString) {
        let reason = reason.to_string();
        tracing::warn!(entry = name, %reason, "could not read entry");
        self.warnings.push(ExtractionWarning {
            name: name.to_string(),
            reason,
        });
    }

    /// Keep an image unless an earlier entry already used its name.
    fn accept(&mut self, seen: &mut HashSet<String>, name: String, bytes: Vec<u8>, format: ImageFormat) {
        if !seen.insert(name.clone()) {
            self.warn(&name, "duplicate entry name, keeping the first");
            return;
        }
        self.images.push(ImageRecord::new(name, bytes, format));
    }
}

/// Whether any component of a `/`- or `\`-separated path is hidden or
/// `__MACOSX`.
pub fn is_system_artifact(name: &str) -> bool {
    name.split(['/', '\\'])
        .filter(|c| !c.is_empty())
        .any(|c| c.starts_with('.') || c == "__MACOSX")
}

/// Largest read buffer preallocated from an entry's declared size.
const MAX_PREALLOC: u64 = 64 << 20;

/// The declared uncompressed size comes from the archive header and is not
/// trusted beyond [`MAX_PREALLOC`].
fn capacity_hint(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

fn is_zip_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Scan a `.zip` file or a directory.
pub fn scan(input: &Path) -> Result<ScanResult, ScanError> {
    if input.is_dir() {
        scan_directory(input)
    } else if input.is_file() && is_zip_path(input) {
        let bytes = fs::read(input)?;
        scan_zip_bytes(&bytes)
    } else {
        Err(ScanError::UnsupportedInput(input.to_path_buf()))
    }
}

/// Scan an in-memory ZIP archive, keeping entry order.
pub fn scan_zip_bytes(bytes: &[u8]) -> Result<ScanResult, ScanError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut result = ScanResult::default();
    let mut seen = HashSet::new();

    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                result.warn(&format!("entry #{index}"), e);
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if is_system_artifact(&name) {
            result.skip(&name, SkipReason::SystemArtifact);
            continue;
        }
        let Some(format) = ImageFormat::from_name(&name) else {
            result.skip(&name, SkipReason::NotAnImage);
            continue;
        };

        let mut data = Vec::with_capacity(capacity_hint(entry.size()));
        match entry.read_to_end(&mut data) {
            Ok(_) => result.accept(&mut seen, name, data, format),
            Err(e) => result.warn(&name, e),
        }
    }

    tracing::info!(
        images = result.images.len(),
        skipped = result.skipped.len(),
        warnings = result.warnings.len(),
        "scanned archive"
    );
    Ok(result)
}

/// Scan a directory tree, in sorted path order.
///
/// Hidden and `__MACOSX` directories are not descended into.
pub fn scan_directory(root: &Path) -> Result<ScanResult, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::UnsupportedInput(root.to_path_buf()));
    }
    let mut result = ScanResult::default();
    let mut seen = HashSet::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_system_artifact(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let name = e
                    .path()
                    .map(|p| relative_name(root, p))
                    .unwrap_or_default();
                result.warn(&name, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = relative_name(root, entry.path());
        let Some(format) = ImageFormat::from_name(&name) else {
            result.skip(&name, SkipReason::NotAnImage);
            continue;
        };
        match fs::read(entry.path()) {
            Ok(data) => result.accept(&mut seen, name, data, format),
            Err(e) => result.warn(&name, e),
        }
    }

    tracing::info!(
        root = %root.display(),
        images = result.images.len(),
        skipped = result.skipped.len(),
        "scanned directory"
    );
    Ok(result)
}

/// `/`-separated path of `path` relative to `root`.
fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
