//! Archive evaluator: package named blobs into a ZIP and report its size.
//!
//! Packaging runs once per search round at a moderate deflate level, and once
//! more at the maximum level for the archive that is actually delivered:
//!
//! | Level | Deflate | Used for |
//! |---|---|---|
//! | [`PackLevel::Trial`] | 6 | measuring each round |
//! | [`PackLevel::Final`] | 9 | the returned archive |
//!
//! Output is deterministic: entries are written in the given order with a
//! fixed timestamp and permissions, so packaging the same items twice at the
//! same level yields identical bytes.

use serde::Serialize;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("Failed to add {name} to archive: {source}")]
    Entry {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("Failed to write {name} into archive: {source}")]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to finish archive: {0}")]
    Finish(#[source] zip::result::ZipError),
}

/// Internal compression setting for a packaging pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackLevel {
    Trial,
    Final,
}

impl PackLevel {
    pub fn deflate_level(self) -> i64 {
        match self {
            Self::Trial => 6,
            Self::Final => 9,
        }
    }
}

/// A named blob to place in the archive.
#[derive(Debug, Clone, Copy)]
pub struct PackItem<'a> {
    pub name: &'a str,
    pub bytes: &'a [u8],
}

/// Trait for archive writers.
///
/// The search loop only needs the packaged bytes (and from them, the size);
/// tests substitute a packager that reports scripted sizes.
pub trait Packager: Sync {
    fn package(&self, items: &[PackItem<'_>], level: PackLevel) -> Result<Vec<u8>, PackagingError>;
}

/// ZIP writer using the `zip` crate with deflate compression.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipPackager;

impl ZipPackager {
    pub fn new() -> Self {
        Self
    }
}

impl Packager for ZipPackager {
    fn package(&self, items: &[PackItem<'_>], level: PackLevel) -> Result<Vec<u8>, PackagingError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level.deflate_level()))
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for item in items {
            writer
                .start_file(item.name, options)
                .map_err(|source| PackagingError::Entry {
                    name: item.name.to_string(),
                    source,
                })?;
            writer
                .write_all(item.bytes)
                .map_err(|source| PackagingError::Write {
                    name: item.name.to_string(),
                    source,
                })?;
        }

        let cursor = writer.finish().map_err(PackagingError::Finish)?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::Mutex;

    /// Packager whose trial output sizes follow a script.
    ///
    /// Each trial call pops the next entry: `Some(n)` yields `n` bytes, `None`
    /// fails the call. Once the script runs out, trial output is the sum of
    /// the item sizes. Final calls always return the summed size.
    pub struct ScriptedPackager {
        script: Mutex<Vec<Option<usize>>>,
        pub calls: Mutex<Vec<(PackLevel, usize)>>,
    }

    impl ScriptedPackager {
        pub fn new(script: Vec<Option<usize>>) -> Self {
            let mut script = script;
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// No script: every call reports the summed item size.
        pub fn summing() -> Self {
            Self::new(Vec::new())
        }

        pub fn trial_calls(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(level, _)| *level == PackLevel::Trial)
                .count()
        }
    }

    impl Packager for ScriptedPackager {
        fn package(
            &self,
            items: &[PackItem<'_>],
            level: PackLevel,
        ) -> Result<Vec<u8>, PackagingError> {
            self.calls.lock().unwrap().push((level, items.len()));
            let summed: usize = items.iter().map(|i| i.bytes.len()).sum();

            let scripted = match level {
                PackLevel::Trial => self.script.lock().unwrap().pop(),
                PackLevel::Final => None,
            };
            match scripted {
                Some(Some(n)) => Ok(vec![0; n]),
                Some(None) => Err(PackagingError::Finish(zip::result::ZipError::FileNotFound)),
                None => Ok(vec![0; summed]),
            }
        }
    }

    fn items<'a>(entries: &'a [(&'a str, Vec<u8>)]) -> Vec<PackItem<'a>> {
        entries
            .iter()
            .map(|(name, bytes)| PackItem { name, bytes })
            .collect()
    }

    #[test]
    fn zip_roundtrips_entries() {
        let entries = vec![
            ("a.jpg", vec![1u8; 500]),
            ("nested/b.png", (0..=255u8).collect::<Vec<u8>>()),
        ];
        let bytes = ZipPackager::new()
            .package(&items(&entries), PackLevel::Trial)
            .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        for (name, expected) in &entries {
            let mut file = archive.by_name(name).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            assert_eq!(&content, expected);
        }
    }

    #[test]
    fn packaging_is_deterministic() {
        let entries = vec![("x.jpg", vec![9u8; 4096]), ("y.jpg", vec![3u8; 100])];
        let packager = ZipPackager::new();
        let first = packager.package(&items(&entries), PackLevel::Trial).unwrap();
        let second = packager.package(&items(&entries), PackLevel::Trial).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn final_level_is_no_larger_than_trial() {
        let text: Vec<u8> = "the quick brown fox jumps over the lazy dog "
            .repeat(500)
            .into_bytes();
        let entries = vec![("notes.bmp", text)];
        let packager = ZipPackager::new();
        let trial = packager.package(&items(&entries), PackLevel::Trial).unwrap();
        let fin = packager.package(&items(&entries), PackLevel::Final).unwrap();
        assert!(fin.len() <= trial.len());
    }

    #[test]
    fn duplicate_names_are_a_packaging_error() {
        let entries = vec![("same.jpg", vec![1u8; 10]), ("same.jpg", vec![2u8; 10])];
        let result = ZipPackager::new().package(&items(&entries), PackLevel::Trial);
        assert!(matches!(result, Err(PackagingError::Entry { ref name, .. }) if name == "same.jpg"));
    }

    #[test]
    fn empty_archive_is_valid() {
        let bytes = ZipPackager::new().package(&[], PackLevel::Final).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn deflate_levels() {
        assert_eq!(PackLevel::Trial.deflate_level(), 6);
        assert_eq!(PackLevel::Final.deflate_level(), 9);
    }
}
