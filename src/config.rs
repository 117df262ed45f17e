//! Configuration module.
//!
//! Handles loading, validating, and merging `fitzip.toml`. Configuration is
//! layered: stock defaults are overridden by the config file, which is in turn
//! overridden by command-line flags.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [target]
//! max_size_mb = 2.5         # Archive size to aim for (MB, base 1024)
//! overhead_fraction = 0.15  # Share of the target reserved for ZIP structure
//! max_rounds = 8            # Search rounds before settling for the best result
//!
//! [transform]
//! timeout_secs = 10.0       # Per-image budget before the original is kept
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! run_timeout_secs = 120.0  # Stop starting new rounds after this long (omit for none)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [target]
//! max_size_mb = 8
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "fitzip.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Upper bound for any configured duration: one week.
pub const MAX_DURATION_SECS: f64 = 7.0 * 24.0 * 3600.0;

fn is_valid_duration(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0 && secs <= MAX_DURATION_SECS
}

/// Convert seconds to a `Duration`, saturating instead of panicking.
fn duration_from_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Configuration loaded from `fitzip.toml`.
///
/// All fields have sensible defaults. Config files need only specify the
/// values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitzipConfig {
    /// Size target and search budget.
    pub target: TargetConfig,
    /// Per-image transform settings.
    pub transform: TransformConfig,
    /// Parallel processing and run limits.
    pub processing: ProcessingConfig,
}

impl FitzipConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.target.max_size_mb.is_finite() && self.target.max_size_mb > 0.0) {
            return Err(ConfigError::Validation(
                "target.max_size_mb must be greater than 0".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.target.overhead_fraction) {
            return Err(ConfigError::Validation(
                "target.overhead_fraction must be in [0, 1)".into(),
            ));
        }
        if self.target.max_rounds == 0 {
            return Err(ConfigError::Validation(
                "target.max_rounds must be at least 1".into(),
            ));
        }
        if !is_valid_duration(self.transform.timeout_secs) {
            return Err(ConfigError::Validation(format!(
                "transform.timeout_secs must be in (0, {}]",
                MAX_DURATION_SECS
            )));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if self
            .processing
            .run_timeout_secs
            .is_some_and(|secs| !is_valid_duration(secs))
        {
            return Err(ConfigError::Validation(format!(
                "processing.run_timeout_secs must be in (0, {}]",
                MAX_DURATION_SECS
            )));
        }
        Ok(())
    }
}

/// Size target and search budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Target archive size in megabytes (1 MB = 1024 × 1024 bytes).
    pub max_size_mb: f64,
    /// Estimated share of the archive taken by container structure.
    pub overhead_fraction: f64,
    /// Maximum number of search rounds.
    pub max_rounds: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 2.5,
            overhead_fraction: 0.15,
            max_rounds: 8,
        }
    }
}

impl TargetConfig {
    pub fn target_bytes(&self) -> u64 {
        crate::compress::megabytes_to_bytes(self.max_size_mb)
    }
}

/// Per-image transform settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// Seconds allowed for decode + resize + encode of one image.
    pub timeout_secs: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self { timeout_secs: 10.0 }
    }
}

impl TransformConfig {
    pub fn timeout(&self) -> Duration {
        duration_from_secs(self.timeout_secs)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Wall-clock budget for a whole run, checked between rounds.
    pub run_timeout_secs: Option<f64>,
}

impl ProcessingConfig {
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(duration_from_secs)
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(FitzipConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Build a one-key overlay `{ section = { key = value } }`.
///
/// Command-line flags are turned into overlays and merged last.
pub fn override_value(section: &str, key: &str, value: impl Into<toml::Value>) -> toml::Value {
    let mut inner = toml::Table::new();
    inner.insert(key.to_string(), value.into());
    let mut outer = toml::Table::new();
    outer.insert(section.to_string(), toml::Value::Table(inner));
    toml::Value::Table(outer)
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge overlays onto a base value in order, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<FitzipConfig, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let config: FitzipConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<FitzipConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `fitzip.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# fitzip Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# fitzip reads ./fitzip.toml, or the file passed with --config.
# Command-line flags override values from this file.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Size target
# ---------------------------------------------------------------------------
[target]
# Archive size to aim for, in megabytes (1 MB = 1024 x 1024 bytes).
# The result lands between 80% and 100% of this when the search converges.
max_size_mb = 2.5

# Share of the target assumed to go to ZIP headers and directory entries.
# Used only to pick the starting ratio.
overhead_fraction = 0.15

# Rounds of resize + re-encode + measure before settling for the best result.
max_rounds = 8

# ---------------------------------------------------------------------------
# Per-image transform
# ---------------------------------------------------------------------------
[transform]
# Seconds allowed to decode, resize and encode one image.
# Images that take longer are stored unchanged for that round.
timeout_secs = 10.0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Stop starting new rounds after this many seconds and keep the best
# result so far. Omit for no limit.
# run_timeout_secs = 120.0
"##
}
