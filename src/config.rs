//! Configuration for a fetch run.
//!
//! Settings come from an optional TOML file (`~/.config/feedflux/config.toml`
//! by default) and are overridden by command-line flags. [`FetchOptions`] is
//! the validated result handed to every worker; nothing is read from global
//! state once a run starts.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Record directory must be specified when continuing fetching")]
    ResumeWithoutRecordDir,

    #[error("Timeout must be at least 1 second, got {0}")]
    InvalidTimeout(u64),

    #[error("No feed url specified")]
    NoSources,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// What to do with entries that carry no usable publication time.
///
/// `Skip` treats them as timestamp 0, so the strict "newer than threshold"
/// filter drops them on fresh and resumed fetches alike. `Include` always
/// emits them. Either way they never advance the checkpoint.
///
/// Dated entries are filtered too: a fresh fetch compares against a
/// threshold of 0, so an entry stamped at or before the Unix epoch
/// (timestamp <= 0) is dropped under both policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndatedPolicy {
    #[default]
    Skip,
    Include,
}

/// Settings loaded from the config file.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-source fetch deadline in seconds.
    pub timeout_seconds: u64,

    /// Directory for checkpoint files. Unset or empty = no persistence.
    pub record_dir: Option<PathBuf>,

    /// User-Agent header sent with feed requests.
    pub user_agent: String,

    /// Handling of entries without a publication time.
    pub undated_items: UndatedPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            record_dir: None,
            user_agent: crate::feed::DEFAULT_USER_AGENT.to_string(),
            undated_items: UndatedPolicy::Skip,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["timeout_seconds", "record_dir", "user_agent", "undated_items"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

// ============================================================================
// Fetch Options
// ============================================================================

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub record_dir: Option<PathBuf>,
    pub resume: bool,
    pub timeout_seconds: Option<u64>,
    pub include_undated: bool,
}

/// Validated per-run options passed explicitly to every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Deadline for each source, measured from when its worker starts.
    pub timeout: Duration,
    /// Where checkpoints are read and written; `None` disables persistence.
    pub record_dir: Option<PathBuf>,
    /// Only emit items newer than the source's stored checkpoint.
    pub resume: bool,
    pub undated: UndatedPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            record_dir: None,
            resume: false,
            undated: UndatedPolicy::Skip,
        }
    }
}

impl FetchOptions {
    /// Merge file settings with command-line overrides and validate.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidTimeout`] - timeout below one second
    /// - [`ConfigError::ResumeWithoutRecordDir`] - resume with no record directory
    pub fn resolve(config: &Config, overrides: Overrides) -> Result<Self, ConfigError> {
        let timeout_seconds = overrides.timeout_seconds.unwrap_or(config.timeout_seconds);
        if timeout_seconds < 1 {
            return Err(ConfigError::InvalidTimeout(timeout_seconds));
        }

        // An empty path means "no persistence", same as leaving it unset
        let record_dir = overrides
            .record_dir
            .or_else(|| config.record_dir.clone())
            .filter(|dir| !dir.as_os_str().is_empty());

        if overrides.resume && record_dir.is_none() {
            return Err(ConfigError::ResumeWithoutRecordDir);
        }

        let undated = if overrides.include_undated {
            UndatedPolicy::Include
        } else {
            config.undated_items
        };

        Ok(Self {
            timeout: Duration::from_secs(timeout_seconds),
            record_dir,
            resume: overrides.resume,
            undated,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
