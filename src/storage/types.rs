use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the checkpoint store.
///
/// `NotFound` is kept apart from the other read failures so callers can treat
/// "never fetched before" as a normal condition. The two write-side variants
/// (`CreateDir`, `Write`) are the only ones a fetch run treats as fatal.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// No checkpoint has been recorded for this source yet
    #[error("No checkpoint at {}", path.display())]
    NotFound { path: PathBuf },

    /// The checkpoint file exists but could not be read
    #[error("Failed to read checkpoint {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The checkpoint file is not a valid checkpoint record
    #[error("Corrupt checkpoint {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The checkpoint file was written for a different source
    #[error("Checkpoint {} belongs to {found}, expected {expected}", path.display())]
    UrlMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// The record directory could not be created
    #[error("Failed to create record directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The checkpoint could not be persisted
    #[error("Failed to write checkpoint {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CheckpointError {
    /// True when the source simply has no checkpoint yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CheckpointError::NotFound { .. })
    }
}

// ============================================================================
// Checkpoint Record
// ============================================================================

/// Per-source progress record.
///
/// Serialized as exactly `{"url": ..., "last_fetch_time": ...}` so files
/// written by earlier runs stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Source feed URL this checkpoint belongs to
    pub url: String,
    /// Highest publication time (Unix seconds) seen in the run that wrote it
    #[serde(rename = "last_fetch_time")]
    pub fetched_until: i64,
}

impl Checkpoint {
    pub fn new(url: impl Into<String>, fetched_until: i64) -> Self {
        Self {
            url: url.into(),
            fetched_until,
        }
    }
}
