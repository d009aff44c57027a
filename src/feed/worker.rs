use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::{FetchOptions, UndatedPolicy};
use crate::feed::fetcher::{FeedSource, FetchError};
use crate::feed::parser::Item;
use crate::storage::{
    checkpoint_path, read_checkpoint, write_checkpoint, Checkpoint, CheckpointError,
};

/// Deadline used when `now + timeout` is not representable (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// What happened to one source during a run.
#[derive(Debug)]
pub struct SourceReport {
    pub url: String,
    pub outcome: SourceOutcome,
}

#[derive(Debug)]
pub enum SourceOutcome {
    /// Feed fetched and every surviving item delivered.
    Completed {
        /// Items present in the fetched feed
        fetched: usize,
        /// Items that passed the resume filter and were emitted
        emitted: usize,
        /// New `fetched_until` value computed from this fetch
        watermark: i64,
        checkpoint_written: bool,
    },
    /// Fetch failed or timed out; nothing emitted, no checkpoint written.
    Failed(FetchError),
    /// The output stream was closed before all items were delivered.
    Abandoned { emitted: usize },
}

impl SourceReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Completed { .. })
    }

    pub fn emitted(&self) -> usize {
        match self.outcome {
            SourceOutcome::Completed { emitted, .. } | SourceOutcome::Abandoned { emitted } => {
                emitted
            }
            SourceOutcome::Failed(_) => 0,
        }
    }
}

/// Fetch one source end-to-end and stream its qualifying items into `tx`.
///
/// The deadline is `now + options.timeout`, taken when this call starts.
/// Items go out in feed order; an item survives when its publication time is
/// strictly greater than the resume threshold (0 on a fresh fetch).
///
/// Fetch failures are reported through [`SourceOutcome::Failed`] and never
/// returned as errors.
///
/// # Errors
///
/// Returns [`CheckpointError`] only when the new checkpoint cannot be
/// persisted (record directory creation or file write). Callers should treat
/// that as fatal for the whole run.
pub async fn run_source<S>(
    source: &S,
    url: &str,
    options: &FetchOptions,
    tx: &mpsc::Sender<Item>,
) -> Result<SourceReport, CheckpointError>
where
    S: FeedSource + ?Sized,
{
    let deadline = deadline_after(options.timeout);

    let fetched = tokio::time::timeout_at(deadline, source.fetch(url, deadline))
        .await
        .unwrap_or(Err(FetchError::Timeout));

    let feed = match fetched {
        Ok(feed) => feed,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Error fetching feed");
            return Ok(SourceReport {
                url: url.to_string(),
                outcome: SourceOutcome::Failed(e),
            });
        }
    };

    let checkpoint = Checkpoint::new(url, watermark(&feed.items));

    tracing::info!(
        url = %url,
        title = feed.title.as_deref().unwrap_or(""),
        link = feed.link.as_deref().unwrap_or(""),
        items = feed.items.len(),
        "Fetched feed"
    );

    let threshold = match (&options.record_dir, options.resume) {
        (Some(dir), true) => resume_threshold(dir, url).await,
        (None, true) => {
            tracing::warn!(url = %url, "Resume requested without a record directory, fetching from scratch");
            0
        }
        (_, false) => 0,
    };

    let fetched_count = feed.items.len();
    let mut emitted = 0;

    for item in feed.items {
        if !admits(item.published_timestamp(), threshold, options.undated) {
            continue;
        }
        if tx.send(item).await.is_err() {
            // Receiver dropped: the rest cannot be delivered, so the
            // checkpoint must not advance past them
            tracing::debug!(url = %url, emitted = emitted, "Output closed, abandoning source");
            return Ok(SourceReport {
                url: url.to_string(),
                outcome: SourceOutcome::Abandoned { emitted },
            });
        }
        emitted += 1;
    }

    let checkpoint_written = match &options.record_dir {
        Some(dir) => {
            persist_checkpoint(dir, checkpoint.clone()).await?;
            true
        }
        None => false,
    };

    Ok(SourceReport {
        url: url.to_string(),
        outcome: SourceOutcome::Completed {
            fetched: fetched_count,
            emitted,
            watermark: checkpoint.fetched_until,
            checkpoint_written,
        },
    })
}

/// Highest publication time across `items`; undated items count as 0.
pub fn watermark(items: &[Item]) -> i64 {
    items
        .iter()
        .map(|item| item.published_timestamp().unwrap_or(0))
        .fold(0, i64::max)
}

/// Whether an item with `timestamp` passes a `threshold`.
pub fn admits(timestamp: Option<i64>, threshold: i64, undated: UndatedPolicy) -> bool {
    match (timestamp, undated) {
        (None, UndatedPolicy::Include) => true,
        (timestamp, _) => timestamp.unwrap_or(0) > threshold,
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

async fn resume_threshold(dir: &Path, url: &str) -> i64 {
    let (dir, owned_url) = (dir.to_path_buf(), url.to_string());
    let loaded = tokio::task::spawn_blocking(move || read_checkpoint(&dir, &owned_url)).await;

    match loaded {
        Err(e) => {
            tracing::warn!(
                url = %url,
                error = %e,
                "Checkpoint read task failed, continue fetching from scratch"
            );
            0
        }
        Ok(result) => threshold_from(url, result),
    }
}

fn threshold_from(url: &str, result: Result<Checkpoint, CheckpointError>) -> i64 {
    match result {
        Ok(checkpoint) => {
            tracing::info!(
                url = %url,
                since = %format_unix(checkpoint.fetched_until),
                "Continue fetching"
            );
            checkpoint.fetched_until
        }
        Err(e) => {
            tracing::warn!(
                url = %url,
                error = %e,
                "Error reading checkpoint, continue fetching from scratch"
            );
            0
        }
    }
}

/// Write the checkpoint on the blocking pool; the store does synchronous file I/O.
async fn persist_checkpoint(dir: &Path, checkpoint: Checkpoint) -> Result<PathBuf, CheckpointError> {
    let dir = dir.to_path_buf();
    let path = checkpoint_path(&dir, &checkpoint.url);

    tokio::task::spawn_blocking(move || write_checkpoint(&dir, &checkpoint))
        .await
        .unwrap_or_else(|e| {
            Err(CheckpointError::Write {
                path,
                source: std::io::Error::other(e),
            })
        })
}

fn format_unix(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
