use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::{ConfigError, FetchOptions};
use crate::feed::fetcher::FeedSource;
use crate::feed::parser::Item;
use crate::feed::worker::{run_source, SourceReport};
use crate::storage::CheckpointError;

/// Items buffered between workers and the consumer before sends wait.
const OUTPUT_CAPACITY: usize = 64;

/// Errors that end a whole run rather than a single source.
#[derive(Debug, Error)]
pub enum FetchRunError {
    /// A checkpoint could not be persisted; remaining workers were aborted
    #[error("Failed to record progress for {url}: {source}")]
    Storage {
        url: String,
        #[source]
        source: CheckpointError,
    },
    /// The task supervising the workers died
    #[error("Fetch supervisor failed: {0}")]
    Supervisor(#[from] tokio::task::JoinError),
}

/// Per-source outcomes of a finished run, in completion order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<SourceReport>,
    /// Workers that panicked; their sources count as failed
    pub panicked: usize,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.succeeded() + self.panicked
    }

    pub fn emitted(&self) -> usize {
        self.reports.iter().map(SourceReport::emitted).sum()
    }
}

/// A running fetch: a stream of items from all sources plus a handle that
/// resolves once every worker has terminated.
///
/// The stream ends exactly when the last worker has finished, since each
/// worker owns one sender of the shared channel.
pub struct FetchRun {
    items: mpsc::Receiver<Item>,
    supervisor: JoinHandle<Result<RunSummary, FetchRunError>>,
}

impl FetchRun {
    /// Wait for every worker and return the per-source summary.
    ///
    /// Any items not yet consumed are discarded; workers still trying to
    /// emit stop and leave their checkpoints untouched.
    pub async fn finish(self) -> Result<RunSummary, FetchRunError> {
        drop(self.items);
        self.supervisor.await?
    }
}

impl Stream for FetchRun {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Item>> {
        self.items.poll_recv(cx)
    }
}

/// Start one worker per source, all at once, and merge their output.
///
/// Items from different sources interleave in arrival order; each source's
/// own items keep feed order. A failing source never affects the others.
/// A fatal checkpoint write aborts the remaining workers and surfaces as
/// [`FetchRunError::Storage`] from [`FetchRun::finish`].
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`ConfigError::NoSources`] when `urls` is empty; no worker is
/// started in that case.
pub fn fetch_all<S>(
    source: Arc<S>,
    urls: Vec<String>,
    options: FetchOptions,
) -> Result<FetchRun, ConfigError>
where
    S: FeedSource + ?Sized + 'static,
{
    if urls.is_empty() {
        return Err(ConfigError::NoSources);
    }

    let (tx, rx) = mpsc::channel(OUTPUT_CAPACITY);
    let options = Arc::new(options);
    let mut workers = JoinSet::new();

    for url in urls {
        let source = Arc::clone(&source);
        let options = Arc::clone(&options);
        let tx = tx.clone();

        workers.spawn(async move {
            let result = run_source(source.as_ref(), &url, &options, &tx).await;
            result.map_err(|err| FetchRunError::Storage { url, source: err })
        });
    }

    // Only workers hold senders from here on
    drop(tx);

    let supervisor = tokio::spawn(supervise(workers));

    Ok(FetchRun {
        items: rx,
        supervisor,
    })
}

async fn supervise(
    mut workers: JoinSet<Result<SourceReport, FetchRunError>>,
) -> Result<RunSummary, FetchRunError> {
    let mut summary = RunSummary::default();

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(report)) => summary.reports.push(report),
            Ok(Err(fatal)) => {
                tracing::error!(error = %fatal, "Aborting remaining feed fetches");
                workers.abort_all();
                // Drain so every worker (and its sender) is gone before returning
                while workers.join_next().await.is_some() {}
                return Err(fatal);
            }
            Err(e) if e.is_panic() => {
                tracing::error!(error = %e, "Feed worker panicked");
                summary.panicked += 1;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Feed worker cancelled");
            }
        }
    }

    Ok(summary)
}
