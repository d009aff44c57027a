//! Concurrent feed fetching with resumable per-source checkpoints.
//!
//! - **Parsing**: [`parser`] turns RSS/Atom/JSON Feed bytes into [`Feed`] and [`Item`]
//! - **Fetching**: [`fetcher`] retrieves one URL over HTTP within a deadline
//! - **Worker**: [`worker`] fetches a single source, filters items against
//!   its checkpoint, streams survivors and records the new checkpoint
//! - **Coordinator**: [`coordinator`] runs one worker per source at once and
//!   merges their output into a single stream
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let source = Arc::new(HttpFeedSource::new(DEFAULT_USER_AGENT)?);
//! let mut run = fetch_all(source, urls, options)?;
//! while let Some(item) = run.next().await {
//!     println!("{}", serde_json::to_string(&item)?);
//! }
//! let summary = run.finish().await?;
//! ```

mod coordinator;
mod fetcher;
mod parser;
mod worker;

pub use coordinator::{fetch_all, FetchRun, FetchRunError, RunSummary};
pub use fetcher::{FeedSource, FetchError, HttpFeedSource, DEFAULT_USER_AGENT};
pub use parser::{parse_feed, Author, Enclosure, Feed, Item};
pub use worker::{admits, run_source, watermark, SourceOutcome, SourceReport};
