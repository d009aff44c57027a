//! Fetch many RSS/Atom feeds concurrently and emit their entries as JSON,
//! with optional per-feed checkpoints so later runs only emit newer entries.
//!
//! - [`config`]: config file loading and validated [`config::FetchOptions`]
//! - [`feed`]: parsing, HTTP fetching, per-source workers and the coordinator
//! - [`storage`]: checkpoint files keyed by the SHA-256 of each feed URL
//! - [`util`]: feed URL validation

pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
