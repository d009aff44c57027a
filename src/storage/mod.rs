//! Durable per-source checkpoints.
//!
//! One JSON file per feed URL, named by the SHA-256 of the URL, records the
//! newest publication time seen for that feed. Resumed runs read it back to
//! skip items they already emitted.

mod checkpoint;
mod types;

pub use checkpoint::{
    checkpoint_exists, checkpoint_key, checkpoint_path, read_checkpoint, write_checkpoint,
};
pub use types::{Checkpoint, CheckpointError};
