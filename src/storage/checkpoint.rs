use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::types::{Checkpoint, CheckpointError};

/// Storage key for a source: lowercase hex SHA-256 of the URL bytes.
///
/// The key doubles as the checkpoint file stem, so no URL sanitizing is
/// needed and files stay compatible across versions.
pub fn checkpoint_key(url: &str) -> String {
    let hash = Sha256::digest(url.as_bytes());
    format!("{:x}", hash)
}

/// Location of the checkpoint file for `url` under `dir`.
pub fn checkpoint_path(dir: &Path, url: &str) -> PathBuf {
    dir.join(format!("{}.json", checkpoint_key(url)))
}

/// Returns true if a checkpoint file has been recorded for `url`.
pub fn checkpoint_exists(dir: &Path, url: &str) -> bool {
    checkpoint_path(dir, url).is_file()
}

/// Load the checkpoint recorded for `url`.
///
/// # Errors
///
/// - [`CheckpointError::NotFound`] - no checkpoint has been written yet
/// - [`CheckpointError::Read`] - the file exists but could not be read
/// - [`CheckpointError::Corrupt`] - the file does not hold a checkpoint record
/// - [`CheckpointError::UrlMismatch`] - the record names a different source
pub fn read_checkpoint(dir: &Path, url: &str) -> Result<Checkpoint, CheckpointError> {
    let path = checkpoint_path(dir, url);

    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CheckpointError::NotFound { path });
        }
        Err(source) => return Err(CheckpointError::Read { path, source }),
    };

    let checkpoint: Checkpoint = match serde_json::from_reader(std::io::BufReader::new(file)) {
        Ok(c) => c,
        // Surface I/O failures mid-read as read errors, not corruption
        Err(e) if e.is_io() => {
            return Err(CheckpointError::Read {
                path,
                source: e.into(),
            });
        }
        Err(source) => return Err(CheckpointError::Corrupt { path, source }),
    };

    if checkpoint.url != url {
        return Err(CheckpointError::UrlMismatch {
            path,
            expected: url.to_string(),
            found: checkpoint.url,
        });
    }

    Ok(checkpoint)
}

/// Persist `checkpoint` under `dir`, replacing any previous record.
///
/// Creates `dir` (and parents) when missing. The record is written to a
/// temporary sibling, synced, then renamed over the final path, so a reader
/// never observes a half-written file.
///
/// # Errors
///
/// - [`CheckpointError::CreateDir`] - `dir` could not be created
/// - [`CheckpointError::Write`] - the record could not be written or renamed
pub fn write_checkpoint(dir: &Path, checkpoint: &Checkpoint) -> Result<PathBuf, CheckpointError> {
    fs::create_dir_all(dir).map_err(|source| CheckpointError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = checkpoint_path(dir, &checkpoint.url);
    let temp_path = path.with_extension("json.tmp");

    if let Err(source) = write_record(&temp_path, checkpoint) {
        let _ = fs::remove_file(&temp_path);
        return Err(CheckpointError::Write {
            path: temp_path,
            source,
        });
    }

    // On Windows, rename fails if destination exists
    #[cfg(windows)]
    if path.exists() {
        if let Err(source) = fs::remove_file(&path) {
            let _ = fs::remove_file(&temp_path);
            return Err(CheckpointError::Write { path, source });
        }
    }

    if let Err(source) = fs::rename(&temp_path, &path) {
        let _ = fs::remove_file(&temp_path);
        return Err(CheckpointError::Write { path, source });
    }

    tracing::debug!(
        url = %checkpoint.url,
        fetched_until = checkpoint.fetched_until,
        path = %path.display(),
        "Checkpoint written"
    );

    Ok(path)
}

fn write_record(path: &Path, checkpoint: &Checkpoint) -> std::io::Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, checkpoint)?;
    writer.write_all(b"\n")?;

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}
