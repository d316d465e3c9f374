// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory file locking for the state document (§4.8).

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out after {timeout_ms}ms waiting for lock on {path}")]
    Timeout { path: PathBuf, timeout_ms: u64 },
}

/// An exclusive hold on a sibling `.lock` file, released on drop.
///
/// State-store writers acquire this before reading the document, and hold it
/// until the new document has been renamed into place (§4.8). Acquisition is
/// bounded so a crashed holder cannot wedge the orchestrator forever.
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block up to `timeout` acquiring an exclusive lock on `path`, polling
    /// every 25ms. `path` is created if it does not already exist.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .map_err(|source| LockError::Open { path: path.to_path_buf(), source })?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { _file: file, path: path.to_path_buf() }),
                Err(_) if Instant::now() >= deadline => {
                    return Err(LockError::Timeout {
                        path: path.to_path_buf(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                Err(_) => thread::sleep(POLL_INTERVAL),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
