// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors from version-control subprocess calls.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("failed to spawn git: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("git {args:?} exited with status {status}: {stderr}")]
    CommandFailed {
        args: Vec<String>,
        status: i32,
        stderr: String,
    },
    #[error("git worktree conflict while rebasing onto {onto}: {stderr}")]
    RebaseConflict { onto: String, stderr: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
