// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A thin async wrapper over the `git` subprocess.
//!
//! The core only ever issues the small set of commands named in §1/§4.3/§4.7:
//! revision lookup, diff-including-untracked, hard reset, worktree
//! create/remove, rebase, and squash merge. Everything else about the
//! version-control tool is opaque.

use crate::error::VcsError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Commit identity used for integration commits (§6 environment contract).
#[derive(Debug, Clone)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

/// A git repository (or worktree) rooted at a fixed path.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        self.run_in(&self.root, args).await
    }

    async fn run_in(&self, cwd: &Path, args: &[&str]) -> Result<String, VcsError> {
        tracing::debug!(cwd = %cwd.display(), args = ?args, "git");

        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(VcsError::Spawn)?;

        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                args: args.iter().map(|s| s.to_string()).collect(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Current HEAD revision, recorded as a step's pre-start revision (§4.3 step 1).
    pub async fn rev_parse_head(&self) -> Result<String, VcsError> {
        self.run(&["rev-parse", "HEAD"]).await
    }

    /// The full working-tree diff, including untracked files, for the
    /// diagnostic path saved on step failure/timeout/restart (§4.3, §4.5, §10.6).
    ///
    /// Untracked files are intent-to-add'd in a disposable index so they show
    /// up in the diff without being permanently staged.
    pub async fn diff_including_untracked(&self) -> Result<String, VcsError> {
        self.run(&["add", "--intent-to-add", "--all"]).await?;
        let diff = self.run(&["diff", "HEAD"]).await?;
        // Undo the intent-to-add so the working tree is left exactly as found;
        // the caller resets to pre_start_revision immediately afterward anyway,
        // but a failed or skipped reset should not leave phantom index entries.
        self.run(&["reset"]).await?;
        Ok(diff)
    }

    /// Hard-reset the workspace to `revision`, discarding all local changes
    /// including untracked files (§4.3 on failure/restart).
    pub async fn reset_hard(&self, revision: &str) -> Result<(), VcsError> {
        self.run(&["reset", "--hard", revision]).await?;
        self.run(&["clean", "-fd"]).await?;
        Ok(())
    }

    /// Create an isolated worktree at `path` on a new `branch`, starting from
    /// `start_point` (§4.7 "isolated checkout derived from a shared base revision").
    pub async fn worktree_add(
        &self,
        path: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), VcsError> {
        let path_str = path.to_string_lossy().into_owned();
        self.run(&["worktree", "add", "-b", branch, &path_str, start_point])
            .await?;
        Ok(())
    }

    /// Remove a worktree created by `worktree_add`, disposing of an isolated
    /// checkout whose story is done with it (§4.7).
    pub async fn worktree_remove(&self, path: &Path) -> Result<(), VcsError> {
        let path_str = path.to_string_lossy().into_owned();
        self.run(&["worktree", "remove", "--force", &path_str]).await?;
        Ok(())
    }

    /// Rebase `branch` (run inside the worktree at `worktree_path`) onto `onto`.
    /// Aborts and returns `VcsError::RebaseConflict` on conflict, leaving the
    /// worktree in its pre-rebase state (§4.7 integration).
    pub async fn rebase_onto(&self, worktree_path: &Path, onto: &str) -> Result<(), VcsError> {
        match self.run_in(worktree_path, &["rebase", onto]).await {
            Ok(_) => Ok(()),
            Err(VcsError::CommandFailed { stderr, .. }) => {
                let _ = self.run_in(worktree_path, &["rebase", "--abort"]).await;
                Err(VcsError::RebaseConflict { onto: onto.to_string(), stderr })
            }
            Err(other) => Err(other),
        }
    }

    /// Squash-merge `branch` into the current branch of the base repo with a
    /// conventional commit message (§4.7 "perform a squash merge").
    pub async fn squash_merge(
        &self,
        branch: &str,
        message: &str,
        identity: &GitIdentity,
    ) -> Result<(), VcsError> {
        self.run(&["merge", "--squash", branch]).await?;
        self.run_in(
            &self.root,
            &[
                "-c",
                &format!("user.name={}", identity.name),
                "-c",
                &format!("user.email={}", identity.email),
                "commit",
                "-m",
                message,
            ],
        )
        .await?;
        Ok(())
    }
}
