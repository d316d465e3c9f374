// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace isolation and integration (§4.7): one git worktree per assigned
//! story, rebased and squash-merged back into the shared base on completion.

use oj_core::StoryId;
use oj_vcs::{GitIdentity, GitRepo, VcsError};
use std::path::PathBuf;

/// What happened when the scheduler tried to integrate a completed story's
/// branch back into the base.
#[derive(Debug)]
pub enum IntegrationOutcome {
    Merged,
    /// The rebase conflicted; the caller inserts a conflict-resolution step
    /// and re-runs the story rather than treating this as fatal (§4.7, §7).
    Conflict { stderr: String },
}

/// Creates, resets, and disposes of per-story isolated checkouts, and
/// integrates a finished one back into the base repository.
#[derive(Clone)]
pub struct WorkspaceManager {
    base: GitRepo,
    root: PathBuf,
    identity: GitIdentity,
}

impl WorkspaceManager {
    pub fn new(base: GitRepo, root: impl Into<PathBuf>, identity: GitIdentity) -> Self {
        Self { base, root: root.into(), identity }
    }

    pub fn checkout_path(&self, story_id: &StoryId) -> PathBuf {
        self.root.join(story_id.as_str())
    }

    pub fn branch_name(&self, story_id: &StoryId) -> String {
        format!("oj/{story_id}")
    }

    /// A handle to a story's checkout, whether or not it has been created
    /// yet (used by reconciliation, which only needs to read/reset).
    pub fn repo_for(&self, story_id: &StoryId) -> GitRepo {
        GitRepo::new(self.checkout_path(story_id))
    }

    /// Create a fresh isolated checkout branched from the base's current HEAD.
    pub async fn prepare(&self, story_id: &StoryId) -> Result<GitRepo, VcsError> {
        let path = self.checkout_path(story_id);
        let base_rev = self.base.rev_parse_head().await?;
        self.base.worktree_add(&path, &self.branch_name(story_id), &base_rev).await?;
        Ok(GitRepo::new(path))
    }

    /// Remove a story's isolated checkout once it is no longer needed.
    pub async fn dispose(&self, story_id: &StoryId) -> Result<(), VcsError> {
        let path = self.checkout_path(story_id);
        if path.exists() {
            self.base.worktree_remove(&path).await?;
        }
        Ok(())
    }

    /// Rebase the story's branch onto the base's current HEAD and, on
    /// success, squash-merge it with a conventional commit message (§4.7).
    pub async fn integrate(
        &self,
        story_id: &StoryId,
        story_title: &str,
    ) -> Result<IntegrationOutcome, VcsError> {
        let path = self.checkout_path(story_id);
        let base_head = self.base.rev_parse_head().await?;

        match self.base.rebase_onto(&path, &base_head).await {
            Ok(()) => {
                let branch = self.branch_name(story_id);
                let message = format!("{story_title} ({story_id})");
                self.base.squash_merge(&branch, &message, &self.identity).await?;
                self.dispose(story_id).await?;
                Ok(IntegrationOutcome::Merged)
            }
            Err(VcsError::RebaseConflict { stderr, .. }) => Ok(IntegrationOutcome::Conflict { stderr }),
            Err(other) => Err(other),
        }
    }
}
