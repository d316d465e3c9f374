// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global and per-story scratch files (§4.3 step 2, §4.4, §5, §9).
//!
//! The global scratch is multi-writer under the state lock; per-story
//! scratch is single-writer by the assignment invariant (one worker per
//! story). Both are plain markdown files the prompt composer reads back.

use oj_core::StoryId;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("could not read scratch file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write scratch file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directory layout for scratch files, rooted under `OJ_STATE_DIR`.
#[derive(Debug, Clone)]
pub struct ScratchStore {
    root: PathBuf,
}

impl ScratchStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn global_path(&self) -> PathBuf {
        self.root.join("scratch").join("global.md")
    }

    pub fn story_path(&self, story_id: &StoryId) -> PathBuf {
        self.root.join("scratch").join(format!("{story_id}.md"))
    }

    fn archived_path(&self, story_id: &StoryId) -> PathBuf {
        self.root.join("scratch").join("archived").join(format!("{story_id}.md"))
    }

    pub fn read_global(&self) -> Result<String, ScratchError> {
        read_or_empty(&self.global_path())
    }

    pub fn append_global(&self, text: &str) -> Result<(), ScratchError> {
        append(&self.global_path(), text)
    }

    pub fn read_story(&self, story_id: &StoryId) -> Result<String, ScratchError> {
        read_or_empty(&self.story_path(story_id))
    }

    pub fn append_story(&self, story_id: &StoryId, text: &str) -> Result<(), ScratchError> {
        append(&self.story_path(story_id), text)
    }

    /// Move a completed story's scratch file under `archived/` rather than
    /// deleting it, so the reasoning trail survives story completion (§10.6).
    pub fn archive_story(&self, story_id: &StoryId) -> Result<(), ScratchError> {
        let from = self.story_path(story_id);
        if !from.exists() {
            return Ok(());
        }
        let to = self.archived_path(story_id);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ScratchError::Write {
                path: to.clone(),
                source,
            })?;
        }
        std::fs::rename(&from, &to)
            .map_err(|source| ScratchError::Write { path: to.clone(), source })
    }
}

fn read_or_empty(path: &Path) -> Result<String, ScratchError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(ScratchError::Read { path: path.to_path_buf(), source }),
    }
}

fn append(path: &Path, text: &str) -> Result<(), ScratchError> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| ScratchError::Write { path: path.to_path_buf(), source })?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ScratchError::Write { path: path.to_path_buf(), source })?;
    writeln!(file, "{text}").map_err(|source| ScratchError::Write { path: path.to_path_buf(), source })
}
