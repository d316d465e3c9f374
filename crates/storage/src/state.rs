// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted state document and the locked read-modify-write protocol
//! that guards every mutation of it (§4.8, §6 "Persisted state document").

use crate::lock::{FileLock, LockError};
use chrono::{DateTime, Utc};
use oj_core::{Story, StoryId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("could not read state document at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write state document at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state document at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("state document already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("unknown story id: {0}")]
    UnknownStory(String),
    /// A caller's `mutate` closure rejected its own proposed change (e.g. a
    /// workflow-edit guardrail violation). Carries the same "leave the
    /// document untouched" guarantee as any other `mutate` error.
    #[error("mutation rejected: {0}")]
    Rejected(String),
}

/// The full persisted state document (§6).
///
/// Stories are kept in manifest order; that order is not authoritative for
/// anything (unlike each story's own step order) but is preserved for
/// readability of the on-disk document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub manifest_path: PathBuf,
    pub stories: Vec<Story>,
}

impl StateDocument {
    pub fn new(manifest_path: PathBuf, stories: Vec<Story>, created_at: DateTime<Utc>) -> Self {
        Self { schema_version: SCHEMA_VERSION, created_at, manifest_path, stories }
    }

    pub fn story(&self, id: &StoryId) -> Option<&Story> {
        self.stories.iter().find(|s| &s.id == id)
    }

    pub fn story_mut(&mut self, id: &StoryId) -> Option<&mut Story> {
        self.stories.iter_mut().find(|s| &s.id == id)
    }

    pub fn try_story_mut(&mut self, id: &StoryId) -> Result<&mut Story, StorageError> {
        self.stories
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| StorageError::UnknownStory(id.to_string()))
    }
}

/// A handle to a state document on disk, guarding all access with the
/// lock-read-validate-apply-write-rename protocol (§4.8).
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        let path = path.into();
        let lock_path = sibling_with_suffix(&path, ".lock");
        Self { path, lock_path, lock_timeout }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write a brand-new document. Fails if one already exists; callers that
    /// want `--resume` semantics should check `exists()` first (§10.6).
    pub fn initialize(&self, document: &StateDocument) -> Result<(), StorageError> {
        if self.path.exists() {
            return Err(StorageError::AlreadyExists(self.path.clone()));
        }
        let _lock = FileLock::acquire(&self.lock_path, self.lock_timeout)?;
        self.write_atomic(document)
    }

    /// Read the document without acquiring the lock. Safe for read-only
    /// observers (workers); never used by the orchestrator's own mutations,
    /// which go through [`StateStore::mutate`] instead.
    pub fn load(&self) -> Result<StateDocument, StorageError> {
        self.read_unlocked()
    }

    /// Acquire the lock, read the document, let `f` validate and apply its
    /// change in memory, then atomically persist the result. `f` returning
    /// `Err` leaves the on-disk document untouched (§8 idempotence law:
    /// "applying an edit file that violates any guardrail leaves the state
    /// document unchanged").
    pub fn mutate<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut StateDocument) -> Result<(), StorageError>,
    {
        let _lock = FileLock::acquire(&self.lock_path, self.lock_timeout)?;
        let mut document = self.read_unlocked()?;
        f(&mut document)?;
        self.write_atomic(&document)
    }

    fn read_unlocked(&self) -> Result<StateDocument, StorageError> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|source| StorageError::Read { path: self.path.clone(), source })?;
        serde_json::from_str(&raw)
            .map_err(|source| StorageError::Corrupt { path: self.path.clone(), source })
    }

    fn write_atomic(&self, document: &StateDocument) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| StorageError::Write { path: self.path.clone(), source })?;
        }
        let tmp_path = sibling_with_suffix(&self.path, ".tmp");
        let serialized = serde_json::to_string_pretty(document)
            .map_err(|source| StorageError::Corrupt { path: self.path.clone(), source })?;
        std::fs::write(&tmp_path, serialized)
            .map_err(|source| StorageError::Write { path: tmp_path.clone(), source })?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|source| StorageError::Write { path: self.path.clone(), source })?;
        Ok(())
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
