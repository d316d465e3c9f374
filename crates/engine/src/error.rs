// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine's boundary error enum, composing every lower-crate error plus
//! the handful of conditions that are the engine's own (§7).

use crate::guardrails::GuardrailError;
use oj_adapters::AgentError;
use oj_core::{StepId, StoryId};
use oj_manifest::{CycleError, ManifestError};
use oj_storage::{ScratchError, StorageError};
use oj_vcs::VcsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Scratch(#[from] ScratchError),
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("cyclic dependency detected at startup: {0}")]
    Cycle(#[from] CycleError),
    #[error("workflow edit rejected: {0}")]
    GuardrailViolation(#[from] GuardrailError),
    #[error("unknown story id: {0}")]
    UnknownStory(StoryId),
    #[error("unknown step {step} in story {story}")]
    UnknownStep { story: StoryId, step: StepId },
    #[error("internal invariant violated: {0}")]
    Internal(String),
}
