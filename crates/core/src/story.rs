// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Story identifier, status, and record (§3, §4.6).

use crate::history::HistoryEntry;
use crate::step::{Step, StepId};
use crate::worker::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a story, taken verbatim from the input manifest.
    pub struct StoryId;
}

/// Story lifecycle status (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    Unclaimed,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

impl StoryStatus {
    /// Once a story is completed or failed, its steps and history are immutable (§3 invariant b).
    pub fn is_terminal(self) -> bool {
        matches!(self, StoryStatus::Completed | StoryStatus::Failed)
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoryStatus::Unclaimed => "unclaimed",
            StoryStatus::InProgress => "in_progress",
            StoryStatus::Completed => "completed",
            StoryStatus::Failed => "failed",
            StoryStatus::Blocked => "blocked",
        };
        write!(f, "{s}")
    }
}

/// A unit of user intent, realized as an ordered sequence of steps (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub description: String,
    /// Declarative acceptance criteria, opaque to the core.
    pub acceptance_criteria: Vec<String>,
    pub depends_on: Vec<StoryId>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Carried through from the manifest's optional `passes` flag, opaque to the core.
    #[serde(default)]
    pub manifest_passes: Option<bool>,
    /// Carried through from the manifest's optional `notes` field, opaque to the core.
    #[serde(default)]
    pub manifest_notes: Option<String>,
    pub status: StoryStatus,
    #[serde(default)]
    pub worker_id: Option<WorkerId>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Story-scoped monotonic counter for assigning new step IDs (§4.2 guardrail 4).
    #[serde(default)]
    pub next_step_id: StepId,
}

impl Story {
    /// Create a freshly-manifested story with no steps yet (steps are created
    /// from the default template when the story is claimed, §3 Lifecycle).
    pub fn new(
        id: StoryId,
        title: impl Into<String>,
        description: impl Into<String>,
        acceptance_criteria: Vec<String>,
        depends_on: Vec<StoryId>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            acceptance_criteria,
            depends_on,
            priority: None,
            manifest_passes: None,
            manifest_notes: None,
            status: StoryStatus::Unclaimed,
            worker_id: None,
            claimed_at: None,
            completed_at: None,
            steps: Vec::new(),
            history: Vec::new(),
            next_step_id: 0,
        }
    }

    /// Allocate the next step ID for this story and advance the counter.
    /// IDs never decrease, even across `split`/`add_after` edits.
    pub fn allocate_step_id(&mut self) -> StepId {
        let id = self.next_step_id;
        self.next_step_id += 1;
        id
    }

    /// First step in the sequence with status = pending, in list order.
    pub fn first_pending_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.is_pending())
    }

    pub fn first_pending_step_mut(&mut self) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.is_pending())
    }

    /// The step currently in_progress, if any. §8 invariant: at most one per story.
    pub fn in_progress_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.is_in_progress())
    }

    pub fn in_progress_step_mut(&mut self) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.is_in_progress())
    }

    pub fn step_mut(&mut self, id: StepId) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Steps whose status is still pending, in list order (the "pending suffix"
    /// when the step list is otherwise all-terminal up to that point).
    pub fn pending_step_ids(&self) -> Vec<StepId> {
        self.steps.iter().filter(|s| s.is_pending()).map(|s| s.id).collect()
    }
}
