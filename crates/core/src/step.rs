// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step identifier, status, and record (§3, §4.1).

use crate::step_kind::StepKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Monotonically increasing ID scoped to a single story. IDs never decrease
/// (§4.2 guardrail 4): a story's `next_step_id` counter only grows.
pub type StepId = u32;

/// Maximum number of times a single step may be restarted (§3, §4.2 guardrail 6).
pub const MAX_RESTART_COUNT: u32 = 3;

/// Maximum total steps a story's step list may hold (§3 invariant d, §4.2 guardrail 5).
pub const MAX_STEPS_PER_STORY: usize = 30;

/// Step lifecycle status (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Skipped,
}

impl StepStatus {
    /// Completed/failed/cancelled/skipped are terminal for that step.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Cancelled | StepStatus::Skipped
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Cancelled => "cancelled",
            StepStatus::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// A single scheduled unit of agent work within a story (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub kind: StepKind,
    pub status: StepStatus,
    /// Human-readable description; may be overwritten by `edit_description` while
    /// pending, or by `restart` while in_progress (§4.2).
    pub description: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Version-control revision recorded when the step first left `pending` (§3 invariant c).
    #[serde(default)]
    pub pre_start_revision: Option<String>,
    /// The agent's structured summary. Non-null iff status = completed (§3 invariant b).
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub restart_count: u32,
    #[serde(default)]
    pub tokens: Option<u64>,
    #[serde(default)]
    pub cost_usd: Option<f64>,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl Step {
    /// Construct a fresh pending step of the given kind with a default description.
    pub fn new(id: StepId, kind: StepKind, description: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            status: StepStatus::Pending,
            description: description.into(),
            started_at: None,
            ended_at: None,
            pre_start_revision: None,
            notes: None,
            error: None,
            skip_reason: None,
            restart_count: 0,
            tokens: None,
            cost_usd: None,
            log_path: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == StepStatus::InProgress
    }
}
