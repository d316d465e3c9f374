// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only history entries (§3).

use crate::step::StepId;
use crate::worker::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Action tags enumerating story/step lifecycle events and workflow-edit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    StoryClaimed,
    StoryUnblocked,
    StoryBlocked,
    StoryCompleted,
    StoryFailed,
    StepStarted,
    StepCompleted,
    StepFailed,
    StepCancelled,
    StepSkipped,
    /// One entry per accepted edit operation (§4.2).
    WorkflowEdit,
    /// Emitted by reconciliation when an orphaned in-progress step is failed (§4.5, §7).
    Reconciled,
    /// Emitted when the integration rebase fails and a conflict-resolution step is inserted (§4.7).
    IntegrationConflict,
    /// Emitted when a story's work is squash-merged into the base (§4.7).
    Integrated,
}

/// An append-only record of a story/step lifecycle event or accepted workflow edit (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub worker_id: Option<WorkerId>,
    pub step_id: Option<StepId>,
    pub action: HistoryAction,
    #[serde(default)]
    pub details: HashMap<String, Value>,
}

impl HistoryEntry {
    pub fn new(timestamp: DateTime<Utc>, action: HistoryAction) -> Self {
        Self {
            timestamp,
            worker_id: None,
            step_id: None,
            action,
            details: HashMap::new(),
        }
    }

    pub fn with_worker(mut self, worker_id: WorkerId) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    pub fn with_step(mut self, step_id: StepId) -> Self {
        self.step_id = Some(step_id);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}
