// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Edit requests: transient documents describing workflow mutations (§3, §4.2, §6).
//!
//! An edit request is consumed once by the orchestrator and is never part of
//! persisted state; only the `WorkflowEdit` history entries it produces survive.

use crate::step::StepId;
use crate::step_kind::StepKind;
use serde::{Deserialize, Serialize};

/// Specification for a brand-new step created by `add_after` or `split`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStepSpec {
    pub kind: StepKind,
    pub description: String,
}

/// One requested mutation of a story's remaining workflow (§4.2).
///
/// Every variant carries a `reason`, required by guardrail 9 so that a
/// rejection (or, for `skip`, the recorded motivation) can be written back to
/// the story scratch for the next step to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum EditOperation {
    /// Insert one or more new steps immediately after an existing step.
    AddAfter {
        after_step: StepId,
        new_steps: Vec<NewStepSpec>,
        reason: String,
    },
    /// Replace a pending step with two or more new steps.
    Split {
        target_step: StepId,
        new_steps: Vec<NewStepSpec>,
        reason: String,
    },
    /// Mark a pending step skipped with a reason. Forbidden on mandatory kinds.
    Skip { target_step: StepId, reason: String },
    /// Permute the pending-step suffix. Must be a permutation of exactly the
    /// current pending step IDs, with `final_review` last.
    Reorder { new_order: Vec<StepId>, reason: String },
    /// Change a pending step's description.
    EditDescription {
        target_step: StepId,
        new_description: String,
        reason: String,
    },
    /// Revise the in-progress step's description and reset it to pending.
    /// The target is always the story's current in_progress step.
    Restart { new_description: String, reason: String },
}

impl EditOperation {
    pub fn reason(&self) -> &str {
        match self {
            EditOperation::AddAfter { reason, .. }
            | EditOperation::Split { reason, .. }
            | EditOperation::Skip { reason, .. }
            | EditOperation::Reorder { reason, .. }
            | EditOperation::EditDescription { reason, .. }
            | EditOperation::Restart { reason, .. } => reason,
        }
    }

    pub fn operation_name(&self) -> &'static str {
        match self {
            EditOperation::AddAfter { .. } => "add_after",
            EditOperation::Split { .. } => "split",
            EditOperation::Skip { .. } => "skip",
            EditOperation::Reorder { .. } => "reorder",
            EditOperation::EditDescription { .. } => "edit_description",
            EditOperation::Restart { .. } => "restart",
        }
    }
}

/// A transient, agent-authored document requesting a sequence of workflow
/// mutations for one story. Validated and applied all-or-nothing (§4.2 guardrail 9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRequest {
    pub operations: Vec<EditOperation>,
}
