// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workflow editor's guardrail algebra (§4.2): pure, in-memory validation
//! and application of an [`EditRequest`] against a [`Story`].
//!
//! All nine guardrails are enforced per edit file, all-or-nothing: every
//! operation in the request is validated against a draft copy of the story
//! before any of them is committed. A rejection never mutates the caller's
//! story.

use oj_core::{
    Clock, EditOperation, EditRequest, HistoryAction, HistoryEntry, Step, StepId, StepKind,
    StepStatus, Story, WorkerId, MAX_RESTART_COUNT, MAX_STEPS_PER_STORY,
};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardrailError {
    #[error("story {story} is assigned to a different worker than requester {requester}")]
    NotAssignedWorker { story: String, requester: String },
    #[error("step {0} is not pending")]
    StepNotPending(StepId),
    #[error("unknown step id: {0}")]
    UnknownStep(StepId),
    #[error("story has no in_progress step to restart")]
    NoInProgressStep,
    #[error("final_review must remain present and last; {operation} on it is forbidden")]
    FinalReviewProtected { operation: &'static str },
    #[error("linting must remain present; {operation} on it is forbidden")]
    LintingProtected { operation: &'static str },
    #[error("adding {adding} step(s) would bring story {story} to {total}, exceeding the {MAX_STEPS_PER_STORY}-step cap")]
    TooManySteps { story: String, total: usize, adding: usize },
    #[error("restart_count is already at the {MAX_RESTART_COUNT} cap")]
    RestartCapReached,
    #[error("reorder must be an exact permutation of the current pending step ids, with final_review last")]
    InvalidReorder,
    #[error("split must replace a step with at least two new steps")]
    InvalidSplit,
}

/// Validate and apply every operation in `request` against `story`,
/// atomically: either all operations are committed, or none are and
/// `story` is left exactly as it was (guardrail 9).
pub fn apply_edit_request<C: Clock>(
    story: &mut Story,
    request: &EditRequest,
    requesting_worker: &WorkerId,
    clock: &C,
) -> Result<(), GuardrailError> {
    // Guardrail 8: only the story's assigned worker may submit edits.
    if story.worker_id.as_ref() != Some(requesting_worker) {
        return Err(GuardrailError::NotAssignedWorker {
            story: story.id.to_string(),
            requester: requesting_worker.to_string(),
        });
    }

    // Work on a draft so a mid-request failure never touches the original.
    let mut draft = story.clone();
    for operation in &request.operations {
        let target = apply_operation(&mut draft, operation)?;
        let now = clock.now();
        let mut entry = HistoryEntry::new(now, HistoryAction::WorkflowEdit)
            .with_worker(requesting_worker.clone())
            .with_detail("operation", operation.operation_name())
            .with_detail("reason", operation.reason());
        if let Some(step_id) = target {
            entry = entry.with_step(step_id);
        }
        draft.history.push(entry);
    }

    *story = draft;
    Ok(())
}

fn apply_operation(story: &mut Story, operation: &EditOperation) -> Result<Option<StepId>, GuardrailError> {
    match operation {
        EditOperation::AddAfter { after_step, new_steps, .. } => {
            let anchor_index = story
                .steps
                .iter()
                .position(|s| s.id == *after_step)
                .ok_or(GuardrailError::UnknownStep(*after_step))?;
            if story.steps[anchor_index].kind.is_closing() {
                return Err(GuardrailError::FinalReviewProtected { operation: "add_after" });
            }
            check_step_cap(story, new_steps.len())?;
            let mut inserted = Vec::with_capacity(new_steps.len());
            for spec in new_steps {
                let id = story.allocate_step_id();
                inserted.push(Step::new(id, spec.kind, spec.description.clone()));
            }
            let insert_at = anchor_index + 1;
            for (offset, step) in inserted.into_iter().enumerate() {
                story.steps.insert(insert_at + offset, step);
            }
            Ok(Some(*after_step))
        }
        EditOperation::Split { target_step, new_steps, .. } => {
            if new_steps.len() < 2 {
                return Err(GuardrailError::InvalidSplit);
            }
            let index = pending_step_index(story, *target_step)?;
            reject_if_mandatory(story.steps[index].kind, "split")?;
            check_step_cap(story, new_steps.len().saturating_sub(1))?;
            let mut replacements = Vec::with_capacity(new_steps.len());
            for spec in new_steps {
                let id = story.allocate_step_id();
                replacements.push(Step::new(id, spec.kind, spec.description.clone()));
            }
            story.steps.splice(index..=index, replacements);
            Ok(Some(*target_step))
        }
        EditOperation::Skip { target_step, reason } => {
            let index = pending_step_index(story, *target_step)?;
            reject_if_mandatory(story.steps[index].kind, "skip")?;
            story.steps[index].status = StepStatus::Skipped;
            story.steps[index].skip_reason = Some(reason.clone());
            Ok(Some(*target_step))
        }
        EditOperation::Reorder { new_order, .. } => {
            apply_reorder(story, new_order)?;
            Ok(None)
        }
        EditOperation::EditDescription { target_step, new_description, .. } => {
            let index = pending_step_index(story, *target_step)?;
            story.steps[index].description = new_description.clone();
            Ok(Some(*target_step))
        }
        EditOperation::Restart { new_description, .. } => {
            let step = story.in_progress_step_mut().ok_or(GuardrailError::NoInProgressStep)?;
            if step.restart_count >= MAX_RESTART_COUNT {
                return Err(GuardrailError::RestartCapReached);
            }
            step.description = new_description.clone();
            step.status = StepStatus::Pending;
            step.restart_count += 1;
            Ok(Some(step.id))
        }
    }
}

fn pending_step_index(story: &Story, id: StepId) -> Result<usize, GuardrailError> {
    let index = story.steps.iter().position(|s| s.id == id).ok_or(GuardrailError::UnknownStep(id))?;
    if !story.steps[index].is_pending() {
        return Err(GuardrailError::StepNotPending(id));
    }
    Ok(index)
}

fn reject_if_mandatory(kind: StepKind, operation: &'static str) -> Result<(), GuardrailError> {
    if kind.is_closing() {
        return Err(GuardrailError::FinalReviewProtected { operation });
    }
    if kind.is_mandatory() {
        return Err(GuardrailError::LintingProtected { operation });
    }
    Ok(())
}

fn check_step_cap(story: &Story, adding: usize) -> Result<(), GuardrailError> {
    let total = story.steps.len() + adding;
    if total > MAX_STEPS_PER_STORY {
        return Err(GuardrailError::TooManySteps { story: story.id.to_string(), total, adding });
    }
    Ok(())
}

fn apply_reorder(story: &mut Story, new_order: &[StepId]) -> Result<(), GuardrailError> {
    let pending_indices: Vec<usize> =
        story.steps.iter().enumerate().filter(|(_, s)| s.is_pending()).map(|(i, _)| i).collect();

    if new_order.len() != pending_indices.len() {
        return Err(GuardrailError::InvalidReorder);
    }
    let current: HashSet<StepId> = pending_indices.iter().map(|&i| story.steps[i].id).collect();
    let requested: HashSet<StepId> = new_order.iter().copied().collect();
    if current != requested {
        return Err(GuardrailError::InvalidReorder);
    }
    if let Some(final_review_id) =
        pending_indices.iter().map(|&i| &story.steps[i]).find(|s| s.kind.is_closing()).map(|s| s.id)
    {
        if new_order.last() != Some(&final_review_id) {
            return Err(GuardrailError::InvalidReorder);
        }
    }

    let mut by_id: std::collections::HashMap<StepId, Step> = pending_indices
        .iter()
        .map(|&i| story.steps[i].id)
        .zip(pending_indices.iter().map(|&i| story.steps[i].clone()))
        .collect();
    for (&slot, id) in pending_indices.iter().zip(new_order.iter()) {
        if let Some(step) = by_id.remove(id) {
            story.steps[slot] = step;
        }
    }
    Ok(())
}
