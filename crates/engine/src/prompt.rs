// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt composition (§4.3 step 2): each step is a fresh agent invocation,
//! so everything the agent needs to know is assembled from durable state
//! rather than carried in conversation memory.

use oj_core::{Step, StepKind, StepStatus, Story};

/// Kind-specific instructions prefixed to every prompt for a step of that kind.
fn kind_instructions(kind: StepKind) -> &'static str {
    match kind {
        StepKind::ContextGathering => {
            "Explore the repository and summarize the context relevant to this story. Do not write code yet."
        }
        StepKind::Planning => "Produce a concrete implementation plan for this story.",
        StepKind::Architecture => "Design the module/type structure needed before writing code.",
        StepKind::TestArchitecture => "Design the test strategy and fixtures needed to validate this story.",
        StepKind::Coding => "Implement the story per the plan and architecture from prior steps.",
        StepKind::Linting => "Run and satisfy the project's lint/format checks; fix any violations.",
        StepKind::InitialTesting => "Run the test suite and fix any failures introduced by this story.",
        StepKind::Review => "Review the change for correctness, clarity, and adherence to the acceptance criteria.",
        StepKind::PruneTests => "Remove redundant or low-value tests added along the way; keep coverage meaningful.",
        StepKind::FinalReview => {
            "Perform a final review confirming every acceptance criterion is met. This is the last step of the story."
        }
    }
}

/// Assemble the full prompt for one step execution: kind instructions, the
/// story's description and acceptance criteria, the step's own (possibly
/// edited) description, the notes of every completed prior step in order,
/// and the global and per-story scratch contents (§4.3 step 2, §5 ordering
/// guarantee 1).
pub fn compose_prompt(story: &Story, step: &Step, global_scratch: &str, story_scratch: &str) -> String {
    let mut sections = Vec::new();

    sections.push(format!("# Step: {}\n{}", step.kind, kind_instructions(step.kind)));

    sections.push(format!(
        "# Story: {}\n{}\n\nAcceptance criteria:\n{}",
        story.title,
        story.description,
        bulleted(&story.acceptance_criteria),
    ));

    sections.push(format!("# This step's instructions\n{}", step.description));

    let prior_notes = completed_notes(story);
    if !prior_notes.is_empty() {
        sections.push(format!("# Notes from prior steps\n{}", prior_notes.join("\n\n")));
    }

    if !global_scratch.trim().is_empty() {
        sections.push(format!("# Global scratch\n{}", global_scratch.trim()));
    }

    if !story_scratch.trim().is_empty() {
        sections.push(format!("# Story scratch\n{}", story_scratch.trim()));
    }

    sections.join("\n\n")
}

/// Notes of every completed step, in the story's step-list order (§5
/// ordering guarantee 1).
fn completed_notes(story: &Story) -> Vec<String> {
    story
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .filter_map(|s| s.notes.as_deref())
        .map(|notes| notes.to_string())
        .collect()
}

fn bulleted(items: &[String]) -> String {
    if items.is_empty() {
        return "(none declared)".to_string();
    }
    items.iter().map(|item| format!("- {item}")).collect::<Vec<_>>().join("\n")
}
