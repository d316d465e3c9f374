// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The story runner (§4.4): drives one story's step sequence, delegating
//! each step to the [`StepExecutor`], until the story completes or fails.

use crate::error::EngineError;
use crate::executor::{StepExecutor, StepOutcome};
use oj_adapters::AgentAdapter;
use oj_core::{Clock, HistoryAction, HistoryEntry, StepStatus, StoryId, StoryStatus, WorkerId};
use oj_storage::StateStore;
use oj_vcs::GitRepo;

/// Terminal outcome of driving a story to the end of its step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryOutcome {
    Completed,
    Failed,
}

pub struct StoryRunner<A: AgentAdapter, C: Clock> {
    executor: StepExecutor<A, C>,
    clock: C,
}

impl<A: AgentAdapter, C: Clock> StoryRunner<A, C> {
    pub fn new(executor: StepExecutor<A, C>, clock: C) -> Self {
        Self { executor, clock }
    }

    /// Drive `story_id` to a terminal status, one step at a time.
    pub async fn run(
        &self,
        state: &StateStore,
        repo: &GitRepo,
        story_id: &StoryId,
        worker_id: &WorkerId,
    ) -> Result<StoryOutcome, EngineError> {
        loop {
            let doc = state.load()?;
            let story = doc.story(story_id).ok_or_else(|| EngineError::UnknownStory(story_id.clone()))?;

            let Some(step) = story.first_pending_step() else {
                return self.finish(state, story_id, worker_id, story.steps.last().map(|s| s.is_completed_closing()));
            };
            let step_id = step.id;

            match self.executor.run_step(state, repo, story_id, step_id, worker_id).await? {
                StepOutcome::Completed | StepOutcome::Restarted => continue,
                StepOutcome::StoryFailed => return Ok(StoryOutcome::Failed),
            }
        }
    }

    async fn finish(
        &self,
        state: &StateStore,
        story_id: &StoryId,
        worker_id: &WorkerId,
        closed_properly: Option<bool>,
    ) -> Result<StoryOutcome, EngineError> {
        let now = self.clock.now();
        if closed_properly == Some(true) {
            state.mutate(|doc| {
                let story = doc.try_story_mut(story_id)?;
                story.status = StoryStatus::Completed;
                story.completed_at = Some(now);
                story.history.push(
                    HistoryEntry::new(now, HistoryAction::StoryCompleted).with_worker(worker_id.clone()),
                );
                Ok(())
            })?;
            Ok(StoryOutcome::Completed)
        } else {
            state.mutate(|doc| {
                let story = doc.try_story_mut(story_id)?;
                story.status = StoryStatus::Failed;
                story.history.push(
                    HistoryEntry::new(now, HistoryAction::StoryFailed)
                        .with_worker(worker_id.clone())
                        .with_detail("reason", "no pending steps remain and final_review is not completed"),
                );
                Ok(())
            })?;
            Ok(StoryOutcome::Failed)
        }
    }
}

trait ClosingStep {
    fn is_completed_closing(&self) -> bool;
}

impl ClosingStep for oj_core::Step {
    fn is_completed_closing(&self) -> bool {
        self.kind.is_closing() && self.status == StepStatus::Completed
    }
}
