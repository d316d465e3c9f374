// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The step executor (§4.3): runs exactly one step of a story to a terminal
//! outcome, composing crash-consistency into the ordering of its writes
//! rather than into any extra bookkeeping state.

use crate::error::EngineError;
use crate::guardrails::apply_edit_request;
use crate::prompt::compose_prompt;
use oj_adapters::{AgentAdapter, AgentExitStatus, AgentSpawnConfig};
use oj_core::{Clock, EditRequest, HistoryAction, HistoryEntry, StepId, StepStatus, StoryId, StoryStatus, WorkerId};
use oj_storage::{ScratchStore, StateStore, StorageError};
use oj_vcs::GitRepo;
use std::path::{Path, PathBuf};

/// How a single step execution concluded, from the story runner's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// The step was reset to pending by a `restart` edit; the story runner
    /// should loop and pick it up again.
    Restarted,
    /// The step failed or timed out; the parent story is now `failed`.
    StoryFailed,
}

/// Runs one step at a time against a story's isolated workspace (§4.3).
#[derive(Clone)]
pub struct StepExecutor<A: AgentAdapter, C: Clock> {
    agent: A,
    clock: C,
    scratch: ScratchStore,
    command: String,
    env: Vec<(String, String)>,
    log_root: PathBuf,
    drop_box: PathBuf,
}

impl<A: AgentAdapter, C: Clock> StepExecutor<A, C> {
    pub fn new(
        agent: A,
        clock: C,
        scratch: ScratchStore,
        command: impl Into<String>,
        env: Vec<(String, String)>,
        log_root: impl Into<PathBuf>,
        drop_box: impl Into<PathBuf>,
    ) -> Self {
        Self {
            agent,
            clock,
            scratch,
            command: command.into(),
            env,
            log_root: log_root.into(),
            drop_box: drop_box.into(),
        }
    }

    fn log_path(&self, story_id: &StoryId, step_id: StepId) -> PathBuf {
        self.log_root.join(story_id.as_str()).join(format!("step-{step_id}.log"))
    }

    fn diagnostic_path(&self, story_id: &StoryId, step_id: StepId) -> PathBuf {
        self.log_root.join("diagnostics").join(story_id.as_str()).join(format!("step-{step_id}.diff"))
    }

    fn drop_box_path(&self, story_id: &StoryId) -> PathBuf {
        self.drop_box.join(format!("{story_id}.json"))
    }

    /// Consume this story's pending edit-request file, if any (§6 "Edit-request drop box").
    fn take_edit_request(&self, story_id: &StoryId) -> Result<Option<EditRequest>, EngineError> {
        let path = self.drop_box_path(story_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| EngineError::Internal(format!("could not read edit request at {}: {e}", path.display())))?;
        let request: EditRequest = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Internal(format!("malformed edit request at {}: {e}", path.display())))?;
        let _ = std::fs::remove_file(&path);
        Ok(Some(request))
    }

    async fn save_diagnostic_diff(&self, path: &Path, diff: &str) -> Result<(), EngineError> {
        if diff.trim().is_empty() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::Internal(format!("could not create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(path, diff)
            .await
            .map_err(|e| EngineError::Internal(format!("could not write {}: {e}", path.display())))?;
        Ok(())
    }

    /// Run the story's step `step_id` to completion (§4.3 steps 1-6).
    pub async fn run_step(
        &self,
        state: &StateStore,
        repo: &GitRepo,
        story_id: &StoryId,
        step_id: StepId,
        worker_id: &WorkerId,
    ) -> Result<StepOutcome, EngineError> {
        let pre_start_revision = repo.rev_parse_head().await?;
        let start_time = self.clock.now();

        // Step 1: under the lock, capture pre-start revision and transition pending -> in_progress.
        state.mutate(|doc| {
            let story = doc.try_story_mut(story_id)?;
            let step = story
                .step_mut(step_id)
                .ok_or_else(|| StorageError::UnknownStory(format!("{story_id}/{step_id}")))?;
            step.status = StepStatus::InProgress;
            step.started_at = Some(start_time);
            step.pre_start_revision = Some(pre_start_revision.clone());
            story.history.push(
                HistoryEntry::new(start_time, HistoryAction::StepStarted)
                    .with_worker(worker_id.clone())
                    .with_step(step_id),
            );
            Ok(())
        })?;

        // Step 2: compose the prompt from a fresh (unlocked) read.
        let doc = state.load()?;
        let story = doc.story(story_id).ok_or_else(|| EngineError::UnknownStory(story_id.clone()))?;
        let step = story
            .step(step_id)
            .ok_or_else(|| EngineError::UnknownStep { story: story_id.clone(), step: step_id })?;
        let kind = step.kind;
        let timeout = kind.default_timeout();
        let global_scratch = self.scratch.read_global()?;
        let story_scratch = self.scratch.read_story(story_id)?;
        let prompt = compose_prompt(story, step, &global_scratch, &story_scratch);

        // Step 3-4: launch the agent and collect its outcome.
        let log_path = self.log_path(story_id, step_id);
        let config = AgentSpawnConfig {
            command: self.command.clone(),
            env: self.env.clone(),
            workspace_path: repo.root().to_path_buf(),
            prompt,
            log_path,
        };
        let outcome = self.agent.run(config, timeout).await?;

        // Step 5-6: edit requests from a failed step are discarded, never
        // applied, and likewise for a step kind whose agent is not permitted
        // to request workflow edits at all (§4.1's per-kind edit-eligibility
        // flag). For a successful, edit-eligible step, applying the pending
        // edit request (if any) and transitioning the originating step happen
        // inside the same locked `mutate` closure: an observer must never see
        // the edit applied while this step still reads in_progress, or the
        // reverse (spec's ordering guarantee that edit application and the
        // requesting step's status transition are atomic with respect to
        // observers).
        let end_time = self.clock.now();
        match outcome.exit {
            AgentExitStatus::Success => {
                let pending_edit = if kind.allows_edits() { self.take_edit_request(story_id)? } else { None };

                // Determine up front, against a disposable draft, whether this
                // edit resolves to a restart. §4.3 "On restart" runs the
                // diff-save + reset *before* restart_count is incremented and
                // the step is persisted back to pending, so that a crash in
                // between leaves the step still `in_progress` (caught by
                // reconciliation) rather than `pending` over an un-reset
                // workspace. The draft result is discarded; the authoritative
                // apply happens again inside `state.mutate` below.
                let will_restart = if let Some(request) = &pending_edit {
                    let doc = state.load()?;
                    doc.story(story_id)
                        .map(|story| {
                            let mut draft = story.clone();
                            apply_edit_request(&mut draft, request, worker_id, &self.clock).is_ok()
                                && request
                                    .operations
                                    .iter()
                                    .any(|op| matches!(op, oj_core::EditOperation::Restart { .. }))
                        })
                        .unwrap_or(false)
                } else {
                    false
                };

                if will_restart {
                    let diff = repo.diff_including_untracked().await?;
                    self.save_diagnostic_diff(&self.diagnostic_path(story_id, step_id), &diff).await?;
                    repo.reset_hard(&pre_start_revision).await?;
                }

                let mut restarted = false;
                let mut rejected_reason: Option<String> = None;

                state.mutate(|doc| {
                    let story = doc.try_story_mut(story_id)?;

                    if let Some(request) = &pending_edit {
                        match apply_edit_request(story, request, worker_id, &self.clock) {
                            Ok(()) => {
                                restarted = request
                                    .operations
                                    .iter()
                                    .any(|op| matches!(op, oj_core::EditOperation::Restart { .. }));
                            }
                            Err(e) => rejected_reason = Some(e.to_string()),
                        }
                    }

                    if !restarted {
                        let step = story
                            .step_mut(step_id)
                            .ok_or_else(|| StorageError::UnknownStory(format!("{story_id}/{step_id}")))?;
                        step.status = StepStatus::Completed;
                        step.ended_at = Some(end_time);
                        step.notes = Some(outcome.summary.clone());
                        step.tokens = outcome.tokens;
                        step.cost_usd = outcome.cost_usd;
                        step.log_path = Some(outcome.log_path.clone());
                        story.history.push(
                            HistoryEntry::new(end_time, HistoryAction::StepCompleted)
                                .with_worker(worker_id.clone())
                                .with_step(step_id),
                        );
                    }
                    Ok(())
                })?;

                if let Some(reason) = rejected_reason {
                    self.scratch.append_story(story_id, &format!("Edit request rejected: {reason}"))?;
                }

                if restarted {
                    return Ok(StepOutcome::Restarted);
                }

                Ok(StepOutcome::Completed)
            }
            AgentExitStatus::Failure { message } | AgentExitStatus::TimedOut => {
                let timed_out = matches!(outcome.exit, AgentExitStatus::TimedOut);
                let diff = repo.diff_including_untracked().await?;
                self.save_diagnostic_diff(&self.diagnostic_path(story_id, step_id), &diff).await?;
                repo.reset_hard(&pre_start_revision).await?;
                let failure_message = if timed_out { "step timed out".to_string() } else { message };
                // §4.3 step 6(d): failures are recorded in the global scratch,
                // not the story's own — the story-scratch write above is for
                // rejected *edit requests*, a different spec'd write target.
                self.scratch.append_global(&format!("Step {step_id} ({kind}) failed: {failure_message}"))?;

                state.mutate(|doc| {
                    let story = doc.try_story_mut(story_id)?;
                    let step = story
                        .step_mut(step_id)
                        .ok_or_else(|| StorageError::UnknownStory(format!("{story_id}/{step_id}")))?;
                    step.status = if timed_out { StepStatus::Cancelled } else { StepStatus::Failed };
                    step.ended_at = Some(end_time);
                    step.error = Some(failure_message.clone());
                    let step_action =
                        if timed_out { HistoryAction::StepCancelled } else { HistoryAction::StepFailed };
                    story.history.push(
                        HistoryEntry::new(end_time, step_action).with_worker(worker_id.clone()).with_step(step_id),
                    );
                    story.status = StoryStatus::Failed;
                    story.history.push(
                        HistoryEntry::new(end_time, HistoryAction::StoryFailed)
                            .with_worker(worker_id.clone())
                            .with_detail("reason", failure_message.clone()),
                    );
                    Ok(())
                })?;
                Ok(StepOutcome::StoryFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oj_adapters::FakeAgentAdapter;
    use oj_core::{FakeClock, Step, StepKind, Story};
    use oj_storage::StateDocument;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn init_repo(dir: &Path) -> GitRepo {
        let repo = GitRepo::new(dir);
        tokio::process::Command::new("git").args(["init", "-q", "-b", "main"]).current_dir(dir).output().await.unwrap();
        tokio::process::Command::new("git").args(["config", "user.email", "t@example.com"]).current_dir(dir).output().await.unwrap();
        tokio::process::Command::new("git").args(["config", "user.name", "T"]).current_dir(dir).output().await.unwrap();
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        tokio::process::Command::new("git").args(["add", "."]).current_dir(dir).output().await.unwrap();
        tokio::process::Command::new("git").args(["commit", "-q", "-m", "init"]).current_dir(dir).output().await.unwrap();
        repo
    }

    fn fixture(dir: &TempDir) -> (StateStore, StoryId, WorkerId) {
        let story_id = StoryId::new("s1");
        let worker_id = WorkerId::new("w1");
        let mut story = Story::new(story_id.clone(), "Title", "Desc", vec!["crit".into()], vec![]);
        story.worker_id = Some(worker_id.clone());
        story.status = StoryStatus::InProgress;
        for kind in [StepKind::Coding, StepKind::Linting, StepKind::FinalReview] {
            let id = story.allocate_step_id();
            story.steps.push(Step::new(id, kind, format!("{kind} step")));
        }
        let state = StateStore::new(dir.path().join("state.json"), Duration::from_millis(500));
        state
            .initialize(&StateDocument::new(PathBuf::from("m.json"), vec![story], FakeClock::default().now()))
            .unwrap();
        (state, story_id, worker_id)
    }

    #[tokio::test]
    async fn successful_step_is_marked_completed_with_notes() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path()).await;
        let (state, story_id, worker_id) = fixture(&dir);

        let agent = FakeAgentAdapter::new();
        agent.push_success("implemented the thing");
        let executor = StepExecutor::new(
            agent,
            FakeClock::default(),
            ScratchStore::new(dir.path().join("scratch-root")),
            "agent",
            vec![],
            dir.path().join("logs"),
            dir.path().join("dropbox"),
        );

        let outcome = executor.run_step(&state, &repo, &story_id, 0, &worker_id).await.unwrap();
        assert_eq!(outcome, StepOutcome::Completed);

        let doc = state.load().unwrap();
        let step = doc.story(&story_id).unwrap().step(0).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.notes.as_deref(), Some("implemented the thing"));
    }

    #[tokio::test]
    async fn failed_step_resets_workspace_and_fails_story() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path()).await;
        let (state, story_id, worker_id) = fixture(&dir);
        std::fs::write(dir.path().join("untracked.txt"), "scratch work\n").unwrap();

        let agent = FakeAgentAdapter::new();
        agent.push_failure("tests failed");
        let executor = StepExecutor::new(
            agent,
            FakeClock::default(),
            ScratchStore::new(dir.path().join("scratch-root")),
            "agent",
            vec![],
            dir.path().join("logs"),
            dir.path().join("dropbox"),
        );

        let outcome = executor.run_step(&state, &repo, &story_id, 0, &worker_id).await.unwrap();
        assert_eq!(outcome, StepOutcome::StoryFailed);

        let doc = state.load().unwrap();
        let story = doc.story(&story_id).unwrap();
        assert_eq!(story.status, StoryStatus::Failed);
        assert_eq!(story.step(0).unwrap().status, StepStatus::Failed);
        assert!(!dir.path().join("untracked.txt").exists());
    }

    #[tokio::test]
    async fn restart_edit_resets_step_to_pending_via_guardrails() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path()).await;
        let (state, story_id, worker_id) = fixture(&dir);

        state
            .mutate(|doc| {
                let story = doc.try_story_mut(&story_id)?;
                story.step_mut(0).unwrap().status = StepStatus::InProgress;
                Ok(())
            })
            .unwrap();

        let dropbox = dir.path().join("dropbox");
        std::fs::create_dir_all(&dropbox).unwrap();
        std::fs::write(
            dropbox.join("s1.json"),
            serde_json::json!({
                "operations": [{"operation": "restart", "new_description": "try again", "reason": "flaky"}]
            })
            .to_string(),
        )
        .unwrap();

        let agent = FakeAgentAdapter::new();
        agent.push_success("ran, but wants a restart");
        let executor = StepExecutor::new(
            agent,
            FakeClock::default(),
            ScratchStore::new(dir.path().join("scratch-root")),
            "agent",
            vec![],
            dir.path().join("logs"),
            dropbox,
        );

        let outcome = executor.run_step(&state, &repo, &story_id, 0, &worker_id).await.unwrap();
        assert_eq!(outcome, StepOutcome::Restarted);

        let doc = state.load().unwrap();
        let step = doc.story(&story_id).unwrap().step(0).unwrap();
        assert_eq!(step.status, StepStatus::Pending);
        assert_eq!(step.restart_count, 1);
        assert_eq!(step.description, "try again");
    }

    #[tokio::test]
    async fn accepted_edit_and_step_completion_land_in_the_same_write() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path()).await;
        let (state, story_id, worker_id) = fixture(&dir);

        let dropbox = dir.path().join("dropbox");
        std::fs::create_dir_all(&dropbox).unwrap();
        std::fs::write(
            dropbox.join("s1.json"),
            serde_json::json!({
                "operations": [{
                    "operation": "add_after",
                    "after_step": 0,
                    "new_steps": [{"kind": "coding", "description": "follow-up work"}],
                    "reason": "more work discovered"
                }]
            })
            .to_string(),
        )
        .unwrap();

        let agent = FakeAgentAdapter::new();
        agent.push_success("done, and filed a follow-up");
        let executor = StepExecutor::new(
            agent,
            FakeClock::default(),
            ScratchStore::new(dir.path().join("scratch-root")),
            "agent",
            vec![],
            dir.path().join("logs"),
            dropbox,
        );

        let outcome = executor.run_step(&state, &repo, &story_id, 0, &worker_id).await.unwrap();
        assert_eq!(outcome, StepOutcome::Completed);

        // The write that lands on disk is the single post-mutate state: the
        // originating step is Completed *and* the new step from the edit is
        // present. No observer could ever have read a document with one but
        // not the other, since both came from one `mutate` call.
        let doc = state.load().unwrap();
        let story = doc.story(&story_id).unwrap();
        assert_eq!(story.step(0).unwrap().status, StepStatus::Completed);
        assert!(story.steps.iter().any(|s| s.description == "follow-up work"));
    }

    #[tokio::test]
    async fn failure_is_recorded_in_global_scratch_not_story_scratch() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path()).await;
        let (state, story_id, worker_id) = fixture(&dir);

        let agent = FakeAgentAdapter::new();
        agent.push_failure("tests failed");
        let scratch = ScratchStore::new(dir.path().join("scratch-root"));
        let executor = StepExecutor::new(
            agent,
            FakeClock::default(),
            scratch.clone(),
            "agent",
            vec![],
            dir.path().join("logs"),
            dir.path().join("dropbox"),
        );

        executor.run_step(&state, &repo, &story_id, 0, &worker_id).await.unwrap();

        assert!(scratch.read_global().unwrap().contains("tests failed"));
        assert!(!scratch.read_story(&story_id).unwrap().contains("tests failed"));
    }
}
