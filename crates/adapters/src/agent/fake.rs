// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake agent adapter for deterministic engine tests.

use super::{AgentAdapter, AgentError, AgentExitStatus, AgentOutcome, AgentSpawnConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Recorded call to [`FakeAgentAdapter::run`].
#[derive(Debug, Clone)]
pub struct AgentCall {
    pub command: String,
    pub prompt: String,
}

/// Programmable, call-recording stand-in for [`AgentAdapter`].
///
/// Queue outcomes with [`FakeAgentAdapter::push_outcome`]; each call to `run`
/// pops the front of the queue. When the queue is empty, `run` returns a
/// successful outcome with an empty summary so tests that don't care about
/// the agent's output don't need to program one.
#[derive(Clone, Default)]
pub struct FakeAgentAdapter {
    inner: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<AgentCall>,
    outcomes: VecDeque<Result<AgentOutcome, String>>,
}

impl FakeAgentAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// Queue a successful outcome for the next `run` call.
    pub fn push_success(&self, summary: impl Into<String>) {
        self.inner.lock().outcomes.push_back(Ok(AgentOutcome {
            exit: AgentExitStatus::Success,
            summary: summary.into(),
            tokens: Some(100),
            cost_usd: Some(0.01),
            log_path: "fake.log".into(),
        }));
    }

    /// Queue a failing outcome (non-timeout) for the next `run` call.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.inner.lock().outcomes.push_back(Ok(AgentOutcome {
            exit: AgentExitStatus::Failure { message: message.into() },
            summary: String::new(),
            tokens: None,
            cost_usd: None,
            log_path: "fake.log".into(),
        }));
    }

    /// Queue a timed-out outcome for the next `run` call.
    pub fn push_timeout(&self) {
        self.inner.lock().outcomes.push_back(Ok(AgentOutcome {
            exit: AgentExitStatus::TimedOut,
            summary: String::new(),
            tokens: None,
            cost_usd: None,
            log_path: "fake.log".into(),
        }));
    }

    /// Queue an adapter-level spawn error for the next `run` call.
    pub fn push_spawn_error(&self, message: impl Into<String>) {
        self.inner.lock().outcomes.push_back(Err(message.into()));
    }
}

#[async_trait]
impl AgentAdapter for FakeAgentAdapter {
    async fn run(&self, config: AgentSpawnConfig, _timeout: Duration) -> Result<AgentOutcome, AgentError> {
        let mut inner = self.inner.lock();
        inner.calls.push(AgentCall { command: config.command.clone(), prompt: config.prompt.clone() });

        match inner.outcomes.pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(AgentError::Spawn(std::io::Error::other(message))),
            None => Ok(AgentOutcome {
                exit: AgentExitStatus::Success,
                summary: String::new(),
                tokens: None,
                cost_usd: None,
                log_path: config.log_path,
            }),
        }
    }
}
