// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! oj-adapters: the coding-agent process adapter (§4.3 steps 3-4).

pub mod agent;

pub use agent::{
    AgentAdapter, AgentError, AgentExitStatus, AgentOutcome, AgentSpawnConfig, ProcessAgentAdapter,
};

#[cfg(any(test, feature = "test-support"))]
pub use agent::{AgentCall, FakeAgentAdapter};
