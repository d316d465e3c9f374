// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! oj-daemon: the orchestrator process (`ojd`). Owns the state directory's
//! lock file, wires `oj-engine`'s scheduler to the real process-backed agent
//! adapter and system clock, and runs the main loop to completion (§10.1).

pub mod env;
pub mod lifecycle;
pub mod run;

pub use lifecycle::{Config, DaemonLock, LifecycleError, Startup};
pub use run::{orchestrate, rotate_log_if_needed, setup_logging, RunError, RunRequest};
