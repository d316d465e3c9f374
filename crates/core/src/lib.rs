// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! oj-core: pure data types for the Odd Jobs (oj) story/step workflow engine.
//!
//! No I/O lives here. Story, Step, HistoryEntry, and EditRequest are plain
//! data; the state store, scratch layer, executor, and scheduler that give
//! them meaning live in `oj-storage` and `oj-engine`.

pub mod clock;
pub mod edit;
pub mod history;
pub mod id;
pub mod step;
pub mod step_kind;
pub mod story;
pub mod worker;

pub use clock::{Clock, SystemClock};
pub use edit::{EditOperation, EditRequest, NewStepSpec};
pub use history::{HistoryAction, HistoryEntry};
pub use id::ShortId;
pub use step::{Step, StepId, StepStatus, MAX_RESTART_COUNT, MAX_STEPS_PER_STORY};
pub use step_kind::StepKind;
pub use story::{Story, StoryId, StoryStatus};
pub use worker::WorkerId;

#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
