// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! oj-storage: the persisted state document, its locked access discipline,
//! and the global/per-story scratch files (§4.8, §6, §9).

mod lock;
mod scratch;
mod state;

pub use lock::{FileLock, LockError};
pub use scratch::{ScratchError, ScratchStore};
pub use state::{StateDocument, StateStore, StorageError, SCHEMA_VERSION};
