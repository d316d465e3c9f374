// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identifier.

crate::define_id! {
    /// Identifies a single agent-worker slot. Stable for the lifetime of the
    /// orchestrator process; reused across stories as slots free up.
    pub struct WorkerId;
}
