// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injectable clock so prompt composition, timeouts, and history timestamps
//! stay deterministic in tests.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of wall-clock time.
pub trait Clock: Send + Sync + Clone + 'static {
    /// Current time as milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;

    /// Current time as an RFC 3339 timestamp, for history entries and the
    /// state document's `created_at` field.
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        Utc::now().timestamp_millis() as u64
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Controllable clock for deterministic tests.
///
/// Starts at a fixed epoch and only advances when `advance` is called, so
/// history-entry ordering and timeout math can be asserted exactly.
#[derive(Debug, Clone)]
pub struct FakeClock {
    millis: Arc<AtomicI64>,
}

impl Default for FakeClock {
    fn default() -> Self {
        // 2024-01-01T00:00:00Z, an arbitrary but fixed epoch.
        Self::at_epoch_ms(1_704_067_200_000)
    }
}

impl FakeClock {
    pub fn at_epoch_ms(epoch_ms: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(epoch_ms)),
        }
    }

    /// Advance the clock by `ms` milliseconds.
    pub fn advance(&self, ms: i64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn epoch_ms(&self) -> u64 {
        self.millis.load(Ordering::SeqCst) as u64
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
            .unwrap_or_else(Utc::now)
    }
}
