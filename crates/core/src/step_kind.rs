// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The ten fixed step kinds and their per-kind policy (timeout, mandatory,
//! edit eligibility).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One of the ten step kinds fixed at initialization (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    ContextGathering,
    Planning,
    Architecture,
    TestArchitecture,
    Coding,
    Linting,
    InitialTesting,
    Review,
    PruneTests,
    FinalReview,
}

impl StepKind {
    /// The default sequence every story starts with when first claimed.
    pub const DEFAULT_SEQUENCE: [StepKind; 10] = [
        StepKind::ContextGathering,
        StepKind::Planning,
        StepKind::Architecture,
        StepKind::TestArchitecture,
        StepKind::Coding,
        StepKind::Linting,
        StepKind::InitialTesting,
        StepKind::Review,
        StepKind::PruneTests,
        StepKind::FinalReview,
    ];

    /// Mandatory kinds that cannot be skipped or removed by any edit (§4.1, §4.2 guardrails 2-3).
    pub fn is_mandatory(self) -> bool {
        matches!(self, StepKind::Linting | StepKind::FinalReview)
    }

    /// `final_review` must always be the last step in the sequence.
    pub fn is_closing(self) -> bool {
        matches!(self, StepKind::FinalReview)
    }

    /// Default timeout for this step kind (Table T1).
    pub fn default_timeout(self) -> Duration {
        let minutes = match self {
            StepKind::ContextGathering => 15,
            StepKind::Planning => 10,
            StepKind::Architecture => 10,
            StepKind::TestArchitecture => 10,
            StepKind::Coding => 30,
            StepKind::Linting => 5,
            StepKind::InitialTesting => 20,
            StepKind::Review => 10,
            StepKind::PruneTests => 10,
            StepKind::FinalReview => 15,
        };
        Duration::from_secs(minutes * 60)
    }

    /// Whether the agent running a step of this kind may request workflow edits (§4.1).
    ///
    /// Every kind allows edits, `final_review` included: the resolved open
    /// question on the restart asymmetry (§4.1) is that `restart` only
    /// revises a pending description and resets status, so a `final_review`
    /// agent restarting itself can never violate "must remain present and
    /// last" — that guardrail is enforced independently in
    /// `guardrails::reject_if_mandatory`/`FinalReviewProtected`, not by
    /// gating this flag.
    pub fn allows_edits(self) -> bool {
        true
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::ContextGathering => "context_gathering",
            StepKind::Planning => "planning",
            StepKind::Architecture => "architecture",
            StepKind::TestArchitecture => "test_architecture",
            StepKind::Coding => "coding",
            StepKind::Linting => "linting",
            StepKind::InitialTesting => "initial_testing",
            StepKind::Review => "review",
            StepKind::PruneTests => "prune_tests",
            StepKind::FinalReview => "final_review",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
