//! Per-line disposition state
//!
//! Modelled as a tagged union so illegal states are unconstructible:
//! a duplicate-flagged line has no selection flag and no override slot
//! at all, and matched/unmatched payloads carry exactly the state
//! valid for their category.

use serde::{Deserialize, Serialize};

use crate::types::OverrideAssignment;

/// Classification a line received from the match set partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Auto,
    Suggested,
    Unmatched,
    SkippedDuplicate,
}

/// Mutable decision state for one matched line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedState {
    /// The proposed ledger entry from the match set
    pub entry_id: String,
    /// Confidence the matcher assigned to the pairing
    pub score: f64,
    pub selected: bool,
    /// Manual assignment replacing the proposed pairing; once present
    /// the line commits like an unmatched line with an override
    pub assignment: Option<OverrideAssignment>,
}

/// Mutable decision state for one unmatched line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedState {
    pub selected: bool,
    /// Selection stays disabled until this assignment is complete
    pub assignment: Option<OverrideAssignment>,
}

/// The full disposition of one statement line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Disposition {
    Auto(MatchedState),
    Suggested(MatchedState),
    Unmatched(UnmatchedState),
    /// Terminal: never selectable, never overridable, reported in
    /// totals for transparency only
    SkippedDuplicate,
}

impl Disposition {
    pub fn category(&self) -> Category {
        match self {
            Disposition::Auto(_) => Category::Auto,
            Disposition::Suggested(_) => Category::Suggested,
            Disposition::Unmatched(_) => Category::Unmatched,
            Disposition::SkippedDuplicate => Category::SkippedDuplicate,
        }
    }

    pub fn selected(&self) -> bool {
        match self {
            Disposition::Auto(s) | Disposition::Suggested(s) => s.selected,
            Disposition::Unmatched(s) => s.selected,
            Disposition::SkippedDuplicate => false,
        }
    }

    /// The manual assignment currently attached, if any.
    pub fn assignment(&self) -> Option<&OverrideAssignment> {
        match self {
            Disposition::Auto(s) | Disposition::Suggested(s) => s.assignment.as_ref(),
            Disposition::Unmatched(s) => s.assignment.as_ref(),
            Disposition::SkippedDuplicate => None,
        }
    }

    /// Whether the line currently resolves to a commit target.
    ///
    /// A matched line resolves through its proposed entry unless an
    /// override is present, in which case the override must be
    /// complete. An unmatched line resolves only through a complete
    /// override. A skipped duplicate never resolves.
    pub fn has_resolvable_target(&self) -> bool {
        match self {
            Disposition::Auto(s) | Disposition::Suggested(s) => match &s.assignment {
                Some(a) => a.is_complete(),
                None => true,
            },
            Disposition::Unmatched(s) => {
                s.assignment.as_ref().is_some_and(|a| a.is_complete())
            }
            Disposition::SkippedDuplicate => false,
        }
    }
}

/// Derived commit-eligibility signal for one session.
///
/// `incomplete_count` counts lines selected without a resolvable
/// target. The tracker's mutation rules make that state unreachable,
/// but it is recomputed defensively on every call rather than trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReadiness {
    pub ready_count: usize,
    pub incomplete_count: usize,
    pub can_commit: bool,
}
