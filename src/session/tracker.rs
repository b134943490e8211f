//! Disposition tracking for one reconciliation session
//!
//! The tracker owns the evolving decision state for one match set and
//! derives the single commit-eligibility signal the commit engine
//! consumes. One session is single-writer, but racing callers (two UI
//! actions) are serialized by a mutex so a reader never observes a
//! half-applied mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::disposition::{
    CommitReadiness, Disposition, MatchedState, UnmatchedState,
};
use crate::traits::{ApplyItem, ApplyTarget};
use crate::types::{
    LedgerSide, MatchSet, OverrideAssignment, ReconError, ReconResult, Statement,
};

/// Identity of a statement line that survives re-matching: date,
/// amount, and normalized description. Used to carry operator-chosen
/// overrides across a fresh match run, where line numbers are not
/// guaranteed stable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineFingerprint {
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub description: String,
}

impl LineFingerprint {
    fn of(date: NaiveDate, amount: &BigDecimal, description: &str) -> Self {
        Self {
            date,
            amount: amount.normalized(),
            description: description.trim().to_uppercase(),
        }
    }
}

/// Selection and override state for one statement's lines.
pub struct DispositionTracker {
    session_id: Uuid,
    lines: Mutex<BTreeMap<u32, Disposition>>,
    fingerprints: BTreeMap<u32, LineFingerprint>,
}

impl DispositionTracker {
    /// Build the initial disposition set from a match set partition.
    ///
    /// Auto-matched non-duplicate lines start selected; suggested and
    /// unmatched lines start deselected; lines in `duplicates` become
    /// terminal [`Disposition::SkippedDuplicate`] regardless of their
    /// partition category.
    pub fn new(statement: &Statement, match_set: &MatchSet, duplicates: &BTreeSet<u32>) -> Self {
        let mut lines = BTreeMap::new();
        let mut fingerprints = BTreeMap::new();

        for line in &statement.lines {
            fingerprints.insert(
                line.line_no,
                LineFingerprint::of(line.date, &line.amount, &line.description),
            );
        }

        for m in &match_set.auto {
            let disposition = if duplicates.contains(&m.line_no) {
                Disposition::SkippedDuplicate
            } else {
                Disposition::Auto(MatchedState {
                    entry_id: m.entry_id.clone(),
                    score: m.score,
                    selected: true,
                    assignment: None,
                })
            };
            lines.insert(m.line_no, disposition);
        }
        for m in &match_set.suggested {
            let disposition = if duplicates.contains(&m.line_no) {
                Disposition::SkippedDuplicate
            } else {
                Disposition::Suggested(MatchedState {
                    entry_id: m.entry_id.clone(),
                    score: m.score,
                    selected: false,
                    assignment: None,
                })
            };
            lines.insert(m.line_no, disposition);
        }
        for line in &match_set.unmatched_lines {
            let disposition = if duplicates.contains(&line.line_no) {
                Disposition::SkippedDuplicate
            } else {
                Disposition::Unmatched(UnmatchedState {
                    selected: false,
                    assignment: None,
                })
            };
            lines.insert(line.line_no, disposition);
        }

        Self {
            session_id: Uuid::new_v4(),
            lines: Mutex::new(lines),
            fingerprints,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Current disposition of every line, in line order.
    pub fn snapshot(&self) -> BTreeMap<u32, Disposition> {
        self.lines.lock().unwrap().clone()
    }

    pub fn disposition(&self, line_no: u32) -> ReconResult<Disposition> {
        self.lines
            .lock()
            .unwrap()
            .get(&line_no)
            .cloned()
            .ok_or(ReconError::UnknownLine(line_no))
    }

    /// Set or clear a line's selection.
    ///
    /// Returns the selection state after the call. Selecting a line
    /// without a resolvable target is a no-op returning `false`, never
    /// a state corruption; duplicate-flagged lines always stay
    /// deselected.
    pub fn set_selected(&self, line_no: u32, selected: bool) -> ReconResult<bool> {
        let mut lines = self.lines.lock().unwrap();
        let disposition = lines
            .get_mut(&line_no)
            .ok_or(ReconError::UnknownLine(line_no))?;

        if selected && !disposition.has_resolvable_target() {
            return Ok(false);
        }
        match disposition {
            Disposition::Auto(s) | Disposition::Suggested(s) => s.selected = selected,
            Disposition::Unmatched(s) => s.selected = selected,
            Disposition::SkippedDuplicate => return Ok(false),
        }
        Ok(selected)
    }

    /// Attach a manual assignment to a line.
    ///
    /// On a matched line the assignment replaces the proposed pairing
    /// for commit purposes. If the assignment is incomplete the line is
    /// deselected, keeping the selection invariant intact. Duplicate
    /// lines reject the mutation.
    pub fn set_override(&self, line_no: u32, assignment: OverrideAssignment) -> ReconResult<()> {
        let mut lines = self.lines.lock().unwrap();
        let disposition = lines
            .get_mut(&line_no)
            .ok_or(ReconError::UnknownLine(line_no))?;

        let complete = assignment.is_complete();
        match disposition {
            Disposition::Auto(s) | Disposition::Suggested(s) => {
                s.assignment = Some(assignment);
                if !complete {
                    s.selected = false;
                }
            }
            Disposition::Unmatched(s) => {
                s.assignment = Some(assignment);
                if !complete {
                    s.selected = false;
                }
            }
            Disposition::SkippedDuplicate => return Err(ReconError::DuplicateLine(line_no)),
        }
        Ok(())
    }

    /// Remove a line's manual assignment.
    ///
    /// A matched line falls back to its proposed pairing; an unmatched
    /// line loses its commit target and is deselected.
    pub fn clear_override(&self, line_no: u32) -> ReconResult<()> {
        let mut lines = self.lines.lock().unwrap();
        let disposition = lines
            .get_mut(&line_no)
            .ok_or(ReconError::UnknownLine(line_no))?;

        match disposition {
            Disposition::Auto(s) | Disposition::Suggested(s) => s.assignment = None,
            Disposition::Unmatched(s) => {
                s.assignment = None;
                s.selected = false;
            }
            Disposition::SkippedDuplicate => return Err(ReconError::DuplicateLine(line_no)),
        }
        Ok(())
    }

    /// Switch the ledger side of a line's assignment.
    ///
    /// Changing side clears any previously chosen account since the
    /// set of valid accounts differs by side; the transaction type is
    /// kept. A line with no assignment yet gets a fresh one on the
    /// requested side.
    pub fn change_side(&self, line_no: u32, side: LedgerSide) -> ReconResult<()> {
        let mut lines = self.lines.lock().unwrap();
        let disposition = lines
            .get_mut(&line_no)
            .ok_or(ReconError::UnknownLine(line_no))?;

        let slot = match disposition {
            Disposition::Auto(s) | Disposition::Suggested(s) => &mut s.assignment,
            Disposition::Unmatched(s) => &mut s.assignment,
            Disposition::SkippedDuplicate => return Err(ReconError::DuplicateLine(line_no)),
        };
        match slot {
            Some(a) if a.side != side => {
                a.side = side;
                a.account_ref = None;
            }
            Some(_) => {}
            None => *slot = Some(OverrideAssignment::for_side(side)),
        }

        // Stripping the account may have made a selected line
        // unresolvable; recheck and deselect in the same mutation.
        if disposition.selected() && !disposition.has_resolvable_target() {
            match disposition {
                Disposition::Auto(s) | Disposition::Suggested(s) => s.selected = false,
                Disposition::Unmatched(s) => s.selected = false,
                Disposition::SkippedDuplicate => {}
            }
        }
        Ok(())
    }

    /// Apply the same account assignment to many lines atomically.
    ///
    /// Unknown line numbers fail the whole call before anything is
    /// touched; duplicate-flagged lines are skipped, not an error.
    /// Existing transaction types on each line are kept. Returns the
    /// number of lines actually assigned.
    pub fn bulk_assign(
        &self,
        line_nos: &[u32],
        account_ref: &str,
        side: LedgerSide,
    ) -> ReconResult<usize> {
        let mut lines = self.lines.lock().unwrap();
        for line_no in line_nos {
            if !lines.contains_key(line_no) {
                return Err(ReconError::UnknownLine(*line_no));
            }
        }

        let mut assigned = 0;
        for line_no in line_nos {
            let Some(disposition) = lines.get_mut(line_no) else {
                continue;
            };
            let slot = match disposition {
                Disposition::Auto(s) | Disposition::Suggested(s) => &mut s.assignment,
                Disposition::Unmatched(s) => &mut s.assignment,
                Disposition::SkippedDuplicate => continue,
            };
            match slot {
                Some(a) => {
                    if a.side != side {
                        a.side = side;
                    }
                    a.account_ref = Some(account_ref.to_string());
                }
                None => {
                    *slot = Some(OverrideAssignment {
                        side,
                        account_ref: Some(account_ref.to_string()),
                        txn_type: None,
                    })
                }
            }
            if disposition.selected() && !disposition.has_resolvable_target() {
                match disposition {
                    Disposition::Auto(s) | Disposition::Suggested(s) => s.selected = false,
                    Disposition::Unmatched(s) => s.selected = false,
                    Disposition::SkippedDuplicate => {}
                }
            }
            assigned += 1;
        }
        Ok(assigned)
    }

    /// Recompute commit eligibility from current state.
    pub fn readiness(&self) -> CommitReadiness {
        let lines = self.lines.lock().unwrap();
        let mut ready_count = 0;
        let mut incomplete_count = 0;
        for disposition in lines.values() {
            if !disposition.selected() {
                continue;
            }
            if disposition.has_resolvable_target() {
                ready_count += 1;
            } else {
                incomplete_count += 1;
            }
        }
        CommitReadiness {
            ready_count,
            incomplete_count,
            can_commit: ready_count > 0 && incomplete_count == 0,
        }
    }

    /// The apply-set for every selected line with a resolvable target,
    /// in line order.
    pub fn apply_set(&self) -> Vec<ApplyItem> {
        let lines = self.lines.lock().unwrap();
        let mut items = Vec::new();
        for (line_no, disposition) in lines.iter() {
            if !disposition.selected() || !disposition.has_resolvable_target() {
                continue;
            }
            let target = match disposition {
                Disposition::Auto(s) | Disposition::Suggested(s) => match &s.assignment {
                    Some(a) => ApplyTarget::Posting {
                        assignment: a.clone(),
                    },
                    None => ApplyTarget::Entry {
                        entry_id: s.entry_id.clone(),
                    },
                },
                Disposition::Unmatched(s) => match &s.assignment {
                    Some(a) => ApplyTarget::Posting {
                        assignment: a.clone(),
                    },
                    None => continue,
                },
                Disposition::SkippedDuplicate => continue,
            };
            items.push(ApplyItem {
                line_no: *line_no,
                target,
            });
        }
        items
    }

    /// Overrides worth carrying into a fresh session, keyed by line
    /// fingerprint.
    pub fn carryable_overrides(&self) -> Vec<(LineFingerprint, OverrideAssignment)> {
        let lines = self.lines.lock().unwrap();
        let mut carried = Vec::new();
        for (line_no, disposition) in lines.iter() {
            if let (Some(assignment), Some(fingerprint)) =
                (disposition.assignment(), self.fingerprints.get(line_no))
            {
                carried.push((fingerprint.clone(), assignment.clone()));
            }
        }
        carried
    }

    /// Re-apply carried overrides after a re-match.
    ///
    /// Lines are located by fingerprint, not line number, since
    /// matching order is not stable across ledger changes. Fingerprints
    /// that no longer exist, or now land on duplicate-flagged lines,
    /// are dropped silently. Returns the number re-applied.
    pub fn apply_carried_overrides(
        &self,
        carried: &[(LineFingerprint, OverrideAssignment)],
    ) -> usize {
        let mut applied = 0;
        for (fingerprint, assignment) in carried {
            let target = self
                .fingerprints
                .iter()
                .find(|(_, f)| *f == fingerprint)
                .map(|(line_no, _)| *line_no);
            if let Some(line_no) = target {
                if self.set_override(line_no, assignment.clone()).is_ok() {
                    applied += 1;
                }
            }
        }
        applied
    }
}
