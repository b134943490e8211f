//! Reconciliation commit
//!
//! Turns the final dispositions into one apply-set and hands it to the
//! ledger gateway in a single call, so the mark-reconciled operation is
//! atomic from this side. Commit is an attempt, not destructive: a
//! gateway failure leaves the disposition state untouched and the
//! caller free to retry or re-match.

use crate::session::DispositionTracker;
use crate::traits::{CommitResult, LedgerGateway};
use crate::types::{ReconError, ReconResult, Statement};

/// Apply the selected set under `statement_number`.
///
/// Committing while `readiness().can_commit` is false is a contract
/// violation and fails fast with [`ReconError::CommitNotReady`] before
/// any gateway traffic.
///
/// Two failure modes reach the caller and are distinguishable:
/// an `Err` means the gateway rejected or never received the set and
/// nothing was posted; an `Ok` whose `per_line` contains failed
/// outcomes means the rest of the set posted while those lines did
/// not.
pub async fn commit_statement<G: LedgerGateway>(
    gateway: &mut G,
    statement: &Statement,
    statement_number: &str,
    tracker: &DispositionTracker,
) -> ReconResult<CommitResult> {
    let readiness = tracker.readiness();
    if !readiness.can_commit {
        return Err(ReconError::CommitNotReady(format!(
            "ready={}, incomplete={}",
            readiness.ready_count, readiness.incomplete_count
        )));
    }

    let apply_set = tracker.apply_set();
    gateway
        .apply_reconciliation(
            &statement.account_ref,
            statement_number,
            statement.period_end,
            &apply_set,
        )
        .await
}
