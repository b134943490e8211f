//! Contracts the reconciliation engine's collaborators must satisfy
//!
//! The engine owns no storage, transport, or file-format parsing of its
//! own; it talks to the accounting system through [`LedgerGateway`],
//! receives canonical statements from a [`StatementSource`], and
//! validates manual assignments against an [`AccountDirectory`].

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Ledger access for one reconciliation session.
///
/// `apply_reconciliation` is the single blocking I/O boundary of the
/// engine and must be atomic from the caller's point of view: either
/// the full apply-set posts under the given statement number, or none
/// of it does. Per-line problems the gateway can isolate (an entry
/// reconciled by someone else in the meantime) are reported inside a
/// successful [`CommitResult`]; a whole-set rejection is an error.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Balance recorded by the most recent committed reconciliation.
    async fn last_reconciled_balance(&self, account_ref: &str) -> ReconResult<BigDecimal>;

    /// All unreconciled ledger entries for the account.
    async fn unreconciled_entries(&self, account_ref: &str) -> ReconResult<Vec<LedgerEntry>>;

    /// Atomically mark the apply-set reconciled under `statement_number`.
    async fn apply_reconciliation(
        &mut self,
        account_ref: &str,
        statement_number: &str,
        statement_date: NaiveDate,
        apply_set: &[ApplyItem],
    ) -> ReconResult<CommitResult>;

    /// Resolve a manual assignment to an existing posting, or create a
    /// new one, returning its entry id. Used by gateway implementations
    /// inside the atomic apply; exposed so callers can pre-validate an
    /// assignment when their ledger supports it.
    async fn resolve_or_create_posting(
        &mut self,
        account_ref: &str,
        assignment: &OverrideAssignment,
    ) -> ReconResult<String>;
}

/// Statement normalizer contract.
///
/// Implementations turn a raw file (CSV/OFX/QIF/MT940/...) into a
/// canonical [`Statement`]. A line that cannot be parsed must surface
/// as a [`ReconError::Parse`]; silently dropping lines is forbidden.
pub trait StatementSource: Send + Sync {
    fn parse(&self, raw: &[u8]) -> ReconResult<Statement>;
}

/// Customer/supplier directory used to populate and validate override
/// account choices.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Accounts valid for manual assignment on the given ledger side.
    async fn list_accounts(&self, side: LedgerSide) -> ReconResult<Vec<DirectoryAccount>>;
}

/// One selectable account in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryAccount {
    pub code: String,
    pub display_name: String,
}

/// Where a committed statement line posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApplyTarget {
    /// The proposed pairing from the match set
    Entry { entry_id: String },
    /// A manual assignment the gateway resolves to a new or existing
    /// posting; guaranteed complete by the disposition tracker
    Posting { assignment: OverrideAssignment },
}

/// One element of the apply-set handed to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyItem {
    pub line_no: u32,
    pub target: ApplyTarget,
}

/// Outcome of one statement line within a committed reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineOutcome {
    Posted,
    Failed,
}

/// Per-line commit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCommitOutcome {
    pub line_no: u32,
    pub outcome: LineOutcome,
    /// Gateway-provided detail, present for failed lines
    pub detail: Option<String>,
}

/// Result of a committed (not aborted) reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitResult {
    pub statement_number: String,
    pub entries_reconciled: usize,
    pub per_line: Vec<LineCommitOutcome>,
}

impl CommitResult {
    /// Lines the gateway reported as individually failed while the
    /// rest of the set posted.
    pub fn failed_lines(&self) -> Vec<u32> {
        self.per_line
            .iter()
            .filter(|l| l.outcome == LineOutcome::Failed)
            .map(|l| l.line_no)
            .collect()
    }
}
