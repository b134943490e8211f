//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One imported bank statement for one account.
///
/// The order of `lines` is the authoritative document order and is
/// preserved through all processing; line numbering is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Opaque identifier of the bank account this statement belongs to
    pub account_ref: String,
    /// Balance declared at the start of the statement period
    pub opening_balance: BigDecimal,
    /// Balance declared at the end of the statement period
    pub closing_balance: BigDecimal,
    /// First day covered by the statement
    pub period_start: NaiveDate,
    /// Last day covered by the statement (>= period_start)
    pub period_end: NaiveDate,
    /// Statement rows in document order
    pub lines: Vec<StatementLine>,
}

impl Statement {
    /// Look up a line by its 1-based line number.
    pub fn line(&self, line_no: u32) -> Option<&StatementLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    /// Sum of all line amounts (signed).
    pub fn lines_total(&self) -> BigDecimal {
        self.lines
            .iter()
            .fold(BigDecimal::from(0), |total, l| total + &l.amount)
    }
}

/// One row on a bank statement.
///
/// Immutable once constructed; all downstream annotation (match,
/// override, selection) is keyed by `line_no` and stored externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    /// 1-based position within the statement, stable for the session
    pub line_no: u32,
    /// Transaction date as printed on the statement
    pub date: NaiveDate,
    /// Signed amount; positive = credit/inflow, negative = debit/outflow
    pub amount: BigDecimal,
    /// Free-text description from the statement
    pub description: String,
    /// Optional reference (cheque number, payment reference, ...)
    pub reference: Option<String>,
    /// Optional running balance printed on the statement, display only
    pub raw_balance: Option<BigDecimal>,
}

/// One unreconciled entry in the account's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Opaque, unique, stable identifier assigned by the ledger
    pub entry_id: String,
    /// Posting date
    pub date: NaiveDate,
    /// Signed amount, same sign convention as [`StatementLine`]
    pub amount: BigDecimal,
    /// Reference recorded on the posting
    pub reference: Option<String>,
    /// Posting description
    pub description: String,
}

/// A signal that contributed to a candidate pair's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchReason {
    /// Statement line and ledger entry carry the same date
    ExactDate,
    /// Dates differ but fall within the configured window
    NearDate,
    /// References match as substrings or as reordered token sets
    ReferenceMatch,
    /// Description token overlap above the configured ratio
    DescriptionOverlap,
}

/// A proposed pairing between one statement line and one ledger entry.
///
/// `score` is monotonic non-decreasing with the number of independent
/// corroborating signals recorded in `reasons`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub line_no: u32,
    pub entry_id: String,
    /// Confidence in [0.0, 1.0]
    pub score: f64,
    /// Contributing signals, in the order they were evaluated
    pub reasons: Vec<MatchReason>,
}

/// The classification result for one statement.
///
/// Every `line_no` from the source statement appears in exactly one of
/// `auto`, `suggested`, or `unmatched_lines`; every considered
/// `entry_id` appears in at most one of `auto`, `suggested`, or
/// `unmatched_entries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSet {
    /// Pairings at or above the auto threshold (default 0.9)
    pub auto: Vec<Match>,
    /// Pairings between the suggested and auto thresholds (default 0.7..0.9)
    pub suggested: Vec<Match>,
    /// Statement lines no candidate survived for
    pub unmatched_lines: Vec<StatementLine>,
    /// Ledger entries not consumed by any accepted pairing
    pub unmatched_entries: Vec<LedgerEntry>,
}

impl MatchSet {
    /// Count summary for presenting a freshly matched statement.
    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            auto: self.auto.len(),
            suggested: self.suggested.len(),
            unmatched_lines: self.unmatched_lines.len(),
            unmatched_entries: self.unmatched_entries.len(),
        }
    }

    /// The proposed pairing for a line, if any.
    pub fn match_for_line(&self, line_no: u32) -> Option<&Match> {
        self.auto
            .iter()
            .chain(self.suggested.iter())
            .find(|m| m.line_no == line_no)
    }
}

/// Per-category counts of a [`MatchSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub auto: usize,
    pub suggested: usize,
    pub unmatched_lines: usize,
    pub unmatched_entries: usize,
}

/// Which side of the ledger a manual assignment posts to.
///
/// The set of valid accounts differs by side, so changing the side of
/// an override clears any previously chosen account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerSide {
    Customer,
    Supplier,
}

/// A manual assignment attached to a statement line, replacing (or
/// supplying, for unmatched lines) the ledger target used at commit.
///
/// An assignment is complete once both `account_ref` and `txn_type`
/// are set; only complete assignments make a line eligible for
/// selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideAssignment {
    pub side: LedgerSide,
    pub account_ref: Option<String>,
    pub txn_type: Option<String>,
}

impl OverrideAssignment {
    /// Start an assignment on a ledger side with nothing chosen yet.
    pub fn for_side(side: LedgerSide) -> Self {
        Self {
            side,
            account_ref: None,
            txn_type: None,
        }
    }

    /// Whether this assignment resolves to a postable target.
    pub fn is_complete(&self) -> bool {
        self.account_ref.is_some() && self.txn_type.is_some()
    }
}

/// Rounding epsilon for balance and amount comparisons: 0.005
/// currency units.
pub fn rounding_epsilon() -> BigDecimal {
    BigDecimal::from(5) / BigDecimal::from(1000)
}

/// Whether two amounts are equal within [`rounding_epsilon`].
pub fn amounts_equal(a: &BigDecimal, b: &BigDecimal) -> bool {
    (a - b).abs() <= rounding_epsilon()
}

/// Errors raised by the reconciliation engine.
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    /// Upstream ledger gateway failure (unavailable, timeout, rejected)
    #[error("Gateway error: {0}")]
    Gateway(String),
    /// Statement normalizer could not produce a canonical statement
    #[error("Statement parse error: {0}")]
    Parse(String),
    /// A `line_no` that does not exist in the current match set
    #[error("Unknown statement line: {0}")]
    UnknownLine(u32),
    /// Duplicate-flagged lines are terminal and reject every mutation
    #[error("Line {0} is flagged as a duplicate and cannot be changed")]
    DuplicateLine(u32),
    /// Inconsistent or unresolvable manual assignment
    #[error("Invalid override: {0}")]
    InvalidOverride(String),
    /// An operation that needs an active session was called without one
    #[error("No active reconciliation session")]
    NoSession,
    /// Commit attempted while `can_commit` was false; a contract
    /// violation, not a recoverable runtime condition
    #[error("Commit precondition failed: {0}")]
    CommitNotReady(String),
    /// The gateway rejected the whole apply-set; nothing was posted
    #[error("Commit aborted: {0}")]
    CommitAborted(String),
    /// Malformed input data
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for reconciliation operations.
pub type ReconResult<T> = Result<T, ReconError>;
