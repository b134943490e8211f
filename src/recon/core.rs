//! Reconciliation orchestrator
//!
//! Drives one reconciliation session end to end: sequence check,
//! matching, the interactive disposition loop, and the final commit.
//! One `Reconciler` serves one operator and one account at a time;
//! invoking the matcher concurrently for other accounts is safe
//! because it is pure.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::recon::commit::commit_statement;
use crate::recon::matching::{match_statement, MatcherConfig};
use crate::recon::sequence::{closing_discrepancy, validate_sequence, SequenceOutcome};
use crate::session::{CommitReadiness, Disposition, DispositionTracker};
use crate::traits::{AccountDirectory, CommitResult, LedgerGateway};
use crate::types::*;

/// Result of presenting a statement to the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionOutcome {
    /// A session is now active and ready for the disposition loop
    Started { summary: MatchSummary },
    /// The statement's period has already been absorbed; nothing to do
    AlreadyProcessed,
    /// An earlier statement must be supplied first
    Gap { expected_opening: bigdecimal::BigDecimal },
}

struct ActiveSession {
    statement: Statement,
    match_set: MatchSet,
    tracker: DispositionTracker,
    duplicates: BTreeSet<u32>,
}

/// Reconciliation engine bound to a ledger gateway and an account
/// directory.
pub struct Reconciler<G: LedgerGateway, D: AccountDirectory> {
    gateway: G,
    directory: D,
    config: MatcherConfig,
    session: Option<ActiveSession>,
}

impl<G: LedgerGateway, D: AccountDirectory> Reconciler<G, D> {
    /// Create a reconciler with default matcher configuration.
    pub fn new(gateway: G, directory: D) -> Self {
        Self::with_config(gateway, directory, MatcherConfig::default())
    }

    /// Create a reconciler with custom thresholds/weights.
    pub fn with_config(gateway: G, directory: D, config: MatcherConfig) -> Self {
        Self {
            gateway,
            directory,
            config,
            session: None,
        }
    }

    /// Classify a statement against the account's last reconciled
    /// balance without starting a session.
    pub async fn check_sequence(&self, statement: &Statement) -> ReconResult<SequenceOutcome> {
        let last = self
            .gateway
            .last_reconciled_balance(&statement.account_ref)
            .await?;
        Ok(validate_sequence(statement, &last))
    }

    /// Validate sequencing and, if processable, match the statement
    /// and open a disposition session.
    ///
    /// `duplicates` flags line numbers already imported by an earlier
    /// statement; they become terminal skipped lines. A previous
    /// session, committed or not, is discarded.
    pub async fn start_session(
        &mut self,
        statement: Statement,
        duplicates: BTreeSet<u32>,
    ) -> ReconResult<SessionOutcome> {
        match self.check_sequence(&statement).await? {
            SequenceOutcome::AlreadyProcessed => return Ok(SessionOutcome::AlreadyProcessed),
            SequenceOutcome::Gap { expected_opening } => {
                return Ok(SessionOutcome::Gap { expected_opening })
            }
            SequenceOutcome::Processable => {}
        }

        let entries = self
            .gateway
            .unreconciled_entries(&statement.account_ref)
            .await?;
        let match_set = match_statement(&statement.lines, &entries, &self.config);
        let tracker = DispositionTracker::new(&statement, &match_set, &duplicates);
        let summary = match_set.summary();

        self.session = Some(ActiveSession {
            statement,
            match_set,
            tracker,
            duplicates,
        });
        Ok(SessionOutcome::Started { summary })
    }

    /// Re-run matching against the current ledger state, carrying
    /// operator-chosen overrides over by line fingerprint.
    ///
    /// This is a fresh matcher invocation, not a resumed one; selection
    /// state is rebuilt from the new partition.
    pub async fn rematch(&mut self) -> ReconResult<SessionOutcome> {
        let session = self.session.take().ok_or(ReconError::NoSession)?;
        let carried = session.tracker.carryable_overrides();

        let entries = self
            .gateway
            .unreconciled_entries(&session.statement.account_ref)
            .await?;
        let match_set = match_statement(&session.statement.lines, &entries, &self.config);
        let tracker = DispositionTracker::new(&session.statement, &match_set, &session.duplicates);
        tracker.apply_carried_overrides(&carried);
        let summary = match_set.summary();

        self.session = Some(ActiveSession {
            statement: session.statement,
            match_set,
            tracker,
            duplicates: session.duplicates,
        });
        Ok(SessionOutcome::Started { summary })
    }

    fn active(&self) -> ReconResult<&ActiveSession> {
        self.session.as_ref().ok_or(ReconError::NoSession)
    }

    /// The match set of the active session.
    pub fn match_set(&self) -> ReconResult<&MatchSet> {
        Ok(&self.active()?.match_set)
    }

    /// Current disposition of one line.
    pub fn disposition(&self, line_no: u32) -> ReconResult<Disposition> {
        self.active()?.tracker.disposition(line_no)
    }

    /// Select or deselect a line; see
    /// [`DispositionTracker::set_selected`].
    pub fn set_selected(&self, line_no: u32, selected: bool) -> ReconResult<bool> {
        self.active()?.tracker.set_selected(line_no, selected)
    }

    /// Attach a manual assignment after validating its account against
    /// the directory for the chosen ledger side.
    pub async fn set_override(
        &self,
        line_no: u32,
        assignment: OverrideAssignment,
    ) -> ReconResult<()> {
        if let Some(account_ref) = assignment.account_ref.as_deref() {
            self.validate_directory_account(assignment.side, account_ref)
                .await?;
        }
        self.active()?.tracker.set_override(line_no, assignment)
    }

    /// Remove a line's manual assignment.
    pub fn clear_override(&self, line_no: u32) -> ReconResult<()> {
        self.active()?.tracker.clear_override(line_no)
    }

    /// Switch a line's assignment to the other ledger side, clearing
    /// its chosen account.
    pub fn change_side(&self, line_no: u32, side: LedgerSide) -> ReconResult<()> {
        self.active()?.tracker.change_side(line_no, side)
    }

    /// Assign one account to many lines atomically.
    pub async fn bulk_assign(
        &self,
        line_nos: &[u32],
        account_ref: &str,
        side: LedgerSide,
    ) -> ReconResult<usize> {
        self.validate_directory_account(side, account_ref).await?;
        self.active()?.tracker.bulk_assign(line_nos, account_ref, side)
    }

    /// Commit eligibility of the active session.
    pub fn readiness(&self) -> ReconResult<CommitReadiness> {
        Ok(self.active()?.tracker.readiness())
    }

    /// Declared-vs-derived closing balance delta of the active
    /// statement, for display.
    pub fn closing_discrepancy(&self) -> ReconResult<Option<bigdecimal::BigDecimal>> {
        Ok(closing_discrepancy(&self.active()?.statement))
    }

    /// Commit the selected set under `statement_number`.
    ///
    /// Only a successful commit retires the session; any failure
    /// leaves the disposition state untouched so the operator can
    /// correct and retry.
    pub async fn commit(&mut self, statement_number: &str) -> ReconResult<CommitResult> {
        let session = self.session.as_ref().ok_or(ReconError::NoSession)?;
        let result = commit_statement(
            &mut self.gateway,
            &session.statement,
            statement_number,
            &session.tracker,
        )
        .await?;
        self.session = None;
        Ok(result)
    }

    /// Whether a disposition session is currently open.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    async fn validate_directory_account(
        &self,
        side: LedgerSide,
        account_ref: &str,
    ) -> ReconResult<()> {
        let accounts = self.directory.list_accounts(side).await?;
        if accounts.iter().any(|a| a.code == account_ref) {
            Ok(())
        } else {
            Err(ReconError::InvalidOverride(format!(
                "account {} not found for {:?} side",
                account_ref, side
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_gateway::MemoryGateway;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn statement() -> Statement {
        Statement {
            account_ref: "BANK-001".to_string(),
            opening_balance: "1000.00".parse().unwrap(),
            closing_balance: "1150.00".parse().unwrap(),
            period_start: day(1),
            period_end: day(31),
            lines: vec![
                StatementLine {
                    line_no: 1,
                    date: day(5),
                    amount: "-50.00".parse().unwrap(),
                    description: "ACME LTD".to_string(),
                    reference: None,
                    raw_balance: None,
                },
                StatementLine {
                    line_no: 2,
                    date: day(6),
                    amount: "200.00".parse().unwrap(),
                    description: "UNKNOWN PAYER".to_string(),
                    reference: None,
                    raw_balance: None,
                },
            ],
        }
    }

    fn entries() -> Vec<LedgerEntry> {
        vec![LedgerEntry {
            entry_id: "E1".to_string(),
            date: day(5),
            amount: "-50.00".parse().unwrap(),
            reference: Some("ACME".to_string()),
            description: "ACME LTD".to_string(),
        }]
    }

    fn reconciler() -> Reconciler<MemoryGateway, MemoryGateway> {
        let mut gateway = MemoryGateway::new();
        gateway.seed_account("BANK-001", "1000.00".parse().unwrap(), &entries());
        gateway.seed_directory(LedgerSide::Customer, "CUST-01", "Jane Smith");
        gateway.seed_directory(LedgerSide::Supplier, "SUPP-01", "ACME Ltd");
        Reconciler::new(gateway.clone(), gateway)
    }

    #[tokio::test]
    async fn gap_and_already_processed_do_not_open_sessions() {
        let mut r = reconciler();

        let mut ahead = statement();
        ahead.opening_balance = "1100.00".parse().unwrap();
        let outcome = r.start_session(ahead, BTreeSet::new()).await.unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Gap {
                expected_opening: "1000.00".parse().unwrap()
            }
        );
        assert!(!r.has_session());

        let mut behind = statement();
        behind.opening_balance = "900.00".parse().unwrap();
        let outcome = r.start_session(behind, BTreeSet::new()).await.unwrap();
        assert_eq!(outcome, SessionOutcome::AlreadyProcessed);
        assert!(!r.has_session());
    }

    #[tokio::test]
    async fn override_rejects_unknown_directory_account() {
        let mut r = reconciler();
        r.start_session(statement(), BTreeSet::new()).await.unwrap();

        let bad = OverrideAssignment {
            side: LedgerSide::Customer,
            account_ref: Some("NOPE".to_string()),
            txn_type: Some("Payment Entry".to_string()),
        };
        let err = r.set_override(2, bad).await.unwrap_err();
        assert!(matches!(err, ReconError::InvalidOverride(_)));

        // Same account code on the wrong side is rejected too
        let wrong_side = OverrideAssignment {
            side: LedgerSide::Supplier,
            account_ref: Some("CUST-01".to_string()),
            txn_type: Some("Payment Entry".to_string()),
        };
        let err = r.set_override(2, wrong_side).await.unwrap_err();
        assert!(matches!(err, ReconError::InvalidOverride(_)));
    }

    #[tokio::test]
    async fn failed_commit_keeps_session_alive() {
        let mut r = reconciler();
        r.start_session(statement(), BTreeSet::new()).await.unwrap();

        // Clones share state with the reconciler's gateway
        let mut gateway = r.gateway().clone();
        gateway.fail_next_apply("stale ledger state");
        let err = r.commit("2024-005").await.unwrap_err();
        assert!(matches!(err, ReconError::CommitAborted(_)));
        assert!(r.has_session());
        assert_eq!(r.gateway().reconciled_count("BANK-001"), 0);

        // Retry succeeds and retires the session
        let result = r.commit("2024-005").await.unwrap();
        assert_eq!(result.entries_reconciled, 1);
        assert!(!r.has_session());
        assert!(matches!(r.readiness(), Err(ReconError::NoSession)));
    }

    #[tokio::test]
    async fn rematch_carries_overrides_by_fingerprint() {
        let mut r = reconciler();
        r.start_session(statement(), BTreeSet::new()).await.unwrap();

        let assignment = OverrideAssignment {
            side: LedgerSide::Customer,
            account_ref: Some("CUST-01".to_string()),
            txn_type: Some("Payment Entry".to_string()),
        };
        r.set_override(2, assignment).await.unwrap();

        let outcome = r.rematch().await.unwrap();
        assert!(matches!(outcome, SessionOutcome::Started { .. }));
        let d = r.disposition(2).unwrap();
        assert_eq!(
            d.assignment().unwrap().account_ref.as_deref(),
            Some("CUST-01")
        );
    }
}
