//! Integration tests for recon-core

use std::collections::BTreeSet;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use recon_core::{
    utils::validate_statement, LedgerEntry, LedgerSide, LineOutcome, MemoryGateway,
    OverrideAssignment, Reconciler, SequenceOutcome, SessionOutcome, Statement, StatementLine,
};

fn day(month: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, d).unwrap()
}

fn line(line_no: u32, date: NaiveDate, amount: &str, description: &str) -> StatementLine {
    StatementLine {
        line_no,
        date,
        amount: amount.parse().unwrap(),
        description: description.to_string(),
        reference: None,
        raw_balance: None,
    }
}

fn entry(entry_id: &str, date: NaiveDate, amount: &str, reference: &str, description: &str) -> LedgerEntry {
    LedgerEntry {
        entry_id: entry_id.to_string(),
        date,
        amount: amount.parse().unwrap(),
        reference: Some(reference.to_string()),
        description: description.to_string(),
    }
}

fn january_statement() -> Statement {
    Statement {
        account_ref: "BANK-001".to_string(),
        opening_balance: "1000.00".parse().unwrap(),
        closing_balance: "1225.00".parse().unwrap(),
        period_start: day(1, 1),
        period_end: day(1, 31),
        lines: vec![
            line(1, day(1, 5), "-50.00", "ACME LTD"),
            line(2, day(1, 6), "200.00", "J SMITH"),
            line(3, day(1, 20), "75.00", "CASH DEPOSIT"),
        ],
    }
}

fn seeded_gateway() -> MemoryGateway {
    let mut gateway = MemoryGateway::new();
    gateway.seed_account(
        "BANK-001",
        "1000.00".parse().unwrap(),
        &[
            entry("E1", day(1, 5), "-50.00", "ACME", "ACME LTD"),
            entry("E2", day(1, 8), "200.00", "SMITH J", "Invoice receipt"),
        ],
    );
    gateway.seed_directory(LedgerSide::Customer, "CUST-01", "Walk-in Customers");
    gateway.seed_directory(LedgerSide::Supplier, "SUPP-01", "ACME Ltd");
    gateway
}

#[tokio::test]
async fn test_complete_reconciliation_workflow() {
    let statement = january_statement();
    validate_statement(&statement).unwrap();

    let gateway = seeded_gateway();
    let mut reconciler = Reconciler::new(gateway.clone(), gateway.clone());

    // Sequence: the statement follows the last reconciled balance
    assert_eq!(
        reconciler.check_sequence(&statement).await.unwrap(),
        SequenceOutcome::Processable
    );

    // Matching: exact pairing lands in auto, reordered-reference
    // pairing in suggested, the cash deposit stays unmatched
    let outcome = reconciler
        .start_session(statement, BTreeSet::new())
        .await
        .unwrap();
    let summary = match outcome {
        SessionOutcome::Started { summary } => summary,
        other => panic!("expected a started session, got {:?}", other),
    };
    assert_eq!(summary.auto, 1);
    assert_eq!(summary.suggested, 1);
    assert_eq!(summary.unmatched_lines, 1);
    assert_eq!(summary.unmatched_entries, 0);

    // Declared closing balance matches the lines, no discrepancy
    assert!(reconciler.closing_discrepancy().unwrap().is_none());

    // Disposition loop: accept the suggestion, give the unmatched
    // deposit a manual target, select it
    assert!(reconciler.set_selected(2, true).unwrap());
    assert!(!reconciler.set_selected(3, true).unwrap());
    reconciler
        .set_override(
            3,
            OverrideAssignment {
                side: LedgerSide::Customer,
                account_ref: Some("CUST-01".to_string()),
                txn_type: Some("Payment Entry".to_string()),
            },
        )
        .await
        .unwrap();
    assert!(reconciler.set_selected(3, true).unwrap());

    let readiness = reconciler.readiness().unwrap();
    assert_eq!(readiness.ready_count, 3);
    assert_eq!(readiness.incomplete_count, 0);
    assert!(readiness.can_commit);

    // Commit: everything posts under one statement number
    let result = reconciler.commit("2024-001").await.unwrap();
    assert_eq!(result.statement_number, "2024-001");
    assert_eq!(result.entries_reconciled, 3);
    assert!(result
        .per_line
        .iter()
        .all(|l| l.outcome == LineOutcome::Posted));
    assert!(!reconciler.has_session());

    assert_eq!(gateway.reconciled_count("BANK-001"), 3);
    assert_eq!(
        gateway.statement_number_for("BANK-001", "E1"),
        Some("2024-001".to_string())
    );
}

#[tokio::test]
async fn test_reprocessing_same_statement_is_already_processed() {
    let statement = january_statement();
    let mut gateway = seeded_gateway();
    let mut reconciler = Reconciler::new(gateway.clone(), gateway.clone());

    assert_eq!(
        reconciler.check_sequence(&statement).await.unwrap(),
        SequenceOutcome::Processable
    );

    reconciler
        .start_session(statement.clone(), BTreeSet::new())
        .await
        .unwrap();
    reconciler.commit("2024-001").await.unwrap();

    // The committed statement advanced the reconciled balance to its
    // closing balance; statements keep arriving oldest first, so the
    // next valid opening equals that closing balance.
    gateway.set_last_reconciled_balance("BANK-001", statement.closing_balance.clone());

    let outcome = reconciler
        .start_session(statement, BTreeSet::new())
        .await
        .unwrap();
    assert_eq!(outcome, SessionOutcome::AlreadyProcessed);
}

#[tokio::test]
async fn test_gap_reports_expected_opening() {
    // The bank balance moved ahead of the reconciled frontier: the
    // statement covering 1000.00 -> 1400.00 has not been supplied yet.
    let mut statement = january_statement();
    statement.opening_balance = "1400.00".parse().unwrap();
    statement.closing_balance = "1625.00".parse().unwrap();

    let gateway = seeded_gateway();
    let mut reconciler = Reconciler::new(gateway.clone(), gateway);

    let outcome = reconciler
        .start_session(statement, BTreeSet::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Gap {
            expected_opening: "1000.00".parse::<BigDecimal>().unwrap()
        }
    );
    assert!(!reconciler.has_session());
}

#[tokio::test]
async fn test_commit_atomicity_under_gateway_failure() {
    let statement = january_statement();
    let gateway = seeded_gateway();
    let mut reconciler = Reconciler::new(gateway.clone(), gateway.clone());

    reconciler
        .start_session(statement, BTreeSet::new())
        .await
        .unwrap();
    reconciler.set_selected(2, true).unwrap();

    let mut failing = gateway.clone();
    failing.fail_next_apply("stale ledger state");

    reconciler.commit("2024-001").await.unwrap_err();
    assert_eq!(gateway.reconciled_count("BANK-001"), 0);
    assert_eq!(gateway.partial_apply_attempts(), 0);
    assert!(reconciler.has_session());
}

#[tokio::test]
async fn test_duplicate_lines_are_reported_but_never_committed() {
    let statement = january_statement();
    let gateway = seeded_gateway();
    let mut reconciler = Reconciler::new(gateway.clone(), gateway.clone());

    // Line 1 was already imported by an earlier statement
    let outcome = reconciler
        .start_session(statement, BTreeSet::from([1]))
        .await
        .unwrap();
    assert!(matches!(outcome, SessionOutcome::Started { .. }));

    assert!(!reconciler.set_selected(1, true).unwrap());
    assert!(reconciler.set_selected(2, true).unwrap());

    let result = reconciler.commit("2024-001").await.unwrap();
    assert_eq!(result.entries_reconciled, 1);
    assert_eq!(gateway.statement_number_for("BANK-001", "E1"), None);
    assert_eq!(
        gateway.statement_number_for("BANK-001", "E2"),
        Some("2024-001".to_string())
    );
}
