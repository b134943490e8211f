//! Statement sequence validation
//!
//! A statement is only processable when it is the *next* one for its
//! account: its declared opening balance must agree (within the
//! rounding epsilon) with the balance recorded by the last committed
//! reconciliation. Both failure directions are expected, named
//! outcomes the caller branches on, never errors.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::{amounts_equal, rounding_epsilon, Statement};

/// Decision for one incoming statement against the account's last
/// reconciled balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SequenceOutcome {
    /// Opening balance agrees with the last reconciled balance
    Processable,
    /// The statement's period has already been absorbed; skip it
    AlreadyProcessed,
    /// An earlier statement is missing; `expected_opening` tells the
    /// caller which statement to supply next
    Gap { expected_opening: BigDecimal },
}

impl SequenceOutcome {
    pub fn is_processable(&self) -> bool {
        matches!(self, SequenceOutcome::Processable)
    }
}

/// Classify a statement against the account's last reconciled balance.
///
/// Pure and deterministic; every result is immediately actionable.
pub fn validate_sequence(
    statement: &Statement,
    last_reconciled_balance: &BigDecimal,
) -> SequenceOutcome {
    if amounts_equal(&statement.opening_balance, last_reconciled_balance) {
        return SequenceOutcome::Processable;
    }
    if statement.opening_balance < *last_reconciled_balance {
        // Opening behind the reconciled frontier: the period was
        // already absorbed by an earlier commit.
        SequenceOutcome::AlreadyProcessed
    } else {
        // Opening ahead of the frontier: the statement in between has
        // not been processed yet.
        SequenceOutcome::Gap {
            expected_opening: last_reconciled_balance.clone(),
        }
    }
}

/// Difference between the declared closing balance and the balance the
/// statement's own lines imply (opening + sum of line amounts).
///
/// Returns `Some(declared - derived)` when the discrepancy exceeds the
/// rounding epsilon. This is a warning for display; the engine does
/// not recompute balances beyond reporting it.
pub fn closing_discrepancy(statement: &Statement) -> Option<BigDecimal> {
    let derived = &statement.opening_balance + statement.lines_total();
    let delta = &statement.closing_balance - &derived;
    if delta.abs() > rounding_epsilon() {
        Some(delta)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StatementLine;
    use chrono::NaiveDate;

    fn statement(opening: &str, closing: &str, amounts: &[&str]) -> Statement {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        Statement {
            account_ref: "BANK-001".to_string(),
            opening_balance: opening.parse().unwrap(),
            closing_balance: closing.parse().unwrap(),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            lines: amounts
                .iter()
                .enumerate()
                .map(|(i, a)| StatementLine {
                    line_no: (i + 1) as u32,
                    date,
                    amount: a.parse().unwrap(),
                    description: format!("line {}", i + 1),
                    reference: None,
                    raw_balance: None,
                })
                .collect(),
        }
    }

    #[test]
    fn equal_balance_is_processable() {
        let s = statement("1000.00", "1000.00", &[]);
        let last = "1000.00".parse().unwrap();
        assert_eq!(validate_sequence(&s, &last), SequenceOutcome::Processable);
    }

    #[test]
    fn within_epsilon_is_processable() {
        let s = statement("1000.004", "1000.004", &[]);
        let last = "1000.00".parse().unwrap();
        assert_eq!(validate_sequence(&s, &last), SequenceOutcome::Processable);
    }

    #[test]
    fn opening_behind_is_already_processed() {
        let s = statement("900.00", "900.00", &[]);
        let last = "1000.00".parse().unwrap();
        assert_eq!(
            validate_sequence(&s, &last),
            SequenceOutcome::AlreadyProcessed
        );
    }

    #[test]
    fn opening_ahead_is_gap_with_expected_opening() {
        let s = statement("1100.00", "1100.00", &[]);
        let last: BigDecimal = "1000.00".parse().unwrap();
        assert_eq!(
            validate_sequence(&s, &last),
            SequenceOutcome::Gap {
                expected_opening: last.clone()
            }
        );
    }

    #[test]
    fn reprocessing_after_commit_is_already_processed() {
        // First statement: opening equals the reconciled balance.
        let s = statement("1000.00", "1225.00", &["225.00"]);
        let last: BigDecimal = "1000.00".parse().unwrap();
        assert_eq!(validate_sequence(&s, &last), SequenceOutcome::Processable);

        // After commit the reconciled balance advanced to the closing
        // balance; the same statement now reads as absorbed.
        let advanced = s.closing_balance.clone();
        assert_eq!(
            validate_sequence(&s, &advanced),
            SequenceOutcome::AlreadyProcessed
        );
    }

    #[test]
    fn closing_discrepancy_reported_not_raised() {
        // opening 100 + lines (-50 + 200) = 250 derived, declared 260
        let s = statement("100.00", "260.00", &["-50.00", "200.00"]);
        let delta = closing_discrepancy(&s).unwrap();
        assert_eq!(delta, "10.00".parse::<BigDecimal>().unwrap());

        let ok = statement("100.00", "250.00", &["-50.00", "200.00"]);
        assert!(closing_discrepancy(&ok).is_none());
    }
}
