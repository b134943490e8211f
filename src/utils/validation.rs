//! Validation utilities

use crate::types::*;

/// Validate the structural invariants of a canonical statement:
/// period ordering and 1-based contiguous line numbering in document
/// order.
pub fn validate_statement(statement: &Statement) -> ReconResult<()> {
    if statement.period_end < statement.period_start {
        return Err(ReconError::Validation(format!(
            "statement period ends ({}) before it starts ({})",
            statement.period_end, statement.period_start
        )));
    }

    for (index, line) in statement.lines.iter().enumerate() {
        let expected = (index + 1) as u32;
        if line.line_no != expected {
            return Err(ReconError::Validation(format!(
                "line numbering broken at position {}: expected {}, found {}",
                index, expected, line.line_no
            )));
        }
    }

    Ok(())
}

/// Validate that an account reference is plausible before a directory
/// lookup.
pub fn validate_account_ref(account_ref: &str) -> ReconResult<()> {
    if account_ref.trim().is_empty() {
        return Err(ReconError::Validation(
            "Account reference cannot be empty".to_string(),
        ));
    }

    if account_ref.len() > 140 {
        return Err(ReconError::Validation(
            "Account reference cannot exceed 140 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate the internal consistency of a manual assignment: the
/// account reference must be plausible and the transaction type
/// non-empty when present. Directory membership is checked separately
/// by the reconciler.
pub fn validate_assignment(assignment: &OverrideAssignment) -> ReconResult<()> {
    if let Some(account_ref) = assignment.account_ref.as_deref() {
        validate_account_ref(account_ref)?;
    }
    if let Some(txn_type) = assignment.txn_type.as_deref() {
        if txn_type.trim().is_empty() {
            return Err(ReconError::Validation(
                "Transaction type cannot be empty".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn statement(line_nos: &[u32]) -> Statement {
        let date = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        Statement {
            account_ref: "BANK-001".to_string(),
            opening_balance: "0".parse().unwrap(),
            closing_balance: "0".parse().unwrap(),
            period_start: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            lines: line_nos
                .iter()
                .map(|n| StatementLine {
                    line_no: *n,
                    date,
                    amount: "1.00".parse().unwrap(),
                    description: "x".to_string(),
                    reference: None,
                    raw_balance: None,
                })
                .collect(),
        }
    }

    #[test]
    fn contiguous_numbering_passes() {
        assert!(validate_statement(&statement(&[1, 2, 3])).is_ok());
        assert!(validate_statement(&statement(&[])).is_ok());
    }

    #[test]
    fn gaps_in_numbering_fail() {
        assert!(validate_statement(&statement(&[1, 3])).is_err());
        assert!(validate_statement(&statement(&[0, 1])).is_err());
    }

    #[test]
    fn inverted_period_fails() {
        let mut s = statement(&[1]);
        s.period_end = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(validate_statement(&s).is_err());
    }

    #[test]
    fn empty_account_ref_fails() {
        assert!(validate_account_ref("").is_err());
        assert!(validate_account_ref("  ").is_err());
        assert!(validate_account_ref("CUST-01").is_ok());
    }

    #[test]
    fn blank_txn_type_fails() {
        let a = OverrideAssignment {
            side: LedgerSide::Customer,
            account_ref: Some("CUST-01".to_string()),
            txn_type: Some(" ".to_string()),
        };
        assert!(validate_assignment(&a).is_err());
    }
}
