//! In-memory ledger gateway for testing and development

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Clone, Default)]
struct AccountState {
    last_reconciled_balance: BigDecimal,
    unreconciled: Vec<LedgerEntry>,
    /// entry_id -> statement number it was reconciled under
    reconciled: HashMap<String, String>,
}

/// In-memory [`LedgerGateway`] and [`AccountDirectory`] implementation
/// for tests and development.
///
/// Failure injection: [`fail_next_apply`](Self::fail_next_apply)
/// rejects the next whole apply-set (commit aborted, nothing posted),
/// [`fail_entry`](Self::fail_entry) makes one entry fail at line level
/// while the rest of the set posts. A partial-apply counter records
/// whether an aborted apply ever left entries behind, so commit
/// atomicity is verifiable.
#[derive(Debug, Clone)]
pub struct MemoryGateway {
    accounts: Arc<RwLock<HashMap<String, AccountState>>>,
    directory: Arc<RwLock<HashMap<LedgerSide, Vec<DirectoryAccount>>>>,
    fail_next_apply: Arc<RwLock<Option<String>>>,
    failing_entries: Arc<RwLock<HashMap<String, String>>>,
    partial_apply_attempts: Arc<RwLock<usize>>,
    posting_counter: Arc<RwLock<usize>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            directory: Arc::new(RwLock::new(HashMap::new())),
            fail_next_apply: Arc::new(RwLock::new(None)),
            failing_entries: Arc::new(RwLock::new(HashMap::new())),
            partial_apply_attempts: Arc::new(RwLock::new(0)),
            posting_counter: Arc::new(RwLock::new(0)),
        }
    }

    /// Register an account with its last reconciled balance and open
    /// ledger entries.
    pub fn seed_account(
        &mut self,
        account_ref: &str,
        last_reconciled_balance: BigDecimal,
        entries: &[LedgerEntry],
    ) {
        self.accounts.write().unwrap().insert(
            account_ref.to_string(),
            AccountState {
                last_reconciled_balance,
                unreconciled: entries.to_vec(),
                reconciled: HashMap::new(),
            },
        );
    }

    /// Register a directory account selectable for overrides.
    pub fn seed_directory(&mut self, side: LedgerSide, code: &str, display_name: &str) {
        self.directory
            .write()
            .unwrap()
            .entry(side)
            .or_default()
            .push(DirectoryAccount {
                code: code.to_string(),
                display_name: display_name.to_string(),
            });
    }

    /// Advance the account's reconciled balance, as a committed
    /// statement would.
    pub fn set_last_reconciled_balance(&mut self, account_ref: &str, balance: BigDecimal) {
        if let Some(state) = self.accounts.write().unwrap().get_mut(account_ref) {
            state.last_reconciled_balance = balance;
        }
    }

    /// Reject the next `apply_reconciliation` call outright.
    pub fn fail_next_apply(&mut self, reason: &str) {
        *self.fail_next_apply.write().unwrap() = Some(reason.to_string());
    }

    /// Make one entry fail at line level while the rest of the set
    /// posts.
    pub fn fail_entry(&mut self, entry_id: &str, reason: &str) {
        self.failing_entries
            .write()
            .unwrap()
            .insert(entry_id.to_string(), reason.to_string());
    }

    /// How many entries are marked reconciled for the account.
    pub fn reconciled_count(&self, account_ref: &str) -> usize {
        self.accounts
            .read()
            .unwrap()
            .get(account_ref)
            .map(|s| s.reconciled.len())
            .unwrap_or(0)
    }

    /// Statement number an entry was reconciled under, if any.
    pub fn statement_number_for(&self, account_ref: &str, entry_id: &str) -> Option<String> {
        self.accounts
            .read()
            .unwrap()
            .get(account_ref)
            .and_then(|s| s.reconciled.get(entry_id).cloned())
    }

    /// Applies that entered the mutation phase and never finished it.
    /// Stays zero for a correct gateway: rejections happen during
    /// planning, before any state is touched.
    pub fn partial_apply_attempts(&self) -> usize {
        *self.partial_apply_attempts.read().unwrap()
    }

    fn next_posting_id(&self) -> String {
        let mut counter = self.posting_counter.write().unwrap();
        *counter += 1;
        format!("P{}", counter)
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MemoryGateway {
    async fn last_reconciled_balance(&self, account_ref: &str) -> ReconResult<BigDecimal> {
        self.accounts
            .read()
            .unwrap()
            .get(account_ref)
            .map(|s| s.last_reconciled_balance.clone())
            .ok_or_else(|| ReconError::Gateway(format!("unknown account: {}", account_ref)))
    }

    async fn unreconciled_entries(&self, account_ref: &str) -> ReconResult<Vec<LedgerEntry>> {
        self.accounts
            .read()
            .unwrap()
            .get(account_ref)
            .map(|s| s.unreconciled.clone())
            .ok_or_else(|| ReconError::Gateway(format!("unknown account: {}", account_ref)))
    }

    async fn apply_reconciliation(
        &mut self,
        account_ref: &str,
        statement_number: &str,
        _statement_date: NaiveDate,
        apply_set: &[ApplyItem],
    ) -> ReconResult<CommitResult> {
        if let Some(reason) = self.fail_next_apply.write().unwrap().take() {
            return Err(ReconError::CommitAborted(reason));
        }

        // Plan the whole set before mutating anything, so a rejection
        // can never leave a partial apply behind.
        enum Planned {
            Reconcile { entry_id: String },
            CreatePosting,
            LineFailure { detail: String },
        }

        let mut plan = Vec::with_capacity(apply_set.len());
        {
            let accounts = self.accounts.read().unwrap();
            let state = accounts
                .get(account_ref)
                .ok_or_else(|| ReconError::Gateway(format!("unknown account: {}", account_ref)))?;
            if state.reconciled.values().any(|n| n == statement_number) {
                return Err(ReconError::CommitAborted(format!(
                    "statement number already used: {}",
                    statement_number
                )));
            }

            let failing = self.failing_entries.read().unwrap();
            for item in apply_set {
                let planned = match &item.target {
                    ApplyTarget::Entry { entry_id } => {
                        if let Some(detail) = failing.get(entry_id) {
                            Planned::LineFailure {
                                detail: detail.clone(),
                            }
                        } else if state.unreconciled.iter().any(|e| &e.entry_id == entry_id) {
                            Planned::Reconcile {
                                entry_id: entry_id.clone(),
                            }
                        } else {
                            Planned::LineFailure {
                                detail: format!("entry not open: {}", entry_id),
                            }
                        }
                    }
                    ApplyTarget::Posting { assignment } => {
                        if assignment.is_complete() {
                            Planned::CreatePosting
                        } else {
                            Planned::LineFailure {
                                detail: "incomplete assignment".to_string(),
                            }
                        }
                    }
                };
                plan.push((item.line_no, planned));
            }
        }

        // The counter stays raised for the duration of the mutation
        // phase; a gateway that bailed out halfway would leave it
        // nonzero, which the atomicity tests assert never happens.
        *self.partial_apply_attempts.write().unwrap() += 1;

        let mut per_line = Vec::with_capacity(plan.len());
        let mut entries_reconciled = 0;
        {
            let mut accounts = self.accounts.write().unwrap();
            let state = accounts
                .get_mut(account_ref)
                .ok_or_else(|| ReconError::Gateway(format!("unknown account: {}", account_ref)))?;

            for (line_no, planned) in plan {
                match planned {
                    Planned::Reconcile { entry_id } => {
                        state.unreconciled.retain(|e| e.entry_id != entry_id);
                        state
                            .reconciled
                            .insert(entry_id, statement_number.to_string());
                        entries_reconciled += 1;
                        per_line.push(LineCommitOutcome {
                            line_no,
                            outcome: LineOutcome::Posted,
                            detail: None,
                        });
                    }
                    Planned::CreatePosting => {
                        let posting_id = self.next_posting_id();
                        state
                            .reconciled
                            .insert(posting_id, statement_number.to_string());
                        entries_reconciled += 1;
                        per_line.push(LineCommitOutcome {
                            line_no,
                            outcome: LineOutcome::Posted,
                            detail: None,
                        });
                    }
                    Planned::LineFailure { detail } => {
                        per_line.push(LineCommitOutcome {
                            line_no,
                            outcome: LineOutcome::Failed,
                            detail: Some(detail),
                        });
                    }
                }
            }
        }

        *self.partial_apply_attempts.write().unwrap() -= 1;

        Ok(CommitResult {
            statement_number: statement_number.to_string(),
            entries_reconciled,
            per_line,
        })
    }

    async fn resolve_or_create_posting(
        &mut self,
        account_ref: &str,
        assignment: &OverrideAssignment,
    ) -> ReconResult<String> {
        if !assignment.is_complete() {
            return Err(ReconError::InvalidOverride(
                "assignment is incomplete".to_string(),
            ));
        }
        if !self.accounts.read().unwrap().contains_key(account_ref) {
            return Err(ReconError::Gateway(format!(
                "unknown account: {}",
                account_ref
            )));
        }
        Ok(self.next_posting_id())
    }
}

#[async_trait]
impl AccountDirectory for MemoryGateway {
    async fn list_accounts(&self, side: LedgerSide) -> ReconResult<Vec<DirectoryAccount>> {
        Ok(self
            .directory
            .read()
            .unwrap()
            .get(&side)
            .cloned()
            .unwrap_or_default())
    }
}
