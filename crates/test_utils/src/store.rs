//! In-Memory Repayment Store
//!
//! A `RepaymentStore` that keeps the whole ledger in memory. `begin` takes a
//! snapshot of the ledger and a store-wide lock; `commit` writes the snapshot
//! back. Dropping a transaction discards its snapshot, which gives the same
//! all-or-nothing behaviour as a database rollback.
//!
//! Failures can be injected per operation to exercise rollback paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::{
    AccountId, AccountPaymentId, AccountTransactionId, DomainPort, LoanId, PaybackTransactionId,
    PaymentId, PortError,
};
use domain_repayment::{
    Account, AccountPayment, AccountProperty, AccountTransaction, Loan, PaybackTransaction, Payment,
    PaymentEvent, Ptp, RepaymentStore, RepaymentTx, TransactionType,
};

/// Complete ledger contents
///
/// Append-only tables are kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    pub accounts: HashMap<AccountId, Account>,
    pub account_properties: HashMap<AccountId, AccountProperty>,
    pub loans: HashMap<LoanId, Loan>,
    pub account_payments: HashMap<AccountPaymentId, AccountPayment>,
    pub payments: HashMap<PaymentId, Payment>,
    pub paybacks: HashMap<PaybackTransactionId, PaybackTransaction>,
    pub account_transactions: Vec<AccountTransaction>,
    pub payment_events: Vec<PaymentEvent>,
    pub ptps: Vec<Ptp>,
}

impl LedgerState {
    pub fn account_transaction(&self, id: AccountTransactionId) -> Option<&AccountTransaction> {
        self.account_transactions.iter().find(|t| t.id == id)
    }

    pub fn transactions_of_type(
        &self,
        transaction_type: TransactionType,
    ) -> Vec<&AccountTransaction> {
        self.account_transactions
            .iter()
            .filter(|t| t.transaction_type == transaction_type)
            .collect()
    }

    pub fn events_for(&self, account_transaction_id: AccountTransactionId) -> Vec<&PaymentEvent> {
        self.payment_events
            .iter()
            .filter(|e| e.account_transaction_id == account_transaction_id)
            .collect()
    }

    /// Installments of a loan ordered by due date
    pub fn payments_for_loan(&self, loan_id: LoanId) -> Vec<&Payment> {
        let mut payments: Vec<&Payment> =
            self.payments.values().filter(|p| p.loan_id == loan_id).collect();
        payments.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
        payments
    }

    pub fn ptp(&self, id: core_kernel::PtpId) -> Option<&Ptp> {
        self.ptps.iter().find(|p| p.id == id)
    }
}

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    LockAccount,
    InsertAccountTransaction,
    InsertPaybackTransaction,
    InsertPaymentEvent,
    SavePayment,
    SaveAccountPayment,
    SaveLoan,
    SaveAccountProperty,
    SavePtp,
    Commit,
}

#[derive(Debug, Clone, Copy)]
struct Failpoint {
    operation: StoreOperation,
    /// Calls of `operation` that succeed before the failure
    after: usize,
}

/// In-memory [`RepaymentStore`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepaymentStore {
    state: Arc<Mutex<LedgerState>>,
    gate: Arc<Mutex<()>>,
    failpoint: Arc<Mutex<Option<Failpoint>>>,
}

impl DomainPort for InMemoryRepaymentStore {}

impl InMemoryRepaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `state`
    pub fn with_state(state: LedgerState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            ..Self::default()
        }
    }

    /// Copy of the committed ledger
    pub async fn snapshot(&self) -> LedgerState {
        self.state.lock().await.clone()
    }

    /// Replaces the committed ledger
    pub async fn replace(&self, state: LedgerState) {
        *self.state.lock().await = state;
    }

    /// Makes the first call of `operation` in the next transaction fail
    pub async fn fail_on(&self, operation: StoreOperation) {
        self.fail_on_nth(operation, 0).await;
    }

    /// Makes `operation` fail after it succeeded `after` times in the next transaction
    pub async fn fail_on_nth(&self, operation: StoreOperation, after: usize) {
        *self.failpoint.lock().await = Some(Failpoint { operation, after });
    }

    pub async fn clear_failpoint(&self) {
        *self.failpoint.lock().await = None;
    }
}

#[async_trait]
impl RepaymentStore for InMemoryRepaymentStore {
    type Tx = InMemoryRepaymentTx;

    async fn begin(&self) -> Result<Self::Tx, PortError> {
        let guard = self.gate.clone().lock_owned().await;
        let state = self.state.lock().await.clone();
        let failpoint = *self.failpoint.lock().await;
        Ok(InMemoryRepaymentTx {
            state,
            failpoint,
            calls: HashMap::new(),
            _guard: guard,
        })
    }

    async fn commit(&self, mut tx: Self::Tx) -> Result<(), PortError> {
        tx.check(StoreOperation::Commit)?;
        *self.state.lock().await = tx.state;
        Ok(())
    }
}

/// Snapshot-isolated transaction over an [`InMemoryRepaymentStore`]
///
/// Holds the store-wide lock until committed or dropped, so transactions
/// run one at a time like competing `SELECT ... FOR UPDATE` on one account.
pub struct InMemoryRepaymentTx {
    state: LedgerState,
    failpoint: Option<Failpoint>,
    calls: HashMap<StoreOperation, usize>,
    _guard: OwnedMutexGuard<()>,
}

impl std::fmt::Debug for InMemoryRepaymentTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepaymentTx")
            .field("failpoint", &self.failpoint)
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

impl InMemoryRepaymentTx {
    /// Uncommitted ledger as seen by this transaction
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    fn check(&mut self, operation: StoreOperation) -> Result<(), PortError> {
        let count = self.calls.entry(operation).or_insert(0);
        let seen = *count;
        *count += 1;
        match self.failpoint {
            Some(fp) if fp.operation == operation && fp.after == seen => Err(PortError::connection(
                format!("injected failure on {:?}", operation),
            )),
            _ => Ok(()),
        }
    }
}

fn sorted_payments<'a>(payments: impl Iterator<Item = &'a Payment>) -> Vec<Payment> {
    let mut payments: Vec<Payment> = payments.cloned().collect();
    payments.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
    payments
}

fn sorted_account_payments<'a>(
    bills: impl Iterator<Item = &'a AccountPayment>,
) -> Vec<AccountPayment> {
    let mut bills: Vec<AccountPayment> = bills.cloned().collect();
    bills.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
    bills
}

fn replace<K: std::hash::Hash + Eq + std::fmt::Display, V: Clone>(
    table: &mut HashMap<K, V>,
    entity: &'static str,
    id: K,
    value: &V,
) -> Result<(), PortError> {
    match table.get_mut(&id) {
        Some(existing) => {
            *existing = value.clone();
            Ok(())
        }
        None => Err(PortError::not_found(entity, id)),
    }
}

#[async_trait]
impl RepaymentTx for InMemoryRepaymentTx {
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, PortError> {
        self.check(StoreOperation::LockAccount)?;
        Ok(self.state.accounts.get(&id).cloned())
    }

    async fn get_account_transaction(
        &mut self,
        id: AccountTransactionId,
    ) -> Result<Option<AccountTransaction>, PortError> {
        Ok(self.state.account_transaction(id).cloned())
    }

    async fn find_reversal_of(
        &mut self,
        origin: AccountTransactionId,
    ) -> Result<Option<AccountTransaction>, PortError> {
        Ok(self
            .state
            .account_transactions
            .iter()
            .find(|t| t.reversed_transaction_origin_id == Some(origin))
            .cloned())
    }

    async fn find_payment_events_for_transaction(
        &mut self,
        id: AccountTransactionId,
    ) -> Result<Vec<PaymentEvent>, PortError> {
        Ok(self.state.events_for(id).into_iter().cloned().collect())
    }

    async fn get_payback_transaction(
        &mut self,
        id: PaybackTransactionId,
    ) -> Result<Option<PaybackTransaction>, PortError> {
        Ok(self.state.paybacks.get(&id).cloned())
    }

    async fn get_payments(&mut self, ids: &[PaymentId]) -> Result<Vec<Payment>, PortError> {
        Ok(sorted_payments(ids.iter().filter_map(|id| self.state.payments.get(id))))
    }

    async fn get_account_payments(
        &mut self,
        ids: &[AccountPaymentId],
    ) -> Result<Vec<AccountPayment>, PortError> {
        Ok(sorted_account_payments(
            ids.iter().filter_map(|id| self.state.account_payments.get(id)),
        ))
    }

    async fn find_unpaid_account_payments(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<AccountPayment>, PortError> {
        Ok(sorted_account_payments(
            self.state
                .account_payments
                .values()
                .filter(|ap| ap.account_id == account_id && ap.due_amount.is_positive()),
        ))
    }

    async fn find_payments_for_account_payments(
        &mut self,
        ids: &[AccountPaymentId],
    ) -> Result<Vec<Payment>, PortError> {
        Ok(sorted_payments(
            self.state
                .payments
                .values()
                .filter(|p| ids.contains(&p.account_payment_id)),
        ))
    }

    async fn get_loans(&mut self, ids: &[LoanId]) -> Result<Vec<Loan>, PortError> {
        let mut loans: Vec<Loan> =
            ids.iter().filter_map(|id| self.state.loans.get(id)).cloned().collect();
        loans.sort_by_key(|l| l.id);
        loans.dedup_by_key(|l| l.id);
        Ok(loans)
    }

    async fn find_loans_for_account(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<Loan>, PortError> {
        let mut loans: Vec<Loan> = self
            .state
            .loans
            .values()
            .filter(|l| l.account_id == account_id)
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.id);
        Ok(loans)
    }

    async fn find_payments_for_loans(&mut self, ids: &[LoanId]) -> Result<Vec<Payment>, PortError> {
        Ok(sorted_payments(
            self.state.payments.values().filter(|p| ids.contains(&p.loan_id)),
        ))
    }

    async fn get_account_property(
        &mut self,
        account_id: AccountId,
    ) -> Result<Option<AccountProperty>, PortError> {
        Ok(self.state.account_properties.get(&account_id).cloned())
    }

    async fn find_ptps_for_transaction(
        &mut self,
        id: AccountTransactionId,
    ) -> Result<Vec<Ptp>, PortError> {
        Ok(self
            .state
            .ptps
            .iter()
            .rev()
            .filter(|p| p.account_transaction_id == Some(id))
            .cloned()
            .collect())
    }

    async fn find_latest_ptp_for_account_payment(
        &mut self,
        id: AccountPaymentId,
    ) -> Result<Option<Ptp>, PortError> {
        Ok(self
            .state
            .ptps
            .iter()
            .rev()
            .find(|p| p.account_payment_id == id)
            .cloned())
    }

    async fn insert_account_transaction(
        &mut self,
        trx: &AccountTransaction,
    ) -> Result<(), PortError> {
        self.check(StoreOperation::InsertAccountTransaction)?;
        if self.state.account_transaction(trx.id).is_some() {
            return Err(PortError::conflict(format!("duplicate account transaction {}", trx.id)));
        }
        if let Some(origin) = trx.reversed_transaction_origin_id {
            let already = self
                .state
                .account_transactions
                .iter()
                .any(|t| t.reversed_transaction_origin_id == Some(origin));
            if already {
                return Err(PortError::conflict(format!("{} already has a reversal", origin)));
            }
        }
        self.state.account_transactions.push(trx.clone());
        Ok(())
    }

    async fn insert_payback_transaction(
        &mut self,
        payback: &PaybackTransaction,
    ) -> Result<(), PortError> {
        self.check(StoreOperation::InsertPaybackTransaction)?;
        if self.state.paybacks.contains_key(&payback.id) {
            return Err(PortError::conflict(format!(
                "duplicate payback transaction {}",
                payback.id
            )));
        }
        self.state.paybacks.insert(payback.id, payback.clone());
        Ok(())
    }

    async fn save_payback_transaction(
        &mut self,
        payback: &PaybackTransaction,
    ) -> Result<(), PortError> {
        replace(&mut self.state.paybacks, "PaybackTransaction", payback.id, payback)
    }

    async fn insert_payment_event(&mut self, event: &PaymentEvent) -> Result<(), PortError> {
        self.check(StoreOperation::InsertPaymentEvent)?;
        if !self.state.payments.contains_key(&event.payment_id) {
            return Err(PortError::not_found("Payment", event.payment_id));
        }
        self.state.payment_events.push(event.clone());
        Ok(())
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        self.check(StoreOperation::SavePayment)?;
        if payment.paid_principal.is_negative()
            || payment.paid_interest.is_negative()
            || payment.paid_late_fee.is_negative()
        {
            return Err(PortError::conflict(format!("negative paid component on {}", payment.id)));
        }
        replace(&mut self.state.payments, "Payment", payment.id, payment)
    }

    async fn save_account_payment(
        &mut self,
        account_payment: &AccountPayment,
    ) -> Result<(), PortError> {
        self.check(StoreOperation::SaveAccountPayment)?;
        replace(
            &mut self.state.account_payments,
            "AccountPayment",
            account_payment.id,
            account_payment,
        )
    }

    async fn save_loan(&mut self, loan: &Loan) -> Result<(), PortError> {
        self.check(StoreOperation::SaveLoan)?;
        replace(&mut self.state.loans, "Loan", loan.id, loan)
    }

    async fn save_account_property(&mut self, property: &AccountProperty) -> Result<(), PortError> {
        self.check(StoreOperation::SaveAccountProperty)?;
        self.state
            .account_properties
            .insert(property.account_id, property.clone());
        Ok(())
    }

    async fn save_ptp(&mut self, ptp: &Ptp) -> Result<(), PortError> {
        self.check(StoreOperation::SavePtp)?;
        match self.state.ptps.iter_mut().find(|p| p.id == ptp.id) {
            Some(existing) => {
                *existing = ptp.clone();
                Ok(())
            }
            None => Err(PortError::not_found("Ptp", ptp.id)),
        }
    }
}
