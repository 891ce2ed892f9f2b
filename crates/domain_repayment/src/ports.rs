//! Storage and collaborator ports for the repayment domain
//!
//! A reversal runs inside exactly one store transaction. The store hands out
//! a [`RepaymentTx`]; every read and write of the reversal goes through it,
//! and nothing becomes visible until [`RepaymentStore::commit`] succeeds.
//! Dropping a transaction without committing rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{
    AccountId, AccountPaymentId, AccountTransactionId, DomainPort, LoanId, PaybackTransactionId,
    PaymentId, PortError,
};

use crate::account::{Account, AccountProperty, Loan};
use crate::account_payment::AccountPayment;
use crate::error::RepaymentError;
use crate::payment::Payment;
use crate::payment_event::PaymentEvent;
use crate::ptp::Ptp;
use crate::transaction::{AccountTransaction, PaybackTransaction};

/// Factory for repayment transactions
#[async_trait]
pub trait RepaymentStore: DomainPort {
    type Tx: RepaymentTx + 'static;

    /// Opens a new transaction
    async fn begin(&self) -> Result<Self::Tx, PortError>;

    /// Makes every write of `tx` durable
    async fn commit(&self, tx: Self::Tx) -> Result<(), PortError>;
}

/// Unit of work over the repayment tables
///
/// Finders return `Option`/`Vec` rather than failing on absence; errors are
/// reserved for the storage itself.
#[async_trait]
pub trait RepaymentTx: Send {
    /// Locks the account row until the transaction ends
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, PortError>;

    async fn get_account_transaction(
        &mut self,
        id: AccountTransactionId,
    ) -> Result<Option<AccountTransaction>, PortError>;

    /// The void transaction pointing at `origin`, if one was written
    async fn find_reversal_of(
        &mut self,
        origin: AccountTransactionId,
    ) -> Result<Option<AccountTransaction>, PortError>;

    async fn find_payment_events_for_transaction(
        &mut self,
        id: AccountTransactionId,
    ) -> Result<Vec<PaymentEvent>, PortError>;

    async fn get_payback_transaction(
        &mut self,
        id: PaybackTransactionId,
    ) -> Result<Option<PaybackTransaction>, PortError>;

    async fn get_payments(&mut self, ids: &[PaymentId]) -> Result<Vec<Payment>, PortError>;

    async fn get_account_payments(
        &mut self,
        ids: &[AccountPaymentId],
    ) -> Result<Vec<AccountPayment>, PortError>;

    /// Bills of the account with money still owed, oldest due date first
    async fn find_unpaid_account_payments(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<AccountPayment>, PortError>;

    async fn find_payments_for_account_payments(
        &mut self,
        ids: &[AccountPaymentId],
    ) -> Result<Vec<Payment>, PortError>;

    async fn get_loans(&mut self, ids: &[LoanId]) -> Result<Vec<Loan>, PortError>;

    async fn find_loans_for_account(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<Loan>, PortError>;

    async fn find_payments_for_loans(&mut self, ids: &[LoanId]) -> Result<Vec<Payment>, PortError>;

    async fn get_account_property(
        &mut self,
        account_id: AccountId,
    ) -> Result<Option<AccountProperty>, PortError>;

    /// Promises last credited by the given transaction, newest first
    async fn find_ptps_for_transaction(
        &mut self,
        id: AccountTransactionId,
    ) -> Result<Vec<Ptp>, PortError>;

    /// Most recent promise made on the given bill
    async fn find_latest_ptp_for_account_payment(
        &mut self,
        id: AccountPaymentId,
    ) -> Result<Option<Ptp>, PortError>;

    async fn insert_account_transaction(
        &mut self,
        trx: &AccountTransaction,
    ) -> Result<(), PortError>;

    async fn insert_payback_transaction(
        &mut self,
        payback: &PaybackTransaction,
    ) -> Result<(), PortError>;

    async fn save_payback_transaction(
        &mut self,
        payback: &PaybackTransaction,
    ) -> Result<(), PortError>;

    async fn insert_payment_event(&mut self, event: &PaymentEvent) -> Result<(), PortError>;

    async fn save_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    async fn save_account_payment(
        &mut self,
        account_payment: &AccountPayment,
    ) -> Result<(), PortError>;

    async fn save_loan(&mut self, loan: &Loan) -> Result<(), PortError>;

    async fn save_account_property(&mut self, property: &AccountProperty) -> Result<(), PortError>;

    async fn save_ptp(&mut self, ptp: &Ptp) -> Result<(), PortError>;
}

/// Request to apply a gateway payment to an account
#[derive(Debug, Clone)]
pub struct RepaymentRequest {
    /// Payback transaction already inserted in the current transaction
    pub payback: PaybackTransaction,
    pub note: Option<String>,
    /// Whether the account is enrolled in the cashback experiment
    pub cashback_experiment: bool,
    pub at: DateTime<Utc>,
}

impl RepaymentRequest {
    pub fn new(payback: PaybackTransaction) -> Self {
        let at = payback.transaction_date;
        Self {
            payback,
            note: None,
            cashback_experiment: false,
            at,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_cashback_experiment(mut self, enabled: bool) -> Self {
        self.cashback_experiment = enabled;
        self
    }
}

/// Applies incoming money to an account's bills
#[async_trait]
pub trait RepaymentProcessor: DomainPort {
    /// Returns the `payment` transaction written, or `None` when nothing was due
    async fn process_repayment_trx(
        &self,
        tx: &mut dyn RepaymentTx,
        request: RepaymentRequest,
    ) -> Result<Option<AccountTransaction>, RepaymentError>;
}
