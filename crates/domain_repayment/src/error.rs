//! Repayment domain errors

use core_kernel::{AccountId, AccountTransactionId, Money, MoneyError, PortError};
use thiserror::Error;

/// Errors that can occur in the repayment domain
#[derive(Debug, Error)]
pub enum RepaymentError {
    /// Account transaction not found
    #[error("Account transaction not found: {0}")]
    TransactionNotFound(AccountTransactionId),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The transaction exists but cannot be reversed
    #[error("Account transaction {id} is not reversible: {reason}")]
    NotReversible {
        id: AccountTransactionId,
        reason: String,
    },

    /// A void transaction already exists for this transaction
    #[error("Account transaction {origin} was already reversed by {reversal}")]
    AlreadyReversed {
        origin: AccountTransactionId,
        reversal: AccountTransactionId,
    },

    /// The transaction has no originating payback transaction
    #[error("Account transaction {0} has no payback transaction")]
    MissingPaybackTransaction(AccountTransactionId),

    /// The transaction has no payment events to unwind
    #[error("Account transaction {0} has no payment events")]
    NoPaymentEvents(AccountTransactionId),

    /// Every payment touched by the transaction is already unpaid
    #[error("Nothing left to reverse for account transaction {0}")]
    NothingToReverse(AccountTransactionId),

    /// Reversal amount exceeds what was paid across all components
    #[error("Reversal of {origin} exceeds paid amounts, {remaining} left unallocated")]
    OverReversal {
        origin: AccountTransactionId,
        remaining: Money,
    },

    /// Money arithmetic error
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Storage port error
    #[error("Port error: {0}")]
    Port(#[from] PortError),
}

impl RepaymentError {
    /// Creates a NotReversible error
    pub fn not_reversible(id: AccountTransactionId, reason: impl Into<String>) -> Self {
        RepaymentError::NotReversible {
            id,
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RepaymentError::Port(e) if e.is_transient())
    }
}
