//! Ledger movements
//!
//! Every money movement on an account is recorded as an `AccountTransaction`.
//! Rows are append-only: undoing one means writing a new row with the
//! negated amount that points back at the original.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    AccountId, AccountTransactionId, Money, PaybackTransactionId, Timezone,
};

use crate::payment::ComponentBreakdown;

/// Kind of ledger movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Customer repayment credited to the account
    Payment,
    /// Reversal of a repayment
    PaymentVoid,
    /// Late fee charged to the account
    LateFee,
    /// Reversal of a late fee charge
    LateFeeVoid,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "payment",
            TransactionType::PaymentVoid => "payment_void",
            TransactionType::LateFee => "late_fee",
            TransactionType::LateFeeVoid => "late_fee_void",
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TransactionType::PaymentVoid | TransactionType::LateFeeVoid)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(TransactionType::Payment),
            "payment_void" => Ok(TransactionType::PaymentVoid),
            "late_fee" => Ok(TransactionType::LateFee),
            "late_fee_void" => Ok(TransactionType::LateFeeVoid),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

/// A signed ledger entry against an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTransaction {
    pub id: AccountTransactionId,
    pub account_id: AccountId,
    /// Gateway event that produced this movement, if any
    pub payback_transaction_id: Option<PaybackTransactionId>,
    pub transaction_type: TransactionType,
    pub transaction_amount: Money,
    pub towards_principal: Money,
    pub towards_interest: Money,
    pub towards_latefee: Money,
    pub transaction_date: DateTime<Utc>,
    pub accounting_date: NaiveDate,
    /// Set on void rows; the transaction being reversed
    pub reversed_transaction_origin_id: Option<AccountTransactionId>,
    pub note: Option<String>,
}

impl AccountTransaction {
    /// Creates a transaction dated `transaction_date`
    ///
    /// It is booked on the Jakarta calendar date until [`Self::booked_in`]
    /// moves it to another business timezone.
    pub fn new(
        account_id: AccountId,
        transaction_type: TransactionType,
        transaction_amount: Money,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        let zero = Money::zero(transaction_amount.currency());
        Self {
            id: AccountTransactionId::new_v7(),
            account_id,
            payback_transaction_id: None,
            transaction_type,
            transaction_amount,
            towards_principal: zero,
            towards_interest: zero,
            towards_latefee: zero,
            transaction_date,
            accounting_date: Timezone::jakarta().local_date(transaction_date),
            reversed_transaction_origin_id: None,
            note: None,
        }
    }

    /// Builds the void row for `origin`: same account and payback, negated amount
    pub fn void_of(
        origin: &AccountTransaction,
        transaction_type: TransactionType,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        let mut void = Self::new(
            origin.account_id,
            transaction_type,
            -origin.transaction_amount,
            transaction_date,
        );
        void.payback_transaction_id = origin.payback_transaction_id;
        void.reversed_transaction_origin_id = Some(origin.id);
        void
    }

    /// Books the transaction on its calendar date in `timezone`
    pub fn booked_in(mut self, timezone: &Timezone) -> Self {
        self.accounting_date = timezone.local_date(self.transaction_date);
        self
    }

    pub fn with_payback(mut self, payback_transaction_id: PaybackTransactionId) -> Self {
        self.payback_transaction_id = Some(payback_transaction_id);
        self
    }

    pub fn with_components(mut self, components: ComponentBreakdown) -> Self {
        self.towards_principal = components.principal;
        self.towards_interest = components.interest;
        self.towards_latefee = components.late_fee;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn components(&self) -> ComponentBreakdown {
        ComponentBreakdown {
            principal: self.towards_principal,
            interest: self.towards_interest,
            late_fee: self.towards_latefee,
        }
    }
}

/// An incoming payment notification from a payment gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaybackTransaction {
    pub id: PaybackTransactionId,
    pub account_id: AccountId,
    pub amount: Money,
    /// Channel the money came through (e.g. "bca", "gopay")
    pub payback_service: String,
    /// Gateway-side reference
    pub transaction_id: Option<String>,
    pub is_processed: bool,
    pub transaction_date: DateTime<Utc>,
}

impl PaybackTransaction {
    pub fn new(
        account_id: AccountId,
        amount: Money,
        payback_service: impl Into<String>,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaybackTransactionId::new_v7(),
            account_id,
            amount,
            payback_service: payback_service.into(),
            transaction_id: None,
            is_processed: false,
            transaction_date,
        }
    }

    pub fn with_reference(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }
}
