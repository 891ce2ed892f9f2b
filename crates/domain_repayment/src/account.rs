//! Accounts, loans and derived account flags

use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, CustomerId, LoanId, Money};

/// Account lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Inactive,
    Active,
    ActiveInGrace,
    Suspended,
}

impl AccountStatus {
    pub fn code(&self) -> i32 {
        match self {
            AccountStatus::Inactive => 410,
            AccountStatus::Active => 420,
            AccountStatus::ActiveInGrace => 421,
            AccountStatus::Suspended => 430,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            410 => Some(AccountStatus::Inactive),
            420 => Some(AccountStatus::Active),
            421 => Some(AccountStatus::ActiveInGrace),
            430 => Some(AccountStatus::Suspended),
            _ => None,
        }
    }
}

/// A customer's credit account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub customer_id: CustomerId,
    pub status: AccountStatus,
}

impl Account {
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            id: AccountId::new_v7(),
            customer_id,
            status: AccountStatus::Active,
        }
    }
}

/// Per-account derived flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProperty {
    pub account_id: AccountId,
    /// Customer has fully repaid a loan large enough to be trusted
    pub is_proven: bool,
    /// Customer may hold more than one active loan
    pub concurrency: bool,
}

impl AccountProperty {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            is_proven: false,
            concurrency: false,
        }
    }
}

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Current,
    Late,
    PaidOff,
}

impl LoanStatus {
    pub fn code(&self) -> i32 {
        match self {
            LoanStatus::Current => 220,
            LoanStatus::Late => 230,
            LoanStatus::PaidOff => 250,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            220 => Some(LoanStatus::Current),
            230 => Some(LoanStatus::Late),
            250 => Some(LoanStatus::PaidOff),
            _ => None,
        }
    }
}

/// A disbursed loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub account_id: AccountId,
    pub loan_amount: Money,
    pub status: LoanStatus,
}

impl Loan {
    pub fn new(account_id: AccountId, loan_amount: Money) -> Self {
        Self {
            id: LoanId::new_v7(),
            account_id,
            loan_amount,
            status: LoanStatus::Current,
        }
    }

    pub fn is_paid_off(&self) -> bool {
        self.status == LoanStatus::PaidOff
    }
}
