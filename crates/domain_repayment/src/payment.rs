//! Loan installments
//!
//! A `Payment` is one installment of a loan. Its due amount is made of three
//! components (principal, interest and late fee) that are paid and reversed
//! independently.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{AccountPaymentId, Currency, LoanId, Money, PaymentId};

/// The sub-amounts that make up an installment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    LateFee,
    Interest,
    Principal,
}

impl Component {
    /// Order in which repayments are applied and reversals are unwound
    pub const PRECEDENCE: [Component; 3] =
        [Component::LateFee, Component::Interest, Component::Principal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::LateFee => "late_fee",
            Component::Interest => "interest",
            Component::Principal => "principal",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amounts split by component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentBreakdown {
    pub principal: Money,
    pub interest: Money,
    pub late_fee: Money,
}

impl ComponentBreakdown {
    pub fn zero(currency: Currency) -> Self {
        Self {
            principal: Money::zero(currency),
            interest: Money::zero(currency),
            late_fee: Money::zero(currency),
        }
    }

    pub fn get(&self, component: Component) -> Money {
        match component {
            Component::LateFee => self.late_fee,
            Component::Interest => self.interest,
            Component::Principal => self.principal,
        }
    }

    pub fn add(&mut self, component: Component, amount: Money) {
        match component {
            Component::LateFee => self.late_fee = self.late_fee + amount,
            Component::Interest => self.interest = self.interest + amount,
            Component::Principal => self.principal = self.principal + amount,
        }
    }

    pub fn total(&self) -> Money {
        self.principal + self.interest + self.late_fee
    }

    pub fn negated(&self) -> Self {
        Self {
            principal: -self.principal,
            interest: -self.interest,
            late_fee: -self.late_fee,
        }
    }
}

/// Payment status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NotDue,
    DueIn3Days,
    DueToday,
    DueIn1Day,
    Dpd1,
    Dpd5,
    Dpd30,
    Dpd60,
    Dpd90,
    Dpd120,
    Dpd150,
    Dpd180,
    PaidOnTime,
    PaidWithinGrace,
    PaidLate,
}

impl PaymentStatus {
    /// Numeric status code as stored in the database
    pub fn code(&self) -> i32 {
        match self {
            PaymentStatus::NotDue => 310,
            PaymentStatus::DueIn3Days => 311,
            PaymentStatus::DueToday => 312,
            PaymentStatus::DueIn1Day => 313,
            PaymentStatus::Dpd1 => 320,
            PaymentStatus::Dpd5 => 321,
            PaymentStatus::Dpd30 => 322,
            PaymentStatus::Dpd60 => 323,
            PaymentStatus::Dpd90 => 324,
            PaymentStatus::Dpd120 => 325,
            PaymentStatus::Dpd150 => 326,
            PaymentStatus::Dpd180 => 327,
            PaymentStatus::PaidOnTime => 330,
            PaymentStatus::PaidWithinGrace => 331,
            PaymentStatus::PaidLate => 332,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let status = match code {
            310 => PaymentStatus::NotDue,
            311 => PaymentStatus::DueIn3Days,
            312 => PaymentStatus::DueToday,
            313 => PaymentStatus::DueIn1Day,
            320 => PaymentStatus::Dpd1,
            321 => PaymentStatus::Dpd5,
            322 => PaymentStatus::Dpd30,
            323 => PaymentStatus::Dpd60,
            324 => PaymentStatus::Dpd90,
            325 => PaymentStatus::Dpd120,
            326 => PaymentStatus::Dpd150,
            327 => PaymentStatus::Dpd180,
            330 => PaymentStatus::PaidOnTime,
            331 => PaymentStatus::PaidWithinGrace,
            332 => PaymentStatus::PaidLate,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_paid(&self) -> bool {
        self.code() >= 330
    }

    pub fn is_overdue(&self) -> bool {
        (320..330).contains(&self.code())
    }
}

/// A single loan installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub account_payment_id: AccountPaymentId,
    pub payment_number: i32,
    pub due_date: NaiveDate,
    /// Outstanding amount still owed on this installment
    pub due_amount: Money,
    pub installment_principal: Money,
    pub installment_interest: Money,
    pub late_fee_amount: Money,
    pub paid_amount: Money,
    pub paid_principal: Money,
    pub paid_interest: Money,
    pub paid_late_fee: Money,
    pub paid_date: Option<NaiveDate>,
    pub status: PaymentStatus,
}

impl Payment {
    /// Creates an unpaid installment
    pub fn new(
        loan_id: LoanId,
        account_payment_id: AccountPaymentId,
        payment_number: i32,
        due_date: NaiveDate,
        principal: Money,
        interest: Money,
    ) -> Self {
        let zero = Money::zero(principal.currency());
        Self {
            id: PaymentId::new_v7(),
            loan_id,
            account_payment_id,
            payment_number,
            due_date,
            due_amount: principal + interest,
            installment_principal: principal,
            installment_interest: interest,
            late_fee_amount: zero,
            paid_amount: zero,
            paid_principal: zero,
            paid_interest: zero,
            paid_late_fee: zero,
            paid_date: None,
            status: PaymentStatus::NotDue,
        }
    }

    pub fn currency(&self) -> Currency {
        self.due_amount.currency()
    }

    /// Amount billed for a component
    pub fn billed(&self, component: Component) -> Money {
        match component {
            Component::LateFee => self.late_fee_amount,
            Component::Interest => self.installment_interest,
            Component::Principal => self.installment_principal,
        }
    }

    /// Amount already paid towards a component
    pub fn paid(&self, component: Component) -> Money {
        match component {
            Component::LateFee => self.paid_late_fee,
            Component::Interest => self.paid_interest,
            Component::Principal => self.paid_principal,
        }
    }

    /// Amount of a component still unpaid
    pub fn outstanding(&self, component: Component) -> Money {
        (self.billed(component) - self.paid(component)).floor_zero()
    }

    fn paid_mut(&mut self, component: Component) -> &mut Money {
        match component {
            Component::LateFee => &mut self.paid_late_fee,
            Component::Interest => &mut self.paid_interest,
            Component::Principal => &mut self.paid_principal,
        }
    }

    /// Records money applied to a component
    pub fn apply(&mut self, component: Component, amount: Money) {
        let paid = self.paid_mut(component);
        *paid = *paid + amount;
        self.paid_amount = self.paid_amount + amount;
        self.due_amount = self.due_amount - amount;
    }

    /// Takes previously applied money back off a component
    pub fn unwind(&mut self, component: Component, amount: Money) {
        let paid = self.paid_mut(component);
        *paid = *paid - amount;
        self.paid_amount = self.paid_amount - amount;
        self.due_amount = self.due_amount + amount;
    }

    /// Charges a late fee on this installment
    pub fn charge_late_fee(&mut self, amount: Money) {
        self.late_fee_amount = self.late_fee_amount + amount;
        self.due_amount = self.due_amount + amount;
    }

    /// Removes part of a previously charged late fee
    pub fn remove_late_fee(&mut self, amount: Money) {
        self.late_fee_amount = self.late_fee_amount - amount;
        self.due_amount = self.due_amount - amount;
    }

    pub fn is_fully_paid(&self) -> bool {
        !self.due_amount.is_positive()
    }
}
