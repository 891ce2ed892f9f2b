//! Customer-facing bills
//!
//! An `AccountPayment` groups every installment of an account that falls due
//! on the same date. Its amounts are kept equal to the sum of its payments.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, AccountPaymentId, Currency, Money};

use crate::payment::{Component, Payment, PaymentStatus};

/// Aggregate bill for one due date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPayment {
    pub id: AccountPaymentId,
    pub account_id: AccountId,
    pub due_date: NaiveDate,
    pub due_amount: Money,
    pub principal_amount: Money,
    pub interest_amount: Money,
    pub late_fee_amount: Money,
    pub paid_amount: Money,
    pub paid_principal: Money,
    pub paid_interest: Money,
    pub paid_late_fee: Money,
    pub paid_date: Option<NaiveDate>,
    pub status: PaymentStatus,
}

impl AccountPayment {
    /// Creates an empty bill; amounts are filled in with [`AccountPayment::recompute_from`]
    pub fn new(account_id: AccountId, due_date: NaiveDate, currency: Currency) -> Self {
        let zero = Money::zero(currency);
        Self {
            id: AccountPaymentId::new_v7(),
            account_id,
            due_date,
            due_amount: zero,
            principal_amount: zero,
            interest_amount: zero,
            late_fee_amount: zero,
            paid_amount: zero,
            paid_principal: zero,
            paid_interest: zero,
            paid_late_fee: zero,
            paid_date: None,
            status: PaymentStatus::NotDue,
        }
    }

    /// Rebuilds every amount field from the bill's installments
    pub fn recompute_from<'a>(&mut self, payments: impl IntoIterator<Item = &'a Payment>) {
        let zero = Money::zero(self.due_amount.currency());
        self.due_amount = zero;
        self.principal_amount = zero;
        self.interest_amount = zero;
        self.late_fee_amount = zero;
        self.paid_amount = zero;
        self.paid_principal = zero;
        self.paid_interest = zero;
        self.paid_late_fee = zero;

        for payment in payments {
            self.due_amount = self.due_amount + payment.due_amount;
            self.principal_amount = self.principal_amount + payment.installment_principal;
            self.interest_amount = self.interest_amount + payment.installment_interest;
            self.late_fee_amount = self.late_fee_amount + payment.late_fee_amount;
            self.paid_amount = self.paid_amount + payment.paid_amount;
            self.paid_principal = self.paid_principal + payment.paid_principal;
            self.paid_interest = self.paid_interest + payment.paid_interest;
            self.paid_late_fee = self.paid_late_fee + payment.paid_late_fee;
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

    fn paid_mut(&mut self, component: Component) -> &mut Money {
        match component {
            Component::LateFee => &mut self.paid_late_fee,
            Component::Interest => &mut self.paid_interest,
            Component::Principal => &mut self.paid_principal,
        }
    }

    /// Records money applied to a component of one of the bill's installments
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

    /// Removes part of a previously charged late fee
    pub fn remove_late_fee(&mut self, amount: Money) {
        self.late_fee_amount = self.late_fee_amount - amount;
        self.due_amount = self.due_amount - amount;
    }

    pub fn is_fully_paid(&self) -> bool {
        !self.due_amount.is_positive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::LoanId;

    #[test]
    fn test_recompute_from_sums_installments() {
        let due = NaiveDate::from_ymd_opt(2024, 5, 28).unwrap();
        let mut bill = AccountPayment::new(AccountId::new(), due, Currency::IDR);
        let mut first =
            Payment::new(LoanId::new(), bill.id, 1, due, Money::idr(100_000), Money::idr(10_000));
        let second =
            Payment::new(LoanId::new(), bill.id, 1, due, Money::idr(200_000), Money::idr(20_000));
        first.apply(Component::Interest, Money::idr(10_000));

        bill.recompute_from([&first, &second]);

        assert_eq!(bill.principal_amount, Money::idr(300_000));
        assert_eq!(bill.interest_amount, Money::idr(30_000));
        assert_eq!(bill.paid_interest, Money::idr(10_000));
        assert_eq!(bill.due_amount, Money::idr(320_000));
    }

    #[test]
    fn test_unwind_moves_paid_back_to_due() {
        let due = NaiveDate::from_ymd_opt(2024, 5, 28).unwrap();
        let mut bill = AccountPayment::new(AccountId::new(), due, Currency::IDR);
        bill.apply(Component::Principal, Money::idr(50_000));
        bill.unwind(Component::Principal, Money::idr(20_000));
        assert_eq!(bill.paid_principal, Money::idr(30_000));
        assert_eq!(bill.paid_amount, Money::idr(30_000));
        assert_eq!(bill.due_amount, Money::idr(-30_000));
    }
}
