//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for ledger state that give more
//! meaningful error messages than standard assertions.

use core_kernel::{AccountId, Money};
use domain_repayment::{AccountPayment, Payment};

use crate::store::LedgerState;

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that a Money value is negative
pub fn assert_money_negative(money: &Money) {
    assert!(
        money.is_negative(),
        "Expected negative money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that no paid component of any installment is negative
///
/// # Panics
///
/// Panics naming the first installment with a negative component.
pub fn assert_paid_components_non_negative(state: &LedgerState) {
    for payment in state.payments.values() {
        assert!(
            !payment.paid_principal.is_negative()
                && !payment.paid_interest.is_negative()
                && !payment.paid_late_fee.is_negative(),
            "Payment {} has a negative paid component: principal={}, interest={}, late_fee={}",
            payment.id,
            payment.paid_principal,
            payment.paid_interest,
            payment.paid_late_fee
        );
    }
}

/// Asserts that a payment's amounts add up
///
/// `due_amount + paid_amount` must equal everything billed, and
/// `paid_amount` must equal the sum of its paid components.
pub fn assert_payment_balanced(payment: &Payment) {
    let billed =
        payment.installment_principal + payment.installment_interest + payment.late_fee_amount;
    assert_eq!(
        payment.due_amount + payment.paid_amount,
        billed,
        "Payment {} does not balance: due={} paid={} billed={}",
        payment.id,
        payment.due_amount,
        payment.paid_amount,
        billed
    );
    assert_eq!(
        payment.paid_amount,
        payment.paid_principal + payment.paid_interest + payment.paid_late_fee,
        "Payment {} paid_amount differs from its components",
        payment.id
    );
}

/// Asserts that every bill equals the sum of its installments
pub fn assert_bills_match_installments(state: &LedgerState) {
    for bill in state.account_payments.values() {
        let mut expected =
            AccountPayment::new(bill.account_id, bill.due_date, bill.due_amount.currency());
        expected.recompute_from(
            state
                .payments
                .values()
                .filter(|p| p.account_payment_id == bill.id),
        );

        let fields = [
            ("due_amount", bill.due_amount, expected.due_amount),
            ("paid_amount", bill.paid_amount, expected.paid_amount),
            ("paid_principal", bill.paid_principal, expected.paid_principal),
            ("paid_interest", bill.paid_interest, expected.paid_interest),
            ("paid_late_fee", bill.paid_late_fee, expected.paid_late_fee),
            ("late_fee_amount", bill.late_fee_amount, expected.late_fee_amount),
        ];
        for (field, actual, wanted) in fields {
            assert_eq!(actual, wanted, "Bill {} {} drifted", bill.id, field);
        }
    }
}

/// Asserts the full set of ledger invariants
pub fn assert_ledger_consistent(state: &LedgerState) {
    assert_paid_components_non_negative(state);
    for payment in state.payments.values() {
        assert_payment_balanced(payment);
    }
    assert_bills_match_installments(state);
}

/// Sum of every account transaction on an account
pub fn account_balance(state: &LedgerState, account_id: AccountId) -> Money {
    state
        .account_transactions
        .iter()
        .filter(|t| t.account_id == account_id)
        .fold(Money::idr(0), |acc, t| acc + t.transaction_amount)
}

/// Asserts that `after` still holds every row of the append-only tables in `before`, unchanged
pub fn assert_append_only(before: &LedgerState, after: &LedgerState) {
    for trx in &before.account_transactions {
        assert_eq!(
            after.account_transaction(trx.id),
            Some(trx),
            "Account transaction {} was modified or removed",
            trx.id
        );
    }
    for event in &before.payment_events {
        assert!(
            after.payment_events.iter().any(|e| e == event),
            "Payment event {} was modified or removed",
            event.id
        );
    }
}
