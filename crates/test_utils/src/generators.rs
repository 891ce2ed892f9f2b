//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating installments and reversal
//! amounts that keep the ledger invariants: paid components never exceed
//! what was billed.

use chrono::NaiveDate;
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use proptest::prelude::*;

use core_kernel::{AccountPaymentId, LoanId, Money};
use domain_repayment::{AccountPayment, Component, Payment};

/// Strategy for rupiah amounts between 1 and 5 million
pub fn rupiah_strategy() -> impl Strategy<Value = Money> {
    (1i64..5_000_000i64).prop_map(Money::idr)
}

/// Strategy for reversal amounts, zero included
pub fn reversal_amount_strategy() -> impl Strategy<Value = Money> {
    (0i64..10_000_000i64).prop_map(Money::idr)
}

/// Strategy for due dates in 2024
pub fn due_date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0u32..366u32).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.checked_add_days(chrono::Days::new(offset as u64)))
            .expect("date in 2024")
    })
}

/// Strategy for one installment with arbitrary partial payments
///
/// Each component is billed between 0 and 2 million and paid between none
/// and all of it.
pub fn partially_paid_payment_strategy(
    account_payment_id: AccountPaymentId,
) -> impl Strategy<Value = Payment> {
    (
        0i64..2_000_000i64,
        0i64..500_000i64,
        0i64..100_000i64,
        0.0f64..=1.0f64,
        0.0f64..=1.0f64,
        0.0f64..=1.0f64,
        due_date_strategy(),
    )
        .prop_map(move |(principal, interest, late_fee, pp, pi, pl, due)| {
            let mut payment = Payment::new(
                LoanId::new(),
                account_payment_id,
                1,
                due,
                Money::idr(principal),
                Money::idr(interest),
            );
            payment.charge_late_fee(Money::idr(late_fee));
            payment.apply(Component::LateFee, Money::idr((late_fee as f64 * pl) as i64));
            payment.apply(Component::Interest, Money::idr((interest as f64 * pi) as i64));
            payment.apply(Component::Principal, Money::idr((principal as f64 * pp) as i64));
            payment
        })
}

/// Strategy for a bill with 1 to 4 partially paid installments
pub fn bill_strategy() -> impl Strategy<Value = (AccountPayment, Vec<Payment>)> {
    due_date_strategy().prop_flat_map(|due| {
        let bill =
            AccountPayment::new(core_kernel::AccountId::new(), due, core_kernel::Currency::IDR);
        let bill_id = bill.id;
        proptest::collection::vec(partially_paid_payment_strategy(bill_id), 1..=4).prop_map(
            move |payments| {
                let mut bill = bill.clone();
                bill.recompute_from(&payments);
                (bill, payments)
            },
        )
    })
}

/// A random free-text reversal note
pub fn reversal_note() -> String {
    Sentence(3..8).fake()
}
