//! Reversal amount consumers
//!
//! Each consumer walks a bill's installments in order and takes previously
//! applied money back off one component, keeping the installment and its
//! bill in step. Whatever cannot be taken is handed back as the remainder so
//! the caller can spill it into the next component.

use core_kernel::{Money, PaymentId};

use crate::account_payment::AccountPayment;
use crate::payment::{Component, ComponentBreakdown, Payment};

/// Result of running one consumer
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumeResult {
    /// Amount still to be reversed
    pub remaining: Money,
    /// Amount taken off the component across all installments
    pub total_reversed: Money,
    /// Amount taken per installment, in the order they were visited
    pub per_payment: Vec<(PaymentId, Money)>,
}

impl ConsumeResult {
    fn untouched(amount: Money) -> Self {
        Self {
            remaining: amount,
            total_reversed: Money::zero(amount.currency()),
            per_payment: Vec::new(),
        }
    }
}

/// Money taken off one installment across all components
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReversal {
    pub payment_id: PaymentId,
    pub components: ComponentBreakdown,
}

impl PaymentReversal {
    pub fn total(&self) -> Money {
        self.components.total()
    }
}

/// Result of running the consumers in precedence order
#[derive(Debug, Clone, PartialEq)]
pub struct PrecedenceResult {
    pub remaining: Money,
    pub reversed: ComponentBreakdown,
    pub per_payment: Vec<PaymentReversal>,
}

impl PrecedenceResult {
    pub fn total_reversed(&self) -> Money {
        self.reversed.total()
    }
}

/// Orders installments the way consumers expect them: due date, then id
pub fn sort_payments_for_reversal(payments: &mut [Payment]) {
    payments.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
}

fn consume_component(
    component: Component,
    payments: &mut [Payment],
    reversal_amount: Money,
    account_payment: &mut AccountPayment,
) -> ConsumeResult {
    if !reversal_amount.is_positive() {
        return ConsumeResult::untouched(reversal_amount.floor_zero());
    }

    let mut result = ConsumeResult::untouched(reversal_amount);

    for payment in payments.iter_mut() {
        if result.remaining.is_zero() {
            break;
        }

        let paid = payment.paid(component);
        if !paid.is_positive() {
            continue;
        }

        let take = result.remaining.min(paid);
        payment.unwind(component, take);
        account_payment.unwind(component, take);
        if payment.paid_amount.is_zero() {
            payment.paid_date = None;
        }

        result.remaining = result.remaining - take;
        result.total_reversed = result.total_reversed + take;
        result.per_payment.push((payment.id, take));

        tracing::debug!(
            payment_id = %payment.id,
            component = %component,
            amount = %take,
            "Consumed reversal amount"
        );
    }

    if account_payment.paid_amount.is_zero() {
        account_payment.paid_date = None;
    }

    result
}

/// Takes reversed money off paid late fees
pub fn consume_reversal_for_late_fee(
    payments: &mut [Payment],
    reversal_amount: Money,
    account_payment: &mut AccountPayment,
) -> ConsumeResult {
    consume_component(Component::LateFee, payments, reversal_amount, account_payment)
}

/// Takes reversed money off paid interest
pub fn consume_reversal_for_interest(
    payments: &mut [Payment],
    reversal_amount: Money,
    account_payment: &mut AccountPayment,
) -> ConsumeResult {
    consume_component(Component::Interest, payments, reversal_amount, account_payment)
}

/// Takes reversed money off paid principal
pub fn consume_reversal_for_principal(
    payments: &mut [Payment],
    reversal_amount: Money,
    account_payment: &mut AccountPayment,
) -> ConsumeResult {
    consume_component(Component::Principal, payments, reversal_amount, account_payment)
}

/// Runs the late fee, interest and principal consumers, carrying the remainder forward
pub fn consume_reversal_in_precedence(
    payments: &mut [Payment],
    reversal_amount: Money,
    account_payment: &mut AccountPayment,
) -> PrecedenceResult {
    let currency = reversal_amount.currency();
    let mut result = PrecedenceResult {
        remaining: reversal_amount,
        reversed: ComponentBreakdown::zero(currency),
        per_payment: Vec::new(),
    };

    for component in Component::PRECEDENCE {
        let consumed = match component {
            Component::LateFee => {
                consume_reversal_for_late_fee(payments, result.remaining, account_payment)
            }
            Component::Interest => {
                consume_reversal_for_interest(payments, result.remaining, account_payment)
            }
            Component::Principal => {
                consume_reversal_for_principal(payments, result.remaining, account_payment)
            }
        };

        result.remaining = consumed.remaining;
        result.reversed.add(component, consumed.total_reversed);

        for (payment_id, amount) in consumed.per_payment {
            match result.per_payment.iter_mut().find(|p| p.payment_id == payment_id) {
                Some(entry) => entry.components.add(component, amount),
                None => {
                    let mut components = ComponentBreakdown::zero(currency);
                    components.add(component, amount);
                    result.per_payment.push(PaymentReversal { payment_id, components });
                }
            }
        }
    }

    result
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{AccountId, Currency, LoanId};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn conservation_and_non_negativity(
            paid in prop::collection::vec((0i64..=10_000, 0i64..=20_000, 0i64..=100_000), 1..5),
            amount in 0i64..=400_000,
        ) {
            let due = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
            let mut bill = AccountPayment::new(AccountId::new(), due, Currency::IDR);
            let mut payments: Vec<Payment> = paid
                .iter()
                .enumerate()
                .map(|(i, (late_fee, interest, principal))| {
                    let mut p = Payment::new(
                        LoanId::new(),
                        bill.id,
                        i as i32 + 1,
                        due,
                        Money::idr(100_000),
                        Money::idr(20_000),
                    );
                    p.charge_late_fee(Money::idr(10_000));
                    p.apply(Component::LateFee, Money::idr(*late_fee));
                    p.apply(Component::Interest, Money::idr(*interest));
                    p.apply(Component::Principal, Money::idr(*principal));
                    p
                })
                .collect();
            bill.recompute_from(&payments);

            let result =
                consume_reversal_in_precedence(&mut payments, Money::idr(amount), &mut bill);

            prop_assert_eq!(result.total_reversed() + result.remaining, Money::idr(amount));
            for p in &payments {
                for c in Component::PRECEDENCE {
                    prop_assert!(!p.paid(c).is_negative());
                    prop_assert!(p.paid(c) <= p.billed(c));
                }
                prop_assert_eq!(
                    p.paid_amount,
                    p.paid_principal + p.paid_interest + p.paid_late_fee
                );
            }

            let mut expected = bill.clone();
            expected.recompute_from(&payments);
            prop_assert_eq!(bill.paid_amount, expected.paid_amount);
            prop_assert_eq!(bill.due_amount, expected.due_amount);
        }
    }
}
