//! Before/after snapshots of installment paid amounts

use serde::{Deserialize, Serialize};

use core_kernel::{LoanId, Money, PaymentId};

use crate::payment::Payment;

/// Paid amount of one installment before money moved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OldPaidAmount {
    pub payment_id: PaymentId,
    pub paid_amount: Money,
}

/// Installments of one loan whose paid amount changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPayments {
    pub loan_id: LoanId,
    pub payment_ids: Vec<PaymentId>,
}

pub fn construct_old_paid_amount_list(payments: &[Payment]) -> Vec<OldPaidAmount> {
    payments
        .iter()
        .map(|p| OldPaidAmount {
            payment_id: p.id,
            paid_amount: p.paid_amount,
        })
        .collect()
}

/// Groups changed installments by loan, in the order loans first appear
///
/// Installments missing from `old_paid_amounts` are treated as unchanged.
pub fn construct_loan_payments_list(
    payments: &[Payment],
    old_paid_amounts: &[OldPaidAmount],
) -> Vec<LoanPayments> {
    let mut groups: Vec<LoanPayments> = Vec::new();

    for payment in payments {
        let changed = old_paid_amounts
            .iter()
            .find(|old| old.payment_id == payment.id)
            .is_some_and(|old| old.paid_amount != payment.paid_amount);
        if !changed {
            continue;
        }

        match groups.iter_mut().find(|g| g.loan_id == payment.loan_id) {
            Some(group) => group.payment_ids.push(payment.id),
            None => groups.push(LoanPayments {
                loan_id: payment.loan_id,
                payment_ids: vec![payment.id],
            }),
        }
    }

    groups
}
