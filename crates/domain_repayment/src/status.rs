//! Derived status codes
//!
//! Payment, bill and loan statuses are never set directly by money
//! movements; they are recomputed from due dates and remaining amounts
//! after every repayment or reversal.

use chrono::NaiveDate;
use std::collections::HashMap;

use core_kernel::{days_past_due, LoanId, PaymentId};

use crate::account::LoanStatus;
use crate::account_payment::AccountPayment;
use crate::error::RepaymentError;
use crate::payment::{Payment, PaymentStatus};
use crate::ports::RepaymentTx;

/// Days after the due date during which a repayment still counts as within grace
pub const GRACE_PERIOD_DAYS: i64 = 4;

/// Status of a bill that still has money owed
pub fn unpaid_status(due_date: NaiveDate, today: NaiveDate) -> PaymentStatus {
    match days_past_due(due_date, today) {
        d if d <= -4 => PaymentStatus::NotDue,
        -3 | -2 => PaymentStatus::DueIn3Days,
        -1 => PaymentStatus::DueIn1Day,
        0 => PaymentStatus::DueToday,
        1..=4 => PaymentStatus::Dpd1,
        5..=29 => PaymentStatus::Dpd5,
        30..=59 => PaymentStatus::Dpd30,
        60..=89 => PaymentStatus::Dpd60,
        90..=119 => PaymentStatus::Dpd90,
        120..=149 => PaymentStatus::Dpd120,
        150..=179 => PaymentStatus::Dpd150,
        _ => PaymentStatus::Dpd180,
    }
}

/// Status of a bill settled on `paid_date`
pub fn paid_status(due_date: NaiveDate, paid_date: NaiveDate) -> PaymentStatus {
    match days_past_due(due_date, paid_date) {
        d if d <= 0 => PaymentStatus::PaidOnTime,
        d if d <= GRACE_PERIOD_DAYS => PaymentStatus::PaidWithinGrace,
        _ => PaymentStatus::PaidLate,
    }
}

fn status_for(
    due_date: NaiveDate,
    fully_paid: bool,
    paid_date: Option<NaiveDate>,
    today: NaiveDate,
) -> PaymentStatus {
    if fully_paid {
        paid_status(due_date, paid_date.unwrap_or(today))
    } else {
        unpaid_status(due_date, today)
    }
}

pub fn refresh_payment_status(payment: &mut Payment, today: NaiveDate) {
    payment.status =
        status_for(payment.due_date, payment.is_fully_paid(), payment.paid_date, today);
}

pub fn refresh_account_payment_status(account_payment: &mut AccountPayment, today: NaiveDate) {
    account_payment.status = status_for(
        account_payment.due_date,
        account_payment.is_fully_paid(),
        account_payment.paid_date,
        today,
    );
}

/// Loan status from its installments
///
/// A loan with no installments is left `Current`.
pub fn loan_status<'a>(
    payments: impl IntoIterator<Item = &'a Payment>,
    today: NaiveDate,
) -> LoanStatus {
    let mut any = false;
    let mut all_paid = true;
    let mut overdue = false;

    for payment in payments {
        any = true;
        if !payment.is_fully_paid() {
            all_paid = false;
            if payment.due_date < today {
                overdue = true;
            }
        }
    }

    if any && all_paid {
        LoanStatus::PaidOff
    } else if overdue {
        LoanStatus::Late
    } else {
        LoanStatus::Current
    }
}

/// Recomputes and persists the status of each loan, returning the ids that changed
pub(crate) async fn refresh_loan_statuses(
    tx: &mut dyn RepaymentTx,
    loan_ids: &[LoanId],
    today: NaiveDate,
) -> Result<Vec<LoanId>, RepaymentError> {
    if loan_ids.is_empty() {
        return Ok(Vec::new());
    }

    let loans = tx.get_loans(loan_ids).await?;
    let payments = tx.find_payments_for_loans(loan_ids).await?;

    let mut by_loan: HashMap<LoanId, Vec<&Payment>> = HashMap::new();
    for payment in &payments {
        by_loan.entry(payment.loan_id).or_default().push(payment);
    }

    let mut changed = Vec::new();
    for mut loan in loans {
        let status = loan_status(
            by_loan.get(&loan.id).into_iter().flatten().copied(),
            today,
        );
        if status != loan.status {
            tracing::debug!(
                loan_id = %loan.id,
                from = loan.status.code(),
                to = status.code(),
                "Loan status changed"
            );
            loan.status = status;
            tx.save_loan(&loan).await?;
            changed.push(loan.id);
        }
    }

    Ok(changed)
}

/// Distinct loan ids of the given installments, in first-seen order
pub(crate) fn distinct_loan_ids<'a>(
    payments: impl IntoIterator<Item = &'a Payment>,
) -> Vec<LoanId> {
    let mut ids: Vec<LoanId> = Vec::new();
    for payment in payments {
        if !ids.contains(&payment.loan_id) {
            ids.push(payment.loan_id);
        }
    }
    ids
}

/// Distinct payment ids, in first-seen order
pub(crate) fn distinct_payment_ids(ids: impl IntoIterator<Item = PaymentId>) -> Vec<PaymentId> {
    let mut out: Vec<PaymentId> = Vec::new();
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
