//! Promise-to-pay records
//!
//! Collections agents record a customer's promise to pay a bill by a given
//! date. Repayments mark the promise kept; reversing the repayment has to
//! take that back.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{AccountId, AccountPaymentId, AccountTransactionId, Money, PtpId};

/// Outcome of a promise to pay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PtpStatus {
    Paid,
    PaidAfterPtpDate,
    Partial,
    NotPaid,
}

impl PtpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PtpStatus::Paid => "Paid",
            PtpStatus::PaidAfterPtpDate => "Paid after ptp date",
            PtpStatus::Partial => "Partial",
            PtpStatus::NotPaid => "Not Paid",
        }
    }

    /// Statuses set by a repayment landing on the promise
    pub fn is_kept(&self) -> bool {
        matches!(self, PtpStatus::Paid | PtpStatus::PaidAfterPtpDate | PtpStatus::Partial)
    }
}

impl FromStr for PtpStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Paid" => Ok(PtpStatus::Paid),
            "Paid after ptp date" => Ok(PtpStatus::PaidAfterPtpDate),
            "Partial" => Ok(PtpStatus::Partial),
            "Not Paid" => Ok(PtpStatus::NotPaid),
            other => Err(format!("unknown ptp status: {}", other)),
        }
    }
}

/// A customer's promise to pay a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ptp {
    pub id: PtpId,
    pub account_id: AccountId,
    pub account_payment_id: AccountPaymentId,
    /// Last repayment counted towards the promise
    pub account_transaction_id: Option<AccountTransactionId>,
    pub ptp_status: Option<PtpStatus>,
    pub ptp_date: NaiveDate,
    pub ptp_amount: Money,
    pub paid_amount: Money,
}

impl Ptp {
    pub fn new(
        account_id: AccountId,
        account_payment_id: AccountPaymentId,
        ptp_date: NaiveDate,
        ptp_amount: Money,
    ) -> Self {
        Self {
            id: PtpId::new_v7(),
            account_id,
            account_payment_id,
            account_transaction_id: None,
            ptp_status: None,
            ptp_date,
            ptp_amount,
            paid_amount: Money::zero(ptp_amount.currency()),
        }
    }

    /// Counts a repayment towards the promise
    pub fn record_payment(
        &mut self,
        account_transaction_id: AccountTransactionId,
        amount: Money,
        paid_on: NaiveDate,
    ) {
        self.paid_amount = self.paid_amount + amount;
        self.account_transaction_id = Some(account_transaction_id);
        self.ptp_status = Some(if self.paid_amount < self.ptp_amount {
            PtpStatus::Partial
        } else if paid_on <= self.ptp_date {
            PtpStatus::Paid
        } else {
            PtpStatus::PaidAfterPtpDate
        });
    }

    /// Takes a voided repayment back off the promise
    ///
    /// Returns false when the promise was not marked kept. Otherwise the
    /// status becomes `Partial` if other money still counts towards it,
    /// cleared if the promise date has not passed yet, and `NotPaid` after.
    pub fn reset_for_voided_payment(&mut self, voided_amount: Money, today: NaiveDate) -> bool {
        if !self.ptp_status.is_some_and(|s| s.is_kept()) {
            return false;
        }

        self.paid_amount = (self.paid_amount - voided_amount).floor_zero();
        self.ptp_status = if self.paid_amount.is_positive() {
            Some(PtpStatus::Partial)
        } else if today <= self.ptp_date {
            None
        } else {
            Some(PtpStatus::NotPaid)
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ptp(date: NaiveDate) -> Ptp {
        Ptp::new(AccountId::new(), AccountPaymentId::new(), date, Money::idr(300_000))
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    #[test]
    fn test_record_payment_statuses() {
        let mut promise = ptp(date(10));
        promise.record_payment(AccountTransactionId::new(), Money::idr(100_000), date(9));
        assert_eq!(promise.ptp_status, Some(PtpStatus::Partial));

        promise.record_payment(AccountTransactionId::new(), Money::idr(200_000), date(9));
        assert_eq!(promise.ptp_status, Some(PtpStatus::Paid));

        let mut late = ptp(date(10));
        late.record_payment(AccountTransactionId::new(), Money::idr(300_000), date(12));
        assert_eq!(late.ptp_status, Some(PtpStatus::PaidAfterPtpDate));
    }

    #[test]
    fn test_reset_before_ptp_date_clears_status() {
        let mut promise = ptp(date(10));
        promise.record_payment(AccountTransactionId::new(), Money::idr(300_000), date(5));

        assert!(promise.reset_for_voided_payment(Money::idr(300_000), date(6)));
        assert_eq!(promise.ptp_status, None);
        assert!(promise.paid_amount.is_zero());
    }

    #[test]
    fn test_reset_after_ptp_date_marks_not_paid() {
        let mut promise = ptp(date(10));
        promise.record_payment(AccountTransactionId::new(), Money::idr(300_000), date(5));

        assert!(promise.reset_for_voided_payment(Money::idr(300_000), date(15)));
        assert_eq!(promise.ptp_status, Some(PtpStatus::NotPaid));
    }

    #[test]
    fn test_reset_keeps_partial_when_money_remains() {
        let mut promise = ptp(date(10));
        promise.record_payment(AccountTransactionId::new(), Money::idr(100_000), date(5));
        promise.record_payment(AccountTransactionId::new(), Money::idr(200_000), date(6));

        assert!(promise.reset_for_voided_payment(Money::idr(200_000), date(7)));
        assert_eq!(promise.ptp_status, Some(PtpStatus::Partial));
        assert_eq!(promise.paid_amount, Money::idr(100_000));
    }

    #[test]
    fn test_reset_ignores_unkept_promise() {
        let mut promise = ptp(date(10));
        assert!(!promise.reset_for_voided_payment(Money::idr(1), date(7)));

        promise.ptp_status = Some(PtpStatus::NotPaid);
        assert!(!promise.reset_for_voided_payment(Money::idr(1), date(7)));
    }
}
