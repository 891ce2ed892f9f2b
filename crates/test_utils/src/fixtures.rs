//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data and ledger workflows for the repayment
//! test suites. Fixtures are deterministic so assertions can use literal
//! rupiah amounts and dates.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use core_kernel::{AccountId, Money, PaymentId, Timezone};
use domain_repayment::{
    AccountTransaction, Component, ComponentBreakdown, PaybackTransaction, PaymentEvent,
    PaymentEventType, RepaymentProcessor, RepaymentRequest, RepaymentStore, RepaymentTx,
    TransactionType, WaterfallRepaymentProcessor,
};

use crate::store::InMemoryRepaymentStore;

/// Principal of a standard installment, in rupiah
pub const STANDARD_PRINCIPAL: i64 = 300_000;
/// Interest of a standard installment, in rupiah
pub const STANDARD_INTEREST: i64 = 30_000;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A typical single repayment
    pub fn repayment() -> Money {
        Money::idr(50_000)
    }

    /// Principal of one installment
    pub fn installment_principal() -> Money {
        Money::idr(STANDARD_PRINCIPAL)
    }

    /// Interest of one installment
    pub fn installment_interest() -> Money {
        Money::idr(STANDARD_INTEREST)
    }

    /// A standard late fee charge
    pub fn late_fee() -> Money {
        Money::idr(25_000)
    }

    /// A loan large enough to make an account proven once paid off
    pub fn proven_loan() -> Money {
        Money::idr(2_000_000)
    }

    /// A loan too small to make an account proven
    pub fn small_loan() -> Money {
        Money::idr(500_000)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// First installment due date (May 5, 2024)
    pub fn first_due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 5).expect("valid date")
    }

    /// A date before any installment is due
    pub fn before_first_due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date")
    }

    /// Repayment instant: 10:00 in Jakarta on May 1, 2024
    pub fn repayment_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    /// Reversal instant, a day after the repayment
    pub fn reversal_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 3, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    pub fn jakarta() -> Timezone {
        Timezone::jakarta()
    }
}

/// Ledger workflows that produce the transactions a reversal starts from
pub struct LedgerFixtures;

impl LedgerFixtures {
    /// Records a gateway payment and applies it with the waterfall processor
    ///
    /// # Panics
    ///
    /// Panics if the store fails or nothing on the account was due.
    pub async fn repay(
        store: &InMemoryRepaymentStore,
        account_id: AccountId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> AccountTransaction {
        let payback =
            PaybackTransaction::new(account_id, amount, "bca", at).with_reference("VA-0001");
        let mut tx = store.begin().await.expect("begin");
        tx.insert_payback_transaction(&payback)
            .await
            .expect("insert payback");

        let processor = WaterfallRepaymentProcessor::new(TemporalFixtures::jakarta());
        let trx = processor
            .process_repayment_trx(&mut tx, RepaymentRequest::new(payback))
            .await
            .expect("repayment")
            .expect("repayment applied");
        store.commit(tx).await.expect("commit");
        trx
    }

    /// Charges a late fee on one installment and books the `late_fee` transaction
    ///
    /// # Panics
    ///
    /// Panics if the payment does not exist or the store fails.
    pub async fn charge_late_fee(
        store: &InMemoryRepaymentStore,
        payment_id: PaymentId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> AccountTransaction {
        let mut tx = store.begin().await.expect("begin");
        let mut payment = tx
            .get_payments(&[payment_id])
            .await
            .expect("load payment")
            .pop()
            .expect("payment exists");
        let mut bill = tx
            .get_account_payments(&[payment.account_payment_id])
            .await
            .expect("load bill")
            .pop()
            .expect("bill exists");

        payment.charge_late_fee(amount);
        bill.late_fee_amount = bill.late_fee_amount + amount;
        bill.due_amount = bill.due_amount + amount;

        let mut components = ComponentBreakdown::zero(amount.currency());
        components.add(Component::LateFee, amount);
        let trx = AccountTransaction::new(bill.account_id, TransactionType::LateFee, amount, at)
            .with_components(components);
        let event = PaymentEvent::new(
            payment.id,
            trx.id,
            PaymentEventType::LateFee,
            amount,
            payment.due_amount,
            TemporalFixtures::jakarta().local_date(at),
        )
        .with_components(components);

        tx.insert_account_transaction(&trx).await.expect("insert late fee");
        tx.insert_payment_event(&event).await.expect("insert late fee event");
        tx.save_payment(&payment).await.expect("save payment");
        tx.save_account_payment(&bill).await.expect("save bill");
        store.commit(tx).await.expect("commit");
        trx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repayment_is_on_jakarta_calendar_day() {
        let date = TemporalFixtures::jakarta().local_date(TemporalFixtures::repayment_at());
        assert_eq!(date, TemporalFixtures::before_first_due());
    }

    #[test]
    fn test_money_fixtures_are_rupiah() {
        assert_eq!(MoneyFixtures::repayment(), Money::idr(50_000));
        assert!(MoneyFixtures::proven_loan() > Money::idr(1_000_000));
        assert!(MoneyFixtures::small_loan() < Money::idr(1_000_000));
    }
}
