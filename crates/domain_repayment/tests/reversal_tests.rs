//! Reversal tests for domain_repayment
//!
//! Every scenario runs the full service against the in-memory store: a
//! repayment is applied with the waterfall processor, then voided.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

use core_kernel::{AccountTransactionId, Money, Timezone};

use domain_repayment::{
    AccountTransaction, Component, LoanStatus, OverReversalPolicy, PaybackTransaction,
    PaymentEventType, PaymentStatus, PtpStatus, RepaymentError, ReversalPolicy, ReversalRequest,
    ReversalService, TransactionType,
};

use test_utils::{
    account_balance, assert_append_only, assert_ledger_consistent, assert_money_negative,
    assert_money_zero, AccountScenario, AccountScenarioBuilder, InMemoryRepaymentStore,
    LedgerFixtures, MoneyFixtures, StoreOperation, TemporalFixtures,
};

fn service(store: &InMemoryRepaymentStore) -> ReversalService<InMemoryRepaymentStore> {
    ReversalService::new(Arc::new(store.clone()), ReversalPolicy::default())
}

fn service_with(
    store: &InMemoryRepaymentStore,
    policy: ReversalPolicy,
) -> ReversalService<InMemoryRepaymentStore> {
    ReversalService::new(Arc::new(store.clone()), policy)
}

fn reversal_of(trx: &AccountTransaction) -> ReversalRequest {
    ReversalRequest::new(trx.id).at(TemporalFixtures::reversal_at())
}

fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 3, 0, 0)
        .single()
        .expect("valid timestamp")
}

async fn standard_repayment() -> (AccountScenario, InMemoryRepaymentStore, AccountTransaction) {
    let scenario = AccountScenarioBuilder::new().with_standard_loan().build();
    let store = scenario.store();
    let trx = LedgerFixtures::repay(
        &store,
        scenario.account.id,
        MoneyFixtures::repayment(),
        TemporalFixtures::repayment_at(),
    )
    .await;
    (scenario, store, trx)
}

/// Takes `amount` of interest back off installment 1 of loan 0 outside the service
async fn unwind_interest_by_hand(
    store: &InMemoryRepaymentStore,
    scenario: &AccountScenario,
    amount: Money,
) {
    let mut state = store.snapshot().await;
    let payment_id = scenario.payment(0, 1).id;
    let bill_id = scenario.bill(0).id;
    if let Some(payment) = state.payments.get_mut(&payment_id) {
        payment.unwind(Component::Interest, amount);
    }
    if let Some(bill) = state.account_payments.get_mut(&bill_id) {
        bill.unwind(Component::Interest, amount);
    }
    store.replace(state).await;
}

// ============================================================================
// Basic Reversal Tests
// ============================================================================

mod basic_reversal_tests {
    use super::*;

    #[tokio::test]
    async fn test_repayment_applied_interest_first() {
        let (scenario, store, trx) = standard_repayment().await;

        assert_eq!(trx.transaction_type, TransactionType::Payment);
        assert_eq!(trx.transaction_amount, Money::idr(50_000));
        assert_eq!(trx.towards_interest, Money::idr(30_000));
        assert_eq!(trx.towards_principal, Money::idr(20_000));

        let state = store.snapshot().await;
        let payment = &state.payments[&scenario.payment(0, 1).id];
        assert_eq!(payment.paid_amount, Money::idr(50_000));
        assert_eq!(payment.paid_date, Some(TemporalFixtures::before_first_due()));
        assert_ledger_consistent(&state);
    }

    #[tokio::test]
    async fn test_reversal_voids_full_amount() {
        let (scenario, store, trx) = standard_repayment().await;

        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        let void = &outcome.reversal_transaction;
        assert_eq!(void.transaction_type, TransactionType::PaymentVoid);
        assert_eq!(void.account_id, scenario.account.id);
        assert_eq!(void.transaction_amount, Money::idr(-50_000));
        assert_eq!(void.towards_interest, Money::idr(-30_000));
        assert_eq!(void.towards_principal, Money::idr(-20_000));
        assert_money_zero(&void.towards_latefee);
        assert_eq!(void.reversed_transaction_origin_id, Some(trx.id));
        assert_eq!(void.payback_transaction_id, trx.payback_transaction_id);

        assert_eq!(outcome.reversed.total(), Money::idr(50_000));
        assert_money_zero(&outcome.unallocated);
        assert!(outcome.transferred_transaction.is_none());
        assert!(!outcome.ptp_updated);
        assert_eq!(outcome.is_proven, Some(false));
    }

    #[tokio::test]
    async fn test_reversal_restores_installment_and_bill() {
        let (scenario, store, trx) = standard_repayment().await;

        service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        let state = store.snapshot().await;
        let payment = &state.payments[&scenario.payment(0, 1).id];
        assert_money_zero(&payment.paid_amount);
        assert_money_zero(&payment.paid_interest);
        assert_money_zero(&payment.paid_principal);
        assert_eq!(payment.due_amount, Money::idr(330_000));
        assert_eq!(payment.paid_date, None);
        // May 2 against a May 5 due date
        assert_eq!(payment.status, PaymentStatus::DueIn3Days);

        let bill = &state.account_payments[&scenario.bill(0).id];
        assert_eq!(bill.due_amount, Money::idr(330_000));
        assert_money_zero(&bill.paid_amount);
        assert_eq!(bill.paid_date, None);

        assert_eq!(state.loans[&scenario.loans[0].id].status, LoanStatus::Current);
        assert_ledger_consistent(&state);
        assert_money_zero(&account_balance(&state, scenario.account.id));
    }

    #[tokio::test]
    async fn test_void_events_point_at_original_events() {
        let (scenario, store, trx) = standard_repayment().await;
        let original_events: Vec<_> = store
            .snapshot()
            .await
            .events_for(trx.id)
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(original_events.len(), 1);

        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        assert_eq!(outcome.void_events.len(), 1);
        let event = &outcome.void_events[0];
        assert_eq!(event.event_type, PaymentEventType::PaymentVoid);
        assert_eq!(event.payment_id, scenario.payment(0, 1).id);
        assert_eq!(event.account_transaction_id, outcome.reversal_transaction.id);
        assert_eq!(event.event_payment, Money::idr(-50_000));
        assert_eq!(event.event_due_amount, Money::idr(330_000));
        assert_eq!(event.reversed_event_id, Some(original_events[0].id));
        assert_eq!(event.components.interest, Money::idr(-30_000));
        assert_eq!(event.components.principal, Money::idr(-20_000));
        let reversal_date = TemporalFixtures::jakarta().local_date(TemporalFixtures::reversal_at());
        assert_eq!(event.event_date, reversal_date);
    }

    #[tokio::test]
    async fn test_loan_payments_list_names_changed_installments() {
        let (scenario, store, trx) = standard_repayment().await;

        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        assert_eq!(outcome.loan_payments.len(), 1);
        assert_eq!(outcome.loan_payments[0].loan_id, scenario.loans[0].id);
        assert_eq!(outcome.loan_payments[0].payment_ids, vec![scenario.payment(0, 1).id]);
    }

    #[tokio::test]
    async fn test_reversal_note_is_kept() {
        let (_, store, trx) = standard_repayment().await;
        let note = test_utils::reversal_note();

        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx).with_note(note.clone()))
            .await
            .unwrap();

        assert_eq!(outcome.reversal_transaction.note, Some(note));
    }

    #[tokio::test]
    async fn test_reversal_is_append_only() {
        let (_, store, trx) = standard_repayment().await;
        let before = store.snapshot().await;

        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        let after = store.snapshot().await;
        assert_append_only(&before, &after);
        assert_eq!(after.account_transactions.len(), before.account_transactions.len() + 1);
        assert_eq!(
            after.payment_events.len(),
            before.payment_events.len() + outcome.void_events.len()
        );
        assert_money_negative(&outcome.reversal_transaction.transaction_amount);
    }

    #[tokio::test]
    async fn test_void_booked_in_policy_timezone() {
        let (_, store, trx) = standard_repayment().await;
        // 03:00 on May 2 in Jakarta, still May 1 in UTC
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).single().expect("valid timestamp");
        let policy = ReversalPolicy::default().with_timezone(Timezone::new(chrono_tz::UTC));

        let outcome = service_with(&store, policy)
            .process_customer_payment_reversal(ReversalRequest::new(trx.id).at(at))
            .await
            .unwrap();

        assert_eq!(
            outcome.reversal_transaction.accounting_date,
            NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date")
        );
    }
}

// ============================================================================
// Precedence Tests
// ============================================================================

mod precedence_tests {
    use super::*;

    #[tokio::test]
    async fn test_reversal_spans_bills_and_late_fee() {
        let scenario = AccountScenarioBuilder::new()
            .with_standard_loan()
            .with_late_fee(0, 1, MoneyFixtures::late_fee())
            .build();
        let store = scenario.store();
        // 355k settles the first bill, 45k lands on the second
        let trx = LedgerFixtures::repay(
            &store,
            scenario.account.id,
            Money::idr(400_000),
            TemporalFixtures::repayment_at(),
        )
        .await;
        assert_eq!(trx.towards_latefee, Money::idr(25_000));
        assert_eq!(trx.towards_interest, Money::idr(60_000));
        assert_eq!(trx.towards_principal, Money::idr(315_000));

        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        let void = &outcome.reversal_transaction;
        assert_eq!(void.transaction_amount, Money::idr(-400_000));
        assert_eq!(void.towards_latefee, Money::idr(-25_000));
        assert_eq!(void.towards_interest, Money::idr(-60_000));
        assert_eq!(void.towards_principal, Money::idr(-315_000));
        assert_eq!(outcome.void_events.len(), 2);

        let state = store.snapshot().await;
        for number in 1..=2 {
            let payment = &state.payments[&scenario.payment(0, number).id];
            assert_money_zero(&payment.paid_amount);
            assert_eq!(payment.paid_date, None);
        }
        let first_bill = &state.account_payments[&scenario.bill(0).id];
        assert_eq!(first_bill.due_amount, Money::idr(355_000));
        assert_eq!(first_bill.late_fee_amount, Money::idr(25_000));
        assert_ledger_consistent(&state);
    }

    /// Two repayments on overlapping bills; voiding the later one must leave
    /// the earlier one's money where it is
    async fn overlapping_repayments(
    ) -> (AccountScenario, InMemoryRepaymentStore, AccountTransaction) {
        let scenario = AccountScenarioBuilder::new()
            .with_standard_loan()
            .with_ptp(1, TemporalFixtures::first_due_date(), Money::idr(50_000))
            .build();
        let store = scenario.store();
        // settles the first bill, 20k of interest lands on the second
        LedgerFixtures::repay(
            &store,
            scenario.account.id,
            Money::idr(350_000),
            TemporalFixtures::repayment_at(),
        )
        .await;
        LedgerFixtures::charge_late_fee(
            &store,
            scenario.payment(0, 1).id,
            MoneyFixtures::late_fee(),
            TemporalFixtures::repayment_at(),
        )
        .await;
        // 25k clears the late fee on the first bill, 30k goes to the second
        let trx = LedgerFixtures::repay(
            &store,
            scenario.account.id,
            Money::idr(55_000),
            TemporalFixtures::repayment_at(),
        )
        .await;
        (scenario, store, trx)
    }

    #[tokio::test]
    async fn test_reversal_limited_to_what_origin_paid_per_bill() {
        let (scenario, store, trx) = overlapping_repayments().await;

        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        assert_eq!(outcome.reversed.total(), Money::idr(55_000));
        assert_money_zero(&outcome.unallocated);
        assert_eq!(outcome.reversal_transaction.towards_latefee, Money::idr(-25_000));

        let state = store.snapshot().await;
        let first = &state.payments[&scenario.payment(0, 1).id];
        assert_money_zero(&first.paid_late_fee);
        assert_eq!(first.paid_interest, MoneyFixtures::installment_interest());
        assert_eq!(first.paid_principal, MoneyFixtures::installment_principal());
        let second = &state.payments[&scenario.payment(0, 2).id];
        assert_eq!(second.paid_amount, Money::idr(20_000));
        assert_eq!(state.account_payments[&scenario.bill(1).id].paid_amount, Money::idr(20_000));
        assert_ledger_consistent(&state);
    }

    #[tokio::test]
    async fn test_promise_keeps_money_from_other_repayments() {
        let (scenario, store, trx) = overlapping_repayments().await;
        let state = store.snapshot().await;
        let ptp = state.ptp(scenario.ptps[0].id).expect("ptp");
        assert_eq!(ptp.ptp_status, Some(PtpStatus::Paid));
        assert_eq!(ptp.paid_amount, Money::idr(50_000));

        service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        let state = store.snapshot().await;
        let ptp = state.ptp(scenario.ptps[0].id).expect("ptp");
        assert_eq!(ptp.ptp_status, Some(PtpStatus::Partial));
        assert_eq!(ptp.paid_amount, Money::idr(20_000));
        assert_eq!(ptp.paid_amount, state.account_payments[&scenario.bill(1).id].paid_amount);
    }

    #[tokio::test]
    async fn test_paid_off_loan_reopens() {
        let scenario = AccountScenarioBuilder::new()
            .with_loan(
                MoneyFixtures::small_loan(),
                &[(500_000, 50_000)],
                TemporalFixtures::first_due_date(),
            )
            .build();
        let store = scenario.store();
        let trx = LedgerFixtures::repay(
            &store,
            scenario.account.id,
            Money::idr(550_000),
            TemporalFixtures::repayment_at(),
        )
        .await;
        let state = store.snapshot().await;
        assert_eq!(state.loans[&scenario.loans[0].id].status, LoanStatus::PaidOff);
        assert_eq!(state.payments[&scenario.payment(0, 1).id].status, PaymentStatus::PaidOnTime);

        service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.loans[&scenario.loans[0].id].status, LoanStatus::Current);
        assert_eq!(state.payments[&scenario.payment(0, 1).id].status, PaymentStatus::DueIn3Days);
    }

    #[tokio::test]
    async fn test_late_reversal_marks_installment_overdue() {
        let (scenario, store, trx) = standard_repayment().await;

        service(&store)
            .process_customer_payment_reversal(ReversalRequest::new(trx.id).at(utc(2024, 5, 10)))
            .await
            .unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.payments[&scenario.payment(0, 1).id].status, PaymentStatus::Dpd5);
        assert_eq!(state.loans[&scenario.loans[0].id].status, LoanStatus::Late);
    }
}

// ============================================================================
// Rejection Tests
// ============================================================================

mod rejection_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_transaction_not_found() {
        let (_, store, _) = standard_repayment().await;
        let missing = AccountTransactionId::new();

        let result = service(&store)
            .process_customer_payment_reversal(ReversalRequest::new(missing))
            .await;

        assert!(matches!(result, Err(RepaymentError::TransactionNotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn test_late_fee_transaction_not_reversible_as_payment() {
        let scenario = AccountScenarioBuilder::new().with_standard_loan().build();
        let store = scenario.store();
        let late_fee = LedgerFixtures::charge_late_fee(
            &store,
            scenario.payment(0, 1).id,
            MoneyFixtures::late_fee(),
            TemporalFixtures::repayment_at(),
        )
        .await;

        let result = service(&store)
            .process_customer_payment_reversal(reversal_of(&late_fee))
            .await;

        assert!(matches!(
            result,
            Err(RepaymentError::NotReversible { id, .. }) if id == late_fee.id
        ));
    }

    #[tokio::test]
    async fn test_second_reversal_rejected() {
        let (_, store, trx) = standard_repayment().await;
        let svc = service(&store);

        let first = svc.process_customer_payment_reversal(reversal_of(&trx)).await.unwrap();
        let second = svc.process_customer_payment_reversal(reversal_of(&trx)).await;

        match second {
            Err(RepaymentError::AlreadyReversed { origin, reversal }) => {
                assert_eq!(origin, trx.id);
                assert_eq!(reversal, first.reversal_transaction.id);
            }
            other => panic!("expected AlreadyReversed, got {:?}", other),
        }
        let state = store.snapshot().await;
        assert_eq!(state.transactions_of_type(TransactionType::PaymentVoid).len(), 1);
    }

    #[tokio::test]
    async fn test_void_transaction_not_reversible() {
        let (_, store, trx) = standard_repayment().await;
        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        let result = service(&store)
            .process_customer_payment_reversal(reversal_of(&outcome.reversal_transaction))
            .await;

        assert!(matches!(result, Err(RepaymentError::NotReversible { .. })));
    }

    #[tokio::test]
    async fn test_payment_without_payback_rejected() {
        let scenario = AccountScenarioBuilder::new().with_standard_loan().build();
        let store = scenario.store();
        let trx = AccountTransaction::new(
            scenario.account.id,
            TransactionType::Payment,
            MoneyFixtures::repayment(),
            TemporalFixtures::repayment_at(),
        );
        let mut state = store.snapshot().await;
        state.account_transactions.push(trx.clone());
        store.replace(state).await;

        let result = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await;

        assert!(matches!(
            result,
            Err(RepaymentError::MissingPaybackTransaction(id)) if id == trx.id
        ));
    }

    #[tokio::test]
    async fn test_payment_without_events_rejected() {
        let scenario = AccountScenarioBuilder::new().with_standard_loan().build();
        let store = scenario.store();
        let payback = PaybackTransaction::new(
            scenario.account.id,
            MoneyFixtures::repayment(),
            "bca",
            TemporalFixtures::repayment_at(),
        );
        let trx = AccountTransaction::new(
            scenario.account.id,
            TransactionType::Payment,
            MoneyFixtures::repayment(),
            TemporalFixtures::repayment_at(),
        )
        .with_payback(payback.id);
        let mut state = store.snapshot().await;
        state.paybacks.insert(payback.id, payback);
        state.account_transactions.push(trx.clone());
        store.replace(state).await;

        let result = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await;

        assert!(matches!(result, Err(RepaymentError::NoPaymentEvents(id)) if id == trx.id));
    }

    #[tokio::test]
    async fn test_nothing_left_to_reverse() {
        let (scenario, store, trx) = standard_repayment().await;
        let mut state = store.snapshot().await;
        let payment_id = scenario.payment(0, 1).id;
        let bill_id = scenario.bill(0).id;
        for component in [Component::Interest, Component::Principal] {
            let paid = state.payments[&payment_id].paid(component);
            if let Some(payment) = state.payments.get_mut(&payment_id) {
                payment.unwind(component, paid);
            }
            if let Some(bill) = state.account_payments.get_mut(&bill_id) {
                bill.unwind(component, paid);
            }
        }
        store.replace(state).await;
        let before = store.snapshot().await;

        let result = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await;

        assert!(matches!(result, Err(RepaymentError::NothingToReverse(id)) if id == trx.id));
        let after = store.snapshot().await;
        assert_eq!(after.account_transactions.len(), before.account_transactions.len());
        assert_eq!(after.payment_events.len(), before.payment_events.len());
    }
}

// ============================================================================
// Over-Reversal Tests
// ============================================================================

mod over_reversal_tests {
    use super::*;

    #[tokio::test]
    async fn test_over_reversal_rejected_by_default() {
        let (scenario, store, trx) = standard_repayment().await;
        unwind_interest_by_hand(&store, &scenario, Money::idr(10_000)).await;
        let before = store.snapshot().await;

        let result = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await;

        match result {
            Err(RepaymentError::OverReversal { origin, remaining }) => {
                assert_eq!(origin, trx.id);
                assert_eq!(remaining, Money::idr(10_000));
            }
            other => panic!("expected OverReversal, got {:?}", other),
        }
        let after = store.snapshot().await;
        assert_eq!(after.account_transactions, before.account_transactions);
        let payment_id = scenario.payment(0, 1).id;
        assert_eq!(after.payments[&payment_id], before.payments[&payment_id]);
    }

    #[tokio::test]
    async fn test_over_reversal_logged_and_continued() {
        let (scenario, store, trx) = standard_repayment().await;
        unwind_interest_by_hand(&store, &scenario, Money::idr(10_000)).await;
        let policy =
            ReversalPolicy::default().with_over_reversal(OverReversalPolicy::LogAndContinue);

        let outcome = service_with(&store, policy)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        assert_eq!(outcome.unallocated, Money::idr(10_000));
        assert_eq!(outcome.reversed.total(), Money::idr(40_000));
        assert_eq!(outcome.reversal_transaction.transaction_amount, Money::idr(-50_000));
        assert_eq!(outcome.reversal_transaction.towards_interest, Money::idr(-20_000));
        assert_eq!(outcome.reversal_transaction.towards_principal, Money::idr(-20_000));

        let state = store.snapshot().await;
        assert_money_zero(&state.payments[&scenario.payment(0, 1).id].paid_amount);
        assert_ledger_consistent(&state);
    }
}

// ============================================================================
// Transfer Tests
// ============================================================================

mod transfer_tests {
    use super::*;

    async fn two_accounts(
    ) -> (AccountScenario, AccountScenario, InMemoryRepaymentStore, AccountTransaction) {
        let origin = AccountScenarioBuilder::new().with_standard_loan().build();
        let destination = AccountScenarioBuilder::new().with_standard_loan().build();
        let mut state = origin.to_state();
        destination.seed_into(&mut state);
        let store = InMemoryRepaymentStore::with_state(state);

        let trx = LedgerFixtures::repay(
            &store,
            origin.account.id,
            MoneyFixtures::repayment(),
            TemporalFixtures::repayment_at(),
        )
        .await;
        (origin, destination, store, trx)
    }

    #[tokio::test]
    async fn test_transfer_reapplies_funds_to_destination() {
        let (origin, destination, store, trx) = two_accounts().await;

        let outcome = service(&store)
            .process_customer_payment_reversal(
                reversal_of(&trx).transfer_to(destination.account.id),
            )
            .await
            .unwrap();

        let transferred = outcome.transferred_transaction.expect("transfer applied");
        assert_eq!(transferred.account_id, destination.account.id);
        assert_eq!(transferred.transaction_type, TransactionType::Payment);
        assert_eq!(transferred.transaction_amount, Money::idr(50_000));
        assert_eq!(transferred.note, Some(format!("transfer from {}", trx.id)));

        let state = store.snapshot().await;
        let destination_payment = &state.payments[&destination.payment(0, 1).id];
        assert_eq!(destination_payment.paid_interest, Money::idr(30_000));
        assert_eq!(destination_payment.paid_principal, Money::idr(20_000));
        assert_money_zero(&state.payments[&origin.payment(0, 1).id].paid_amount);

        assert_money_zero(&account_balance(&state, origin.account.id));
        assert_eq!(account_balance(&state, destination.account.id), Money::idr(50_000));
        assert_ledger_consistent(&state);
    }

    #[tokio::test]
    async fn test_transfer_copies_gateway_details() {
        let (_, destination, store, trx) = two_accounts().await;

        let outcome = service(&store)
            .process_customer_payment_reversal(
                reversal_of(&trx).transfer_to(destination.account.id),
            )
            .await
            .unwrap();

        let state = store.snapshot().await;
        let transferred = outcome.transferred_transaction.expect("transfer applied");
        let payback_id = transferred.payback_transaction_id.expect("payback linked");
        let payback = &state.paybacks[&payback_id];
        assert_eq!(payback.account_id, destination.account.id);
        assert_eq!(payback.amount, Money::idr(50_000));
        assert_eq!(payback.payback_service, "bca");
        assert_eq!(payback.transaction_id.as_deref(), Some("VA-0001"));
        assert!(payback.is_processed);
    }

    #[tokio::test]
    async fn test_transfer_to_account_with_nothing_due() {
        let origin = AccountScenarioBuilder::new().with_standard_loan().build();
        let destination = AccountScenarioBuilder::new()
            .with_loan(
                MoneyFixtures::small_loan(),
                &[(500_000, 50_000)],
                TemporalFixtures::first_due_date(),
            )
            .paid_off()
            .build();
        let mut state = origin.to_state();
        destination.seed_into(&mut state);
        let store = InMemoryRepaymentStore::with_state(state);
        let trx = LedgerFixtures::repay(
            &store,
            origin.account.id,
            MoneyFixtures::repayment(),
            TemporalFixtures::repayment_at(),
        )
        .await;

        let outcome = service(&store)
            .process_customer_payment_reversal(
                reversal_of(&trx).transfer_to(destination.account.id),
            )
            .await
            .unwrap();

        assert!(outcome.transferred_transaction.is_none());
        let state = store.snapshot().await;
        let parked: Vec<_> = state
            .paybacks
            .values()
            .filter(|p| p.account_id == destination.account.id)
            .collect();
        assert_eq!(parked.len(), 1);
        assert!(!parked[0].is_processed);
    }
}

// ============================================================================
// Promise To Pay Tests
// ============================================================================

mod ptp_tests {
    use super::*;

    async fn kept_promise() -> (AccountScenario, InMemoryRepaymentStore, AccountTransaction) {
        let scenario = AccountScenarioBuilder::new()
            .with_standard_loan()
            .with_ptp(0, TemporalFixtures::first_due_date(), MoneyFixtures::repayment())
            .build();
        let store = scenario.store();
        let trx = LedgerFixtures::repay(
            &store,
            scenario.account.id,
            MoneyFixtures::repayment(),
            TemporalFixtures::repayment_at(),
        )
        .await;
        (scenario, store, trx)
    }

    #[tokio::test]
    async fn test_repayment_keeps_promise() {
        let (scenario, store, trx) = kept_promise().await;

        let state = store.snapshot().await;
        let ptp = state.ptp(scenario.ptps[0].id).expect("ptp");
        assert_eq!(ptp.ptp_status, Some(PtpStatus::Paid));
        assert_eq!(ptp.paid_amount, Money::idr(50_000));
        assert_eq!(ptp.account_transaction_id, Some(trx.id));
    }

    #[tokio::test]
    async fn test_reversal_before_promise_date_clears_status() {
        let (scenario, store, trx) = kept_promise().await;

        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        assert!(outcome.ptp_updated);
        let state = store.snapshot().await;
        let ptp = state.ptp(scenario.ptps[0].id).expect("ptp");
        assert_eq!(ptp.ptp_status, None);
        assert_money_zero(&ptp.paid_amount);
    }

    #[tokio::test]
    async fn test_reversal_after_promise_date_marks_not_paid() {
        let (scenario, store, trx) = kept_promise().await;

        let outcome = service(&store)
            .process_customer_payment_reversal(ReversalRequest::new(trx.id).at(utc(2024, 6, 1)))
            .await
            .unwrap();

        assert!(outcome.ptp_updated);
        let state = store.snapshot().await;
        let ptp = state.ptp(scenario.ptps[0].id).expect("ptp");
        assert_eq!(ptp.ptp_status, Some(PtpStatus::NotPaid));
    }

    #[tokio::test]
    async fn test_reversal_resets_promise_on_every_bill() {
        let scenario = AccountScenarioBuilder::new()
            .with_standard_loan()
            .with_ptp(0, TemporalFixtures::first_due_date(), Money::idr(330_000))
            .with_ptp(1, TemporalFixtures::first_due_date(), MoneyFixtures::repayment())
            .build();
        let store = scenario.store();
        let trx = LedgerFixtures::repay(
            &store,
            scenario.account.id,
            Money::idr(400_000),
            TemporalFixtures::repayment_at(),
        )
        .await;
        let state = store.snapshot().await;
        for ptp in &scenario.ptps {
            let ptp = state.ptp(ptp.id).expect("ptp");
            assert_eq!(ptp.ptp_status, Some(PtpStatus::Paid));
            assert_eq!(ptp.account_transaction_id, Some(trx.id));
        }

        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        assert!(outcome.ptp_updated);
        let state = store.snapshot().await;
        for ptp in &scenario.ptps {
            let ptp = state.ptp(ptp.id).expect("ptp");
            assert_eq!(ptp.ptp_status, None);
            assert_money_zero(&ptp.paid_amount);
        }
    }

    #[tokio::test]
    async fn test_transfer_also_resets_promise() {
        let (scenario, store, trx) = kept_promise().await;
        let destination = AccountScenarioBuilder::new().with_standard_loan().build();
        let mut state = store.snapshot().await;
        destination.seed_into(&mut state);
        store.replace(state).await;

        let outcome = service(&store)
            .process_customer_payment_reversal(
                reversal_of(&trx).transfer_to(destination.account.id),
            )
            .await
            .unwrap();

        assert!(outcome.ptp_updated);
        let state = store.snapshot().await;
        assert_eq!(state.ptp(scenario.ptps[0].id).expect("ptp").ptp_status, None);
    }
}

// ============================================================================
// Proven Flag Tests
// ============================================================================

mod proven_tests {
    use super::*;

    fn proven_scenario(with_second_paid_loan: bool) -> AccountScenario {
        let mut builder = AccountScenarioBuilder::new()
            .with_loan(
                MoneyFixtures::proven_loan(),
                &[(2_000_000, 100_000)],
                TemporalFixtures::first_due_date(),
            )
            .proven(true);
        if with_second_paid_loan {
            builder = builder
                .with_loan(
                    MoneyFixtures::proven_loan(),
                    &[(2_000_000, 100_000)],
                    TemporalFixtures::before_first_due(),
                )
                .paid_off();
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_reversing_payoff_revokes_proven() {
        let scenario = proven_scenario(false);
        let store = scenario.store();
        let trx = LedgerFixtures::repay(
            &store,
            scenario.account.id,
            Money::idr(2_100_000),
            TemporalFixtures::repayment_at(),
        )
        .await;
        assert_eq!(store.snapshot().await.loans[&scenario.loans[0].id].status, LoanStatus::PaidOff);

        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        assert_eq!(outcome.is_proven, Some(false));
        let state = store.snapshot().await;
        let property = &state.account_properties[&scenario.account.id];
        assert!(!property.is_proven);
        assert!(!property.concurrency);
        assert_eq!(state.loans[&scenario.loans[0].id].status, LoanStatus::Current);
    }

    #[tokio::test]
    async fn test_proven_kept_while_other_payoff_qualifies() {
        let scenario = proven_scenario(true);
        let store = scenario.store();
        let trx = LedgerFixtures::repay(
            &store,
            scenario.account.id,
            Money::idr(2_100_000),
            TemporalFixtures::repayment_at(),
        )
        .await;

        let outcome = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await
            .unwrap();

        assert_eq!(outcome.is_proven, Some(true));
        let property = &store.snapshot().await.account_properties[&scenario.account.id];
        assert!(property.is_proven);
        assert!(property.concurrency);
    }

    #[tokio::test]
    async fn test_reverse_is_proven_is_idempotent() {
        let scenario = proven_scenario(false);
        let store = scenario.store();
        let svc = service(&store);

        assert_eq!(svc.reverse_is_proven(scenario.account.id).await.unwrap(), Some(false));
        let first = store.snapshot().await.account_properties[&scenario.account.id].clone();
        assert_eq!(svc.reverse_is_proven(scenario.account.id).await.unwrap(), Some(false));
        let second = store.snapshot().await.account_properties[&scenario.account.id].clone();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_threshold_is_configurable() {
        let scenario = AccountScenarioBuilder::new()
            .with_loan(
                MoneyFixtures::small_loan(),
                &[(500_000, 50_000)],
                TemporalFixtures::first_due_date(),
            )
            .paid_off()
            .proven(true)
            .build();
        let store = scenario.store();

        let strict = service(&store);
        let lenient = service_with(
            &store,
            ReversalPolicy::default().with_proven_threshold(Money::idr(100_000)),
        );

        assert_eq!(lenient.reverse_is_proven(scenario.account.id).await.unwrap(), Some(true));
        assert_eq!(strict.reverse_is_proven(scenario.account.id).await.unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_account_without_property_reports_none() {
        let scenario = AccountScenarioBuilder::new().with_standard_loan().build();
        let mut state = scenario.to_state();
        state.account_properties.clear();
        let store = InMemoryRepaymentStore::with_state(state);

        assert_eq!(service(&store).reverse_is_proven(scenario.account.id).await.unwrap(), None);
    }
}

// ============================================================================
// Atomicity Tests
// ============================================================================

mod atomicity_tests {
    use super::*;

    async fn assert_failure_rolls_back(operation: StoreOperation) {
        let (scenario, store, trx) = standard_repayment().await;
        let before = store.snapshot().await;
        store.fail_on(operation).await;

        let result = service(&store)
            .process_customer_payment_reversal(reversal_of(&trx))
            .await;

        let error = result.expect_err("injected failure");
        assert!(error.is_transient(), "unexpected error: {}", error);
        let after = store.snapshot().await;
        assert_eq!(after.account_transactions, before.account_transactions);
        assert_eq!(after.payment_events, before.payment_events);
        let payment_id = scenario.payment(0, 1).id;
        assert_eq!(after.payments[&payment_id], before.payments[&payment_id]);
        let bill_id = scenario.bill(0).id;
        assert_eq!(after.account_payments[&bill_id], before.account_payments[&bill_id]);
    }

    #[tokio::test]
    async fn test_failed_event_insert_rolls_back() {
        assert_failure_rolls_back(StoreOperation::InsertPaymentEvent).await;
    }

    #[tokio::test]
    async fn test_failed_bill_save_rolls_back() {
        assert_failure_rolls_back(StoreOperation::SaveAccountPayment).await;
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        assert_failure_rolls_back(StoreOperation::Commit).await;
    }

    #[tokio::test]
    async fn test_retry_after_failure_succeeds() {
        let (_, store, trx) = standard_repayment().await;
        store.fail_on(StoreOperation::SavePayment).await;
        let svc = service(&store);

        assert!(svc.process_customer_payment_reversal(reversal_of(&trx)).await.is_err());
        store.clear_failpoint().await;
        let outcome = svc.process_customer_payment_reversal(reversal_of(&trx)).await.unwrap();

        assert_eq!(outcome.reversal_transaction.transaction_amount, Money::idr(-50_000));
    }

    #[tokio::test]
    async fn test_concurrent_reversals_void_once() {
        let (_, store, trx) = standard_repayment().await;
        let first = service(&store);
        let second = service(&store);

        let (a, b) = tokio::join!(
            first.process_customer_payment_reversal(reversal_of(&trx)),
            second.process_customer_payment_reversal(reversal_of(&trx)),
        );

        let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(succeeded, 1);
        let rejected = if a.is_ok() { b } else { a };
        assert!(matches!(rejected, Err(RepaymentError::AlreadyReversed { .. })));
        let state = store.snapshot().await;
        assert_eq!(state.transactions_of_type(TransactionType::PaymentVoid).len(), 1);
    }
}

// ============================================================================
// Late Fee Reversal Tests
// ============================================================================

mod late_fee_reversal_tests {
    use super::*;

    async fn charged() -> (AccountScenario, InMemoryRepaymentStore, AccountTransaction) {
        let scenario = AccountScenarioBuilder::new().with_standard_loan().build();
        let store = scenario.store();
        let late_fee = LedgerFixtures::charge_late_fee(
            &store,
            scenario.payment(0, 1).id,
            MoneyFixtures::late_fee(),
            TemporalFixtures::repayment_at(),
        )
        .await;
        (scenario, store, late_fee)
    }

    #[tokio::test]
    async fn test_unpaid_late_fee_fully_reversed() {
        let (scenario, store, late_fee) = charged().await;

        let void = service(&store)
            .process_late_fee_reversal(late_fee.id, TemporalFixtures::reversal_at())
            .await
            .unwrap()
            .expect("late fee voided");

        assert_eq!(void.transaction_type, TransactionType::LateFeeVoid);
        assert_eq!(void.transaction_amount, Money::idr(-25_000));
        assert_eq!(void.towards_latefee, Money::idr(-25_000));
        assert_eq!(void.reversed_transaction_origin_id, Some(late_fee.id));

        let state = store.snapshot().await;
        let payment = &state.payments[&scenario.payment(0, 1).id];
        assert_money_zero(&payment.late_fee_amount);
        assert_eq!(payment.due_amount, Money::idr(330_000));
        let events = state.events_for(void.id);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, PaymentEventType::LateFeeVoid);
        assert_eq!(events[0].event_payment, Money::idr(-25_000));
        assert_ledger_consistent(&state);
    }

    #[tokio::test]
    async fn test_paid_portion_of_late_fee_kept() {
        let (scenario, store, late_fee) = charged().await;
        LedgerFixtures::repay(
            &store,
            scenario.account.id,
            Money::idr(10_000),
            TemporalFixtures::repayment_at(),
        )
        .await;

        let void = service(&store)
            .process_late_fee_reversal(late_fee.id, TemporalFixtures::reversal_at())
            .await
            .unwrap()
            .expect("late fee voided");

        assert_eq!(void.transaction_amount, Money::idr(-15_000));
        let state = store.snapshot().await;
        let payment = &state.payments[&scenario.payment(0, 1).id];
        assert_eq!(payment.late_fee_amount, Money::idr(10_000));
        assert_eq!(payment.paid_late_fee, Money::idr(10_000));
        assert_ledger_consistent(&state);
    }

    #[tokio::test]
    async fn test_fully_paid_late_fee_left_alone() {
        let (scenario, store, late_fee) = charged().await;
        LedgerFixtures::repay(
            &store,
            scenario.account.id,
            MoneyFixtures::late_fee(),
            TemporalFixtures::repayment_at(),
        )
        .await;
        let before = store.snapshot().await;

        let void = service(&store)
            .process_late_fee_reversal(late_fee.id, TemporalFixtures::reversal_at())
            .await
            .unwrap();

        assert!(void.is_none());
        assert_eq!(store.snapshot().await.account_transactions, before.account_transactions);
    }

    #[tokio::test]
    async fn test_late_fee_voided_once() {
        let (_, store, late_fee) = charged().await;
        let svc = service(&store);

        let first = svc
            .process_late_fee_reversal(late_fee.id, TemporalFixtures::reversal_at())
            .await
            .unwrap();
        let second = svc
            .process_late_fee_reversal(late_fee.id, TemporalFixtures::reversal_at())
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_late_fee_void_is_final_after_payment_reversal() {
        let (scenario, store, late_fee) = charged().await;
        let repayment = LedgerFixtures::repay(
            &store,
            scenario.account.id,
            Money::idr(10_000),
            TemporalFixtures::repayment_at(),
        )
        .await;
        let svc = service(&store);
        let first = svc
            .process_late_fee_reversal(late_fee.id, TemporalFixtures::reversal_at())
            .await
            .unwrap()
            .expect("late fee voided");
        assert_eq!(first.transaction_amount, Money::idr(-15_000));

        // the 10k that covered the rest of the fee is voided afterwards
        svc.process_customer_payment_reversal(reversal_of(&repayment))
            .await
            .unwrap();
        let second = svc
            .process_late_fee_reversal(late_fee.id, TemporalFixtures::reversal_at())
            .await
            .unwrap();

        assert!(second.is_none());
        let state = store.snapshot().await;
        let payment = &state.payments[&scenario.payment(0, 1).id];
        assert_eq!(payment.late_fee_amount, Money::idr(10_000));
        assert_money_zero(&payment.paid_late_fee);
        assert_ledger_consistent(&state);
    }

    #[tokio::test]
    async fn test_payment_transaction_is_not_a_late_fee() {
        let (_, store, trx) = standard_repayment().await;

        let void = service(&store)
            .process_late_fee_reversal(trx.id, TemporalFixtures::reversal_at())
            .await
            .unwrap();

        assert!(void.is_none());
    }

    #[tokio::test]
    async fn test_unknown_late_fee_not_found() {
        let (_, store, _) = charged().await;

        let result = service(&store)
            .process_late_fee_reversal(AccountTransactionId::new(), TemporalFixtures::reversal_at())
            .await;

        assert!(matches!(result, Err(RepaymentError::TransactionNotFound(_))));
    }
}
